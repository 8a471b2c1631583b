//! HTTP 存活探测
//!
//! 单次 GET 请求，只有 2xx 视为成功；超时由 HTTP client 自身控制

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{error, info};

use super::HealthProbe;

/// 探测错误
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("health check request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("health check {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// 基于 reqwest 的探测器
#[derive(Clone, Debug)]
pub struct HttpHealthProbe {
    client: Client,
}

impl HttpHealthProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(ProbeError::Client)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self, url: &str) -> Result<(), ProbeError> {
        let response = self.client.get(url).send().await.map_err(|source| {
            error!(url = %url, error = %source, "Health check request failed");
            ProbeError::Request {
                url: url.to_string(),
                source,
            }
        })?;

        let status = response.status();
        if status.is_success() {
            info!(url = %url, status = status.as_u16(), "Health check passed");
            Ok(())
        } else {
            error!(url = %url, status = status.as_u16(), "Health check failed");
            Err(ProbeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Json, Router};

    /// 在随机端口启动一个只有 /healthz 的服务
    async fn serve(status: StatusCode) -> String {
        let app = Router::new().route(
            "/healthz",
            get(move || async move { (status, Json(serde_json::json!({ "status": "ok" }))) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}/healthz", addr)
    }

    fn probe() -> HttpHealthProbe {
        HttpHealthProbe::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_check_ok() {
        let url = serve(StatusCode::OK).await;
        assert!(probe().check(&url).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_non_success_status() {
        let url = serve(StatusCode::SERVICE_UNAVAILABLE).await;
        let err = probe().check(&url).await.unwrap_err();
        assert!(matches!(err, ProbeError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_check_connection_refused() {
        // 绑定后立即释放，端口上没有服务
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = probe()
            .check(&format!("http://{}/healthz", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Request { .. }));
    }
}
