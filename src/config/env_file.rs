//! dotenv 风格的环境配置文件解析
//!
//! 支持：
//! - `KEY=VALUE`、`export KEY=VALUE`
//! - `#` 注释行与未加引号值后的行尾注释
//! - 单引号（原样）与双引号（支持 `\n` `\"` `\\` 转义）
//!
//! 不做 `${VAR}` 变量展开。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use super::ConfigError;

/// 已加载的环境配置文件
#[derive(Clone, Debug, Default)]
pub struct EnvFile {
    /// 文件路径
    pub path: PathBuf,
    /// 解析出的变量
    pub vars: BTreeMap<String, String>,
}

impl EnvFile {
    /// 加载配置文件，文件不存在时返回 `None`
    pub async fn load_optional(path: &Path) -> Result<Option<Self>, ConfigError> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Env file not found, using defaults");
                return Ok(None);
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let vars = parse(&content);
        debug!(path = %path.display(), vars = vars.len(), "Loaded env file");

        Ok(Some(Self {
            path: path.to_path_buf(),
            vars,
        }))
    }
}

/// 解析文件内容，后出现的同名变量覆盖前者
pub fn parse(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            warn!(line = index + 1, "Skipping env line without '='");
            continue;
        };

        let key = key.trim();
        if !is_valid_key(key) {
            warn!(line = index + 1, key = %key, "Skipping env line with invalid key");
            continue;
        }

        vars.insert(key.to_string(), parse_value(value.trim()));
    }

    vars
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_value(value: &str) -> String {
    if let Some(rest) = value.strip_prefix('\'') {
        if let Some(end) = rest.find('\'') {
            warn_trailing(&rest[end + 1..]);
            return rest[..end].to_string();
        }
    }

    if let Some(rest) = value.strip_prefix('"') {
        if let Some(end) = closing_double_quote(rest) {
            warn_trailing(&rest[end + 1..]);
            return unescape(&rest[..end]);
        }
    }

    // 行尾注释需要前置空白，`a#b` 保持原样
    let unquoted = match value.find(" #").or_else(|| value.find("\t#")) {
        Some(pos) => &value[..pos],
        None => value,
    };
    unquoted.trim_end().to_string()
}

/// 跳过 `\"` 转义，返回结束引号的位置
fn closing_double_quote(value: &str) -> Option<usize> {
    let mut escaped = false;
    for (pos, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(pos),
            _ => {}
        }
    }
    None
}

/// 引号之后只允许空白与 `#` 注释
fn warn_trailing(rest: &str) {
    let rest = rest.trim_start();
    if !rest.is_empty() && !rest.starts_with('#') {
        warn!(trailing = %rest, "Ignoring text after quoted env value");
    }
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
