//! 备份目录独占锁
//!
//! 锁文件常驻备份目录，持有期间对其加操作系统级排他锁（flock），
//! 并写入持有者 PID 便于排查。进程退出或被强杀时由内核释放，无需回收过期锁。

use std::fs::{File, OpenOptions, TryLockError};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::BackupError;

/// 锁文件名
pub const LOCK_FILE_NAME: &str = ".backup.lock";

/// 持有期间独占备份目录
#[derive(Debug)]
pub struct BackupLock {
    path: PathBuf,
    file: File,
}

impl BackupLock {
    /// 获取锁，已被其他进程持有时立即失败
    pub fn acquire(dir: &Path) -> Result<Self, BackupError> {
        let path = dir.join(LOCK_FILE_NAME);
        let lock_error = |source| BackupError::Lock {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_error)?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(BackupError::Locked {
                    holder: read_holder(&mut file),
                    path: path.clone(),
                });
            }
            Err(TryLockError::Error(source)) => return Err(lock_error(source)),
        }

        let previous = read_holder(&mut file);
        if let Some(pid) = previous {
            debug!(
                path = %path.display(),
                previous_holder = pid,
                "Lock file left by an earlier run"
            );
        }

        write_holder(&mut file).map_err(lock_error)?;
        debug!(path = %path.display(), "Acquired backup lock");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BackupLock {
    fn drop(&mut self) {
        // 文件保留，仅清空 PID 并解锁
        let path = self.path.display();
        if let Err(e) = self.file.set_len(0) {
            warn!(path = %path, error = %e, "Failed to clear backup lock holder");
        }
        match self.file.unlock() {
            Ok(()) => debug!(path = %path, "Released backup lock"),
            Err(e) => warn!(path = %path, error = %e, "Failed to release backup lock"),
        }
    }
}

fn write_holder(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.rewind()?;
    writeln!(file, "{}", std::process::id())?;
    file.sync_all()
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.rewind().ok()?;
    file.read_to_string(&mut content).ok()?;
    content.trim().parse().ok()
}
