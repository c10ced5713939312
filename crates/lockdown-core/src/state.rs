//! 会话状态落盘模型（session-state.json）。
//!
//! 目的：
//! - 记录最近一次锁定的分组 ID，使回滚可以在另一个进程或重启之后执行
//! - 记录锁定结果与目标用户，便于排障
//! - [`SessionLock`]：同一时刻只允许一个进程锁定、回滚或恢复
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::feature::UserIdentity;
use crate::group::GroupId;
use crate::operation::OperationResult;

/// 会话状态（会序列化为 JSON 存储到 ProgramData）。
///
/// 字段说明：
/// - `group_id`：本次锁定的分组 ID（回滚依据）
/// - `user`：目标用户
/// - `performed_at`：锁定时间（UTC）
/// - `result`：锁定结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub group_id: GroupId,
    pub user: UserIdentity,
    #[serde(with = "time::serde::rfc3339")]
    pub performed_at: OffsetDateTime,
    pub result: OperationResult,
}

impl SessionState {
    pub fn new(group_id: GroupId, user: UserIdentity, result: OperationResult) -> Self {
        Self {
            group_id,
            user,
            performed_at: OffsetDateTime::now_utc(),
            result,
        }
    }

    /// 读取会话状态文件。
    ///
    /// 返回值：
    /// - `Ok(None)`：文件不存在（没有未结束的会话）
    /// - `Ok(Some(..))`：解析成功
    ///
    /// 异常处理：
    /// - 读取或解析失败返回错误
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(path).with_context(|| format!("读取会话状态失败: {}", path.display()))?;
        let state = serde_json::from_slice(&bytes).context("解析 session-state.json 失败")?;
        Ok(Some(state))
    }

    /// 将会话状态写入文件（父目录不存在时自动创建）。
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                crate::paths::ensure_dir(parent)?;
            }
        }
        let bytes = serde_json::to_vec_pretty(self).context("序列化 session-state.json 失败")?;
        std::fs::write(path, bytes).with_context(|| format!("写入会话状态失败: {}", path.display()))?;
        Ok(())
    }

    /// 删除会话状态文件（不存在时视为已删除）。
    pub fn clear(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("删除会话状态失败: {}", path.display())),
        }
    }
}

/// 会话互斥锁：状态文件旁的 `<文件名>.lock` 上的排他文件锁（跨进程）。
///
/// 锁定进程在整个生命周期（含 `--hold` 等待期间，漂移监控仍在运行）持有该锁；
/// 回滚与恢复在修改系统前必须取得该锁。句柄释放（含进程退出）即解锁。
#[derive(Debug)]
pub struct SessionLock {
    _file: File,
    path: PathBuf,
}

impl SessionLock {
    /// 状态文件对应的锁文件路径。
    pub fn lock_path(state_path: &Path) -> PathBuf {
        let mut name = state_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session-state.json".into());
        name.push(".lock");
        state_path.with_file_name(name)
    }

    /// 尝试取得会话锁（不等待）。
    ///
    /// 返回值：
    /// - `Ok(Some(..))`：取得锁
    /// - `Ok(None)`：锁已被其他进程持有
    ///
    /// 异常处理：
    /// - 目录创建、锁文件打开或加锁的其他失败返回错误
    pub fn try_acquire(state_path: &Path) -> Result<Option<Self>> {
        let path = Self::lock_path(state_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                crate::paths::ensure_dir(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("打开会话锁失败: {}", path.display()))?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self { _file: file, path })),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("获取会话锁失败: {}", path.display())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
