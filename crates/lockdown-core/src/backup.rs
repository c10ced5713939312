//! 功能配置备份存储。
//!
//! 目的：
//! - 在修改系统之前保存每个功能的原始状态，使回滚可以在其他进程/重启后进行
//! - 记录按分组 ID 归档；回滚成功的记录被删除，失败的记录保留以便重试
//!
//! 不变式：
//! - 记录存在 ⇔ 对应配置已初始化并保存，但尚未成功恢复
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fs2::FileExt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::factory::FeatureConfigurationFactory;
use crate::feature::{FeatureConfiguration, FeatureKind, UserIdentity};
use crate::group::GroupId;

/// 一条持久化的备份记录。
///
/// 字段说明：
/// - `id`：配置实例 ID（同一实例重复保存会覆盖）
/// - `group_id`：所属锁定分组
/// - `kind`：功能类型
/// - `identity`：目标用户（整机功能为空）
/// - `state`：实现自定义的原始状态载荷（不透明 JSON）
/// - `saved_at`：保存时间（UTC）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: Uuid,
    pub group_id: GroupId,
    pub kind: FeatureKind,
    #[serde(default)]
    pub identity: Option<UserIdentity>,
    #[serde(default)]
    pub state: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
}

impl BackupRecord {
    pub fn new(
        id: Uuid,
        group_id: GroupId,
        kind: FeatureKind,
        identity: Option<UserIdentity>,
        state: serde_json::Value,
    ) -> Self {
        Self {
            id,
            group_id,
            kind,
            identity,
            state,
            saved_at: OffsetDateTime::now_utc(),
        }
    }
}

/// 备份存储错误。
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("备份文件读写失败: {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("备份文件格式错误: {path}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("序列化备份记录失败")]
    Serialize(#[source] serde_json::Error),
    #[error("备份存储锁已损坏")]
    Poisoned,
}

/// 备份存储契约。
///
/// 要求：
/// - `save`：对同一配置实例幂等
/// - `get_by`：返回分组下全部记录，顺序不保证
/// - `delete`：仅在恢复成功后调用
/// - 实现需自行保证并发安全（恢复路径可能与活动会话同时读取存储）
pub trait FeatureConfigurationBackup: Send + Sync {
    fn save(&self, configuration: &dyn FeatureConfiguration) -> Result<(), BackupError>;

    fn get_by(&self, group_id: GroupId) -> Result<Vec<Box<dyn FeatureConfiguration>>, BackupError>;

    /// 返回存储中的全部配置（不区分分组），用于异常退出后的整体恢复。
    fn get_all(&self) -> Result<Vec<Box<dyn FeatureConfiguration>>, BackupError>;

    fn delete(&self, configuration: &dyn FeatureConfiguration) -> Result<(), BackupError>;
}

/// 基于单个 JSON 文件的备份存储。
///
/// 实现策略：
/// - 全部记录保存在一个 JSON 数组文件中（默认 `%ProgramData%\ExamLockdown\feature-backup.json`）
/// - 跨进程：每次读-改-写都在旁路锁文件 `<文件名>.lock` 上持有排他锁，读取持有共享锁
/// - 进程内另用互斥锁串行化
/// - 写入先落到唯一命名的临时文件，再原子替换目标文件
/// - 读取时通过工厂的 [`FeatureConfigurationFactory::load`] 将记录重建为配置实例
pub struct FileBackup {
    path: PathBuf,
    factory: Arc<dyn FeatureConfigurationFactory>,
    lock: Mutex<()>,
}

impl FileBackup {
    /// 创建文件备份存储（不会立即创建文件）。
    ///
    /// 参数：
    /// - `path`：备份文件路径
    /// - `factory`：用于重建配置实例的工厂
    pub fn new(path: impl Into<PathBuf>, factory: Arc<dyn FeatureConfigurationFactory>) -> Self {
        Self {
            path: path.into(),
            factory,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 旁路锁文件路径（与备份文件同目录）。
    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, |name| format!("{name}.lock"))
    }

    /// 读取全部原始记录（不重建配置实例），用于状态展示。
    pub fn records(&self) -> Result<Vec<BackupRecord>, BackupError> {
        let _guard = self.lock.lock().map_err(|_| BackupError::Poisoned)?;
        let _store = self.lock_store(false)?;
        self.read_records()
    }

    /// 直接读取备份文件中的记录（不需要工厂，用于状态查询）。
    ///
    /// 返回值：
    /// - 文件不存在或为空时返回空列表
    ///
    /// 异常处理：
    /// - 读取失败返回 [`BackupError::Io`]，JSON 损坏返回 [`BackupError::Corrupt`]
    pub fn read_records_at(path: &Path) -> Result<Vec<BackupRecord>, BackupError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(path).map_err(|source| io_error_at(path, source))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|source| BackupError::Corrupt {
            path: path.display().to_string(),
            source,
        })
    }

    fn read_records(&self) -> Result<Vec<BackupRecord>, BackupError> {
        Self::read_records_at(&self.path)
    }

    /// 打开旁路锁文件并加锁；返回的句柄释放时解锁。
    ///
    /// 共享锁在目录尚不存在时跳过（此时不可能有写入者留下数据）。
    fn lock_store(&self, exclusive: bool) -> Result<Option<File>, BackupError> {
        let lock_path = self.lock_path();
        match lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) if exclusive => {
                std::fs::create_dir_all(parent).map_err(|source| io_error_at(parent, source))?;
            }
            Some(parent) if !parent.exists() => return Ok(None),
            _ => {}
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| io_error_at(&lock_path, source))?;
        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(|source| io_error_at(&lock_path, source))?;
        Ok(Some(file))
    }

    fn write_records(&self, records: &[BackupRecord]) -> Result<(), BackupError> {
        let bytes = serde_json::to_vec_pretty(records).map_err(BackupError::Serialize)?;
        let tmp = sibling(&self.path, |name| format!(".{name}.tmp.{}", Uuid::new_v4().simple()));
        if let Err(source) = std::fs::write(&tmp, bytes) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_error_at(&tmp, source));
        }
        if let Err(source) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_error_at(&self.path, source));
        }
        Ok(())
    }

    /// 在排他锁下读取、修改并（有变化时）写回全部记录。
    fn update<T>(&self, change: impl FnOnce(&mut Vec<BackupRecord>) -> (T, bool)) -> Result<T, BackupError> {
        let _guard = self.lock.lock().map_err(|_| BackupError::Poisoned)?;
        let _store = self.lock_store(true)?;
        let mut records = self.read_records()?;
        let (value, changed) = change(&mut records);
        if changed {
            self.write_records(&records)?;
        }
        Ok(value)
    }

    fn load_matching(&self, keep: impl Fn(&BackupRecord) -> bool) -> Result<Vec<Box<dyn FeatureConfiguration>>, BackupError> {
        let records = {
            let _guard = self.lock.lock().map_err(|_| BackupError::Poisoned)?;
            let _store = self.lock_store(false)?;
            self.read_records()?
        };
        Ok(records
            .into_iter()
            .filter(|r| keep(r))
            .map(|record| self.factory.load(record))
            .collect())
    }
}

fn io_error_at(path: &Path, source: std::io::Error) -> BackupError {
    BackupError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// 同目录下由文件名派生的路径。
fn sibling(path: &Path, name: impl FnOnce(&str) -> String) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "feature-backup.json".to_string());
    path.with_file_name(name(&file_name))
}

impl FeatureConfigurationBackup for FileBackup {
    fn save(&self, configuration: &dyn FeatureConfiguration) -> Result<(), BackupError> {
        let record = configuration.to_record();
        self.update(|records| {
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
            ((), true)
        })?;
        debug!("已保存备份记录: {} ({})", configuration.kind(), configuration.id());
        Ok(())
    }

    fn get_by(&self, group_id: GroupId) -> Result<Vec<Box<dyn FeatureConfiguration>>, BackupError> {
        self.load_matching(|r| r.group_id == group_id)
    }

    fn get_all(&self) -> Result<Vec<Box<dyn FeatureConfiguration>>, BackupError> {
        self.load_matching(|_| true)
    }

    fn delete(&self, configuration: &dyn FeatureConfiguration) -> Result<(), BackupError> {
        let id = configuration.id();
        let removed = self.update(|records| {
            let before = records.len();
            records.retain(|r| r.id != id);
            let removed = records.len() != before;
            (removed, removed)
        })?;
        if removed {
            debug!("已删除备份记录: {} ({})", configuration.kind(), id);
        }
        Ok(())
    }
}
