//! 考试锁定服务的数据文件位置。
//!
//! 所有落盘数据放在 `%ProgramData%\ExamLockdown` 下：
//! - `feature-backup.json`：锁定前的功能原始值，回滚与恢复依赖它
//! - `session-state.json`：最近一次锁定的分组 ID 与结果
//!
//! 锁定、回滚、恢复可能由不同进程执行（含重启后的恢复），三者必须从这里取路径。
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// 数据目录在 ProgramData 下的名称。
pub const VENDOR_DIR: &str = "ExamLockdown";

const BACKUP_FILE_NAME: &str = "feature-backup.json";
const SESSION_STATE_FILE_NAME: &str = "session-state.json";

/// 服务数据目录：`%ProgramData%\ExamLockdown`。
///
/// 异常处理：
/// - 进程环境中没有 `ProgramData`（非 Windows 或被清空的环境）时报错，不回退到当前目录
pub fn program_data_dir() -> Result<PathBuf> {
    let program_data = std::env::var_os("ProgramData").context("未设置 ProgramData 环境变量，无法定位数据目录")?;
    Ok(data_dir_in(Path::new(&program_data)))
}

/// 给定 ProgramData 根目录时的数据目录。
pub fn data_dir_in(program_data: &Path) -> PathBuf {
    program_data.join(VENDOR_DIR)
}

/// 按需创建 `path` 及其缺失的上级目录；已存在时不做任何事。
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("无法创建数据目录: {}", path.display()))
}

/// 默认功能配置备份文件：`%ProgramData%\ExamLockdown\feature-backup.json`。
pub fn default_backup_file() -> Result<PathBuf> {
    Ok(program_data_dir()?.join(BACKUP_FILE_NAME))
}

/// 默认会话状态文件：`%ProgramData%\ExamLockdown\session-state.json`。
pub fn default_session_state_file() -> Result<PathBuf> {
    Ok(program_data_dir()?.join(SESSION_STATE_FILE_NAME))
}
