//! 考试锁定服务命令行入口。
//!
//! 职责：
//! - `perform`：读取会话配置，按锁定计划逐项加固系统，并落盘 `session-state.json`
//! - `revert`：按分组 ID 回滚（默认取会话状态文件中的分组）
//! - `recover`：异常退出后按备份存储整体恢复（不区分分组）
//! - `status` / `doctor`：只读查询与环境自检
//!
//! 权限要求：
//! - `perform` / `revert` / `recover` 需要管理员权限（写 HKLM、HKEY_USERS，控制服务）
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use lockdown_core::state::{SessionLock, SessionState};
use lockdown_core::{
    paths, FeatureConfigurationFactory, FileBackup, GroupId, LockdownOperation, OperationResult, RestoreOperation,
    SessionConfiguration,
};
use tracing::{info, warn};

/// 命令行参数。
///
/// 说明：
/// - `backup_file` / `state_file` 覆盖 ProgramData 下的默认路径（测试与排障用）
#[derive(Debug, Parser)]
#[command(name = "lockdown-service", version)]
struct Cli {
    #[arg(long, global = true)]
    backup_file: Option<PathBuf>,

    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// 支持的子命令。
#[derive(Debug, Subcommand)]
enum Commands {
    /// 按会话配置执行锁定。
    Perform {
        /// 会话配置文件（JSON）。
        #[arg(long)]
        session: PathBuf,
        /// 锁定后保持进程（及漂移监控）运行，读到一行标准输入后回滚。
        #[arg(long, default_value_t = false)]
        hold: bool,
    },
    /// 回滚指定分组（缺省使用会话状态文件中的分组）。
    Revert {
        #[arg(long)]
        group: Option<GroupId>,
    },
    /// 恢复备份存储中的全部记录（异常退出后使用）。
    Recover,
    /// 输出会话状态与待恢复的备份记录。
    Status {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// 环境自检（管理员权限、数据路径）。
    Doctor,
}

/// 程序入口：初始化日志、解析参数并分发子命令。
///
/// 异常处理：
/// - 子命令失败返回 `Err`，进程以非零码退出
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Perform { session, hold } => perform(&cli, session, *hold),
        Commands::Revert { group } => revert(&cli, *group),
        Commands::Recover => recover(&cli),
        Commands::Status { json } => status(&cli, *json),
        Commands::Doctor => doctor(&cli),
    }
}

fn backup_file(cli: &Cli) -> Result<PathBuf> {
    match &cli.backup_file {
        Some(path) => Ok(path.clone()),
        None => paths::default_backup_file(),
    }
}

fn state_file(cli: &Cli) -> Result<PathBuf> {
    match &cli.state_file {
        Some(path) => Ok(path.clone()),
        None => paths::default_session_state_file(),
    }
}

#[cfg(windows)]
fn is_admin() -> Result<bool> {
    lockdown_windows::elevation::is_running_as_admin()
}

#[cfg(not(windows))]
fn is_admin() -> Result<bool> {
    Ok(false)
}

#[cfg(windows)]
fn ensure_admin(action: &str) -> Result<()> {
    if !lockdown_windows::elevation::may_modify_system()? {
        return Err(anyhow!("{action}需要管理员权限，请以管理员方式运行"));
    }
    Ok(())
}

#[cfg(not(windows))]
fn ensure_admin(_action: &str) -> Result<()> {
    Ok(())
}

/// 当前平台的功能配置工厂。
#[cfg(windows)]
fn platform_factory() -> Result<Arc<dyn FeatureConfigurationFactory>> {
    Ok(Arc::new(lockdown_windows::WindowsFeatureFactory::new()))
}

#[cfg(not(windows))]
fn platform_factory() -> Result<Arc<dyn FeatureConfigurationFactory>> {
    Err(anyhow!("当前平台不支持系统锁定（仅支持 Windows）"))
}

/// 取得会话锁；被其他进程（如 `perform --hold`）持有时返回错误。
fn acquire_session(state_path: &Path) -> Result<SessionLock> {
    SessionLock::try_acquire(state_path)?.ok_or_else(|| {
        anyhow!(
            "锁定会话正由另一个进程持有（如 perform --hold），请在该进程中结束考试后再试: {}",
            SessionLock::lock_path(state_path).display()
        )
    })
}

fn open_backup(cli: &Cli, factory: Arc<dyn FeatureConfigurationFactory>) -> Result<Arc<FileBackup>> {
    let path = backup_file(cli)?;
    Ok(Arc::new(FileBackup::new(path, factory)))
}

/// 执行锁定。
///
/// 主要步骤：
/// 1) 读取会话配置，取得会话锁（保持到进程结束），拒绝在未回滚的会话之上再次锁定
/// 2) 权限检查，创建平台工厂与备份存储
/// 3) 执行锁定并落盘会话状态（失败时同样落盘，便于回滚已处理的功能）
/// 4) `hold` 时等待标准输入，随后回滚
///
/// 异常处理：
/// - 锁定失败返回错误；已保存的备份记录可通过 `revert` 清理
fn perform(cli: &Cli, session_path: &Path, hold: bool) -> Result<()> {
    let session = SessionConfiguration::load(session_path)?;
    let state_path = state_file(cli)?;
    let _session_lock = acquire_session(&state_path)?;
    if let Some(pending) = SessionState::load(&state_path)? {
        return Err(anyhow!(
            "存在未回滚的锁定会话（分组 {}），请先执行 revert 或 recover",
            pending.group_id
        ));
    }

    ensure_admin("锁定")?;
    let factory = platform_factory()?;
    let backup = open_backup(cli, factory.clone())?;
    let mut operation = LockdownOperation::new(backup, factory);

    let result = operation.perform(&session);
    let group_id = operation
        .group_id()
        .ok_or_else(|| anyhow!("锁定完成后缺少分组 ID"))?;
    SessionState::new(group_id, session.user.clone(), result).persist(&state_path)?;

    if !result.is_success() {
        return Err(anyhow!("锁定失败，已处理的功能可执行 revert 回滚（分组 {group_id}）"));
    }

    if !hold {
        warn!("进程退出后漂移监控随之停止；需要持续监控请使用 --hold");
        return Ok(());
    }

    info!("锁定生效中，按回车结束考试并回滚");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).context("读取标准输入失败")?;
    finish_revert(&mut operation, &state_path, group_id)
}

/// 回滚指定分组；未指定时读取会话状态文件。
///
/// 会话锁被 `perform --hold` 进程持有时拒绝执行：该进程的漂移监控仍在运行，会重新写回锁定值。
fn revert(cli: &Cli, group: Option<GroupId>) -> Result<()> {
    let state_path = state_file(cli)?;
    let _session_lock = acquire_session(&state_path)?;
    let group_id = match group {
        Some(group_id) => group_id,
        None => match SessionState::load(&state_path)? {
            Some(state) => state.group_id,
            None => {
                info!("没有需要回滚的锁定会话");
                return Ok(());
            }
        },
    };

    ensure_admin("回滚")?;
    let factory = platform_factory()?;
    let backup = open_backup(cli, factory.clone())?;
    let mut operation = LockdownOperation::with_group(backup, factory, group_id);
    finish_revert(&mut operation, &state_path, group_id)
}

/// 执行回滚；成功且会话状态指向同一分组时清除状态文件。
fn finish_revert(operation: &mut LockdownOperation, state_path: &Path, group_id: GroupId) -> Result<()> {
    match operation.revert() {
        OperationResult::Success => {
            let same_group = SessionState::load(state_path)?.is_some_and(|s| s.group_id == group_id);
            if same_group {
                SessionState::clear(state_path)?;
            }
            Ok(())
        }
        OperationResult::Failed => Err(anyhow!("回滚未全部完成，失败的记录已保留，可再次执行 revert 重试")),
    }
}

/// 恢复备份存储中的全部记录。
///
/// 异常处理：
/// - 会话锁被其他进程持有时返回错误
/// - 有记录恢复失败时返回错误（记录保留，可重复执行）
fn recover(cli: &Cli) -> Result<()> {
    let state_path = state_file(cli)?;
    let _session_lock = acquire_session(&state_path)?;
    ensure_admin("恢复")?;
    let factory = platform_factory()?;
    let backup = open_backup(cli, factory)?;

    match RestoreOperation::new(backup).perform() {
        OperationResult::Success => {
            SessionState::clear(&state_path)?;
            Ok(())
        }
        OperationResult::Failed => Err(anyhow!("恢复未全部完成，失败的记录已保留")),
    }
}

/// 输出会话状态与待恢复记录（只读，不需要管理员权限）。
fn status(cli: &Cli, json: bool) -> Result<()> {
    let state = SessionState::load(&state_file(cli)?)?;
    let records = FileBackup::read_records_at(&backup_file(cli)?)?;

    if json {
        let out = serde_json::json!({
            "session": state,
            "pending_records": records,
        });
        println!("{}", serde_json::to_string_pretty(&out).context("序列化状态失败")?);
        return Ok(());
    }

    match &state {
        Some(state) => {
            println!("session_group = {}", state.group_id);
            println!("session_user = {} ({})", state.user.user_name, state.user.sid);
            println!("session_result = {:?}", state.result);
        }
        None => println!("session_group = none"),
    }
    println!("pending_records = {}", records.len());

    let mut by_group: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for record in &records {
        by_group
            .entry(record.group_id.to_string())
            .or_default()
            .push(record.kind.to_string());
    }
    for (group, kinds) in by_group {
        println!("{group} = {}", kinds.join(","));
    }
    Ok(())
}

/// 环境自检（用于排障）。
fn doctor(cli: &Cli) -> Result<()> {
    println!("admin = {}", is_admin()?);
    println!("windows = {}", cfg!(windows));
    let backup = backup_file(cli)?;
    println!("backup_file = {}", backup.display());
    println!("backup_file_exists = {}", backup.exists());
    let state = state_file(cli)?;
    println!("state_file = {}", state.display());
    println!("state_file_exists = {}", state.exists());
    Ok(())
}
