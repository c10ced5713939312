//! Windows 服务运行状态控制（基于 `windows-service` crate）。
//!
//! 用途：
//! - 禁用 Windows 更新时停止 `wuauserv` 服务（启动类型由注册表策略值控制）
//! - 恢复时若服务原本在运行则重新启动
//!
//! 权限要求：
//! - 停止/启动系统服务需要管理员权限
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::ffi::OsStr;

use anyhow::{Context, Result};
use windows_service::service::{ServiceAccess, ServiceState};
use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

/// 1062 = ERROR_SERVICE_NOT_ACTIVE：服务本来就没有运行。
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;
/// 1056 = ERROR_SERVICE_ALREADY_RUNNING。
const ERROR_SERVICE_ALREADY_RUNNING: i32 = 1056;

fn open(service_name: &str, access: ServiceAccess) -> Result<windows_service::service::Service> {
    let service_manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)
        .context("打开 ServiceManager 失败")?;
    service_manager
        .open_service(service_name, access)
        .with_context(|| format!("打开服务失败: {service_name}"))
}

/// 查询服务是否正在运行（含启动中）。
pub fn is_running(service_name: &str) -> Result<bool> {
    let service = open(service_name, ServiceAccess::QUERY_STATUS)?;
    let status = service
        .query_status()
        .with_context(|| format!("查询服务状态失败: {service_name}"))?;
    Ok(matches!(
        status.current_state,
        ServiceState::Running | ServiceState::StartPending | ServiceState::ContinuePending
    ))
}

/// 停止服务。
///
/// 异常处理：
/// - 服务未运行视为成功
/// - 其他失败（权限不足、服务拒绝停止）返回错误
pub fn stop(service_name: &str) -> Result<()> {
    let service = open(service_name, ServiceAccess::STOP)?;
    match service.stop() {
        Ok(_) => Ok(()),
        Err(windows_service::Error::Winapi(e)) if e.raw_os_error() == Some(ERROR_SERVICE_NOT_ACTIVE) => Ok(()),
        Err(e) => Err(e).with_context(|| format!("停止服务失败: {service_name}")),
    }
}

/// 启动服务。
///
/// 异常处理：
/// - 服务已在运行视为成功
pub fn start(service_name: &str) -> Result<()> {
    let service = open(service_name, ServiceAccess::START)?;
    match service.start(&[] as &[&OsStr]) {
        Ok(()) => Ok(()),
        Err(windows_service::Error::Winapi(e)) if e.raw_os_error() == Some(ERROR_SERVICE_ALREADY_RUNNING) => Ok(()),
        Err(e) => Err(e).with_context(|| format!("启动服务失败: {service_name}")),
    }
}
