//! 管理员权限检测。
//!
//! 锁定与回滚会写 HKLM、其他用户的 HKEY_USERS 配置单元并控制服务，
//! 缺少权限时应在修改任何功能之前直接拒绝，而不是让每一项都失败一次。
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use anyhow::Result;
use windows::Win32::UI::Shell::IsUserAnAdmin;

/// 测试环境下跳过权限检查的环境变量（值为 `1` 时生效）。
pub const ALLOW_NON_ADMIN_ENV: &str = "EXAM_LOCKDOWN_TEST_ALLOW_NON_ADMIN";

/// 当前进程是否以管理员权限运行。
pub fn is_running_as_admin() -> Result<bool> {
    unsafe { Ok(IsUserAnAdmin().as_bool()) }
}

/// 是否允许修改系统策略。
///
/// 返回值：
/// - 管理员运行，或设置了 [`ALLOW_NON_ADMIN_ENV`] 时为 `true`
pub fn may_modify_system() -> Result<bool> {
    if matches!(std::env::var(ALLOW_NON_ADMIN_ENV).as_deref(), Ok("1")) {
        return Ok(true);
    }
    is_running_as_admin()
}
