//! 功能类型与功能配置能力契约。
//!
//! 约定：
//! - 每个可锁定的系统功能对应一个 [`FeatureKind`]，其声明顺序即锁定时的应用顺序
//! - 每个功能实例通过 [`FeatureConfiguration`] 暴露 初始化/启用/禁用/监控/恢复 能力
//! - 环境性失败（权限不足、功能不存在等）一律通过 `false` 返回，不得 panic
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backup::BackupRecord;
use crate::group::GroupId;

/// 可锁定的系统功能类型。
///
/// 变体顺序与 [`FeatureKind::ALL`] 一致，是锁定流程的固定应用顺序，不得调整。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// 修改密码（安全选项界面）。
    ChangePassword,
    /// Chrome 桌面通知。
    ChromeNotification,
    /// 轻松使用（辅助功能快捷入口）。
    EaseOfAccess,
    /// 锁定工作站。
    LockWorkstation,
    /// 网络选项（登录界面网络选择）。
    NetworkOptions,
    /// 电源选项（关机/重启/睡眠）。
    PowerOptions,
    /// 远程连接（远程桌面）。
    RemoteConnection,
    /// 注销。
    Signout,
    /// 切换用户。
    SwitchUser,
    /// 任务管理器。
    TaskManager,
    /// VMware 客户端覆盖层。
    VmwareOverlay,
    /// Windows 更新。
    WindowsUpdate,
}

impl FeatureKind {
    /// 全部功能类型（按锁定应用顺序）。
    pub const ALL: [FeatureKind; 12] = [
        FeatureKind::ChangePassword,
        FeatureKind::ChromeNotification,
        FeatureKind::EaseOfAccess,
        FeatureKind::LockWorkstation,
        FeatureKind::NetworkOptions,
        FeatureKind::PowerOptions,
        FeatureKind::RemoteConnection,
        FeatureKind::Signout,
        FeatureKind::SwitchUser,
        FeatureKind::TaskManager,
        FeatureKind::VmwareOverlay,
        FeatureKind::WindowsUpdate,
    ];

    /// 是否为按用户生效的功能（需要目标用户身份）。
    ///
    /// 返回值：
    /// - `true`：配置写入目标用户的注册表配置单元
    /// - `false`：整机生效
    pub fn is_per_user(self) -> bool {
        matches!(
            self,
            FeatureKind::ChangePassword
                | FeatureKind::ChromeNotification
                | FeatureKind::LockWorkstation
                | FeatureKind::Signout
                | FeatureKind::TaskManager
                | FeatureKind::VmwareOverlay
        )
    }

    /// 稳定的标识名（用于日志与持久化展示）。
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureKind::ChangePassword => "change_password",
            FeatureKind::ChromeNotification => "chrome_notification",
            FeatureKind::EaseOfAccess => "ease_of_access",
            FeatureKind::LockWorkstation => "lock_workstation",
            FeatureKind::NetworkOptions => "network_options",
            FeatureKind::PowerOptions => "power_options",
            FeatureKind::RemoteConnection => "remote_connection",
            FeatureKind::Signout => "signout",
            FeatureKind::SwitchUser => "switch_user",
            FeatureKind::TaskManager => "task_manager",
            FeatureKind::VmwareOverlay => "vmware_overlay",
            FeatureKind::WindowsUpdate => "windows_update",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 期望的功能状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredState {
    Enabled,
    Disabled,
}

impl DesiredState {
    /// 由设置中的 `disable_*` 开关得到期望状态。
    pub fn from_disable_flag(disable: bool) -> Self {
        if disable {
            DesiredState::Disabled
        } else {
            DesiredState::Enabled
        }
    }
}

/// 目标用户身份（按用户生效的功能需要）。
///
/// 字段说明：
/// - `sid`：用户安全标识符（用于定位 `HKEY_USERS\<sid>`）
/// - `user_name`：用户名（仅用于日志与排障）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub sid: String,
    pub user_name: String,
}

/// 单个系统功能的配置能力。
///
/// 生命周期：
/// 1) 由工厂创建（未初始化）
/// 2) [`initialize`](FeatureConfiguration::initialize) 捕获当前系统状态
/// 3) 备份存储保存（在修改系统之前）
/// 4) [`disable_feature`](FeatureConfiguration::disable_feature) 或
///    [`enable_feature`](FeatureConfiguration::enable_feature) 修改系统状态
/// 5) 成功后 [`monitor`](FeatureConfiguration::monitor) 开始监控漂移
/// 6) 回滚时 [`restore`](FeatureConfiguration::restore) 写回捕获的原始状态
///
/// 实现要求：
/// - 所有方法都不得因环境性失败 panic，失败通过 `false` 返回
/// - `restore` 必须在“已初始化并保存、但修改从未生效”的情况下也能安全调用
pub trait FeatureConfiguration: Send {
    /// 配置实例 ID（备份记录主键）。
    fn id(&self) -> Uuid;

    /// 所属锁定分组。
    fn group_id(&self) -> GroupId;

    fn kind(&self) -> FeatureKind;

    /// 目标用户（整机功能为 `None`）。
    fn identity(&self) -> Option<&UserIdentity>;

    /// 捕获当前系统状态，供之后恢复使用。每个生命周期只调用一次。
    fn initialize(&mut self);

    /// 启用功能。返回是否成功。
    fn enable_feature(&mut self) -> bool;

    /// 禁用功能。返回是否成功。
    fn disable_feature(&mut self) -> bool;

    /// 开始监控配置漂移（仅在启用/禁用成功后调用）。
    fn monitor(&mut self);

    /// 写回捕获的原始状态。返回是否成功。
    fn restore(&mut self) -> bool;

    /// 导出当前状态，用于持久化到备份存储。
    fn to_record(&self) -> BackupRecord;
}
