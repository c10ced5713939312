//! 功能配置工厂契约。
//!
//! 约定：
//! - 每种功能类型一个创建入口；按用户生效的功能额外接收目标用户身份
//! - 创建只构造对象（未初始化），不做任何 IO/系统修改
//! - 同一次锁定中的所有创建调用必须传入同一个分组 ID
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use crate::backup::BackupRecord;
use crate::feature::{FeatureConfiguration, FeatureKind, UserIdentity};
use crate::group::GroupId;

/// 功能配置工厂。
///
/// 由具体平台实现（见 `lockdown-windows`）；测试中可用记录调用参数的替身实现。
pub trait FeatureConfigurationFactory: Send + Sync {
    fn create_change_password_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration>;
    fn create_chrome_notification_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration>;
    fn create_ease_of_access_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration>;
    fn create_lock_workstation_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration>;
    fn create_network_options_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration>;
    fn create_power_options_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration>;
    fn create_remote_connection_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration>;
    fn create_signout_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration>;
    fn create_switch_user_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration>;
    fn create_task_manager_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration>;
    fn create_vmware_overlay_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration>;
    fn create_windows_update_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration>;

    /// 由备份记录重建配置实例（用于回滚/恢复）。
    ///
    /// 参数：
    /// - `record`：备份存储中读取的记录（包含捕获的原始状态）
    ///
    /// 返回值：
    /// - 已携带原始状态的配置实例；不得重新捕获系统状态
    fn load(&self, record: BackupRecord) -> Box<dyn FeatureConfiguration>;
}

/// 按功能类型分派到对应的创建入口。
///
/// 参数：
/// - `factory`：工厂实现
/// - `kind`：功能类型
/// - `group_id`：本次锁定的分组 ID
/// - `user`：目标用户（仅按用户生效的功能使用）
pub fn create(
    factory: &dyn FeatureConfigurationFactory,
    kind: FeatureKind,
    group_id: GroupId,
    user: &UserIdentity,
) -> Box<dyn FeatureConfiguration> {
    match kind {
        FeatureKind::ChangePassword => factory.create_change_password_configuration(group_id, user),
        FeatureKind::ChromeNotification => factory.create_chrome_notification_configuration(group_id, user),
        FeatureKind::EaseOfAccess => factory.create_ease_of_access_configuration(group_id),
        FeatureKind::LockWorkstation => factory.create_lock_workstation_configuration(group_id, user),
        FeatureKind::NetworkOptions => factory.create_network_options_configuration(group_id),
        FeatureKind::PowerOptions => factory.create_power_options_configuration(group_id),
        FeatureKind::RemoteConnection => factory.create_remote_connection_configuration(group_id),
        FeatureKind::Signout => factory.create_signout_configuration(group_id, user),
        FeatureKind::SwitchUser => factory.create_switch_user_configuration(group_id),
        FeatureKind::TaskManager => factory.create_task_manager_configuration(group_id, user),
        FeatureKind::VmwareOverlay => factory.create_vmware_overlay_configuration(group_id, user),
        FeatureKind::WindowsUpdate => factory.create_windows_update_configuration(group_id),
    }
}
