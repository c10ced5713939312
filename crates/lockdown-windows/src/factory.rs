//! Windows 功能配置工厂。
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::sync::Arc;
use std::time::Duration;

use lockdown_core::{BackupRecord, FeatureConfiguration, FeatureConfigurationFactory, FeatureKind, GroupId, UserIdentity};

use crate::configuration::WindowsFeatureConfiguration;
use crate::monitor::MonitorRegistry;

/// 默认漂移监控轮询间隔。
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(2);

/// 创建 [`WindowsFeatureConfiguration`] 的工厂。
///
/// 所有由本工厂创建或重建的配置共享同一个 [`MonitorRegistry`]，
/// 因此回滚时从备份重建的实例可以停止锁定时启动的监控。
pub struct WindowsFeatureFactory {
    monitors: Arc<MonitorRegistry>,
    monitor_interval: Duration,
}

impl WindowsFeatureFactory {
    pub fn new() -> Self {
        Self::with_monitor_interval(DEFAULT_MONITOR_INTERVAL)
    }

    pub fn with_monitor_interval(monitor_interval: Duration) -> Self {
        Self {
            monitors: Arc::new(MonitorRegistry::new()),
            monitor_interval,
        }
    }

    pub fn monitors(&self) -> &Arc<MonitorRegistry> {
        &self.monitors
    }

    fn make(&self, kind: FeatureKind, group_id: GroupId, user: Option<&UserIdentity>) -> Box<dyn FeatureConfiguration> {
        Box::new(WindowsFeatureConfiguration::new(
            kind,
            group_id,
            user.cloned(),
            self.monitors.clone(),
            self.monitor_interval,
        ))
    }
}

impl Default for WindowsFeatureFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureConfigurationFactory for WindowsFeatureFactory {
    fn create_change_password_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::ChangePassword, group_id, Some(user))
    }

    fn create_chrome_notification_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::ChromeNotification, group_id, Some(user))
    }

    fn create_ease_of_access_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::EaseOfAccess, group_id, None)
    }

    fn create_lock_workstation_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::LockWorkstation, group_id, Some(user))
    }

    fn create_network_options_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::NetworkOptions, group_id, None)
    }

    fn create_power_options_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::PowerOptions, group_id, None)
    }

    fn create_remote_connection_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::RemoteConnection, group_id, None)
    }

    fn create_signout_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::Signout, group_id, Some(user))
    }

    fn create_switch_user_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::SwitchUser, group_id, None)
    }

    fn create_task_manager_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::TaskManager, group_id, Some(user))
    }

    fn create_vmware_overlay_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::VmwareOverlay, group_id, Some(user))
    }

    fn create_windows_update_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::WindowsUpdate, group_id, None)
    }

    fn load(&self, record: BackupRecord) -> Box<dyn FeatureConfiguration> {
        Box::new(WindowsFeatureConfiguration::from_record(
            record,
            self.monitors.clone(),
            self.monitor_interval,
        ))
    }
}
