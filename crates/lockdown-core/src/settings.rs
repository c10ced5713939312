//! 会话配置模型（session.json）。
//!
//! 内容：
//! - 目标用户身份（按用户生效的功能使用）
//! - 每种功能一个 `disable_*` 开关（锁定开始时读取一次，决定禁用还是启用）
//!
//! 约定：
//! - 所有开关均带 `#[serde(default)]`，缺省值见 [`LockdownSettings::default`]
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feature::{FeatureKind, UserIdentity};

/// 锁定开关集合。
///
/// 缺省：除 Windows 更新外全部禁用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockdownSettings {
    pub disable_password_change: bool,
    pub disable_chrome_notifications: bool,
    pub disable_ease_of_access_options: bool,
    pub disable_user_lock: bool,
    pub disable_network_options: bool,
    pub disable_power_options: bool,
    pub disable_remote_connections: bool,
    pub disable_signout: bool,
    pub disable_user_switch: bool,
    pub disable_task_manager: bool,
    pub disable_vmware_overlay: bool,
    pub disable_windows_update: bool,
}

impl Default for LockdownSettings {
    fn default() -> Self {
        Self {
            disable_password_change: true,
            disable_chrome_notifications: true,
            disable_ease_of_access_options: true,
            disable_user_lock: true,
            disable_network_options: true,
            disable_power_options: true,
            disable_remote_connections: true,
            disable_signout: true,
            disable_user_switch: true,
            disable_task_manager: true,
            disable_vmware_overlay: true,
            disable_windows_update: false,
        }
    }
}

impl LockdownSettings {
    /// 所有开关均为 `false`（即全部启用）的设置。
    pub fn enable_all() -> Self {
        Self::uniform(false)
    }

    /// 所有开关均为 `true`（即全部禁用）的设置。
    pub fn disable_all() -> Self {
        Self::uniform(true)
    }

    fn uniform(disable: bool) -> Self {
        Self {
            disable_password_change: disable,
            disable_chrome_notifications: disable,
            disable_ease_of_access_options: disable,
            disable_user_lock: disable,
            disable_network_options: disable,
            disable_power_options: disable,
            disable_remote_connections: disable,
            disable_signout: disable,
            disable_user_switch: disable,
            disable_task_manager: disable,
            disable_vmware_overlay: disable,
            disable_windows_update: disable,
        }
    }

    /// 查询指定功能是否需要禁用。
    pub fn disables(&self, kind: FeatureKind) -> bool {
        match kind {
            FeatureKind::ChangePassword => self.disable_password_change,
            FeatureKind::ChromeNotification => self.disable_chrome_notifications,
            FeatureKind::EaseOfAccess => self.disable_ease_of_access_options,
            FeatureKind::LockWorkstation => self.disable_user_lock,
            FeatureKind::NetworkOptions => self.disable_network_options,
            FeatureKind::PowerOptions => self.disable_power_options,
            FeatureKind::RemoteConnection => self.disable_remote_connections,
            FeatureKind::Signout => self.disable_signout,
            FeatureKind::SwitchUser => self.disable_user_switch,
            FeatureKind::TaskManager => self.disable_task_manager,
            FeatureKind::VmwareOverlay => self.disable_vmware_overlay,
            FeatureKind::WindowsUpdate => self.disable_windows_update,
        }
    }
}

/// 一次受监考会话的配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfiguration {
    /// 目标用户（考生登录的账户）。
    pub user: UserIdentity,
    #[serde(default)]
    /// 锁定开关。
    pub settings: LockdownSettings,
}

/// 会话配置读取错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取会话配置失败: {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("解析会话配置 JSON 失败: {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("会话配置缺少用户 SID")]
    MissingSid,
}

impl SessionConfiguration {
    /// 读取并解析会话配置文件（JSON）。
    ///
    /// 参数：
    /// - `path`：配置文件路径
    ///
    /// 异常处理：
    /// - 文件读取失败、JSON 解析失败、SID 为空时返回 [`ConfigError`]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: SessionConfiguration = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        if config.user.sid.trim().is_empty() {
            return Err(ConfigError::MissingSid);
        }
        Ok(config)
    }
}
