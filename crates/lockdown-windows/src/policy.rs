//! 功能类型到系统策略的映射表。
//!
//! 每种功能由若干注册表策略值（以及可选的系统服务）实现：
//! - `disabled`：锁定时写入的值
//! - `enabled`：明确启用时写入的值（多数为“删除策略值”，即恢复系统默认行为）
//!
//! 按用户生效的功能写入 `HKEY_USERS\<sid>\...`，整机功能写入 HKLM。
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use lockdown_core::{DesiredState, FeatureKind, UserIdentity};

use crate::registry::{RegistryHive, RegistryLocation, ValueSpec};

const POLICIES_SYSTEM: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Policies\\System";
const POLICIES_EXPLORER: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Policies\\Explorer";

/// 轻松使用入口被重定向到的（不存在的）调试器程序。
pub const BLOCKED_DEBUGGER: &str = "ExamLockdownBlocked.exe";

/// Windows 更新服务名。
pub const WINDOWS_UPDATE_SERVICE: &str = "wuauserv";

/// 单个策略值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyValue {
    pub location: RegistryLocation,
    pub disabled: ValueSpec,
    pub enabled: ValueSpec,
}

impl PolicyValue {
    pub fn new(location: RegistryLocation, disabled: ValueSpec, enabled: ValueSpec) -> Self {
        Self {
            location,
            disabled,
            enabled,
        }
    }

    pub fn value_for(&self, desired: DesiredState) -> &ValueSpec {
        match desired {
            DesiredState::Disabled => &self.disabled,
            DesiredState::Enabled => &self.enabled,
        }
    }
}

/// 一种功能的完整策略。
///
/// 字段说明：
/// - `values`：需要写入的注册表值
/// - `service`：禁用时需要停止的服务（仅 Windows 更新）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeaturePolicy {
    pub values: Vec<PolicyValue>,
    pub service: Option<String>,
}

impl FeaturePolicy {
    fn values(values: Vec<PolicyValue>) -> Self {
        Self { values, service: None }
    }
}

/// 构造指定功能的策略。
///
/// 参数：
/// - `kind`：功能类型
/// - `user`：目标用户（按用户生效的功能需要；缺失时返回空策略，应用会失败）
pub fn for_kind(kind: FeatureKind, user: Option<&UserIdentity>) -> FeaturePolicy {
    if kind.is_per_user() {
        let Some(user) = user else {
            return FeaturePolicy::default();
        };
        let user_value = |key: &str, name: &str, disabled: ValueSpec| {
            PolicyValue::new(
                RegistryLocation::new(RegistryHive::Users, format!("{}\\{}", user.sid, key), name),
                disabled,
                ValueSpec::Absent,
            )
        };
        return FeaturePolicy::values(match kind {
            FeatureKind::ChangePassword => vec![user_value(POLICIES_SYSTEM, "DisableChangePassword", ValueSpec::dword(1))],
            FeatureKind::ChromeNotification => vec![user_value(
                "Software\\Policies\\Google\\Chrome",
                "DefaultNotificationsSetting",
                ValueSpec::dword(2),
            )],
            FeatureKind::LockWorkstation => vec![user_value(POLICIES_SYSTEM, "DisableLockWorkstation", ValueSpec::dword(1))],
            FeatureKind::Signout => vec![user_value(POLICIES_EXPLORER, "StartMenuLogOff", ValueSpec::dword(1))],
            FeatureKind::TaskManager => vec![user_value(POLICIES_SYSTEM, "DisableTaskMgr", ValueSpec::dword(1))],
            FeatureKind::VmwareOverlay => vec![user_value(
                "Software\\VMware, Inc.\\VMware VDM\\Client",
                "EnableShade",
                ValueSpec::sz("false"),
            )],
            _ => Vec::new(),
        });
    }

    let machine_value = |key: &str, name: &str, disabled: ValueSpec, enabled: ValueSpec| {
        PolicyValue::new(RegistryLocation::new(RegistryHive::LocalMachine, key, name), disabled, enabled)
    };
    match kind {
        FeatureKind::EaseOfAccess => FeaturePolicy::values(vec![machine_value(
            "SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion\\Image File Execution Options\\Utilman.exe",
            "Debugger",
            ValueSpec::sz(BLOCKED_DEBUGGER),
            ValueSpec::Absent,
        )]),
        FeatureKind::NetworkOptions => FeaturePolicy::values(vec![machine_value(
            "SOFTWARE\\Policies\\Microsoft\\Windows\\System",
            "DontDisplayNetworkSelectionUI",
            ValueSpec::dword(1),
            ValueSpec::Absent,
        )]),
        FeatureKind::PowerOptions => FeaturePolicy::values(vec![machine_value(
            POLICIES_EXPLORER,
            "NoClose",
            ValueSpec::dword(1),
            ValueSpec::Absent,
        )]),
        FeatureKind::RemoteConnection => FeaturePolicy::values(vec![machine_value(
            "SYSTEM\\CurrentControlSet\\Control\\Terminal Server",
            "fDenyTSConnections",
            ValueSpec::dword(1),
            ValueSpec::dword(0),
        )]),
        FeatureKind::SwitchUser => FeaturePolicy::values(vec![machine_value(
            POLICIES_SYSTEM,
            "HideFastUserSwitching",
            ValueSpec::dword(1),
            ValueSpec::Absent,
        )]),
        // Start: 3 = 手动, 4 = 禁用
        FeatureKind::WindowsUpdate => FeaturePolicy {
            values: vec![machine_value(
                "SYSTEM\\CurrentControlSet\\Services\\wuauserv",
                "Start",
                ValueSpec::dword(4),
                ValueSpec::dword(3),
            )],
            service: Some(WINDOWS_UPDATE_SERVICE.to_string()),
        },
        _ => FeaturePolicy::default(),
    }
}
