//! 基于注册表策略值（及可选系统服务）的功能配置。
//!
//! 行为：
//! - `initialize`：读取每个策略值的当前状态（存在的值 / 不存在），以及服务是否在运行
//! - `disable_feature` / `enable_feature`：写入策略值；禁用时额外停止关联服务
//! - `monitor`：登记漂移监控
//! - `restore`：停止监控，写回原值（原本不存在则删除），服务原本在运行则重新启动
//!
//! 约束：
//! - 未成功捕获原始状态时拒绝修改系统（返回 `false`）
//! - 因此对“未初始化/未修改”的配置调用 `restore` 是安全的空操作
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::sync::Arc;
use std::time::Duration;

use lockdown_core::{BackupRecord, DesiredState, FeatureConfiguration, FeatureKind, GroupId, UserIdentity};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::monitor::{MonitorRegistry, MonitorTarget};
use crate::policy::{self, FeaturePolicy};
use crate::registry::{self, RegistryData, RegistryLocation, ValueSpec};
use crate::service;

/// 单个策略值的原始状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedValue {
    pub location: RegistryLocation,
    #[serde(default)]
    pub original: Option<RegistryData>,
}

/// 服务的原始运行状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedService {
    pub name: String,
    pub was_running: bool,
}

/// `initialize` 捕获的全部原始状态（持久化到备份记录的 `state` 字段）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub values: Vec<CapturedValue>,
    #[serde(default)]
    pub service: Option<CapturedService>,
}

/// Windows 功能配置。
pub struct WindowsFeatureConfiguration {
    id: Uuid,
    group_id: GroupId,
    kind: FeatureKind,
    identity: Option<UserIdentity>,
    policy: FeaturePolicy,
    snapshot: Option<Snapshot>,
    /// 备份记录中的原始状态无法解析：拒绝恢复，保留记录等待人工处理。
    unreadable: bool,
    applied: Option<DesiredState>,
    monitors: Arc<MonitorRegistry>,
    monitor_interval: Duration,
}

impl WindowsFeatureConfiguration {
    /// 创建未初始化的配置（策略由功能类型与目标用户决定）。
    pub fn new(
        kind: FeatureKind,
        group_id: GroupId,
        identity: Option<UserIdentity>,
        monitors: Arc<MonitorRegistry>,
        monitor_interval: Duration,
    ) -> Self {
        let policy = policy::for_kind(kind, identity.as_ref());
        Self::with_policy(kind, group_id, identity, policy, monitors, monitor_interval)
    }

    /// 使用自定义策略创建配置（用于测试或特殊部署）。
    pub fn with_policy(
        kind: FeatureKind,
        group_id: GroupId,
        identity: Option<UserIdentity>,
        policy: FeaturePolicy,
        monitors: Arc<MonitorRegistry>,
        monitor_interval: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            kind,
            identity,
            policy,
            snapshot: None,
            unreadable: false,
            applied: None,
            monitors,
            monitor_interval,
        }
    }

    /// 由备份记录重建（携带原始状态，不再重新捕获）。
    pub fn from_record(record: BackupRecord, monitors: Arc<MonitorRegistry>, monitor_interval: Duration) -> Self {
        let policy = policy::for_kind(record.kind, record.identity.as_ref());
        let (snapshot, unreadable) = match serde_json::from_value::<Option<Snapshot>>(record.state) {
            Ok(snapshot) => (snapshot, false),
            Err(e) => {
                error!("备份记录中的原始状态无法解析: {} ({}): {e}", record.kind, record.id);
                (None, true)
            }
        };
        Self {
            id: record.id,
            group_id: record.group_id,
            kind: record.kind,
            identity: record.identity,
            policy,
            snapshot,
            unreadable,
            applied: None,
            monitors,
            monitor_interval,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    fn capture(&self) -> anyhow::Result<Snapshot> {
        let mut values = Vec::with_capacity(self.policy.values.len());
        for value in &self.policy.values {
            values.push(CapturedValue {
                location: value.location.clone(),
                original: registry::read_value(&value.location)?,
            });
        }
        let service = match &self.policy.service {
            Some(name) => Some(CapturedService {
                name: name.clone(),
                was_running: service::is_running(name)?,
            }),
            None => None,
        };
        Ok(Snapshot { values, service })
    }

    fn apply(&mut self, desired: DesiredState) -> bool {
        if self.snapshot.is_none() {
            error!("未捕获原始状态，拒绝修改系统: {} ({})", self.kind, self.id);
            return false;
        }
        if self.policy.values.is_empty() {
            error!("功能没有可用的策略（可能缺少目标用户）: {} ({})", self.kind, self.id);
            return false;
        }

        for value in &self.policy.values {
            if let Err(e) = registry::apply(&value.location, value.value_for(desired)) {
                error!("写入策略失败: {} {}: {e:#}", self.kind, value.location);
                return false;
            }
        }

        if desired == DesiredState::Disabled {
            if let Some(name) = &self.policy.service {
                if let Err(e) = service::stop(name) {
                    error!("停止服务失败: {} {name}: {e:#}", self.kind);
                    return false;
                }
            }
        }

        self.applied = Some(desired);
        true
    }
}

impl FeatureConfiguration for WindowsFeatureConfiguration {
    fn id(&self) -> Uuid {
        self.id
    }

    fn group_id(&self) -> GroupId {
        self.group_id
    }

    fn kind(&self) -> FeatureKind {
        self.kind
    }

    fn identity(&self) -> Option<&UserIdentity> {
        self.identity.as_ref()
    }

    fn initialize(&mut self) {
        match self.capture() {
            Ok(snapshot) => self.snapshot = Some(snapshot),
            Err(e) => warn!("捕获原始状态失败: {} ({}): {e:#}", self.kind, self.id),
        }
    }

    fn enable_feature(&mut self) -> bool {
        self.apply(DesiredState::Enabled)
    }

    fn disable_feature(&mut self) -> bool {
        self.apply(DesiredState::Disabled)
    }

    fn monitor(&mut self) {
        let Some(desired) = self.applied else {
            warn!("功能尚未应用，跳过监控: {} ({})", self.kind, self.id);
            return;
        };
        let targets = self
            .policy
            .values
            .iter()
            .map(|v| MonitorTarget {
                location: v.location.clone(),
                expected: v.value_for(desired).clone(),
            })
            .collect();
        self.monitors.start(self.id, self.kind, targets, self.monitor_interval);
    }

    fn restore(&mut self) -> bool {
        self.monitors.stop(self.id);

        if self.unreadable {
            return false;
        }
        let Some(snapshot) = &self.snapshot else {
            // 未捕获原始状态时不会修改系统，无需恢复。
            return true;
        };

        let mut success = true;
        for captured in &snapshot.values {
            let target = ValueSpec::from_original(captured.original.as_ref());
            if let Err(e) = registry::apply(&captured.location, &target) {
                error!("恢复策略失败: {} {}: {e:#}", self.kind, captured.location);
                success = false;
            }
        }
        if let Some(svc) = &snapshot.service {
            if svc.was_running {
                if let Err(e) = service::start(&svc.name) {
                    error!("重新启动服务失败: {} {}: {e:#}", self.kind, svc.name);
                    success = false;
                }
            }
        }

        if success {
            self.applied = None;
        }
        success
    }

    fn to_record(&self) -> BackupRecord {
        let state = serde_json::to_value(&self.snapshot).unwrap_or_else(|e| {
            error!("序列化原始状态失败: {} ({}): {e}", self.kind, self.id);
            serde_json::Value::Null
        });
        BackupRecord::new(self.id, self.group_id, self.kind, self.identity.clone(), state)
    }
}
