//! 锁定编排：应用（失败即停）与回滚（尽力而为）。
//!
//! 应用流程（[`LockdownOperation::perform`]）：
//! 1) 生成新的分组 ID（丢弃上一次的）
//! 2) 由设置生成固定顺序的锁定计划
//! 3) 逐项：创建 → 初始化 → 保存备份 → 禁用/启用 → 成功则监控，失败立即终止
//!
//! 回滚流程（[`LockdownOperation::revert`]）：
//! 1) 读取分组下全部备份记录
//! 2) 逐项恢复；成功则删除记录，失败则保留记录并继续下一项
//!
//! 应用遇错即停；回滚遇错继续，未恢复的记录留待下次重试。
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::backup::FeatureConfigurationBackup;
use crate::factory::{self, FeatureConfigurationFactory};
use crate::feature::{DesiredState, FeatureConfiguration};
use crate::group::GroupId;
use crate::plan::LockdownPlan;
use crate::settings::SessionConfiguration;

/// 编排结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    Success,
    Failed,
}

impl OperationResult {
    fn from_success(success: bool) -> Self {
        if success {
            OperationResult::Success
        } else {
            OperationResult::Failed
        }
    }

    pub fn is_success(self) -> bool {
        self == OperationResult::Success
    }
}

/// 锁定编排器。
///
/// 状态：
/// - `group_id = None`：尚未执行过锁定（或未恢复持久化的分组）
/// - `group_id = Some(..)`：最近一次 `perform` 生成的分组，或通过 [`LockdownOperation::with_group`] 注入
///
/// 同一实例同一时刻只允许一个应用或回滚过程（方法需要 `&mut self`）。
pub struct LockdownOperation {
    backup: Arc<dyn FeatureConfigurationBackup>,
    factory: Arc<dyn FeatureConfigurationFactory>,
    group_id: Option<GroupId>,
}

impl LockdownOperation {
    pub fn new(backup: Arc<dyn FeatureConfigurationBackup>, factory: Arc<dyn FeatureConfigurationFactory>) -> Self {
        Self {
            backup,
            factory,
            group_id: None,
        }
    }

    /// 以已持久化的分组 ID 重建编排器（用于进程重启后的回滚）。
    pub fn with_group(
        backup: Arc<dyn FeatureConfigurationBackup>,
        factory: Arc<dyn FeatureConfigurationFactory>,
        group_id: GroupId,
    ) -> Self {
        Self {
            backup,
            factory,
            group_id: Some(group_id),
        }
    }

    /// 当前持有的分组 ID。
    pub fn group_id(&self) -> Option<GroupId> {
        self.group_id
    }

    /// 执行锁定。
    ///
    /// 参数：
    /// - `session`：会话配置（目标用户 + 锁定开关）
    ///
    /// 返回值：
    /// - `Success`：全部功能均配置成功
    /// - `Failed`：某一项失败，后续项未处理；已处理项的备份记录保留，可随后回滚
    pub fn perform(&mut self, session: &SessionConfiguration) -> OperationResult {
        let group_id = GroupId::new();
        self.group_id = Some(group_id);

        let plan = LockdownPlan::from_settings(&session.settings);
        info!(
            "开始执行锁定（功能配置分组: {group_id}，共 {} 项，禁用 {} 项）...",
            plan.entries().len(),
            plan.disabled_count()
        );

        let mut success = true;
        for &(kind, desired) in plan.entries() {
            let configuration = factory::create(self.factory.as_ref(), kind, group_id, &session.user);
            if !self.set_configuration(configuration, desired) {
                success = false;
                break;
            }
        }

        if success {
            info!("锁定成功");
        } else {
            error!("锁定失败（功能配置分组: {group_id}）！");
        }
        OperationResult::from_success(success)
    }

    /// 回滚当前分组的锁定。
    ///
    /// 返回值：
    /// - `Success`：全部记录均恢复并删除（或没有需要回滚的分组）
    /// - `Failed`：至少一项恢复失败或存储读取失败；失败项的记录保留
    pub fn revert(&mut self) -> OperationResult {
        let Some(group_id) = self.group_id else {
            warn!("没有可回滚的功能配置分组，跳过回滚");
            return OperationResult::Success;
        };

        info!("开始回滚锁定（功能配置分组: {group_id}）...");

        let configurations = match self.backup.get_by(group_id) {
            Ok(configurations) => configurations,
            Err(e) => {
                error!("读取功能配置分组 {group_id} 的备份失败: {e}");
                warn!("锁定回滚失败！");
                return OperationResult::Failed;
            }
        };

        let success = restore_all(self.backup.as_ref(), configurations);
        if success {
            info!("锁定回滚成功");
        } else {
            warn!("锁定回滚失败（功能配置分组: {group_id}）！");
        }
        OperationResult::from_success(success)
    }

    fn set_configuration(&self, mut configuration: Box<dyn FeatureConfiguration>, desired: DesiredState) -> bool {
        configuration.initialize();

        // 备份必须先于系统修改落盘。
        if let Err(e) = self.backup.save(configuration.as_ref()) {
            error!(
                "保存功能配置备份失败: {} ({}): {e}",
                configuration.kind(),
                configuration.id()
            );
            return false;
        }

        let success = match desired {
            DesiredState::Disabled => configuration.disable_feature(),
            DesiredState::Enabled => configuration.enable_feature(),
        };

        if success {
            configuration.monitor();
        } else {
            error!(
                "配置功能失败: {} ({}, 分组 {})！",
                configuration.kind(),
                configuration.id(),
                configuration.group_id()
            );
        }
        success
    }
}

/// 异常退出后的整体恢复：恢复存储中的全部记录（不区分分组）。
///
/// 策略与 [`LockdownOperation::revert`] 相同：逐项恢复，失败不终止。
pub struct RestoreOperation {
    backup: Arc<dyn FeatureConfigurationBackup>,
}

impl RestoreOperation {
    pub fn new(backup: Arc<dyn FeatureConfigurationBackup>) -> Self {
        Self { backup }
    }

    pub fn perform(&mut self) -> OperationResult {
        let configurations = match self.backup.get_all() {
            Ok(configurations) => configurations,
            Err(e) => {
                error!("读取功能配置备份失败: {e}");
                return OperationResult::Failed;
            }
        };

        if configurations.is_empty() {
            info!("没有遗留的功能配置需要恢复");
            return OperationResult::Success;
        }

        info!("开始恢复 {} 项遗留的功能配置...", configurations.len());
        let success = restore_all(self.backup.as_ref(), configurations);
        if success {
            info!("遗留功能配置恢复成功");
        } else {
            warn!("遗留功能配置恢复失败！");
        }
        OperationResult::from_success(success)
    }
}

/// 逐项恢复并删除成功项的备份记录。返回是否全部成功。
fn restore_all(backup: &dyn FeatureConfigurationBackup, configurations: Vec<Box<dyn FeatureConfiguration>>) -> bool {
    let mut success = true;
    for mut configuration in configurations {
        if !configuration.restore() {
            error!(
                "恢复功能配置失败: {} ({}, 分组 {})！",
                configuration.kind(),
                configuration.id(),
                configuration.group_id()
            );
            success = false;
            continue;
        }
        if let Err(e) = backup.delete(configuration.as_ref()) {
            error!(
                "删除功能配置备份失败: {} ({}, 分组 {}): {e}",
                configuration.kind(),
                configuration.id(),
                configuration.group_id()
            );
            success = false;
        }
    }
    success
}
