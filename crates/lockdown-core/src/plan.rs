//! 锁定计划：由设置生成的有序（功能类型 → 期望状态）表。
//!
//! 计划只描述“做什么”，由 [`crate::operation::LockdownOperation`] 负责“怎么做”。
//! 顺序固定为 [`FeatureKind::ALL`]，不允许重排或并行。
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use crate::feature::{DesiredState, FeatureKind};
use crate::settings::LockdownSettings;

/// 有序锁定计划。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockdownPlan {
    entries: Vec<(FeatureKind, DesiredState)>,
}

impl LockdownPlan {
    /// 根据设置生成计划（每种功能恰好一项）。
    pub fn from_settings(settings: &LockdownSettings) -> Self {
        let entries = FeatureKind::ALL
            .into_iter()
            .map(|kind| (kind, DesiredState::from_disable_flag(settings.disables(kind))))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[(FeatureKind, DesiredState)] {
        &self.entries
    }

    /// 期望禁用的功能数。
    pub fn disabled_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, state)| *state == DesiredState::Disabled)
            .count()
    }
}
