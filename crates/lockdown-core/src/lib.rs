//! 考试锁定服务核心库（平台无关）。
//!
//! 功能：
//! - 定义锁定分组（group）、功能类型与会话配置模型
//! - 定义功能配置能力契约、工厂契约与备份存储契约
//! - 提供锁定编排（按序应用 + 失败即停）与回滚编排（尽力而为）
//! - 提供基于 JSON 文件的持久化备份存储，支持进程重启后的恢复
//! - 提供统一路径与目录约定（ProgramData 等）
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

pub mod backup;
pub mod factory;
pub mod feature;
pub mod group;
pub mod operation;
pub mod paths;
pub mod plan;
pub mod settings;
pub mod state;

pub use backup::{BackupError, BackupRecord, FeatureConfigurationBackup, FileBackup};
pub use factory::FeatureConfigurationFactory;
pub use feature::{DesiredState, FeatureConfiguration, FeatureKind, UserIdentity};
pub use group::GroupId;
pub use operation::{LockdownOperation, OperationResult, RestoreOperation};
pub use plan::LockdownPlan;
pub use settings::{LockdownSettings, SessionConfiguration};
