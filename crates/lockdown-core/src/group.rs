//! 锁定分组标识。
//!
//! 每次执行锁定（perform）都会生成一个新的分组 ID，用于关联本次创建的全部功能配置及其备份记录。
//! 该 ID 需要由调用方持久化（见 [`crate::state::SessionState`]），以便进程重启后仍可回滚。
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 锁定分组 ID（对 UUID 的强类型封装）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(Uuid);

impl GroupId {
    /// 生成一个新的随机分组 ID。
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for GroupId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for GroupId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
