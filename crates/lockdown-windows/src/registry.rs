//! 注册表值的读取、写入与删除。
//!
//! 主要用途：
//! - 捕获策略值的原始状态（存在的值或“不存在”）
//! - 写入锁定所需的策略值，恢复时写回原值或删除
//! - 为漂移监控提供“当前值是否符合期望”的比较
//!
//! 权限要求：
//! - 写 HKLM 与 HKEY_USERS 下其他用户的配置单元需要管理员权限
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::fmt;
use std::io::ErrorKind;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use winreg::enums::{RegType, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS, KEY_READ, KEY_WRITE};
use winreg::RegKey;

/// 注册表根键。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryHive {
    /// HKEY_LOCAL_MACHINE（整机策略）。
    LocalMachine,
    /// HKEY_USERS（按 SID 定位用户配置单元）。
    Users,
    /// HKEY_CURRENT_USER。
    CurrentUser,
}

impl RegistryHive {
    fn root(self) -> RegKey {
        match self {
            RegistryHive::LocalMachine => RegKey::predef(HKEY_LOCAL_MACHINE),
            RegistryHive::Users => RegKey::predef(HKEY_USERS),
            RegistryHive::CurrentUser => RegKey::predef(HKEY_CURRENT_USER),
        }
    }

    fn name(self) -> &'static str {
        match self {
            RegistryHive::LocalMachine => "HKLM",
            RegistryHive::Users => "HKU",
            RegistryHive::CurrentUser => "HKCU",
        }
    }
}

/// 注册表值的位置（根键 + 子键路径 + 值名）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryLocation {
    pub hive: RegistryHive,
    pub key: String,
    pub value_name: String,
}

impl RegistryLocation {
    pub fn new(hive: RegistryHive, key: impl Into<String>, value_name: impl Into<String>) -> Self {
        Self {
            hive,
            key: key.into(),
            value_name: value_name.into(),
        }
    }
}

impl fmt::Display for RegistryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}\\{}", self.hive.name(), self.key, self.value_name)
    }
}

/// 支持的注册表数据（DWORD / 字符串）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RegistryData {
    Dword(u32),
    Sz(String),
}

/// 期望的值状态：写入指定数据，或确保值不存在。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSpec {
    Set(RegistryData),
    Absent,
}

impl ValueSpec {
    pub fn dword(v: u32) -> Self {
        ValueSpec::Set(RegistryData::Dword(v))
    }

    pub fn sz(v: &str) -> Self {
        ValueSpec::Set(RegistryData::Sz(v.to_string()))
    }

    /// 由捕获的原始值得到恢复目标（`None` 表示原本不存在）。
    pub fn from_original(original: Option<&RegistryData>) -> Self {
        match original {
            Some(data) => ValueSpec::Set(data.clone()),
            None => ValueSpec::Absent,
        }
    }

    fn matches(&self, current: Option<&RegistryData>) -> bool {
        match (self, current) {
            (ValueSpec::Set(expected), Some(actual)) => expected == actual,
            (ValueSpec::Absent, None) => true,
            _ => false,
        }
    }
}

/// 读取注册表值。
///
/// 返回值：
/// - `Ok(None)`：键或值不存在
/// - `Ok(Some(..))`：读取成功
///
/// 异常处理：
/// - 权限不足、值类型不受支持时返回错误
pub fn read_value(location: &RegistryLocation) -> Result<Option<RegistryData>> {
    let key = match location.hive.root().open_subkey_with_flags(&location.key, KEY_READ) {
        Ok(key) => key,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("打开注册表键失败: {location}")),
    };
    let raw = match key.get_raw_value(&location.value_name) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("读取注册表值失败: {location}")),
    };
    match raw.vtype {
        RegType::REG_DWORD => {
            let bytes: [u8; 4] = raw
                .bytes
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| anyhow!("DWORD 数据长度异常: {location}"))?;
            Ok(Some(RegistryData::Dword(u32::from_le_bytes(bytes))))
        }
        RegType::REG_SZ | RegType::REG_EXPAND_SZ => {
            let v: String = key
                .get_value(&location.value_name)
                .with_context(|| format!("读取字符串值失败: {location}"))?;
            Ok(Some(RegistryData::Sz(v)))
        }
        other => Err(anyhow!("不支持的注册表值类型 {other:?}: {location}")),
    }
}

/// 写入注册表值（键不存在则创建）。
pub fn write_value(location: &RegistryLocation, data: &RegistryData) -> Result<()> {
    let (key, _disp) = location
        .hive
        .root()
        .create_subkey(&location.key)
        .with_context(|| format!("打开/创建注册表键失败: {location}"))?;
    match data {
        RegistryData::Dword(v) => key.set_value(&location.value_name, v),
        RegistryData::Sz(v) => key.set_value(&location.value_name, v),
    }
    .with_context(|| format!("写入注册表值失败: {location}"))?;
    Ok(())
}

/// 删除注册表值。
///
/// 异常处理：
/// - 键或值不存在视为已删除
/// - 其他失败（常见原因：权限不足）返回错误
pub fn delete_value(location: &RegistryLocation) -> Result<()> {
    let key = match location.hive.root().open_subkey_with_flags(&location.key, KEY_WRITE) {
        Ok(key) => key,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("打开注册表键失败: {location}")),
    };
    match key.delete_value(&location.value_name) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("删除注册表值失败: {location}")),
    }
}

/// 使注册表值达到期望状态。
pub fn apply(location: &RegistryLocation, expected: &ValueSpec) -> Result<()> {
    match expected {
        ValueSpec::Set(data) => write_value(location, data),
        ValueSpec::Absent => delete_value(location),
    }
}

/// 判断当前值是否符合期望。
pub fn matches(location: &RegistryLocation, expected: &ValueSpec) -> Result<bool> {
    let current = read_value(location)?;
    Ok(expected.matches(current.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_only_matches_missing_value() {
        assert!(ValueSpec::Absent.matches(None));
        assert!(!ValueSpec::Absent.matches(Some(&RegistryData::Dword(0))));
    }

    #[test]
    fn set_value_compares_type_and_data() {
        let expected = ValueSpec::dword(1);
        assert!(expected.matches(Some(&RegistryData::Dword(1))));
        assert!(!expected.matches(Some(&RegistryData::Sz("1".to_string()))));
        assert!(!expected.matches(None));
    }

    #[test]
    fn registry_data_serde_is_tagged() {
        let json = serde_json::to_string(&RegistryData::Dword(4)).unwrap();
        assert_eq!(json, r#"{"type":"dword","data":4}"#);
    }
}
