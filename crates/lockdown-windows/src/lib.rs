//! Windows 平台的功能配置实现（注册表策略值、Windows 更新服务、漂移监控）。
//!
//! 目标：
//! - 为核心库的十二种功能类型提供真实的系统修改能力
//! - 将 Win32 细节集中封装，核心编排逻辑不直接依赖注册表/服务 API
//!
//! 安全注意：
//! - 写 HKLM、写其他用户的 HKEY_USERS 配置单元、控制服务都需要管理员权限
//! - 权限不足等环境性失败一律以 `false` 返回给编排器，不会 panic
//!
//! 非 Windows 目标下本 crate 为空。
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

#[cfg(windows)]
pub mod configuration;
#[cfg(windows)]
pub mod elevation;
#[cfg(windows)]
pub mod factory;
#[cfg(windows)]
pub mod monitor;
#[cfg(windows)]
pub mod policy;
#[cfg(windows)]
pub mod registry;
#[cfg(windows)]
pub mod service;

#[cfg(windows)]
pub use configuration::WindowsFeatureConfiguration;
#[cfg(windows)]
pub use factory::WindowsFeatureFactory;
