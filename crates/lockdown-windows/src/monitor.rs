//! 配置漂移监控。
//!
//! 实现策略：
//! - 每个已应用的功能配置对应一个后台轮询线程，按固定间隔检查策略值
//! - 发现值被改动（漂移）时记录告警并重新写入期望值
//! - 监控按配置 ID 登记；恢复时即便拿到的是从备份重建的另一个实例，也能按 ID 停止原监控
//!
//! 作者：考试锁定服务项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use lockdown_core::FeatureKind;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::registry::{self, RegistryLocation, ValueSpec};

/// 停止信号的检查粒度。
const STOP_POLL: Duration = Duration::from_millis(50);

/// 监控目标：某个位置应保持的期望值。
#[derive(Debug, Clone)]
pub struct MonitorTarget {
    pub location: RegistryLocation,
    pub expected: ValueSpec,
}

struct MonitorHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// 活动监控登记表（进程内共享）。
#[derive(Default)]
pub struct MonitorRegistry {
    monitors: Mutex<HashMap<Uuid, MonitorHandle>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为配置启动监控；同一 ID 已有监控时先停止旧的。
    ///
    /// 参数：
    /// - `id`：配置实例 ID
    /// - `kind`：功能类型（用于日志）
    /// - `targets`：需要保持的策略值
    /// - `interval`：轮询间隔
    pub fn start(&self, id: Uuid, kind: FeatureKind, targets: Vec<MonitorTarget>, interval: Duration) {
        self.stop(id);

        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("monitor-{kind}"))
            .spawn(move || watch(kind, &targets, interval, &flag));

        match spawned {
            Ok(thread) => {
                if let Ok(mut monitors) = self.monitors.lock() {
                    monitors.insert(id, MonitorHandle { stop, thread });
                    debug!("已启动配置监控: {kind} ({id})");
                }
            }
            Err(e) => error!("启动配置监控线程失败: {kind} ({id}): {e}"),
        }
    }

    /// 停止指定配置的监控（不存在时忽略）。
    pub fn stop(&self, id: Uuid) {
        let handle = match self.monitors.lock() {
            Ok(mut monitors) => monitors.remove(&id),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            handle.stop.store(true, Ordering::SeqCst);
            let _ = handle.thread.join();
            debug!("已停止配置监控: {id}");
        }
    }

    /// 停止全部监控。
    pub fn stop_all(&self) {
        let handles: Vec<MonitorHandle> = match self.monitors.lock() {
            Ok(mut monitors) => monitors.drain().map(|(_, h)| h).collect(),
            Err(_) => Vec::new(),
        };
        for handle in &handles {
            handle.stop.store(true, Ordering::SeqCst);
        }
        for handle in handles {
            let _ = handle.thread.join();
        }
    }

    pub fn is_monitoring(&self, id: Uuid) -> bool {
        self.monitors.lock().map(|m| m.contains_key(&id)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.monitors.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for MonitorRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn watch(kind: FeatureKind, targets: &[MonitorTarget], interval: Duration, stop: &AtomicBool) {
    let mut next_check = Instant::now() + interval;
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        if Instant::now() < next_check {
            std::thread::sleep(STOP_POLL.min(interval));
            continue;
        }
        next_check = Instant::now() + interval;

        for target in targets {
            match registry::matches(&target.location, &target.expected) {
                Ok(true) => {}
                Ok(false) => {
                    warn!("检测到配置漂移: {kind} {}，重新应用", target.location);
                    match registry::apply(&target.location, &target.expected) {
                        Ok(()) => info!("已重新应用配置: {kind} {}", target.location),
                        Err(e) => error!("重新应用配置失败: {kind} {}: {e:#}", target.location),
                    }
                }
                Err(e) => debug!("检查配置失败: {kind} {}: {e:#}", target.location),
            }
        }
    }
}
