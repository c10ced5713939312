#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use lockdown_core::{
    BackupError, BackupRecord, FeatureConfiguration, FeatureConfigurationBackup, FeatureConfigurationFactory,
    FeatureKind, GroupId, UserIdentity,
};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create {
        kind: FeatureKind,
        group_id: GroupId,
        user: Option<String>,
    },
    Initialize(FeatureKind),
    Enable(FeatureKind),
    Disable(FeatureKind),
    Monitor(FeatureKind),
    Restore(Uuid),
    Save(FeatureKind),
    Delete(Uuid),
    GetBy(GroupId),
    GetAll,
}

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn saves(&self) -> usize {
        self.count(|c| matches!(c, Call::Save(_)))
    }

    pub fn enables(&self) -> usize {
        self.count(|c| matches!(c, Call::Enable(_)))
    }

    pub fn disables(&self) -> usize {
        self.count(|c| matches!(c, Call::Disable(_)))
    }

    pub fn monitors(&self) -> usize {
        self.count(|c| matches!(c, Call::Monitor(_)))
    }

    pub fn restores(&self) -> usize {
        self.count(|c| matches!(c, Call::Restore(_)))
    }

    pub fn created_kinds(&self) -> Vec<FeatureKind> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }

    pub fn saved_kinds(&self) -> Vec<FeatureKind> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Save(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }
}

pub fn student() -> UserIdentity {
    UserIdentity {
        sid: "S-1-5-21-1000".to_string(),
        user_name: "student".to_string(),
    }
}

pub struct SpyConfiguration {
    id: Uuid,
    group_id: GroupId,
    kind: FeatureKind,
    identity: Option<UserIdentity>,
    apply_ok: bool,
    restore_ok: bool,
    log: CallLog,
}

impl SpyConfiguration {
    pub fn new(kind: FeatureKind, group_id: GroupId, log: CallLog) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            kind,
            identity: None,
            apply_ok: true,
            restore_ok: true,
            log,
        }
    }
}

impl FeatureConfiguration for SpyConfiguration {
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
        self.log.push(Call::Initialize(self.kind));
    }

    fn enable_feature(&mut self) -> bool {
        self.log.push(Call::Enable(self.kind));
        self.apply_ok
    }

    fn disable_feature(&mut self) -> bool {
        self.log.push(Call::Disable(self.kind));
        self.apply_ok
    }

    fn monitor(&mut self) {
        self.log.push(Call::Monitor(self.kind));
    }

    fn restore(&mut self) -> bool {
        self.log.push(Call::Restore(self.id));
        self.restore_ok
    }

    fn to_record(&self) -> BackupRecord {
        BackupRecord::new(
            self.id,
            self.group_id,
            self.kind,
            self.identity.clone(),
            serde_json::json!({ "restore_ok": self.restore_ok }),
        )
    }
}

/// 记录每次创建调用的工厂替身。
///
/// `fail_at`：第 k 个（从 1 开始）创建的配置在启用/禁用时返回失败。
pub struct SpyFactory {
    log: CallLog,
    fail_at: Option<usize>,
    created: Mutex<usize>,
}

impl SpyFactory {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail_at: None,
            created: Mutex::new(0),
        }
    }

    pub fn failing_at(log: CallLog, k: usize) -> Self {
        Self {
            fail_at: Some(k),
            ..Self::new(log)
        }
    }

    fn make(&self, kind: FeatureKind, group_id: GroupId, user: Option<&UserIdentity>) -> Box<dyn FeatureConfiguration> {
        let mut created = self.created.lock().unwrap();
        *created += 1;
        self.log.push(Call::Create {
            kind,
            group_id,
            user: user.map(|u| u.sid.clone()),
        });
        let mut configuration = SpyConfiguration::new(kind, group_id, self.log.clone());
        configuration.identity = user.cloned();
        configuration.apply_ok = self.fail_at != Some(*created);
        Box::new(configuration)
    }
}

impl FeatureConfigurationFactory for SpyFactory {
    fn create_change_password_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::ChangePassword, group_id, Some(user))
    }

    fn create_chrome_notification_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::ChromeNotification, group_id, Some(user))
    }

    fn create_ease_of_access_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::EaseOfAccess, group_id, None)
    }

    fn create_lock_workstation_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::LockWorkstation, group_id, Some(user))
    }

    fn create_network_options_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::NetworkOptions, group_id, None)
    }

    fn create_power_options_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::PowerOptions, group_id, None)
    }

    fn create_remote_connection_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::RemoteConnection, group_id, None)
    }

    fn create_signout_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::Signout, group_id, Some(user))
    }

    fn create_switch_user_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::SwitchUser, group_id, None)
    }

    fn create_task_manager_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::TaskManager, group_id, Some(user))
    }

    fn create_vmware_overlay_configuration(&self, group_id: GroupId, user: &UserIdentity) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::VmwareOverlay, group_id, Some(user))
    }

    fn create_windows_update_configuration(&self, group_id: GroupId) -> Box<dyn FeatureConfiguration> {
        self.make(FeatureKind::WindowsUpdate, group_id, None)
    }

    fn load(&self, record: BackupRecord) -> Box<dyn FeatureConfiguration> {
        Box::new(SpyConfiguration {
            id: record.id,
            group_id: record.group_id,
            kind: record.kind,
            identity: record.identity,
            apply_ok: true,
            restore_ok: record.state["restore_ok"].as_bool().unwrap_or(true),
            log: self.log.clone(),
        })
    }
}

/// 内存备份存储替身：记录调用并按记录重建 [`SpyConfiguration`]。
pub struct SpyBackup {
    log: CallLog,
    records: Mutex<Vec<BackupRecord>>,
    fail_save_at: Option<usize>,
    saves: Mutex<usize>,
    fail_get: bool,
    fail_delete_at: Option<usize>,
    deletes: Mutex<usize>,
}

impl SpyBackup {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            records: Mutex::new(Vec::new()),
            fail_save_at: None,
            saves: Mutex::new(0),
            fail_get: false,
            fail_delete_at: None,
            deletes: Mutex::new(0),
        }
    }

    pub fn failing_save_at(log: CallLog, k: usize) -> Self {
        Self {
            fail_save_at: Some(k),
            ..Self::new(log)
        }
    }

    pub fn failing_get(log: CallLog) -> Self {
        Self {
            fail_get: true,
            ..Self::new(log)
        }
    }

    /// 第 `k` 次（从 1 开始）`delete` 返回错误且不删除记录。
    pub fn failing_delete_at(log: CallLog, k: usize) -> Self {
        Self {
            fail_delete_at: Some(k),
            ..Self::new(log)
        }
    }

    /// 直接写入一条记录；`restore_ok` 决定重建后 `restore()` 的返回值。
    pub fn seed(&self, group_id: GroupId, kind: FeatureKind, restore_ok: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.records.lock().unwrap().push(BackupRecord::new(
            id,
            group_id,
            kind,
            None,
            serde_json::json!({ "restore_ok": restore_ok }),
        ));
        id
    }

    pub fn record_ids(&self) -> Vec<Uuid> {
        self.records.lock().unwrap().iter().map(|r| r.id).collect()
    }

    pub fn deleted_ids(&self) -> Vec<Uuid> {
        self.log
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn rehydrate(&self, records: Vec<BackupRecord>) -> Vec<Box<dyn FeatureConfiguration>> {
        let loader = SpyFactory::new(self.log.clone());
        records.into_iter().map(|r| loader.load(r)).collect()
    }

    fn injected_failure() -> BackupError {
        BackupError::Io {
            path: "spy".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "injected"),
        }
    }
}

impl FeatureConfigurationBackup for SpyBackup {
    fn save(&self, configuration: &dyn FeatureConfiguration) -> Result<(), BackupError> {
        let mut saves = self.saves.lock().unwrap();
        *saves += 1;
        if self.fail_save_at == Some(*saves) {
            return Err(Self::injected_failure());
        }
        self.log.push(Call::Save(configuration.kind()));
        self.records.lock().unwrap().push(configuration.to_record());
        Ok(())
    }

    fn get_by(&self, group_id: GroupId) -> Result<Vec<Box<dyn FeatureConfiguration>>, BackupError> {
        self.log.push(Call::GetBy(group_id));
        if self.fail_get {
            return Err(Self::injected_failure());
        }
        let records = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.group_id == group_id)
            .cloned()
            .collect();
        Ok(self.rehydrate(records))
    }

    fn get_all(&self) -> Result<Vec<Box<dyn FeatureConfiguration>>, BackupError> {
        self.log.push(Call::GetAll);
        if self.fail_get {
            return Err(Self::injected_failure());
        }
        let records = self.records.lock().unwrap().clone();
        Ok(self.rehydrate(records))
    }

    fn delete(&self, configuration: &dyn FeatureConfiguration) -> Result<(), BackupError> {
        let mut deletes = self.deletes.lock().unwrap();
        *deletes += 1;
        if self.fail_delete_at == Some(*deletes) {
            return Err(Self::injected_failure());
        }
        self.log.push(Call::Delete(configuration.id()));
        self.records.lock().unwrap().retain(|r| r.id != configuration.id());
        Ok(())
    }
}

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub struct CleanupDir(pub PathBuf);

impl Drop for CleanupDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
