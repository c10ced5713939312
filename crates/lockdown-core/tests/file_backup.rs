mod common;

use std::sync::Arc;

use common::{student, CallLog, CleanupDir, SpyConfiguration, SpyFactory};
use lockdown_core::{
    BackupError, FeatureConfiguration, FeatureConfigurationBackup, FeatureKind, FileBackup, GroupId, LockdownOperation,
    LockdownSettings, OperationResult, SessionConfiguration,
};

fn backup_in(dir: &std::path::Path, log: &CallLog) -> FileBackup {
    FileBackup::new(dir.join("feature-backup.json"), Arc::new(SpyFactory::new(log.clone())))
}

#[test]
fn save_then_get_by_returns_only_matching_group() {
    let root = common::unique_temp_dir("lockdown-file-backup");
    let _cleanup = CleanupDir(root.clone());
    let log = CallLog::default();
    let backup = backup_in(&root, &log);

    let group_a = GroupId::new();
    let group_b = GroupId::new();
    let a1 = SpyConfiguration::new(FeatureKind::TaskManager, group_a, log.clone());
    let a2 = SpyConfiguration::new(FeatureKind::Signout, group_a, log.clone());
    let b1 = SpyConfiguration::new(FeatureKind::PowerOptions, group_b, log.clone());
    for c in [&a1, &a2, &b1] {
        backup.save(c).expect("save");
    }

    let mut ids: Vec<_> = backup.get_by(group_a).expect("get_by").iter().map(|c| c.id()).collect();
    ids.sort();
    let mut expected = vec![a1.id(), a2.id()];
    expected.sort();
    assert_eq!(ids, expected);
    assert_eq!(backup.get_all().expect("get_all").len(), 3);
}

#[test]
fn saving_the_same_configuration_twice_keeps_one_record() {
    let root = common::unique_temp_dir("lockdown-file-backup");
    let _cleanup = CleanupDir(root.clone());
    let log = CallLog::default();
    let backup = backup_in(&root, &log);

    let config = SpyConfiguration::new(FeatureKind::WindowsUpdate, GroupId::new(), log.clone());
    backup.save(&config).expect("save");
    backup.save(&config).expect("save again");

    assert_eq!(backup.records().expect("records").len(), 1);
}

#[test]
fn records_survive_a_new_store_instance() {
    let root = common::unique_temp_dir("lockdown-file-backup");
    let _cleanup = CleanupDir(root.clone());
    let log = CallLog::default();
    let group_id = GroupId::new();
    let config = SpyConfiguration::new(FeatureKind::RemoteConnection, group_id, log.clone());

    backup_in(&root, &log).save(&config).expect("save");

    let reopened = backup_in(&root, &log);
    let loaded = reopened.get_by(group_id).expect("get_by");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id(), config.id());
    assert_eq!(loaded[0].kind(), FeatureKind::RemoteConnection);
    assert_eq!(loaded[0].group_id(), group_id);
}

#[test]
fn delete_removes_the_record() {
    let root = common::unique_temp_dir("lockdown-file-backup");
    let _cleanup = CleanupDir(root.clone());
    let log = CallLog::default();
    let backup = backup_in(&root, &log);
    let group_id = GroupId::new();
    let keep = SpyConfiguration::new(FeatureKind::SwitchUser, group_id, log.clone());
    let drop_me = SpyConfiguration::new(FeatureKind::NetworkOptions, group_id, log.clone());
    backup.save(&keep).expect("save");
    backup.save(&drop_me).expect("save");

    backup.delete(&drop_me).expect("delete");
    backup.delete(&drop_me).expect("delete is idempotent");

    let remaining = backup.get_by(group_id).expect("get_by");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id(), keep.id());
}

#[test]
fn missing_file_reads_as_empty() {
    let root = common::unique_temp_dir("lockdown-file-backup");
    let _cleanup = CleanupDir(root.clone());
    let log = CallLog::default();
    let backup = FileBackup::new(
        root.join("nested").join("feature-backup.json"),
        Arc::new(SpyFactory::new(log.clone())),
    );

    assert!(backup.get_all().expect("get_all").is_empty());

    let config = SpyConfiguration::new(FeatureKind::EaseOfAccess, GroupId::new(), log);
    backup.save(&config).expect("save creates parent dir");
    assert!(backup.path().exists());
}

#[test]
fn corrupt_file_is_reported() {
    let root = common::unique_temp_dir("lockdown-file-backup");
    let _cleanup = CleanupDir(root.clone());
    let log = CallLog::default();
    let backup = backup_in(&root, &log);
    std::fs::write(backup.path(), "{ not json").expect("write corrupt file");

    let err = backup.get_by(GroupId::new()).err().expect("corrupt file must fail");
    assert!(matches!(err, BackupError::Corrupt { .. }));
}

#[test]
fn two_stores_sharing_one_file_neither_lose_nor_corrupt_records() {
    let root = common::unique_temp_dir("lockdown-file-backup");
    let _cleanup = CleanupDir(root.clone());
    let log = CallLog::default();
    let live_store = Arc::new(backup_in(&root, &log));
    let cleanup_store = Arc::new(backup_in(&root, &log));

    let stale_group = GroupId::new();
    let stale: Vec<SpyConfiguration> = (0..100)
        .map(|_| SpyConfiguration::new(FeatureKind::TaskManager, stale_group, log.clone()))
        .collect();
    for c in &stale {
        cleanup_store.save(c).expect("seed stale record");
    }

    let live_group = GroupId::new();
    let writer = {
        let store = live_store.clone();
        let log = log.clone();
        std::thread::spawn(move || {
            let mut ids = Vec::new();
            for _ in 0..100 {
                let c = SpyConfiguration::new(FeatureKind::PowerOptions, live_group, log.clone());
                store.save(&c).expect("save live record");
                ids.push(c.id());
            }
            ids
        })
    };
    let deleter = {
        let store = cleanup_store.clone();
        std::thread::spawn(move || {
            for c in &stale {
                store.delete(c).expect("delete stale record");
            }
        })
    };
    let mut saved = writer.join().expect("writer thread");
    deleter.join().expect("deleter thread");

    let records = FileBackup::read_records_at(live_store.path()).expect("store stays readable");
    assert!(records.iter().all(|r| r.group_id == live_group));
    let mut stored: Vec<_> = records.iter().map(|r| r.id).collect();
    stored.sort();
    saved.sort();
    assert_eq!(stored, saved);

    let leftovers: Vec<_> = std::fs::read_dir(&root)
        .expect("read dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(".tmp."))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[test]
fn records_can_be_read_without_a_factory() {
    let root = common::unique_temp_dir("lockdown-file-backup");
    let _cleanup = CleanupDir(root.clone());
    let log = CallLog::default();
    let backup = backup_in(&root, &log);
    let group_id = GroupId::new();
    let config = SpyConfiguration::new(FeatureKind::VmwareOverlay, group_id, log.clone());
    backup.save(&config).expect("save");

    let records = FileBackup::read_records_at(backup.path()).expect("read records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, config.id());
    assert_eq!(records[0].group_id, group_id);
    assert_eq!(records[0].kind, FeatureKind::VmwareOverlay);

    std::fs::write(backup.path(), "  \n").expect("write blank file");
    assert!(FileBackup::read_records_at(backup.path()).expect("blank").is_empty());
    assert!(FileBackup::read_records_at(&root.join("absent.json")).expect("absent").is_empty());
}

#[test]
fn perform_and_revert_from_a_new_process_round_trip_through_the_file() {
    let root = common::unique_temp_dir("lockdown-file-backup");
    let _cleanup = CleanupDir(root.clone());
    let log = CallLog::default();
    let factory = Arc::new(SpyFactory::new(log.clone()));
    let session = SessionConfiguration {
        user: student(),
        settings: LockdownSettings::default(),
    };

    let mut performer = LockdownOperation::new(Arc::new(backup_in(&root, &log)), factory.clone());
    assert_eq!(performer.perform(&session), OperationResult::Success);
    let group_id = performer.group_id().expect("group id");
    drop(performer);

    let backup = Arc::new(backup_in(&root, &log));
    assert_eq!(backup.records().expect("records").len(), 12);

    let mut reverter = LockdownOperation::with_group(backup.clone(), factory, group_id);
    assert_eq!(reverter.revert(), OperationResult::Success);
    assert!(backup.records().expect("records").is_empty());
    assert_eq!(log.restores(), 12);
}
