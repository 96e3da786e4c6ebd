use petalo_infra_storage_fs::{FsSoundbankStore, FsStorage};
use petalo_ports::storage::{SettingsDto, SoundbankStore, StoragePort};
use petalo_ports::types::{SoundbankFormat, Volume01};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn persist_writes_file_with_format_extension() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FsSoundbankStore::new(dir.path().to_path_buf(), "petalo_soundfont");

    let path = store.persist(b"RIFF0000DLS payload", SoundbankFormat::Dls).unwrap();

    assert_eq!(path, dir.path().join("petalo_soundfont.dls"));
    assert_eq!(fs::read(&path).unwrap(), b"RIFF0000DLS payload");
    assert_eq!(store.resident(), Some(path.as_path()));
}

#[test]
fn reload_overwrites_instead_of_accumulating() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FsSoundbankStore::new(dir.path().to_path_buf(), "petalo_soundfont");

    store.persist(b"first", SoundbankFormat::Sf2).unwrap();
    let path = store.persist(b"second", SoundbankFormat::Sf2).unwrap();

    assert_eq!(files_in(dir.path()), vec!["petalo_soundfont.sf2".to_string()]);
    assert_eq!(fs::read(path).unwrap(), b"second");
}

#[test]
fn format_change_removes_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FsSoundbankStore::new(dir.path().to_path_buf(), "petalo_soundfont");

    store.persist(b"sf2 bytes", SoundbankFormat::Sf2).unwrap();
    store.persist(b"dls bytes", SoundbankFormat::Dls).unwrap();

    assert_eq!(files_in(dir.path()), vec!["petalo_soundfont.dls".to_string()]);
}

#[test]
fn undeletable_stale_file_does_not_undo_a_committed_persist() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FsSoundbankStore::new(dir.path().to_path_buf(), "petalo_soundfont");
    let stale = store.persist(b"sf2 bytes", SoundbankFormat::Sf2).unwrap();

    // a non-empty directory where the old bank was; remove_file cannot delete it
    fs::remove_file(&stale).unwrap();
    fs::create_dir(&stale).unwrap();
    fs::write(stale.join("keep"), b"x").unwrap();

    let path = store.persist(b"dls bytes", SoundbankFormat::Dls).unwrap();
    assert_eq!(path, dir.path().join("petalo_soundfont.dls"));
    assert_eq!(store.resident(), Some(path.as_path()));
    assert_eq!(fs::read(&path).unwrap(), b"dls bytes");

    store.clear().unwrap();
    assert_eq!(store.resident(), None);
    assert!(!path.exists());
    assert!(stale.is_dir());
}

#[test]
fn clear_and_drop_delete_resident_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FsSoundbankStore::new(dir.path().to_path_buf(), "bank");
    store.persist(b"bytes", SoundbankFormat::Sf2).unwrap();
    store.clear().unwrap();
    assert!(files_in(dir.path()).is_empty());
    assert_eq!(store.resident(), None);

    {
        let mut scoped = FsSoundbankStore::new(dir.path().to_path_buf(), "bank");
        scoped.persist(b"bytes", SoundbankFormat::Dls).unwrap();
        assert_eq!(files_in(dir.path()).len(), 1);
    }
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn persist_into_unwritable_location_reports_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, b"file").unwrap();
    let mut store = FsSoundbankStore::new(blocker, "bank");

    let err = store.persist(b"bytes", SoundbankFormat::Sf2).unwrap_err();
    assert!(err.to_string().starts_with("io error"));
    assert_eq!(store.resident(), None);
}

#[test]
fn settings_round_trip_through_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FsStorage::new(dir.path().join("Petalo"));

    let loaded = storage.load_settings().unwrap();
    assert_eq!(loaded.sample_rate_hz, 48_000);

    let mut settings = SettingsDto::default();
    settings.master_volume = Volume01::new(0.5);
    settings.midi_channel = 3;
    storage.save_settings(&settings).unwrap();

    let loaded = storage.load_settings().unwrap();
    assert_eq!(loaded.master_volume, Volume01::new(0.5));
    assert_eq!(loaded.midi_channel, 3);
}
