use petalo_ports::storage::{SettingsDto, SoundbankStore, StorageError, StoragePort};
use petalo_ports::types::SoundbankFormat;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub struct FsStorage {
    settings_path: PathBuf,
}

impl FsStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            settings_path: base_dir.join("settings.json"),
        }
    }

    pub fn with_settings_path(settings_path: PathBuf) -> Self {
        Self { settings_path }
    }

    pub fn default_base_dir() -> Result<PathBuf, StorageError> {
        let base = dirs_next::config_dir()
            .ok_or_else(|| StorageError::Io("config dir not found".to_string()))?;
        Ok(base.join("Petalo"))
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
        let data = fs::read(path).map_err(|e| StorageError::Io(e.to_string()))?;
        serde_json::from_slice(&data).map_err(|e| StorageError::Serde(e.to_string()))
    }

    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
        let data =
            serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serde(e.to_string()))?;
        write_atomic(path, &data)
    }
}

impl Default for FsStorage {
    fn default() -> Self {
        let base_dir = Self::default_base_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(base_dir)
    }
}

impl StoragePort for FsStorage {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        if !self.settings_path.exists() {
            return Ok(SettingsDto::default());
        }
        Self::read_json(&self.settings_path)
    }

    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError> {
        Self::write_json(&self.settings_path, s)
    }
}

/// Keeps at most one soundbank file at `<dir>/<stem>.<ext>`.
///
/// The file is removed by [`SoundbankStore::clear`] and when the store is dropped.
pub struct FsSoundbankStore {
    dir: PathBuf,
    file_stem: String,
    resident: Option<PathBuf>,
}

impl FsSoundbankStore {
    pub fn new(dir: PathBuf, file_stem: impl Into<String>) -> Self {
        Self {
            dir,
            file_stem: file_stem.into(),
            resident: None,
        }
    }

    pub fn from_settings(settings: &SettingsDto) -> Self {
        Self::new(settings.soundbank_dir(), settings.soundbank_file_stem.clone())
    }

    pub fn path_for(&self, format: SoundbankFormat) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.file_stem, format.extension()))
    }
}

impl SoundbankStore for FsSoundbankStore {
    fn persist(&mut self, bytes: &[u8], format: SoundbankFormat) -> Result<PathBuf, StorageError> {
        let path = self.path_for(format);
        write_atomic(&path, bytes)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "soundbank written");

        // the new bank is committed; a stale file left behind is logged, not reported
        if let Some(previous) = self.resident.replace(path.clone()) {
            if previous != path {
                if let Err(err) = remove_if_present(&previous) {
                    tracing::warn!(
                        path = %previous.display(),
                        "failed to remove stale soundbank: {}",
                        err
                    );
                }
            }
        }
        Ok(path)
    }

    fn resident(&self) -> Option<&Path> {
        self.resident.as_deref()
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        match self.resident.take() {
            Some(path) => {
                remove_if_present(&path)?;
                tracing::info!(path = %path.display(), "soundbank removed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for FsSoundbankStore {
    fn drop(&mut self) {
        if let Err(err) = self.clear() {
            tracing::warn!("failed to remove soundbank on drop: {}", err);
        }
    }
}

/// Write to a sibling temp file, then rename over `path`, so readers never see a partial file.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".petalo-")
        .tempfile_in(parent)
        .map_err(|e| StorageError::Io(e.to_string()))?;
    tmp.write_all(data)
        .map_err(|e| StorageError::Io(e.to_string()))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StorageError::Io(e.to_string()))?;
    tmp.persist(path)
        .map_err(|e| StorageError::Io(e.error.to_string()))?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StorageError::Io(err.to_string())),
    }
}
