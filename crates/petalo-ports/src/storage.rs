use crate::types::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// General MIDI reserves this channel for drum kits.
pub const PERCUSSION_CHANNEL: u8 = 9;

fn default_file_stem() -> String {
    "petalo_soundfont".to_string()
}

fn default_sample_rate_hz() -> u32 {
    48_000
}

fn default_master_volume() -> Volume01 {
    Volume01::new(0.8)
}

fn default_bank_fallback() -> Vec<BankAddress> {
    BankAddress::default_fallback()
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDto {
    /// Directory that holds the resident soundbank; the OS temp dir when unset.
    pub soundbank_dir: Option<String>,
    #[serde(default = "default_file_stem")]
    pub soundbank_file_stem: String,
    pub audio_out: Option<DeviceId>,
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
    pub buffer_size_frames: Option<u32>,
    #[serde(default = "default_master_volume")]
    pub master_volume: Volume01,
    pub midi_channel: u8,
    #[serde(default = "default_bank_fallback")]
    pub bank_fallback: Vec<BankAddress>,
}

impl Default for SettingsDto {
    fn default() -> Self {
        Self {
            soundbank_dir: None,
            soundbank_file_stem: default_file_stem(),
            audio_out: None,
            sample_rate_hz: default_sample_rate_hz(),
            buffer_size_frames: None,
            master_volume: default_master_volume(),
            midi_channel: 0,
            bank_fallback: default_bank_fallback(),
        }
    }
}

impl SettingsDto {
    pub fn soundbank_dir(&self) -> PathBuf {
        match self.soundbank_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => std::env::temp_dir(),
        }
    }

    /// Channel used for note calls. Values past 15 clamp to 15, and the GM percussion
    /// channel 9 falls back to 0 so notes keep sounding the bound preset.
    pub fn midi_channel(&self) -> u8 {
        match self.midi_channel.min(15) {
            PERCUSSION_CHANNEL => 0,
            channel => channel,
        }
    }

    pub fn bank_fallback(&self) -> Vec<BankAddress> {
        if self.bank_fallback.is_empty() {
            default_bank_fallback()
        } else {
            self.bank_fallback.clone()
        }
    }
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<SettingsDto, StorageError>;
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError>;
}

/// Owner of the single on-disk soundbank.
pub trait SoundbankStore: Send + Sync {
    /// Atomically replace the resident bank with `bytes`; returns its path.
    fn persist(&mut self, bytes: &[u8], format: SoundbankFormat) -> Result<PathBuf, StorageError>;

    fn resident(&self) -> Option<&Path>;

    /// Delete the resident bank, if any.
    fn clear(&mut self) -> Result<(), StorageError>;
}
