#![allow(dead_code)]

use parking_lot::Mutex;
use petalo_core::MidiPlugin;
use petalo_infra_storage_fs::FsSoundbankStore;
use petalo_ports::audio::{AudioError, AudioOutputPort, AudioRenderCallback, AudioStreamHandle};
use petalo_ports::sampler::{InstrumentInfo, SamplerError, SamplerPort};
use petalo_ports::storage::SettingsDto;
use petalo_ports::types::{
    AudioConfig, AudioOutputDevice, DeviceId, InstrumentAddress, MidiNote, SoundbankFormat,
    Velocity,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SamplerCall {
    Load {
        path: PathBuf,
        format: SoundbankFormat,
        address: InstrumentAddress,
    },
    Start {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    Stop {
        channel: u8,
        note: u8,
    },
}

/// Sampler that records every call and only resolves the configured bank MSBs.
#[derive(Default)]
pub struct RecordingSampler {
    resolvable_msb: Mutex<Vec<u8>>,
    calls: Mutex<Vec<SamplerCall>>,
    active: Mutex<Option<InstrumentAddress>>,
}

impl RecordingSampler {
    pub fn resolving(msbs: &[u8]) -> Arc<Self> {
        let sampler = Self::default();
        *sampler.resolvable_msb.lock() = msbs.to_vec();
        Arc::new(sampler)
    }

    pub fn set_resolvable(&self, msbs: &[u8]) {
        *self.resolvable_msb.lock() = msbs.to_vec();
    }

    pub fn calls(&self) -> Vec<SamplerCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn load_attempts(&self) -> Vec<InstrumentAddress> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                SamplerCall::Load { address, .. } => Some(*address),
                _ => None,
            })
            .collect()
    }

    pub fn active(&self) -> Option<InstrumentAddress> {
        *self.active.lock()
    }
}

impl SamplerPort for RecordingSampler {
    fn load_instrument(
        &self,
        path: &Path,
        format: SoundbankFormat,
        address: InstrumentAddress,
    ) -> Result<InstrumentInfo, SamplerError> {
        self.calls.lock().push(SamplerCall::Load {
            path: path.to_path_buf(),
            format,
            address,
        });
        if !self.resolvable_msb.lock().contains(&address.bank.msb) {
            return Err(SamplerError::InstrumentNotFound(address));
        }
        *self.active.lock() = Some(address);
        Ok(InstrumentInfo {
            address,
            name: format!("Preset {}", address.program),
        })
    }

    fn set_sample_rate(&self, _sample_rate_hz: u32) {}

    fn start_note(&self, channel: u8, note: MidiNote, velocity: Velocity) {
        self.calls.lock().push(SamplerCall::Start {
            channel,
            note: note.get(),
            velocity: velocity.get(),
        });
    }

    fn stop_note(&self, channel: u8, note: MidiNote) {
        self.calls.lock().push(SamplerCall::Stop {
            channel,
            note: note.get(),
        });
    }

    fn render(&self, out_l: &mut [f32], out_r: &mut [f32]) {
        out_l.fill(0.5);
        out_r.fill(-0.5);
    }
}

#[derive(Clone, Default)]
pub struct OutputTap {
    pub fail_open: Arc<AtomicBool>,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub callback: Arc<Mutex<Option<Arc<dyn AudioRenderCallback>>>>,
}

pub struct FakeAudioOutput {
    tap: OutputTap,
}

impl FakeAudioOutput {
    pub fn new(tap: OutputTap) -> Self {
        Self { tap }
    }

    fn device() -> AudioOutputDevice {
        AudioOutputDevice {
            id: DeviceId("fake:0".to_string()),
            name: "Fake Output".to_string(),
            default_config: AudioConfig {
                sample_rate_hz: 48_000,
                channels: 2,
                buffer_size_frames: None,
            },
        }
    }
}

struct FakeStream {
    closed: Arc<AtomicUsize>,
}

impl AudioStreamHandle for FakeStream {
    fn close(self: Box<Self>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl AudioOutputPort for FakeAudioOutput {
    fn list_outputs(&self) -> Result<Vec<AudioOutputDevice>, AudioError> {
        Ok(vec![Self::device()])
    }

    fn default_output(&self) -> Result<AudioOutputDevice, AudioError> {
        Ok(Self::device())
    }

    fn open_output(
        &self,
        device_id: &DeviceId,
        _config: AudioConfig,
        cb: Arc<dyn AudioRenderCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        if self.tap.fail_open.load(Ordering::SeqCst) {
            return Err(AudioError::DeviceUnavailable(device_id.to_string()));
        }
        self.tap.opened.fetch_add(1, Ordering::SeqCst);
        *self.tap.callback.lock() = Some(cb);
        Ok(Box::new(FakeStream {
            closed: self.tap.closed.clone(),
        }))
    }
}

pub struct Harness {
    pub plugin: MidiPlugin,
    pub sampler: Arc<RecordingSampler>,
    pub tap: OutputTap,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn bank_path(&self, ext: &str) -> PathBuf {
        self.dir.path().join(format!("petalo_soundfont.{ext}"))
    }

    pub fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Plugin wired to fakes, with its soundbank directory in a fresh temp dir. Not started.
pub fn harness(resolvable_msb: &[u8]) -> Harness {
    harness_at(resolvable_msb, Path::to_path_buf)
}

/// Like [`harness`], but the soundbank directory is `bank_dir(temp_dir)`.
pub fn harness_at(resolvable_msb: &[u8], bank_dir: impl FnOnce(&Path) -> PathBuf) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let settings = SettingsDto {
        soundbank_dir: Some(bank_dir(dir.path()).to_string_lossy().into_owned()),
        ..SettingsDto::default()
    };
    let sampler = RecordingSampler::resolving(resolvable_msb);
    let tap = OutputTap::default();
    let plugin = MidiPlugin::new(
        Box::new(FakeAudioOutput::new(tap.clone())),
        sampler.clone(),
        Box::new(FsSoundbankStore::from_settings(&settings)),
        &settings,
    );
    Harness {
        plugin,
        sampler,
        tap,
        dir,
    }
}

pub fn started(resolvable_msb: &[u8]) -> Harness {
    let h = harness(resolvable_msb);
    h.plugin.start().unwrap();
    h
}

/// 20-byte payload with `form_type` at the RIFF form-type offset.
pub fn payload(form_type: &[u8; 4]) -> Vec<u8> {
    let mut bytes = vec![0u8; 20];
    bytes[8..12].copy_from_slice(form_type);
    bytes
}

pub fn note(value: i64) -> MidiNote {
    MidiNote::try_from(value).unwrap()
}

pub fn velocity(value: i64) -> Velocity {
    Velocity::try_from(value).unwrap()
}
