use crate::audio_params::AudioParams;
use crate::engine::{AudioEngine, EngineConfig, EngineState};
use crate::loader::{resolve_instrument, InstrumentLoadError};
use crate::soundbank::{detect_format, LoadedSoundbank, MalformedPayload};
use parking_lot::RwLock;
use petalo_ports::audio::{AudioError, AudioOutputPort};
use petalo_ports::sampler::SamplerPort;
use petalo_ports::storage::{SettingsDto, SoundbankStore, StorageError};
use petalo_ports::types::{
    AudioConfig, BankAddress, InstrumentAddress, MidiNote, ProgramIndex, RangeError, Velocity,
    Volume01,
};
use std::sync::Arc;

pub const SOUNDFONT_CHANGED: &str = "Soundfont changed successfully";
pub const INSTRUMENT_CHANGED: &str = "Instrument changed successfully";

#[derive(thiserror::Error, Debug)]
pub enum PluginError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    OutOfRange(#[from] RangeError),
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] MalformedPayload),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    InstrumentLoad(#[from] InstrumentLoadError),
    #[error("no soundbank loaded")]
    NoSoundbank,
    #[error("audio engine failed to start: {0}")]
    EngineStartFailed(#[source] AudioError),
    #[error("audio engine is not running")]
    EngineNotRunning,
}

impl PluginError {
    /// Stable machine-readable code reported across the method channel.
    pub fn code(&self) -> &'static str {
        match self {
            PluginError::InvalidArgument(_) => "INVALID_ARGUMENT",
            PluginError::OutOfRange(_) => "OUT_OF_RANGE",
            PluginError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            PluginError::Storage(_) => "STORAGE_ERROR",
            PluginError::InstrumentLoad(_) => "NO_INSTRUMENT_LOADED",
            PluginError::NoSoundbank => "NO_SOUNDBANK_LOADED",
            PluginError::EngineStartFailed(_) => "ENGINE_START_FAILED",
            PluginError::EngineNotRunning => "ENGINE_NOT_RUNNING",
        }
    }
}

struct PluginState {
    engine: AudioEngine,
    store: Box<dyn SoundbankStore>,
    soundbank: Option<LoadedSoundbank>,
    /// Instrument the sampler is playing; may predate the resident bank.
    active: Option<InstrumentAddress>,
    bank_fallback: Vec<BankAddress>,
    channel: u8,
}

impl PluginState {
    fn sampler(&self) -> Result<Arc<dyn SamplerPort>, PluginError> {
        if self.engine.state() == EngineState::Disposed {
            return Err(PluginError::EngineNotRunning);
        }
        self.engine
            .sampler()
            .cloned()
            .ok_or(PluginError::EngineNotRunning)
    }

    fn playing_sampler(&self) -> Result<&Arc<dyn SamplerPort>, PluginError> {
        if self.engine.state() != EngineState::Running {
            return Err(PluginError::EngineNotRunning);
        }
        self.engine.sampler().ok_or(PluginError::EngineNotRunning)
    }
}

/// Soundbank sampler plugin: one engine, one sampler, at most one resident bank.
///
/// Load, instrument switch, start and dispose are serialized behind the write
/// lock. Note calls share the read lock, so they never overlap a reconfiguration.
pub struct MidiPlugin {
    state: RwLock<PluginState>,
}

impl MidiPlugin {
    pub fn new(
        output: Box<dyn AudioOutputPort>,
        sampler: Arc<dyn SamplerPort>,
        store: Box<dyn SoundbankStore>,
        settings: &SettingsDto,
    ) -> Self {
        let config = EngineConfig {
            device: settings.audio_out.clone(),
            audio: AudioConfig {
                sample_rate_hz: settings.sample_rate_hz,
                channels: 2,
                buffer_size_frames: settings.buffer_size_frames,
            },
        };
        let params = Arc::new(AudioParams::new(settings));
        let engine = AudioEngine::new(output, sampler, params, config);

        Self {
            state: RwLock::new(PluginState {
                engine,
                store,
                soundbank: None,
                active: None,
                bank_fallback: settings.bank_fallback(),
                channel: settings.midi_channel(),
            }),
        }
    }

    pub fn start(&self) -> Result<(), PluginError> {
        let mut state = self.state.write();
        if state.engine.state() == EngineState::Disposed {
            return Err(PluginError::EngineNotRunning);
        }
        state.engine.start().map_err(|err| {
            tracing::warn!("audio engine failed to start: {}", err);
            PluginError::EngineStartFailed(err)
        })
    }

    /// Persist `bytes` as the resident bank and bind `program` from it.
    pub fn load_soundfont(
        &self,
        bytes: &[u8],
        program: ProgramIndex,
    ) -> Result<&'static str, PluginError> {
        let mut state = self.state.write();
        let sampler = state.sampler()?;

        let format = detect_format(bytes)?;
        let path = state.store.persist(bytes, format)?;
        let mut soundbank = LoadedSoundbank::new(format, path, bytes.len());

        // the sampler keeps its old instrument until a candidate resolves
        let resolved = resolve_instrument(
            sampler.as_ref(),
            &soundbank.storage_path,
            format,
            program,
            &state.bank_fallback,
        );
        if let Ok(resolved) = &resolved {
            soundbank.active = Some(resolved.info.address);
            state.active = Some(resolved.info.address);
        }
        state.soundbank = Some(soundbank);

        resolved?;
        Ok(SOUNDFONT_CHANGED)
    }

    /// Re-run the bank search against the resident file with a new program.
    pub fn load_instrument(&self, program: ProgramIndex) -> Result<&'static str, PluginError> {
        let mut state = self.state.write();
        let sampler = state.sampler()?;
        let (path, format) = match state.soundbank.as_ref() {
            Some(bank) => (bank.storage_path.clone(), bank.format),
            None => return Err(PluginError::NoSoundbank),
        };

        let resolved = resolve_instrument(
            sampler.as_ref(),
            &path,
            format,
            program,
            &state.bank_fallback,
        )?;
        if let Some(bank) = state.soundbank.as_mut() {
            bank.active = Some(resolved.info.address);
        }
        state.active = Some(resolved.info.address);
        Ok(INSTRUMENT_CHANGED)
    }

    pub fn note_on(&self, note: MidiNote, velocity: Velocity) -> Result<(), PluginError> {
        let state = self.state.read();
        state.playing_sampler()?.start_note(state.channel, note, velocity);
        Ok(())
    }

    /// Releasing a note that is not sounding is a no-op.
    pub fn note_off(&self, note: MidiNote) -> Result<(), PluginError> {
        let state = self.state.read();
        state.playing_sampler()?.stop_note(state.channel, note);
        Ok(())
    }

    /// Release every note number, sounding or not.
    pub fn all_notes_off(&self) -> Result<(), PluginError> {
        let state = self.state.read();
        let sampler = state.playing_sampler()?;
        for note in MidiNote::all() {
            sampler.stop_note(state.channel, note);
        }
        Ok(())
    }

    pub fn set_master_volume(&self, volume: Volume01) {
        self.state.read().engine.params().set_master(volume);
    }

    /// Stop the engine, detach the sampler and delete the resident bank. Idempotent.
    pub fn dispose(&self) {
        let mut state = self.state.write();
        if state.engine.state() == EngineState::Disposed {
            return;
        }
        state.engine.dispose();
        state.soundbank = None;
        state.active = None;
        if let Err(err) = state.store.clear() {
            tracing::warn!("failed to remove resident soundbank: {}", err);
        }
        tracing::info!("midi plugin disposed");
    }

    pub fn engine_state(&self) -> EngineState {
        self.state.read().engine.state()
    }

    pub fn soundbank(&self) -> Option<LoadedSoundbank> {
        self.state.read().soundbank.clone()
    }

    /// The instrument currently sounding, which survives a failed bank load.
    pub fn active_instrument(&self) -> Option<InstrumentAddress> {
        self.state.read().active
    }
}

impl Drop for MidiPlugin {
    fn drop(&mut self) {
        self.dispose();
    }
}
