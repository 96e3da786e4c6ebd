use parking_lot::Mutex;
use petalo_ports::sampler::{InstrumentInfo, SamplerError, SamplerPort};
use petalo_ports::types::{InstrumentAddress, MidiNote, SoundbankFormat, Velocity};
use rustysynth::{Preset, SoundFont, Synthesizer, SynthesizerSettings};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const MIDI_CHANNELS: i32 = 16;
const CC_BANK_SELECT: i32 = 0x00;

/// Sampler backed by rustysynth. Only SF2 banks are playable.
pub struct RustySynthSampler {
    sample_rate_hz: AtomicU32,
    loaded: Mutex<Option<LoadedInstrument>>,
}

struct LoadedInstrument {
    sound_font: Arc<SoundFont>,
    address: InstrumentAddress,
    bank_number: i32,
    synth: Synthesizer,
}

impl Default for RustySynthSampler {
    fn default() -> Self {
        Self::new(48_000)
    }
}

impl RustySynthSampler {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz: AtomicU32::new(sample_rate_hz),
            loaded: Mutex::new(None),
        }
    }

    pub fn active_instrument(&self) -> Option<InstrumentAddress> {
        self.loaded.lock().as_ref().map(|loaded| loaded.address)
    }

    fn read_sound_font(path: &Path) -> Result<Arc<SoundFont>, SamplerError> {
        let file = File::open(path).map_err(|e| SamplerError::SoundbankLoad(e.to_string()))?;
        let mut reader = BufReader::new(file);
        let sound_font = SoundFont::new(&mut reader)
            .map_err(|e| SamplerError::SoundbankLoad(format!("{:?}", e)))?;
        Ok(Arc::new(sound_font))
    }

    fn build_synth(
        &self,
        sound_font: &Arc<SoundFont>,
        address: InstrumentAddress,
        bank_number: i32,
    ) -> Result<Synthesizer, SamplerError> {
        let sample_rate_hz = self.sample_rate_hz.load(Ordering::Relaxed) as i32;
        let mut settings = SynthesizerSettings::new(sample_rate_hz);
        settings.enable_reverb_and_chorus = false;

        let mut synth = Synthesizer::new(sound_font, &settings)
            .map_err(|e| SamplerError::Backend(format!("{:?}", e)))?;
        let program = address.program.get() as i32;
        // the percussion channel keeps its drum kit
        let melodic = (0..MIDI_CHANNELS).filter(|&ch| ch != Synthesizer::PERCUSSION_CHANNEL as i32);
        for channel in melodic {
            synth.process_midi_message(channel, 0xB0, CC_BANK_SELECT, bank_number);
            synth.process_midi_message(channel, 0xC0, program, 0);
        }
        Ok(synth)
    }
}

/// SF2 files store a single 16-bit bank word; authoring tools write either the bare MSB
/// or the combined 14-bit MSB/LSB value into it.
fn find_preset<'a>(sound_font: &'a SoundFont, address: InstrumentAddress) -> Option<&'a Preset> {
    let msb = address.bank.msb as i32;
    let lsb = address.bank.lsb as i32;
    let combined = (msb << 7) | lsb;
    let program = address.program.get() as i32;

    sound_font.get_presets().iter().find(|preset| {
        let bank = preset.get_bank_number();
        preset.get_patch_number() == program && ((lsb == 0 && bank == msb) || bank == combined)
    })
}

impl SamplerPort for RustySynthSampler {
    fn load_instrument(
        &self,
        path: &Path,
        format: SoundbankFormat,
        address: InstrumentAddress,
    ) -> Result<InstrumentInfo, SamplerError> {
        if format != SoundbankFormat::Sf2 {
            return Err(SamplerError::UnsupportedFormat(format));
        }

        let sound_font = Self::read_sound_font(path)?;
        let preset =
            find_preset(&sound_font, address).ok_or(SamplerError::InstrumentNotFound(address))?;
        let name = preset.get_name().trim().to_string();
        let bank_number = preset.get_bank_number();

        let synth = self.build_synth(&sound_font, address, bank_number)?;
        *self.loaded.lock() = Some(LoadedInstrument {
            sound_font,
            address,
            bank_number,
            synth,
        });
        tracing::debug!(%address, preset = %name, "rustysynth instrument bound");

        Ok(InstrumentInfo { address, name })
    }

    fn set_sample_rate(&self, sample_rate_hz: u32) {
        if self.sample_rate_hz.swap(sample_rate_hz, Ordering::Relaxed) == sample_rate_hz {
            return;
        }

        let mut guard = self.loaded.lock();
        let Some(loaded) = guard.as_mut() else {
            return;
        };
        match self.build_synth(&loaded.sound_font, loaded.address, loaded.bank_number) {
            Ok(synth) => loaded.synth = synth,
            Err(err) => tracing::warn!("failed to rebuild synthesizer: {}", err),
        }
    }

    fn start_note(&self, channel: u8, note: MidiNote, velocity: Velocity) {
        if let Some(loaded) = self.loaded.lock().as_mut() {
            loaded
                .synth
                .note_on(channel as i32, note.get() as i32, velocity.get() as i32);
        }
    }

    fn stop_note(&self, channel: u8, note: MidiNote) {
        if let Some(loaded) = self.loaded.lock().as_mut() {
            loaded.synth.note_off(channel as i32, note.get() as i32);
        }
    }

    fn render(&self, out_l: &mut [f32], out_r: &mut [f32]) {
        out_l.fill(0.0);
        out_r.fill(0.0);

        let Some(mut guard) = self.loaded.try_lock() else {
            return;
        };
        if let Some(loaded) = guard.as_mut() {
            let frames = out_l.len().min(out_r.len());
            loaded.synth.render(&mut out_l[..frames], &mut out_r[..frames]);
        }
    }
}
