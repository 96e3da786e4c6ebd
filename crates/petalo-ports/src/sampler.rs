use crate::types::*;
use std::path::Path;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplerError {
    #[error("soundbank load failed: {0}")]
    SoundbankLoad(String),
    #[error("unsupported soundbank format: {0}")]
    UnsupportedFormat(SoundbankFormat),
    #[error("no instrument at {0}")]
    InstrumentNotFound(InstrumentAddress),
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrumentInfo {
    pub address: InstrumentAddress,
    pub name: String,
}

/// Thread model:
/// - load_instrument is called with the plugin's write lock held
/// - start_note/stop_note are called from control threads, possibly in parallel
/// - render is called from the audio thread (must be realtime-safe)
pub trait SamplerPort: Send + Sync {
    /// Bind the instrument at `address` inside the bank file at `path`.
    ///
    /// Must be all-or-nothing: on error the previously loaded instrument keeps playing.
    fn load_instrument(
        &self,
        path: &Path,
        format: SoundbankFormat,
        address: InstrumentAddress,
    ) -> Result<InstrumentInfo, SamplerError>;

    fn set_sample_rate(&self, sample_rate_hz: u32);

    fn start_note(&self, channel: u8, note: MidiNote, velocity: Velocity);
    fn stop_note(&self, channel: u8, note: MidiNote);

    /// Called by audio thread: render frames to out_l/out_r
    fn render(&self, out_l: &mut [f32], out_r: &mut [f32]);
}
