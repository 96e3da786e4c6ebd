use petalo_ports::types::{InstrumentAddress, SoundbankFormat};
use std::ops::Range;
use std::path::PathBuf;

/// Shortest payload that carries a complete RIFF header and form type.
pub const RIFF_HEADER_LEN: usize = 12;

const FORM_TYPE: Range<usize> = 8..12;
const DLS_FORM_TYPE: &[u8; 4] = b"DLS ";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("payload is {len} bytes, a soundbank needs at least {}", RIFF_HEADER_LEN)]
pub struct MalformedPayload {
    pub len: usize,
}

/// Classify a bank payload by its RIFF form type.
///
/// SF2 and DLS share the `RIFF....` container header and differ only in the
/// four bytes at offset 8. Anything other than the DLS tag is taken as SF2.
pub fn detect_format(bytes: &[u8]) -> Result<SoundbankFormat, MalformedPayload> {
    let form_type = bytes
        .get(FORM_TYPE)
        .ok_or(MalformedPayload { len: bytes.len() })?;
    if form_type == DLS_FORM_TYPE {
        Ok(SoundbankFormat::Dls)
    } else {
        Ok(SoundbankFormat::Sf2)
    }
}

/// The bank currently resident on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedSoundbank {
    pub format: SoundbankFormat,
    pub storage_path: PathBuf,
    pub byte_len: usize,
    /// Last address the fallback search resolved against this bank; `None`
    /// while no candidate in it has resolved.
    pub active: Option<InstrumentAddress>,
}

impl LoadedSoundbank {
    pub fn new(format: SoundbankFormat, storage_path: PathBuf, byte_len: usize) -> Self {
        Self {
            format,
            storage_path,
            byte_len,
            active: None,
        }
    }
}
