use serde::{Deserialize, Serialize};
use std::fmt;

pub type SampleTime = u64; // audio sample index, monotonic while stream running

/// Highest value a 7-bit MIDI data byte can carry.
pub const MIDI_DATA_MAX: u8 = 127;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{field} out of range: {value} (expected 0..=127)")]
pub struct RangeError {
    pub field: &'static str,
    pub value: i64,
}

fn checked_data_byte(field: &'static str, value: i64) -> Result<u8, RangeError> {
    if (0..=MIDI_DATA_MAX as i64).contains(&value) {
        Ok(value as u8)
    } else {
        Err(RangeError { field, value })
    }
}

macro_rules! midi_data_byte {
    ($name:ident, $field:literal) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "u8")]
        pub struct $name(u8);

        impl $name {
            pub fn get(self) -> u8 {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = RangeError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                checked_data_byte($field, value).map(Self)
            }
        }

        impl TryFrom<u8> for $name {
            type Error = RangeError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                Self::try_from(value as i64)
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

midi_data_byte!(MidiNote, "note");
midi_data_byte!(Velocity, "velocity");
midi_data_byte!(ProgramIndex, "instrumentIndex");

impl MidiNote {
    /// Every note number, 0 through 127.
    pub fn all() -> impl Iterator<Item = MidiNote> {
        (0..=MIDI_DATA_MAX).map(MidiNote)
    }
}

impl ProgramIndex {
    pub const ZERO: ProgramIndex = ProgramIndex(0);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BankAddress {
    pub msb: u8,
    pub lsb: u8,
}

impl BankAddress {
    /// Default melodic bank used by GM sound sets and DLS collections (0x79).
    pub const GM_MELODIC: BankAddress = BankAddress { msb: 0x79, lsb: 0 };
    /// Hand-authored banks that keep their presets at bank 0.
    pub const CUSTOM: BankAddress = BankAddress { msb: 0, lsb: 0 };

    pub fn default_fallback() -> Vec<BankAddress> {
        vec![Self::GM_MELODIC, Self::CUSTOM]
    }
}

impl fmt::Display for BankAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msb {} lsb {}", self.msb, self.lsb)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentAddress {
    pub program: ProgramIndex,
    pub bank: BankAddress,
}

impl fmt::Display for InstrumentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "program {} {}", self.program, self.bank)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundbankFormat {
    Sf2,
    Dls,
}

impl SoundbankFormat {
    pub fn extension(self) -> &'static str {
        match self {
            SoundbankFormat::Sf2 => "sf2",
            SoundbankFormat::Dls => "dls",
        }
    }
}

impl fmt::Display for SoundbankFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundbankFormat::Sf2 => write!(f, "SF2"),
            SoundbankFormat::Dls => write!(f, "DLS"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioOutputDevice {
    pub id: DeviceId,
    pub name: String,
    pub default_config: AudioConfig,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate_hz: u32,
    pub channels: u16, // fixed 2
    pub buffer_size_frames: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct Volume01(pub f32);

impl Volume01 {
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
