use petalo_ports::storage::SettingsDto;
use petalo_ports::types::Volume01;
use std::sync::atomic::{AtomicU32, Ordering};

/// Parameters shared with the audio thread.
#[derive(Debug)]
pub struct AudioParams {
    master: AtomicU32,
}

impl AudioParams {
    pub fn new(settings: &SettingsDto) -> Self {
        Self {
            master: AtomicU32::new(settings.master_volume.get().to_bits()),
        }
    }

    pub fn set_master(&self, volume: Volume01) {
        self.master.store(volume.get().to_bits(), Ordering::Relaxed);
    }

    pub fn master(&self) -> f32 {
        f32::from_bits(self.master.load(Ordering::Relaxed))
    }
}
