use crate::audio_params::AudioParams;
use petalo_ports::audio::{AudioError, AudioOutputPort, AudioRenderCallback, AudioStreamHandle};
use petalo_ports::sampler::SamplerPort;
use petalo_ports::types::{AudioConfig, DeviceId, SampleTime};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

/// Render callback: pulls the sampler, applies master gain and a peak limiter.
pub struct SamplerGraph {
    sampler: Arc<dyn SamplerPort>,
    params: Arc<AudioParams>,
    limiter_gain: AtomicU32,
}

impl SamplerGraph {
    pub fn new(sampler: Arc<dyn SamplerPort>, params: Arc<AudioParams>) -> Self {
        Self {
            sampler,
            params,
            limiter_gain: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    fn apply_limiter(&self, out_l: &mut [f32], out_r: &mut [f32]) {
        let limit = 0.98_f32;
        let peak = out_l
            .iter()
            .chain(out_r.iter())
            .fold(0.0_f32, |peak, sample| peak.max(sample.abs()));

        let target_gain = if peak > limit { limit / peak } else { 1.0 };
        let current_gain = f32::from_bits(self.limiter_gain.load(Ordering::Relaxed));
        let coeff = if target_gain < current_gain { 0.25 } else { 0.01 };
        let new_gain = (current_gain + coeff * (target_gain - current_gain)).clamp(0.0, 1.0);
        self.limiter_gain.store(new_gain.to_bits(), Ordering::Relaxed);

        if new_gain < 0.999 {
            for sample in out_l.iter_mut().chain(out_r.iter_mut()) {
                *sample *= new_gain;
            }
        }
    }
}

impl AudioRenderCallback for SamplerGraph {
    fn render(&self, _sample_time_start: SampleTime, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = out_l.len().min(out_r.len());
        let (out_l, out_r) = (&mut out_l[..frames], &mut out_r[..frames]);

        self.sampler.render(out_l, out_r);

        let master = self.params.master();
        for sample in out_l.iter_mut().chain(out_r.iter_mut()) {
            *sample *= master;
        }
        self.apply_limiter(out_l, out_r);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Sampler attached, no output stream; loads are accepted, playback is not.
    Stopped,
    Running,
    /// Sampler detached; terminal.
    Disposed,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub device: Option<DeviceId>,
    pub audio: AudioConfig,
}

/// Audio engine with a single sampler unit attached to its output.
pub struct AudioEngine {
    output: Box<dyn AudioOutputPort>,
    sampler: Option<Arc<dyn SamplerPort>>,
    params: Arc<AudioParams>,
    config: EngineConfig,
    stream: Option<Box<dyn AudioStreamHandle>>,
    state: EngineState,
}

impl AudioEngine {
    pub fn new(
        output: Box<dyn AudioOutputPort>,
        sampler: Arc<dyn SamplerPort>,
        params: Arc<AudioParams>,
        config: EngineConfig,
    ) -> Self {
        sampler.set_sample_rate(config.audio.sample_rate_hz);
        Self {
            output,
            sampler: Some(sampler),
            params,
            config,
            stream: None,
            state: EngineState::Stopped,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn params(&self) -> &AudioParams {
        &self.params
    }

    /// The attached sampler; `None` once disposed.
    pub fn sampler(&self) -> Option<&Arc<dyn SamplerPort>> {
        self.sampler.as_ref()
    }

    /// Open the output stream. A failure leaves the engine stopped so the caller may retry.
    pub fn start(&mut self) -> Result<(), AudioError> {
        match self.state {
            EngineState::Running => return Ok(()),
            EngineState::Disposed => {
                return Err(AudioError::Backend("engine disposed".to_string()))
            }
            EngineState::Stopped => {}
        }
        let Some(sampler) = self.sampler.clone() else {
            return Err(AudioError::Backend("no sampler attached".to_string()));
        };

        let device_id = match self.config.device.clone() {
            Some(id) => id,
            None => self.output.default_output()?.id,
        };

        let graph = SamplerGraph::new(sampler, self.params.clone());
        let stream = self.output.open_output(
            &device_id,
            self.config.audio,
            Arc::new(graph) as Arc<dyn AudioRenderCallback>,
        )?;

        self.stream = Some(stream);
        self.state = EngineState::Running;
        tracing::info!(
            device = %device_id,
            sample_rate_hz = self.config.audio.sample_rate_hz,
            "audio engine started"
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
            tracing::info!("audio engine stopped");
        }
        if self.state == EngineState::Running {
            self.state = EngineState::Stopped;
        }
    }

    /// Stop and detach the sampler. Idempotent.
    pub fn dispose(&mut self) {
        self.stop();
        self.sampler = None;
        self.state = EngineState::Disposed;
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
