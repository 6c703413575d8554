//! Stereo flanger
//!
//! A short delay line swept by a sine LFO. The right channel LFO runs a
//! quarter period ahead of the left for width.

use std::f32::consts::TAU;

use crate::capability::{EffectCapability, EffectKind, EffectParam, EffectState, ParamInfo};
use crate::types::StereoSample;

/// Shortest delay of the sweep in seconds
const MIN_DELAY_SECONDS: f32 = 0.0005;

/// Sweep range at depth 1.0 in seconds
const MAX_SWEEP_SECONDS: f32 = 0.008;

const PARAMS: [ParamInfo; 4] = [
    ParamInfo::new(EffectParam::Mix, 0.5, 0.0, 1.0),
    ParamInfo::new(EffectParam::Depth, 0.6, 0.0, 1.0),
    ParamInfo::new(EffectParam::Rate, 0.25, 0.02, 10.0),
    ParamInfo::new(EffectParam::Feedback, 0.4, 0.0, 0.95),
];

/// Stereo delay line with fractional reads
struct DelayLine {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        Self {
            buffer_l: vec![0.0; len],
            buffer_r: vec![0.0; len],
            write_pos: 0,
        }
    }

    /// Linear-interpolated read `delay` samples behind the write head
    #[inline]
    fn read(buffer: &[f32], write_pos: usize, delay: f32) -> f32 {
        let len = buffer.len();
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;
        let a = (write_pos + len - whole.min(len - 1)) % len;
        let b = (a + len - 1) % len;
        buffer[a] * (1.0 - frac) + buffer[b] * frac
    }

    #[inline]
    fn write(&mut self, left: f32, right: f32) {
        self.buffer_l[self.write_pos] = left;
        self.buffer_r[self.write_pos] = right;
        self.write_pos = (self.write_pos + 1) % self.buffer_l.len();
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }
}

pub struct FlangerEffect {
    state: EffectState<4>,
    delay: DelayLine,
    sample_rate: f32,
    /// LFO phase in 0.0-1.0
    phase: f32,
}

impl FlangerEffect {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1) as f32;
        let len = ((MIN_DELAY_SECONDS + MAX_SWEEP_SECONDS) * sample_rate) as usize + 4;
        Self {
            state: EffectState::new(EffectKind::Flanger, PARAMS),
            delay: DelayLine::new(len),
            sample_rate,
            phase: 0.0,
        }
    }

    #[inline]
    fn delay_samples(&self, phase: f32, depth: f32) -> f32 {
        let lfo = 0.5 + 0.5 * (phase * TAU).sin();
        (MIN_DELAY_SECONDS + MAX_SWEEP_SECONDS * depth * lfo) * self.sample_rate
    }
}

impl EffectCapability for FlangerEffect {
    fn kind(&self) -> EffectKind {
        self.state.kind()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.state.set_enabled(enabled);
    }

    fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    fn set_mix(&mut self, mix: f32) {
        self.state.set(EffectParam::Mix, mix);
    }

    fn mix(&self) -> f32 {
        self.state.value(EffectParam::Mix)
    }

    fn set_param(&mut self, param: EffectParam, value: f32) -> bool {
        self.state.set(param, value)
    }

    fn param(&self, param: EffectParam) -> Option<f32> {
        self.state.get(param)
    }

    fn process(&mut self, buffer: &mut [StereoSample]) {
        if !self.state.is_enabled() {
            return;
        }

        let wet = self.mix();
        let dry = 1.0 - wet;
        let depth = self.state.value(EffectParam::Depth);
        let feedback = self.state.value(EffectParam::Feedback);
        let phase_step = self.state.value(EffectParam::Rate) / self.sample_rate;

        for sample in buffer.iter_mut() {
            let delay_l = self.delay_samples(self.phase, depth);
            let delay_r = self.delay_samples((self.phase + 0.25).fract(), depth);

            let delayed_l = DelayLine::read(&self.delay.buffer_l, self.delay.write_pos, delay_l);
            let delayed_r = DelayLine::read(&self.delay.buffer_r, self.delay.write_pos, delay_r);

            self.delay
                .write(sample.left + delayed_l * feedback, sample.right + delayed_r * feedback);

            sample.left = sample.left * dry + delayed_l * wet;
            sample.right = sample.right * dry + delayed_r * wet;

            self.phase = (self.phase + phase_step).fract();
        }
    }

    fn reset(&mut self) {
        self.delay.reset();
        self.phase = 0.0;
    }
}
