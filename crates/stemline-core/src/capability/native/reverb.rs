//! Freeverb-style stereo bus reverb
//!
//! Eight damped comb filters per channel feed four allpass diffusers. The
//! right channel uses slightly longer delay lines for stereo spread.

use crate::capability::{EffectCapability, EffectKind, EffectParam, EffectState, ParamInfo};
use crate::types::StereoSample;

/// Comb filter lengths in samples at 44.1kHz
const COMB_LENGTHS: [usize; 8] = [1557, 1617, 1491, 1422, 1277, 1356, 1188, 1116];

/// Allpass filter lengths in samples at 44.1kHz
const ALLPASS_LENGTHS: [usize; 4] = [225, 556, 441, 341];

const STEREO_SPREAD: usize = 23;

const ALLPASS_FEEDBACK: f32 = 0.5;

/// Gain compensation for summing eight combs
const COMB_GAIN: f32 = 0.2;

const PARAMS: [ParamInfo; 4] = [
    ParamInfo::new(EffectParam::Mix, 0.3, 0.0, 1.0),
    ParamInfo::new(EffectParam::RoomSize, 0.5, 0.0, 1.0),
    ParamInfo::new(EffectParam::Damping, 0.5, 0.0, 1.0),
    ParamInfo::new(EffectParam::Width, 1.0, 0.0, 1.0),
];

struct CombFilter {
    buffer: Vec<f32>,
    pos: usize,
    filter_state: f32,
}

impl CombFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            pos: 0,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.pos];
        self.filter_state = output * (1.0 - damp) + self.filter_state * damp;
        self.buffer[self.pos] = input + self.filter_state * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
    }
}

struct AllpassFilter {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllpassFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.pos];
        let output = -input + buffered;
        self.buffer[self.pos] = input + buffered * ALLPASS_FEEDBACK;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
    }
}

pub struct ReverbEffect {
    state: EffectState<4>,
    combs_l: Vec<CombFilter>,
    combs_r: Vec<CombFilter>,
    allpass_l: Vec<AllpassFilter>,
    allpass_r: Vec<AllpassFilter>,
}

impl ReverbEffect {
    /// Allocate delay lines scaled for `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        let scale = sample_rate as f32 / 44100.0;
        let scaled = |len: usize| (len as f32 * scale) as usize;

        Self {
            state: EffectState::new(EffectKind::Reverb, PARAMS),
            combs_l: COMB_LENGTHS.iter().map(|&l| CombFilter::new(scaled(l))).collect(),
            combs_r: COMB_LENGTHS
                .iter()
                .map(|&l| CombFilter::new(scaled(l + STEREO_SPREAD)))
                .collect(),
            allpass_l: ALLPASS_LENGTHS.iter().map(|&l| AllpassFilter::new(scaled(l))).collect(),
            allpass_r: ALLPASS_LENGTHS
                .iter()
                .map(|&l| AllpassFilter::new(scaled(l + STEREO_SPREAD)))
                .collect(),
        }
    }

    /// Room size mapped to comb feedback (0.7-0.98)
    fn feedback(&self) -> f32 {
        0.7 + self.state.value(EffectParam::RoomSize) * 0.28
    }
}

impl EffectCapability for ReverbEffect {
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

        let feedback = self.feedback();
        let damp = self.state.value(EffectParam::Damping);
        let width = self.state.value(EffectParam::Width);
        let wet = self.mix();
        let dry = 1.0 - wet;

        let wet1 = wet * (width / 2.0 + 0.5);
        let wet2 = wet * ((1.0 - width) / 2.0);

        for sample in buffer.iter_mut() {
            let input = (sample.left + sample.right) * 0.5;

            let mut out_l = 0.0f32;
            let mut out_r = 0.0f32;
            for comb in &mut self.combs_l {
                out_l += comb.process(input, feedback, damp);
            }
            for comb in &mut self.combs_r {
                out_r += comb.process(input, feedback, damp);
            }
            out_l *= COMB_GAIN;
            out_r *= COMB_GAIN;

            for ap in &mut self.allpass_l {
                out_l = ap.process(out_l);
            }
            for ap in &mut self.allpass_r {
                out_r = ap.process(out_r);
            }

            let left = out_l * wet1 + out_r * wet2 + sample.left * dry;
            let right = out_r * wet1 + out_l * wet2 + sample.right * dry;
            sample.left = left;
            sample.right = right;
        }
    }

    fn reset(&mut self) {
        self.combs_l.iter_mut().for_each(CombFilter::reset);
        self.combs_r.iter_mut().for_each(CombFilter::reset);
        self.allpass_l.iter_mut().for_each(AllpassFilter::reset);
        self.allpass_r.iter_mut().for_each(AllpassFilter::reset);
    }
}
