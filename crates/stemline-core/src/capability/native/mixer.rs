//! Four-input summing mixer

use crate::capability::MixerCapability;
use crate::types::{StereoSample, MIXER_FAN_IN};

/// Unity-gain sum of up to four stereo inputs
#[derive(Debug, Default)]
pub struct SummingMixer;

impl MixerCapability for SummingMixer {
    fn process(&mut self, inputs: [Option<&[StereoSample]>; MIXER_FAN_IN], out: &mut [StereoSample]) {
        out.fill(StereoSample::silence());
        for input in inputs.into_iter().flatten() {
            for (dst, src) in out.iter_mut().zip(input) {
                *dst += *src;
            }
        }
    }
}
