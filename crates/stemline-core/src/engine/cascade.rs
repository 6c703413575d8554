//! Tree of fixed fan-in mixers combining any number of inputs
//!
//! Level 0 sums the inputs in groups of [`MIXER_FAN_IN`], each further level
//! sums the previous level's outputs the same way, until one output remains.
//! The shape is fixed when a timeline is prepared; processing never allocates.

use crate::capability::{CapabilityProvider, MixerCapability};
use crate::error::CapabilityAllocationError;
use crate::types::{StereoBuffer, StereoSample, MAX_BUFFER_SIZE, MIXER_FAN_IN};

struct MixerNode {
    /// `None` when allocation failed; the node then outputs silence
    mixer: Option<Box<dyn MixerCapability>>,
    output: StereoBuffer,
}

impl MixerNode {
    fn process(&mut self, inputs: [Option<&[StereoSample]>; MIXER_FAN_IN], frames: usize) {
        self.output.set_len_from_capacity(frames);
        match self.mixer.as_mut() {
            Some(mixer) => mixer.process(inputs, self.output.as_mut_slice()),
            None => self.output.fill_silence(),
        }
    }
}

pub struct MixingCascade {
    inputs: usize,
    levels: Vec<Vec<MixerNode>>,
}

impl MixingCascade {
    /// Node count per level for `inputs` inputs, leaf level first
    pub fn level_sizes(inputs: usize) -> Vec<usize> {
        let mut sizes = Vec::new();
        let mut width = inputs;
        while width > 0 {
            let nodes = width.div_ceil(MIXER_FAN_IN);
            sizes.push(nodes);
            if nodes == 1 {
                break;
            }
            width = nodes;
        }
        sizes
    }

    /// Allocate the tree for `inputs` inputs
    ///
    /// Nodes the provider fails to create are recorded in the returned error
    /// list and replaced by silent nodes.
    pub fn build(
        inputs: usize,
        provider: &dyn CapabilityProvider,
    ) -> (Self, Vec<CapabilityAllocationError>) {
        let mut failures = Vec::new();
        let levels = Self::level_sizes(inputs)
            .into_iter()
            .enumerate()
            .map(|(level, nodes)| {
                (0..nodes)
                    .map(|node| {
                        let mixer = match provider.create_mixer() {
                            Ok(mixer) => Some(mixer),
                            Err(e) => {
                                failures.push(e.for_slot(format!("mixer level {} node {}", level, node)));
                                None
                            }
                        };
                        MixerNode {
                            mixer,
                            output: StereoBuffer::silence(MAX_BUFFER_SIZE),
                        }
                    })
                    .collect()
            })
            .collect();
        (Self { inputs, levels }, failures)
    }

    pub fn input_count(&self) -> usize {
        self.inputs
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Mix `frames` frames into `out`
    ///
    /// `input(i)` returns input `i`, or `None` for silence. With no inputs
    /// `out` is silent.
    pub fn process<'a, F>(&mut self, input: F, out: &mut [StereoSample])
    where
        F: Fn(usize) -> Option<&'a [StereoSample]>,
    {
        let frames = out.len().min(MAX_BUFFER_SIZE);
        if self.levels.is_empty() {
            out.fill(StereoSample::silence());
            return;
        }

        let count = self.inputs;
        for (idx, node) in self.levels[0].iter_mut().enumerate() {
            let base = idx * MIXER_FAN_IN;
            let inputs: [Option<&[StereoSample]>; MIXER_FAN_IN] = std::array::from_fn(|k| {
                let i = base + k;
                if i < count {
                    input(i).map(|s| &s[..frames.min(s.len())])
                } else {
                    None
                }
            });
            node.process(inputs, frames);
        }

        for level in 1..self.levels.len() {
            let (lower, upper) = self.levels.split_at_mut(level);
            let previous = &lower[level - 1];
            for (idx, node) in upper[0].iter_mut().enumerate() {
                let base = idx * MIXER_FAN_IN;
                let inputs: [Option<&[StereoSample]>; MIXER_FAN_IN] =
                    std::array::from_fn(|k| previous.get(base + k).map(|n| n.output.as_slice()));
                node.process(inputs, frames);
            }
        }

        let root = &self.levels[self.levels.len() - 1][0];
        out[..frames].copy_from_slice(&root.output.as_slice()[..frames]);
        out[frames..].fill(StereoSample::silence());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::NativeProvider;
    use crate::capability::{AudioPlayerCapability, EffectCapability, EffectKind};
    use crate::error::CapabilityKind;

    fn impulses(n: usize, frames: usize) -> Vec<StereoBuffer> {
        (0..n)
            .map(|i| {
                let mut buffer = StereoBuffer::silence(frames);
                buffer[i % frames] = StereoSample::mono(1.0);
                buffer
            })
            .collect()
    }

    fn direct_sum(inputs: &[StereoBuffer], frames: usize) -> StereoBuffer {
        let mut sum = StereoBuffer::silence(frames);
        for input in inputs {
            sum.add_scaled(input.as_slice(), 1.0);
        }
        sum
    }

    #[test]
    fn test_level_sizes() {
        assert_eq!(MixingCascade::level_sizes(0), Vec::<usize>::new());
        assert_eq!(MixingCascade::level_sizes(1), vec![1]);
        assert_eq!(MixingCascade::level_sizes(4), vec![1]);
        assert_eq!(MixingCascade::level_sizes(5), vec![2, 1]);
        assert_eq!(MixingCascade::level_sizes(16), vec![4, 1]);
        assert_eq!(MixingCascade::level_sizes(17), vec![5, 2, 1]);
        assert_eq!(MixingCascade::level_sizes(64), vec![16, 4, 1]);
    }

    #[test]
    fn test_cascade_matches_direct_sum() {
        let frames = 32;
        for n in [1usize, 4, 5, 8, 16, 17] {
            let inputs = impulses(n, frames);
            let (mut cascade, failures) = MixingCascade::build(n, &NativeProvider);
            assert!(failures.is_empty());

            let mut out = vec![StereoSample::silence(); frames];
            cascade.process(|i| inputs.get(i).map(|b| b.as_slice()), &mut out);

            let expected = direct_sum(&inputs, frames);
            assert_eq!(out.as_slice(), expected.as_slice(), "n = {}", n);
        }
    }

    #[test]
    fn test_empty_cascade_is_silent() {
        let (mut cascade, _) = MixingCascade::build(0, &NativeProvider);
        let mut out = vec![StereoSample::mono(1.0); 16];
        cascade.process(|_| None, &mut out);
        assert!(out.iter().all(|s| *s == StereoSample::silence()));
    }

    struct NoMixers;

    impl CapabilityProvider for NoMixers {
        fn create_player(
            &self,
            sample_rate: u32,
        ) -> Result<Box<dyn AudioPlayerCapability>, CapabilityAllocationError> {
            NativeProvider.create_player(sample_rate)
        }

        fn create_effect(
            &self,
            kind: EffectKind,
            sample_rate: u32,
        ) -> Result<Box<dyn EffectCapability>, CapabilityAllocationError> {
            NativeProvider.create_effect(kind, sample_rate)
        }

        fn create_mixer(&self) -> Result<Box<dyn MixerCapability>, CapabilityAllocationError> {
            Err(CapabilityAllocationError::new(CapabilityKind::Mixer, "exhausted"))
        }
    }

    #[test]
    fn test_failed_mixer_degrades_to_silence() {
        let frames = 16;
        let inputs = impulses(6, frames);
        let (mut cascade, failures) = MixingCascade::build(6, &NoMixers);
        assert_eq!(failures.len(), 3);
        assert_eq!(failures[0].slot, "mixer level 0 node 0");

        let mut out = vec![StereoSample::mono(1.0); frames];
        cascade.process(|i| inputs.get(i).map(|b| b.as_slice()), &mut out);
        assert!(out.iter().all(|s| *s == StereoSample::silence()));
    }
}
