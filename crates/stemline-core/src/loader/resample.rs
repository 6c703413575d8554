//! Sample rate conversion to the engine rate with rubato

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use thiserror::Error;

use crate::types::{StereoBuffer, StereoSample};

#[derive(Error, Debug)]
pub enum ResampleError {
    #[error("failed to create resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),

    #[error("invalid sample rate {0}")]
    InvalidRate(u32),
}

/// Convert `input` from `from` Hz to `to` Hz
///
/// Returns the input untouched when the rates match. The output length is
/// `floor(frames * to / from)` and the filter delay is trimmed, so frame `n`
/// of the input lands on frame `n * to / from` of the output.
pub fn resample(input: StereoBuffer, from: u32, to: u32) -> Result<StereoBuffer, ResampleError> {
    if from == 0 {
        return Err(ResampleError::InvalidRate(from));
    }
    if to == 0 {
        return Err(ResampleError::InvalidRate(to));
    }
    if from == to || input.is_empty() {
        return Ok(input);
    }

    let frames = input.len();
    let expected = (frames as u64 * to as u64 / from as u64) as usize;
    log::debug!("resampling {} frames {} Hz -> {} Hz", frames, from, to);

    let (left, right): (Vec<f32>, Vec<f32>) = input.iter().map(|s| (s.left, s.right)).unzip();

    // One chunk covering the whole asset, then zeros until the delayed tail is out
    let mut resampler = FastFixedIn::<f32>::new(
        to as f64 / from as f64,
        1.0,
        PolynomialDegree::Septic,
        frames,
        2,
    )?;
    let delay = resampler.output_delay();
    let mut planar = resampler.process(&[left, right], None)?;
    while planar[0].len() < delay + expected {
        let tail = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
        if tail[0].is_empty() {
            break;
        }
        for (channel, rest) in planar.iter_mut().zip(tail) {
            channel.extend(rest);
        }
    }

    let mut samples: Vec<StereoSample> = planar[0]
        .iter()
        .zip(&planar[1])
        .skip(delay)
        .map(|(&l, &r)| StereoSample::new(l, r))
        .collect();
    samples.resize(expected, StereoSample::silence());
    Ok(StereoBuffer::from_vec(samples))
}
