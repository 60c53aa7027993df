//! Min/max decimation of sample ranges into atlas texels.
//!
//! Output texel `i` is anchored at `s = start + i * f` where `start` is the
//! requested range clamped to the track and `f` the decimation factor.
//!
//! - `f == 1`: the texel is the raw sample pair `(x[s], x[s + 1])`.
//! - `f > 1`: the texel summarizes the overlapping bucket
//!   `[s - lookbehind, s + 2f + lookahead)`. The pair is `(min, max)` when the
//!   bucket's first sample is not above its last sample and `(max, min)`
//!   otherwise, so the texel keeps the direction of the transient it covers.
//!
//! Every value is divided by the attenuation constant. Buckets read the track
//! itself, so they may reach past the requested range; only indices outside
//! `[0, N)` are silence. Once a bucket starts past the end of the clamped range
//! (and is not the first bucket) the remaining texels are zero.

use rayon::prelude::*;
use wavestrip_core::{EngineConfig, SampleBuffer, SampleRange, Texel};

/// Above this many input samples per block the decimator fans out over rayon.
const PARALLEL_THRESHOLD: u64 = 1 << 20;

/// Tunable constants of the decimation kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecimationParams {
    /// Samples read before each bucket.
    pub lookbehind: u32,
    /// Samples read after each bucket.
    pub lookahead: u32,
    /// Divisor applied to every emitted value.
    pub attenuation: f32,
}

impl Default for DecimationParams {
    fn default() -> Self {
        Self {
            lookbehind: 1,
            lookahead: 1,
            attenuation: wavestrip_core::constants::DEFAULT_ATTENUATION,
        }
    }
}

impl DecimationParams {
    /// Take the kernel constants from an engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            lookbehind: config.bucket_lookbehind,
            lookahead: config.bucket_lookahead,
            attenuation: config.attenuation,
        }
    }
}

/// Read-only view of the samples a single decimation may touch.
struct SourceView<'a> {
    samples: &'a [f32],
    /// Requested range clamped to the track; anchors texels and drives the
    /// early stop.
    available: SampleRange,
    /// Whole track; reads outside it are silence.
    track: SampleRange,
}

impl<'a> SourceView<'a> {
    fn new(buffer: &'a SampleBuffer, range: SampleRange) -> Self {
        Self {
            samples: buffer.as_slice(),
            available: range.clamp_to(buffer.len()),
            track: buffer.full_range(),
        }
    }

    #[inline]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn read(&self, index: i64) -> f32 {
        if self.track.contains(index) {
            self.samples[index as usize]
        } else {
            0.0
        }
    }

    /// Compute texel `i`, or `None` once the bucket starts past the data.
    #[inline]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn texel(&self, i: usize, factor: u64, params: &DecimationParams) -> Option<Texel> {
        let factor = i64::try_from(factor.max(1)).unwrap_or(i64::MAX);
        let anchor = self
            .available
            .start
            .saturating_add(i64::try_from(i).unwrap_or(i64::MAX).saturating_mul(factor));
        let scale = params.attenuation;

        if factor == 1 {
            if anchor >= self.available.end && anchor > self.available.start {
                return None;
            }
            return Some(Texel::new(
                self.read(anchor) / scale,
                self.read(anchor + 1) / scale,
            ));
        }

        let bucket_start = anchor - i64::from(params.lookbehind);
        let bucket_end = anchor
            .saturating_add(2 * factor)
            .saturating_add(i64::from(params.lookahead));
        if bucket_start >= self.available.end && bucket_start > self.available.start {
            return None;
        }

        let first = self.read(bucket_start);
        let last = self.read(bucket_end - 1);

        // Anything outside the track reads as silence, so a bucket that hangs
        // over either end of the track always includes zero.
        let lo = bucket_start.max(self.track.start);
        let hi = bucket_end.min(self.track.end);
        let padded = bucket_start < lo || bucket_end > hi;
        let (mut min, mut max) = if padded { (0.0f32, 0.0f32) } else { (first, first) };
        if lo < hi {
            for &v in &self.samples[lo as usize..hi as usize] {
                min = min.min(v);
                max = max.max(v);
            }
        }

        let texel = if first <= last {
            Texel::new(min / scale, max / scale)
        } else {
            Texel::new(max / scale, min / scale)
        };
        Some(texel)
    }
}

/// Decimate `range` by `factor` into `output_count` texels.
pub fn decimate(
    samples: &SampleBuffer,
    range: SampleRange,
    factor: u64,
    output_count: usize,
    params: &DecimationParams,
) -> Vec<Texel> {
    let mut out = vec![Texel::ZERO; output_count];
    decimate_into(samples, range, factor, params, &mut out);
    out
}

/// Decimate into a caller-owned buffer, one texel per element of `out`.
///
/// Returns the number of texels computed before the early stop; the rest of
/// `out` is zeroed.
pub fn decimate_into(
    samples: &SampleBuffer,
    range: SampleRange,
    factor: u64,
    params: &DecimationParams,
    out: &mut [Texel],
) -> usize {
    let view = SourceView::new(samples, range);
    let mut written = out.len();
    for (i, slot) in out.iter_mut().enumerate() {
        match view.texel(i, factor, params) {
            Some(texel) => *slot = texel,
            None => {
                written = i;
                break;
            }
        }
    }
    out[written..].fill(Texel::ZERO);
    written
}

/// Parallel [`decimate_into`]; produces bit-identical output.
pub fn decimate_par(
    samples: &SampleBuffer,
    range: SampleRange,
    factor: u64,
    params: &DecimationParams,
    out: &mut [Texel],
) {
    let view = SourceView::new(samples, range);
    out.par_iter_mut()
        .enumerate()
        .with_min_len(1024)
        .for_each(|(i, slot)| {
            *slot = view.texel(i, factor, params).unwrap_or(Texel::ZERO);
        });
}

/// Decimation kernel bound to one track.
///
/// Cheap to clone; worker threads each hold their own copy.
#[derive(Clone, Debug)]
pub struct Decimator {
    samples: SampleBuffer,
    params: DecimationParams,
}

impl Decimator {
    /// Create a decimator for `samples`.
    pub fn new(samples: SampleBuffer, params: DecimationParams) -> Self {
        Self { samples, params }
    }

    /// The track this decimator reads.
    pub fn samples(&self) -> &SampleBuffer {
        &self.samples
    }

    /// Kernel constants.
    pub fn params(&self) -> &DecimationParams {
        &self.params
    }

    /// Fill `out` with the decimation of `range`, going parallel for big blocks.
    pub fn run(&self, range: SampleRange, factor: u64, out: &mut [Texel]) {
        let work = (out.len() as u64).saturating_mul(factor);
        if work >= PARALLEL_THRESHOLD {
            decimate_par(&self.samples, range, factor, &self.params, out);
        } else {
            decimate_into(&self.samples, range, factor, &self.params, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const A: f32 = 1.4;

    fn buffer(samples: &[f32]) -> SampleBuffer {
        SampleBuffer::new(samples.to_vec(), 48_000)
    }

    fn sine(n: usize, period: f32) -> SampleBuffer {
        let samples = (0..n)
            .map(|i| (i as f32 / period * std::f32::consts::TAU).sin())
            .collect();
        SampleBuffer::new(samples, 48_000)
    }

    #[test]
    fn identity_at_factor_one() {
        let input = [0.0, 1.0, 2.0, 1.0, 0.0, -1.0, -2.0, -1.0];
        let out = decimate(
            &buffer(&input),
            SampleRange::new(0, 8),
            1,
            8,
            &DecimationParams::default(),
        );

        for (i, texel) in out.iter().enumerate() {
            assert_relative_eq!(texel.lo, input[i] / A);
            let next = input.get(i + 1).copied().unwrap_or(0.0);
            assert_relative_eq!(texel.hi, next / A);
        }
    }

    #[test]
    fn rising_bucket_is_min_then_max() {
        let ramp: Vec<f32> = (0..64).map(|i| i as f32).collect();
        let out = decimate(
            &buffer(&ramp),
            SampleRange::new(0, 64),
            4,
            4,
            &DecimationParams::default(),
        );
        // Texel 1: bucket [3, 13)
        assert_relative_eq!(out[1].lo, 3.0 / A);
        assert_relative_eq!(out[1].hi, 12.0 / A);
        assert!(out[1].lo < out[1].hi);
    }

    #[test]
    fn falling_bucket_is_max_then_min() {
        let ramp: Vec<f32> = (0..64).map(|i| -(i as f32)).collect();
        let out = decimate(
            &buffer(&ramp),
            SampleRange::new(0, 64),
            4,
            4,
            &DecimationParams::default(),
        );
        assert_relative_eq!(out[1].lo, -3.0 / A);
        assert_relative_eq!(out[1].hi, -12.0 / A);
        assert!(out[1].lo > out[1].hi);
    }

    #[test]
    fn texels_stay_within_bucket_extremes() {
        let samples = sine(10_000, 97.0);
        let params = DecimationParams::default();
        for factor in [2u64, 8, 32] {
            let out = decimate(&samples, SampleRange::new(0, 10_000), factor, 128, &params);
            for (i, texel) in out.iter().enumerate() {
                let anchor = (i as u64 * factor) as i64;
                let bucket: Vec<f32> = (anchor - 1..anchor + 2 * factor as i64 + 1)
                    .map(|j| samples.get(j))
                    .collect();
                let lo = bucket.iter().copied().fold(f32::INFINITY, f32::min) / A;
                let hi = bucket.iter().copied().fold(f32::NEG_INFINITY, f32::max) / A;
                assert!(texel.min() >= lo - 1e-6 && texel.max() <= hi + 1e-6);
                assert!(texel.min() <= texel.max());
            }
        }
    }

    #[test]
    fn decimation_is_idempotent() {
        let samples = sine(50_000, 311.0);
        let params = DecimationParams::default();
        let range = SampleRange::new(1234, 40_000);
        let a = decimate(&samples, range, 16, 2048, &params);
        let b = decimate(&samples, range, 16, 2048, &params);
        let a_bits: Vec<u32> = a.iter().flat_map(|t| [t.lo.to_bits(), t.hi.to_bits()]).collect();
        let b_bits: Vec<u32> = b.iter().flat_map(|t| [t.lo.to_bits(), t.hi.to_bits()]).collect();
        assert_eq!(a_bits, b_bits);
    }

    #[test]
    fn parallel_matches_serial() {
        let samples = sine(200_000, 1021.0);
        let params = DecimationParams::default();
        let range = SampleRange::new(-500, 150_000);
        for factor in [1u64, 4, 64] {
            let serial = decimate(&samples, range, factor, 6144, &params);
            let mut parallel = vec![Texel::new(9.0, 9.0); 6144];
            decimate_par(&samples, range, factor, &params, &mut parallel);
            assert_eq!(serial, parallel, "factor {factor}");
        }
    }

    #[test]
    fn negative_start_clamps_and_pads_before_track() {
        let samples = buffer(&[1.0; 1000]);
        let params = DecimationParams::default();
        let clamped = decimate(&samples, SampleRange::new(-100, 50), 4, 20, &params);
        let direct = decimate(&samples, SampleRange::new(0, 50), 4, 20, &params);
        assert_eq!(clamped, direct);

        // Bucket [-1, 9): index -1 is padding, so zero joins the scan.
        assert_relative_eq!(clamped[0].lo, 0.0);
        assert_relative_eq!(clamped[0].hi, 1.0 / A);

        // Bucket [47, 57) reaches past the range but stays inside the track.
        assert_relative_eq!(clamped[12].lo, 1.0 / A);
        assert_relative_eq!(clamped[12].hi, 1.0 / A);

        // Bucket 13 starts at 51, past the range: early stop.
        assert!(clamped[13..].iter().all(|t| *t == Texel::ZERO));
    }

    #[test]
    fn interior_block_reads_neighbouring_samples() {
        let samples = buffer(&[1.0; 10_000]);
        let out = decimate(
            &samples,
            SampleRange::new(1000, 2000),
            4,
            250,
            &DecimationParams::default(),
        );
        // Index 999 and 2000..2005 belong to the track, so no silence leaks in.
        for texel in [out[0], out[249]] {
            assert_relative_eq!(texel.lo, 1.0 / A);
            assert_relative_eq!(texel.hi, 1.0 / A);
        }
    }

    #[test]
    fn early_stop_zeroes_reused_buffer() {
        let samples = buffer(&[0.5; 100]);
        let mut out = vec![Texel::new(7.0, 7.0); 64];
        let written = decimate_into(
            &samples,
            SampleRange::new(0, 100),
            8,
            &DecimationParams::default(),
            &mut out,
        );
        assert_eq!(written, 13);
        assert!(out[written..].iter().all(|t| *t == Texel::ZERO));
    }

    #[test]
    fn empty_track_is_silent() {
        let samples = buffer(&[]);
        let out = decimate(
            &samples,
            SampleRange::new(0, 1000),
            16,
            32,
            &DecimationParams::default(),
        );
        assert!(out.iter().all(|t| *t == Texel::ZERO));
    }

    #[test]
    fn range_past_track_is_silent() {
        let samples = sine(1000, 50.0);
        let out = decimate(
            &samples,
            SampleRange::new(5000, 9000),
            1,
            16,
            &DecimationParams::default(),
        );
        assert!(out.iter().all(|t| *t == Texel::ZERO));
    }

    #[test]
    fn custom_attenuation() {
        let params = DecimationParams {
            attenuation: 2.0,
            ..Default::default()
        };
        let out = decimate(&buffer(&[1.0, -1.0]), SampleRange::new(0, 2), 1, 2, &params);
        assert_relative_eq!(out[0].lo, 0.5);
        assert_relative_eq!(out[0].hi, -0.5);
    }

    #[test]
    fn decimator_runs_large_blocks_in_parallel() {
        let samples = sine(1 << 16, 333.0);
        let decimator = Decimator::new(samples.clone(), DecimationParams::default());
        let range = SampleRange::new(0, 1 << 16);
        let mut out = vec![Texel::ZERO; 4096];
        decimator.run(range, 512, &mut out);
        let expected = decimate(&samples, range, 512, 4096, decimator.params());
        assert_eq!(out, expected);
    }
}
