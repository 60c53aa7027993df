//! Per-chunk spectral band colours.
//!
//! Each `window`-sample chunk is transformed together with `padding` windows
//! of context on either side. The lower quarter of the spectrum is summed into
//! low, mid and high bands, which become the chunk's RGB colour.

use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use wavestrip_core::SampleBuffer;

/// Band colouring parameters.
#[derive(Debug, Clone)]
pub struct SpectrumConfig {
    /// Samples per coloured chunk.
    pub window: usize,
    /// Windows of context added on each side before the transform.
    pub padding: usize,
    /// Low/mid split as a fraction of `window / 2` bins.
    pub low_split: f32,
    /// Mid/high split as a fraction of `window / 2` bins.
    pub mid_split: f32,
    /// Value of the dominant band.
    pub scale: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            window: 442,
            padding: 2,
            low_split: 0.05,
            mid_split: 0.25,
            scale: 200.0,
        }
    }
}

impl SpectrumConfig {
    fn fft_size(&self) -> usize {
        self.window * (1 + 2 * self.padding)
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn band_edges(&self, bins: usize) -> (usize, usize) {
        let half = self.window as f32 / 2.0;
        let low = ((half * self.low_split) as usize).min(bins);
        let mid = ((half * self.mid_split) as usize).clamp(low, bins);
        (low, mid)
    }
}

/// One `[low, mid, high]` colour per chunk of `config.window` samples.
///
/// Silent chunks produce `[0, 0, 0]`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
pub fn band_colors(samples: &SampleBuffer, config: &SpectrumConfig) -> Vec<[u8; 3]> {
    if config.window == 0 || samples.is_empty() {
        return Vec::new();
    }
    let chunks = samples.len().div_ceil(config.window as u64) as usize;
    let size = config.fft_size();
    let fft = FftPlanner::<f32>::new().plan_fft_forward(size);
    let bins = (size as f32 / 4.0).ceil() as usize;
    let (low_edge, mid_edge) = config.band_edges(bins);
    let scratch_len = fft.get_inplace_scratch_len();

    (0..chunks)
        .into_par_iter()
        .map_init(
            || {
                (
                    vec![Complex::new(0.0f32, 0.0); size],
                    vec![Complex::new(0.0f32, 0.0); scratch_len],
                )
            },
            |(buffer, scratch), chunk| {
                let start = (chunk * config.window) as i64;
                let first = start - (config.padding * config.window) as i64;
                for (i, value) in buffer.iter_mut().enumerate() {
                    *value = Complex::new(samples.get(first + i as i64), 0.0);
                }
                fft.process_with_scratch(buffer, scratch);

                let magnitudes = buffer[..bins].iter().map(|c| c.norm());
                let mut bands = [0.0f32; 3];
                for (bin, magnitude) in magnitudes.enumerate() {
                    let band = if bin < low_edge {
                        0
                    } else if bin < mid_edge {
                        1
                    } else {
                        2
                    };
                    bands[band] += magnitude;
                }
                to_color(bands, config.scale)
            },
        )
        .collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_color(bands: [f32; 3], scale: f32) -> [u8; 3] {
    let peak = bands[0].max(bands[1]).max(bands[2]);
    if peak <= 0.0 || !peak.is_finite() {
        return [0, 0, 0];
    }
    bands.map(|band| (band / peak * scale).round().clamp(0.0, 255.0) as u8)
}
