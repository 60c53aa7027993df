//! Synthetic tracks.

#![allow(clippy::cast_precision_loss)]

use std::f32::consts::TAU;

use wavestrip_core::SampleBuffer;

/// Sample rate used by every synthetic track.
pub const SAMPLE_RATE: u32 = 48_000;

/// The eight-sample triangle `[0, 1, 2, 1, 0, -1, -2, -1]`.
pub fn triangle() -> SampleBuffer {
    SampleBuffer::new(vec![0.0, 1.0, 2.0, 1.0, 0.0, -1.0, -2.0, -1.0], SAMPLE_RATE)
}

/// `len` samples rising linearly from -1 to just under 1.
pub fn ramp(len: usize) -> SampleBuffer {
    let step = 2.0 / len.max(1) as f32;
    SampleBuffer::new((0..len).map(|i| i as f32 * step - 1.0).collect(), SAMPLE_RATE)
}

/// Sine of `period` samples and peak `amplitude`.
pub fn sine(len: usize, period: f32, amplitude: f32) -> SampleBuffer {
    SampleBuffer::new(
        (0..len)
            .map(|i| (TAU * i as f32 / period).sin() * amplitude)
            .collect(),
        SAMPLE_RATE,
    )
}

/// Linear chirp from `start_hz` to `end_hz` over `len` samples.
pub fn chirp(len: usize, start_hz: f32, end_hz: f32) -> SampleBuffer {
    let rate = SAMPLE_RATE as f32;
    let duration = len as f32 / rate;
    let sweep = (end_hz - start_hz) / duration.max(f32::EPSILON);
    SampleBuffer::new(
        (0..len)
            .map(|i| {
                let t = i as f32 / rate;
                (TAU * (start_hz * t + 0.5 * sweep * t * t)).sin()
            })
            .collect(),
        SAMPLE_RATE,
    )
}

/// `len` copies of `value`.
pub fn constant(len: usize, value: f32) -> SampleBuffer {
    SampleBuffer::new(vec![value; len], SAMPLE_RATE)
}
