//! Scripted zoom and pan session.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use wavestrip_core::SampleBuffer;
use wavestrip_lod::LodSelector;
use wavestrip_paging::{PagingCoordinator, TickOutcome};

/// A view the session passes through.
#[derive(Debug, Clone, Copy)]
struct Keyframe {
    /// Centre of the view as a fraction of the track.
    center: f64,
    /// Visible samples.
    window: f64,
}

/// Totals for one session.
#[derive(Debug, Default)]
pub struct SessionSummary {
    pub ticks: usize,
    pub resident_ticks: usize,
    pub uploads: usize,
    pub uploaded_bytes: usize,
    pub elapsed: Duration,
    pub slowest_tick: Duration,
}

/// Keyframes: zoom out from the start to the whole track, pan, zoom back in.
#[allow(clippy::cast_precision_loss)]
fn script(samples: &SampleBuffer, viewport_px: u32) -> Vec<Keyframe> {
    let n = samples.len().max(1) as f64;
    let px = f64::from(viewport_px);
    vec![
        Keyframe { center: 0.0, window: px },
        Keyframe { center: 0.05, window: px * 16.0 },
        Keyframe { center: 0.5, window: n },
        Keyframe { center: 0.75, window: n / 8.0 },
        Keyframe { center: 0.3, window: n / 8.0 },
        Keyframe { center: 0.31, window: px * 2.0 },
        Keyframe { center: 0.9, window: px * 4.0 },
    ]
}

/// Interpolate the script at `t` in `[0, 1]`, zooming geometrically.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn view_at(keys: &[Keyframe], t: f64) -> Keyframe {
    let segments = keys.len().saturating_sub(1).max(1);
    let pos = t.clamp(0.0, 1.0) * segments as f64;
    let index = (pos.floor() as usize).min(segments - 1);
    let (a, b) = (keys[index], keys[(index + 1).min(keys.len() - 1)]);
    let f = pos - index as f64;
    Keyframe {
        center: a.center + (b.center - a.center) * f,
        window: a.window * (b.window / a.window).powf(f),
    }
}

/// Run `ticks` frames of the scripted session.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
pub fn run(
    coordinator: &mut PagingCoordinator,
    ticks: usize,
    frame_time: Duration,
) -> SessionSummary {
    let samples = coordinator.decimator().samples().clone();
    let mut selector = LodSelector::from_config(coordinator.config());
    let keys = script(&samples, coordinator.config().viewport_width);
    let cursor_step = i64::from(samples.sample_rate()) / 60;

    let mut summary = SessionSummary::default();
    let started = Instant::now();
    for tick in 0..ticks {
        let key = view_at(&keys, tick as f64 / ticks.saturating_sub(1).max(1) as f64);
        let window = key.window.max(1.0) as u64;
        let offset = (key.center * samples.len() as f64) as i64 - (window / 2) as i64;
        let viewport = selector.viewport(offset, window);

        coordinator.set_playback_cursor(Some(tick as i64 * cursor_step));
        let tick_started = Instant::now();
        let outcome = coordinator.tick(&viewport);
        summary.slowest_tick = summary.slowest_tick.max(tick_started.elapsed());
        if outcome == TickOutcome::Resident {
            summary.resident_ticks += 1;
        }

        for upload in coordinator.take_uploads() {
            let floats = coordinator.atlas().region_floats(&upload);
            debug!(
                lod = %upload.lod,
                range = %upload.range,
                x = upload.origin_x,
                y = upload.origin_y,
                width = upload.width,
                height = upload.height,
                "slot upload"
            );
            summary.uploads += 1;
            summary.uploaded_bytes += std::mem::size_of_val(floats);
        }

        if tick % 100 == 0 {
            info!(
                tick,
                lod = %viewport.lod,
                offset,
                window,
                ?outcome,
                in_flight = coordinator.in_flight().len(),
                "session progress"
            );
        }
        if !frame_time.is_zero() {
            thread::sleep(frame_time);
        }
    }
    summary.ticks = ticks;
    summary.elapsed = started.elapsed();
    summary
}
