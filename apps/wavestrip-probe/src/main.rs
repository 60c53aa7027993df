//! wavestrip probe
//!
//! Runs a scripted zoom and pan session through the paging coordinator without
//! a window, logging every slot upload and the paging statistics.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p wavestrip-probe -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `-i, --input <PATH>`: Raw little-endian f32 PCM track (default: synthesized)
//! - `--sample-rate <HZ>`: Sample rate of the track (default: 48000)
//! - `--seconds <S>`: Length of the synthesized track (default: 600)
//! - `-c, --config <PATH>`: JSON engine configuration
//! - `-t, --ticks <N>`: Ticks in the session (default: 600)
//! - `--frame-ms <MS>`: Pause between ticks (default: 0)
//! - `--sync`: Decimate on the calling thread
//! - `--colors`: Compute spectral band colours for the track
//! - `-r, --report <PATH>`: Write a JSON session report
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod params;
mod session;

use std::f32::consts::TAU;
use std::fs;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use wavestrip_core::{EngineConfig, SampleBuffer};
use wavestrip_lod::{band_colors, texture_dimensions, SpectrumConfig};
use wavestrip_paging::PagingCoordinator;

use crate::params::ProbeParams;
use crate::session::SessionSummary;

#[allow(clippy::cast_precision_loss)]
fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }
    init_tracing();

    let params = ProbeParams::from_args();
    let config = load_config(&params)?;
    let samples = load_samples(&params)?;
    info!(
        samples = samples.len(),
        seconds = samples.duration_secs(),
        sample_rate = samples.sample_rate(),
        "track loaded"
    );

    if params.colors {
        report_colors(&samples);
    }

    let mut coordinator = if params.sync {
        PagingCoordinator::new(samples.clone(), config)?
    } else {
        PagingCoordinator::new_async(samples.clone(), config)?
    };
    let layout = *coordinator.layout();
    info!(
        block_width = layout.block_width(),
        block_height = layout.block_height(),
        atlas_width = layout.atlas_width(),
        atlas_height = layout.atlas_height(),
        is_async = coordinator.is_async(),
        "atlas ready"
    );

    let summary = session::run(&mut coordinator, params.ticks, params.frame_time);
    if !coordinator.wait_idle(Duration::from_secs(5)) {
        tracing::warn!(
            in_flight = coordinator.in_flight().len(),
            "decimations still running at exit"
        );
    }

    let (full_width, full_height) =
        texture_dimensions(samples.len(), coordinator.config().max_texture_size);
    let full_bytes = u64::from(full_width) * full_height * 8;
    let stats = *coordinator.stats();
    info!(
        ticks = summary.ticks,
        resident_ticks = summary.resident_ticks,
        uploads = summary.uploads,
        uploaded_mib = summary.uploaded_bytes as f64 / (1024.0 * 1024.0),
        elapsed = ?summary.elapsed,
        slowest_tick = ?summary.slowest_tick,
        "session finished"
    );
    info!(?stats, "paging statistics");
    info!(
        atlas_kib = coordinator.atlas().size_bytes() / 1024,
        unpaged_kib = full_bytes / 1024,
        unpaged_width = full_width,
        unpaged_height = full_height,
        "texture memory"
    );
    for (lod, window) in coordinator.resident_windows().iter().enumerate() {
        info!(lod, %window, "resident window");
    }

    if let Some(path) = &params.report {
        let report = build_report(&coordinator, &summary, full_bytes);
        fs::write(path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("writing report to {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    #[cfg(feature = "profiling-tracy")]
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,wavestrip_paging=trace,wavestrip_probe=trace")
        });
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .with(tracing_tracy::TracyLayer::default())
            .init();
    }
    #[cfg(not(feature = "profiling-tracy"))]
    {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }
}

fn load_config(params: &ProbeParams) -> anyhow::Result<EngineConfig> {
    let Some(path) = &params.config else {
        return Ok(EngineConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: EngineConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    info!(path = %path.display(), ?config, "config loaded");
    Ok(config)
}

fn load_samples(params: &ProbeParams) -> anyhow::Result<SampleBuffer> {
    if let Some(path) = &params.input {
        let bytes = fs::read(path).with_context(|| format!("reading track {}", path.display()))?;
        return Ok(SampleBuffer::from_f32_le_bytes(&bytes, params.sample_rate)?);
    }
    Ok(synthesize(params.seconds, params.sample_rate))
}

/// Two detuned partials under a slow tremolo, with a click every second.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn synthesize(seconds: f32, sample_rate: u32) -> SampleBuffer {
    let rate = sample_rate.max(1) as f32;
    let len = (seconds.max(0.0) * rate) as usize;
    let samples = (0..len)
        .map(|i| {
            let t = i as f32 / rate;
            let tone = (TAU * 220.0 * t).sin() * 0.4 + (TAU * 331.0 * t).sin() * 0.2;
            let tremolo = 0.6 + 0.4 * (TAU * 0.1 * t).sin();
            let click = if i % (sample_rate.max(1) as usize) < 32 { 0.9 } else { 0.0 };
            tone * tremolo + click
        })
        .collect();
    SampleBuffer::new(samples, sample_rate)
}

fn report_colors(samples: &SampleBuffer) {
    let config = SpectrumConfig::default();
    let colors = band_colors(samples, &config);
    let mut totals = [0u64; 3];
    for color in &colors {
        for (total, band) in totals.iter_mut().zip(color) {
            *total += u64::from(*band);
        }
    }
    let chunks = u64::try_from(colors.len().max(1)).unwrap_or(u64::MAX);
    info!(
        chunks = colors.len(),
        low = totals[0] / chunks,
        mid = totals[1] / chunks,
        high = totals[2] / chunks,
        "mean band colour"
    );
}

fn build_report(
    coordinator: &PagingCoordinator,
    summary: &SessionSummary,
    unpaged_bytes: u64,
) -> serde_json::Value {
    let stats = coordinator.stats();
    serde_json::json!({
        "config": coordinator.config(),
        "session": {
            "ticks": summary.ticks,
            "resident_ticks": summary.resident_ticks,
            "uploads": summary.uploads,
            "uploaded_bytes": summary.uploaded_bytes,
            "elapsed_ms": summary.elapsed.as_secs_f64() * 1000.0,
            "slowest_tick_ms": summary.slowest_tick.as_secs_f64() * 1000.0,
        },
        "stats": {
            "ticks": stats.ticks,
            "dispatched": stats.dispatched,
            "inline_commits": stats.inline_commits,
            "async_commits": stats.async_commits,
            "skipped": stats.skipped,
            "deferred": stats.deferred,
            "discarded": stats.discarded,
            "timed_out": stats.timed_out,
        },
        "memory": {
            "atlas_bytes": coordinator.atlas().size_bytes(),
            "unpaged_bytes": unpaged_bytes,
        },
        "resident_windows": coordinator.resident_windows(),
    })
}

fn print_help() {
    eprintln!(
        "wavestrip probe: headless paging session

USAGE:
    cargo run -p wavestrip-probe -- [OPTIONS]

TRACK OPTIONS:
    -i, --input <PATH>      Raw little-endian f32 PCM track
                            Default: synthesized tone
    --sample-rate <HZ>      Sample rate of the track (default: 48000)
    --seconds <S>           Length of the synthesized track (default: 600)
    --colors                Compute spectral band colours for the track

SESSION OPTIONS:
    -c, --config <PATH>     JSON engine configuration (missing fields use defaults)
    -t, --ticks <N>         Ticks in the scripted session (default: 600)
    --frame-ms <MS>         Pause between ticks (default: 0)
    --sync                  Decimate on the calling thread
    -r, --report <PATH>     Write a JSON session report

OTHER:
    -h, --help              Print this help message

EXAMPLES:
    # Ten minute synthesized track with worker threads
    cargo run -p wavestrip-probe

    # Inline decimation at 60 ticks per second
    cargo run -p wavestrip-probe -- --sync --frame-ms 16

    # Existing track, custom config, JSON report
    cargo run -p wavestrip-probe -- -i track.f32 -c engine.json -r report.json

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
