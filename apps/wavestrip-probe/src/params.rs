//! Command line parameters.

use std::path::PathBuf;
use std::time::Duration;

/// Probe session parameters.
#[derive(Debug, Clone)]
pub struct ProbeParams {
    /// Raw little-endian f32 PCM track (synthesized when absent).
    pub input: Option<PathBuf>,
    /// Sample rate of the input or synthesized track.
    pub sample_rate: u32,
    /// Length of the synthesized track in seconds.
    pub seconds: f32,
    /// JSON engine configuration.
    pub config: Option<PathBuf>,
    /// Ticks in the scripted session.
    pub ticks: usize,
    /// Pause between ticks.
    pub frame_time: Duration,
    /// Decimate on the calling thread instead of worker threads.
    pub sync: bool,
    /// Compute spectral band colours for the track.
    pub colors: bool,
    /// Write a JSON session report here.
    pub report: Option<PathBuf>,
}

impl Default for ProbeParams {
    fn default() -> Self {
        Self {
            input: None,
            sample_rate: 48_000,
            seconds: 600.0,
            config: None,
            ticks: 600,
            frame_time: Duration::ZERO,
            sync: false,
            colors: false,
            report: None,
        }
    }
}

impl ProbeParams {
    /// Parse probe parameters from command line arguments.
    pub fn from_args() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut params = Self::default();
        let args: Vec<String> = args.into_iter().collect();

        let mut i = 0;
        while i < args.len() {
            let value = args.get(i + 1);
            let mut consumed = true;
            match (args[i].as_str(), value) {
                ("-i" | "--input", Some(v)) => params.input = Some(PathBuf::from(v)),
                ("-c" | "--config", Some(v)) => params.config = Some(PathBuf::from(v)),
                ("-r" | "--report", Some(v)) => params.report = Some(PathBuf::from(v)),
                ("--sample-rate", Some(v)) => {
                    if let Ok(rate) = v.parse() {
                        params.sample_rate = rate;
                    }
                }
                ("--seconds", Some(v)) => {
                    if let Ok(seconds) = v.parse() {
                        params.seconds = seconds;
                    }
                }
                ("-t" | "--ticks", Some(v)) => {
                    if let Ok(ticks) = v.parse() {
                        params.ticks = ticks;
                    }
                }
                ("--frame-ms", Some(v)) => {
                    if let Ok(ms) = v.parse() {
                        params.frame_time = Duration::from_millis(ms);
                    }
                }
                ("--sync", _) => {
                    params.sync = true;
                    consumed = false;
                }
                ("--colors", _) => {
                    params.colors = true;
                    consumed = false;
                }
                _ => consumed = false,
            }
            i += if consumed { 2 } else { 1 };
        }

        params
    }
}
