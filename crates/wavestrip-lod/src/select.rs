//! Zoom level to LOD mapping.

use wavestrip_core::{EngineConfig, Lod, ViewportState};

/// Pick the LOD for a visible window of `window` samples.
///
/// `floor(log2(window / viewport_px))`, clamped to `[0, lod_count - 1]`.
/// Windows narrower than the viewport select LOD 0.
pub fn select_lod(window: u64, viewport_px: u32, lod_count: usize) -> Lod {
    if viewport_px == 0 || lod_count == 0 {
        return Lod::ZERO;
    }
    let ratio = window / u64::from(viewport_px);
    if ratio == 0 {
        return Lod::ZERO;
    }
    Lod(u8::try_from(ratio.ilog2()).unwrap_or(u8::MAX)).clamp_to(lod_count)
}

/// Smallest window that selects `lod` (ignoring the top clamp).
#[inline]
pub fn lod_threshold(lod: Lod, viewport_px: u32) -> u64 {
    u64::from(viewport_px) << lod.0
}

/// Stateful LOD selection with an optional hysteresis band.
///
/// A level change only happens once the window has moved past the
/// threshold by `hysteresis` (a fraction of the threshold). With a band of
/// zero this is exactly [`select_lod`].
#[derive(Debug, Clone)]
pub struct LodSelector {
    viewport_px: u32,
    lod_count: usize,
    hysteresis: f64,
    current: Option<Lod>,
}

impl LodSelector {
    pub fn new(viewport_px: u32, lod_count: usize, hysteresis: f32) -> Self {
        Self {
            viewport_px,
            lod_count,
            hysteresis: f64::from(hysteresis.clamp(0.0, 0.5)),
            current: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.viewport_width,
            config.lod_count,
            config.lod_hysteresis,
        )
    }

    /// LOD chosen by the last call to [`select`](Self::select).
    pub fn current(&self) -> Option<Lod> {
        self.current
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn select(&mut self, window: u64) -> Lod {
        let raw = select_lod(window, self.viewport_px, self.lod_count);
        let window = window as f64;
        let lod = match self.current {
            Some(current) if raw > current => {
                let mut k = current.0;
                while k < raw.0
                    && window >= self.threshold(Lod(k + 1)) * (1.0 + self.hysteresis)
                {
                    k += 1;
                }
                Lod(k)
            }
            Some(current) if raw < current => {
                let mut k = current.0;
                while k > raw.0 && window < self.threshold(Lod(k)) * (1.0 - self.hysteresis) {
                    k -= 1;
                }
                Lod(k)
            }
            _ => raw,
        };
        self.current = Some(lod);
        lod
    }

    /// Build the per-tick viewport for `offset` and `window`.
    pub fn viewport(&mut self, offset: i64, window: u64) -> ViewportState {
        let lod = self.select(window);
        ViewportState::new(offset, window, lod)
    }

    #[allow(clippy::cast_precision_loss)]
    fn threshold(&self, lod: Lod) -> f64 {
        lod_threshold(lod, self.viewport_px) as f64
    }
}
