//! Level-of-detail data for wavestrip.
//!
//! Decimation of sample ranges into min/max texels, the fixed atlas slot
//! layout those texels land in, and zoom-to-LOD selection.

pub mod atlas;
pub mod decimate;
pub mod select;
pub mod spectrum;

pub use atlas::{texture_dimensions, Atlas, AtlasLayout, SlotUpload};
pub use decimate::{decimate, decimate_into, decimate_par, DecimationParams, Decimator};
pub use select::{lod_threshold, select_lod, LodSelector};
pub use spectrum::{band_colors, SpectrumConfig};
