//! Atlas slot layout and the flat texel buffer it partitions.
//!
//! Every LOD owns one block of `block_width x block_height` texels. All
//! blocks share the atlas row width and are stacked vertically, so LOD `k`
//! occupies rows `[k * block_height, (k + 1) * block_height)`.

use std::ops::Range;

use wavestrip_core::{EngineConfig, Error, Lod, Result, SampleRange, Texel};

/// Constant block geometry, computed once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    row_width: u32,
    block_rows: u32,
    lod_count: usize,
}

impl AtlasLayout {
    /// Derive the block geometry from the configuration.
    ///
    /// `block_height = ceil(viewport_width / row_width + block_padding)`, with
    /// the row width clamped to the texture limit and the block height clamped
    /// so all slots fit under it.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(config: &EngineConfig) -> Result<Self> {
        if config.lod_count == 0 {
            return Err(Error::InvalidConfig("atlas needs at least one LOD".into()));
        }
        let row_width = config.atlas_row_width.min(config.max_texture_size);
        if row_width == 0 {
            return Err(Error::InvalidConfig("atlas row width is zero".into()));
        }

        let rows = (f64::from(config.viewport_width) / f64::from(row_width)
            + f64::from(config.block_padding))
        .ceil();
        let max_rows = config.max_texture_size / u32::try_from(config.lod_count).unwrap_or(u32::MAX);
        let block_rows = (rows.max(0.0) as u64).min(u64::from(max_rows)) as u32;
        if block_rows == 0 {
            return Err(Error::InvalidConfig(format!(
                "block size is zero ({} LODs do not fit in {} rows)",
                config.lod_count, config.max_texture_size
            )));
        }

        Ok(Self {
            row_width,
            block_rows,
            lod_count: config.lod_count,
        })
    }

    /// Block width in texels (the atlas row width).
    #[inline]
    pub const fn block_width(&self) -> u32 {
        self.row_width
    }

    /// Block height in rows.
    #[inline]
    pub const fn block_height(&self) -> u32 {
        self.block_rows
    }

    /// Texels per block.
    #[inline]
    pub const fn block_size(&self) -> usize {
        self.row_width as usize * self.block_rows as usize
    }

    /// Number of slots.
    #[inline]
    pub const fn lod_count(&self) -> usize {
        self.lod_count
    }

    /// Atlas width in texels.
    #[inline]
    pub const fn atlas_width(&self) -> u32 {
        self.row_width
    }

    /// Atlas height in rows.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn atlas_height(&self) -> u32 {
        self.block_rows * self.lod_count as u32
    }

    /// Top-left corner of a LOD's slot.
    #[inline]
    pub fn block_origin(&self, lod: Lod) -> (u32, u32) {
        (0, u32::from(lod.0) * self.block_rows)
    }

    /// Flat texel indices of a LOD's slot.
    #[inline]
    pub fn slot_span(&self, lod: Lod) -> Range<usize> {
        let start = lod.index() * self.block_size();
        start..start + self.block_size()
    }

    /// Samples covered by one block at `lod`.
    #[inline]
    pub const fn block_samples(&self, lod: Lod) -> u64 {
        (self.block_size() as u64).saturating_mul(lod.factor())
    }
}

/// Texel write produced by a page-in, shaped for a partial texture upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotUpload {
    pub lod: Lod,
    pub origin_x: u32,
    pub origin_y: u32,
    pub width: u32,
    pub height: u32,
    /// Sample range now resident in the slot.
    pub range: SampleRange,
}

/// Fixed-capacity texel buffer partitioned into one slot per LOD.
pub struct Atlas {
    layout: AtlasLayout,
    texels: Vec<Texel>,
}

impl Atlas {
    /// Allocate a silent atlas for `layout`.
    pub fn new(layout: AtlasLayout) -> Self {
        Self {
            texels: vec![Texel::ZERO; layout.block_size() * layout.lod_count()],
            layout,
        }
    }

    /// Slot geometry.
    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    /// Copy a decimated block into its slot.
    ///
    /// Short blocks are zero-filled; texels past the block size are ignored.
    pub fn write_slot(&mut self, lod: Lod, range: SampleRange, block: &[Texel]) -> SlotUpload {
        let slot = &mut self.texels[self.layout.slot_span(lod)];
        let n = block.len().min(slot.len());
        slot[..n].copy_from_slice(&block[..n]);
        slot[n..].fill(Texel::ZERO);

        let (origin_x, origin_y) = self.layout.block_origin(lod);
        SlotUpload {
            lod,
            origin_x,
            origin_y,
            width: self.layout.block_width(),
            height: self.layout.block_height(),
            range,
        }
    }

    /// Texels of one slot.
    pub fn slot(&self, lod: Lod) -> &[Texel] {
        &self.texels[self.layout.slot_span(lod)]
    }

    /// All texels, slot after slot.
    pub fn texels(&self) -> &[Texel] {
        &self.texels
    }

    /// Whole atlas as interleaved min/max floats.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.texels)
    }

    /// Interleaved floats for one upload.
    pub fn region_floats(&self, upload: &SlotUpload) -> &[f32] {
        bytemuck::cast_slice(self.slot(upload.lod))
    }

    /// Size of the texel buffer in bytes.
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of_val(self.texels.as_slice())
    }
}

/// Texture size a whole-track (non-paged) texture of `sample_count` texels needs.
///
/// Width is the next power of two of `sqrt(n)` clamped to `max_texture_size`;
/// height is the next power of two of the rows needed at that width.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn texture_dimensions(sample_count: u64, max_texture_size: u32) -> (u32, u64) {
    let base = next_power_of_two((sample_count as f64).sqrt());
    let width = base.min(u64::from(max_texture_size)).max(1);
    let height = next_power_of_two(sample_count.div_ceil(width) as f64);
    (width as u32, height)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn next_power_of_two(x: f64) -> u64 {
    if x < 1.0 {
        return 1;
    }
    (x.ceil() as u64).next_power_of_two()
}
