//! Images with a resolution-level chain.

use image::{Rgba, RgbaImage, imageops::FilterType};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{AtlasExtendError, Result};

/// Storage format of a layered array or source image. Both formats hold RGBA8
/// texels; they differ in how the renderer decodes them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Linear data (normal and specular maps).
    #[default]
    Rgba8Unorm,
    /// Color data (albedo).
    Rgba8Srgb,
}

impl FromStr for PixelFormat {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgba8" | "rgba8_unorm" | "unorm" | "linear" => Ok(Self::Rgba8Unorm),
            "rgba8_srgb" | "srgb" => Ok(Self::Rgba8Srgb),
            _ => Err(()),
        }
    }
}

/// Number of levels in a full chain down to 1x1.
pub fn full_chain_len(width: u32, height: u32) -> usize {
    let m = width.max(height).max(1);
    (32 - m.leading_zeros()) as usize
}

/// Size of level `m` for a base of `width x height`.
pub fn level_size(width: u32, height: u32, m: usize) -> (u32, u32) {
    let shift = m.min(31) as u32;
    ((width >> shift).max(1), (height >> shift).max(1))
}

/// Structural check shared by every source accepted into a layered array.
pub fn validate_square_pow2(width: u32, height: u32) -> std::result::Result<(), String> {
    if width == 0 || height == 0 {
        return Err(format!("empty image ({width}x{height})"));
    }
    if width != height {
        return Err(format!("not square ({width}x{height})"));
    }
    if !width.is_power_of_two() {
        return Err(format!("not power-of-two sized ({width}x{height})"));
    }
    Ok(())
}

/// One image plus its coarser copies. Level 0 is the finest.
#[derive(Debug, Clone, PartialEq)]
pub struct MipChain {
    format: PixelFormat,
    levels: Vec<RgbaImage>,
}

impl MipChain {
    /// Build a full chain by repeated halving of `base`.
    pub fn from_base(base: RgbaImage, format: PixelFormat) -> Self {
        let (w, h) = base.dimensions();
        Self::with_levels(base, format, full_chain_len(w, h))
    }

    /// Build a chain of `count` levels (at least one) from `base`.
    pub fn with_levels(base: RgbaImage, format: PixelFormat, count: usize) -> Self {
        let (w, h) = base.dimensions();
        let count = count.clamp(1, full_chain_len(w, h));
        let mut levels = Vec::with_capacity(count);
        levels.push(base);
        for m in 1..count {
            let (lw, lh) = level_size(w, h, m);
            let prev = &levels[m - 1];
            levels.push(image::imageops::resize(prev, lw, lh, FilterType::Triangle));
        }
        Self { format, levels }
    }

    /// Wrap pre-built levels; every level must halve the previous one.
    pub fn from_levels(levels: Vec<RgbaImage>, format: PixelFormat) -> Result<Self> {
        let Some(first) = levels.first() else {
            return Err(AtlasExtendError::LevelMismatch {
                required: 1,
                available: 0,
            });
        };
        let (w, h) = first.dimensions();
        for (m, lvl) in levels.iter().enumerate() {
            let expected = level_size(w, h, m);
            if lvl.dimensions() != expected {
                return Err(AtlasExtendError::DimensionMismatch {
                    expected,
                    found: lvl.dimensions(),
                });
            }
        }
        Ok(Self { format, levels })
    }

    /// Flat color chain, used for fallbacks and `W:H:R:G:B` references.
    pub fn uniform(width: u32, height: u32, color: [u8; 4], format: PixelFormat, count: usize) -> Self {
        let count = count.clamp(1, full_chain_len(width, height));
        let levels = (0..count)
            .map(|m| {
                let (lw, lh) = level_size(width, height, m);
                RgbaImage::from_pixel(lw, lh, Rgba(color))
            })
            .collect();
        Self { format, levels }
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }
    pub fn width(&self) -> u32 {
        self.levels[0].width()
    }
    pub fn height(&self) -> u32 {
        self.levels[0].height()
    }
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
    pub fn level(&self, m: usize) -> Option<&RgbaImage> {
        self.levels.get(m)
    }
    pub fn base(&self) -> &RgbaImage {
        &self.levels[0]
    }
    pub fn levels(&self) -> &[RgbaImage] {
        &self.levels
    }
    pub fn into_levels(self) -> Vec<RgbaImage> {
        self.levels
    }
    /// Level 0, dropping the rest of the chain.
    pub fn into_base(mut self) -> RgbaImage {
        self.levels.swap_remove(0)
    }
}
