use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::mip::{MipChain, PixelFormat};

/// Channels that may be omitted from a descriptor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FallbackKind {
    Normal,
    Specular,
}

/// Flat colors used for omitted channels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FallbackPalette {
    /// Packed tangent-space normal pointing straight out of the surface.
    #[serde(default = "neutral_normal")]
    pub normal: [u8; 4],
    #[serde(default = "black")]
    pub specular: [u8; 4],
}

fn neutral_normal() -> [u8; 4] {
    [255, 128, 128, 128]
}

fn black() -> [u8; 4] {
    [0, 0, 0, 255]
}

impl Default for FallbackPalette {
    fn default() -> Self {
        Self {
            normal: neutral_normal(),
            specular: black(),
        }
    }
}

impl FallbackPalette {
    pub fn color(&self, kind: FallbackKind) -> [u8; 4] {
        match kind {
            FallbackKind::Normal => self.normal,
            FallbackKind::Specular => self.specular,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    color: [u8; 4],
    width: u32,
    height: u32,
    levels: usize,
    format: PixelFormat,
}

/// Synthesizes flat placeholder images and keeps one per color and geometry,
/// so a batch of entries missing the same channel shares one allocation.
#[derive(Debug, Default)]
pub struct FallbackImageFactory {
    palette: FallbackPalette,
    cache: HashMap<CacheKey, MipChain>,
}

impl FallbackImageFactory {
    pub fn new(palette: FallbackPalette) -> Self {
        Self {
            palette,
            cache: HashMap::new(),
        }
    }

    pub fn palette(&self) -> &FallbackPalette {
        &self.palette
    }

    pub fn image(
        &mut self,
        kind: FallbackKind,
        width: u32,
        height: u32,
        levels: usize,
        format: PixelFormat,
    ) -> &MipChain {
        let key = CacheKey {
            color: self.palette.color(kind),
            width,
            height,
            levels,
            format,
        };
        self.cache
            .entry(key)
            .or_insert_with(|| MipChain::uniform(width, height, key.color, format, levels))
    }

    /// Number of distinct images synthesized so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
