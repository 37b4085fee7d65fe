//! Growable stacks of equal-sized images.

use image::{RgbaImage, imageops::FilterType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AtlasExtendError, Result};
use crate::fallback::{FallbackImageFactory, FallbackKind};
use crate::mip::{MipChain, PixelFormat, full_chain_len, level_size};

/// The three parallel images every slot carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Diffuse,
    Normal,
    Specular,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Diffuse, Channel::Normal, Channel::Specular];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Diffuse => "diffuse",
            Channel::Normal => "normal",
            Channel::Specular => "specular",
        }
    }

    /// Placeholder used when a descriptor omits this channel. Diffuse is mandatory.
    pub fn fallback(self) -> Option<FallbackKind> {
        match self {
            Channel::Diffuse => None,
            Channel::Normal => Some(FallbackKind::Normal),
            Channel::Specular => Some(FallbackKind::Specular),
        }
    }
}

/// One value per channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSet<T> {
    pub diffuse: T,
    pub normal: T,
    pub specular: T,
}

impl<T> ChannelSet<T> {
    pub fn new(diffuse: T, normal: T, specular: T) -> Self {
        Self {
            diffuse,
            normal,
            specular,
        }
    }

    pub fn get(&self, ch: Channel) -> &T {
        match ch {
            Channel::Diffuse => &self.diffuse,
            Channel::Normal => &self.normal,
            Channel::Specular => &self.specular,
        }
    }

    pub fn get_mut(&mut self, ch: Channel) -> &mut T {
        match ch {
            Channel::Diffuse => &mut self.diffuse,
            Channel::Normal => &mut self.normal,
            Channel::Specular => &mut self.specular,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(Channel, T) -> U) -> ChannelSet<U> {
        ChannelSet {
            diffuse: f(Channel::Diffuse, self.diffuse),
            normal: f(Channel::Normal, self.normal),
            specular: f(Channel::Specular, self.specular),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &T)> {
        [
            (Channel::Diffuse, &self.diffuse),
            (Channel::Normal, &self.normal),
            (Channel::Specular, &self.specular),
        ]
        .into_iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Channel, &mut T)> {
        [
            (Channel::Diffuse, &mut self.diffuse),
            (Channel::Normal, &mut self.normal),
            (Channel::Specular, &mut self.specular),
        ]
        .into_iter()
    }
}

/// A stack of same-sized images addressed by layer index.
///
/// Capacity only ever grows. Growth swaps in a fresh backing store that holds
/// the previous layers `[0, capacity)` unchanged, so indices handed out before
/// the growth stay valid. Writes mark the array dirty until [`apply`] is
/// called, which lets a caller batch many writes into one upload.
///
/// [`apply`]: LayeredImageArray::apply
#[derive(Debug, Clone)]
pub struct LayeredImageArray {
    label: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    levels: usize,
    layers: Vec<Vec<RgbaImage>>,
    generation: u32,
    growths: usize,
    capacity_requests: usize,
    writes: usize,
    applies: usize,
    applied: bool,
}

impl LayeredImageArray {
    /// Blank array of `capacity` transparent layers.
    pub fn new(
        label: impl Into<String>,
        width: u32,
        height: u32,
        format: PixelFormat,
        levels: usize,
        capacity: usize,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AtlasExtendError::InvalidDimensions { width, height });
        }
        let max_levels = full_chain_len(width, height);
        if levels == 0 || levels > max_levels {
            return Err(AtlasExtendError::LevelMismatch {
                required: levels,
                available: max_levels,
            });
        }
        let mut arr = Self {
            label: label.into(),
            width,
            height,
            format,
            levels,
            layers: Vec::with_capacity(capacity),
            generation: 0,
            growths: 0,
            capacity_requests: 0,
            writes: 0,
            applies: 0,
            applied: true,
        };
        for _ in 0..capacity {
            arr.layers.push(arr.blank_layer());
        }
        Ok(arr)
    }

    /// Array whose layers are the given chains, in order.
    pub fn from_layers(label: impl Into<String>, layers: Vec<MipChain>) -> Result<Self> {
        let label = label.into();
        let Some(first) = layers.first() else {
            return Err(AtlasExtendError::Config(format!(
                "array `{label}` needs at least one layer"
            )));
        };
        let (width, height, format, levels) = (
            first.width(),
            first.height(),
            first.format(),
            first.level_count(),
        );
        let mut out = Vec::with_capacity(layers.len());
        for chain in layers {
            if (chain.width(), chain.height()) != (width, height) {
                return Err(AtlasExtendError::DimensionMismatch {
                    expected: (width, height),
                    found: (chain.width(), chain.height()),
                });
            }
            if chain.level_count() != levels {
                return Err(AtlasExtendError::LevelMismatch {
                    required: levels,
                    available: chain.level_count(),
                });
            }
            if chain.format() != format {
                return Err(AtlasExtendError::InvalidAsset {
                    reference: label.clone(),
                    reason: format!("format {:?} does not match {:?}", chain.format(), format),
                });
            }
            out.push(chain.into_levels());
        }
        Ok(Self {
            label,
            width,
            height,
            format,
            levels,
            layers: out,
            generation: 0,
            growths: 0,
            capacity_requests: 0,
            writes: 0,
            applies: 0,
            applied: true,
        })
    }

    fn blank_layer(&self) -> Vec<RgbaImage> {
        (0..self.levels)
            .map(|m| {
                let (w, h) = level_size(self.width, self.height, m);
                RgbaImage::new(w, h)
            })
            .collect()
    }

    /// Make room for at least `n` layers. Returns true if a new backing store
    /// was swapped in.
    pub fn ensure_capacity(&mut self, n: usize) -> bool {
        self.capacity_requests += 1;
        let old = self.layers.len();
        if old >= n {
            return false;
        }
        let mut grown: Vec<Vec<RgbaImage>> = Vec::with_capacity(n);
        grown.append(&mut self.layers);
        while grown.len() < n {
            grown.push(self.blank_layer());
        }
        self.layers = grown;
        self.generation += 1;
        self.growths += 1;
        self.applied = false;
        info!(array = %self.label, from = old, to = n, "grew layered array");
        true
    }

    /// Copy level `m + offset` of `source` into level `m` of layer `index`, for
    /// every level of this array.
    pub fn write(&mut self, index: usize, source: &MipChain, offset: usize) -> Result<()> {
        if index >= self.layers.len() {
            return Err(AtlasExtendError::IndexOutOfRange {
                target: self.label.clone(),
                index,
                capacity: self.layers.len(),
            });
        }
        if source.format() != self.format {
            return Err(AtlasExtendError::InvalidAsset {
                reference: format!("{}[{index}]", self.label),
                reason: format!(
                    "format {:?} does not match {:?}",
                    source.format(),
                    self.format
                ),
            });
        }
        let required = self.levels + offset;
        if source.level_count() < required {
            return Err(AtlasExtendError::LevelMismatch {
                required,
                available: source.level_count(),
            });
        }
        for m in 0..self.levels {
            let expected = level_size(self.width, self.height, m);
            let found = source.levels()[m + offset].dimensions();
            if found != expected {
                return Err(AtlasExtendError::DimensionMismatch { expected, found });
            }
        }
        let layer = &mut self.layers[index];
        for (m, dst) in layer.iter_mut().enumerate() {
            dst.clone_from(&source.levels()[m + offset]);
        }
        self.writes += 1;
        self.applied = false;
        debug!(array = %self.label, index, offset, "wrote layer");
        Ok(())
    }

    /// Write a flat placeholder of this array's geometry into layer `index`.
    pub fn write_fallback(
        &mut self,
        index: usize,
        kind: FallbackKind,
        factory: &mut FallbackImageFactory,
    ) -> Result<()> {
        let chain = factory.image(kind, self.width, self.height, self.levels, self.format);
        self.write(index, chain, 0)
    }

    /// Finalize pending writes. Call once per batch.
    pub fn apply(&mut self) {
        self.applies += 1;
        self.applied = true;
    }

    /// Reallocate at a new resolution, carrying every layer over. Levels that
    /// already exist at the new sizes are reused; missing ones are resampled
    /// from the finest level.
    pub fn rebase(&mut self, width: u32, height: u32, levels: usize) -> Result<()> {
        self.rebase_from(width, height, levels, &[])
    }

    /// Like [`rebase`], but layer `i < sources.len()` is rebuilt from
    /// `sources[i]` instead of its current levels, so layers without an
    /// external source survive a round trip through a lower resolution.
    ///
    /// [`rebase`]: LayeredImageArray::rebase
    pub fn rebase_from(
        &mut self,
        width: u32,
        height: u32,
        levels: usize,
        sources: &[Vec<RgbaImage>],
    ) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(AtlasExtendError::InvalidDimensions { width, height });
        }
        if sources.iter().any(|s| s.is_empty()) {
            return Err(AtlasExtendError::Config(format!(
                "array `{}` got a layer source without levels",
                self.label
            )));
        }
        let levels = levels.clamp(1, full_chain_len(width, height));
        let layers = std::mem::take(&mut self.layers);
        self.layers = layers
            .into_iter()
            .enumerate()
            .map(|(i, old)| {
                let src: &[RgbaImage] = sources.get(i).map_or(old.as_slice(), Vec::as_slice);
                (0..levels)
                    .map(|m| {
                        let (w, h) = level_size(width, height, m);
                        match src.iter().find(|l| l.dimensions() == (w, h)) {
                            Some(l) => l.clone(),
                            None => image::imageops::resize(&src[0], w, h, FilterType::Triangle),
                        }
                    })
                    .collect()
            })
            .collect();
        info!(
            array = %self.label,
            from = self.width,
            to = width,
            levels,
            "rebased layered array"
        );
        self.width = width;
        self.height = height;
        self.levels = levels;
        self.generation += 1;
        self.applied = false;
        Ok(())
    }

    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }
    pub fn format(&self) -> PixelFormat {
        self.format
    }
    /// Resolution levels per layer.
    pub fn level_count(&self) -> usize {
        self.levels
    }
    pub fn capacity(&self) -> usize {
        self.layers.len()
    }
    /// Levels of layer `index`, finest first.
    pub fn layer(&self, index: usize) -> Option<&[RgbaImage]> {
        self.layers.get(index).map(|l| l.as_slice())
    }
    /// Bumped whenever the backing store is replaced.
    pub fn generation(&self) -> u32 {
        self.generation
    }
    /// Number of reallocations performed by [`LayeredImageArray::ensure_capacity`].
    pub fn growth_count(&self) -> usize {
        self.growths
    }
    /// Number of [`LayeredImageArray::ensure_capacity`] calls, including no-ops.
    pub fn capacity_requests(&self) -> usize {
        self.capacity_requests
    }
    pub fn write_count(&self) -> usize {
        self.writes
    }
    pub fn apply_count(&self) -> usize {
        self.applies
    }
    pub fn is_applied(&self) -> bool {
        self.applied
    }
}
