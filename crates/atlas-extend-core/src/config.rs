use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{AtlasExtendError, Result};
use crate::fallback::FallbackPalette;

/// Bin-packing families available to the sprite atlas packer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmFamily {
    /// Skyline data structure (BL/MW; fast and good baseline).
    Skyline,
    /// MaxRects free-list (tighter packing; several heuristics).
    MaxRects,
}

impl FromStr for AlgorithmFamily {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skyline" => Ok(Self::Skyline),
            "maxrects" => Ok(Self::MaxRects),
            _ => Err(()),
        }
    }
}

/// MaxRects placement heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MaxRectsHeuristic {
    BestAreaFit,
    BestShortSideFit,
    BestLongSideFit,
    BottomLeft,
    ContactPoint,
}

impl FromStr for MaxRectsHeuristic {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "baf" | "bestareafit" => Ok(Self::BestAreaFit),
            "bssf" | "bestshortsidefit" => Ok(Self::BestShortSideFit),
            "blsf" | "bestlongsidefit" => Ok(Self::BestLongSideFit),
            "bl" | "bottomleft" => Ok(Self::BottomLeft),
            "cp" | "contactpoint" => Ok(Self::ContactPoint),
            _ => Err(()),
        }
    }
}

/// Skyline placement heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SkylineHeuristic {
    BottomLeft,
    MinWaste,
}

impl FromStr for SkylineHeuristic {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bl" | "bottomleft" => Ok(Self::BottomLeft),
            "minwaste" | "mw" => Ok(Self::MinWaste),
            _ => Err(()),
        }
    }
}

/// Order in which sprites are fed to the packer. Ties fall back to the key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    AreaDesc,
    MaxSideDesc,
    HeightDesc,
    NameAsc,
    /// Keep input order (baked tiles first, then custom sprites).
    None,
}

impl FromStr for SortOrder {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "area_desc" => Ok(Self::AreaDesc),
            "max_side_desc" => Ok(Self::MaxSideDesc),
            "height_desc" => Ok(Self::HeightDesc),
            "name_asc" => Ok(Self::NameAsc),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

/// Sprite atlas packing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackerConfig {
    /// Maximum canvas width in pixels.
    #[serde(default = "default_max_dim")]
    pub max_width: u32,
    /// Maximum canvas height in pixels.
    #[serde(default = "default_max_dim")]
    pub max_height: u32,
    /// Pixels kept free around the whole canvas.
    #[serde(default)]
    pub border_padding: u32,
    /// Pixels between padded sprites.
    #[serde(default = "default_texture_padding")]
    pub texture_padding: u32,
    /// Bleed margin added on each side of every sprite (edge extrusion for new
    /// sprites, surrounding pixels for baked tiles).
    #[serde(default = "default_sprite_border")]
    pub sprite_border: u32,
    /// Round the canvas up to a power of two.
    #[serde(default = "default_true")]
    pub power_of_two: bool,
    /// Force a square canvas (max(width,height)).
    #[serde(default = "default_true")]
    pub square: bool,

    #[serde(default = "default_family")]
    pub family: AlgorithmFamily,
    #[serde(default = "default_mr_heuristic")]
    pub mr_heuristic: MaxRectsHeuristic,
    #[serde(default = "default_skyline_heuristic")]
    pub skyline_heuristic: SkylineHeuristic,
    #[serde(default = "default_sort_order")]
    pub sort_order: SortOrder,

    /// Compose the three channel canvases in parallel when feature "parallel" is on.
    #[serde(default)]
    pub parallel: bool,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_dim(),
            max_height: default_max_dim(),
            border_padding: 0,
            texture_padding: default_texture_padding(),
            sprite_border: default_sprite_border(),
            power_of_two: true,
            square: true,
            family: default_family(),
            mr_heuristic: default_mr_heuristic(),
            skyline_heuristic: default_skyline_heuristic(),
            sort_order: default_sort_order(),
            parallel: false,
        }
    }
}

impl PackerConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if the canvas is empty or the border padding leaves no
    /// usable space.
    pub fn validate(&self) -> Result<()> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(AtlasExtendError::InvalidDimensions {
                width: self.max_width,
                height: self.max_height,
            });
        }

        let total_border = self.border_padding.saturating_mul(2);
        if total_border >= self.max_width || total_border >= self.max_height {
            return Err(AtlasExtendError::Config(format!(
                "border_padding ({}) * 2 exceeds canvas dimensions ({}x{})",
                self.border_padding, self.max_width, self.max_height
            )));
        }

        let per_sprite = self
            .texture_padding
            .saturating_add(self.sprite_border.saturating_mul(2));
        if per_sprite >= self.max_width - total_border || per_sprite >= self.max_height - total_border
        {
            return Err(AtlasExtendError::Config(format!(
                "sprite_border ({}) and texture_padding ({}) leave no room on a {}x{} canvas",
                self.sprite_border, self.texture_padding, self.max_width, self.max_height
            )));
        }
        Ok(())
    }

    /// Create a fluent builder for `PackerConfig`.
    pub fn builder() -> PackerConfigBuilder {
        PackerConfigBuilder::new()
    }
}

fn default_max_dim() -> u32 {
    8192
}
fn default_texture_padding() -> u32 {
    4
}
fn default_sprite_border() -> u32 {
    32
}
fn default_true() -> bool {
    true
}
fn default_family() -> AlgorithmFamily {
    AlgorithmFamily::MaxRects
}
fn default_mr_heuristic() -> MaxRectsHeuristic {
    MaxRectsHeuristic::BestShortSideFit
}
fn default_skyline_heuristic() -> SkylineHeuristic {
    SkylineHeuristic::BottomLeft
}
fn default_sort_order() -> SortOrder {
    SortOrder::AreaDesc
}

/// Builder for `PackerConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct PackerConfigBuilder {
    cfg: PackerConfig,
}

impl PackerConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: PackerConfig::default(),
        }
    }
    pub fn with_max_dimensions(mut self, w: u32, h: u32) -> Self {
        self.cfg.max_width = w;
        self.cfg.max_height = h;
        self
    }
    pub fn border_padding(mut self, v: u32) -> Self {
        self.cfg.border_padding = v;
        self
    }
    pub fn texture_padding(mut self, v: u32) -> Self {
        self.cfg.texture_padding = v;
        self
    }
    pub fn sprite_border(mut self, v: u32) -> Self {
        self.cfg.sprite_border = v;
        self
    }
    pub fn pow2(mut self, v: bool) -> Self {
        self.cfg.power_of_two = v;
        self
    }
    pub fn square(mut self, v: bool) -> Self {
        self.cfg.square = v;
        self
    }
    pub fn family(mut self, v: AlgorithmFamily) -> Self {
        self.cfg.family = v;
        self
    }
    pub fn mr_heuristic(mut self, v: MaxRectsHeuristic) -> Self {
        self.cfg.mr_heuristic = v;
        self
    }
    pub fn skyline_heuristic(mut self, v: SkylineHeuristic) -> Self {
        self.cfg.skyline_heuristic = v;
        self
    }
    pub fn sort_order(mut self, v: SortOrder) -> Self {
        self.cfg.sort_order = v;
        self
    }
    pub fn parallel(mut self, v: bool) -> Self {
        self.cfg.parallel = v;
        self
    }
    pub fn build(self) -> PackerConfig {
        self.cfg
    }
}

/// Session-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendConfig {
    /// Highest slot count any target may reach. Slots are consumed as 16-bit
    /// ids downstream.
    #[serde(default = "default_max_slots")]
    pub max_slots: usize,
    /// Plan and bind slots without touching pixels (dedicated server).
    #[serde(default)]
    pub headless: bool,
    /// Default fallback colors for targets that do not override them.
    #[serde(default)]
    pub fallback: FallbackPalette,
    #[serde(default)]
    pub sprite: PackerConfig,
}

impl Default for ExtendConfig {
    fn default() -> Self {
        Self {
            max_slots: default_max_slots(),
            headless: false,
            fallback: FallbackPalette::default(),
            sprite: PackerConfig::default(),
        }
    }
}

impl ExtendConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_slots == 0 {
            return Err(AtlasExtendError::Config("max_slots must be > 0".into()));
        }
        self.sprite.validate()
    }
}

fn default_max_slots() -> usize {
    u16::MAX as usize
}
