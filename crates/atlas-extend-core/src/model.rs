use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    /// Inclusive right edge coordinate (`x + w - 1`).
    pub fn right(&self) -> u32 {
        self.x + self.w.saturating_sub(1)
    }
    /// Inclusive bottom edge coordinate (`y + h - 1`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h.saturating_sub(1)
    }
    /// Returns true if `r` is fully inside `self` (inclusive edges).
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
}

/// A rectangle placed by a packer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame<K = String> {
    pub key: K,
    /// Content rectangle within the canvas (spacing already applied).
    pub frame: Rect,
    /// Size that was requested.
    pub source_size: (u32, u32),
}

/// Normalized rectangle in `[0,1]^2`, origin at the top-left of the image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct UvRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Default for UvRect {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            w: 1.0,
            h: 1.0,
        }
    }
}

impl UvRect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Normalize a pixel rectangle against a canvas.
    pub fn from_pixels(r: &Rect, canvas_w: u32, canvas_h: u32) -> Self {
        let cw = canvas_w.max(1) as f32;
        let ch = canvas_h.max(1) as f32;
        Self {
            x: r.x as f32 / cw,
            y: r.y as f32 / ch,
            w: r.w as f32 / cw,
            h: r.h as f32 / ch,
        }
    }

    /// Inverse of [`UvRect::from_pixels`], rounded to the nearest pixel.
    pub fn to_pixels(&self, canvas_w: u32, canvas_h: u32) -> Rect {
        let cw = canvas_w as f32;
        let ch = canvas_h as f32;
        Rect::new(
            (self.x * cw).round().max(0.0) as u32,
            (self.y * ch).round().max(0.0) as u32,
            (self.w * cw).round().max(0.0) as u32,
            (self.h * ch).round().max(0.0) as u32,
        )
    }
}

/// Sampling flags carried on a tile.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TileFlags {
    /// Sample with world-space coordinates instead of per-face UVs.
    pub global_uv: bool,
    /// Swap U and V when sampling.
    pub switch_uv: bool,
}

/// How shading code samples one layer or one region of a shared image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UvTile {
    /// Layer slot for array-backed targets; `0` for a packed sprite atlas.
    pub layer_index: u32,
    pub rect: UvRect,
    pub block_w: u32,
    pub block_h: u32,
    pub texture_name: String,
    pub flags: TileFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default = "white")]
    pub tint: [f32; 4],
}

fn white() -> [f32; 4] {
    [1.0; 4]
}

impl UvTile {
    pub fn new(layer_index: u32, rect: UvRect, texture_name: impl Into<String>) -> Self {
        Self {
            layer_index,
            rect,
            block_w: 1,
            block_h: 1,
            texture_name: texture_name.into(),
            flags: TileFlags::default(),
            material: None,
            tint: white(),
        }
    }
}

/// Statistics about a repacked sprite canvas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpriteAtlasStats {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Tiles carried over from the baked atlas.
    pub num_baked: usize,
    /// Tiles added from custom sprites.
    pub num_custom: usize,
    /// Area covered by padded sprites.
    pub used_area: u64,
    /// `used_area / canvas area` (0.0 to 1.0).
    pub occupancy: f64,
}
