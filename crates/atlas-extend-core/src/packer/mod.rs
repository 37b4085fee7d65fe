use crate::config::{AlgorithmFamily, PackerConfig};
use crate::model::{Frame, Rect};

pub mod maxrects;
pub mod skyline;

/// A packer places rectangles onto one canvas.
///
/// Implementations must ensure no overlaps and respect the configured border/padding.
/// `pack` returns `None` if the rectangle does not fit.
pub trait Packer<K> {
    fn can_pack(&self, rect: &Rect) -> bool;
    fn pack(&mut self, key: K, rect: &Rect) -> Option<Frame<K>>;
}

/// Packer selected by `cfg.family`.
pub fn make_packer<K: Clone + 'static>(cfg: &PackerConfig) -> Box<dyn Packer<K>> {
    match cfg.family {
        AlgorithmFamily::MaxRects => Box::new(maxrects::MaxRectsPacker::new(
            cfg.clone(),
            cfg.mr_heuristic,
        )),
        AlgorithmFamily::Skyline => Box::new(skyline::SkylinePacker::new(cfg.clone())),
    }
}

/// Size of the slot a `w x h` rectangle reserves, and where its content sits
/// inside that slot.
pub(crate) fn reserve(cfg: &PackerConfig, w: u32, h: u32) -> (u32, u32, u32) {
    let pad = cfg.texture_padding;
    (w + pad, h + pad, pad / 2)
}

/// Smallest canvas holding every frame, honoring pow2/square.
pub fn compute_canvas_size<K>(frames: &[Frame<K>], cfg: &PackerConfig) -> (u32, u32) {
    let pad_rem = cfg.texture_padding - cfg.texture_padding / 2;
    let mut w = 0u32;
    let mut h = 0u32;
    for f in frames {
        w = w.max(f.frame.right() + 1 + pad_rem + cfg.border_padding);
        h = h.max(f.frame.bottom() + 1 + pad_rem + cfg.border_padding);
    }
    if cfg.power_of_two {
        w = w.max(1).next_power_of_two();
        h = h.max(1).next_power_of_two();
    }
    if cfg.square {
        let m = w.max(h);
        w = m;
        h = m;
    }
    (w, h)
}
