use super::{Packer, reserve};
use crate::config::{PackerConfig, SkylineHeuristic};
use crate::model::{Frame, Rect};

#[derive(Clone, Copy, Debug)]
struct Segment {
    x: u32,
    y: u32,
    w: u32,
}

impl Segment {
    #[inline]
    fn end(&self) -> u32 {
        self.x + self.w
    }
}

/// Skyline packer (bottom-left or min-waste), no rotation.
pub struct SkylinePacker {
    config: PackerConfig,
    border: Rect,
    skyline: Vec<Segment>,
    heuristic: SkylineHeuristic,
}

impl SkylinePacker {
    pub fn new(config: PackerConfig) -> Self {
        let pad = config.border_padding;
        let w = config.max_width.saturating_sub(pad.saturating_mul(2));
        let h = config.max_height.saturating_sub(pad.saturating_mul(2));
        Self {
            heuristic: config.skyline_heuristic,
            config,
            border: Rect::new(pad, pad, w, h),
            skyline: vec![Segment { x: pad, y: pad, w }],
        }
    }

    /// Resting position of a `w x h` rectangle whose left edge is segment `i`.
    fn fit_at(&self, i: usize, w: u32, h: u32) -> Option<Rect> {
        let x = self.skyline[i].x;
        if x + w > self.border.x + self.border.w {
            return None;
        }
        let mut y = 0;
        let mut left = w;
        let mut j = i;
        while left > 0 {
            let seg = self.skyline.get(j)?;
            y = y.max(seg.y);
            left = left.saturating_sub(seg.w);
            j += 1;
        }
        if y + h > self.border.y + self.border.h {
            return None;
        }
        Some(Rect::new(x, y, w, h))
    }

    fn waste_below(&self, i: usize, r: &Rect) -> u64 {
        let mut area = 0u64;
        let mut left = r.w;
        for seg in &self.skyline[i..] {
            if left == 0 {
                break;
            }
            let used = left.min(seg.w);
            area += (r.y - seg.y) as u64 * used as u64;
            left -= used;
        }
        area
    }

    fn find(&self, w: u32, h: u32) -> Option<(usize, Rect)> {
        let mut best: Option<((u64, u32, u32), usize, Rect)> = None;
        for i in 0..self.skyline.len() {
            let Some(r) = self.fit_at(i, w, h) else {
                continue;
            };
            let key = match self.heuristic {
                SkylineHeuristic::BottomLeft => (0, r.y + r.h, self.skyline[i].w),
                SkylineHeuristic::MinWaste => (self.waste_below(i, &r), r.y + r.h, 0),
            };
            if best.as_ref().is_none_or(|(k, _, _)| key < *k) {
                best = Some((key, i, r));
            }
        }
        best.map(|(_, i, r)| (i, r))
    }

    fn place(&mut self, index: usize, r: &Rect) {
        self.skyline.insert(
            index,
            Segment {
                x: r.x,
                y: r.y + r.h,
                w: r.w,
            },
        );
        let end = r.x + r.w;
        let i = index + 1;
        while i < self.skyline.len() && self.skyline[i].x < end {
            let seg = self.skyline[i];
            if seg.end() <= end {
                self.skyline.remove(i);
            } else {
                self.skyline[i].w = seg.end() - end;
                self.skyline[i].x = end;
                break;
            }
        }
        // merge neighbours at the same height
        let mut k = 1;
        while k < self.skyline.len() {
            if self.skyline[k - 1].y == self.skyline[k].y {
                self.skyline[k - 1].w += self.skyline[k].w;
                self.skyline.remove(k);
            } else {
                k += 1;
            }
        }
    }
}

impl<K: Clone> Packer<K> for SkylinePacker {
    fn can_pack(&self, rect: &Rect) -> bool {
        let (w, h, _) = reserve(&self.config, rect.w, rect.h);
        self.find(w, h).is_some()
    }

    fn pack(&mut self, key: K, rect: &Rect) -> Option<Frame<K>> {
        let (w, h, off) = reserve(&self.config, rect.w, rect.h);
        let (i, place) = self.find(w, h)?;
        self.place(i, &place);
        Some(Frame {
            key,
            frame: Rect::new(place.x + off, place.y + off, rect.w, rect.h),
            source_size: (rect.w, rect.h),
        })
    }
}
