use super::{Packer, reserve};
use crate::config::{MaxRectsHeuristic, PackerConfig};
use crate::model::{Frame, Rect};

/// MaxRects free-list packer. Sprites are never rotated: the three channel
/// images of a tile must keep their orientation.
pub struct MaxRectsPacker {
    config: PackerConfig,
    border: Rect,
    free: Vec<Rect>,
    used: Vec<Rect>,
    heuristic: MaxRectsHeuristic,
}

impl MaxRectsPacker {
    pub fn new(config: PackerConfig, heuristic: MaxRectsHeuristic) -> Self {
        let pad = config.border_padding;
        let w = config.max_width.saturating_sub(pad.saturating_mul(2));
        let h = config.max_height.saturating_sub(pad.saturating_mul(2));
        let border = Rect::new(pad, pad, w, h);
        Self {
            config,
            border,
            free: vec![border],
            used: Vec::new(),
            heuristic,
        }
    }

    fn place_rect(&mut self, node: &Rect) {
        let mut next: Vec<Rect> = Vec::with_capacity(self.free.len() + 4);
        for fr in &self.free {
            if !overlaps(fr, node) {
                next.push(*fr);
                continue;
            }
            split_around(fr, node, &mut next);
        }
        self.free = next;
        self.prune_free_list();
        self.used.push(*node);
    }

    /// Drop free rectangles contained in another free rectangle.
    fn prune_free_list(&mut self) {
        let mut i = 0;
        while i < self.free.len() {
            let a = self.free[i];
            let mut remove_i = false;
            let mut j = i + 1;
            while j < self.free.len() {
                let b = self.free[j];
                if encloses(&b, &a) {
                    remove_i = true;
                    break;
                }
                if encloses(&a, &b) {
                    self.free.remove(j);
                    continue;
                }
                j += 1;
            }
            if remove_i {
                self.free.remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn score(&self, fr: &Rect, w: u32, h: u32) -> (i64, i64) {
        let dx = (fr.w - w) as i64;
        let dy = (fr.h - h) as i64;
        let short_fit = dx.min(dy);
        let long_fit = dx.max(dy);
        let area_fit = fr.w as i64 * fr.h as i64 - w as i64 * h as i64;
        match self.heuristic {
            MaxRectsHeuristic::BestAreaFit => (area_fit, short_fit),
            MaxRectsHeuristic::BestShortSideFit => (short_fit, long_fit),
            MaxRectsHeuristic::BestLongSideFit => (long_fit, short_fit),
            MaxRectsHeuristic::BottomLeft => (fr.y as i64 + h as i64, fr.x as i64),
            MaxRectsHeuristic::ContactPoint => {
                let contact = self.contact_score(&Rect::new(fr.x, fr.y, w, h));
                (-(contact as i64), area_fit)
            }
        }
    }

    fn find_position(&self, w: u32, h: u32) -> Option<Rect> {
        // (score1, score2, top, left); lower wins
        let mut best: Option<((i64, i64, u32, u32), Rect)> = None;
        for fr in &self.free {
            if fr.w < w || fr.h < h {
                continue;
            }
            let candidate = Rect::new(fr.x, fr.y, w, h);
            if fr.w == w && fr.h == h {
                return Some(candidate);
            }
            let (s1, s2) = self.score(fr, w, h);
            let key = (s1, s2, fr.y + h, fr.x);
            if best.as_ref().is_none_or(|(k, _)| key < *k) {
                best = Some((key, candidate));
            }
        }
        best.map(|(_, r)| r)
    }

    fn contact_score(&self, node: &Rect) -> u32 {
        let mut score = 0u32;
        if node.x == self.border.x || node.x + node.w == self.border.x + self.border.w {
            score += node.h;
        }
        if node.y == self.border.y || node.y + node.h == self.border.y + self.border.h {
            score += node.w;
        }
        for u in &self.used {
            if node.x == u.x + u.w || u.x == node.x + node.w {
                score += overlap_1d(node.y, node.y + node.h, u.y, u.y + u.h);
            }
            if node.y == u.y + u.h || u.y == node.y + node.h {
                score += overlap_1d(node.x, node.x + node.w, u.x, u.x + u.w);
            }
        }
        score
    }
}

fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.x < b.x + b.w && b.x < a.x + a.w && a.y < b.y + b.h && b.y < a.y + a.h
}

fn encloses(outer: &Rect, inner: &Rect) -> bool {
    inner.x >= outer.x
        && inner.y >= outer.y
        && inner.x + inner.w <= outer.x + outer.w
        && inner.y + inner.h <= outer.y + outer.h
}

/// Maximal free rectangles left in `fr` once `node` is carved out.
fn split_around(fr: &Rect, node: &Rect, out: &mut Vec<Rect>) {
    let fr_x2 = fr.x + fr.w;
    let fr_y2 = fr.y + fr.h;
    let n_x2 = node.x + node.w;
    let n_y2 = node.y + node.h;
    if node.x > fr.x {
        out.push(Rect::new(fr.x, fr.y, node.x - fr.x, fr.h));
    }
    if n_x2 < fr_x2 {
        out.push(Rect::new(n_x2, fr.y, fr_x2 - n_x2, fr.h));
    }
    if node.y > fr.y {
        out.push(Rect::new(fr.x, fr.y, fr.w, node.y - fr.y));
    }
    if n_y2 < fr_y2 {
        out.push(Rect::new(fr.x, n_y2, fr.w, fr_y2 - n_y2));
    }
}

fn overlap_1d(a1: u32, a2: u32, b1: u32, b2: u32) -> u32 {
    a2.min(b2).saturating_sub(a1.max(b1))
}

impl<K: Clone> Packer<K> for MaxRectsPacker {
    fn can_pack(&self, rect: &Rect) -> bool {
        let (w, h, _) = reserve(&self.config, rect.w, rect.h);
        self.find_position(w, h).is_some()
    }

    fn pack(&mut self, key: K, rect: &Rect) -> Option<Frame<K>> {
        let (w, h, off) = reserve(&self.config, rect.w, rect.h);
        let place = self.find_position(w, h)?;
        self.place_rect(&place);
        Some(Frame {
            key,
            frame: Rect::new(place.x + off, place.y + off, rect.w, rect.h),
            source_size: (rect.w, rect.h),
        })
    }
}
