use image::RgbaImage;

use crate::model::Rect;

/// Copy `src` into a new image `border` pixels larger on every side, filling
/// the margin by extruding the edge pixels (corners take the corner pixel).
pub fn pad_sprite(src: &RgbaImage, border: u32) -> RgbaImage {
    let (w, h) = src.dimensions();
    if border == 0 || w == 0 || h == 0 {
        return src.clone();
    }
    let mut out = RgbaImage::new(w + border * 2, h + border * 2);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let sx = x.saturating_sub(border).min(w - 1);
        let sy = y.saturating_sub(border).min(h - 1);
        *px = *src.get_pixel(sx, sy);
    }
    out
}

/// Copy all of `src` into `canvas` with its top-left at (dx, dy). Pixels that
/// fall outside the canvas are dropped.
pub fn blit(src: &RgbaImage, canvas: &mut RgbaImage, dx: u32, dy: u32) {
    let (cw, ch) = canvas.dimensions();
    let (sw, sh) = src.dimensions();
    let w = sw.min(cw.saturating_sub(dx));
    let h = sh.min(ch.saturating_sub(dy));
    for y in 0..h {
        for x in 0..w {
            canvas.put_pixel(dx + x, dy + y, *src.get_pixel(x, y));
        }
    }
}

/// Copy of `r` plus a `margin` on every side, taken from the surrounding
/// pixels of `src`. Where the margin leaves the image, edge pixels are repeated.
pub fn extract_with_margin(src: &RgbaImage, r: &Rect, margin: u32) -> RgbaImage {
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return RgbaImage::new(r.w + margin * 2, r.h + margin * 2);
    }
    let mut out = RgbaImage::new(r.w + margin * 2, r.h + margin * 2);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let sx = (r.x as i64 - margin as i64 + x as i64).clamp(0, w as i64 - 1) as u32;
        let sy = (r.y as i64 - margin as i64 + y as i64).clamp(0, h as i64 - 1) as u32;
        *px = *src.get_pixel(sx, sy);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn pad_extrudes_edges_and_corners() {
        let mut src = RgbaImage::new(2, 2);
        src.put_pixel(0, 0, Rgba([1, 0, 0, 255]));
        src.put_pixel(1, 0, Rgba([2, 0, 0, 255]));
        src.put_pixel(0, 1, Rgba([3, 0, 0, 255]));
        src.put_pixel(1, 1, Rgba([4, 0, 0, 255]));
        let out = pad_sprite(&src, 2);
        assert_eq!(out.dimensions(), (6, 6));
        assert_eq!(out.get_pixel(0, 0).0[0], 1);
        assert_eq!(out.get_pixel(5, 0).0[0], 2);
        assert_eq!(out.get_pixel(0, 5).0[0], 3);
        assert_eq!(out.get_pixel(5, 5).0[0], 4);
        assert_eq!(out.get_pixel(2, 2).0[0], 1);
        assert_eq!(out.get_pixel(3, 3).0[0], 4);
    }

    #[test]
    fn margin_repeats_canvas_edge() {
        let mut src = RgbaImage::new(4, 4);
        for (x, y, px) in src.enumerate_pixels_mut() {
            *px = Rgba([(x + 10 * y) as u8, 0, 0, 255]);
        }
        let out = extract_with_margin(&src, &Rect::new(0, 1, 2, 2), 1);
        assert_eq!(out.dimensions(), (4, 4));
        // column left of the canvas repeats x = 0
        assert_eq!(out.get_pixel(0, 1).0[0], 10);
        // real neighbour above the region
        assert_eq!(out.get_pixel(1, 0).0[0], 0);
        assert_eq!(out.get_pixel(3, 3).0[0], 32);
    }

    #[test]
    fn blit_clips_to_canvas() {
        let src = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        let mut canvas = RgbaImage::new(5, 5);
        blit(&src, &mut canvas, 3, 3);
        assert_eq!(canvas.get_pixel(4, 4).0[0], 9);
        assert_eq!(canvas.get_pixel(2, 2).0[0], 0);
    }
}
