//! Debug dumps of live storage to PNG files.

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use tracing::info;

use crate::error::Result;
use crate::layered::{Channel, ChannelSet, LayeredImageArray};
use crate::session::PatchSession;
use crate::sprite_atlas::SpriteAtlas;

/// Whether packed channels are converted back to viewable images.
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpOptions {
    pub unpack_normals: bool,
    pub unpack_specular: bool,
}

/// Rebuild a viewable normal map from the packed layout where X lives in
/// alpha and Y in green; Z is reconstructed.
pub fn unpack_normal_pixels(src: &RgbaImage) -> RgbaImage {
    let mut out = RgbaImage::new(src.width(), src.height());
    for (dst, px) in out.pixels_mut().zip(src.pixels()) {
        let x = px.0[3] as f32 / 255.0 * 2.0 - 1.0;
        let y = px.0[1] as f32 / 255.0 * 2.0 - 1.0;
        let z = (1.0 - x * x - y * y).max(0.0).sqrt();
        let enc = |v: f32| ((v * 0.5 + 0.5) * 255.0).round().clamp(0.0, 255.0) as u8;
        *dst = Rgba([enc(x), enc(y), enc(z), 255]);
    }
    out
}

/// Grayscale view of the specular channel (stored inverted in green).
pub fn unpack_specular_pixels(src: &RgbaImage) -> RgbaImage {
    let mut out = RgbaImage::new(src.width(), src.height());
    for (dst, px) in out.pixels_mut().zip(src.pixels()) {
        let v = 255 - px.0[1];
        *dst = Rgba([v, v, v, 255]);
    }
    out
}

fn convert(ch: Channel, img: &RgbaImage, opts: DumpOptions) -> Option<RgbaImage> {
    match ch {
        Channel::Normal if opts.unpack_normals => Some(unpack_normal_pixels(img)),
        Channel::Specular if opts.unpack_specular => Some(unpack_specular_pixels(img)),
        _ => None,
    }
}

/// Write level 0 of every layer as `array.{i}.{channel}.png` under `dir`.
pub fn dump_layered(
    arrays: &ChannelSet<LayeredImageArray>,
    dir: &Path,
    opts: DumpOptions,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (ch, array) in arrays.iter() {
        for i in 0..array.capacity() {
            let Some(base) = array.layer(i).and_then(|l| l.first()) else {
                continue;
            };
            let path = dir.join(format!("array.{i}.{}.png", ch.name()));
            match convert(ch, base, opts) {
                Some(img) => img.save(&path)?,
                None => base.save(&path)?,
            }
            written.push(path);
        }
    }
    Ok(written)
}

/// Write the base level of each canvas as `atlas.{channel}.png` under `dir`.
pub fn dump_sprite(atlas: &SpriteAtlas, dir: &Path, opts: DumpOptions) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (ch, canvas) in atlas.canvases.iter() {
        let path = dir.join(format!("atlas.{}.png", ch.name()));
        match convert(ch, canvas.base(), opts) {
            Some(img) => img.save(&path)?,
            None => canvas.base().save(&path)?,
        }
        written.push(path);
    }
    Ok(written)
}

/// Dump every target of `session`, one subdirectory per target.
pub fn dump_session(session: &PatchSession, dir: &Path, opts: DumpOptions) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for t in session.layered_targets() {
        written.extend(dump_layered(t.arrays(), &dir.join(t.name()), opts)?);
    }
    for t in session.sprite_targets() {
        written.extend(dump_sprite(t.live(), &dir.join(t.name()), opts)?);
    }
    info!(files = written.len(), dir = %dir.display(), "dumped live storage");
    Ok(written)
}
