//! Repacking of a single shared sprite canvas (diffuse, normal, specular).
//!
//! Baked tiles are cut out of the pristine baked canvases together with their
//! bleed margin, custom sprites are padded by edge extrusion, and everything is
//! laid out in one packing pass. That one layout is then composed into all
//! three channel canvases, so the channels can never disagree.

use image::RgbaImage;
use tracing::{info, instrument};

use crate::compositing::{blit, extract_with_margin, pad_sprite};
use crate::config::{PackerConfig, SortOrder};
use crate::error::{AtlasExtendError, Result};
use crate::layered::{Channel, ChannelSet};
use crate::mip::{MipChain, PixelFormat};
use crate::model::{Frame, Rect, SpriteAtlasStats, UvRect, UvTile};
use crate::packer::{compute_canvas_size, make_packer};

/// A packed canvas per channel and the tile table addressing it.
#[derive(Debug, Clone)]
pub struct SpriteAtlas {
    pub canvases: ChannelSet<MipChain>,
    pub tiles: Vec<UvTile>,
}

impl SpriteAtlas {
    pub fn new(canvases: ChannelSet<MipChain>, tiles: Vec<UvTile>) -> Result<Self> {
        let dims = (canvases.diffuse.width(), canvases.diffuse.height());
        for (_, c) in canvases.iter() {
            if (c.width(), c.height()) != dims {
                return Err(AtlasExtendError::DimensionMismatch {
                    expected: dims,
                    found: (c.width(), c.height()),
                });
            }
        }
        Ok(Self { canvases, tiles })
    }

    pub fn width(&self) -> u32 {
        self.canvases.diffuse.width()
    }

    pub fn height(&self) -> u32 {
        self.canvases.diffuse.height()
    }

    /// Pixel rectangle of tile `i` on the canvas.
    pub fn tile_pixels(&self, i: usize) -> Option<Rect> {
        self.tiles
            .get(i)
            .map(|t| t.rect.to_pixels(self.width(), self.height()))
    }
}

/// A new sprite to add to an atlas. All three images share one size.
#[derive(Debug, Clone)]
pub struct CustomSprite {
    pub tile: UvTile,
    pub images: ChannelSet<RgbaImage>,
}

impl CustomSprite {
    pub fn new(tile: UvTile, images: ChannelSet<RgbaImage>) -> Result<Self> {
        let dims = images.diffuse.dimensions();
        if dims.0 == 0 || dims.1 == 0 {
            return Err(AtlasExtendError::InvalidDimensions {
                width: dims.0,
                height: dims.1,
            });
        }
        for (_, img) in images.iter() {
            if img.dimensions() != dims {
                return Err(AtlasExtendError::DimensionMismatch {
                    expected: dims,
                    found: img.dimensions(),
                });
            }
        }
        Ok(Self { tile, images })
    }

    pub fn name(&self) -> &str {
        &self.tile.texture_name
    }

    pub fn size(&self) -> (u32, u32) {
        self.images.diffuse.dimensions()
    }
}

/// A sprite with its bleed margin attached, ready for placement.
#[derive(Debug, Clone)]
pub struct PaddedSprite {
    pub key: String,
    pub images: ChannelSet<RgbaImage>,
    /// Size without the margin.
    pub content: (u32, u32),
}

/// Result of a packing pass: one frame per input, in input order.
#[derive(Debug, Clone)]
pub struct SpriteLayout {
    pub width: u32,
    pub height: u32,
    /// Padded placement of every input.
    pub frames: Vec<Rect>,
}

/// What a repack leaves behind.
#[derive(Debug)]
pub struct RepackOutcome {
    /// Canvases that were live before the repack; the renderer releases them.
    pub retired: ChannelSet<MipChain>,
    pub stats: SpriteAtlasStats,
}

pub struct SpriteAtlasPacker {
    cfg: PackerConfig,
}

impl SpriteAtlasPacker {
    pub fn new(cfg: PackerConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &PackerConfig {
        &self.cfg
    }

    /// Cut every tile of `baked` out of its canvases, keeping the pixels that
    /// surround it as the bleed margin.
    pub fn extract_baked(&self, baked: &SpriteAtlas) -> Result<Vec<PaddedSprite>> {
        let border = self.cfg.sprite_border;
        let canvas = Rect::new(0, 0, baked.width(), baked.height());
        let mut out = Vec::with_capacity(baked.tiles.len());
        for (i, tile) in baked.tiles.iter().enumerate() {
            let r = tile.rect.to_pixels(baked.width(), baked.height());
            if r.w == 0 || r.h == 0 || !canvas.contains(&r) {
                return Err(AtlasExtendError::Config(format!(
                    "baked tile {i} (`{}`) lies outside its {}x{} canvas",
                    tile.texture_name,
                    baked.width(),
                    baked.height()
                )));
            }
            out.push(PaddedSprite {
                key: format!("{:06}:{}", i, tile.texture_name),
                images: ChannelSet::new(
                    extract_with_margin(baked.canvases.diffuse.base(), &r, border),
                    extract_with_margin(baked.canvases.normal.base(), &r, border),
                    extract_with_margin(baked.canvases.specular.base(), &r, border),
                ),
                content: (r.w, r.h),
            });
        }
        Ok(out)
    }

    /// Surround a new sprite with an extruded margin.
    pub fn pad_custom(&self, sprite: &CustomSprite, ordinal: usize) -> PaddedSprite {
        let border = self.cfg.sprite_border;
        PaddedSprite {
            key: format!("{:06}:{}", ordinal, sprite.name()),
            images: ChannelSet::new(
                pad_sprite(&sprite.images.diffuse, border),
                pad_sprite(&sprite.images.normal, border),
                pad_sprite(&sprite.images.specular, border),
            ),
            content: sprite.size(),
        }
    }

    /// Place `sizes` (padded sizes, keyed for tie-breaks) in one pass.
    pub fn layout(&self, sizes: &[(String, u32, u32)]) -> Result<SpriteLayout> {
        let mut order: Vec<usize> = (0..sizes.len()).collect();
        match self.cfg.sort_order {
            SortOrder::None => {}
            SortOrder::NameAsc => order.sort_by(|a, b| sizes[*a].0.cmp(&sizes[*b].0)),
            SortOrder::AreaDesc => order.sort_by(|a, b| {
                let (_, aw, ah) = &sizes[*a];
                let (_, bw, bh) = &sizes[*b];
                (*bw as u64 * *bh as u64)
                    .cmp(&(*aw as u64 * *ah as u64))
                    .then_with(|| sizes[*a].0.cmp(&sizes[*b].0))
            }),
            SortOrder::MaxSideDesc => order.sort_by(|a, b| {
                let (_, aw, ah) = &sizes[*a];
                let (_, bw, bh) = &sizes[*b];
                bw.max(bh)
                    .cmp(aw.max(ah))
                    .then_with(|| sizes[*a].0.cmp(&sizes[*b].0))
            }),
            SortOrder::HeightDesc => order.sort_by(|a, b| {
                sizes[*b]
                    .2
                    .cmp(&sizes[*a].2)
                    .then_with(|| sizes[*a].0.cmp(&sizes[*b].0))
            }),
        }

        let mut packer = make_packer::<usize>(&self.cfg);
        let mut placed: Vec<Frame<usize>> = Vec::with_capacity(sizes.len());
        for i in order {
            let (_, w, h) = &sizes[i];
            match packer.pack(i, &Rect::new(0, 0, *w, *h)) {
                Some(f) => placed.push(f),
                None => {
                    return Err(AtlasExtendError::OutOfSpace {
                        placed: placed.len(),
                        total: sizes.len(),
                    });
                }
            }
        }

        let (width, height) = compute_canvas_size(&placed, &self.cfg);
        let mut frames = vec![Rect::new(0, 0, 0, 0); sizes.len()];
        for f in placed {
            frames[f.key] = f.frame;
        }
        Ok(SpriteLayout {
            width,
            height,
            frames,
        })
    }

    /// Build a fresh atlas from the pristine `baked` atlas plus `customs`.
    ///
    /// Baked tiles keep their indices; custom tiles follow in order.
    #[instrument(skip_all)]
    pub fn build(
        &self,
        baked: &SpriteAtlas,
        customs: &[CustomSprite],
    ) -> Result<(SpriteAtlas, SpriteAtlasStats)> {
        let mut items = self.extract_baked(baked)?;
        items.extend(
            customs
                .iter()
                .enumerate()
                .map(|(i, c)| self.pad_custom(c, baked.tiles.len() + i)),
        );

        let sizes: Vec<(String, u32, u32)> = items
            .iter()
            .map(|p| {
                let (w, h) = p.images.diffuse.dimensions();
                (p.key.clone(), w, h)
            })
            .collect();
        let layout = self.layout(&sizes)?;

        let border = self.cfg.sprite_border;
        let mut tiles: Vec<UvTile> = Vec::with_capacity(items.len());
        tiles.extend(baked.tiles.iter().cloned());
        tiles.extend(customs.iter().map(|c| c.tile.clone()));
        let mut used_area = 0u64;
        for (i, item) in items.iter().enumerate() {
            let f = layout.frames[i];
            used_area += f.w as u64 * f.h as u64;
            let content = Rect::new(f.x + border, f.y + border, item.content.0, item.content.1);
            tiles[i].rect = UvRect::from_pixels(&content, layout.width, layout.height);
        }

        let formats = ChannelSet::new(
            baked.canvases.diffuse.format(),
            baked.canvases.normal.format(),
            baked.canvases.specular.format(),
        );
        let canvases = self.compose(&items, &layout, &formats);

        let stats = SpriteAtlasStats {
            canvas_width: layout.width,
            canvas_height: layout.height,
            num_baked: baked.tiles.len(),
            num_custom: customs.len(),
            used_area,
            occupancy: used_area as f64 / (layout.width as f64 * layout.height as f64).max(1.0),
        };
        Ok((SpriteAtlas { canvases, tiles }, stats))
    }

    /// Rebuild `live` from `baked` plus `customs`. The tile table of `live` is
    /// updated in place and the canvases it held are handed back.
    pub fn repack(
        &self,
        live: &mut SpriteAtlas,
        baked: &SpriteAtlas,
        customs: &[CustomSprite],
    ) -> Result<RepackOutcome> {
        let (fresh, stats) = self.build(baked, customs)?;
        let SpriteAtlas { canvases, tiles } = fresh;

        live.tiles.truncate(baked.tiles.len());
        for (i, tile) in tiles.into_iter().enumerate() {
            match live.tiles.get_mut(i) {
                Some(slot) => slot.rect = tile.rect,
                None => live.tiles.push(tile),
            }
        }
        let retired = std::mem::replace(&mut live.canvases, canvases);
        info!(
            tiles = live.tiles.len(),
            custom = stats.num_custom,
            width = stats.canvas_width,
            height = stats.canvas_height,
            occupancy = stats.occupancy,
            "repacked sprite atlas"
        );
        Ok(RepackOutcome { retired, stats })
    }

    fn compose(
        &self,
        items: &[PaddedSprite],
        layout: &SpriteLayout,
        formats: &ChannelSet<PixelFormat>,
    ) -> ChannelSet<MipChain> {
        let one = |ch: Channel| {
            let mut canvas = RgbaImage::new(layout.width, layout.height);
            for (item, f) in items.iter().zip(&layout.frames) {
                blit(item.images.get(ch), &mut canvas, f.x, f.y);
            }
            MipChain::from_base(canvas, *formats.get(ch))
        };

        #[cfg(feature = "parallel")]
        {
            if self.cfg.parallel {
                let (diffuse, (normal, specular)) = rayon::join(
                    || one(Channel::Diffuse),
                    || rayon::join(|| one(Channel::Normal), || one(Channel::Specular)),
                );
                return ChannelSet::new(diffuse, normal, specular);
            }
        }

        ChannelSet::new(
            one(Channel::Diffuse),
            one(Channel::Normal),
            one(Channel::Specular),
        )
    }
}
