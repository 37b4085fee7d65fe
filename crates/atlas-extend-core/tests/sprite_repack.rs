use atlas_extend_core::prelude::*;
use image::{Rgba, RgbaImage};

fn disjoint(frames: &[Rect]) -> bool {
    for i in 0..frames.len() {
        for j in (i + 1)..frames.len() {
            let a = &frames[i];
            let b = &frames[j];
            let overlap = !(a.x >= b.x + b.w || b.x >= a.x + a.w || a.y >= b.y + b.h || b.y >= a.y + a.h);
            if overlap {
                return false;
            }
        }
    }
    true
}

fn canvas(color: [u8; 4]) -> MipChain {
    MipChain::from_base(
        RgbaImage::from_pixel(64, 64, Rgba(color)),
        PixelFormat::Rgba8Unorm,
    )
}

/// Two 16x16 tiles side by side on a 64x64 canvas.
fn baked() -> SpriteAtlas {
    let tiles = vec![
        UvTile::new(0, UvRect::from_pixels(&Rect::new(0, 0, 16, 16), 64, 64), "grass"),
        UvTile::new(0, UvRect::from_pixels(&Rect::new(16, 0, 16, 16), 64, 64), "fern"),
    ];
    SpriteAtlas::new(
        ChannelSet::new(
            canvas([10, 120, 10, 255]),
            canvas([255, 128, 128, 128]),
            canvas([0, 0, 0, 255]),
        ),
        tiles,
    )
    .expect("atlas")
}

fn custom(name: &str, size: u32, color: [u8; 4]) -> CustomSprite {
    CustomSprite::new(
        UvTile::new(0, UvRect::default(), name),
        ChannelSet::new(
            RgbaImage::from_pixel(size, size, Rgba(color)),
            RgbaImage::from_pixel(size, size, Rgba([255, 128, 128, 128])),
            RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 255])),
        ),
    )
    .expect("sprite")
}

fn packer(family: AlgorithmFamily) -> SpriteAtlasPacker {
    let cfg = PackerConfig::builder()
        .with_max_dimensions(1024, 1024)
        .sprite_border(4)
        .texture_padding(2)
        .family(family)
        .build();
    SpriteAtlasPacker::new(cfg).expect("packer")
}

#[test]
fn custom_sprites_follow_baked_tiles() {
    for family in [AlgorithmFamily::MaxRects, AlgorithmFamily::Skyline] {
        let p = packer(family);
        let baked = baked();
        let customs = vec![custom("moss", 32, [1, 2, 3, 255]), custom("reed", 8, [9, 9, 9, 255])];
        let (atlas, stats) = p.build(&baked, &customs).expect("build");

        assert_eq!(atlas.tiles.len(), 4);
        assert_eq!(stats.num_baked, 2);
        assert_eq!(stats.num_custom, 2);
        assert_eq!(atlas.tiles[0].texture_name, "grass");
        assert_eq!(atlas.tiles[3].texture_name, "reed");
        assert!(atlas.width().is_power_of_two());
        assert_eq!(atlas.width(), atlas.height());

        let rects: Vec<Rect> = (0..4).map(|i| atlas.tile_pixels(i).expect("tile")).collect();
        let sizes: Vec<(u32, u32)> = rects.iter().map(|r| (r.w, r.h)).collect();
        assert_eq!(sizes, vec![(16, 16), (16, 16), (32, 32), (8, 8)]);
        assert!(disjoint(&rects), "{family:?} produced overlapping tiles");

        let moss = rects[2];
        let px = atlas.canvases.diffuse.base().get_pixel(moss.x + 5, moss.y + 5).0;
        assert_eq!(px, [1, 2, 3, 255]);
        // bleed margin carries the edge color
        let edge = atlas.canvases.diffuse.base().get_pixel(moss.x - 1, moss.y).0;
        assert_eq!(edge, [1, 2, 3, 255]);
    }
}

#[test]
fn channels_share_one_layout() {
    let (atlas, _) = packer(AlgorithmFamily::MaxRects)
        .build(&baked(), &[custom("moss", 32, [1, 2, 3, 255])])
        .expect("build");
    for (_, c) in atlas.canvases.iter() {
        assert_eq!((c.width(), c.height()), (atlas.width(), atlas.height()));
    }
    let grass = atlas.tile_pixels(0).expect("tile");
    let n = atlas.canvases.normal.base().get_pixel(grass.x, grass.y).0;
    let d = atlas.canvases.diffuse.base().get_pixel(grass.x, grass.y).0;
    assert_eq!(n, [255, 128, 128, 128]);
    assert_eq!(d, [10, 120, 10, 255]);
}

#[test]
fn repack_updates_live_tiles_in_place() {
    let p = packer(AlgorithmFamily::MaxRects);
    let baked = baked();
    let mut live = baked.clone();
    let out = p
        .repack(&mut live, &baked, &[custom("moss", 16, [1, 2, 3, 255])])
        .expect("repack");
    assert_eq!(out.retired.diffuse.width(), 64);
    assert_eq!(live.tiles.len(), 3);
    assert_eq!(live.tiles[2].texture_name, "moss");

    // repacking again from the pristine atlas drops the old custom tile
    p.repack(&mut live, &baked, &[]).expect("repack");
    assert_eq!(live.tiles.len(), 2);
    let r = live.tile_pixels(1).expect("tile");
    assert_eq!((r.w, r.h), (16, 16));
}

#[test]
fn too_small_canvas_is_out_of_space() {
    let cfg = PackerConfig::builder()
        .with_max_dimensions(64, 64)
        .sprite_border(8)
        .texture_padding(0)
        .build();
    let p = SpriteAtlasPacker::new(cfg).expect("packer");
    let err = p
        .build(&baked(), &[custom("huge", 64, [0, 0, 0, 255])])
        .unwrap_err();
    assert!(matches!(err, AtlasExtendError::OutOfSpace { .. }));
}

#[test]
fn session_repacks_only_when_sprites_change() {
    let mut s = PatchSession::new(ExtendConfig::default(), QualityTier::Full).expect("session");
    s.add_sprite_target("foliage", baked()).expect("target");
    let mut store = MemoryAssetStore::new();
    let json = r#"{"textures":[{"id":"moss","target":"foliage","diffuse":"16:16:0:1:0"}]}"#;

    let report = s
        .load(ConfigBatch::from_json_str(json).expect("batch"), &mut store)
        .expect("load");
    assert_eq!(report.repacked, vec!["foliage".to_string()]);
    assert_eq!(s.lookup("foliage", "moss"), Some(2));
    let t = s.sprite_target("foliage").expect("target");
    assert_eq!(t.live().tiles.len(), 3);
    assert_eq!(t.baked().tiles.len(), 2);
    assert_eq!(t.repack_count(), 1);
    let moss = t.live().tile_pixels(2).expect("tile");
    let n = t.live().canvases.normal.base().get_pixel(moss.x, moss.y).0;
    assert_eq!(n, [255, 128, 128, 128]);

    let report = s
        .load(ConfigBatch::from_json_str(json).expect("batch"), &mut store)
        .expect("load");
    assert!(report.repacked.is_empty());
    assert_eq!(s.sprite_target("foliage").expect("target").repack_count(), 1);
    assert_eq!(s.lookup("foliage", "moss"), Some(2));
}

#[test]
fn sprite_targets_reject_arrays_and_overwrites() {
    let mut s = PatchSession::new(ExtendConfig::default(), QualityTier::Full).expect("session");
    s.add_sprite_target("foliage", baked()).expect("target");
    let mut store = MemoryAssetStore::new();
    for json in [
        r#"{"textures":[{"id":"a","target":"foliage","diffuse":"16:16:0:1:0,16:16:0:1:0"}]}"#,
        r#"{"textures":[{"id":"1","target":"foliage","diffuse":"16:16:0:1:0"}]}"#,
    ] {
        let err = s
            .load(ConfigBatch::from_json_str(json).expect("batch"), &mut store)
            .unwrap_err();
        assert!(matches!(err, AtlasExtendError::Config(_)));
    }
}
