use atlas_extend_core::prelude::*;

fn chain(color: [u8; 4]) -> MipChain {
    MipChain::uniform(8, 8, color, PixelFormat::Rgba8Unorm, 4)
}

fn setup(tier: QualityTier, size: u32, levels: usize) -> (PatchSession, MemoryAssetStore) {
    let one = |label: &str| {
        LayeredImageArray::new(label, size, size, PixelFormat::Rgba8Unorm, levels, 2)
            .expect("array")
    };
    let mut s = PatchSession::new(ExtendConfig::default(), tier).expect("session");
    s.add_layered_target(
        "opaque",
        ChannelSet::new(one("diffuse"), one("normal"), one("specular")),
        None,
    )
    .expect("target");
    let mut store = MemoryAssetStore::new();
    store.insert("rock", chain([200, 10, 10, 255]));
    store.insert("sand", chain([10, 200, 10, 255]));
    store.insert("sand_n", chain([128, 128, 255, 255]));
    let batch = ConfigBatch::from_json_str(
        r#"{"textures":[
            {"id":"rock","diffuse":"rock"},
            {"id":"sand","diffuse":"sand","normal":"sand_n"}
        ]}"#,
    )
    .expect("batch");
    s.load(batch, &mut store).expect("load");
    (s, store)
}

fn diffuse(s: &PatchSession) -> &LayeredImageArray {
    s.layered_target("opaque").expect("target").array(Channel::Diffuse)
}

#[test]
fn full_to_half_rewrites_every_entry() {
    let (mut s, mut store) = setup(QualityTier::Full, 8, 4);
    let writes_before = diffuse(&s).write_count();

    let report = s.set_quality_tier(QualityTier::Half, &mut store);
    assert!(report.transition.needs_repatch());
    assert_eq!(report.written, 2);
    assert!(report.skipped.is_empty());

    let arr = diffuse(&s);
    assert_eq!((arr.width(), arr.height()), (4, 4));
    assert_eq!(arr.level_count(), 3);
    assert_eq!(arr.capacity(), 4);
    assert_eq!(arr.write_count(), writes_before + 2);
    assert!(arr.is_applied());
    let px = arr.layer(2).expect("layer")[0].get_pixel(2, 2).0;
    assert_eq!(px, [200, 10, 10, 255]);
}

#[test]
fn floor_tiers_do_not_write() {
    let (mut s, mut store) = setup(QualityTier::Full, 8, 4);
    s.set_quality_tier(QualityTier::Quarter, &mut store);
    assert_eq!(diffuse(&s).width(), 2);
    let writes = diffuse(&s).write_count();

    let report = s.set_quality_tier(QualityTier::Eighth, &mut store);
    assert!(matches!(report.transition, TierTransition::FloorEquivalent { .. }));
    assert_eq!(report.written, 0);
    assert_eq!(diffuse(&s).write_count(), writes);
    assert_eq!(diffuse(&s).width(), 2);

    let report = s.set_quality_tier(QualityTier::Quarter, &mut store);
    assert_eq!(report.written, 0);
    assert_eq!(s.quality_tier(), Some(QualityTier::Quarter));
}

#[test]
fn unchanged_tier_is_a_no_op() {
    let (mut s, mut store) = setup(QualityTier::Full, 8, 4);
    let report = s.set_quality_tier(QualityTier::Full, &mut store);
    assert_eq!(report.transition, TierTransition::Unchanged(QualityTier::Full));
    assert_eq!(report.written, 0);
}

#[test]
fn returning_to_full_restores_resolution() {
    let (mut s, mut store) = setup(QualityTier::Full, 8, 4);
    s.set_quality_tier(QualityTier::Quarter, &mut store);
    let report = s.set_quality_tier(QualityTier::Full, &mut store);
    assert_eq!(report.written, 2);
    let arr = diffuse(&s);
    assert_eq!(arr.width(), 8);
    assert_eq!(arr.level_count(), 4);
    let px = arr.layer(3).expect("layer")[0].get_pixel(7, 7).0;
    assert_eq!(px, [10, 200, 10, 255]);
}

#[test]
fn session_started_at_half_reads_sources_at_offset() {
    let (s, _) = setup(QualityTier::Half, 4, 3);
    let t = s.layered_target("opaque").expect("target");
    assert_eq!(t.full_size(), 8);
    let px = t.array(Channel::Normal).layer(3).expect("layer")[2].get_pixel(0, 0).0;
    assert_eq!(px, [128, 128, 255, 255]);
}

#[test]
fn missing_asset_is_skipped_during_repatch() {
    let (mut s, mut store) = setup(QualityTier::Full, 8, 4);
    assert!(store.remove("sand"));
    let report = s.set_quality_tier(QualityTier::Half, &mut store);
    assert_eq!(report.written, 1);
    assert_eq!(report.skipped, vec!["sand".to_string()]);
    assert!(diffuse(&s).is_applied());
}

#[test]
fn controller_classifies_transitions() {
    let mut c = QualityTierController::new();
    assert_eq!(c.observe(QualityTier::Half), TierTransition::Initialized(QualityTier::Half));
    assert!(c.observe(QualityTier::Full).needs_repatch());
    assert!(c.observe(QualityTier::Eighth).needs_repatch());
    assert!(!c.observe(QualityTier::Quarter).needs_repatch());
    assert_eq!(QualityTier::Eighth.resolution_offset(), 2);
    assert_eq!(QualityTier::from_setting(1), QualityTier::Half);
}

fn checker() -> MipChain {
    let base = image::RgbaImage::from_fn(8, 8, |x, y| {
        if (x + y) % 2 == 0 {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([0, 0, 0, 255])
        }
    });
    MipChain::from_base(base, PixelFormat::Rgba8Unorm)
}

fn checker_arrays(tier: QualityTier) -> PatchSession {
    let one = |label: &str| LayeredImageArray::from_layers(label, vec![checker()]).expect("array");
    let mut s = PatchSession::new(ExtendConfig::default(), tier).expect("session");
    s.add_layered_target(
        "opaque",
        ChannelSet::new(one("diffuse"), one("normal"), one("specular")),
        None,
    )
    .expect("target");
    s
}

#[test]
fn builtin_layers_survive_a_round_trip_through_quarter() {
    let mut s = checker_arrays(QualityTier::Full);
    let mut store = MemoryAssetStore::new();

    s.set_quality_tier(QualityTier::Quarter, &mut store);
    assert_eq!(diffuse(&s).width(), 2);

    s.set_quality_tier(QualityTier::Full, &mut store);
    let arr = diffuse(&s);
    assert_eq!((arr.width(), arr.level_count()), (8, 4));
    let base = &arr.layer(0).expect("layer")[0];
    assert_eq!(base.get_pixel(0, 0).0, [255, 255, 255, 255]);
    assert_eq!(base.get_pixel(1, 0).0, [0, 0, 0, 255]);
    assert_eq!(base.get_pixel(7, 6).0, [0, 0, 0, 255]);
}

#[test]
fn host_supplied_builtin_source_is_used_when_going_up() {
    let one = |label: &str| {
        LayeredImageArray::new(label, 4, 4, PixelFormat::Rgba8Unorm, 3, 1).expect("array")
    };
    let mut s = PatchSession::new(ExtendConfig::default(), QualityTier::Half).expect("session");
    s.add_layered_target(
        "opaque",
        ChannelSet::new(one("diffuse"), one("normal"), one("specular")),
        None,
    )
    .expect("target");

    let wrong = ChannelSet::new(vec![], vec![], vec![]);
    assert!(s.set_builtin_source("opaque", wrong).is_err());
    assert!(matches!(
        s.set_builtin_source("nowhere", ChannelSet::new(vec![], vec![], vec![])),
        Err(AtlasExtendError::UnknownTarget(_))
    ));
    s.set_builtin_source(
        "opaque",
        ChannelSet::new(vec![checker()], vec![checker()], vec![checker()]),
    )
    .expect("source");

    let mut store = MemoryAssetStore::new();
    s.set_quality_tier(QualityTier::Full, &mut store);
    let base = &diffuse(&s).layer(0).expect("layer")[0];
    assert_eq!(base.dimensions(), (8, 8));
    assert_eq!(base.get_pixel(0, 0).0, [255, 255, 255, 255]);
    assert_eq!(base.get_pixel(0, 1).0, [0, 0, 0, 255]);
}
