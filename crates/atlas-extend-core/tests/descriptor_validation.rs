use atlas_extend_core::prelude::*;

#[test]
fn defaults_fill_missing_fields() {
    let batch = ConfigBatch::from_json_str(r#"{"textures":[{"id":"rock","diffuse":"rock_d"}]}"#)
        .expect("batch");
    let d = &batch.entries()[0];
    assert_eq!(d.id, SlotId::Named("rock".into()));
    assert_eq!(d.target, "opaque");
    assert_eq!(d.texture_name(), "rock");
    assert_eq!(d.tiling, UvRect::new(0.0, 0.0, 1.0, 1.0));
    assert_eq!((d.block_w, d.block_h), (1, 1));
    assert_eq!(d.tint, [1.0; 4]);
    assert!(d.normal.is_none());
    assert_eq!(d.channel(Channel::Diffuse).map(|l| l.len()), Some(1));
    assert!(d.channel(Channel::Specular).is_none());
}

#[test]
fn side_counts_must_agree() {
    let err = ConfigBatch::from_json_str(
        r#"{"textures":[{"id":"w","diffuse":"a,b,c","normal":"an,bn"}]}"#,
    )
    .unwrap_err();
    match err {
        AtlasExtendError::SideCountMismatch {
            id,
            channel,
            expected,
            found,
        } => {
            assert_eq!(id, "w");
            assert_eq!(channel, "normal");
            assert_eq!((expected, found), (3, 2));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn entries_need_id_and_diffuse() {
    assert!(ConfigBatch::from_json_str(r#"{"textures":[{"diffuse":"a"}]}"#).is_err());
    assert!(ConfigBatch::from_json_str(r#"{"textures":[{"id":"  ","diffuse":"a"}]}"#).is_err());
    assert!(ConfigBatch::from_json_str(r#"{"textures":[{"id":"a"}]}"#).is_err());
    assert!(ConfigBatch::from_json_str(r#"{"textures":[{"id":"a","diffuse":"a","blockw":0}]}"#).is_err());
    assert!(ConfigBatch::from_json_str("not json").is_err());
}

#[test]
fn duplicate_ids_keep_last_definition_in_first_position() {
    let batch = ConfigBatch::from_json_str(
        r#"{"textures":[
            {"id":"a","diffuse":"one"},
            {"id":"b","diffuse":"two"},
            {"id":"a","diffuse":"three"},
            {"id":"a","target":"alpha","diffuse":"four"}
        ]}"#,
    )
    .expect("batch");
    assert_eq!(batch.len(), 3);
    let keys: Vec<String> = batch.iter().map(|d| d.diffuse.to_string()).collect();
    assert_eq!(keys, vec!["three", "two", "four"]);
}

#[test]
fn numeric_ids_are_sixteen_bit() {
    assert_eq!(SlotId::parse("42"), SlotId::Numeric(42));
    assert_eq!(SlotId::parse("65535"), SlotId::Numeric(65535));
    assert_eq!(SlotId::parse("65536"), SlotId::Named("65536".into()));
    assert_eq!(SlotId::parse("-1"), SlotId::Named("-1".into()));
}

#[test]
fn tile_carries_descriptor_metadata() {
    let batch = ConfigBatch::from_json_str(
        r#"{"textures":[{"id":"a","name":"brick","diffuse":"b","x":0.5,"w":0.5,"blockw":2,
            "material":"stone","tint":[1.0,0.5,0.5,1.0],"global_uv":true}]}"#,
    )
    .expect("batch");
    let tile = batch.entries()[0].tile(7);
    assert_eq!(tile.layer_index, 7);
    assert_eq!(tile.texture_name, "brick");
    assert_eq!(tile.rect.x, 0.5);
    assert_eq!(tile.block_w, 2);
    assert_eq!(tile.material.as_deref(), Some("stone"));
    assert!(tile.flags.global_uv);
    assert!(!tile.flags.switch_uv);
}

#[test]
fn asset_grammar() {
    let list = AssetList::parse("terrain?rock,sand[2], 4:4:1:0:0.5").expect("list");
    assert_eq!(list.bundle.as_deref(), Some("terrain"));
    assert_eq!(list.len(), 3);
    assert_eq!(
        list.sides[1],
        AssetRef::Named {
            name: "sand".into(),
            layer: Some(2)
        }
    );
    assert_eq!(
        list.sides[2],
        AssetRef::Uniform {
            width: 4,
            height: 4,
            color: [255, 0, 128, 255]
        }
    );
    let loc = list.location(1).expect("location");
    assert_eq!((loc.bundle, loc.name, loc.layer), (Some("terrain"), "sand", Some(2)));
    assert!(list.location(2).is_none());

    assert!(AssetRef::parse("4:4:2:0:0").is_err());
    assert!(AssetRef::parse("4:4:1").is_err());
    assert!(AssetRef::parse("x[").is_err());
    assert!(AssetRef::parse("").is_err());
    assert!(AssetList::parse("?a").is_err());
}

#[test]
fn store_enforces_square_power_of_two() {
    let mut store = MemoryAssetStore::new();
    store.insert(
        "wide",
        MipChain::uniform(8, 4, [0, 0, 0, 255], PixelFormat::Rgba8Unorm, 1),
    );
    store.insert(
        "odd",
        MipChain::uniform(6, 6, [0, 0, 0, 255], PixelFormat::Rgba8Unorm, 1),
    );
    store.insert(
        "srgb",
        MipChain::uniform(8, 8, [0, 0, 0, 255], PixelFormat::Rgba8Srgb, 4),
    );
    store.insert_layers(
        "pack?strip",
        vec![
            MipChain::uniform(8, 8, [1, 0, 0, 255], PixelFormat::Rgba8Unorm, 4),
            MipChain::uniform(8, 8, [2, 0, 0, 255], PixelFormat::Rgba8Unorm, 4),
        ],
    );
    let fmt = PixelFormat::Rgba8Unorm;
    for name in ["wide", "odd", "srgb", "missing"] {
        let list = AssetList::parse(name).expect("list");
        let err = atlas_extend_core::assets::load_checked(&mut store, &list, 0, fmt).unwrap_err();
        assert!(matches!(err, AtlasExtendError::InvalidAsset { .. }), "{name}");
    }
    let list = AssetList::parse("pack?strip[1]").expect("list");
    let chain = atlas_extend_core::assets::load_checked(&mut store, &list, 0, fmt).expect("load");
    assert_eq!(chain.base().get_pixel(0, 0).0, [2, 0, 0, 255]);
    assert_eq!(store.load_count(), 4);
}
