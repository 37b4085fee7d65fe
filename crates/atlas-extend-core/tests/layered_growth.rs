use atlas_extend_core::fallback::FallbackImageFactory;
use atlas_extend_core::prelude::*;

fn array(capacity: usize) -> LayeredImageArray {
    LayeredImageArray::new("diffuse", 8, 8, PixelFormat::Rgba8Unorm, 4, capacity).expect("array")
}

#[test]
fn growth_preserves_existing_layers() {
    let mut arr = array(2);
    let red = MipChain::uniform(8, 8, [255, 0, 0, 255], PixelFormat::Rgba8Unorm, 4);
    arr.write(1, &red, 0).expect("write");
    arr.apply();
    let generation = arr.generation();

    assert!(arr.ensure_capacity(5));
    assert_eq!(arr.capacity(), 5);
    assert_eq!(arr.generation(), generation + 1);
    assert!(!arr.is_applied());
    assert_eq!(arr.layer(1).expect("layer")[0].get_pixel(4, 4).0, [255, 0, 0, 255]);
    assert_eq!(arr.layer(4).expect("layer")[0].get_pixel(4, 4).0, [0, 0, 0, 0]);

    // never shrinks
    assert!(!arr.ensure_capacity(3));
    assert_eq!(arr.capacity(), 5);
    assert_eq!(arr.growth_count(), 1);
    assert_eq!(arr.capacity_requests(), 2);
}

#[test]
fn write_validates_geometry() {
    let mut arr = array(1);
    let small = MipChain::uniform(4, 4, [1, 1, 1, 255], PixelFormat::Rgba8Unorm, 3);
    assert!(matches!(
        arr.write(0, &small, 0),
        Err(AtlasExtendError::LevelMismatch { .. })
    ));
    let big = MipChain::uniform(16, 16, [1, 1, 1, 255], PixelFormat::Rgba8Unorm, 5);
    assert!(matches!(
        arr.write(0, &big, 0),
        Err(AtlasExtendError::DimensionMismatch { .. })
    ));
    arr.write(0, &big, 1).expect("offset write");
    assert!(matches!(
        arr.write(1, &big, 1),
        Err(AtlasExtendError::IndexOutOfRange { index: 1, capacity: 1, .. })
    ));
    let srgb = MipChain::uniform(8, 8, [1, 1, 1, 255], PixelFormat::Rgba8Srgb, 4);
    assert!(matches!(
        arr.write(0, &srgb, 0),
        Err(AtlasExtendError::InvalidAsset { .. })
    ));
}

#[test]
fn rebase_keeps_matching_levels() {
    let mut arr = array(1);
    let chain = MipChain::uniform(8, 8, [7, 8, 9, 255], PixelFormat::Rgba8Unorm, 4);
    arr.write(0, &chain, 0).expect("write");
    arr.rebase(4, 4, 3).expect("rebase");
    assert_eq!((arr.width(), arr.height(), arr.level_count()), (4, 4, 3));
    let layer = arr.layer(0).expect("layer");
    assert_eq!(layer.len(), 3);
    assert_eq!(layer[0].dimensions(), (4, 4));
    assert_eq!(layer[0].get_pixel(0, 0).0, [7, 8, 9, 255]);
}

#[test]
fn from_layers_requires_uniform_shape() {
    let a = MipChain::uniform(8, 8, [0, 0, 0, 255], PixelFormat::Rgba8Unorm, 4);
    let b = MipChain::uniform(4, 4, [0, 0, 0, 255], PixelFormat::Rgba8Unorm, 3);
    assert!(LayeredImageArray::from_layers("x", vec![a.clone(), a.clone()]).is_ok());
    assert!(LayeredImageArray::from_layers("x", vec![a, b]).is_err());
    assert!(LayeredImageArray::from_layers("x", Vec::new()).is_err());
}

#[test]
fn fallback_images_are_cached_per_geometry() {
    let mut f = FallbackImageFactory::new(FallbackPalette::default());
    let n = f.image(FallbackKind::Normal, 8, 8, 4, PixelFormat::Rgba8Unorm).clone();
    assert_eq!(n.level_count(), 4);
    assert_eq!(n.base().get_pixel(0, 0).0, [255, 128, 128, 128]);
    f.image(FallbackKind::Normal, 8, 8, 4, PixelFormat::Rgba8Unorm);
    assert_eq!(f.cached(), 1);
    f.image(FallbackKind::Specular, 8, 8, 4, PixelFormat::Rgba8Unorm);
    f.image(FallbackKind::Normal, 4, 4, 3, PixelFormat::Rgba8Unorm);
    assert_eq!(f.cached(), 3);

    let mut arr = array(1);
    arr.write_fallback(0, FallbackKind::Specular, &mut f).expect("fallback");
    assert_eq!(arr.layer(0).expect("layer")[3].get_pixel(0, 0).0, [0, 0, 0, 255]);
    assert_eq!(f.cached(), 3);
}
