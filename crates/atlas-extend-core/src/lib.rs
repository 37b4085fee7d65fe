//! Runtime extension of fixed-capacity texture atlases.
//!
//! - Layered targets: growable diffuse/normal/specular image arrays with a
//!   name-to-slot registry, fallback placeholders for missing channels, and
//!   re-patching when the quality tier changes.
//! - Sprite targets: a single packed canvas per channel, repacked from the
//!   pristine baked atlas plus custom sprites (MaxRects or Skyline).
//! - Loads are planned up front so each array grows at most once per batch.
//!
//! Quick example:
//! ```ignore
//! use atlas_extend_core::prelude::*;
//! # fn main() -> atlas_extend_core::Result<()> {
//! let arrays = ChannelSet::new(
//!     LayeredImageArray::new("diffuse", 64, 64, PixelFormat::Rgba8Unorm, 7, 20)?,
//!     LayeredImageArray::new("normal", 64, 64, PixelFormat::Rgba8Unorm, 7, 20)?,
//!     LayeredImageArray::new("specular", 64, 64, PixelFormat::Rgba8Unorm, 7, 20)?,
//! );
//! let mut session = PatchSession::new(ExtendConfig::default(), QualityTier::Full)?;
//! session.add_layered_target("opaque", arrays, None)?;
//! let batch = ConfigBatch::from_json_str(r#"{"textures":[{"id":"rock","diffuse":"64:64:0.4:0.4:0.4"}]}"#)?;
//! let mut store = MemoryAssetStore::new();
//! session.load(batch, &mut store)?;
//! assert_eq!(session.lookup("opaque", "rock"), Some(20));
//! # Ok(()) }
//! ```

pub mod assets;
pub mod compositing;
pub mod config;
pub mod descriptor;
pub mod dump;
pub mod error;
pub mod export;
pub mod fallback;
pub mod hooks;
pub mod layered;
pub mod mip;
pub mod model;
pub mod packer;
pub mod planner;
pub mod quality;
pub mod registry;
pub mod session;
pub mod sprite_atlas;

pub use config::*;
pub use error::*;
pub use export::*;
pub use model::*;
pub use packer::*;
pub use session::*;

/// Convenience prelude for common types and functions.
/// Importing `atlas_extend_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::assets::{AssetList, AssetRef, AssetStore, DirAssetStore, MemoryAssetStore};
    pub use crate::config::{
        AlgorithmFamily, ExtendConfig, MaxRectsHeuristic, PackerConfig, PackerConfigBuilder,
        SkylineHeuristic, SortOrder,
    };
    pub use crate::descriptor::{ConfigBatch, RawDescriptor, SlotId, TextureDescriptor};
    pub use crate::dump::{DumpOptions, dump_session};
    pub use crate::error::{AtlasExtendError, Result};
    pub use crate::fallback::{FallbackImageFactory, FallbackKind, FallbackPalette};
    pub use crate::hooks::{NoopHooks, PatchHooks};
    pub use crate::layered::{Channel, ChannelSet, LayeredImageArray};
    pub use crate::mip::{MipChain, PixelFormat};
    pub use crate::model::{Rect, SpriteAtlasStats, TileFlags, UvRect, UvTile};
    pub use crate::quality::{QualityTier, QualityTierController, TierTransition};
    pub use crate::registry::{Binding, SlotRegistry};
    pub use crate::session::{LoadReport, PatchSession, RepatchReport};
    pub use crate::sprite_atlas::{CustomSprite, SpriteAtlas, SpriteAtlasPacker};
}
