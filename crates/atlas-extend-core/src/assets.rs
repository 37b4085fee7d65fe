//! Asset references and the store that resolves them to pixels.
//!
//! Reference grammar, as written in configuration:
//!
//! - `bundle?a,b,c` or `a,b,c`: one side per comma-separated entry
//! - `name[3]`: layer 3 of an array-shaped asset
//! - `W:H:R:G:B[:A]`: a uniform texture synthesized on demand (channels in `0..=1`)

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use image::ImageReader;
use tracing::debug;

use crate::error::{AtlasExtendError, Result};
use crate::mip::{MipChain, PixelFormat, full_chain_len, validate_square_pow2};

/// One side of an asset list.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetRef {
    Named { name: String, layer: Option<u32> },
    Uniform { width: u32, height: u32, color: [u8; 4] },
}

impl AssetRef {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AtlasExtendError::Config("empty asset reference".into()));
        }
        if s.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ':') {
            return Self::parse_uniform(s);
        }
        if let Some(open) = s.find('[') {
            let Some(inner) = s[open + 1..].strip_suffix(']') else {
                return Err(AtlasExtendError::Config(format!(
                    "malformed layer selector in `{s}`"
                )));
            };
            let layer = inner.trim().parse::<u32>().map_err(|_| {
                AtlasExtendError::Config(format!("layer index `{inner}` in `{s}` is not a number"))
            })?;
            let name = s[..open].trim();
            if name.is_empty() {
                return Err(AtlasExtendError::Config(format!("missing asset name in `{s}`")));
            }
            return Ok(Self::Named {
                name: name.to_string(),
                layer: Some(layer),
            });
        }
        Ok(Self::Named {
            name: s.to_string(),
            layer: None,
        })
    }

    fn parse_uniform(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 5 && parts.len() != 6 {
            return Err(AtlasExtendError::Config(format!(
                "uniform texture `{s}` needs W:H:R:G:B[:A]"
            )));
        }
        let dim = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| AtlasExtendError::Config(format!("bad dimension `{p}` in `{s}`")))
        };
        let chan = |p: &str| -> Result<u8> {
            let v = p
                .parse::<f32>()
                .map_err(|_| AtlasExtendError::Config(format!("bad channel `{p}` in `{s}`")))?;
            if !(0.0..=1.0).contains(&v) {
                return Err(AtlasExtendError::Config(format!(
                    "channel `{p}` in `{s}` is outside 0..=1"
                )));
            }
            Ok((v * 255.0).round() as u8)
        };
        let alpha = match parts.get(5) {
            Some(a) => chan(a)?,
            None => 255,
        };
        Ok(Self::Uniform {
            width: dim(parts[0])?,
            height: dim(parts[1])?,
            color: [chan(parts[2])?, chan(parts[3])?, chan(parts[4])?, alpha],
        })
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { name, layer: None } => write!(f, "{name}"),
            Self::Named {
                name,
                layer: Some(l),
            } => write!(f, "{name}[{l}]"),
            Self::Uniform {
                width,
                height,
                color,
            } => write!(
                f,
                "{width}:{height}:{}:{}:{}:{}",
                color[0] as f32 / 255.0,
                color[1] as f32 / 255.0,
                color[2] as f32 / 255.0,
                color[3] as f32 / 255.0
            ),
        }
    }
}

/// An ordered list of sides, optionally scoped to a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetList {
    pub bundle: Option<String>,
    pub sides: Vec<AssetRef>,
}

impl AssetList {
    pub fn parse(s: &str) -> Result<Self> {
        let (bundle, rest) = match s.split_once('?') {
            Some((b, r)) => {
                let b = b.trim();
                if b.is_empty() {
                    return Err(AtlasExtendError::Config(format!("empty bundle in `{s}`")));
                }
                (Some(b.to_string()), r)
            }
            None => (None, s),
        };
        let sides = rest
            .split(',')
            .map(AssetRef::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { bundle, sides })
    }

    pub fn len(&self) -> usize {
        self.sides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sides.is_empty()
    }

    /// Location of side `i`; `None` for synthesized sides and out-of-range indices.
    pub fn location(&self, i: usize) -> Option<AssetLocation<'_>> {
        match self.sides.get(i)? {
            AssetRef::Named { name, layer } => Some(AssetLocation {
                bundle: self.bundle.as_deref(),
                name,
                layer: *layer,
            }),
            AssetRef::Uniform { .. } => None,
        }
    }

    /// Human readable reference for side `i`, used in errors and logs.
    pub fn describe(&self, i: usize) -> String {
        let side = self.sides.get(i).map(|s| s.to_string()).unwrap_or_default();
        match &self.bundle {
            Some(b) => format!("{b}?{side}"),
            None => side,
        }
    }
}

impl fmt::Display for AssetList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(b) = &self.bundle {
            write!(f, "{b}?")?;
        }
        for (i, side) in self.sides.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{side}")?;
        }
        Ok(())
    }
}

/// Where a named side lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetLocation<'a> {
    pub bundle: Option<&'a str>,
    pub name: &'a str,
    pub layer: Option<u32>,
}

impl fmt::Display for AssetLocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(b) = self.bundle {
            write!(f, "{b}?")?;
        }
        write!(f, "{}", self.name)?;
        if let Some(l) = self.layer {
            write!(f, "[{l}]")?;
        }
        Ok(())
    }
}

/// Source of pixel data for named assets.
///
/// `format` is the storage format of the array the pixels are headed for.
/// Stores without format information tag decoded images with it; stores that
/// know the format of their assets return it unchanged so that mismatches are
/// caught by [`load_checked`].
pub trait AssetStore {
    fn load_image(&mut self, location: &AssetLocation<'_>, format: PixelFormat) -> Result<MipChain>;
}

fn not_found(location: &AssetLocation<'_>) -> AtlasExtendError {
    AtlasExtendError::InvalidAsset {
        reference: location.to_string(),
        reason: "not found".into(),
    }
}

/// Resolve side `i` of `list` and enforce the structural rules of layered
/// storage: square, power-of-two, and in the requested format.
pub fn load_checked(
    store: &mut dyn AssetStore,
    list: &AssetList,
    i: usize,
    format: PixelFormat,
) -> Result<MipChain> {
    let reference = list.describe(i);
    let chain = match list.sides.get(i) {
        Some(AssetRef::Uniform {
            width,
            height,
            color,
        }) => MipChain::uniform(*width, *height, *color, format, full_chain_len(*width, *height)),
        Some(AssetRef::Named { .. }) => {
            let Some(location) = list.location(i) else {
                return Err(AtlasExtendError::Config(format!("side {i} of `{list}`")));
            };
            store.load_image(&location, format)?
        }
        None => {
            return Err(AtlasExtendError::Config(format!(
                "side {i} missing in `{list}`"
            )));
        }
    };
    if let Err(reason) = validate_square_pow2(chain.width(), chain.height()) {
        return Err(AtlasExtendError::InvalidAsset { reference, reason });
    }
    if chain.format() != format {
        return Err(AtlasExtendError::InvalidAsset {
            reference,
            reason: format!("format {:?} does not match {:?}", chain.format(), format),
        });
    }
    Ok(chain)
}

/// Loads assets from a directory tree: `<root>/<bundle>/<name>`.
///
/// A name without extension is tried as `.png`, `.jpg`, `.jpeg` and `.tga`.
/// Array-shaped assets are vertical strips of square layers.
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, location: &AssetLocation<'_>) -> Option<PathBuf> {
        let mut base = self.root.clone();
        if let Some(b) = location.bundle {
            base.push(b);
        }
        base.push(location.name);
        if base.extension().is_some() && base.is_file() {
            return Some(base);
        }
        ["png", "jpg", "jpeg", "tga"]
            .iter()
            .map(|ext| base.with_extension(ext))
            .find(|p| p.is_file())
    }
}

impl AssetStore for DirAssetStore {
    fn load_image(&mut self, location: &AssetLocation<'_>, format: PixelFormat) -> Result<MipChain> {
        let path = self.resolve(location).ok_or_else(|| not_found(location))?;
        debug!(?path, "load asset");
        let img = ImageReader::open(&path)?
            .with_guessed_format()?
            .decode()?
            .to_rgba8();
        let img = match location.layer {
            None => img,
            Some(layer) => {
                let (w, h) = img.dimensions();
                if w == 0 || h % w != 0 || layer >= h / w {
                    return Err(AtlasExtendError::InvalidAsset {
                        reference: location.to_string(),
                        reason: format!("no layer {layer} in a {w}x{h} strip"),
                    });
                }
                image::imageops::crop_imm(&img, 0, layer * w, w, w).to_image()
            }
        };
        Ok(MipChain::from_base(img, format))
    }
}

/// In-memory store, mainly for tests and tools that generate assets.
#[derive(Debug, Default, Clone)]
pub struct MemoryAssetStore {
    entries: HashMap<String, Vec<MipChain>>,
    loads: usize,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single-layer asset. `key` is `name` or `bundle?name`.
    pub fn insert(&mut self, key: impl Into<String>, chain: MipChain) {
        self.entries.insert(key.into(), vec![chain]);
    }

    /// Register an array-shaped asset addressed as `key[i]`.
    pub fn insert_layers(&mut self, key: impl Into<String>, layers: Vec<MipChain>) {
        self.entries.insert(key.into(), layers);
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Number of successful loads served.
    pub fn load_count(&self) -> usize {
        self.loads
    }
}

impl AssetStore for MemoryAssetStore {
    fn load_image(&mut self, location: &AssetLocation<'_>, _format: PixelFormat) -> Result<MipChain> {
        let scoped = location.bundle.map(|b| format!("{b}?{}", location.name));
        let layers = scoped
            .as_deref()
            .and_then(|k| self.entries.get(k))
            .or_else(|| self.entries.get(location.name))
            .ok_or_else(|| not_found(location))?;
        let chain = layers
            .get(location.layer.unwrap_or(0) as usize)
            .cloned()
            .ok_or_else(|| not_found(location))?;
        self.loads += 1;
        Ok(chain)
    }
}
