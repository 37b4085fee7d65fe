//! Texture descriptors: the validated form of one configuration entry.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::assets::AssetList;
use crate::error::{AtlasExtendError, Result};
use crate::layered::Channel;
use crate::model::{TileFlags, UvRect, UvTile};

/// Identity of a descriptor. A 16-bit number addresses an existing slot to
/// overwrite; anything else is a symbolic name that gets new slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotId {
    Named(String),
    Numeric(u32),
}

impl SlotId {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.parse::<u16>() {
            Ok(n) => SlotId::Numeric(n as u32),
            Err(_) => SlotId::Named(s.to_string()),
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotId::Named(n) => write!(f, "{n}"),
            SlotId::Numeric(i) => write!(f, "{i}"),
        }
    }
}

/// A configuration entry as read from a document, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default)]
    pub diffuse: Option<String>,
    #[serde(default)]
    pub normal: Option<String>,
    #[serde(default)]
    pub specular: Option<String>,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default = "one_f32")]
    pub w: f32,
    #[serde(default = "one_f32")]
    pub h: f32,
    #[serde(default = "one_u32")]
    pub blockw: u32,
    #[serde(default = "one_u32")]
    pub blockh: u32,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub tint: Option<[f32; 4]>,
    #[serde(default)]
    pub global_uv: bool,
    #[serde(default)]
    pub switch_uv: bool,
}

impl Default for RawDescriptor {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            target: default_target(),
            diffuse: None,
            normal: None,
            specular: None,
            x: 0.0,
            y: 0.0,
            w: 1.0,
            h: 1.0,
            blockw: 1,
            blockh: 1,
            material: None,
            tint: None,
            global_uv: false,
            switch_uv: false,
        }
    }
}

fn default_target() -> String {
    "opaque".to_string()
}
fn one_f32() -> f32 {
    1.0
}
fn one_u32() -> u32 {
    1
}

/// A validated texture entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    pub id: SlotId,
    pub name: Option<String>,
    /// Name of the target (layered array set or sprite atlas) this entry extends.
    pub target: String,
    pub diffuse: AssetList,
    pub normal: Option<AssetList>,
    pub specular: Option<AssetList>,
    pub tiling: UvRect,
    pub block_w: u32,
    pub block_h: u32,
    pub material: Option<String>,
    pub tint: [f32; 4],
    pub flags: TileFlags,
}

impl TextureDescriptor {
    /// Minimal descriptor with only a diffuse list, mostly for programmatic use.
    pub fn new(id: &str, target: &str, diffuse: &str) -> Result<Self> {
        Self::from_raw(RawDescriptor {
            id: Some(id.to_string()),
            target: target.to_string(),
            diffuse: Some(diffuse.to_string()),
            ..RawDescriptor::default()
        })
    }

    pub fn from_raw(raw: RawDescriptor) -> Result<Self> {
        let id = raw
            .id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AtlasExtendError::Config("texture entry without an id".into()))?;
        let id = SlotId::parse(id);
        let diffuse = raw
            .diffuse
            .as_deref()
            .ok_or_else(|| AtlasExtendError::Config(format!("texture `{id}` has no diffuse")))?;
        let diffuse = AssetList::parse(diffuse)?;
        let normal = raw.normal.as_deref().map(AssetList::parse).transpose()?;
        let specular = raw.specular.as_deref().map(AssetList::parse).transpose()?;

        if raw.blockw == 0 || raw.blockh == 0 {
            return Err(AtlasExtendError::Config(format!(
                "texture `{id}` has a zero block size"
            )));
        }

        let desc = Self {
            id,
            name: raw.name.filter(|n| !n.trim().is_empty()),
            target: raw.target,
            diffuse,
            normal,
            specular,
            tiling: UvRect::new(raw.x, raw.y, raw.w, raw.h),
            block_w: raw.blockw,
            block_h: raw.blockh,
            material: raw.material,
            tint: raw.tint.unwrap_or([1.0; 4]),
            flags: TileFlags {
                global_uv: raw.global_uv,
                switch_uv: raw.switch_uv,
            },
        };
        desc.check_sides()?;
        Ok(desc)
    }

    /// Normal and specular lists must have one entry per diffuse side.
    pub fn check_sides(&self) -> Result<()> {
        for (channel, list) in [("normal", &self.normal), ("specular", &self.specular)] {
            if let Some(list) = list {
                if list.len() != self.diffuse.len() {
                    return Err(AtlasExtendError::SideCountMismatch {
                        id: self.key(),
                        channel,
                        expected: self.diffuse.len(),
                        found: list.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of consecutive slots this entry occupies.
    pub fn len(&self) -> usize {
        self.diffuse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffuse.is_empty()
    }

    /// Identity used for de-duplication and as the registry key.
    pub fn key(&self) -> String {
        self.id.to_string()
    }

    /// Name shown for the tile: the display name, else the id.
    pub fn texture_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.key())
    }

    pub fn channel(&self, ch: Channel) -> Option<&AssetList> {
        match ch {
            Channel::Diffuse => Some(&self.diffuse),
            Channel::Normal => self.normal.as_ref(),
            Channel::Specular => self.specular.as_ref(),
        }
    }

    /// Tile record describing how this entry is sampled from `layer_index`.
    pub fn tile(&self, layer_index: u32) -> UvTile {
        UvTile {
            layer_index,
            rect: self.tiling,
            block_w: self.block_w,
            block_h: self.block_h,
            texture_name: self.texture_name(),
            flags: self.flags,
            material: self.material.clone(),
            tint: self.tint,
        }
    }
}

/// Document shape accepted by [`ConfigBatch::from_json_str`] and the CLI manifests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchDocument {
    #[serde(default)]
    pub textures: Vec<RawDescriptor>,
}

/// Ordered, de-duplicated descriptors of one configuration load.
#[derive(Debug, Clone, Default)]
pub struct ConfigBatch {
    entries: Vec<TextureDescriptor>,
}

impl ConfigBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate every raw entry. The first invalid entry aborts the batch.
    pub fn from_raw(raw: Vec<RawDescriptor>) -> Result<Self> {
        let mut batch = Self::new();
        for r in raw {
            batch.push(TextureDescriptor::from_raw(r)?);
        }
        Ok(batch)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let doc: BatchDocument =
            serde_json::from_str(s).map_err(|e| AtlasExtendError::Config(e.to_string()))?;
        Self::from_raw(doc.textures)
    }

    /// Append an entry. A repeated key replaces the earlier entry in place.
    pub fn push(&mut self, desc: TextureDescriptor) {
        let key = desc.key();
        if let Some(slot) = self
            .entries
            .iter_mut()
            .find(|e| e.key() == key && e.target == desc.target)
        {
            warn!(key = %key, atlas = %desc.target, "duplicate texture id, keeping the last definition");
            *slot = desc;
        } else {
            self.entries.push(desc);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TextureDescriptor> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[TextureDescriptor] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut Vec<TextureDescriptor> {
        &mut self.entries
    }
}

impl IntoIterator for ConfigBatch {
    type Item = TextureDescriptor;
    type IntoIter = std::vec::IntoIter<TextureDescriptor>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<TextureDescriptor> for ConfigBatch {
    fn from_iter<I: IntoIterator<Item = TextureDescriptor>>(iter: I) -> Self {
        let mut batch = Self::new();
        for d in iter {
            batch.push(d);
        }
        batch
    }
}
