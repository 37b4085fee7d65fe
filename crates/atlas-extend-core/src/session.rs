//! The load and re-patch pipeline.
//!
//! A [`PatchSession`] owns every piece of mutable state of one renderer
//! session: the targets being extended, their registries, the entries that
//! have to be re-applied on tier changes, and the tier controller. Nothing is
//! global; a host keeps one session and passes it where loads happen.

use std::collections::BTreeMap;

use image::{Rgba, RgbaImage};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::assets::{AssetStore, load_checked};
use crate::config::ExtendConfig;
use crate::descriptor::{ConfigBatch, TextureDescriptor};
use crate::error::{AtlasExtendError, Result};
use crate::fallback::{FallbackImageFactory, FallbackKind, FallbackPalette};
use crate::hooks::{NoopHooks, PatchHooks};
use crate::layered::{Channel, ChannelSet, LayeredImageArray};
use crate::mip::MipChain;
use crate::model::UvTile;
use crate::planner::{BulkLoadPlanner, LoadPlan, Placement, TargetCapacity, TargetKind};
use crate::quality::{QualityTier, QualityTierController, TierTransition};
use crate::registry::{Binding, Resolved, SlotRegistry};
use crate::sprite_atlas::{CustomSprite, SpriteAtlas, SpriteAtlasPacker};

/// A set of diffuse/normal/specular arrays extended together.
#[derive(Debug)]
pub struct LayeredTarget {
    name: String,
    arrays: ChannelSet<LayeredImageArray>,
    builtin: usize,
    /// Edge length of a layer at [`QualityTier::Full`].
    full_size: u32,
    full_levels: usize,
    /// Builtin layers per channel at the best resolution known, finest first.
    /// Tier changes rebuild builtin layers from these.
    builtin_source: ChannelSet<Vec<Vec<RgbaImage>>>,
    fallbacks: FallbackImageFactory,
    registry: SlotRegistry,
    tiles: BTreeMap<u32, UvTile>,
}

impl LayeredTarget {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn arrays(&self) -> &ChannelSet<LayeredImageArray> {
        &self.arrays
    }
    pub fn array(&self, ch: Channel) -> &LayeredImageArray {
        self.arrays.get(ch)
    }
    /// Layers that existed before any configuration was applied.
    pub fn builtin(&self) -> usize {
        self.builtin
    }
    pub fn capacity(&self) -> usize {
        self.arrays.diffuse.capacity()
    }
    pub fn full_size(&self) -> u32 {
        self.full_size
    }
    pub fn registry(&self) -> &SlotRegistry {
        &self.registry
    }
    /// Tiles of the custom entries, keyed by first slot.
    pub fn tiles(&self) -> &BTreeMap<u32, UvTile> {
        &self.tiles
    }

    /// Bring every array to `size` with `levels` levels, rebuilding builtin
    /// layers from their retained source.
    fn rebase(&mut self, size: u32, levels: usize) {
        let Self {
            arrays,
            builtin_source,
            name,
            ..
        } = self;
        for (ch, array) in arrays.iter_mut() {
            if let Err(e) = array.rebase_from(size, size, levels, builtin_source.get(ch)) {
                error!(atlas = %name, channel = ch.name(), error = %e, "could not rebase array");
            }
        }
    }

    fn apply_dirty(&mut self) {
        for (_, arr) in self.arrays.iter_mut() {
            if !arr.is_applied() {
                arr.apply();
            }
        }
    }

    /// Write every side of `desc` into slots `[start, start + len)` of all
    /// three arrays. Sources are assumed to be at full resolution or finer;
    /// the offset into their level chain follows from their size.
    fn write_entry(
        &mut self,
        desc: &TextureDescriptor,
        start: u32,
        store: &mut dyn AssetStore,
    ) -> Result<()> {
        let Self {
            arrays, fallbacks, ..
        } = self;
        for side in 0..desc.len() {
            let index = start as usize + side;
            for ch in Channel::ALL {
                let array = arrays.get_mut(ch);
                match (desc.channel(ch), ch.fallback()) {
                    (Some(list), _) => {
                        let src = load_checked(store, list, side, array.format())?;
                        let offset = source_offset(&src, array)?;
                        array.write(index, &src, offset)?;
                    }
                    (None, Some(kind)) => array.write_fallback(index, kind, fallbacks)?,
                    (None, None) => {
                        return Err(AtlasExtendError::Config(format!(
                            "texture `{}` has no {}",
                            desc.key(),
                            ch.name()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Offset into `src`'s level chain that lines its levels up with `array`.
fn source_offset(src: &MipChain, array: &LayeredImageArray) -> Result<usize> {
    let (sw, aw) = (src.width(), array.width());
    let mismatch = || AtlasExtendError::DimensionMismatch {
        expected: (aw, array.height()),
        found: (sw, src.height()),
    };
    if sw < aw || sw % aw != 0 || !(sw / aw).is_power_of_two() {
        return Err(mismatch());
    }
    Ok((sw / aw).trailing_zeros() as usize)
}

/// A packed sprite atlas extended with custom sprites.
#[derive(Debug)]
pub struct SpriteTarget {
    name: String,
    baked: SpriteAtlas,
    live: SpriteAtlas,
    registry: SlotRegistry,
    /// Identity of the custom sprites the live atlas was built from.
    signature: Vec<String>,
    repacks: usize,
}

impl SpriteTarget {
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Atlas as it shipped, never modified.
    pub fn baked(&self) -> &SpriteAtlas {
        &self.baked
    }
    pub fn live(&self) -> &SpriteAtlas {
        &self.live
    }
    pub fn registry(&self) -> &SlotRegistry {
        &self.registry
    }
    pub fn repack_count(&self) -> usize {
        self.repacks
    }
}

#[derive(Debug, Clone)]
struct PendingEntry {
    target: String,
    start: u32,
    desc: TextureDescriptor,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TargetLoadReport {
    pub new_slots: usize,
    pub capacity: usize,
    /// Capacity requests issued per array during this load.
    pub growth_calls: usize,
    /// Whether the arrays received a new backing store.
    pub grown: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRecord {
    pub target: String,
    pub name: String,
    pub previous: u32,
    pub current: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub entries: usize,
    pub targets: BTreeMap<String, TargetLoadReport>,
    pub bindings: usize,
    pub conflicts: Vec<ConflictRecord>,
    /// Entries whose pixels were written (zero in headless mode).
    pub entries_written: usize,
    pub repacked: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepatchReport {
    pub transition: TierTransition,
    pub written: usize,
    /// Keys of entries that could not be re-applied.
    pub skipped: Vec<String>,
}

/// Session-scoped state of the extension pipeline.
pub struct PatchSession {
    config: ExtendConfig,
    layered: BTreeMap<String, LayeredTarget>,
    sprites: BTreeMap<String, SpriteTarget>,
    pending: Vec<PendingEntry>,
    quality: QualityTierController,
    packer: SpriteAtlasPacker,
    hooks: Box<dyn PatchHooks>,
}

impl PatchSession {
    /// New session whose arrays are live at `tier`.
    pub fn new(config: ExtendConfig, tier: QualityTier) -> Result<Self> {
        config.validate()?;
        let packer = SpriteAtlasPacker::new(config.sprite.clone())?;
        let mut quality = QualityTierController::new();
        quality.observe(tier);
        Ok(Self {
            config,
            layered: BTreeMap::new(),
            sprites: BTreeMap::new(),
            pending: Vec::new(),
            quality,
            packer,
            hooks: Box::new(NoopHooks),
        })
    }

    pub fn with_hooks(mut self, hooks: Box<dyn PatchHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &ExtendConfig {
        &self.config
    }

    fn check_new_target(&self, name: &str) -> Result<()> {
        if self.layered.contains_key(name) || self.sprites.contains_key(name) {
            return Err(AtlasExtendError::Config(format!(
                "target `{name}` registered twice"
            )));
        }
        Ok(())
    }

    /// Register a layered target. The arrays must match in size, level count
    /// and capacity, and are taken to be live at the current tier.
    pub fn add_layered_target(
        &mut self,
        name: &str,
        arrays: ChannelSet<LayeredImageArray>,
        palette: Option<FallbackPalette>,
    ) -> Result<()> {
        self.check_new_target(name)?;
        let d = &arrays.diffuse;
        if d.width() != d.height() {
            return Err(AtlasExtendError::Config(format!(
                "layered target `{name}` is {}x{}, arrays must be square",
                d.width(),
                d.height()
            )));
        }
        for (ch, arr) in arrays.iter() {
            if (arr.width(), arr.height()) != (d.width(), d.height()) {
                return Err(AtlasExtendError::DimensionMismatch {
                    expected: (d.width(), d.height()),
                    found: (arr.width(), arr.height()),
                });
            }
            if arr.level_count() != d.level_count() || arr.capacity() != d.capacity() {
                return Err(AtlasExtendError::Config(format!(
                    "{} array of `{name}` disagrees with diffuse ({} levels x {} layers vs {} x {})",
                    ch.name(),
                    arr.level_count(),
                    arr.capacity(),
                    d.level_count(),
                    d.capacity()
                )));
            }
        }
        let offset = self.quality_tier().map_or(0, |t| t.resolution_offset());
        let snapshot = |arr: &LayeredImageArray| -> Vec<Vec<RgbaImage>> {
            (0..arr.capacity())
                .filter_map(|i| arr.layer(i).map(<[RgbaImage]>::to_vec))
                .collect()
        };
        let builtin_source = ChannelSet::new(
            snapshot(&arrays.diffuse),
            snapshot(&arrays.normal),
            snapshot(&arrays.specular),
        );
        let target = LayeredTarget {
            name: name.to_string(),
            builtin: d.capacity(),
            full_size: d.width() << offset,
            full_levels: d.level_count() + offset,
            builtin_source,
            fallbacks: FallbackImageFactory::new(palette.unwrap_or(self.config.fallback)),
            registry: SlotRegistry::new(),
            tiles: BTreeMap::new(),
            arrays,
        };
        info!(
            atlas = name,
            builtin = target.builtin,
            size = target.arrays.diffuse.width(),
            "registered layered target"
        );
        self.layered.insert(name.to_string(), target);
        Ok(())
    }

    /// Hand over full-resolution chains of the builtin layers of `target`.
    ///
    /// Without them, builtin layers are rebuilt on tier changes from the
    /// resolution they had when the target was registered.
    pub fn set_builtin_source(
        &mut self,
        target: &str,
        source: ChannelSet<Vec<MipChain>>,
    ) -> Result<()> {
        let t = self
            .layered
            .get_mut(target)
            .ok_or_else(|| AtlasExtendError::UnknownTarget(target.to_string()))?;
        for (_, chains) in source.iter() {
            if chains.len() != t.builtin {
                return Err(AtlasExtendError::Config(format!(
                    "`{target}` has {} builtin layers, got {} source chains",
                    t.builtin,
                    chains.len()
                )));
            }
            for chain in chains {
                if (chain.width(), chain.height()) != (t.full_size, t.full_size) {
                    return Err(AtlasExtendError::DimensionMismatch {
                        expected: (t.full_size, t.full_size),
                        found: (chain.width(), chain.height()),
                    });
                }
            }
        }
        t.builtin_source =
            source.map(|_, chains| chains.into_iter().map(MipChain::into_levels).collect());
        debug!(atlas = target, layers = t.builtin, "builtin source replaced");
        Ok(())
    }

    pub fn add_sprite_target(&mut self, name: &str, baked: SpriteAtlas) -> Result<()> {
        self.check_new_target(name)?;
        info!(atlas = name, tiles = baked.tiles.len(), "registered sprite target");
        self.sprites.insert(
            name.to_string(),
            SpriteTarget {
                name: name.to_string(),
                live: baked.clone(),
                baked,
                registry: SlotRegistry::new(),
                signature: Vec::new(),
                repacks: 0,
            },
        );
        Ok(())
    }

    pub fn layered_target(&self, name: &str) -> Option<&LayeredTarget> {
        self.layered.get(name)
    }

    pub fn layered_targets(&self) -> impl Iterator<Item = &LayeredTarget> {
        self.layered.values()
    }

    pub fn sprite_target(&self, name: &str) -> Option<&SpriteTarget> {
        self.sprites.get(name)
    }

    pub fn sprite_targets(&self) -> impl Iterator<Item = &SpriteTarget> {
        self.sprites.values()
    }

    pub fn registry(&self, target: &str) -> Option<&SlotRegistry> {
        self.layered
            .get(target)
            .map(|t| &t.registry)
            .or_else(|| self.sprites.get(target).map(|t| &t.registry))
    }

    /// Slot bound to `name` in `target` by the last successful load.
    pub fn lookup(&self, target: &str, name: &str) -> Option<u32> {
        self.registry(target)?.lookup(name)
    }

    /// Resolve a comma-separated reference list against `target`.
    pub fn resolve(&self, target: &str, value: &str) -> Result<Resolved> {
        let registry = self
            .registry(target)
            .ok_or_else(|| AtlasExtendError::UnknownTarget(target.to_string()))?;
        let resolved = registry.resolve_list(value);
        if !resolved.is_complete() {
            error!(atlas = target, names = ?resolved.unresolved, "could not resolve texture names");
        }
        Ok(resolved)
    }

    pub fn quality_tier(&self) -> Option<QualityTier> {
        self.quality.current()
    }

    /// Entries that a tier change re-applies.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Forget every binding and pending entry. Arrays keep their capacity.
    pub fn reset(&mut self) {
        for t in self.layered.values_mut() {
            t.registry.clear();
            t.tiles.clear();
        }
        for t in self.sprites.values_mut() {
            t.registry.clear();
        }
        self.pending.clear();
    }

    fn capacities(&self) -> BulkLoadPlanner {
        let layered = self.layered.iter().map(|(name, t)| {
            (
                name.clone(),
                TargetCapacity {
                    kind: TargetKind::Layered,
                    builtin: t.builtin,
                    capacity: t.capacity(),
                    max_slots: self.config.max_slots,
                },
            )
        });
        let sprites = self.sprites.iter().map(|(name, t)| {
            (
                name.clone(),
                TargetCapacity {
                    kind: TargetKind::Sprite,
                    builtin: t.baked.tiles.len(),
                    capacity: t.live.tiles.len(),
                    max_slots: self.config.max_slots,
                },
            )
        });
        BulkLoadPlanner::new(layered.chain(sprites).collect::<Vec<_>>())
    }

    /// Apply one configuration batch.
    ///
    /// The batch is planned in full before any storage is touched, each array
    /// grows at most once, and bindings become visible only if the whole batch
    /// succeeds. On error the registries and pending entries of the previous
    /// load stay in place; arrays may keep capacity grown for the failed batch.
    #[instrument(skip_all)]
    pub fn load(&mut self, mut batch: ConfigBatch, store: &mut dyn AssetStore) -> Result<LoadReport> {
        self.hooks.before_config_parse(&mut batch);
        let plan = self.capacities().plan(&batch)?;
        let headless = self.config.headless;

        let mut report = LoadReport {
            entries: batch.len(),
            ..LoadReport::default()
        };

        // single growth per array
        for (name, target) in self.layered.iter_mut() {
            let Some(tp) = plan.targets.get(name) else {
                continue;
            };
            let required = tp.required_capacity();
            let mut grown = false;
            let mut growth_calls = 0;
            for (ch, array) in target.arrays.iter_mut() {
                let before = array.capacity_requests();
                if array.ensure_capacity(required) {
                    grown = true;
                    self.hooks.after_array_allocated(name, ch, array);
                }
                growth_calls = growth_calls.max(array.capacity_requests() - before);
            }
            report.targets.insert(
                name.clone(),
                TargetLoadReport {
                    new_slots: tp.new_slots,
                    capacity: target.capacity(),
                    growth_calls,
                    grown,
                },
            );
        }

        // commit pass, with bindings staged
        let mut staged: BTreeMap<String, SlotRegistry> = BTreeMap::new();
        let mut staged_tiles: BTreeMap<String, BTreeMap<u32, UvTile>> = BTreeMap::new();
        let mut staged_pending: Vec<PendingEntry> = Vec::new();
        for entry in &plan.entries {
            let desc = &batch.entries()[entry.ordinal];
            if let Some(target) = self.layered.get_mut(&entry.target) {
                if !headless {
                    target.write_entry(desc, entry.start, store)?;
                    report.entries_written += 1;
                }
                staged_tiles
                    .entry(entry.target.clone())
                    .or_default()
                    .insert(entry.start, desc.tile(entry.start));
                staged_pending.push(PendingEntry {
                    target: entry.target.clone(),
                    start: entry.start,
                    desc: desc.clone(),
                });
            }
            if entry.placement == Placement::New {
                let name = desc.key();
                let binding = staged
                    .entry(entry.target.clone())
                    .or_default()
                    .reserve(&name, entry.start);
                report.bindings += 1;
                if let Binding::Conflicted { previous, current } = binding {
                    report.conflicts.push(ConflictRecord {
                        target: entry.target.clone(),
                        name,
                        previous,
                        current,
                    });
                }
            }
        }

        for target in self.layered.values_mut() {
            target.apply_dirty();
        }

        for (name, target) in self.sprites.iter_mut() {
            let entries: Vec<&TextureDescriptor> = plan
                .entries
                .iter()
                .filter(|e| &e.target == name)
                .map(|e| &batch.entries()[e.ordinal])
                .collect();
            let signature: Vec<String> = entries.iter().map(|d| sprite_signature(d)).collect();
            if signature == target.signature {
                debug!(atlas = %name, "sprite set unchanged, keeping atlas");
                continue;
            }
            if !headless {
                let customs = entries
                    .iter()
                    .map(|d| load_sprite(d, &target.baked, &self.config.fallback, &mut *store))
                    .collect::<Result<Vec<_>>>()?;
                self.packer.repack(&mut target.live, &target.baked, &customs)?;
                target.repacks += 1;
            }
            target.signature = signature;
            report.repacked.push(name.clone());
        }

        self.commit(staged, staged_tiles, staged_pending);
        info!(
            entries = report.entries,
            bindings = report.bindings,
            conflicts = report.conflicts.len(),
            written = report.entries_written,
            "configuration loaded"
        );
        Ok(report)
    }

    fn commit(
        &mut self,
        mut staged: BTreeMap<String, SlotRegistry>,
        mut staged_tiles: BTreeMap<String, BTreeMap<u32, UvTile>>,
        pending: Vec<PendingEntry>,
    ) {
        self.reset();
        let registries = self
            .layered
            .iter_mut()
            .map(|(n, t)| (n, &mut t.registry))
            .chain(self.sprites.iter_mut().map(|(n, t)| (n, &mut t.registry)));
        for (name, registry) in registries {
            if let Some(next) = staged.remove(name) {
                for (key, index) in next.iter() {
                    registry.reserve(key, index);
                }
            }
        }
        for (name, target) in self.layered.iter_mut() {
            if let Some(tiles) = staged_tiles.remove(name) {
                target.tiles = tiles;
            }
        }
        self.pending = pending;
    }

    /// Observe a tier change and, when required, bring every live array to the
    /// new resolution and re-apply all pending entries.
    ///
    /// Entries whose sources cannot be loaded any more are skipped and logged;
    /// the rest still complete.
    #[instrument(skip_all)]
    pub fn set_quality_tier(
        &mut self,
        tier: QualityTier,
        store: &mut dyn AssetStore,
    ) -> RepatchReport {
        let transition = self.quality.observe(tier);
        self.hooks.on_quality_tier_changed(&transition);
        let mut report = RepatchReport {
            transition,
            written: 0,
            skipped: Vec::new(),
        };
        if !transition.needs_repatch() {
            debug!(?transition, "no re-patch needed");
            return report;
        }
        if self.config.headless {
            return report;
        }

        let offset = tier.resolution_offset();
        for target in self.layered.values_mut() {
            let size = (target.full_size >> offset).max(1);
            let levels = target.full_levels.saturating_sub(offset).max(1);
            if target.arrays.diffuse.width() == size && target.arrays.diffuse.level_count() == levels {
                continue;
            }
            target.rebase(size, levels);
        }

        for entry in &self.pending {
            let Some(target) = self.layered.get_mut(&entry.target) else {
                warn!(atlas = %entry.target, "pending entry for a target that no longer exists");
                report.skipped.push(entry.desc.key());
                continue;
            };
            match target.write_entry(&entry.desc, entry.start, store) {
                Ok(()) => report.written += 1,
                Err(e) => {
                    error!(key = %entry.desc.key(), atlas = %entry.target, error = %e, "skipping entry during re-patch");
                    report.skipped.push(entry.desc.key());
                }
            }
        }

        for target in self.layered.values_mut() {
            target.apply_dirty();
        }
        info!(
            ?transition,
            written = report.written,
            skipped = report.skipped.len(),
            "re-patched layered targets"
        );
        report
    }

    /// Plan `batch` against the current targets without applying it.
    pub fn plan(&self, batch: &ConfigBatch) -> Result<LoadPlan> {
        self.capacities().plan(batch)
    }
}

fn sprite_signature(desc: &TextureDescriptor) -> String {
    let normal = desc.normal.as_ref().map(|l| l.to_string()).unwrap_or_default();
    let specular = desc
        .specular
        .as_ref()
        .map(|l| l.to_string())
        .unwrap_or_default();
    format!("{}|{}|{}|{}", desc.texture_name(), desc.diffuse, normal, specular)
}

fn load_sprite(
    desc: &TextureDescriptor,
    baked: &SpriteAtlas,
    palette: &FallbackPalette,
    store: &mut dyn AssetStore,
) -> Result<CustomSprite> {
    let diffuse = load_checked(store, &desc.diffuse, 0, baked.canvases.diffuse.format())?.into_base();
    let (w, h) = diffuse.dimensions();
    let mut channel = |ch: Channel, kind: FallbackKind| -> Result<RgbaImage> {
        match desc.channel(ch) {
            Some(list) => Ok(load_checked(store, list, 0, baked.canvases.get(ch).format())?.into_base()),
            None => Ok(RgbaImage::from_pixel(w, h, Rgba(palette.color(kind)))),
        }
    };
    let normal = channel(Channel::Normal, FallbackKind::Normal)?;
    let specular = channel(Channel::Specular, FallbackKind::Specular)?;
    CustomSprite::new(desc.tile(0), ChannelSet::new(diffuse, normal, specular))
}
