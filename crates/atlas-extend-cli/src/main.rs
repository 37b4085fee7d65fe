use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use atlas_extend_core::assets::DirAssetStore;
use atlas_extend_core::config::{AlgorithmFamily, ExtendConfig, PackerConfig, SortOrder};
use atlas_extend_core::descriptor::{ConfigBatch, RawDescriptor};
use atlas_extend_core::dump::{DumpOptions, dump_session, dump_sprite};
use atlas_extend_core::fallback::FallbackPalette;
use atlas_extend_core::layered::{ChannelSet, LayeredImageArray};
use atlas_extend_core::mip::{MipChain, PixelFormat, full_chain_len};
use atlas_extend_core::model::{UvRect, UvTile};
use atlas_extend_core::quality::QualityTier;
use atlas_extend_core::session::{PatchSession, RepatchReport};
use atlas_extend_core::sprite_atlas::{CustomSprite, SpriteAtlas, SpriteAtlasPacker};
use atlas_extend_core::{load_report_to_json, registry_to_json, uv_table_to_json};
use clap::{ArgAction, Parser, Subcommand};
use image::{ImageReader, Rgba, RgbaImage};
use serde::Deserialize;
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "atlas-extend",
    about = "Extend texture arrays and sprite atlases from configuration manifests",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a manifest into fresh targets, optionally change tiers, dump and export
    Load(LoadArgs),
    /// Resolve a comma-separated list of texture names against a manifest
    Resolve(ResolveArgs),
    /// Pack a folder of sprites into a baked atlas usable as a sprite target
    Pack(PackArgs),
}

#[derive(Parser, Debug, Clone)]
struct LoadArgs {
    /// Manifest file (YAML or JSON)
    #[arg(help_heading = "Input/Output")]
    manifest: PathBuf,
    /// Asset root; defaults to the manifest's directory
    #[arg(long, help_heading = "Input/Output")]
    assets: Option<PathBuf>,
    /// YAML config file (slot limit, headless, sprite packer options)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Plan and bind without loading pixels
    #[arg(long, default_value_t = false, help_heading = "Session")]
    headless: bool,
    /// Tier changes to apply after the load, in order: full|half|quarter|eighth
    #[arg(long = "retier", help_heading = "Session")]
    retier: Vec<String>,
    /// Dump live storage as PNGs into this directory
    #[arg(long, help_heading = "Export")]
    dump: Option<PathBuf>,
    /// Convert packed normal/specular channels to viewable images when dumping
    #[arg(long, default_value_t = false, help_heading = "Export")]
    unpack: bool,
    /// Write bindings, UV table and reports as JSON to this file
    #[arg(long, help_heading = "Export")]
    export: Option<PathBuf>,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
}

#[derive(Parser, Debug, Clone)]
struct ResolveArgs {
    /// Manifest file (YAML or JSON)
    manifest: PathBuf,
    /// Target whose registry is consulted
    #[arg(long, default_value = "opaque")]
    target: String,
    /// Value to resolve, e.g. `sand,12,moss`
    value: String,
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    /// Input file or directory
    #[arg(help_heading = "Input/Output")]
    input: PathBuf,
    /// Output directory (atlas.<channel>.png and tiles.json)
    #[arg(short, long, default_value = "out", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// YAML config file (overrides layout options)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Max width
    #[arg(long, default_value_t = 8192, help_heading = "Layout")]
    max_width: u32,
    /// Max height
    #[arg(long, default_value_t = 8192, help_heading = "Layout")]
    max_height: u32,
    /// Resize canvas dims to power of two
    #[arg(long, default_value_t = true, action=ArgAction::Set, help_heading = "Layout")]
    pow2: bool,
    /// Force square canvas
    #[arg(long, default_value_t = true, action=ArgAction::Set, help_heading = "Layout")]
    square: bool,
    /// Sort order: area_desc|max_side_desc|height_desc|name_asc|none
    #[arg(long, default_value = "area_desc", help_heading = "Layout")]
    sort_order: String,
    /// Border padding (around the whole canvas)
    #[arg(long, default_value_t = 0, help_heading = "Image Processing")]
    border_padding: u32,
    /// Padding between sprites
    #[arg(long, default_value_t = 4, help_heading = "Image Processing")]
    texture_padding: u32,
    /// Bleed margin around every sprite
    #[arg(long, default_value_t = 32, help_heading = "Image Processing")]
    sprite_border: u32,
    /// Algorithm: skyline | maxrects
    #[arg(long, value_parser = ["skyline", "maxrects"], default_value = "maxrects", help_heading = "Algorithms")]
    algorithm: String,
    /// MaxRects heuristic: baf|bssf|blsf|bl|cp
    #[arg(long, default_value = "bssf", help_heading = "Heuristics")]
    heuristic: String,
    /// Skyline heuristic: bl|minwaste
    #[arg(long, default_value = "bl", help_heading = "Heuristics")]
    skyline: String,
    /// Compose channel canvases in parallel (requires core feature `parallel`)
    #[arg(long, default_value_t = false, help_heading = "Algorithms")]
    parallel: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    let progress = cli.progress && !cli.quiet;
    match &cli.command {
        Commands::Load(args) => run_load(args, progress),
        Commands::Resolve(args) => run_resolve(args),
        Commands::Pack(args) => run_pack(args, progress),
    }
}

/// Document read by `load` and `resolve`.
#[derive(Debug, Deserialize)]
struct Manifest {
    /// Tier the target sizes below are given at.
    #[serde(default = "default_tier")]
    tier: QualityTier,
    #[serde(default)]
    targets: Vec<TargetSpec>,
    #[serde(default)]
    textures: Vec<RawDescriptor>,
}

fn default_tier() -> QualityTier {
    QualityTier::Full
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum TargetSpec {
    Layered {
        name: String,
        /// Live edge length of every layer.
        size: u32,
        #[serde(default)]
        levels: Option<usize>,
        /// Layers that exist before any configuration is applied.
        #[serde(default)]
        builtin: usize,
        #[serde(default)]
        format: PixelFormat,
        #[serde(default)]
        fallback: Option<FallbackPalette>,
    },
    Sprite {
        name: String,
        /// Directory written by `atlas-extend pack`.
        atlas: PathBuf,
    },
}

fn read_manifest(path: &Path) -> anyhow::Result<Manifest> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let manifest: Manifest =
        serde_yaml::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
    Ok(manifest)
}

fn build_session(manifest: &Manifest, base: &Path, cfg: ExtendConfig) -> anyhow::Result<PatchSession> {
    let palette = cfg.fallback;
    let mut session = PatchSession::new(cfg, manifest.tier)?;
    for target in &manifest.targets {
        match target {
            TargetSpec::Layered {
                name,
                size,
                levels,
                builtin,
                format,
                fallback,
            } => {
                let levels = levels.unwrap_or_else(|| full_chain_len(*size, *size));
                let arrays = ChannelSet::new(
                    LayeredImageArray::new(format!("{name}.diffuse"), *size, *size, *format, levels, *builtin)?,
                    LayeredImageArray::new(format!("{name}.normal"), *size, *size, *format, levels, *builtin)?,
                    LayeredImageArray::new(format!("{name}.specular"), *size, *size, *format, levels, *builtin)?,
                );
                session.add_layered_target(name, arrays, *fallback)?;
            }
            TargetSpec::Sprite { name, atlas } => {
                let dir = if atlas.is_absolute() {
                    atlas.clone()
                } else {
                    base.join(atlas)
                };
                let baked = read_sprite_atlas(&dir, &palette)
                    .with_context(|| format!("read sprite atlas {}", dir.display()))?;
                session.add_sprite_target(name, baked)?;
            }
        }
    }
    Ok(session)
}

fn read_sprite_atlas(dir: &Path, palette: &FallbackPalette) -> anyhow::Result<SpriteAtlas> {
    let tiles_path = dir.join("tiles.json");
    let tiles: Vec<UvTile> = serde_json::from_str(
        &fs::read_to_string(&tiles_path).with_context(|| format!("read {}", tiles_path.display()))?,
    )?;
    let diffuse = load_image(&dir.join("atlas.diffuse.png"))?;
    let (w, h) = diffuse.dimensions();
    let channel = |file: &str, color: [u8; 4]| -> anyhow::Result<RgbaImage> {
        let p = dir.join(file);
        if p.is_file() {
            load_image(&p)
        } else {
            warn!(path = %p.display(), "missing channel canvas, using a flat fill");
            Ok(RgbaImage::from_pixel(w, h, Rgba(color)))
        }
    };
    let normal = channel("atlas.normal.png", palette.normal)?;
    let specular = channel("atlas.specular.png", palette.specular)?;
    let fmt = PixelFormat::Rgba8Unorm;
    Ok(SpriteAtlas::new(
        ChannelSet::new(
            MipChain::from_base(diffuse, fmt),
            MipChain::from_base(normal, fmt),
            MipChain::from_base(specular, fmt),
        ),
        tiles,
    )?)
}

fn merged_config(path: Option<&PathBuf>, headless: bool) -> anyhow::Result<ExtendConfig> {
    let mut cfg = ExtendConfig::default();
    if let Some(path) = path {
        let file = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let y: YamlConfig = serde_yaml::from_str(&file)?;
        cfg = y.into_extend_config(cfg)?;
    }
    if headless {
        cfg.headless = true;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn run_load(args: &LoadArgs, show_progress: bool) -> anyhow::Result<()> {
    let cfg = merged_config(args.config.as_ref(), args.headless)?;
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    let manifest = read_manifest(&args.manifest)?;
    let base = args
        .manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut store = DirAssetStore::new(args.assets.clone().unwrap_or_else(|| base.clone()));
    let mut session = build_session(&manifest, &base, cfg)?;
    let batch = ConfigBatch::from_raw(manifest.textures)?;

    let spinner = spinner(show_progress, "loading textures")?;
    let report = session.load(batch, &mut store);
    if let Some(s) = &spinner {
        s.finish_and_clear();
    }
    let report = report.context("load configuration")?;
    info!(
        entries = report.entries,
        bindings = report.bindings,
        conflicts = report.conflicts.len(),
        "manifest applied"
    );
    for (name, t) in &report.targets {
        info!(atlas = %name, new_slots = t.new_slots, capacity = t.capacity, grown = t.grown, "layered target");
    }

    let mut repatches: Vec<RepatchReport> = Vec::new();
    for tier in &args.retier {
        let tier: QualityTier = tier
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown quality tier: {}", tier))?;
        let spinner = self::spinner(show_progress, "re-patching")?;
        let r = session.set_quality_tier(tier, &mut store);
        if let Some(s) = &spinner {
            s.finish_and_clear();
        }
        info!(?tier, written = r.written, skipped = r.skipped.len(), "tier applied");
        for key in &r.skipped {
            error!(key = %key, "entry could not be re-applied");
        }
        repatches.push(r);
    }

    if let Some(dir) = &args.dump {
        let opts = DumpOptions {
            unpack_normals: args.unpack,
            unpack_specular: args.unpack,
        };
        let files = dump_session(&session, dir, opts)
            .with_context(|| format!("dump into {}", dir.display()))?;
        info!(files = files.len(), dir = %dir.display(), "dump written");
    }

    if let Some(path) = &args.export {
        let value = serde_json::json!({
            "report": load_report_to_json(&report),
            "registry": registry_to_json(&session),
            "uv": uv_table_to_json(&session),
            "repatch": repatches,
            "tier": session.quality_tier(),
        });
        fs::write(path, serde_json::to_string_pretty(&value)?)
            .with_context(|| format!("write {}", path.display()))?;
        info!(?path, "export written");
    }
    Ok(())
}

fn run_resolve(args: &ResolveArgs) -> anyhow::Result<()> {
    let manifest = read_manifest(&args.manifest)?;
    let base = args
        .manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let cfg = ExtendConfig {
        headless: true,
        ..ExtendConfig::default()
    };
    let mut session = build_session(&manifest, &base, cfg)?;
    let batch = ConfigBatch::from_raw(manifest.textures)?;
    let mut store = DirAssetStore::new(base);
    session.load(batch, &mut store).context("load configuration")?;
    let resolved = session.resolve(&args.target, &args.value)?;
    println!("{}", resolved.value);
    if !resolved.is_complete() {
        anyhow::bail!("unresolved names: {}", resolved.unresolved.join(", "));
    }
    Ok(())
}

fn run_pack(args: &PackArgs, show_progress: bool) -> anyhow::Result<()> {
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create out_dir {}", args.out_dir.display()))?;

    let mut cfg = PackerConfig::builder()
        .with_max_dimensions(args.max_width, args.max_height)
        .pow2(args.pow2)
        .square(args.square)
        .border_padding(args.border_padding)
        .texture_padding(args.texture_padding)
        .sprite_border(args.sprite_border)
        .family(parse_family(&args.algorithm)?)
        .mr_heuristic(
            args.heuristic
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown heuristic: {}", args.heuristic))?,
        )
        .skyline_heuristic(
            args.skyline
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown skyline heuristic: {}", args.skyline))?,
        )
        .sort_order(parse_sort_order(&args.sort_order)?)
        .parallel(args.parallel)
        .build();
    if let Some(path) = &args.config {
        let file = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let y: YamlConfig = serde_yaml::from_str(&file)?;
        cfg = y.into_packer_config(cfg)?;
    }
    let packer = SpriteAtlasPacker::new(cfg)?;

    let paths = gather_paths(&args.input)?;
    let sprites = load_sprites_with_progress(&paths, show_progress)?;
    anyhow::ensure!(!sprites.is_empty(), "no images found in {}", args.input.display());
    info!(count = sprites.len(), "loaded sprites");

    let empty = empty_atlas()?;
    let (atlas, stats) = packer.build(&empty, &sprites)?;
    let files = dump_sprite(&atlas, &args.out_dir, DumpOptions::default())?;
    let tiles_path = args.out_dir.join("tiles.json");
    fs::write(&tiles_path, serde_json::to_string_pretty(&atlas.tiles)?)
        .with_context(|| format!("write {}", tiles_path.display()))?;
    info!(
        files = files.len() + 1,
        width = stats.canvas_width,
        height = stats.canvas_height,
        occupancy = stats.occupancy,
        "atlas written"
    );
    Ok(())
}

/// Zero-tile atlas that `pack` builds on.
fn empty_atlas() -> anyhow::Result<SpriteAtlas> {
    let blank = || MipChain::from_base(RgbaImage::new(1, 1), PixelFormat::Rgba8Unorm);
    Ok(SpriteAtlas::new(
        ChannelSet::new(blank(), blank(), blank()),
        Vec::new(),
    )?)
}

fn gather_paths(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut list: Vec<PathBuf> = Vec::new();
    if path.is_file() {
        if is_image(path) {
            list.push(path.to_path_buf());
        }
    } else {
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let p = entry.path();
            if p.is_file() && is_image(p) && channel_suffix(p).is_none() {
                list.push(p.to_path_buf());
            }
        }
    }
    Ok(list)
}

fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "tga")
    )
}

/// `moss_n.png` and `moss_s.png` are the normal and specular companions of `moss.png`.
fn channel_suffix(p: &Path) -> Option<char> {
    let stem = p.file_stem()?.to_str()?;
    match stem.rsplit_once('_') {
        Some((_, "n")) => Some('n'),
        Some((_, "s")) => Some('s'),
        _ => None,
    }
}

fn companion(p: &Path, suffix: char) -> Option<PathBuf> {
    let stem = p.file_stem()?.to_str()?;
    let ext = p.extension()?.to_str()?;
    let c = p.with_file_name(format!("{stem}_{suffix}.{ext}"));
    c.is_file().then_some(c)
}

fn load_sprites_with_progress(paths: &[PathBuf], progress: bool) -> anyhow::Result<Vec<CustomSprite>> {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(paths.len() as u64);
        b.set_style(ProgressStyle::with_template(
            "{spinner:.green} loading {pos}/{len} [{elapsed_precise}] {wide_msg}",
        )?);
        Some(b)
    } else {
        None
    };
    let palette = FallbackPalette::default();
    let mut list = Vec::with_capacity(paths.len());
    for p in paths {
        let msg = p.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if let Some(b) = &bar {
            b.set_message(msg.to_string());
        }
        match load_sprite(p, &palette) {
            Ok(s) => list.push(s),
            Err(e) => {
                error!(?p, error = %e, "skip sprite");
            }
        }
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    Ok(list)
}

fn load_sprite(p: &Path, palette: &FallbackPalette) -> anyhow::Result<CustomSprite> {
    let diffuse = load_image(p)?;
    let (w, h) = diffuse.dimensions();
    let side = |suffix: char, color: [u8; 4]| -> anyhow::Result<RgbaImage> {
        match companion(p, suffix) {
            Some(c) => load_image(&c),
            None => Ok(RgbaImage::from_pixel(w, h, Rgba(color))),
        }
    };
    let normal = side('n', palette.normal)?;
    let specular = side('s', palette.specular)?;
    let name = p
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    Ok(CustomSprite::new(
        UvTile::new(0, UvRect::default(), name),
        ChannelSet::new(diffuse, normal, specular),
    )?)
}

fn load_image(p: &Path) -> anyhow::Result<RgbaImage> {
    let img = ImageReader::open(p)
        .with_context(|| format!("open {}", p.display()))?
        .with_guessed_format()?
        .decode()?;
    Ok(img.to_rgba8())
}

fn spinner(show: bool, msg: &'static str) -> anyhow::Result<Option<indicatif::ProgressBar>> {
    use indicatif::{ProgressBar, ProgressStyle};
    if !show {
        return Ok(None);
    }
    let s = ProgressBar::new_spinner();
    s.set_style(ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]")?);
    s.set_message(msg);
    s.enable_steady_tick(Duration::from_millis(100));
    Ok(Some(s))
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    max_slots: Option<usize>,
    headless: Option<bool>,
    fallback: Option<FallbackPalette>,
    family: Option<String>,
    skyline: Option<String>,
    heuristic: Option<String>,
    max_width: Option<u32>,
    max_height: Option<u32>,
    border_padding: Option<u32>,
    texture_padding: Option<u32>,
    sprite_border: Option<u32>,
    power_of_two: Option<bool>,
    square: Option<bool>,
    sort_order: Option<String>,
    parallel: Option<bool>,
}

impl YamlConfig {
    fn into_extend_config(self, mut cfg: ExtendConfig) -> anyhow::Result<ExtendConfig> {
        if let Some(v) = self.max_slots {
            cfg.max_slots = v;
        }
        if let Some(v) = self.headless {
            cfg.headless = v;
        }
        if let Some(v) = self.fallback {
            cfg.fallback = v;
        }
        cfg.sprite = self.into_packer_config(cfg.sprite)?;
        Ok(cfg)
    }

    fn into_packer_config(self, mut cfg: PackerConfig) -> anyhow::Result<PackerConfig> {
        if let Some(v) = self.max_width {
            cfg.max_width = v;
        }
        if let Some(v) = self.max_height {
            cfg.max_height = v;
        }
        if let Some(v) = self.border_padding {
            cfg.border_padding = v;
        }
        if let Some(v) = self.texture_padding {
            cfg.texture_padding = v;
        }
        if let Some(v) = self.sprite_border {
            cfg.sprite_border = v;
        }
        if let Some(v) = self.power_of_two {
            cfg.power_of_two = v;
        }
        if let Some(v) = self.square {
            cfg.square = v;
        }
        if let Some(v) = self.sort_order {
            cfg.sort_order = parse_sort_order(&v)?;
        }
        if let Some(v) = self.parallel {
            cfg.parallel = v;
        }
        if let Some(v) = self.family {
            cfg.family = parse_family(&v)?;
        }
        if let Some(v) = self.skyline {
            cfg.skyline_heuristic = v.parse().unwrap_or(cfg.skyline_heuristic);
        }
        if let Some(v) = self.heuristic {
            cfg.mr_heuristic = v.parse().unwrap_or(cfg.mr_heuristic);
        }
        Ok(cfg)
    }
}

fn parse_family(s: &str) -> anyhow::Result<AlgorithmFamily> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("unknown algorithm: {}", s))
}

fn parse_sort_order(s: &str) -> anyhow::Result<SortOrder> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("unknown sort order: {}", s))
}
