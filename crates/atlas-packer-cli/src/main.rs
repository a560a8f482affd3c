use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow};
use atlas_packer_core::codec;
use atlas_packer_core::pipeline::{self, SourceImage};
use atlas_packer_core::{PackedAtlas, PackerConfig, PngCompression, SortOrder};
use clap::{ArgAction, Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use image::ImageFormat;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "atlas-packer",
    about = "Pack images into a single atlas archive (atlas.png + context.json)",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
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
    /// Pack a directory (or a single image) into an atlas
    Pack(PackArgs),
    /// Print stats and placements of an existing atlas
    Inspect(InspectArgs),
    /// Write every sub-image of an atlas back out as PNG
    Extract(ExtractArgs),
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    // Input/Output
    /// Input directory or image file
    #[arg(help_heading = "Input/Output")]
    input: PathBuf,
    /// Output archive (or directory with --folder). Defaults to atlas.zip / atlas
    #[arg(short, long, help_heading = "Input/Output")]
    output: Option<PathBuf>,
    /// Write atlas.png + context.json into a directory instead of a zip
    #[arg(long, default_value_t = false, help_heading = "Input/Output")]
    folder: bool,
    /// YAML config file path (CLI flags override its values)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Include patterns (glob). If set, only files matching any pattern are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob). Files matching any pattern will be ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,
    /// Accepted extensions (repeatable). Defaults to bmp,gif,jpg,jpeg,png,tif,tiff
    #[arg(long = "ext", help_heading = "Input/Output")]
    extensions: Vec<String>,
    /// Only look at the top level of the input directory
    #[arg(long, default_value_t = false, help_heading = "Input/Output")]
    no_recursive: bool,

    // Layout
    /// Sort order: height_desc|area_desc|max_side_desc|width_desc|none
    #[arg(long, help_heading = "Layout")]
    sort_order: Option<String>,
    /// PNG compression: default|fast|best
    #[arg(long, help_heading = "Layout")]
    compression: Option<String>,
    /// Decode inputs in parallel (requires feature `parallel`)
    #[arg(long, default_value_t = false, help_heading = "Layout")]
    parallel: bool,

    // Export
    /// Export packing stats (JSON) to this file
    #[arg(long, help_heading = "Export")]
    export_stats: Option<PathBuf>,
    /// Print the merged configuration (after YAML/CLI) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
    /// Dry run: compute layout and stats but do not write the atlas
    #[arg(long, default_value_t = false, help_heading = "Export")]
    dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
struct InspectArgs {
    /// Atlas archive or folder
    path: PathBuf,
    /// Print the context.json document instead of a table
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Parser, Debug, Clone)]
struct ExtractArgs {
    /// Atlas archive or folder
    path: PathBuf,
    /// Directory receiving one PNG per sub-image
    #[arg(short, long, default_value = "extracted")]
    out_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Pack(args) => run_pack(args, cli.progress && !cli.quiet),
        Commands::Inspect(args) => run_inspect(args),
        Commands::Extract(args) => run_extract(args),
    }
}

fn run_pack(cli: &PackArgs, show_progress: bool) -> anyhow::Result<()> {
    let cfg = build_config(cli)?;

    if cli.print_config {
        match cli.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }

    let paths = gather_paths(&cli.input, &cfg, &cli.include, &cli.exclude)?;
    if paths.is_empty() {
        warn!(input = %cli.input.display(), "no images found; nothing written");
        return Ok(());
    }
    info!(count = paths.len(), "discovered input images");

    let t0 = Instant::now();
    let sources = if cfg.parallel {
        pipeline::load_sources(&paths, &cfg)
    } else {
        load_sources_with_progress(&paths, show_progress)
    };
    let decode_time = t0.elapsed();
    info!(count = sources.len(), took = %fmt_dur(decode_time), "loaded input images");

    let t1 = Instant::now();
    let Some(packed) = pipeline::pack_sources(sources, &cfg)? else {
        warn!("no input image could be decoded; nothing written");
        return Ok(());
    };
    let pack_time = t1.elapsed();

    let stats = packed.stats();
    info!(took = %fmt_dur(pack_time), "{}", stats.summary());

    if !cli.dry_run {
        let out = output_path(cli);
        write_atlas(&packed, &out, cli.folder)?;
        info!(path = %out.display(), bytes = packed.image.len(), "atlas written");
    }

    if let Some(stats_path) = &cli.export_stats {
        let value = serde_json::json!({
            "stats": stats,
            "inputs": paths.len(),
            "decode_ms": decode_time.as_secs_f64() * 1000.0,
            "pack_ms": pack_time.as_secs_f64() * 1000.0,
            "png_bytes": packed.image.len(),
        });
        fs::write(stats_path, serde_json::to_string_pretty(&value)?)
            .with_context(|| format!("write {}", stats_path.display()))?;
        info!(path = %stats_path.display(), "stats exported");
    }
    Ok(())
}

fn run_inspect(args: &InspectArgs) -> anyhow::Result<()> {
    let packed =
        pipeline::load(&args.path).with_context(|| format!("load {}", args.path.display()))?;
    if args.json {
        let doc = codec::to_context_json(&packed.layout)?;
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    let stats = packed.stats();
    println!("{}", stats.summary());
    println!("PNG: {} bytes", packed.image.len());
    let width = packed
        .layout
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);
    for (name, r) in packed.layout.iter() {
        println!(
            "  {name:<width$}  {:>5},{:<5}  {}x{}",
            r.x, r.y, r.width, r.height
        );
    }
    Ok(())
}

fn run_extract(args: &ExtractArgs) -> anyhow::Result<()> {
    let packed =
        pipeline::load(&args.path).with_context(|| format!("load {}", args.path.display()))?;
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create out_dir {}", args.out_dir.display()))?;
    let mut written = 0usize;
    for (name, img) in packed.extract_all()? {
        let Some(file_name) = png_file_name(&name) else {
            warn!(%name, "skip entry with unusable name");
            continue;
        };
        let path = args.out_dir.join(file_name);
        img.save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("write {}", path.display()))?;
        written += 1;
    }
    info!(count = written, dir = %args.out_dir.display(), "sub-images extracted");
    Ok(())
}

/// Defaults, then YAML, then explicit CLI flags.
fn build_config(cli: &PackArgs) -> anyhow::Result<PackerConfig> {
    let mut cfg = PackerConfig::default();
    if let Some(path) = &cli.config {
        let file =
            fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        let y: YamlConfig = serde_yaml::from_str(&file)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg = y
            .into_packer_config(cfg)
            .with_context(|| format!("invalid config {}", path.display()))?;
    }
    if let Some(s) = &cli.sort_order {
        cfg.sort_order = parse_sort_order(s)?;
    }
    if let Some(s) = &cli.compression {
        cfg.compression = parse_compression(s)?;
    }
    if !cli.extensions.is_empty() {
        cfg.extensions = cli.extensions.clone();
    }
    if cli.no_recursive {
        cfg.recursive = false;
    }
    if cli.parallel {
        cfg.parallel = true;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn output_path(cli: &PackArgs) -> PathBuf {
    cli.output.clone().unwrap_or_else(|| {
        if cli.folder {
            PathBuf::from("atlas")
        } else {
            PathBuf::from("atlas.zip")
        }
    })
}

fn write_atlas(packed: &PackedAtlas, out: &Path, folder: bool) -> anyhow::Result<()> {
    if folder {
        codec::save_folder(out, &packed.layout, &packed.image)?;
    } else {
        codec::save_archive_to_path(out, &packed.layout, &packed.image)?;
    }
    Ok(())
}

/// Base name of `name` with a `.png` suffix unless it already has one.
fn png_file_name(name: &str) -> Option<String> {
    let base = Path::new(name).file_name()?.to_str()?;
    let is_png = Path::new(base)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"));
    Some(if is_png {
        base.to_string()
    } else {
        format!("{base}.png")
    })
}

fn fmt_dur(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms >= 1.0 {
        format!("{:.1}ms", ms)
    } else {
        format!("{}µs", d.as_micros())
    }
}

fn gather_paths(
    path: &Path,
    cfg: &PackerConfig,
    include: &[String],
    exclude: &[String],
) -> anyhow::Result<Vec<PathBuf>> {
    let inc_set = build_globset(include)?;
    let exc_set = build_globset(exclude)?;
    let candidates = if path.is_file() {
        let accepted = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| cfg.accepts_extension(e));
        if accepted {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        }
    } else {
        pipeline::discover(path, cfg)
    };
    let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    Ok(candidates
        .into_iter()
        .filter(|p| !should_skip(p, &root, inc_set.as_ref(), exc_set.as_ref()))
        .collect())
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat).with_context(|| format!("invalid glob {pat:?}"))?);
    }
    Ok(Some(b.build()?))
}

/// Patterns match either the path relative to the input root or the full path.
fn should_skip(
    p: &Path,
    root: &Path,
    include: Option<&GlobSet>,
    exclude: Option<&GlobSet>,
) -> bool {
    let full = p.to_string_lossy().replace('\\', "/");
    let rel = p
        .strip_prefix(root)
        .map(|r| r.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| full.clone());
    let matches = |set: &GlobSet| set.is_match(&rel) || set.is_match(&full);
    if exclude.is_some_and(matches) {
        return true;
    }
    if let Some(inc) = include {
        if !matches(inc) {
            return true;
        }
    }
    false
}

fn load_sources_with_progress(paths: &[PathBuf], progress: bool) -> Vec<SourceImage> {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(paths.len() as u64);
        b.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} loading {pos}/{len} [{elapsed_precise}] {wide_msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Some(b)
    } else {
        None
    };
    let mut list = Vec::with_capacity(paths.len());
    for p in paths {
        let msg = p.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if let Some(b) = &bar {
            b.set_message(msg.to_string());
        }
        list.extend(pipeline::decode_usable(p));
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    list
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    // RUST_LOG only applies when no -v/-q flag was given
    let filter = if quiet || verbose > 0 {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct YamlConfig {
    sort_order: Option<String>,
    extensions: Option<Vec<String>>,
    recursive: Option<bool>,
    parallel: Option<bool>,
    compression: Option<String>,
}

impl YamlConfig {
    fn into_packer_config(self, mut cfg: PackerConfig) -> anyhow::Result<PackerConfig> {
        if let Some(v) = self.sort_order {
            cfg.sort_order = parse_sort_order(&v)?;
        }
        if let Some(v) = self.extensions {
            cfg.extensions = v;
        }
        if let Some(v) = self.recursive {
            cfg.recursive = v;
        }
        if let Some(v) = self.parallel {
            cfg.parallel = v;
        }
        if let Some(v) = self.compression {
            cfg.compression = parse_compression(&v)?;
        }
        Ok(cfg)
    }
}

fn parse_sort_order(s: &str) -> anyhow::Result<SortOrder> {
    s.parse::<SortOrder>()
        .map_err(|_| anyhow!("unknown sort order: {}", s))
}

fn parse_compression(s: &str) -> anyhow::Result<PngCompression> {
    s.parse::<PngCompression>()
        .map_err(|_| anyhow!("unknown compression: {}", s))
}
