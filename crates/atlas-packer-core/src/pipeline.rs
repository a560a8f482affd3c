use crate::codec;
use crate::compositing::{composite, extract};
use crate::config::{PackerConfig, PngCompression};
use crate::error::{AtlasError, IoContext, Result};
use crate::model::{AtlasLayout, PackedAtlas};
use crate::packer::{PackItem, RectanglePacker};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageFormat, ImageReader, RgbaImage};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Decoded source image (name + RGBA pixels).
pub struct SourceImage {
    /// Base file name including extension, e.g. `hero.png`.
    pub name: String,
    pub image: RgbaImage,
}

/// Lists image files under `dir` whose extension is in `cfg.extensions`.
///
/// Paths are absolute and sorted by file name within each directory. A
/// missing directory yields an empty list.
pub fn discover(dir: &Path, cfg: &PackerConfig) -> Vec<PathBuf> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "discovery root is not a directory");
        return Vec::new();
    }
    let root = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let mut walker = WalkDir::new(&root).sort_by_file_name();
    if !cfg.recursive {
        walker = walker.max_depth(1);
    }
    walker
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skip unreadable entry");
                None
            }
        })
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_image(p, cfg))
        .collect()
}

fn is_image(p: &Path, cfg: &PackerConfig) -> bool {
    p.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| cfg.accepts_extension(e))
}

/// Decodes one file to RGBA8, named after its base file name.
pub fn decode_source(path: &Path) -> Result<SourceImage> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            AtlasError::InvalidInput(format!("{} has no UTF-8 file name", path.display()))
        })?
        .to_string();
    let image = ImageReader::open(path)
        .io_context(|| format!("opening {}", path.display()))?
        .with_guessed_format()
        .io_context(|| format!("reading {}", path.display()))?
        .decode()?
        .to_rgba8();
    Ok(SourceImage { name, image })
}

/// Decodes one path for packing. Undecodable and zero-area images are logged
/// with `warn!` and yield `None`.
pub fn decode_usable(path: &Path) -> Option<SourceImage> {
    match decode_source(path) {
        Ok(src) if src.image.width() == 0 || src.image.height() == 0 => {
            warn!(path = %path.display(), "skip empty image");
            None
        }
        Ok(src) => Some(src),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skip image");
            None
        }
    }
}

/// Decodes every path with [`decode_usable`]. Input order is kept.
pub fn load_sources(paths: &[PathBuf], cfg: &PackerConfig) -> Vec<SourceImage> {
    if cfg.parallel {
        #[cfg(feature = "parallel")]
        return paths.par_iter().filter_map(|p| decode_usable(p)).collect();
        #[cfg(not(feature = "parallel"))]
        debug!("parallel decode requested without the `parallel` feature; decoding sequentially");
    }
    paths.iter().filter_map(|p| decode_usable(p)).collect()
}

/// Packs named sizes into a layout without touching pixels.
///
/// Names must be non-empty and unique.
pub fn pack_layout<K: Into<String>>(
    inputs: Vec<(K, u32, u32)>,
    cfg: &PackerConfig,
) -> Result<AtlasLayout> {
    let items: Vec<PackItem<String>> = inputs
        .into_iter()
        .map(|(k, w, h)| PackItem::new(k.into(), w, h))
        .collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(items.len());
    for it in &items {
        if it.id.is_empty() {
            return Err(AtlasError::InvalidInput("empty image name".into()));
        }
        if !seen.insert(it.id.as_str()) {
            return Err(AtlasError::InvalidInput(format!(
                "duplicate image name '{}'",
                it.id
            )));
        }
    }
    let packing = RectanglePacker::with_sort_order(cfg.sort_order).pack(&items)?;
    AtlasLayout::new(packing.bounds, packing.placements.into_iter().collect())
}

/// Packs decoded sources, composites them and encodes the atlas as PNG.
///
/// Returns `None` when `sources` is empty.
#[instrument(skip_all, fields(count = sources.len()))]
pub fn pack_sources(sources: Vec<SourceImage>, cfg: &PackerConfig) -> Result<Option<PackedAtlas>> {
    cfg.validate()?;
    if sources.is_empty() {
        return Ok(None);
    }
    let layout = pack_layout(
        sources
            .iter()
            .map(|s| (s.name.clone(), s.image.width(), s.image.height()))
            .collect(),
        cfg,
    )?;
    let pixels: HashMap<String, RgbaImage> =
        sources.into_iter().map(|s| (s.name, s.image)).collect();
    let canvas = composite(&layout, &pixels)?;
    let image = encode_png(&canvas, cfg.compression)?;
    debug!(
        width = layout.bounds().width,
        height = layout.bounds().height,
        bytes = image.len(),
        "atlas encoded"
    );
    Ok(Some(PackedAtlas::new(layout, image)))
}

/// Decodes `paths` and packs them. Returns `None` when nothing decodes.
#[instrument(skip_all, fields(count = paths.len()))]
pub fn pack_all(paths: &[PathBuf], cfg: &PackerConfig) -> Result<Option<PackedAtlas>> {
    cfg.validate()?;
    if paths.is_empty() {
        return Ok(None);
    }
    let sources = load_sources(paths, cfg);
    debug!(decoded = sources.len(), "sources loaded");
    pack_sources(sources, cfg)
}

/// `pack_all` followed by an archive save. Nothing is written when there is nothing to pack.
pub fn pack_to_archive(
    paths: &[PathBuf],
    archive: &Path,
    cfg: &PackerConfig,
) -> Result<Option<PackedAtlas>> {
    let packed = pack_all(paths, cfg)?;
    if let Some(p) = &packed {
        codec::save_archive_to_path(archive, &p.layout, &p.image)?;
    }
    Ok(packed)
}

/// `pack_all` followed by a folder save. Nothing is written when there is nothing to pack.
pub fn pack_to_folder(
    paths: &[PathBuf],
    dir: &Path,
    cfg: &PackerConfig,
) -> Result<Option<PackedAtlas>> {
    let packed = pack_all(paths, cfg)?;
    if let Some(p) = &packed {
        codec::save_folder(dir, &p.layout, &p.image)?;
    }
    Ok(packed)
}

/// Loads a folder pair when `path` is a directory, an archive otherwise.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load(path: &Path) -> Result<PackedAtlas> {
    let (layout, image) = if path.is_dir() {
        codec::load_folder(path)?
    } else {
        codec::load_archive_from_path(path)?
    };
    Ok(PackedAtlas::new(layout, image))
}

/// Encodes an RGBA canvas as PNG.
pub fn encode_png(canvas: &RgbaImage, compression: PngCompression) -> Result<Vec<u8>> {
    let compression = match compression {
        PngCompression::Default => CompressionType::Default,
        PngCompression::Fast => CompressionType::Fast,
        PngCompression::Best => CompressionType::Best,
    };
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, compression, FilterType::Adaptive).write_image(
        canvas.as_raw(),
        canvas.width(),
        canvas.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(out)
}

impl PackedAtlas {
    /// Decodes the stored PNG.
    pub fn decode_image(&self) -> Result<RgbaImage> {
        Ok(image::load_from_memory_with_format(&self.image, ImageFormat::Png)?.to_rgba8())
    }

    /// Crops one sub-image out of the atlas.
    pub fn extract(&self, name: &str) -> Result<RgbaImage> {
        let atlas = self.decode_image()?;
        extract(&self.layout, &atlas, name)
    }

    /// Crops every sub-image, in name order, decoding the atlas once.
    pub fn extract_all(&self) -> Result<Vec<(String, RgbaImage)>> {
        let atlas = self.decode_image()?;
        self.layout
            .iter()
            .map(|(name, _)| extract(&self.layout, &atlas, name).map(|img| (name.to_string(), img)))
            .collect()
    }
}
