//! Persistence of an atlas as a zip archive or as a folder pair.
//!
//! Both forms carry the same two payloads:
//! - `atlas.png`: the encoded atlas image, stored byte-for-byte;
//! - `context.json`: the layout, shaped as
//!   `{ "bounds": {width,height}, "imageRectMap": { name: {x,y,width,height} } }`.
//!
//! Loading re-validates the layout, so a tampered archive surfaces as
//! `InvalidLayout` instead of an inconsistent model.

use crate::error::{AtlasError, IoContext, Result};
use crate::model::{AtlasLayout, Rect, Size, tight_bounds};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, Cursor, ErrorKind, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Entry / file name of the encoded atlas image.
pub const ATLAS_IMAGE_ENTRY: &str = "atlas.png";
/// Entry / file name of the layout metadata.
pub const CONTEXT_ENTRY: &str = "context.json";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextRef<'a> {
    bounds: Size,
    image_rect_map: &'a BTreeMap<String, Rect>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextDoc {
    #[serde(default)]
    bounds: Option<Size>,
    image_rect_map: BTreeMap<String, Rect>,
}

/// The metadata document of `layout` as a JSON value.
pub fn to_context_json(layout: &AtlasLayout) -> Result<Value> {
    serde_json::to_value(context_ref(layout)).map_err(|e| AtlasError::Encode(e.to_string()))
}

/// Serializes `layout` to the pretty-printed `context.json` payload.
pub fn encode_context(layout: &AtlasLayout) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(&context_ref(layout)).map_err(|e| AtlasError::Encode(e.to_string()))
}

/// Parses and validates a `context.json` payload.
///
/// Documents without `bounds` (the older flat format) get the tight bounding
/// box of their rects.
pub fn decode_context(bytes: &[u8]) -> Result<AtlasLayout> {
    let doc: ContextDoc = serde_json::from_slice(bytes)
        .map_err(|e| AtlasError::CorruptArchive(format!("malformed {}: {}", CONTEXT_ENTRY, e)))?;
    let bounds = match doc.bounds {
        Some(b) => b,
        None => {
            let b = tight_bounds(doc.image_rect_map.values());
            warn!(
                width = b.width,
                height = b.height,
                "{} has no bounds; using the bounding box of its rects",
                CONTEXT_ENTRY
            );
            b
        }
    };
    AtlasLayout::new(bounds, doc.image_rect_map)
}

fn context_ref(layout: &AtlasLayout) -> ContextRef<'_> {
    ContextRef {
        bounds: layout.bounds(),
        image_rect_map: layout.placements(),
    }
}

// ---------------- Archive form ----------------

/// Writes a zip holding `atlas.png` (stored) and `context.json` (deflated).
///
/// Metadata is serialized before the sink is touched. Entry timestamps are
/// fixed, so identical inputs yield byte-identical archives. If the sink
/// itself fails midway it may hold a partial archive; use
/// [`save_archive_to_path`] for an all-or-nothing file.
pub fn save_archive<W: Write + Seek>(layout: &AtlasLayout, image: &[u8], sink: W) -> Result<W> {
    let context = encode_context(layout)?;

    let mut zw = ZipWriter::new(sink);
    zw.start_file(
        ATLAS_IMAGE_ENTRY,
        entry_options(CompressionMethod::Stored),
    )
    .map_err(|e| zip_error(e, "starting atlas.png entry"))?;
    zw.write_all(image)
        .io_context(|| format!("writing {}", ATLAS_IMAGE_ENTRY))?;
    zw.start_file(
        CONTEXT_ENTRY,
        entry_options(CompressionMethod::Deflated),
    )
    .map_err(|e| zip_error(e, "starting context.json entry"))?;
    zw.write_all(&context)
        .io_context(|| format!("writing {}", CONTEXT_ENTRY))?;
    let sink = zw
        .finish()
        .map_err(|e| zip_error(e, "finishing archive"))?;
    debug!(
        placements = layout.len(),
        image_bytes = image.len(),
        context_bytes = context.len(),
        "archive written"
    );
    Ok(sink)
}

fn entry_options(method: CompressionMethod) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(zip::DateTime::default())
}

/// Builds the archive in memory.
pub fn archive_bytes(layout: &AtlasLayout, image: &[u8]) -> Result<Vec<u8>> {
    Ok(save_archive(layout, image, Cursor::new(Vec::new()))?.into_inner())
}

/// Writes the archive to a uniquely named temporary file next to `path`,
/// then renames it into place. On any failure the temporary file is removed.
pub fn save_archive_to_path(path: &Path, layout: &AtlasLayout, image: &[u8]) -> Result<()> {
    let bytes = archive_bytes(layout, image)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).io_context(|| format!("creating {}", dir.display()))?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".atlas-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .io_context(|| format!("creating temporary file in {}", dir.display()))?;
    tmp.write_all(&bytes)
        .io_context(|| format!("writing {}", tmp.path().display()))?;
    tmp.persist(path).map_err(|e| AtlasError::Io {
        context: format!("moving archive into {}", path.display()),
        source: e.error,
    })?;
    Ok(())
}

/// Reads `atlas.png` and `context.json` from a zip and validates the layout.
pub fn load_archive<R: Read + Seek>(source: R) -> Result<(AtlasLayout, Vec<u8>)> {
    let mut archive = ZipArchive::new(source).map_err(|e| zip_error(e, "opening archive"))?;
    let image = read_entry(&mut archive, ATLAS_IMAGE_ENTRY)?;
    let context = read_entry(&mut archive, CONTEXT_ENTRY)?;
    for extra in archive
        .file_names()
        .filter(|n| *n != ATLAS_IMAGE_ENTRY && *n != CONTEXT_ENTRY)
    {
        debug!(entry = extra, "ignoring unexpected archive entry");
    }
    let layout = decode_context(&context)?;
    Ok((layout, image))
}

pub fn load_archive_from_path(path: &Path) -> Result<(AtlasLayout, Vec<u8>)> {
    let file = fs::File::open(path).io_context(|| format!("opening {}", path.display()))?;
    load_archive(BufReader::new(file))
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(AtlasError::CorruptArchive(format!("missing entry '{}'", name)));
        }
        Err(e) => return Err(zip_error(e, "locating entry")),
    };
    let mut buf = Vec::new();
    // read_to_end drains until EOF; a short or damaged entry surfaces here
    entry.read_to_end(&mut buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::InvalidData | ErrorKind::Other => {
            AtlasError::CorruptArchive(format!("entry '{}' is truncated or damaged: {}", name, e))
        }
        _ => AtlasError::Io {
            context: format!("reading entry '{}'", name),
            source: e,
        },
    })?;
    Ok(buf)
}

fn zip_error(e: ZipError, context: &str) -> AtlasError {
    match e {
        ZipError::Io(source) if source.kind() != ErrorKind::UnexpectedEof => AtlasError::Io {
            context: context.to_string(),
            source,
        },
        other => AtlasError::CorruptArchive(format!("{}: {}", context, other)),
    }
}

// ---------------- Folder form ----------------

/// Writes `atlas.png` and `context.json` into `dir`, creating it if needed.
pub fn save_folder(dir: &Path, layout: &AtlasLayout, image: &[u8]) -> Result<()> {
    let context = encode_context(layout)?;
    fs::create_dir_all(dir).io_context(|| format!("creating {}", dir.display()))?;
    let image_path = dir.join(ATLAS_IMAGE_ENTRY);
    fs::write(&image_path, image).io_context(|| format!("writing {}", image_path.display()))?;
    let context_path = dir.join(CONTEXT_ENTRY);
    fs::write(&context_path, &context)
        .io_context(|| format!("writing {}", context_path.display()))?;
    debug!(dir = %dir.display(), placements = layout.len(), "folder written");
    Ok(())
}

/// Reads the folder pair written by [`save_folder`].
pub fn load_folder(dir: &Path) -> Result<(AtlasLayout, Vec<u8>)> {
    let image = read_file(&dir.join(ATLAS_IMAGE_ENTRY))?;
    let context = read_file(&dir.join(CONTEXT_ENTRY))?;
    let layout = decode_context(&context)?;
    Ok((layout, image))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            AtlasError::CorruptArchive(format!("missing file '{}'", path.display()))
        } else {
            AtlasError::Io {
                context: format!("reading {}", path.display()),
                source: e,
            }
        }
    })
}
