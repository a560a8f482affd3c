//! Core library for packing images into a single atlas.
//!
//! - Packer: MaxRects free list on a growable canvas, deterministic, no rotation
//! - Layout: validated name -> rect map plus bounds
//! - Codec: zip archive or folder pair holding `atlas.png` + `context.json`
//! - Pipeline: `pack_all` decodes files, packs, composites and encodes; `load` reads it back
//!
//! Quick example:
//! ```ignore
//! use atlas_packer_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let cfg = PackerConfig::default();
//! let paths = discover("sprites".as_ref(), &cfg);
//! if let Some(packed) = pack_to_archive(&paths, "out/atlas.zip".as_ref(), &cfg)? {
//!     println!("{}", packed.stats().summary());
//! }
//! let reloaded = load("out/atlas.zip".as_ref())?;
//! # Ok(()) }
//! ```

pub mod codec;
pub mod compositing;
pub mod config;
pub mod error;
pub mod model;
pub mod packer;
pub mod pipeline;

pub use codec::*;
pub use compositing::*;
pub use config::*;
pub use error::*;
pub use model::*;
pub use packer::{PackItem, Packing, RectanglePacker, pack};
pub use pipeline::*;

/// Convenience prelude for common types and functions.
/// Importing `atlas_packer_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::codec::{
        load_archive, load_archive_from_path, load_folder, save_archive, save_archive_to_path,
        save_folder,
    };
    pub use crate::compositing::{PixelSource, composite};
    pub use crate::config::{PackerConfig, PackerConfigBuilder, PngCompression, SortOrder};
    pub use crate::error::{AtlasError, Result};
    pub use crate::model::{AtlasLayout, LayoutStats, PackedAtlas, Rect, Size};
    pub use crate::packer::{PackItem, Packing, RectanglePacker};
    pub use crate::pipeline::{
        SourceImage, decode_usable, discover, load, pack_all, pack_layout, pack_sources,
        pack_to_archive, pack_to_folder,
    };
}
