use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Sorting orders applied before packing.
/// Every order is stable: equal keys keep their input order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Height desc, then width desc (default).
    HeightDesc,
    /// Area desc, then height desc.
    AreaDesc,
    /// Longer side desc, then height desc.
    MaxSideDesc,
    /// Width desc, then height desc.
    WidthDesc,
    /// Keep input order.
    None,
}

impl FromStr for SortOrder {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "height_desc" => Ok(Self::HeightDesc),
            "area_desc" => Ok(Self::AreaDesc),
            "max_side_desc" => Ok(Self::MaxSideDesc),
            "width_desc" => Ok(Self::WidthDesc),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

/// PNG encoder effort for the atlas image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    Default,
    Fast,
    Best,
}

impl FromStr for PngCompression {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "fast" => Ok(Self::Fast),
            "best" => Ok(Self::Best),
            _ => Err(()),
        }
    }
}

/// File extensions picked up by discovery when none are configured.
pub const DEFAULT_EXTENSIONS: [&str; 7] = ["bmp", "gif", "jpg", "jpeg", "png", "tif", "tiff"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackerConfig {
    /// Order in which rectangles are fed to the packer.
    #[serde(default = "default_sort_order")]
    pub sort_order: SortOrder,
    /// Extensions (case-insensitive, without dot) accepted by discovery.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Descend into subdirectories during discovery.
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    /// Decode sources in parallel when feature "parallel" is on.
    #[serde(default)]
    pub parallel: bool,
    /// PNG compression of the atlas image.
    #[serde(default = "default_compression")]
    pub compression: PngCompression,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            sort_order: default_sort_order(),
            extensions: default_extensions(),
            recursive: default_recursive(),
            parallel: false,
            compression: default_compression(),
        }
    }
}

impl PackerConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if the extension list is empty or contains a blank entry.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::AtlasError;

        if self.extensions.is_empty() {
            return Err(AtlasError::InvalidConfig(
                "extensions must name at least one file type".into(),
            ));
        }
        if let Some(bad) = self
            .extensions
            .iter()
            .find(|e| e.trim().trim_start_matches('.').is_empty())
        {
            return Err(AtlasError::InvalidConfig(format!(
                "blank extension in extensions list: {:?}",
                bad
            )));
        }
        Ok(())
    }

    /// True if `ext` (without dot) is one of the configured extensions.
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.extensions
            .iter()
            .any(|e| e.trim().trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    /// Create a fluent builder for `PackerConfig`.
    pub fn builder() -> PackerConfigBuilder {
        PackerConfigBuilder::new()
    }
}

fn default_sort_order() -> SortOrder {
    SortOrder::HeightDesc
}
fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}
fn default_recursive() -> bool {
    true
}
fn default_compression() -> PngCompression {
    PngCompression::Default
}

/// Builder for `PackerConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct PackerConfigBuilder {
    cfg: PackerConfig,
}

impl PackerConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: PackerConfig::default(),
        }
    }
    pub fn sort_order(mut self, v: SortOrder) -> Self {
        self.cfg.sort_order = v;
        self
    }
    pub fn extensions<I, S>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.extensions = v.into_iter().map(Into::into).collect();
        self
    }
    pub fn recursive(mut self, v: bool) -> Self {
        self.cfg.recursive = v;
        self
    }
    pub fn parallel(mut self, v: bool) -> Self {
        self.cfg.parallel = v;
        self
    }
    pub fn compression(mut self, v: PngCompression) -> Self {
        self.cfg.compression = v;
        self
    }
    pub fn build(self) -> PackerConfig {
        self.cfg
    }
}
