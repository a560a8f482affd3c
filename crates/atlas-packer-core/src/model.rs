use crate::error::{AtlasError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Axis-aligned rectangle (pixels). `x,y` is top-left.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge (`x + width`), computed in u64.
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Exclusive bottom edge (`y + height`).
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True if the open interiors of `self` and `other` share any area.
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.x as u64 >= other.right()
            || other.x as u64 >= self.right()
            || self.y as u64 >= other.bottom()
            || other.y as u64 >= self.bottom())
    }

    /// Returns true if `r` is fully inside `self`.
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
}

/// Width/height pair used for atlas bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Named placements plus the atlas bounds: the output of one packing run.
///
/// Every constructor validates the layout:
/// - names are non-empty (uniqueness follows from the map),
/// - every placement has a non-zero width and height,
/// - every placement lies inside `bounds`,
/// - no two placements overlap,
/// - an empty layout has `0x0` bounds.
///
/// There are no mutating accessors; a layout is read by the compositor and
/// the codec and otherwise discarded or handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AtlasLayout {
    bounds: Size,
    placements: BTreeMap<String, Rect>,
}

impl AtlasLayout {
    /// Builds a layout, failing with `InvalidLayout` when an invariant does not hold.
    pub fn new(bounds: Size, placements: BTreeMap<String, Rect>) -> Result<Self> {
        validate(bounds, &placements)?;
        Ok(Self { bounds, placements })
    }

    /// The empty layout (`0x0`, no placements).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bounds(&self) -> Size {
        self.bounds
    }

    pub fn placements(&self) -> &BTreeMap<String, Rect> {
        &self.placements
    }

    pub fn get(&self, name: &str) -> Option<&Rect> {
        self.placements.get(name)
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Iterates placements in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rect)> {
        self.placements.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Computes occupancy statistics for this layout.
    pub fn stats(&self) -> LayoutStats {
        let canvas_area = self.bounds.area();
        let used_area: u64 = self.placements.values().map(Rect::area).sum();
        let occupancy = if canvas_area > 0 {
            used_area as f64 / canvas_area as f64
        } else {
            0.0
        };
        LayoutStats {
            num_placements: self.placements.len(),
            width: self.bounds.width,
            height: self.bounds.height,
            canvas_area,
            used_area,
            occupancy,
        }
    }
}

/// Tight bounding size of a set of rectangles (`0x0` when empty).
pub fn tight_bounds<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Size {
    let mut w = 0u64;
    let mut h = 0u64;
    for r in rects {
        w = w.max(r.right());
        h = h.max(r.bottom());
    }
    Size::new(
        u32::try_from(w).unwrap_or(u32::MAX),
        u32::try_from(h).unwrap_or(u32::MAX),
    )
}

fn validate(bounds: Size, placements: &BTreeMap<String, Rect>) -> Result<()> {
    if placements.is_empty() {
        if bounds != Size::default() {
            return Err(AtlasError::InvalidLayout(format!(
                "empty layout must have 0x0 bounds, got {}x{}",
                bounds.width, bounds.height
            )));
        }
        return Ok(());
    }
    let canvas = Rect::new(0, 0, bounds.width, bounds.height);
    for (name, r) in placements {
        if name.is_empty() {
            return Err(AtlasError::InvalidLayout("placement with empty name".into()));
        }
        if r.width == 0 || r.height == 0 {
            return Err(AtlasError::InvalidLayout(format!(
                "placement '{}' has zero size {}x{}",
                name, r.width, r.height
            )));
        }
        if !canvas.contains(r) {
            return Err(AtlasError::InvalidLayout(format!(
                "placement '{}' ({},{} {}x{}) exceeds bounds {}x{}",
                name, r.x, r.y, r.width, r.height, bounds.width, bounds.height
            )));
        }
    }

    // sweep along x: only rects whose x-range starts before `a` ends can overlap it
    let mut by_x: Vec<(&String, &Rect)> = placements.iter().collect();
    by_x.sort_by_key(|(_, r)| r.x);
    for (i, (name_a, a)) in by_x.iter().enumerate() {
        for (name_b, b) in &by_x[i + 1..] {
            if b.x as u64 >= a.right() {
                break;
            }
            if a.intersects(b) {
                return Err(AtlasError::InvalidLayout(format!(
                    "placements '{}' and '{}' overlap",
                    name_a, name_b
                )));
            }
        }
    }
    Ok(())
}

/// Statistics about atlas packing efficiency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayoutStats {
    /// Number of placed sub-images.
    pub num_placements: usize,
    /// Atlas dimensions.
    pub width: u32,
    pub height: u32,
    /// `width * height`.
    pub canvas_area: u64,
    /// Sum of placement areas.
    pub used_area: u64,
    /// Occupancy ratio: used_area / canvas_area (0.0 to 1.0).
    /// Higher is better (less wasted space).
    pub occupancy: f64,
}

impl LayoutStats {
    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Images: {}, Size: {}x{}, Occupancy: {:.2}%, Total Area: {} px², Used Area: {} px²",
            self.num_placements,
            self.width,
            self.height,
            self.occupancy * 100.0,
            self.canvas_area,
            self.used_area,
        )
    }

    /// Returns wasted space in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.canvas_area.saturating_sub(self.used_area)
    }

    /// Returns wasted space as a percentage (0.0 to 100.0).
    pub fn waste_percentage(&self) -> f64 {
        if self.canvas_area > 0 {
            (self.wasted_area() as f64 / self.canvas_area as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// One layout paired with its encoded (PNG) atlas image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedAtlas {
    pub layout: AtlasLayout,
    pub image: Vec<u8>,
}

impl PackedAtlas {
    pub fn new(layout: AtlasLayout, image: Vec<u8>) -> Self {
        Self { layout, image }
    }

    pub fn stats(&self) -> LayoutStats {
        self.layout.stats()
    }
}
