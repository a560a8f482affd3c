//! Rectangle bin packing onto a single growable canvas.
//!
//! The placement rule is fixed so that identical inputs always produce
//! identical layouts:
//!
//! 1. Items are stably sorted (default: height desc, then width desc, then
//!    input order).
//! 2. For each candidate canvas width (widest item, `sqrt(total area)` scaled by
//!    1, 5/4, 3/2 and 2, sum of widths; clamped and deduplicated) a MaxRects
//!    free list starts as one region `W x sum(heights)`.
//! 3. Each item takes the free region with the lowest
//!    `(bbox area growth, leftover area, leftover short side, y, x)` and is
//!    placed at its top-left corner.
//! 4. The single-row (`sum(width) x max(height)`) and single-column
//!    (`max(width) x sum(height)`) layouts compete as two more candidates.
//! 5. The candidate with the smallest tight bounds wins (area, then
//!    perimeter, then width). Earlier candidates win exact ties.
//!
//! The result is therefore never larger than placing the items one per row
//! or one per column.

use crate::config::SortOrder;
use crate::error::{AtlasError, Result};
use crate::model::{Rect, Size, tight_bounds};
use std::cmp::Ordering;
use tracing::{debug, trace};

pub mod maxrects;

use maxrects::MaxRectsCanvas;

/// One rectangle to place. `id` is opaque to the packer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackItem<K> {
    pub id: K,
    pub width: u32,
    pub height: u32,
}

impl<K> PackItem<K> {
    pub fn new(id: K, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }
}

impl<K> From<(K, u32, u32)> for PackItem<K> {
    fn from((id, width, height): (K, u32, u32)) -> Self {
        Self::new(id, width, height)
    }
}

/// Result of one packing run. `placements` follow the input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packing<K> {
    pub placements: Vec<(K, Rect)>,
    pub bounds: Size,
}

/// Packs rectangles without rotation; reusable across calls.
///
/// Scratch buffers are owned by the value, so a packer is cheap to reuse on
/// one thread and separate packers never share state.
pub struct RectanglePacker {
    sort_order: SortOrder,
    canvas: MaxRectsCanvas,
    order: Vec<usize>,
    placed: Vec<Rect>,
    best: Vec<Rect>,
}

impl Default for RectanglePacker {
    fn default() -> Self {
        Self::new()
    }
}

impl RectanglePacker {
    pub fn new() -> Self {
        Self::with_sort_order(SortOrder::HeightDesc)
    }

    pub fn with_sort_order(sort_order: SortOrder) -> Self {
        Self {
            sort_order,
            canvas: MaxRectsCanvas::new(),
            order: Vec::new(),
            placed: Vec::new(),
            best: Vec::new(),
        }
    }

    /// Computes placements and tight bounds for `items`.
    ///
    /// Empty input yields no placements and `0x0` bounds. Items with a zero
    /// width or height fail with `InvalidInput`.
    pub fn pack<K: Clone>(&mut self, items: &[PackItem<K>]) -> Result<Packing<K>> {
        if let Some((i, it)) = items
            .iter()
            .enumerate()
            .find(|(_, it)| it.width == 0 || it.height == 0)
        {
            return Err(AtlasError::InvalidInput(format!(
                "item #{} has zero size {}x{}",
                i, it.width, it.height
            )));
        }
        if items.is_empty() {
            return Ok(Packing {
                placements: Vec::new(),
                bounds: Size::default(),
            });
        }

        self.order.clear();
        self.order.extend(0..items.len());
        sort_indices(&mut self.order, items, self.sort_order);

        let max_w = items.iter().map(|it| it.width).max().unwrap_or(0);
        let sum_w: u64 = items.iter().map(|it| it.width as u64).sum();
        let sum_h: u64 = items.iter().map(|it| it.height as u64).sum();
        let total_area: u64 = items
            .iter()
            .map(|it| it.width as u64 * it.height as u64)
            .sum();
        let stack_h = u32::try_from(sum_h).unwrap_or(u32::MAX);

        let mut best_bounds: Option<Size> = None;
        for width in candidate_widths(max_w, sum_w, total_area) {
            self.canvas.reset(width, stack_h);
            self.placed.clear();
            self.placed.resize(items.len(), Rect::default());
            let mut complete = true;
            for &idx in &self.order {
                match self.canvas.insert(items[idx].width, items[idx].height) {
                    Some(r) => self.placed[idx] = r,
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if !complete {
                trace!(width, "candidate width could not hold every item");
                continue;
            }
            let bounds = tight_bounds(&self.placed);
            trace!(width, bw = bounds.width, bh = bounds.height, "candidate packed");
            if best_bounds.is_none_or(|b| better(bounds, b)) {
                best_bounds = Some(bounds);
                std::mem::swap(&mut self.best, &mut self.placed);
            }
        }

        for horizontal in [true, false] {
            let Some(bounds) = line_layout(items, &self.order, horizontal, &mut self.placed)
            else {
                continue;
            };
            trace!(horizontal, bw = bounds.width, bh = bounds.height, "line fallback");
            if best_bounds.is_none_or(|b| better(bounds, b)) {
                best_bounds = Some(bounds);
                std::mem::swap(&mut self.best, &mut self.placed);
            }
        }

        let bounds = best_bounds.ok_or_else(|| {
            AtlasError::InvalidInput(format!(
                "{} items ({}x{} total extent) do not fit a u32 canvas",
                items.len(),
                sum_w,
                sum_h
            ))
        })?;
        debug!(
            items = items.len(),
            width = bounds.width,
            height = bounds.height,
            "packed rectangles"
        );
        let placements = items
            .iter()
            .zip(self.best.iter())
            .map(|(it, r)| (it.id.clone(), *r))
            .collect();
        Ok(Packing { placements, bounds })
    }
}

/// Packs `items` with a fresh `RectanglePacker` using the default sort order.
pub fn pack<K: Clone>(items: &[PackItem<K>]) -> Result<Packing<K>> {
    RectanglePacker::new().pack(items)
}

fn sort_indices<K>(order: &mut [usize], items: &[PackItem<K>], sort_order: SortOrder) {
    let by_height = |a: &PackItem<K>, b: &PackItem<K>| {
        b.height.cmp(&a.height).then_with(|| b.width.cmp(&a.width))
    };
    // `sort_by` is stable: ties keep input order
    match sort_order {
        SortOrder::None => {}
        SortOrder::HeightDesc => order.sort_by(|&a, &b| by_height(&items[a], &items[b])),
        SortOrder::AreaDesc => order.sort_by(|&a, &b| {
            let (a, b) = (&items[a], &items[b]);
            (b.width as u64 * b.height as u64)
                .cmp(&(a.width as u64 * a.height as u64))
                .then_with(|| by_height(a, b))
        }),
        SortOrder::MaxSideDesc => order.sort_by(|&a, &b| {
            let (a, b) = (&items[a], &items[b]);
            b.width
                .max(b.height)
                .cmp(&a.width.max(a.height))
                .then_with(|| by_height(a, b))
        }),
        SortOrder::WidthDesc => order.sort_by(|&a, &b| {
            let (a, b) = (&items[a], &items[b]);
            b.width
                .cmp(&a.width)
                .then_with(|| b.height.cmp(&a.height))
        }),
    }
}

/// Places items side by side (`horizontal`) or stacked, in `order`.
/// `None` when the line does not fit in `u32`.
fn line_layout<K>(
    items: &[PackItem<K>],
    order: &[usize],
    horizontal: bool,
    out: &mut Vec<Rect>,
) -> Option<Size> {
    out.clear();
    out.resize(items.len(), Rect::default());
    let mut offset = 0u32;
    for &idx in order {
        let it = &items[idx];
        out[idx] = if horizontal {
            Rect::new(offset, 0, it.width, it.height)
        } else {
            Rect::new(0, offset, it.width, it.height)
        };
        let step = if horizontal { it.width } else { it.height };
        offset = offset.checked_add(step)?;
    }
    Some(tight_bounds(out.iter()))
}

fn candidate_widths(max_w: u32, sum_w: u64, total_area: u64) -> Vec<u32> {
    let lo = max_w as u64;
    let hi = sum_w.min(u32::MAX as u64).max(lo);
    let side = (total_area as f64).sqrt().ceil() as u64;
    let mut widths: Vec<u32> = [lo, side, side * 5 / 4, side * 3 / 2, side * 2, hi]
        .into_iter()
        .map(|w| w.clamp(lo, hi) as u32)
        .collect();
    widths.sort_unstable();
    widths.dedup();
    widths
}

fn better(a: Size, b: Size) -> bool {
    let key = |s: Size| (s.area(), s.width as u64 + s.height as u64, s.width);
    key(a).cmp(&key(b)) == Ordering::Less
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_widths_are_clamped_and_sorted() {
        let w = candidate_widths(50, 130, 4900);
        assert_eq!(w, vec![50, 70, 87, 105, 130]);
    }

    #[test]
    fn single_candidate_when_one_item() {
        assert_eq!(candidate_widths(8, 8, 64), vec![8]);
    }

    #[test]
    fn line_layout_places_items_along_one_axis() {
        let items = vec![PackItem::new('a', 4, 2), PackItem::new('b', 3, 5)];
        let mut out = Vec::new();
        assert_eq!(line_layout(&items, &[1, 0], true, &mut out), Some(Size::new(7, 5)));
        assert_eq!(out, vec![Rect::new(3, 0, 4, 2), Rect::new(0, 0, 3, 5)]);
        assert_eq!(line_layout(&items, &[0, 1], false, &mut out), Some(Size::new(4, 7)));
        assert_eq!(out, vec![Rect::new(0, 0, 4, 2), Rect::new(0, 2, 3, 5)]);
    }

    #[test]
    fn line_layout_rejects_u32_overflow() {
        let items = vec![PackItem::new(0, u32::MAX, 1), PackItem::new(1, 1, 1)];
        let mut out = Vec::new();
        assert_eq!(line_layout(&items, &[0, 1], true, &mut out), None);
        assert!(line_layout(&items, &[0, 1], false, &mut out).is_some());
    }

    #[test]
    fn sort_keeps_input_order_on_ties() {
        let items: Vec<PackItem<&str>> = vec![
            PackItem::new("a", 10, 10),
            PackItem::new("b", 10, 10),
            PackItem::new("c", 20, 10),
        ];
        let mut order: Vec<usize> = (0..3).collect();
        sort_indices(&mut order, &items, SortOrder::HeightDesc);
        assert_eq!(order, vec![2, 0, 1]);
    }
}
