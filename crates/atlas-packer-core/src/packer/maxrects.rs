use crate::model::Rect;

/// Placement score, compared lexicographically (lower is better):
/// bounding-box area growth, leftover free-region area, leftover short side,
/// then top-most `y` and left-most `x`.
type Score = (u64, u64, u32, u32, u32);

/// MaxRects free list over a canvas of fixed width whose height is large
/// enough to stack every item, so a placement always exists.
///
/// Buffers survive `reset`, which lets one `RectanglePacker` reuse them
/// across candidate widths and across calls.
pub(crate) struct MaxRectsCanvas {
    free: Vec<Rect>,
    scratch: Vec<Rect>,
    used_w: u32,
    used_h: u32,
}

impl MaxRectsCanvas {
    pub(crate) fn new() -> Self {
        Self {
            free: Vec::new(),
            scratch: Vec::new(),
            used_w: 0,
            used_h: 0,
        }
    }

    pub(crate) fn reset(&mut self, width: u32, height: u32) {
        self.free.clear();
        self.scratch.clear();
        self.free.push(Rect::new(0, 0, width, height));
        self.used_w = 0;
        self.used_h = 0;
    }

    /// Places a `w x h` item flush with the top-left corner of the best free region.
    pub(crate) fn insert(&mut self, w: u32, h: u32) -> Option<Rect> {
        let place = self.find_position(w, h)?;
        self.place_rect(&place);
        self.used_w = self.used_w.max(right_ex(&place));
        self.used_h = self.used_h.max(bottom_ex(&place));
        Some(place)
    }

    fn score(&self, fr: &Rect, w: u32, h: u32) -> Score {
        let used_area = self.used_w as u64 * self.used_h as u64;
        let grown_w = self.used_w.max(fr.x + w) as u64;
        let grown_h = self.used_h.max(fr.y + h) as u64;
        let growth = grown_w * grown_h - used_area;
        let leftover_area = fr.area() - w as u64 * h as u64;
        let short_fit = (fr.width - w).min(fr.height - h);
        (growth, leftover_area, short_fit, fr.y, fr.x)
    }

    fn find_position(&self, w: u32, h: u32) -> Option<Rect> {
        let mut best: Option<(Score, Rect)> = None;
        for fr in &self.free {
            if fr.width < w || fr.height < h {
                continue;
            }
            let s = self.score(fr, w, h);
            if best.as_ref().is_none_or(|(bs, _)| s < *bs) {
                best = Some((s, Rect::new(fr.x, fr.y, w, h)));
            }
        }
        best.map(|(_, r)| r)
    }

    fn place_rect(&mut self, node: &Rect) {
        self.scratch.clear();
        for fr in &self.free {
            if !fr.intersects(node) {
                self.scratch.push(*fr);
                continue;
            }
            split_free_node(fr, node, &mut self.scratch);
        }
        std::mem::swap(&mut self.free, &mut self.scratch);
        self.prune_free_list();
    }

    fn prune_free_list(&mut self) {
        let mut i = 0;
        while i < self.free.len() {
            let mut j = i + 1;
            let a = self.free[i];
            let mut remove_i = false;
            while j < self.free.len() {
                let b = self.free[j];
                if b.contains(&a) {
                    remove_i = true;
                    break;
                }
                if a.contains(&b) {
                    self.free.remove(j);
                    continue;
                }
                j += 1;
            }
            if remove_i {
                self.free.remove(i);
            } else {
                i += 1;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn free_list_len(&self) -> usize {
        self.free.len()
    }
}

fn right_ex(r: &Rect) -> u32 {
    r.x + r.width
}
fn bottom_ex(r: &Rect) -> u32 {
    r.y + r.height
}

/// Splits `fr` around `node` into its maximal remainders (left, right, top, bottom).
/// For the region the node was placed in only right and bottom survive.
fn split_free_node(fr: &Rect, node: &Rect, out: &mut Vec<Rect>) {
    let fr_x2 = right_ex(fr);
    let fr_y2 = bottom_ex(fr);
    let n_x2 = right_ex(node);
    let n_y2 = bottom_ex(node);

    // left
    if node.x > fr.x {
        out.push(Rect::new(fr.x, fr.y, node.x - fr.x, fr.height));
    }
    // right
    if n_x2 < fr_x2 {
        out.push(Rect::new(n_x2, fr.y, fr_x2 - n_x2, fr.height));
    }
    // top
    if node.y > fr.y {
        out.push(Rect::new(fr.x, fr.y, fr.width, node.y - fr.y));
    }
    // bottom
    if n_y2 < fr_y2 {
        out.push(Rect::new(fr.x, n_y2, fr.width, fr_y2 - n_y2));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_item_leaves_right_and_bottom_remainders() {
        let mut c = MaxRectsCanvas::new();
        c.reset(100, 100);
        let r = c.insert(40, 30).expect("fits");
        assert_eq!(r, Rect::new(0, 0, 40, 30));
        assert_eq!(c.free_list_len(), 2);
        assert!(c.free.contains(&Rect::new(40, 0, 60, 100)));
        assert!(c.free.contains(&Rect::new(0, 30, 100, 70)));
    }

    #[test]
    fn fills_hole_before_growing() {
        let mut c = MaxRectsCanvas::new();
        c.reset(100, 200);
        c.insert(50, 50).expect("a");
        assert_eq!(c.insert(20, 20).expect("b"), Rect::new(50, 0, 20, 20));
        // 20x30 gap under `b` keeps the 70x50 bounding box
        assert_eq!(c.insert(20, 30).expect("c"), Rect::new(50, 20, 20, 30));
    }

    #[test]
    fn rejects_item_wider_than_canvas() {
        let mut c = MaxRectsCanvas::new();
        c.reset(10, 10);
        assert!(c.insert(11, 1).is_none());
    }
}
