use crate::error::{AtlasError, Result};
use crate::model::{AtlasLayout, Rect};
use image::RgbaImage;
use std::collections::{BTreeMap, HashMap};

/// Lookup of decoded pixel buffers by placement name.
pub trait PixelSource {
    fn pixels(&self, name: &str) -> Option<&RgbaImage>;
}

impl PixelSource for HashMap<String, RgbaImage> {
    fn pixels(&self, name: &str) -> Option<&RgbaImage> {
        self.get(name)
    }
}

impl PixelSource for BTreeMap<String, RgbaImage> {
    fn pixels(&self, name: &str) -> Option<&RgbaImage> {
        self.get(name)
    }
}

/// Draws every placement of `layout` onto a transparent canvas of `layout.bounds()`.
///
/// Each source must be exactly the size of its rect; sources are copied 1:1.
pub fn composite<S: PixelSource + ?Sized>(layout: &AtlasLayout, source: &S) -> Result<RgbaImage> {
    let bounds = layout.bounds();
    let mut canvas = RgbaImage::new(bounds.width, bounds.height);
    for (name, rect) in layout.iter() {
        let src = source
            .pixels(name)
            .ok_or_else(|| AtlasError::MissingSource { name: name.into() })?;
        if src.dimensions() != (rect.width, rect.height) {
            return Err(AtlasError::SizeMismatch {
                name: name.into(),
                expected: (rect.width, rect.height),
                actual: src.dimensions(),
            });
        }
        blit_rgba(src, &mut canvas, rect.x, rect.y, &Rect::new(0, 0, rect.width, rect.height));
    }
    Ok(canvas)
}

/// Crops the sub-image `name` back out of a decoded atlas.
pub fn extract(layout: &AtlasLayout, atlas: &RgbaImage, name: &str) -> Result<RgbaImage> {
    let rect = layout
        .get(name)
        .ok_or_else(|| AtlasError::MissingSource { name: name.into() })?;
    let bounds = layout.bounds();
    if atlas.dimensions() != (bounds.width, bounds.height) {
        return Err(AtlasError::SizeMismatch {
            name: name.into(),
            expected: (bounds.width, bounds.height),
            actual: atlas.dimensions(),
        });
    }
    let mut out = RgbaImage::new(rect.width, rect.height);
    blit_rgba(atlas, &mut out, 0, 0, rect);
    Ok(out)
}

/// Copy the sub-rectangle `src_rect` of `src` into `canvas` at (dx, dy),
/// one row slice at a time. Rows or columns falling outside `canvas` are clipped.
pub fn blit_rgba(src: &RgbaImage, canvas: &mut RgbaImage, dx: u32, dy: u32, src_rect: &Rect) {
    let (cw, ch) = canvas.dimensions();
    let (sw, sh) = src.dimensions();
    let w = src_rect
        .width
        .min(sw.saturating_sub(src_rect.x))
        .min(cw.saturating_sub(dx)) as usize;
    let h = src_rect
        .height
        .min(sh.saturating_sub(src_rect.y))
        .min(ch.saturating_sub(dy));
    if w == 0 {
        return;
    }
    let src_stride = sw as usize * 4;
    let dst_stride = cw as usize * 4;
    let src_buf = src.as_raw();
    let dst_buf: &mut [u8] = canvas;
    for row in 0..h {
        let s = (src_rect.y + row) as usize * src_stride + src_rect.x as usize * 4;
        let d = (dy + row) as usize * dst_stride + dx as usize * 4;
        dst_buf[d..d + w * 4].copy_from_slice(&src_buf[s..s + w * 4]);
    }
}
