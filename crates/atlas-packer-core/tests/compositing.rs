use std::collections::{BTreeMap, HashMap};

use atlas_packer_core::compositing::{composite, extract};
use atlas_packer_core::error::AtlasError;
use atlas_packer_core::model::{AtlasLayout, Rect, Size};
use image::{Rgba, RgbaImage};

fn solid(w: u32, h: u32, c: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(w, h, Rgba(c))
}

fn layout() -> AtlasLayout {
    AtlasLayout::new(
        Size::new(6, 4),
        BTreeMap::from([
            ("red".to_string(), Rect::new(0, 0, 4, 4)),
            ("blue".to_string(), Rect::new(4, 1, 2, 3)),
        ]),
    )
    .expect("layout")
}

#[test]
fn draws_each_source_at_its_rect_on_transparent_canvas() {
    let mut src: HashMap<String, RgbaImage> = HashMap::new();
    src.insert("red".into(), solid(4, 4, [255, 0, 0, 255]));
    src.insert("blue".into(), solid(2, 3, [0, 0, 255, 255]));

    let canvas = composite(&layout(), &src).expect("composite");
    assert_eq!(canvas.dimensions(), (6, 4));
    assert_eq!(*canvas.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    assert_eq!(*canvas.get_pixel(3, 3), Rgba([255, 0, 0, 255]));
    assert_eq!(*canvas.get_pixel(4, 1), Rgba([0, 0, 255, 255]));
    assert_eq!(*canvas.get_pixel(5, 3), Rgba([0, 0, 255, 255]));
    // gap above `blue` stays transparent
    assert_eq!(*canvas.get_pixel(4, 0), Rgba([0, 0, 0, 0]));
    assert_eq!(*canvas.get_pixel(5, 0), Rgba([0, 0, 0, 0]));
}

#[test]
fn preserves_source_pixels_exactly() {
    let mut gradient = RgbaImage::new(2, 3);
    for (x, y, p) in gradient.enumerate_pixels_mut() {
        *p = Rgba([x as u8 * 10, y as u8 * 20, 7, 128]);
    }
    let mut src: BTreeMap<String, RgbaImage> = BTreeMap::new();
    src.insert("red".into(), solid(4, 4, [1, 2, 3, 4]));
    src.insert("blue".into(), gradient.clone());

    let canvas = composite(&layout(), &src).expect("composite");
    let back = extract(&layout(), &canvas, "blue").expect("extract");
    assert_eq!(back, gradient);
}

#[test]
fn missing_source_is_reported() {
    let mut src: HashMap<String, RgbaImage> = HashMap::new();
    src.insert("red".into(), solid(4, 4, [255, 0, 0, 255]));
    match composite(&layout(), &src) {
        Err(AtlasError::MissingSource { name }) => assert_eq!(name, "blue"),
        other => panic!("expected MissingSource, got {other:?}"),
    }
}

#[test]
fn size_mismatch_is_reported() {
    let mut src: HashMap<String, RgbaImage> = HashMap::new();
    src.insert("red".into(), solid(4, 4, [255, 0, 0, 255]));
    src.insert("blue".into(), solid(3, 2, [0, 0, 255, 255]));
    match composite(&layout(), &src) {
        Err(AtlasError::SizeMismatch {
            name,
            expected,
            actual,
        }) => {
            assert_eq!(name, "blue");
            assert_eq!(expected, (2, 3));
            assert_eq!(actual, (3, 2));
        }
        other => panic!("expected SizeMismatch, got {other:?}"),
    }
}

#[test]
fn empty_layout_composites_to_empty_canvas() {
    let src: HashMap<String, RgbaImage> = HashMap::new();
    let canvas = composite(&AtlasLayout::empty(), &src).expect("composite");
    assert_eq!(canvas.dimensions(), (0, 0));
}

#[test]
fn extract_unknown_name_is_missing_source() {
    let canvas = RgbaImage::new(6, 4);
    let err = extract(&layout(), &canvas, "green").unwrap_err();
    assert!(matches!(err, AtlasError::MissingSource { .. }), "got {err:?}");
}

#[test]
fn extract_from_wrong_sized_atlas_is_size_mismatch() {
    let canvas = RgbaImage::new(5, 4);
    let err = extract(&layout(), &canvas, "red").unwrap_err();
    assert!(matches!(err, AtlasError::SizeMismatch { .. }), "got {err:?}");
}
