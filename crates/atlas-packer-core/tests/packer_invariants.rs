use atlas_packer_core::error::AtlasError;
use atlas_packer_core::model::{Rect, Size};
use atlas_packer_core::packer::{PackItem, RectanglePacker, pack};

fn disjoint(rects: &[Rect]) -> bool {
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            let a = &rects[i];
            let b = &rects[j];
            let a_x2 = a.x + a.width;
            let a_y2 = a.y + a.height;
            let b_x2 = b.x + b.width;
            let b_y2 = b.y + b.height;
            let overlap = !(a.x >= b_x2 || b.x >= a_x2 || a.y >= b_y2 || b.y >= a_y2);
            if overlap {
                return false;
            }
        }
    }
    true
}

fn contained(rects: &[Rect], bounds: Size) -> bool {
    rects
        .iter()
        .all(|r| r.x + r.width <= bounds.width && r.y + r.height <= bounds.height)
}

fn items(sizes: &[(&'static str, u32, u32)]) -> Vec<PackItem<&'static str>> {
    sizes.iter().map(|&(k, w, h)| PackItem::new(k, w, h)).collect()
}

#[test]
fn empty_input_yields_empty_result() {
    let out = pack::<&str>(&[]).expect("empty is not an error");
    assert!(out.placements.is_empty());
    assert_eq!(out.bounds, Size::new(0, 0));
}

#[test]
fn zero_width_is_rejected() {
    let err = pack(&items(&[("a", 0, 5)])).unwrap_err();
    assert!(matches!(err, AtlasError::InvalidInput(_)), "got {err:?}");
}

#[test]
fn zero_height_is_rejected_even_among_valid_items() {
    let err = pack(&items(&[("a", 4, 4), ("b", 3, 0)])).unwrap_err();
    assert!(matches!(err, AtlasError::InvalidInput(_)), "got {err:?}");
}

#[test]
fn single_item_bounds_are_its_size() {
    let out = pack(&items(&[("solo", 17, 9)])).expect("pack");
    assert_eq!(out.placements, vec![("solo", Rect::new(0, 0, 17, 9))]);
    assert_eq!(out.bounds, Size::new(17, 9));
}

#[test]
fn three_item_scenario_stays_within_stacked_fallback() {
    let input = items(&[("A", 50, 50), ("B", 30, 30), ("C", 50, 30)]);
    let out = pack(&input).expect("pack");
    let rects: Vec<Rect> = out.placements.iter().map(|(_, r)| *r).collect();

    assert_eq!(rects.len(), 3);
    assert!(disjoint(&rects));
    assert!(contained(&rects, out.bounds));
    assert!(out.bounds.width <= 50, "bounds {:?}", out.bounds);
    assert!(out.bounds.height <= 110, "bounds {:?}", out.bounds);

    // placements come back in input order with their own sizes
    let keys: Vec<&str> = out.placements.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec!["A", "B", "C"]);
    for ((_, w, h), (_, r)) in [("A", 50, 50), ("B", 30, 30), ("C", 50, 30)]
        .iter()
        .zip(out.placements.iter())
    {
        assert_eq!((r.width, r.height), (*w, *h));
    }

    let again = pack(&input).expect("pack again");
    assert_eq!(out, again);
}

#[test]
fn bounds_are_tight() {
    let out = pack(&items(&[("a", 10, 40), ("b", 25, 5), ("c", 7, 7), ("d", 3, 33)])).expect("pack");
    let max_r = out
        .placements
        .iter()
        .map(|(_, r)| r.x + r.width)
        .max()
        .unwrap();
    let max_b = out
        .placements
        .iter()
        .map(|(_, r)| r.y + r.height)
        .max()
        .unwrap();
    assert_eq!(out.bounds, Size::new(max_r, max_b));
}

#[test]
fn identical_squares_pack_densely() {
    let input: Vec<PackItem<usize>> = (0..16).map(|i| PackItem::new(i, 32, 32)).collect();
    let out = pack(&input).expect("pack");
    let rects: Vec<Rect> = out.placements.iter().map(|(_, r)| *r).collect();
    assert!(disjoint(&rects));
    // 16 * 32 * 32 = 16384; the sqrt candidate width of 128 fits a perfect 4x4 grid
    assert_eq!(out.bounds.area(), 16384, "bounds {:?}", out.bounds);
}

#[test]
fn degenerate_aspect_ratios() {
    let input = items(&[("wide", 1000, 1), ("tall", 1, 1000), ("dot", 1, 1)]);
    let out = pack(&input).expect("pack");
    let rects: Vec<Rect> = out.placements.iter().map(|(_, r)| *r).collect();
    assert!(disjoint(&rects));
    assert!(contained(&rects, out.bounds));
    let stacked_area = 1000u64 * 1002;
    assert!(out.bounds.area() <= stacked_area);
}

#[test]
fn tall_items_fall_back_to_a_single_row() {
    // greedy placement at every candidate width stacks `b` under `a`
    let input = items(&[("a", 18, 76), ("b", 21, 53), ("c", 6, 7), ("d", 83, 25)]);
    let out = pack(&input).expect("pack");
    let rects: Vec<Rect> = out.placements.iter().map(|(_, r)| *r).collect();
    assert!(disjoint(&rects));
    assert!(contained(&rects, out.bounds));
    assert!(out.bounds.area() <= 128 * 76, "bounds {:?}", out.bounds);
    assert!(out.bounds.area() <= 83 * 161, "bounds {:?}", out.bounds);
}

#[test]
fn few_items_never_exceed_line_fallbacks() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(3);
    let mut packer = RectanglePacker::new();
    for round in 0..300 {
        let n = rng.gen_range(1..=8);
        let input: Vec<PackItem<usize>> = (0..n)
            .map(|i| PackItem::new(i, rng.gen_range(1..=96), rng.gen_range(1..=96)))
            .collect();
        let out = packer.pack(&input).expect("pack");
        let sum_w: u64 = input.iter().map(|it| it.width as u64).sum();
        let sum_h: u64 = input.iter().map(|it| it.height as u64).sum();
        let max_w = input.iter().map(|it| it.width).max().unwrap() as u64;
        let max_h = input.iter().map(|it| it.height).max().unwrap() as u64;
        let area = out.bounds.area();
        assert!(area <= sum_w * max_h, "round {round}: {:?}", out.bounds);
        assert!(area <= max_w * sum_h, "round {round}: {:?}", out.bounds);
    }
}

#[test]
fn random_sets_never_exceed_line_fallbacks() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let mut packer = RectanglePacker::new();
    for round in 0..25 {
        let n = rng.gen_range(1..=60);
        let input: Vec<PackItem<usize>> = (0..n)
            .map(|i| PackItem::new(i, rng.gen_range(1..=96), rng.gen_range(1..=96)))
            .collect();
        let out = packer.pack(&input).expect("pack");
        let rects: Vec<Rect> = out.placements.iter().map(|(_, r)| *r).collect();
        assert_eq!(rects.len(), n);
        assert!(disjoint(&rects), "overlap in round {round}");
        assert!(contained(&rects, out.bounds), "escape in round {round}");

        let max_w = input.iter().map(|it| it.width).max().unwrap() as u64;
        let sum_w: u64 = input.iter().map(|it| it.width as u64).sum();
        let sum_h: u64 = input.iter().map(|it| it.height as u64).sum();
        let max_h = input.iter().map(|it| it.height).max().unwrap() as u64;
        assert!(out.bounds.area() <= max_w * sum_h, "round {round}: {:?}", out.bounds);
        assert!(out.bounds.area() <= sum_w * max_h, "round {round}: {:?}", out.bounds);
        assert!(out.bounds.width as u64 <= sum_w);
        assert!(out.bounds.height as u64 <= sum_h);
        for (it, r) in input.iter().zip(rects.iter()) {
            assert_eq!((it.width, it.height), (r.width, r.height), "no rotation");
        }
    }
}
