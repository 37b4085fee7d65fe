use atlas_extend_core::config::{AlgorithmFamily, MaxRectsHeuristic, PackerConfig, SkylineHeuristic, SortOrder};
use atlas_extend_core::model::{Frame, Rect};
use atlas_extend_core::packer::maxrects::MaxRectsPacker;
use atlas_extend_core::packer::skyline::SkylinePacker;
use atlas_extend_core::packer::{Packer, compute_canvas_size, make_packer};

fn disjoint(frames: &[Frame]) -> bool {
    for i in 0..frames.len() {
        for j in (i + 1)..frames.len() {
            let a = &frames[i].frame;
            let b = &frames[j].frame;
            let overlap = !(a.x >= b.x + b.w || b.x >= a.x + a.w || a.y >= b.y + b.h || b.y >= a.y + a.h);
            if overlap {
                return false;
            }
        }
    }
    true
}

fn cfg() -> PackerConfig {
    PackerConfig {
        max_width: 512,
        max_height: 512,
        border_padding: 0,
        texture_padding: 0,
        sprite_border: 0,
        power_of_two: false,
        square: false,
        family: AlgorithmFamily::MaxRects,
        mr_heuristic: MaxRectsHeuristic::BestAreaFit,
        skyline_heuristic: SkylineHeuristic::BottomLeft,
        sort_order: SortOrder::AreaDesc,
        parallel: false,
    }
}

fn random_rects(n: usize) -> Vec<(u32, u32)> {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    (0..n)
        .map(|_| (rng.gen_range(4..=64), rng.gen_range(4..=64)))
        .collect()
}

fn run(packer: &mut dyn Packer<String>, rects: &[(u32, u32)]) -> Vec<Frame> {
    let mut out = Vec::new();
    for (i, (w, h)) in rects.iter().cloned().enumerate() {
        match packer.pack(format!("r{i}"), &Rect::new(0, 0, w, h)) {
            Some(f) => out.push(f),
            None => break,
        }
    }
    out
}

#[test]
fn maxrects_repeatable_and_disjoint() {
    let rects = random_rects(120);
    for h in [
        MaxRectsHeuristic::BestAreaFit,
        MaxRectsHeuristic::BestShortSideFit,
        MaxRectsHeuristic::BestLongSideFit,
        MaxRectsHeuristic::BottomLeft,
        MaxRectsHeuristic::ContactPoint,
    ] {
        let f1 = run(&mut MaxRectsPacker::new(cfg(), h), &rects);
        let f2 = run(&mut MaxRectsPacker::new(cfg(), h), &rects);
        assert!(!f1.is_empty());
        assert_eq!(f1.len(), f2.len());
        for (a, b) in f1.iter().zip(f2.iter()) {
            assert_eq!(a.frame, b.frame);
        }
        assert!(disjoint(&f1), "{h:?} overlaps");
        assert!(f1.iter().all(|f| f.frame.right() < 512 && f.frame.bottom() < 512));
    }
}

#[test]
fn skyline_disjoint_for_both_heuristics() {
    let rects = random_rects(120);
    for h in [SkylineHeuristic::BottomLeft, SkylineHeuristic::MinWaste] {
        let mut c = cfg();
        c.family = AlgorithmFamily::Skyline;
        c.skyline_heuristic = h;
        let frames = run(&mut SkylinePacker::new(c), &rects);
        assert!(frames.len() > 10);
        assert!(disjoint(&frames), "{h:?} overlaps");
    }
}

#[test]
fn padding_separates_frames() {
    let mut c = cfg();
    c.texture_padding = 4;
    c.border_padding = 2;
    let mut p = make_packer::<String>(&c);
    let a = p.pack("a".into(), &Rect::new(0, 0, 10, 10)).expect("a");
    let b = p.pack("b".into(), &Rect::new(0, 0, 10, 10)).expect("b");
    assert!(a.frame.x >= 2 && a.frame.y >= 2);
    let gap_x = b.frame.x.abs_diff(a.frame.x);
    let gap_y = b.frame.y.abs_diff(a.frame.y);
    assert!(gap_x >= 14 || gap_y >= 14);
}

#[test]
fn canvas_size_rounds_up() {
    let frames = vec![Frame {
        key: "a".to_string(),
        frame: Rect::new(0, 0, 100, 40),
        source_size: (100, 40),
    }];
    let mut c = cfg();
    assert_eq!(compute_canvas_size(&frames, &c), (100, 40));
    c.power_of_two = true;
    assert_eq!(compute_canvas_size(&frames, &c), (128, 64));
    c.square = true;
    assert_eq!(compute_canvas_size(&frames, &c), (128, 128));
}
