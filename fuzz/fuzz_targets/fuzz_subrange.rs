#![no_main]

use arbitrary::Arbitrary;
use braid_ir::{ImageSubrange, MultiSubrange, REMAINING};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    rects: Vec<(u8, u8, u8, u8)>,
    probe: (u8, u8, u8, u8),
}

fn rect((base_level, level_count, base_layer, layer_count): (u8, u8, u8, u8)) -> ImageSubrange {
    // Map 255 to the REMAINING sentinel to exercise unbounded tails.
    let count = |v: u8| if v == 255 { REMAINING } else { u32::from(v) };
    ImageSubrange {
        base_level: u32::from(base_level),
        level_count: count(level_count),
        base_layer: u32::from(base_layer),
        layer_count: count(layer_count),
    }
}

fuzz_target!(|input: Input| {
    let probe = rect(input.probe);
    let mut set = MultiSubrange::all();

    for &r in input.rects.iter().take(16) {
        let r = rect(r);
        // intersect ⊆ operand
        let isect = set.intersect(&r);
        for piece in isect.ranges() {
            assert_eq!(piece.intersect(&r), Some(*piece));
        }
        // difference is disjoint from what was removed
        let diff = set.difference(&MultiSubrange::from(r));
        for piece in diff.ranges() {
            assert!(piece.intersect(&r).is_none());
            assert!(!piece.is_empty());
        }
        set = if r.is_empty() { set } else { diff };
    }

    // Removing everything leaves nothing of the probe.
    if !probe.is_empty() {
        let gone = MultiSubrange::from(probe).difference(&MultiSubrange::all());
        assert!(gone.is_empty());
    }
});
