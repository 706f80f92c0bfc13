#![no_main]

use arbitrary::Arbitrary;
use braid_compile::Replacer;
use braid_ir::{Handle, Ref};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    pairs: Vec<(u8, u8)>,
}

fn lookup(replacer: &Replacer, r: Ref) -> Ref {
    replacer
        .replaces()
        .iter()
        .find(|rep| rep.needle == r)
        .map(|rep| rep.value)
        .unwrap_or(r)
}

fuzz_target!(|input: Input| {
    let mut replacer = Replacer::default();
    let r = |v: u8| Ref::new(Handle::from_index(usize::from(v)), 0);

    for &(needle, value) in input.pairs.iter().take(32) {
        if needle == value {
            continue;
        }
        replacer.replace(r(needle), r(value));
    }

    // Normal form: substitution is a fixed point after one step, so
    // the application order of the batch rewrite cannot matter.
    for v in 0..=u8::MAX {
        let once = lookup(&replacer, r(v));
        let twice = lookup(&replacer, once);
        assert_eq!(once, twice, "dangling intermediate replace for {v}");
    }
});
