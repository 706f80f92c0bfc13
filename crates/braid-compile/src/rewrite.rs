//! In-place node rewriting.
//!
//! Rewrites accumulate `(needle → value)` substitutions and apply them
//! in one batch over every argument reference in the working set. To
//! stay order-independent the accumulated replaces are kept in normal
//! form: no value of one replace is the needle of another.

use std::collections::HashMap;

use braid_ir::{first, nth, DomainMask, Handle, IrModule, Node, NodeKind, Ref, SignalStatus};

use crate::link::{slice_subrange, LinkStore};

/// One pending substitution.
#[derive(Clone, Copy, Debug)]
pub struct Replace {
    pub needle: Ref,
    pub value: Ref,
}

/// Accumulates substitutions in normal form, sorted by needle.
///
/// When `a→b` exists and `b→c` arrives, `a→b` becomes `a→c`; when
/// `c→d` arrives while `b→c` exists, `b→c` becomes `b→d`. Without
/// this, the application order would determine whether intermediate
/// refs survive.
#[derive(Debug, Default)]
pub struct Replacer {
    replaces: Vec<Replace>,
}

impl Replacer {
    /// Records `needle → value`, collapsing replace chains.
    pub fn replace(&mut self, needle: Ref, value: Ref) {
        // If the value is itself replaced, adopt its final value.
        let mut value = value;
        if let Ok(pos) = self
            .replaces
            .binary_search_by(|r| r.needle.cmp(&value))
        {
            value = self.replaces[pos].value;
        }

        // Extend existing chains that end at our needle.
        for r in &mut self.replaces {
            if r.value == needle {
                r.value = value;
            }
        }

        let pos = self.replaces.partition_point(|r| r.needle <= needle);
        self.replaces.insert(pos, Replace { needle, value });
    }

    /// The accumulated substitutions.
    pub fn replaces(&self) -> &[Replace] {
        &self.replaces
    }

    /// Substitutes every matching argument reference in the working
    /// set. The sole safe mechanism for in-place node rewriting.
    pub fn apply(&self, module: &mut IrModule, nodes: &[Handle<Node>]) {
        if self.replaces.is_empty() {
            return;
        }
        for &node in nodes {
            for arg in module.op_arena[node].args_mut() {
                if let Ok(pos) = self.replaces.binary_search_by(|r| r.needle.cmp(arg)) {
                    *arg = self.replaces[pos].value;
                }
            }
        }
    }
}

/// Splices deferred to their last real user, keyed by that user.
pub type DeferredSplices = HashMap<Handle<Node>, Vec<Ref>>;

/// Accumulates the splice-elimination and slice-bridging rewrites.
///
/// Inert splices are substituted away outright. Splices that must
/// signal are substituted too, but recorded against the last real
/// user of their value so the executor can arm them; their per-result
/// value storage is primed here. Slices fully contained in an
/// ancestor slice on the same chain collapse to their parent image.
pub fn eliminate_splices_bridge_slices(
    module: &mut IrModule,
    store: &LinkStore,
    nodes: &[Handle<Node>],
    replacer: &mut Replacer,
    deferred_splices: &mut DeferredSplices,
    pending_splice_signals: &mut HashMap<Handle<Node>, u32>,
) {
    for &node in nodes {
        match &module.op_arena[node].kind {
            NodeKind::Splice(splice) => {
                // A release carries a destination: must be kept.
                if splice.dst_access.is_some() || splice.dst_domain != DomainMask::ANY {
                    continue;
                }
                // An armed acquire: must be kept.
                if splice
                    .rel_acq
                    .as_ref()
                    .is_some_and(|s| s.borrow().status != SignalStatus::Disarmed)
                {
                    continue;
                }

                let src = splice.src.clone();
                let signal = splice.rel_acq.clone();
                if let Some(signal) = &signal {
                    signal.borrow_mut().last_use =
                        vec![Default::default(); src.len()];
                }

                for (i, &parm) in src.iter().enumerate() {
                    let needle = Ref::new(node, i as u32);
                    replacer.replace(needle, parm);

                    if signal.is_none() {
                        continue;
                    }
                    // The splice must still fire its signal: defer it
                    // to the last real use of the value it forwards.
                    let mut id = store.link_id(module, parm);
                    while let Some(next) = store.links[id as usize].next {
                        id = next;
                    }
                    let mut last_use: Option<Handle<Node>> = None;
                    let mut cursor = Some(id);
                    while let Some(c) = cursor {
                        let link = &store.links[c as usize];
                        if !link.reads.is_empty() {
                            last_use = Some(link.reads.as_slice(&store.pass_reads)[0].node);
                            break;
                        }
                        if !matches!(
                            module.op_arena[link.def.node].kind,
                            NodeKind::Splice(_)
                        ) {
                            last_use = Some(link.def.node);
                            break;
                        }
                        cursor = link.prev;
                    }
                    let last_use = last_use.expect("deferred splice with no real use");
                    deferred_splices.entry(last_use).or_default().push(needle);
                    pending_splice_signals.insert(node, 0);
                }
            }

            NodeKind::Slice { .. } => {
                let our_range = slice_subrange(module, node);
                let image = module.op_arena[node].slice_image();
                // Walk up the chain: a containing ancestor slice makes
                // this one redundant.
                let mut cursor = Some(store.link_id(module, image));
                while let Some(id) = cursor {
                    let link = &store.links[id as usize];
                    if matches!(module.op_arena[link.def.node].kind, NodeKind::Slice { .. }) {
                        let their_range = slice_subrange(module, link.def.node);
                        if our_range.intersect(&their_range) == Some(our_range) {
                            replacer.replace(first(node), image);
                            replacer.replace(nth(node, 1), image);
                            break;
                        }
                    }
                    cursor = link.prev;
                }
            }

            _ => {}
        }
    }
}
