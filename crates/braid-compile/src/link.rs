//! Chain-link construction: the def/use relationships every later
//! pass consumes.
//!
//! Each node result owns one [`ChainLink`]. Links of one value form a
//! doubly-linked chain from its defining node through every rewrite of
//! it. Reads hang off the link they read; slices fork child chains.
//! With SSA rewriting enabled, a second write to an already-written
//! value retargets the writer to the newest revision on the chain,
//! inserting a converge when a requested image range straddles a
//! slice.

use braid_ir::{
    first, is_write_access, nth, Access, Handle, ImageSubrange, IrModule, MultiSubrange, Node,
    NodeKind, QueueResourceUse, Ref, Span, TypeInner,
};

use crate::eval::eval_u32;

/// Index of a [`ChainLink`] in the session's [`LinkStore`].
pub type LinkId = u32;

/// Per-result def/use record.
#[derive(Clone, Debug)]
pub struct ChainLink {
    /// The ref this link belongs to: the value's (re)definition.
    pub def: Ref,
    /// Previous revision of the value.
    pub prev: Option<LinkId>,
    /// Next revision of the value.
    pub next: Option<LinkId>,
    /// The ref that consumes or overwrites this value, if any.
    pub undef: Option<Ref>,
    /// Concurrent reads of this value.
    pub reads: Span<Ref>,
    /// Chains forked off this value by slices.
    pub child_chains: Span<LinkId>,
    /// Ultimate root definition of the whole chain.
    pub urdef: Option<Ref>,
    /// Synchronization required by the undef.
    pub undef_sync: Option<QueueResourceUse>,
    /// Merged synchronization of the read group.
    pub read_sync: Option<QueueResourceUse>,
}

/// Session-owned link storage shared by all chains.
#[derive(Debug, Default)]
pub struct LinkStore {
    pub links: Vec<ChainLink>,
    pub pass_reads: Vec<Ref>,
    pub child_chains: Vec<LinkId>,
}

impl LinkStore {
    /// Drops all links and shared slices.
    pub fn clear(&mut self) {
        self.links.clear();
        self.pass_reads.clear();
        self.child_chains.clear();
    }

    /// The link id of a ref, if its node has links allocated.
    pub fn try_link_id(&self, module: &IrModule, r: Ref) -> Option<LinkId> {
        module.op_arena[r.node].links.map(|base| base + r.index)
    }

    /// The link id of a ref.
    ///
    /// # Panics
    ///
    /// Panics if the node has no links allocated.
    pub fn link_id(&self, module: &IrModule, r: Ref) -> LinkId {
        self.try_link_id(module, r)
            .expect("ref into a node without links")
    }

    /// The link of a ref.
    pub fn link_of<'a>(&'a self, module: &IrModule, r: Ref) -> &'a ChainLink {
        &self.links[self.link_id(module, r) as usize]
    }
}

/// Allocates one link per result of the node, each defining itself.
pub fn allocate_node_links(module: &mut IrModule, store: &mut LinkStore, node: Handle<Node>) {
    let result_count = module.op_arena[node].result_count();
    if result_count == 0 {
        module.op_arena[node].links = None;
        return;
    }
    let base = store.links.len() as u32;
    for i in 0..result_count {
        store.links.push(ChainLink {
            def: Ref::new(node, i as u32),
            prev: None,
            next: None,
            undef: None,
            reads: Span::default(),
            child_chains: Span::default(),
            urdef: None,
            undef_sync: None,
            read_sync: None,
        });
    }
    module.op_arena[node].links = Some(base);
}

/// Reads the mip/layer rectangle a slice node carves out.
pub fn slice_subrange(module: &IrModule, slice: Handle<Node>) -> ImageSubrange {
    let [base_level, level_count, base_layer, layer_count] =
        module.op_arena[slice].slice_range_args();
    ImageSubrange {
        base_level: eval_u32(module, base_level).expect("slice range must be evaluable"),
        level_count: eval_u32(module, level_count).expect("slice range must be evaluable"),
        base_layer: eval_u32(module, base_layer).expect("slice range must be evaluable"),
        layer_count: eval_u32(module, layer_count).expect("slice range must be evaluable"),
    }
}

/// Collects the live tails of the chain starting at `head`: the last
/// writes, or failing that the read group, or the definition itself.
/// Slices recurse into both forks.
pub fn collect_tails(
    module: &IrModule,
    store: &LinkStore,
    head: Ref,
    tails: &mut Vec<Ref>,
) {
    let mut id = store.link_id(module, head);

    while let Some(next) = store.links[id as usize].next {
        if let Some(undef) = store.links[id as usize].undef {
            if matches!(module.op_arena[undef.node].kind, NodeKind::Slice { .. }) {
                collect_tails(module, store, first(undef.node), tails);
                collect_tails(module, store, nth(undef.node, 1), tails);
            }
        }
        id = next;
    }

    let link = &store.links[id as usize];
    if let Some(undef) = link.undef {
        if matches!(module.op_arena[undef.node].kind, NodeKind::Slice { .. }) {
            collect_tails(module, store, first(undef.node), tails);
            collect_tails(module, store, nth(undef.node, 1), tails);
        } else {
            tails.push(undef);
        }
    } else if !link.reads.is_empty() {
        tails.extend_from_slice(link.reads.as_slice(&store.pass_reads));
    } else if !matches!(module.op_arena[link.def.node].kind, NodeKind::Slice { .. }) {
        tails.push(link.def);
    }
}

/// Finds the newest revision of `parm`, descending into slices whose
/// range overlaps `requested` and inserting a converge when the
/// request straddles a split.
fn walk_writes(
    module: &mut IrModule,
    store: &mut LinkStore,
    parm: Ref,
    requested: ImageSubrange,
    at: Handle<Node>,
    new_nodes: &mut Vec<Handle<Node>>,
) -> Ref {
    let mut id = store.link_id(module, parm);
    let mut last_write: Option<Ref> = None;
    let mut current_range = MultiSubrange::all();

    loop {
        let undef = store.links[id as usize].undef;
        if let Some(undef) = undef {
            if matches!(module.op_arena[undef.node].kind, NodeKind::Slice { .. }) {
                let existing = slice_subrange(module, undef.node);
                let left = current_range.intersect(&existing);
                let isection = left.intersect(&requested);
                if !isection.is_empty() {
                    if MultiSubrange::from(requested).difference(&isection).is_empty() {
                        // Fully contained in the slice: follow it.
                        id = store.link_id(module, first(undef.node));
                        current_range = left;
                    } else {
                        // The request straddles the split: converge the
                        // tails of both forks.
                        let mut tails = Vec::new();
                        collect_tails(module, store, first(undef.node), &mut tails);
                        collect_tails(module, store, nth(undef.node, 1), &mut tails);
                        let writes = vec![true; tails.len()];
                        let converge = module.make_converge(tails, writes);
                        module.garbage.push(converge);
                        module.op_arena[converge].index =
                            module.op_arena[at].index.saturating_sub(1);
                        allocate_node_links(module, store, converge);

                        let merged = first(converge);
                        let merged_id = store.link_id(module, merged);
                        store.links[id as usize].undef = Some(merged);
                        store.links[id as usize].next = Some(merged_id);
                        store.links[merged_id as usize].prev = Some(id);
                        new_nodes.push(converge);
                        last_write = Some(merged);
                        break;
                    }
                } else {
                    // Fully in the remainder: follow the rest fork.
                    id = store.link_id(module, nth(undef.node, 1));
                    let right = current_range.difference(&left);
                    current_range = right;
                }
            } else if matches!(module.op_arena[undef.node].kind, NodeKind::Converge { .. }) {
                // Converges reset subrange tracking.
                current_range = MultiSubrange::all();
            }
        }
        if let Some(next) = store.links[id as usize].next {
            id = next;
        }
        let link = &store.links[id as usize];
        if link.next.is_none() && link.child_chains.is_empty() {
            break;
        }
    }

    last_write.unwrap_or_else(|| {
        assert!(
            store.links[id as usize].undef.is_none(),
            "chain tail still has a consumer"
        );
        store.links[id as usize].def
    })
}

struct LinkCtx<'a> {
    store: &'a mut LinkStore,
    new_nodes: &'a mut Vec<Handle<Node>>,
    do_ssa: bool,
}

impl LinkCtx<'_> {
    /// Registers `node` as the writer of `parm`, retargeting to the
    /// newest revision first when the value was already written.
    fn add_write(
        &mut self,
        module: &mut IrModule,
        node: Handle<Node>,
        parm: &mut Ref,
        index: u32,
        requested: ImageSubrange,
    ) {
        assert!(!matches!(
            module.op_arena[parm.node].kind,
            NodeKind::Garbage
        ));
        if module.op_arena[parm.node].links.is_none() {
            debug_assert!(self.do_ssa);
            return;
        }

        let id = self.store.link_id(module, *parm);
        if let Some(old) = self.store.links[id as usize].undef {
            assert!(self.do_ssa, "write-after-write outside the SSA pass");
            assert!(
                module.op_arena[node].index >= module.op_arena[old.node].index,
                "writes must arrive in source order"
            );
            *parm = walk_writes(module, self.store, *parm, requested, node, self.new_nodes);
        }
        let id = self.store.link_id(module, *parm);
        self.store.links[id as usize].undef = Some(Ref::new(node, index));
    }

    /// Registers `node` as a reader of `parm`, retargeting to the
    /// newest revision when a chronologically earlier write exists.
    fn add_read(&mut self, module: &mut IrModule, node: Handle<Node>, parm: &mut Ref, index: u32) {
        assert!(!matches!(
            module.op_arena[parm.node].kind,
            NodeKind::Garbage
        ));
        if module.op_arena[parm.node].links.is_none() {
            debug_assert!(self.do_ssa);
            return;
        }

        let id = self.store.link_id(module, *parm);
        if let Some(undef) = self.store.links[id as usize].undef {
            if module.op_arena[node].index > module.op_arena[undef.node].index {
                assert!(self.do_ssa, "stale read outside the SSA pass");
                *parm = walk_writes(
                    module,
                    self.store,
                    *parm,
                    ImageSubrange::all(),
                    node,
                    self.new_nodes,
                );
            }
        }
        let id = self.store.link_id(module, *parm);
        let mut reads = self.store.links[id as usize].reads;
        reads.append(&mut self.store.pass_reads, Ref::new(node, index));
        self.store.links[id as usize].reads = reads;
    }

    /// Continues the chain of `src` into result `output_idx` of `node`.
    fn add_result(&mut self, module: &IrModule, node: Handle<Node>, output_idx: u32, src: Ref) {
        if module.op_arena[src.node].links.is_none() {
            debug_assert!(self.do_ssa);
            return;
        }
        let src_id = self.store.link_id(module, src);
        let out_id = self.store.link_id(module, Ref::new(node, output_idx));
        self.store.links[src_id as usize].next = Some(out_id);
        self.store.links[out_id as usize].prev = Some(src_id);
    }
}

/// Populates the links a node contributes, in source order.
pub fn process_node_links(
    module: &mut IrModule,
    store: &mut LinkStore,
    node: Handle<Node>,
    new_nodes: &mut Vec<Handle<Node>>,
    do_ssa: bool,
) {
    let mut ctx = LinkCtx {
        store,
        new_nodes,
        do_ssa,
    };

    match &module.op_arena[node].kind {
        NodeKind::Constant { .. }
        | NodeKind::Placeholder
        | NodeKind::MathBinary { .. }
        | NodeKind::Extract { .. }
        | NodeKind::AcquireNextImage { .. }
        | NodeKind::Garbage => {}

        NodeKind::Construct { args } => {
            // The construct consumes its prototype and field values.
            let args = args.clone();
            let is_array = matches!(
                module.types[module.op_arena[node].result_types[0]].inner,
                TypeInner::Array { .. }
            );
            for (i, parm) in args.iter().enumerate() {
                if let Some(id) = ctx.store.try_link_id(module, *parm) {
                    ctx.store.links[id as usize].undef = Some(Ref::new(node, i as u32));
                } else {
                    debug_assert!(do_ssa);
                }
            }
            if is_array {
                // Array elements continue into the composite.
                let out = ctx.store.link_id(module, first(node));
                for parm in args.iter().skip(1) {
                    if let Some(id) = ctx.store.try_link_id(module, *parm) {
                        ctx.store.links[id as usize].next = Some(out);
                    }
                }
            }
        }

        NodeKind::Splice(splice) => {
            let live_signal = splice
                .rel_acq
                .as_ref()
                .is_some_and(|signal| signal.borrow().is_armed());
            let mut src = splice.src.clone();
            if live_signal {
                // An armed acquire is a chain break: every result is a
                // fresh def carrying a stored value.
            } else {
                for (i, parm) in src.iter_mut().enumerate() {
                    ctx.add_write(module, node, parm, i as u32, ImageSubrange::all());
                    ctx.add_result(module, node, i as u32, *parm);
                }
                match &mut module.op_arena[node].kind {
                    NodeKind::Splice(splice) => splice.src = src,
                    _ => unreachable!(),
                }
            }
        }

        NodeKind::Call { args } => {
            let mut args = args.clone();
            let fn_ty = module.type_of(args[0]);
            let param_tys: Vec<_> = module.types[fn_ty]
                .inner
                .fn_args()
                .expect("call of a non-function value")
                .to_vec();
            for i in 1..args.len() {
                let arg_ty = param_tys[i - 1];
                match module.types[arg_ty].inner {
                    TypeInner::Imbued { access, .. } => {
                        let parm = &mut args[i];
                        if is_write_access(access) || access == Access::Consume {
                            ctx.add_write(module, node, parm, i as u32, ImageSubrange::all());
                        }
                        if !is_write_access(access) && access != Access::Consume {
                            ctx.add_read(module, node, parm, i as u32);
                        }
                    }
                    _ => unreachable!("call parameters must be imbued"),
                }
            }
            match &mut module.op_arena[node].kind {
                NodeKind::Call { args: stored } => *stored = args.clone(),
                _ => unreachable!(),
            }
            // Each result continues the chain of the argument it
            // aliases.
            let result_tys = module.op_arena[node].result_types.clone();
            for (index, ret_ty) in result_tys.iter().enumerate() {
                let ref_idx = match module.types[*ret_ty].inner {
                    TypeInner::Aliased { ref_idx, .. } => ref_idx,
                    _ => unreachable!("call results must alias a parameter"),
                };
                ctx.add_result(module, node, index as u32, args[ref_idx as usize]);
            }
        }

        NodeKind::Slice { .. } => {
            let requested = slice_subrange(module, node);
            let mut image = module.op_arena[node].slice_image();
            ctx.add_write(module, node, &mut image, 0, requested);
            match &mut module.op_arena[node].kind {
                NodeKind::Slice { args } => args[0] = image,
                _ => unreachable!(),
            }
            // Both results are fresh defs; the slice registers itself
            // as a child chain of its parent image.
            if module.op_arena[image.node].links.is_some() {
                let parent = ctx.store.link_id(module, image);
                let child = ctx.store.link_id(module, first(node));
                let mut chains = ctx.store.links[parent as usize].child_chains;
                chains.append(&mut ctx.store.child_chains, child);
                ctx.store.links[parent as usize].child_chains = chains;
            } else {
                debug_assert!(do_ssa);
            }
        }

        NodeKind::Converge { diverged, write } => {
            let mut diverged = diverged.clone();
            let write = write.clone();
            // The merged value continues the first diverged chain.
            if let Some(id) = ctx.store.try_link_id(module, diverged[0]) {
                let out = ctx.store.link_id(module, first(node));
                ctx.store.links[id as usize].next = Some(out);
                ctx.store.links[out as usize].prev = Some(id);
            }
            for (i, parm) in diverged.iter_mut().enumerate() {
                if write[i] {
                    ctx.add_write(module, node, parm, i as u32, ImageSubrange::all());
                } else {
                    ctx.add_read(module, node, parm, i as u32);
                }
            }
            match &mut module.op_arena[node].kind {
                NodeKind::Converge {
                    diverged: stored, ..
                } => *stored = diverged,
                _ => unreachable!(),
            }
        }
    }
}

/// Stamps every link of every chain with its ultimate root definition.
pub fn build_urdef(module: &IrModule, store: &mut LinkStore, node: Handle<Node>) {
    let Some(base) = module.op_arena[node].links else {
        return;
    };
    for i in 0..module.op_arena[node].result_count() {
        let id = base + i as u32;
        if store.links[id as usize].urdef.is_some() {
            continue;
        }
        if store.links[id as usize].prev.is_none() {
            let head_def = store.links[id as usize].def;
            let mut cursor = Some(id);
            while let Some(c) = cursor {
                store.links[c as usize].urdef = Some(head_def);
                cursor = store.links[c as usize].next;
            }
        }
    }
}

/// Builds links for a working set of nodes in order. Converges created
/// by SSA rewrites are appended to the set.
pub fn build_links(
    module: &mut IrModule,
    store: &mut LinkStore,
    working_set: &mut Vec<Handle<Node>>,
    do_ssa: bool,
) {
    for &node in working_set.iter() {
        allocate_node_links(module, store, node);
    }
    let mut new_nodes = Vec::new();
    for i in 0..working_set.len() {
        let node = working_set[i];
        process_node_links(module, store, node, &mut new_nodes, do_ssa);
    }
    working_set.append(&mut new_nodes);
    for &node in working_set.iter() {
        build_urdef(module, store, node);
    }
}

/// Builds provisional links over a whole module, in source order, with
/// SSA rewriting enabled. This resolves write-after-write and diverged
/// subresource uses before the real link pass; the links themselves
/// are discarded.
pub fn implicit_linking(module: &mut IrModule, scratch: &mut LinkStore) {
    scratch.clear();
    let mut set = module.op_arena.handles();
    set.sort_by_key(|&h| module.op_arena[h].index);
    build_links(module, scratch, &mut set, true);
}

/// Enumerates chain heads: links without a predecessor. Also checks
/// chain integrity.
pub fn collect_chains(
    module: &IrModule,
    store: &LinkStore,
    nodes: &[Handle<Node>],
) -> Vec<LinkId> {
    let mut chains = Vec::new();
    for &node in nodes {
        let Some(base) = module.op_arena[node].links else {
            continue;
        };
        for i in 0..module.op_arena[node].result_count() {
            let id = base + i as u32;
            match store.links[id as usize].prev {
                None => chains.push(id),
                Some(prev) => assert_eq!(
                    store.links[prev as usize].next,
                    Some(id),
                    "chain link prev/next mismatch"
                ),
            }
        }
    }
    chains
}
