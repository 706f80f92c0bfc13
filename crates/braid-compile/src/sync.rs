//! Synchronization derivation from access-annotated arguments.
//!
//! Writes stamp their link with the use they require. Concurrent
//! reads of one link merge into a single barrier: access and stage
//! bits are OR-ed and one layout is chosen for the whole group, so no
//! read-to-read dependency is ever emitted.

use braid_ir::{
    access_to_usage, is_readonly_access, is_storage_access, is_transfer_access, is_write_access,
    to_use, Access, Handle, ImageLayout, ImageUsage, IrModule, Node, NodeKind, QueueResourceUse,
    Ref, TypeInner,
};

use crate::link::{LinkId, LinkStore};
use crate::schedule::ScheduledItem;

/// The access a call performs on its argument at `index`.
fn call_arg_access(module: &IrModule, call: Handle<Node>, index: u32) -> Access {
    let args = match &module.op_arena[call].kind {
        NodeKind::Call { args } => args,
        _ => unreachable!("argument access of a non-call"),
    };
    let fn_ty = module.type_of(args[0]);
    let param_ty = module.types[fn_ty]
        .inner
        .fn_args()
        .expect("call of a non-function value")[index as usize - 1];
    match module.types[param_ty].inner {
        TypeInner::Imbued { access, .. } => access,
        _ => unreachable!("call parameters must be imbued"),
    }
}

/// Computes the merged use of every read on a link.
///
/// Layout selection: `ReadOnlyOptimal` by default;
/// `TransferSrcOptimal` when only transfer-class reads occur;
/// `General` when any storage read occurs or transfer reads mix with
/// plain read-only ones.
fn merged_read_use(module: &IrModule, reads: &[Ref]) -> QueueResourceUse {
    let mut dst_use = QueueResourceUse {
        layout: ImageLayout::ReadOnlyOptimal,
        ..Default::default()
    };

    let mut need_read_only = false;
    let mut need_transfer = false;
    let mut need_general = false;

    for read in reads {
        let access = match module.op_arena[read.node].kind {
            NodeKind::Call { .. } => call_arg_access(module, read.node, read.index),
            NodeKind::Converge { .. } => continue,
            _ => unreachable!("read by a non-consuming node"),
        };

        if is_transfer_access(access) {
            need_transfer = true;
        }
        if is_storage_access(access) {
            need_general = true;
        }
        if is_readonly_access(access) {
            need_read_only = true;
        }
        let use_ = to_use(access);
        dst_use.access |= use_.access;
        dst_use.stages |= use_.stages;
    }

    if need_transfer && !need_read_only {
        dst_use.layout = ImageLayout::TransferSrcOptimal;
    }
    if need_general || (need_transfer && need_read_only) {
        dst_use.layout = ImageLayout::General;
    }

    dst_use
}

/// Derives per-link synchronization for every node.
pub fn build_sync(
    module: &IrModule,
    store: &mut LinkStore,
    scheduled: &[ScheduledItem],
    nodes: &[Handle<Node>],
) {
    for &node in nodes {
        match &module.op_arena[node].kind {
            NodeKind::Call { args } => {
                for (i, &parm) in args.iter().enumerate().skip(1) {
                    let access = call_arg_access(module, node, i as u32);
                    let id = store.link_id(module, parm);

                    if is_write_access(access) {
                        assert!(
                            store.links[id as usize].undef_sync.is_none(),
                            "second write sync on one link"
                        );
                        store.links[id as usize].undef_sync = Some(to_use(access));
                    } else if store.links[id as usize].read_sync.is_none() {
                        let reads = store.links[id as usize]
                            .reads
                            .as_slice(&store.pass_reads)
                            .to_vec();
                        let merged = merged_read_use(module, &reads);
                        store.links[id as usize].read_sync = Some(merged);
                    }
                }
            }

            NodeKind::Splice(splice) => {
                let node_si = module.op_arena[node]
                    .scheduled_item
                    .expect("kept splice must be scheduled");
                let node_domain = scheduled[node_si as usize].scheduled_domain;

                for &parm in &splice.src {
                    let id = store.link_id(module, parm);
                    if let Some(dst_access) = splice.dst_access {
                        store.links[id as usize].undef_sync = Some(to_use(dst_access));
                    } else if let Some(parm_si) = module.op_arena[parm.node].scheduled_item {
                        if scheduled[parm_si as usize].scheduled_domain != node_domain {
                            // Crossing queues with no declared future
                            // use: conservatively everything.
                            store.links[id as usize].undef_sync =
                                Some(to_use(Access::MemoryRW));
                        }
                    }
                }
            }

            _ => {
                if let Some(si) = module.op_arena[node].scheduled_item {
                    let domain = scheduled[si as usize].scheduled_domain;
                    for arg in module.op_arena[node].args() {
                        if let Some(arg_si) = module.op_arena[arg.node].scheduled_item {
                            assert_eq!(
                                scheduled[arg_si as usize].scheduled_domain,
                                domain,
                                "scheduled node and its argument ended up on \
                                 different queues"
                            );
                        }
                    }
                }
            }
        }
    }
}

/// Folds every access along a chain (and its child chains) into the
/// usage the backing image must be created with.
pub fn compute_usage(
    module: &IrModule,
    store: &LinkStore,
    head: LinkId,
) -> ImageUsage {
    let mut usage = ImageUsage::NONE;

    let mut cursor = Some(head);
    while let Some(id) = cursor {
        let link = &store.links[id as usize];
        for read in link.reads.as_slice(&store.pass_reads) {
            if matches!(module.op_arena[read.node].kind, NodeKind::Call { .. }) {
                access_to_usage(
                    &mut usage,
                    call_arg_access(module, read.node, read.index),
                );
            }
        }
        if let Some(undef) = link.undef {
            if matches!(module.op_arena[undef.node].kind, NodeKind::Call { .. }) {
                access_to_usage(
                    &mut usage,
                    call_arg_access(module, undef.node, undef.index),
                );
            }
        }
        for &child in link.child_chains.as_slice(&store.child_chains) {
            usage |= compute_usage(module, store, child);
        }
        cursor = link.next;
    }

    usage
}
