//! Queue-domain inference and pass partitioning.

use std::ops::Range;

use braid_ir::{DomainMask, Handle, IrModule, Node};

use crate::link::{LinkId, LinkStore};
use crate::schedule::ScheduledItem;

/// Propagates a domain into one node of a chain.
///
/// A node that already carries a concrete domain updates the running
/// `last_domain`; an undecided node adopts the propagated domain, its
/// own requirement, or their intersection.
fn propagate_domain(
    module: &IrModule,
    scheduled: &mut [ScheduledItem],
    last_domain: &mut DomainMask,
    node: Handle<Node>,
) {
    let Some(si) = module.op_arena[node].scheduled_item else {
        return;
    };
    let sched_domain = &mut scheduled[si as usize].scheduled_domain;

    if *sched_domain != DomainMask::ANY {
        *last_domain = *sched_domain;
        return;
    }

    let required = module.op_arena[node]
        .scheduling_info
        .map(|info| info.required_domains);
    match (last_domain.is_resolved(), required) {
        (true, None) => *sched_domain = *last_domain,
        (false, Some(required)) => *sched_domain = required.first_domain(),
        (true, Some(required)) => {
            let intersection = last_domain.intersect(required);
            *sched_domain = if intersection.is_empty() {
                required.first_domain()
            } else {
                intersection
            };
        }
        (false, None) => {}
    }
}

fn forward_pass(
    module: &IrModule,
    store: &LinkStore,
    chains: &[LinkId],
    scheduled: &mut [ScheduledItem],
    last_domain: &mut DomainMask,
) {
    for &head in chains {
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            let link = &store.links[id as usize];
            propagate_domain(module, scheduled, last_domain, link.def.node);
            for read in link.reads.as_slice(&store.pass_reads) {
                propagate_domain(module, scheduled, last_domain, read.node);
            }
            if let Some(undef) = link.undef {
                propagate_domain(module, scheduled, last_domain, undef.node);
            }
            cursor = link.next;
        }
    }
}

fn backward_pass(
    module: &IrModule,
    store: &LinkStore,
    chains: &[LinkId],
    scheduled: &mut [ScheduledItem],
    last_domain: &mut DomainMask,
) {
    for &head in chains {
        *last_domain = DomainMask::DEVICE;

        let mut tail = head;
        while let Some(next) = store.links[tail as usize].next {
            tail = next;
        }
        let mut cursor = Some(tail);
        while let Some(id) = cursor {
            let link = &store.links[id as usize];
            if let Some(undef) = link.undef {
                propagate_domain(module, scheduled, last_domain, undef.node);
            }
            for read in link.reads.as_slice(&store.pass_reads) {
                propagate_domain(module, scheduled, last_domain, read.node);
            }
            propagate_domain(module, scheduled, last_domain, link.def.node);
            cursor = link.prev;
        }
    }
}

/// Two-pass domain inference across chains.
///
/// Forward then backward propagation; still-undecided items fall back
/// to graphics; a second forward/backward sweep finalizes neighbors of
/// the fixed-up items.
pub fn queue_inference(
    module: &IrModule,
    store: &LinkStore,
    chains: &[LinkId],
    scheduled: &mut [ScheduledItem],
) {
    let mut last_domain = DomainMask::DEVICE;

    forward_pass(module, store, chains, scheduled, &mut last_domain);
    backward_pass(module, store, chains, scheduled, &mut last_domain);

    for item in scheduled.iter_mut() {
        if item.scheduled_domain == DomainMask::DEVICE
            || item.scheduled_domain == DomainMask::ANY
        {
            item.scheduled_domain = DomainMask::GRAPHICS;
        }
    }

    forward_pass(module, store, chains, scheduled, &mut last_domain);
    backward_pass(module, store, chains, scheduled, &mut last_domain);
}

/// The partitioned schedule: indices into the scheduled-item list,
/// bucketed per queue with relative order preserved.
#[derive(Clone, Debug)]
pub struct Partitions {
    pub order: Vec<u32>,
    pub transfer: Range<usize>,
    pub compute: Range<usize>,
    pub graphics: Range<usize>,
}

impl Default for Partitions {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            transfer: 0..0,
            compute: 0..0,
            graphics: 0..0,
        }
    }
}

/// Buckets scheduled items into transfer, compute, and graphics spans.
/// An item whose mask carries several queue bits lands in each of
/// them.
pub fn pass_partitioning(scheduled: &[ScheduledItem]) -> Partitions {
    let mut partitions = Partitions::default();
    let buckets = [
        DomainMask::TRANSFER,
        DomainMask::COMPUTE,
        DomainMask::GRAPHICS,
    ];
    let mut bounds = [0usize; 4];
    for (b, &bucket) in buckets.iter().enumerate() {
        for (i, item) in scheduled.iter().enumerate() {
            if !item.scheduled_domain.intersect(bucket).is_empty() {
                partitions.order.push(i as u32);
            }
        }
        bounds[b + 1] = partitions.order.len();
    }
    partitions.transfer = bounds[0]..bounds[1];
    partitions.compute = bounds[1]..bounds[2];
    partitions.graphics = bounds[2]..bounds[3];
    partitions
}
