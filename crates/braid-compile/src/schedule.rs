//! Intra-queue topological scheduling.

use std::collections::HashMap;

use braid_ir::{CompileError, DomainMask, Handle, IrModule, Node, NodeKind};

use crate::link::LinkStore;

/// A node chosen to run, annotated with its final queue domain.
#[derive(Clone, Copy, Debug)]
pub struct ScheduledItem {
    pub node: Handle<Node>,
    pub scheduled_domain: DomainMask,
}

fn is_schedulable(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Construct { .. }
            | NodeKind::Call { .. }
            | NodeKind::MathBinary { .. }
            | NodeKind::Splice(_)
            | NodeKind::Converge { .. }
    )
}

/// Kahn's algorithm over the def/read/undef edges of every link.
///
/// Edges: `def → undef`, `def → read`, and `read → undef`, each only
/// when both endpoints are schedulable. Ties resolve LIFO, giving a
/// deterministic schedule. `Construct` nodes order their dependents
/// but are not emitted; definitions need no ordered execution.
pub fn schedule_intra_queue(
    module: &mut IrModule,
    store: &LinkStore,
    nodes: &[Handle<Node>],
) -> Result<Vec<ScheduledItem>, CompileError> {
    let mut schedule_items: Vec<Handle<Node>> = Vec::new();
    let mut node_to_schedule: HashMap<Handle<Node>, usize> = HashMap::new();
    for &node in nodes {
        if is_schedulable(&module.op_arena[node].kind) {
            node_to_schedule.insert(node, schedule_items.len());
            schedule_items.push(node);
        }
    }

    let size = schedule_items.len();
    let mut indegrees = vec![0usize; size];
    let mut adjacency = vec![0u8; size * size];

    for &node in nodes {
        let Some(base) = module.op_arena[node].links else {
            continue;
        };
        for i in 0..module.op_arena[node].result_count() {
            let link = &store.links[base as usize + i];
            let def_idx = node_to_schedule.get(&link.def.node).copied();

            if let Some(undef) = link.undef {
                if let (Some(&undef_idx), Some(def_idx)) =
                    (node_to_schedule.get(&undef.node), def_idx)
                {
                    indegrees[undef_idx] += 1;
                    adjacency[def_idx * size + undef_idx] += 1;
                }
            }
            for read in link.reads.as_slice(&store.pass_reads) {
                let Some(&read_idx) = node_to_schedule.get(&read.node) else {
                    continue;
                };
                // A read only depends on the def if something
                // schedulable produced it.
                if let Some(def_idx) = def_idx {
                    indegrees[read_idx] += 1;
                    adjacency[def_idx * size + read_idx] += 1;
                }
                if let Some(undef) = link.undef {
                    if let Some(&undef_idx) = node_to_schedule.get(&undef.node) {
                        indegrees[undef_idx] += 1;
                        adjacency[read_idx * size + undef_idx] += 1;
                    }
                }
            }
        }
    }

    let mut process_queue: Vec<usize> = (0..size).filter(|&i| indegrees[i] == 0).collect();
    let mut scheduled = Vec::new();

    while let Some(pop_idx) = process_queue.pop() {
        let node = schedule_items[pop_idx];
        if !matches!(module.op_arena[node].kind, NodeKind::Construct { .. }) {
            module.op_arena[node].scheduled_item = Some(scheduled.len() as u32);
            scheduled.push(ScheduledItem {
                node,
                scheduled_domain: DomainMask::ANY,
            });
        }
        for i in 0..size {
            if i == pop_idx {
                continue;
            }
            let weight = adjacency[pop_idx * size + i] as usize;
            if weight > 0 {
                indegrees[i] -= weight;
                if indegrees[i] == 0 {
                    process_queue.push(i);
                }
            }
        }
    }

    let unscheduled = indegrees.iter().filter(|&&d| d > 0).count();
    if unscheduled > 0 {
        return Err(CompileError::ScheduleCycle { unscheduled });
    }

    Ok(scheduled)
}
