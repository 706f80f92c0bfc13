//! Reachability: the transitive argument closure of the submitted
//! refs.

use braid_ir::{Handle, IrModule, Node};

/// Collects every node reachable from `roots` through argument edges.
///
/// Uses the node mark flag for the visited set and clears it before
/// returning.
pub fn collect_reachable(module: &mut IrModule, roots: &[Handle<Node>]) -> Vec<Handle<Node>> {
    let mut work_queue = Vec::new();
    let mut nodes = Vec::new();

    for &root in roots {
        if module.op_arena[root].flag == 0 {
            module.op_arena[root].flag = 1;
            work_queue.push(root);
        }
    }

    while let Some(node) = work_queue.pop() {
        let args: Vec<_> = module.op_arena[node].args().iter().map(|r| r.node).collect();
        for arg in args {
            if module.op_arena[arg].flag == 0 {
                module.op_arena[arg].flag = 1;
                work_queue.push(arg);
            }
        }
        nodes.push(node);
    }

    for &node in &nodes {
        module.op_arena[node].flag = 0;
    }

    nodes
}
