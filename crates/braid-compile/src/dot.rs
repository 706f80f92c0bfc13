//! Graphviz dump of the working set, for diagnostics.
//!
//! One node per row with an HTML-like label table: result ports,
//! kind, argument ports. Constants render inline, placeholders as
//! `?`. Splice and slice edges can be bridged to show the dataflow
//! they forward.

use std::fmt::Write;

use braid_ir::{ConstantValue, Handle, IrModule, Node, NodeKind, Ref, TypeInner};

fn type_label(module: &IrModule, node: Handle<Node>, index: usize) -> String {
    let ty = module.op_arena[node].result_types[index];
    match &module.types[ty].inner {
        TypeInner::Integer { width } => format!("u{}", u32::from(*width) * 8),
        TypeInner::Memory => "mem".into(),
        TypeInner::Array { len, .. } => format!("array[{len}]"),
        TypeInner::Image => "image".into(),
        TypeInner::Buffer => "buffer".into(),
        TypeInner::Swapchain => "swapchain".into(),
        TypeInner::Imbued { .. } => "imbued".into(),
        TypeInner::Aliased { ref_idx, .. } => format!("~{ref_idx}"),
        TypeInner::OpaqueFn { .. } => "fn".into(),
        TypeInner::ShaderFn { .. } => "shader".into(),
    }
}

fn constant_label(value: &ConstantValue) -> String {
    match value {
        ConstantValue::U32(v) => v.to_string(),
        ConstantValue::U64(v) => v.to_string(),
        _ => "&lt;mem&gt;".into(),
    }
}

fn skip_node(module: &IrModule, node: Handle<Node>, bridge_splices: bool, bridge_slices: bool) -> bool {
    match &module.op_arena[node].kind {
        NodeKind::Garbage | NodeKind::Placeholder => true,
        NodeKind::Constant { .. } => true,
        NodeKind::Splice(_) => bridge_splices,
        NodeKind::Slice { .. } => bridge_slices,
        _ => false,
    }
}

/// Resolves an argument through bridged splice/slice nodes.
fn bridge(module: &IrModule, arg: Ref, bridge_splices: bool, bridge_slices: bool) -> Ref {
    let mut arg = arg;
    loop {
        match &module.op_arena[arg.node].kind {
            NodeKind::Splice(splice) if bridge_splices && !splice.src.is_empty() => {
                arg = splice.src[arg.index as usize];
            }
            NodeKind::Slice { .. } if bridge_slices => {
                arg = module.op_arena[arg.node].slice_image();
            }
            _ => return arg,
        }
    }
}

/// Renders the working set as a Graphviz `digraph`.
pub fn dump_graph(
    module: &IrModule,
    nodes: &[Handle<Node>],
    bridge_splices: bool,
    bridge_slices: bool,
) -> String {
    let mut out = String::new();
    out.push_str("digraph braid {\n");
    out.push_str("rankdir=\"TB\"\nnewrank = true\nnode [shape = rectangle width = 0 height = 0 margin = 0]\n");

    for &node in nodes {
        if skip_node(module, node, bridge_splices, bridge_slices) {
            continue;
        }
        let n = &module.op_arena[node];

        let _ = write!(out, "n{} [label=<\n", node.index());
        out.push_str("<TABLE BORDER=\"0\" CELLBORDER=\"1\" CELLSPACING=\"0\"><TR>\n");

        if let Some(debug) = &n.debug_info {
            for name in &debug.result_names {
                let _ = write!(out, "<TD>%{name}</TD>");
            }
        }
        for i in 0..n.result_count() {
            let _ = write!(
                out,
                "<TD PORT=\"r{i}\"><FONT FACE=\"Courier New\">{}</FONT></TD>",
                type_label(module, node, i)
            );
        }
        let _ = write!(out, "<TD>{}</TD>", n.kind.name());
        for (i, arg) in n.args().iter().enumerate() {
            let cell = match &module.op_arena[arg.node].kind {
                NodeKind::Constant { value } => constant_label(value),
                NodeKind::Placeholder => "?".into(),
                _ => "&bull;".into(),
            };
            let _ = write!(out, "<TD PORT=\"a{i}\">{cell}</TD>");
        }
        out.push_str("</TR></TABLE>>];\n");

        for (i, &arg) in n.args().iter().enumerate() {
            if matches!(
                module.op_arena[arg.node].kind,
                NodeKind::Constant { .. } | NodeKind::Placeholder
            ) {
                continue;
            }
            let resolved = bridge(module, arg, bridge_splices, bridge_slices);
            let color = if resolved == arg { "" } else { " [color=red]" };
            let _ = writeln!(
                out,
                "n{}:r{} -> n{}:a{}{color}",
                resolved.node.index(),
                resolved.index,
                node.index(),
                i
            );
        }
    }

    out.push_str("}\n");
    out
}
