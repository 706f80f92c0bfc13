//! Diagnostics and the compile error surface.

use crate::arena::Handle;
use crate::node::Node;

/// Severity of a graph diagnostic.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Level {
    Warning,
    Error,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// A diagnostic anchored to one node of the graph.
#[derive(Clone, Debug)]
pub struct GraphError {
    pub level: Level,
    /// Arena slot of the offending node.
    pub node: u32,
    pub message: String,
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: node %{}: {}", self.level, self.node, self.message)
    }
}

impl std::error::Error for GraphError {}

/// Formats a diagnostic for a node, preferring its debug name over the
/// raw arena slot.
pub fn format_graph_message(
    level: Level,
    handle: Handle<Node>,
    node: &Node,
    text: &str,
) -> GraphError {
    let message = match node.debug_info.as_ref().and_then(|d| d.result_names.first()) {
        Some(name) => format!("{} ({}): {}", node.kind.name(), name, text),
        None => format!("{}: {}", node.kind.name(), text),
    };
    GraphError {
        level,
        node: handle.index() as u32,
        message,
    }
}

/// Errors returned by the compiler's fallible passes.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// A structural problem in the submitted graph.
    #[error("{0}")]
    Graph(#[from] GraphError),

    /// The dependency graph of schedulable nodes contains a cycle.
    #[error("cycle in execution graph ({unscheduled} nodes cannot be scheduled)")]
    ScheduleCycle { unscheduled: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use smallvec::smallvec;

    #[test]
    fn graph_error_display() {
        let node = Node::new(NodeKind::Placeholder, smallvec![], 0);
        let err = format_graph_message(
            Level::Error,
            Handle::from_index(3),
            &node,
            "tried to read something that was never written",
        );
        let text = err.to_string();
        assert!(text.contains("error"));
        assert!(text.contains("%3"));
        assert!(text.contains("never written"));
    }
}
