//! The braid render-graph compiler.
//!
//! Takes externally held refs into an [`IrModule`] and lowers their
//! transitive closure to a scheduled, synchronized, queue-partitioned
//! execution plan: garbage collection and implicit linking per module,
//! reachability, chain-link construction, splice elimination and slice
//! bridging, validation, reification, intra-queue scheduling, queue
//! inference, partitioning, and synchronization derivation.

mod dot;
mod eval;
pub mod link;
mod reach;
mod reify;
mod rewrite;
mod schedule;
mod queue;
mod sync;
mod validate;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use braid_ir::{
    CompileError, ConstantValue, ExtNode, GraphError, Handle, ImageUsage, IrModule, Node,
    NodeKind, Ref, SignalStatus,
};

pub use dot::dump_graph;
pub use link::{ChainLink, LinkId, LinkStore};
pub use queue::Partitions;
pub use rewrite::{DeferredSplices, Replace, Replacer};
pub use schedule::ScheduledItem;

/// Diagnostic hooks the compiler invokes. All policy is fixed; these
/// only observe.
#[derive(Clone, Default)]
pub struct DiagnosticCallbacks {
    /// Called with every graph diagnostic before it is returned.
    pub on_error: Option<Rc<dyn Fn(&GraphError)>>,
}

impl std::fmt::Debug for DiagnosticCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticCallbacks")
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Options recognized by [`Compiler::compile`].
#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    pub callbacks: DiagnosticCallbacks,
}

/// The compiled plan handed to an executor: scheduled items plus their
/// per-queue partition spans.
#[derive(Clone, Debug)]
pub struct ExecutablePlan {
    pub items: Vec<ScheduledItem>,
    pub partitions: Partitions,
}

/// The render-graph compiler. Holds the session state of the last
/// compile for inspection and execution.
#[derive(Debug, Default)]
pub struct Compiler {
    nodes: Vec<Handle<Node>>,
    ref_nodes: Vec<Handle<Node>>,
    depnodes: Vec<Rc<ExtNode>>,
    store: LinkStore,
    chains: Vec<LinkId>,
    scheduled: Vec<ScheduledItem>,
    partitions: Partitions,
    deferred_splices: DeferredSplices,
    pending_splice_signals: HashMap<Handle<Node>, u32>,
    callbacks: DiagnosticCallbacks,
}

impl Compiler {
    /// A fresh compiler.
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.nodes.clear();
        self.ref_nodes.clear();
        // Dropping held references may mark nodes as potential
        // garbage; this must happen while the module is unborrowed.
        self.depnodes.clear();
        self.store.clear();
        self.chains.clear();
        self.scheduled.clear();
        self.partitions = Partitions::default();
        self.deferred_splices.clear();
        self.pending_splice_signals.clear();
    }

    fn report(&self, error: CompileError) -> CompileError {
        if let (CompileError::Graph(graph), Some(hook)) = (&error, &self.callbacks.on_error) {
            (hook.as_ref())(graph);
        }
        error
    }

    /// Compiles the graphs reachable from `refs`.
    pub fn compile(
        &mut self,
        module: &Rc<RefCell<IrModule>>,
        refs: &[Rc<ExtNode>],
        options: &CompileOptions,
    ) -> Result<(), CompileError> {
        self.reset();
        self.callbacks = options.callbacks.clone();

        for ext in refs {
            self.ref_nodes.push(ext.node());
        }

        // Gather the dependency closure of the submitted refs; the
        // references move into the compiler until the next compile.
        let mut work: Vec<Rc<ExtNode>> = refs.to_vec();
        while let Some(ext) = work.pop() {
            work.append(&mut ext.deps.borrow_mut());
            self.depnodes.push(ext);
        }
        self.depnodes
            .sort_by_key(|ext| Rc::as_ptr(ext) as usize);
        self.depnodes
            .dedup_by_key(|ext| Rc::as_ptr(ext) as usize);

        let mut guard = module.borrow_mut();
        let module = &mut *guard;

        // Session annotations from a previous compile are void.
        for handle in module.op_arena.handles() {
            module.op_arena[handle].links = None;
            module.op_arena[handle].scheduled_item = None;
        }

        module.collect_garbage();

        let mut scratch = LinkStore::default();
        link::implicit_linking(module, &mut scratch);
        drop(scratch);

        // A splice nobody waits on does not need its signal; detached,
        // it becomes inert and elimination removes it.
        for ext in &self.depnodes {
            if Rc::strong_count(ext) == 1
                && ext.acqrel.borrow().status == SignalStatus::Disarmed
            {
                let node = ext.node();
                match &mut module.op_arena[node].kind {
                    NodeKind::Splice(splice) => splice.rel_acq = None,
                    kind => unreachable!(
                        "externally referenced {} node without a seam",
                        kind.name()
                    ),
                }
            }
        }

        self.nodes = reach::collect_reachable(module, &self.ref_nodes);
        self.store.clear();
        link::build_links(module, &mut self.store, &mut self.nodes, false);

        // Eliminate inert splices and bridge redundant slices, then
        // rebuild the graph views over the rewritten nodes.
        let mut replacer = rewrite::Replacer::default();
        rewrite::eliminate_splices_bridge_slices(
            module,
            &self.store,
            &self.nodes,
            &mut replacer,
            &mut self.deferred_splices,
            &mut self.pending_splice_signals,
        );
        replacer.apply(module, &self.nodes);

        // Nodes rewritten out of the graph must not keep link indices
        // into the rebuilt store; inspection resolves them directly.
        for handle in module.op_arena.handles() {
            module.op_arena[handle].links = None;
        }

        self.nodes = reach::collect_reachable(module, &self.ref_nodes);
        self.store.clear();
        link::build_links(module, &mut self.store, &mut self.nodes, false);

        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "compiled graph:\n{}",
                dot::dump_graph(module, &self.nodes, false, false)
            );
        }

        validate::validate_read_undefined(module, &self.store, &self.nodes)
            .map_err(|e| self.report(e))?;
        validate::validate_duplicated_resource_ref(module, &self.store, &self.nodes)
            .map_err(|e| self.report(e))?;

        self.chains = link::collect_chains(module, &self.store, &self.nodes);
        reify::reify_inference(module, &self.store, &self.nodes);

        self.scheduled = schedule::schedule_intra_queue(module, &self.store, &self.nodes)
            .map_err(|e| self.report(e))?;
        queue::queue_inference(module, &self.store, &self.chains, &mut self.scheduled);
        self.partitions = queue::pass_partitioning(&self.scheduled);

        sync::build_sync(module, &mut self.store, &self.scheduled, &self.nodes);

        debug!(
            "scheduled {} items ({} transfer, {} compute, {} graphics)",
            self.scheduled.len(),
            self.partitions.transfer.len(),
            self.partitions.compute.len(),
            self.partitions.graphics.len()
        );

        Ok(())
    }

    /// Compiles and bundles the result into an executable plan.
    pub fn link(
        &mut self,
        module: &Rc<RefCell<IrModule>>,
        refs: &[Rc<ExtNode>],
        options: &CompileOptions,
    ) -> Result<ExecutablePlan, CompileError> {
        self.compile(module, refs, options)?;
        Ok(ExecutablePlan {
            items: self.scheduled.clone(),
            partitions: self.partitions.clone(),
        })
    }

    /// Chain heads of the last compile.
    pub fn get_use_chains(&self) -> &[LinkId] {
        &self.chains
    }

    /// A chain link by id.
    pub fn chain_link(&self, id: LinkId) -> &ChainLink {
        &self.store.links[id as usize]
    }

    /// The link of one node result.
    pub fn link_of<'a>(&'a self, module: &IrModule, r: Ref) -> &'a ChainLink {
        self.store.link_of(module, r)
    }

    /// The shared read-group storage.
    pub fn pass_reads(&self) -> &[Ref] {
        &self.store.pass_reads
    }

    /// Scheduled items in schedule order.
    pub fn schedule(&self) -> &[ScheduledItem] {
        &self.scheduled
    }

    /// Per-queue partitioning of the schedule.
    pub fn partitions(&self) -> &Partitions {
        &self.partitions
    }

    /// Eliminated splices that still must signal, keyed by the node
    /// after which they fire.
    pub fn deferred_splices(&self) -> &DeferredSplices {
        &self.deferred_splices
    }

    /// Splice nodes with a signal still to fire in this plan.
    pub fn pending_splice_signals(&self) -> &HashMap<Handle<Node>, u32> {
        &self.pending_splice_signals
    }

    /// The reachable working set of the last compile.
    pub fn nodes(&self) -> &[Handle<Node>] {
        &self.nodes
    }

    /// Resolves a ref to the concrete value backing it, if derivable.
    pub fn get_value(&self, module: &IrModule, parm: Ref) -> Option<ConstantValue> {
        let root = match module.op_arena[parm.node].links {
            Some(base) => self.store.links[(base + parm.index) as usize]
                .urdef
                .unwrap_or(parm),
            None => parm,
        };
        resolve_value(module, root)
    }

    /// The image usage a chain implies, including its child chains.
    pub fn compute_usage(&self, module: &IrModule, head: LinkId) -> ImageUsage {
        sync::compute_usage(module, &self.store, head)
    }
}

fn resolve_value(module: &IrModule, r: Ref) -> Option<ConstantValue> {
    match &module.op_arena[r.node].kind {
        NodeKind::Constant { value } => Some(value.clone()),
        NodeKind::Construct { args } => resolve_value(module, args[0]),
        NodeKind::Splice(splice) => {
            let armed = splice
                .rel_acq
                .as_ref()
                .is_some_and(|s| s.borrow().status != SignalStatus::Disarmed);
            if armed {
                splice.values.get(r.index as usize).cloned().flatten()
            } else {
                splice
                    .src
                    .get(r.index as usize)
                    .and_then(|&src| resolve_value(module, src))
            }
        }
        NodeKind::AcquireNextImage { args } => eval::eval_swapchain(module, args[0])
            .and_then(|swp| swp.images.first().cloned())
            .map(ConstantValue::Image),
        NodeKind::MathBinary { .. } => eval::eval_u32(module, r).map(ConstantValue::U32),
        _ => None,
    }
}
