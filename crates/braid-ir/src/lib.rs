//! braid intermediate representation.
//!
//! An arena-based IR for dataflow programs over GPU resources. User
//! code forges nodes into an [`IrModule`]; the compiler in
//! `braid-compile` lowers the reachable graph to a scheduled,
//! synchronized, queue-partitioned plan.

pub mod access;
pub mod arena;
mod display;
mod domain;
mod error;
mod module;
mod node;
mod resource;
mod signal;
pub mod subrange;
mod types;

pub use access::{
    access_to_usage, is_framebuffer_attachment, is_readonly_access, is_storage_access,
    is_transfer_access, is_write_access, to_use, Access, AccessFlags, ImageLayout, ImageUsage,
    PipelineStages, QueueResourceUse,
};
pub use arena::{Handle, NodeArena, Span, TypeInterner};
pub use domain::DomainMask;
pub use error::{format_graph_message, CompileError, GraphError, Level};
pub use module::{BuiltinTypes, ExtNode, IrModule};
pub use node::{first, nth, BinaryOp, DebugInfo, Node, NodeKind, Ref, SchedulingInfo, SpliceData};
pub use resource::{
    BufferDesc, BufferHandle, ConstantValue, Format, ImageDesc, ImageHandle, ImageViewType,
    MemoryUsage, Samples, SwapchainDesc,
};
pub use signal::{Signal, SignalStatus};
pub use subrange::{ImageSubrange, MultiSubrange, REMAINING};
pub use types::{Bytes, Type, TypeInner};
