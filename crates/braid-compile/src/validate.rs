//! Graph-structural validation.

use std::collections::HashSet;

use braid_ir::{
    format_graph_message, BufferHandle, CompileError, ConstantValue, Handle, ImageHandle,
    IrModule, Level, Node, NodeKind, SignalStatus, TypeInner,
};

use crate::link::LinkStore;

fn link0<'a>(
    module: &IrModule,
    store: &'a LinkStore,
    node: Handle<Node>,
) -> &'a crate::link::ChainLink {
    let base = module.op_arena[node].links.expect("validated node has links");
    &store.links[base as usize]
}

/// Rejects reads of values that were declared but never written.
///
/// A construct only declares storage; its contents are undefined until
/// the first write. Reads hanging directly off a construct, or off a
/// run of splices that forward it unwritten, are errors.
pub fn validate_read_undefined(
    module: &IrModule,
    store: &LinkStore,
    nodes: &[Handle<Node>],
) -> Result<(), CompileError> {
    for &node in nodes {
        if !matches!(module.op_arena[node].kind, NodeKind::Construct { .. }) {
            continue;
        }
        let is_array = matches!(
            module.types[module.op_arena[node].result_types[0]].inner,
            TypeInner::Array { .. }
        );
        if is_array {
            continue;
        }

        let link = link0(module, store, node);
        if !link.reads.is_empty() {
            let offender = link.reads.as_slice(&store.pass_reads)[0];
            return Err(format_graph_message(
                Level::Error,
                offender.node,
                &module.op_arena[offender.node],
                "tried to read something that was never written",
            )
            .into());
        }
        if link.undef.is_none() {
            continue;
        }

        // Unravel splices that forward the unwritten value.
        let mut cursor = node;
        loop {
            let link = link0(module, store, cursor);
            if !link.reads.is_empty() {
                break;
            }
            match link.undef {
                Some(undef)
                    if matches!(module.op_arena[undef.node].kind, NodeKind::Splice(_)) =>
                {
                    cursor = undef.node;
                }
                _ => break,
            }
        }
        let link = link0(module, store, cursor);
        if !link.reads.is_empty() {
            let offender = link.reads.as_slice(&store.pass_reads)[0];
            return Err(format_graph_message(
                Level::Error,
                offender.node,
                &module.op_arena[offender.node],
                "tried to read something that was never written",
            )
            .into());
        }
    }

    Ok(())
}

fn duplicate_error(module: &IrModule, node: Handle<Node>) -> CompileError {
    format_graph_message(
        Level::Error,
        node,
        &module.op_arena[node],
        "tried to acquire something that was already known",
    )
    .into()
}

/// Rejects graphs that acquire the same concrete resource twice.
///
/// Collects concrete image and buffer handles and swapchain
/// identities from constructs and from armed acquire splices; any
/// repetition is an error.
pub fn validate_duplicated_resource_ref(
    module: &IrModule,
    store: &LinkStore,
    nodes: &[Handle<Node>],
) -> Result<(), CompileError> {
    let mut images: HashSet<ImageHandle> = HashSet::new();
    let mut buffers: HashSet<BufferHandle> = HashSet::new();
    let mut swapchains: HashSet<usize> = HashSet::new();

    for &node in nodes {
        match &module.op_arena[node].kind {
            NodeKind::Construct { args } => {
                let proto = match &module.op_arena[args[0].node].kind {
                    NodeKind::Constant { value } => value,
                    _ => continue,
                };
                let fresh = match proto {
                    ConstantValue::Image(desc) => {
                        desc.image.map_or(true, |handle| images.insert(handle))
                    }
                    ConstantValue::Buffer(desc) => {
                        desc.buffer.map_or(true, |handle| buffers.insert(handle))
                    }
                    ConstantValue::Swapchain(swp) => {
                        swapchains.insert(std::rc::Rc::as_ptr(swp) as usize)
                    }
                    _ => true,
                };
                if !fresh {
                    return Err(duplicate_error(module, node));
                }
            }

            NodeKind::Splice(splice) => {
                let armed = splice
                    .rel_acq
                    .as_ref()
                    .is_some_and(|s| s.borrow().status != SignalStatus::Disarmed);
                if !armed {
                    continue;
                }
                let base = module.op_arena[node].links.expect("linked splice");
                for (i, value) in splice.values.iter().enumerate() {
                    // Results nothing consumes don't claim their
                    // resource.
                    let link = &store.links[base as usize + i];
                    if link.undef.is_none() && link.reads.is_empty() && link.next.is_none() {
                        continue;
                    }
                    let fresh = match value {
                        Some(ConstantValue::Image(desc)) => {
                            desc.image.map_or(true, |handle| images.insert(handle))
                        }
                        Some(ConstantValue::Buffer(desc)) => {
                            desc.buffer.map_or(true, |handle| buffers.insert(handle))
                        }
                        Some(ConstantValue::Swapchain(swp)) => {
                            swapchains.insert(std::rc::Rc::as_ptr(swp) as usize)
                        }
                        _ => true,
                    };
                    if !fresh {
                        return Err(duplicate_error(module, node));
                    }
                }
            }

            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{build_links, LinkStore};
    use braid_ir::{first, Access, BufferDesc, Ref};

    fn linked(mut module: IrModule) -> (IrModule, LinkStore, Vec<Handle<Node>>) {
        let mut store = LinkStore::default();
        let mut set = module.op_arena.handles();
        set.sort_by_key(|&h| module.op_arena[h].index);
        build_links(&mut module, &mut store, &mut set, true);
        (module, store, set)
    }

    fn read_fn(module: &mut IrModule) -> Ref {
        let buffer_ty = module.builtins().buffer;
        let ty =
            module.make_opaque_fn_type("r", &[(buffer_ty, Access::TransferRead)], &[1], 0);
        Ref::new(module.make_placeholder(ty), 0)
    }

    fn write_fn(module: &mut IrModule) -> Ref {
        let buffer_ty = module.builtins().buffer;
        let ty =
            module.make_opaque_fn_type("w", &[(buffer_ty, Access::TransferWrite)], &[1], 1);
        Ref::new(module.make_placeholder(ty), 0)
    }

    #[test]
    fn read_of_never_written_buffer_is_rejected() {
        let mut module = IrModule::new();
        let r = read_fn(&mut module);
        let buf = module.make_construct_buffer(BufferDesc {
            size: Some(16),
            ..Default::default()
        });
        let _read = module.make_call(r, &[first(buf)]);

        let (module, store, nodes) = linked(module);
        let err = validate_read_undefined(&module, &store, &nodes).unwrap_err();
        assert!(err.to_string().contains("never written"));
    }

    #[test]
    fn written_buffer_passes() {
        let mut module = IrModule::new();
        let w = write_fn(&mut module);
        let r = read_fn(&mut module);
        let buf = module.make_construct_buffer(BufferDesc {
            size: Some(16),
            ..Default::default()
        });
        let written = module.make_call(w, &[first(buf)]);
        let _read = module.make_call(r, &[first(written)]);

        let (module, store, nodes) = linked(module);
        validate_read_undefined(&module, &store, &nodes).unwrap();
    }

    #[test]
    fn read_through_forwarding_splice_is_rejected() {
        let mut module = IrModule::new();
        let r = read_fn(&mut module);
        let buf = module.make_construct_buffer(BufferDesc {
            size: Some(16),
            ..Default::default()
        });
        let splice = module.make_splice(
            vec![first(buf)],
            None,
            None,
            braid_ir::DomainMask::ANY,
        );
        let _read = module.make_call(r, &[first(splice)]);

        let (module, store, nodes) = linked(module);
        let err = validate_read_undefined(&module, &store, &nodes).unwrap_err();
        assert!(err.to_string().contains("never written"));
    }

    #[test]
    fn duplicate_concrete_buffer_is_rejected() {
        let mut module = IrModule::new();
        let handle = braid_ir::BufferHandle(7);
        let _a = module.make_construct_buffer(BufferDesc {
            buffer: Some(handle),
            size: Some(16),
            ..Default::default()
        });
        let _b = module.make_construct_buffer(BufferDesc {
            buffer: Some(handle),
            size: Some(16),
            ..Default::default()
        });

        let (module, store, nodes) = linked(module);
        let err = validate_duplicated_resource_ref(&module, &store, &nodes).unwrap_err();
        assert!(err.to_string().contains("already known"));
    }

    #[test]
    fn distinct_concrete_buffers_pass() {
        let mut module = IrModule::new();
        let _a = module.make_construct_buffer(BufferDesc {
            buffer: Some(braid_ir::BufferHandle(1)),
            size: Some(16),
            ..Default::default()
        });
        let _b = module.make_construct_buffer(BufferDesc {
            buffer: Some(braid_ir::BufferHandle(2)),
            size: Some(16),
            ..Default::default()
        });

        let (module, store, nodes) = linked(module);
        validate_duplicated_resource_ref(&module, &store, &nodes).unwrap();
    }

    #[test]
    fn graph_allocated_buffers_never_collide() {
        let mut module = IrModule::new();
        let _a = module.make_construct_buffer(BufferDesc {
            size: Some(16),
            ..Default::default()
        });
        let _b = module.make_construct_buffer(BufferDesc {
            size: Some(16),
            ..Default::default()
        });

        let (module, store, nodes) = linked(module);
        validate_duplicated_resource_ref(&module, &store, &nodes).unwrap();
    }
}
