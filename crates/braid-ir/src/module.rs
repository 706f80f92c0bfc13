//! The owning IR module: node storage, type interning, and garbage
//! collection, plus the external references that keep nodes alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use smallvec::{smallvec, SmallVec};

use crate::access::Access;
use crate::arena::{Handle, NodeArena, TypeInterner};
use crate::domain::DomainMask;
use crate::node::{BinaryOp, DebugInfo, Node, NodeKind, Ref, SpliceData};
use crate::resource::{BufferDesc, ConstantValue, ImageDesc, SwapchainDesc};
use crate::signal::Signal;
use crate::types::{Type, TypeInner};

/// Handles of the types every module interns up front.
#[derive(Clone, Copy, Debug)]
pub struct BuiltinTypes {
    pub u32_ty: Handle<Type>,
    pub u64_ty: Handle<Type>,
    pub memory: Handle<Type>,
    pub image: Handle<Type>,
    pub buffer: Handle<Type>,
    pub swapchain: Handle<Type>,
}

/// Owns the node arena and type interner for a set of graph
/// constructions. Nodes persist across compiles until collected.
#[derive(Debug)]
pub struct IrModule {
    pub op_arena: NodeArena<Node>,
    pub types: TypeInterner<Type>,
    /// Nodes whose external reference was dropped, with the reference
    /// count the collector assigns during a sweep.
    pub potential_garbage: HashMap<Handle<Node>, u32>,
    /// Nodes to destroy unconditionally at the next sweep.
    pub garbage: Vec<Handle<Node>>,
    builtins: BuiltinTypes,
    next_index: u32,
}

impl Default for IrModule {
    fn default() -> Self {
        Self::new()
    }
}

impl IrModule {
    /// Creates an empty module with the builtin types interned.
    pub fn new() -> Self {
        let mut types = TypeInterner::new();
        let builtins = BuiltinTypes {
            u32_ty: types.insert(Type {
                name: None,
                inner: TypeInner::Integer { width: 4 },
            }),
            u64_ty: types.insert(Type {
                name: None,
                inner: TypeInner::Integer { width: 8 },
            }),
            memory: types.insert(Type {
                name: None,
                inner: TypeInner::Memory,
            }),
            image: types.insert(Type {
                name: Some("image".into()),
                inner: TypeInner::Image,
            }),
            buffer: types.insert(Type {
                name: Some("buffer".into()),
                inner: TypeInner::Buffer,
            }),
            swapchain: types.insert(Type {
                name: Some("swapchain".into()),
                inner: TypeInner::Swapchain,
            }),
        };
        Self {
            op_arena: NodeArena::new(),
            types,
            potential_garbage: HashMap::new(),
            garbage: Vec::new(),
            builtins,
            next_index: 0,
        }
    }

    /// The pre-interned builtin type handles.
    pub fn builtins(&self) -> &BuiltinTypes {
        &self.builtins
    }

    /// The type of one result of a node.
    pub fn type_of(&self, r: Ref) -> Handle<Type> {
        self.op_arena[r.node].result_types[r.index as usize]
    }

    /// Follows `Aliased` and `Imbued` wrappers down to the underlying
    /// resource type.
    pub fn stripped_type(&self, mut ty: Handle<Type>) -> Handle<Type> {
        loop {
            match self.types[ty].inner {
                TypeInner::Aliased { base, .. } | TypeInner::Imbued { base, .. } => ty = base,
                _ => return ty,
            }
        }
    }

    fn add_node(&mut self, kind: NodeKind, result_types: SmallVec<[Handle<Type>; 2]>) -> Handle<Node> {
        let index = self.next_index;
        self.next_index += 1;
        self.op_arena.insert(Node::new(kind, result_types, index))
    }

    /// Attaches a debug name to every result of a node.
    pub fn name_node(&mut self, node: Handle<Node>, name: &str) {
        let count = self.op_arena[node].result_count().max(1);
        let names = (0..count).map(|i| {
            if count == 1 {
                name.to_string()
            } else {
                format!("{name}.{i}")
            }
        });
        self.op_arena[node].debug_info = Some(DebugInfo {
            result_names: names.collect(),
        });
    }

    /// A constant node. The result type follows the value.
    pub fn make_constant(&mut self, value: ConstantValue) -> Handle<Node> {
        let ty = match value {
            ConstantValue::U32(_) => self.builtins.u32_ty,
            ConstantValue::U64(_) => self.builtins.u64_ty,
            _ => self.builtins.memory,
        };
        self.add_node(NodeKind::Constant { value }, smallvec![ty])
    }

    /// A placeholder of the given type.
    pub fn make_placeholder(&mut self, ty: Handle<Type>) -> Handle<Node> {
        self.add_node(NodeKind::Placeholder, smallvec![ty])
    }

    fn field_arg_u32(&mut self, value: Option<u32>) -> Ref {
        let node = match value {
            Some(v) => self.make_constant(ConstantValue::U32(v)),
            None => self.make_placeholder(self.builtins.u32_ty),
        };
        Ref::new(node, 0)
    }

    /// Declares an image resource. The prototype descriptor is
    /// argument 0; arguments 1..=9 are the inferable fields
    /// (width, height, depth, format, samples, base_layer, layer_count,
    /// base_level, level_count), placeholders where unknown.
    pub fn make_construct_image(&mut self, desc: ImageDesc) -> Handle<Node> {
        let format = desc.format;
        let samples = desc.samples;
        let proto = self.make_constant(ConstantValue::Image(desc.clone()));
        let mut args = vec![Ref::new(proto, 0)];
        args.push(self.field_arg_u32(desc.width));
        args.push(self.field_arg_u32(desc.height));
        args.push(self.field_arg_u32(desc.depth));
        let format_arg = match format {
            Some(f) => self.make_constant(ConstantValue::Format(f)),
            None => self.make_placeholder(self.builtins.memory),
        };
        args.push(Ref::new(format_arg, 0));
        let samples_arg = match samples {
            Some(s) => self.make_constant(ConstantValue::Samples(s)),
            None => self.make_placeholder(self.builtins.memory),
        };
        args.push(Ref::new(samples_arg, 0));
        args.push(self.field_arg_u32(desc.base_layer));
        args.push(self.field_arg_u32(desc.layer_count));
        args.push(self.field_arg_u32(desc.base_level));
        args.push(self.field_arg_u32(desc.level_count));
        let image_ty = self.builtins.image;
        self.add_node(NodeKind::Construct { args }, smallvec![image_ty])
    }

    /// Declares a buffer resource. Argument 1 is the size.
    pub fn make_construct_buffer(&mut self, desc: BufferDesc) -> Handle<Node> {
        let size = desc.size;
        let proto = self.make_constant(ConstantValue::Buffer(desc));
        let size_arg = match size {
            Some(v) => self.make_constant(ConstantValue::U64(v)),
            None => self.make_placeholder(self.builtins.u64_ty),
        };
        let args = vec![Ref::new(proto, 0), Ref::new(size_arg, 0)];
        let buffer_ty = self.builtins.buffer;
        self.add_node(NodeKind::Construct { args }, smallvec![buffer_ty])
    }

    /// Declares a swapchain resource.
    pub fn make_construct_swapchain(&mut self, swapchain: Rc<SwapchainDesc>) -> Handle<Node> {
        let proto = self.make_constant(ConstantValue::Swapchain(swapchain));
        let args = vec![Ref::new(proto, 0)];
        let ty = self.builtins.swapchain;
        self.add_node(NodeKind::Construct { args }, smallvec![ty])
    }

    /// Interns an opaque-function type. `params` are the parameter
    /// base types with the access the function performs on them;
    /// `returns` lists, per result, the call-argument slot the result
    /// aliases (parameter `i` sits at slot `i + 1`). `execute`
    /// identifies the body to the executor.
    pub fn make_opaque_fn_type(
        &mut self,
        name: &str,
        params: &[(Handle<Type>, Access)],
        returns: &[u32],
        execute: u32,
    ) -> Handle<Type> {
        let args: Vec<_> = params
            .iter()
            .map(|&(base, access)| {
                self.types.insert(Type {
                    name: None,
                    inner: TypeInner::Imbued { base, access },
                })
            })
            .collect();
        let rets: Vec<_> = returns
            .iter()
            .map(|&ref_idx| {
                assert!(ref_idx >= 1, "result aliases the function slot");
                let base = params[(ref_idx - 1) as usize].0;
                self.types.insert(Type {
                    name: None,
                    inner: TypeInner::Aliased { base, ref_idx },
                })
            })
            .collect();
        self.types.insert(Type {
            name: Some(name.into()),
            inner: TypeInner::OpaqueFn {
                args,
                rets,
                execute,
            },
        })
    }

    /// Invokes a function value on the given parameters. The result
    /// types come from the function type's aliased results.
    pub fn make_call(&mut self, function: Ref, params: &[Ref]) -> Handle<Node> {
        let fn_ty = self.type_of(function);
        let rets: SmallVec<[Handle<Type>; 2]> = self.types[fn_ty]
            .inner
            .fn_rets()
            .expect("call of a non-function value")
            .iter()
            .copied()
            .collect();
        let mut args = Vec::with_capacity(params.len() + 1);
        args.push(function);
        args.extend_from_slice(params);
        self.add_node(NodeKind::Call { args }, rets)
    }

    /// A release/acquire seam over the given sources.
    pub fn make_splice(
        &mut self,
        src: Vec<Ref>,
        rel_acq: Option<Rc<RefCell<Signal>>>,
        dst_access: Option<Access>,
        dst_domain: DomainMask,
    ) -> Handle<Node> {
        let result_types: SmallVec<[Handle<Type>; 2]> = src
            .iter()
            .map(|&r| {
                let ty = self.type_of(r);
                self.stripped_type(ty)
            })
            .collect();
        let values = vec![None; src.len()];
        self.add_node(
            NodeKind::Splice(Box::new(SpliceData {
                src,
                rel_acq,
                dst_access,
                dst_domain,
                values,
            })),
            result_types,
        )
    }

    /// Bisects an image into (subrange, remainder) along mip/layer
    /// axes. Result 0 is the slice, result 1 the rest.
    pub fn make_slice(
        &mut self,
        image: Ref,
        base_level: u32,
        level_count: u32,
        base_layer: u32,
        layer_count: u32,
    ) -> Handle<Node> {
        let args = [
            image,
            self.field_arg_u32(Some(base_level)),
            self.field_arg_u32(Some(level_count)),
            self.field_arg_u32(Some(base_layer)),
            self.field_arg_u32(Some(layer_count)),
        ];
        let image_ty = {
            let ty = self.type_of(image);
            self.stripped_type(ty)
        };
        self.add_node(NodeKind::Slice { args }, smallvec![image_ty, image_ty])
    }

    /// Merges diverged sub-chains back into one value. `write[i]`
    /// marks whether input `i` is consumed as a write.
    pub fn make_converge(&mut self, diverged: Vec<Ref>, write: Vec<bool>) -> Handle<Node> {
        assert_eq!(diverged.len(), write.len());
        assert!(!diverged.is_empty(), "converge of nothing");
        let ty = {
            let ty = self.type_of(diverged[0]);
            self.stripped_type(ty)
        };
        self.add_node(NodeKind::Converge { diverged, write }, smallvec![ty])
    }

    /// Acquires the next image of a swapchain value.
    pub fn make_acquire_next_image(&mut self, swapchain: Ref) -> Handle<Node> {
        let image_ty = self.builtins.image;
        self.add_node(
            NodeKind::AcquireNextImage { args: [swapchain] },
            smallvec![image_ty],
        )
    }

    /// Integer arithmetic over two refs.
    pub fn make_math_binary(&mut self, op: BinaryOp, a: Ref, b: Ref) -> Handle<Node> {
        let ty = self.type_of(a);
        self.add_node(NodeKind::MathBinary { args: [a, b], op }, smallvec![ty])
    }

    /// Extracts element `index` out of a composite value.
    pub fn make_extract(&mut self, composite: Ref, index: Ref) -> Handle<Node> {
        let ty = {
            let composite_ty = self.type_of(composite);
            match self.types[composite_ty].inner {
                TypeInner::Array { elem, .. } => elem,
                _ => self.stripped_type(composite_ty),
            }
        };
        self.add_node(
            NodeKind::Extract {
                args: [composite, index],
            },
            smallvec![ty],
        )
    }

    /// Removes a node from the arena.
    pub fn destroy_node(&mut self, node: Handle<Node>) {
        self.op_arena.remove(node);
    }

    /// One garbage-collection sweep.
    ///
    /// Tombstones are removed outright. Reference counts into
    /// `potential_garbage` are recomputed from the remaining live
    /// nodes (candidates do not keep each other alive); entries that
    /// end up unreferenced are destroyed, the rest stay candidates for
    /// the next sweep. The unconditional `garbage` list is drained
    /// last.
    pub fn collect_garbage(&mut self) {
        let handles = self.op_arena.handles();
        for handle in handles {
            if self.potential_garbage.contains_key(&handle) {
                continue;
            }
            if matches!(self.op_arena[handle].kind, NodeKind::Garbage) {
                self.op_arena.remove(handle);
                continue;
            }
            let args: Vec<Ref> = self.op_arena[handle].args().to_vec();
            for arg in args {
                if let Some(count) = self.potential_garbage.get_mut(&arg.node) {
                    *count += 1;
                }
            }
        }

        let mut to_destroy = Vec::new();
        for (&node, count) in self.potential_garbage.iter_mut() {
            if *count == 0 {
                to_destroy.push(node);
            }
            *count = 0;
        }
        for node in &to_destroy {
            self.potential_garbage.remove(node);
        }
        for node in to_destroy {
            if self.op_arena.try_get(node).is_some() {
                self.destroy_node(node);
            }
        }

        let garbage = std::mem::take(&mut self.garbage);
        for node in garbage {
            if self.op_arena.try_get(node).is_some() {
                self.destroy_node(node);
            }
        }
    }
}

/// A shared external reference to a node.
///
/// Dropping the last clone registers the node as potential garbage in
/// its module. `deps` keeps the references a derived value was built
/// from alive until the next compile consumes them.
#[derive(Debug)]
pub struct ExtNode {
    module: Weak<RefCell<IrModule>>,
    node: Handle<Node>,
    /// Signal of the node's release/acquire seam.
    pub acqrel: Rc<RefCell<Signal>>,
    /// References this value was derived from.
    pub deps: RefCell<Vec<Rc<ExtNode>>>,
}

impl ExtNode {
    /// Wraps a node in a shared external reference.
    pub fn new(
        module: &Rc<RefCell<IrModule>>,
        node: Handle<Node>,
        acqrel: Rc<RefCell<Signal>>,
        deps: Vec<Rc<ExtNode>>,
    ) -> Rc<Self> {
        Rc::new(Self {
            module: Rc::downgrade(module),
            node,
            acqrel,
            deps: RefCell::new(deps),
        })
    }

    /// The referenced node.
    pub fn node(&self) -> Handle<Node> {
        self.node
    }
}

impl Drop for ExtNode {
    fn drop(&mut self) {
        if let Some(module) = self.module.upgrade() {
            if let Ok(mut module) = module.try_borrow_mut() {
                module.potential_garbage.entry(self.node).or_insert(0);
            }
        }
    }
}
