//! Shared harness: forges IR the way the pass-builder facade would,
//! compiles it, and executes the plan against host-side buffers.
//!
//! Every user-visible value is splice-wrapped with a disarmed signal,
//! like the real facade does. Submitting a value wraps its current
//! head in a release splice, compiles, walks the partitioned plan
//! invoking the registered pass callbacks, and finally arms every
//! deferred signal, stores the concrete resource values, and
//! disconnects the armed splices so a later submit does not re-execute
//! the producing subgraph.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use braid_compile::{CompileOptions, Compiler, ExecutablePlan};
use braid_ir::{
    first, Access, BufferDesc, BufferHandle, CompileError, ConstantValue, DomainMask, ExtNode,
    Handle, ImageDesc, IrModule, Node, NodeKind, Ref, SchedulingInfo, Signal, SignalStatus,
};

/// A user-held value: one result of a splice-wrapped node.
#[derive(Clone)]
pub struct Value {
    pub ext: Rc<ExtNode>,
    pub index: u32,
}

impl Value {
    pub fn head(&self) -> Ref {
        Ref::new(self.ext.node(), self.index)
    }
}

/// A forged opaque pass: its interned function type plus the callback
/// slot it executes.
#[derive(Clone, Copy)]
pub struct PassDef {
    fn_ty: braid_ir::Handle<braid_ir::Type>,
    returns: usize,
    required_domains: Option<DomainMask>,
}

/// What a pass callback sees at execution time.
pub struct ExecCtx<'a> {
    /// Queue domain the pass was scheduled on.
    pub domain: DomainMask,
    /// Resolved values per call argument (slot 0 is the function).
    pub args: Vec<Option<ConstantValue>>,
    pub buffers: &'a mut HashMap<u64, Vec<u8>>,
}

#[allow(dead_code)]
impl ExecCtx<'_> {
    /// Fills the buffer behind argument `arg` with a byte.
    pub fn fill_buffer(&mut self, arg: usize, byte: u8) {
        let handle = self.arg_buffer(arg);
        let data = self
            .buffers
            .get_mut(&handle.0)
            .expect("buffer has no host storage");
        data.fill(byte);
    }

    /// The concrete buffer behind argument `arg`.
    pub fn arg_buffer(&self, arg: usize) -> BufferHandle {
        match &self.args[arg] {
            Some(ConstantValue::Buffer(desc)) => desc.buffer.expect("buffer not concrete"),
            other => panic!("argument {arg} is not a buffer: {other:?}"),
        }
    }
}

type PassBody = Box<dyn FnMut(&mut ExecCtx)>;

/// The test runtime: a shared module, registered pass bodies, and
/// host-side buffer storage.
pub struct TestRt {
    pub module: Rc<RefCell<IrModule>>,
    bodies: RefCell<Vec<PassBody>>,
    pub buffers: RefCell<HashMap<u64, Vec<u8>>>,
    next_handle: RefCell<u64>,
}

#[allow(dead_code)]
impl TestRt {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            module: Rc::new(RefCell::new(IrModule::new())),
            bodies: RefCell::new(Vec::new()),
            buffers: RefCell::new(HashMap::new()),
            next_handle: RefCell::new(1),
        }
    }

    fn wrap(&self, srcs: Vec<Ref>, deps: Vec<Rc<ExtNode>>) -> Rc<ExtNode> {
        let signal = Rc::new(RefCell::new(Signal::new()));
        let splice =
            self.module
                .borrow_mut()
                .make_splice(srcs, Some(signal.clone()), None, DomainMask::ANY);
        ExtNode::new(&self.module, splice, signal, deps)
    }

    /// Declares a GPU-only buffer with fresh host storage.
    pub fn declare_buf(&self, name: &str, size: u64) -> Value {
        let handle = {
            let mut next = self.next_handle.borrow_mut();
            let h = *next;
            *next += 1;
            h
        };
        self.buffers.borrow_mut().insert(handle, vec![0; size as usize]);
        self.declare_buf_raw(name, BufferHandle(handle), size)
    }

    /// Declares a buffer over an explicit handle; lets tests alias
    /// resources on purpose.
    pub fn declare_buf_raw(&self, name: &str, handle: BufferHandle, size: u64) -> Value {
        let construct = {
            let mut module = self.module.borrow_mut();
            let construct = module.make_construct_buffer(BufferDesc {
                buffer: Some(handle),
                size: Some(size),
                ..Default::default()
            });
            module.name_node(construct, name);
            construct
        };
        let ext = self.wrap(vec![first(construct)], vec![]);
        Value { ext, index: 0 }
    }

    /// Declares an image resource. Returns the value and its construct
    /// node for field inspection.
    pub fn declare_img(&self, name: &str, desc: ImageDesc) -> (Value, Handle<Node>) {
        let construct = {
            let mut module = self.module.borrow_mut();
            let construct = module.make_construct_image(desc);
            module.name_node(construct, name);
            construct
        };
        let ext = self.wrap(vec![first(construct)], vec![]);
        (Value { ext, index: 0 }, construct)
    }

    /// Registers an opaque pass. `params` carries the buffer-typed
    /// parameter accesses; `returns` lists the 1-based parameter slots
    /// the pass returns.
    pub fn make_pass(
        &self,
        name: &str,
        params: &[Access],
        returns: &[u32],
        body: impl FnMut(&mut ExecCtx) + 'static,
    ) -> PassDef {
        self.make_domain_pass(name, params, returns, None, body)
    }

    /// Like [`make_pass`](Self::make_pass), constrained to a queue
    /// domain.
    pub fn make_domain_pass(
        &self,
        name: &str,
        params: &[Access],
        returns: &[u32],
        required_domains: Option<DomainMask>,
        body: impl FnMut(&mut ExecCtx) + 'static,
    ) -> PassDef {
        let execute = {
            let mut bodies = self.bodies.borrow_mut();
            bodies.push(Box::new(body));
            (bodies.len() - 1) as u32
        };
        let fn_ty = {
            let mut module = self.module.borrow_mut();
            let buffer_ty = module.builtins().buffer;
            let param_tys: Vec<_> = params.iter().map(|&a| (buffer_ty, a)).collect();
            module.make_opaque_fn_type(name, &param_tys, returns, execute)
        };
        PassDef {
            fn_ty,
            returns: returns.len(),
            required_domains,
        }
    }

    /// An image-typed variant of [`make_pass`](Self::make_pass).
    pub fn make_img_pass(
        &self,
        name: &str,
        params: &[Access],
        returns: &[u32],
        body: impl FnMut(&mut ExecCtx) + 'static,
    ) -> PassDef {
        let execute = {
            let mut bodies = self.bodies.borrow_mut();
            bodies.push(Box::new(body));
            (bodies.len() - 1) as u32
        };
        let fn_ty = {
            let mut module = self.module.borrow_mut();
            let image_ty = module.builtins().image;
            let param_tys: Vec<_> = params.iter().map(|&a| (image_ty, a)).collect();
            module.make_opaque_fn_type(name, &param_tys, returns, execute)
        };
        PassDef {
            fn_ty,
            returns: returns.len(),
            required_domains: None,
        }
    }

    /// Applies a pass to values, producing one value per declared
    /// return. The results share one seam, like a tuple return.
    pub fn apply(&self, pass: &PassDef, name: &str, args: &[&Value]) -> Vec<Value> {
        let call = {
            let mut module = self.module.borrow_mut();
            let fn_val = Ref::new(module.make_placeholder(pass.fn_ty), 0);
            let arg_refs: Vec<Ref> = args.iter().map(|v| v.head()).collect();
            let call = module.make_call(fn_val, &arg_refs);
            module.name_node(call, name);
            if let Some(required_domains) = pass.required_domains {
                module.op_arena[call].scheduling_info = Some(SchedulingInfo { required_domains });
            }
            call
        };
        if pass.returns == 0 {
            return Vec::new();
        }
        let srcs: Vec<Ref> = (0..pass.returns as u32).map(|i| Ref::new(call, i)).collect();
        let deps = args.iter().map(|v| v.ext.clone()).collect();
        let ext = self.wrap(srcs, deps);
        (0..pass.returns as u32)
            .map(|index| Value {
                ext: ext.clone(),
                index,
            })
            .collect()
    }

    /// Compiles and executes the graph reaching `value`. The trace is
    /// whatever the pass bodies appended.
    pub fn submit(&self, compiler: &mut Compiler, value: &Value) -> Result<(), CompileError> {
        // An armed value has already been computed; there is nothing
        // left to run for it.
        if value.ext.acqrel.borrow().status == SignalStatus::Armed {
            return Ok(());
        }
        // Release the value through a fresh seam created at submit
        // time, after every pass application.
        let release = self.wrap(vec![value.head()], vec![value.ext.clone()]);
        let plan = compiler.link(&self.module, &[release], &CompileOptions::default())?;
        self.execute(compiler, &plan);
        Ok(())
    }

    fn execute(&self, compiler: &Compiler, plan: &ExecutablePlan) {
        {
            let module = self.module.borrow();
            let mut buffers = self.buffers.borrow_mut();
            let mut bodies = self.bodies.borrow_mut();

            for &slot in &plan.partitions.order {
                let item = plan.items[slot as usize];
                let NodeKind::Call { args } = &module.op_arena[item.node].kind else {
                    continue;
                };
                let fn_ty = module.type_of(args[0]);
                let execute = match module.types[fn_ty].inner {
                    braid_ir::TypeInner::OpaqueFn { execute, .. } => execute,
                    _ => continue,
                };
                let resolved: Vec<Option<ConstantValue>> = args
                    .iter()
                    .map(|&arg| compiler.get_value(&module, arg))
                    .collect();
                let mut ctx = ExecCtx {
                    domain: item.scheduled_domain,
                    args: resolved,
                    buffers: &mut buffers,
                };
                bodies[execute as usize](&mut ctx);
            }
        }

        // Arm every deferred seam: store the concrete values it
        // forwards, fire its signal, and disconnect its sources so the
        // next compile treats it as a pure acquire.
        let fired: Vec<(Handle<Node>, Vec<(u32, Option<ConstantValue>)>)> = {
            let module = self.module.borrow();
            compiler
                .deferred_splices()
                .values()
                .flatten()
                .map(|needle| needle.node)
                .collect::<std::collections::HashSet<_>>()
                .into_iter()
                .map(|splice| {
                    let values = match &module.op_arena[splice].kind {
                        NodeKind::Splice(data) => data
                            .src
                            .iter()
                            .enumerate()
                            .map(|(i, &src)| (i as u32, compiler.get_value(&module, src)))
                            .collect(),
                        _ => unreachable!("deferred non-splice"),
                    };
                    (splice, values)
                })
                .collect()
        };
        let mut module = self.module.borrow_mut();
        for (splice, values) in fired {
            match &mut module.op_arena[splice].kind {
                NodeKind::Splice(data) => {
                    for (index, value) in values {
                        data.values[index as usize] = value;
                    }
                    data.src = Vec::new();
                    if let Some(signal) = &data.rel_acq {
                        signal.borrow_mut().status = SignalStatus::Armed;
                    }
                }
                _ => unreachable!(),
            }
        }
    }

    /// Reads the host storage behind a buffer value.
    pub fn download_buffer(&self, compiler: &Compiler, value: &Value) -> Vec<u8> {
        let module = self.module.borrow();
        let resolved = compiler
            .get_value(&module, value.head())
            .expect("value does not resolve to a resource");
        let handle = resolved
            .as_buffer()
            .expect("value is not a buffer")
            .buffer
            .expect("buffer not concrete");
        self.buffers.borrow()[&handle.0].clone()
    }
}

/// A trace shared between pass bodies and assertions.
#[allow(dead_code)]
pub fn shared_trace() -> Rc<RefCell<String>> {
    Rc::new(RefCell::new(String::new()))
}

/// Pass body that appends a token to the trace.
#[allow(dead_code)]
pub fn tracing_body(
    trace: &Rc<RefCell<String>>,
    token: &str,
) -> impl FnMut(&mut ExecCtx) + 'static {
    let trace = trace.clone();
    let token = token.to_string();
    move |_ctx| trace.borrow_mut().push_str(&token)
}
