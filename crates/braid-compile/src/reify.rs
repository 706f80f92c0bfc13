//! Reification: resolving placeholders on construct nodes.
//!
//! Two layers. Prototype reification turns a construct's placeholder
//! field arguments into constants wherever the prototype descriptor
//! already knows the value. Framebuffer inference then runs to a fixed
//! point: every render call propagates extent, sample count, and layer
//! count between its attachments, sourcing them from constructs or
//! acquired swapchain images.

use braid_ir::{
    is_framebuffer_attachment, ConstantValue, Handle, ImageViewType, IrModule, Node, NodeKind,
    Ref, Samples, TypeInner,
};

use crate::eval::{eval_swapchain, eval_u32};
use crate::link::LinkStore;

/// Image construct argument slots, after the prototype at slot 0.
const ARG_WIDTH: usize = 1;
const ARG_HEIGHT: usize = 2;
const ARG_DEPTH: usize = 3;
const ARG_FORMAT: usize = 4;
const ARG_SAMPLES: usize = 5;
const ARG_BASE_LAYER: usize = 6;
const ARG_LAYER_COUNT: usize = 7;
const ARG_BASE_LEVEL: usize = 8;
const ARG_LEVEL_COUNT: usize = 9;

fn is_placeholder(module: &IrModule, r: Ref) -> bool {
    matches!(module.op_arena[r.node].kind, NodeKind::Placeholder)
}

/// Turns a placeholder node into an owned constant. Constants never
/// regress, so reification is monotonic.
fn placeholder_to_constant(
    module: &mut IrModule,
    r: Ref,
    value: ConstantValue,
    progress: &mut bool,
) {
    if is_placeholder(module, r) {
        module.op_arena[r.node].kind = NodeKind::Constant { value };
        *progress = true;
    }
}

fn construct_args(module: &IrModule, node: Handle<Node>) -> Vec<Ref> {
    match &module.op_arena[node].kind {
        NodeKind::Construct { args } => args.clone(),
        _ => unreachable!(),
    }
}

fn is_image_construct(module: &IrModule, node: Handle<Node>) -> bool {
    matches!(module.op_arena[node].kind, NodeKind::Construct { .. })
        && module.op_arena[node].result_types[0] == module.builtins().image
}

fn is_buffer_construct(module: &IrModule, node: Handle<Node>) -> bool {
    matches!(module.op_arena[node].kind, NodeKind::Construct { .. })
        && module.op_arena[node].result_types[0] == module.builtins().buffer
}

/// Resolves field placeholders from values the prototype descriptor
/// already carries.
fn reify_prototype_fields(module: &mut IrModule, nodes: &[Handle<Node>]) {
    let mut progress = false;
    for &node in nodes {
        if is_image_construct(module, node) {
            let args = construct_args(module, node);
            let desc = match &module.op_arena[args[0].node].kind {
                NodeKind::Constant { value } => value.as_image().cloned(),
                _ => None,
            };
            let Some(desc) = desc else { continue };
            let u32_fields = [
                (ARG_WIDTH, desc.width),
                (ARG_HEIGHT, desc.height),
                (ARG_DEPTH, desc.depth),
                (ARG_BASE_LAYER, desc.base_layer),
                (ARG_LAYER_COUNT, desc.layer_count),
                (ARG_BASE_LEVEL, desc.base_level),
                (ARG_LEVEL_COUNT, desc.level_count),
            ];
            for (slot, value) in u32_fields {
                if let Some(value) = value {
                    placeholder_to_constant(
                        module,
                        args[slot],
                        ConstantValue::U32(value),
                        &mut progress,
                    );
                }
            }
            if let Some(format) = desc.format {
                placeholder_to_constant(
                    module,
                    args[ARG_FORMAT],
                    ConstantValue::Format(format),
                    &mut progress,
                );
            }
            if let Some(samples) = desc.samples {
                placeholder_to_constant(
                    module,
                    args[ARG_SAMPLES],
                    ConstantValue::Samples(samples),
                    &mut progress,
                );
            }
        } else if is_buffer_construct(module, node) {
            let args = construct_args(module, node);
            let size = match &module.op_arena[args[0].node].kind {
                NodeKind::Constant { value } => value.as_buffer().and_then(|b| b.size),
                _ => None,
            };
            if let Some(size) = size {
                placeholder_to_constant(module, args[1], ConstantValue::U64(size), &mut progress);
            }
        }
    }
}

fn eval_samples(module: &IrModule, r: Ref) -> Option<Samples> {
    match &module.op_arena[r.node].kind {
        NodeKind::Constant { value } => match value {
            ConstantValue::Samples(s) => Some(*s),
            _ => None,
        },
        _ => None,
    }
}

/// One framebuffer-inference step over a render call: gather known
/// extent/samples/layer-count from its attachments, then fill the
/// still-unknown attachment fields with them.
fn infer_call_framebuffer(
    module: &mut IrModule,
    store: &LinkStore,
    node: Handle<Node>,
    progress: &mut bool,
) {
    let args = match &module.op_arena[node].kind {
        NodeKind::Call { args } => args.clone(),
        _ => return,
    };
    let fn_ty = module.type_of(args[0]);
    let param_tys = match &module.types[fn_ty].inner {
        TypeInner::OpaqueFn { args, .. } => args.clone(),
        _ => return,
    };

    let mut extent: Option<(u32, u32)> = None;
    let mut samples: Option<Samples> = None;
    let mut layer_count: Option<u32> = None;

    for (i, &parm) in args.iter().enumerate().skip(1) {
        let access = match module.types[param_tys[i - 1]].inner {
            TypeInner::Imbued { access, .. } => access,
            _ => unreachable!("call parameters must be imbued"),
        };
        let Some(urdef) = store.link_of(module, parm).urdef else {
            continue;
        };
        if is_image_construct(module, urdef.node) {
            if !is_framebuffer_attachment(access) {
                continue;
            }
            let c_args = construct_args(module, urdef.node);
            // Only a single mip can be rendered to, and depth is flat.
            placeholder_to_constant(module, c_args[ARG_LEVEL_COUNT], ConstantValue::U32(1), progress);
            placeholder_to_constant(module, c_args[ARG_DEPTH], ConstantValue::U32(1), progress);

            if samples.is_none() && !is_placeholder(module, c_args[ARG_SAMPLES]) {
                samples = eval_samples(module, c_args[ARG_SAMPLES]);
            } else if let Some(s) = samples {
                placeholder_to_constant(
                    module,
                    c_args[ARG_SAMPLES],
                    ConstantValue::Samples(s),
                    progress,
                );
            }

            if extent.is_none()
                && !is_placeholder(module, c_args[ARG_WIDTH])
                && !is_placeholder(module, c_args[ARG_HEIGHT])
            {
                if let (Some(w), Some(h)) = (
                    eval_u32(module, c_args[ARG_WIDTH]),
                    eval_u32(module, c_args[ARG_HEIGHT]),
                ) {
                    extent = Some((w, h));
                }
            } else if let Some((w, h)) = extent {
                if is_placeholder(module, c_args[ARG_WIDTH])
                    && is_placeholder(module, c_args[ARG_HEIGHT])
                {
                    placeholder_to_constant(module, c_args[ARG_WIDTH], ConstantValue::U32(w), progress);
                    placeholder_to_constant(
                        module,
                        c_args[ARG_HEIGHT],
                        ConstantValue::U32(h),
                        progress,
                    );
                }
            }

            if layer_count.is_none() && !is_placeholder(module, c_args[ARG_LAYER_COUNT]) {
                layer_count = eval_u32(module, c_args[ARG_LAYER_COUNT]);
            } else if let Some(count) = layer_count {
                placeholder_to_constant(
                    module,
                    c_args[ARG_LAYER_COUNT],
                    ConstantValue::U32(count),
                    progress,
                );
            }
        } else if let NodeKind::AcquireNextImage { args: acq_args } =
            &module.op_arena[urdef.node].kind
        {
            if let Some(swapchain) = eval_swapchain(module, acq_args[0]) {
                if let Some(image) = swapchain.images.first() {
                    if let (Some(w), Some(h)) = (image.width, image.height) {
                        extent = Some((w, h));
                    }
                    layer_count = image.layer_count;
                    samples = Some(Samples::S1);
                }
            }
        }
    }
}

/// Defaults the base subresource of unbacked images and infers a view
/// type once the layer count is known.
fn finish_image_constructs(module: &mut IrModule, nodes: &[Handle<Node>], progress: &mut bool) {
    for &node in nodes {
        if !is_image_construct(module, node) {
            continue;
        }
        let args = construct_args(module, node);
        let desc = match &module.op_arena[args[0].node].kind {
            NodeKind::Constant { value } => value.as_image().cloned(),
            _ => None,
        };
        let Some(desc) = desc else { continue };
        if desc.image.is_none() {
            // Without an imported image the graph allocates from zero.
            placeholder_to_constant(module, args[ARG_BASE_LAYER], ConstantValue::U32(0), progress);
            placeholder_to_constant(module, args[ARG_BASE_LEVEL], ConstantValue::U32(0), progress);
        }
        if desc.view_type.is_none() {
            if let Some(layers) = eval_u32(module, args[ARG_LAYER_COUNT]) {
                let view = if layers > 1 {
                    ImageViewType::D2Array
                } else {
                    ImageViewType::D2
                };
                let proto = args[0].node;
                if let NodeKind::Constant { value: ConstantValue::Image(desc) } =
                    &mut module.op_arena[proto].kind
                {
                    desc.view_type = Some(view);
                }
            }
        }
    }
}

/// Runs prototype reification once, then framebuffer inference and
/// image finishing to a fixed point.
pub fn reify_inference(module: &mut IrModule, store: &LinkStore, nodes: &[Handle<Node>]) {
    reify_prototype_fields(module, nodes);

    loop {
        let mut progress = false;
        for &node in nodes {
            if matches!(module.op_arena[node].kind, NodeKind::Call { .. }) {
                infer_call_framebuffer(module, store, node, &mut progress);
            }
        }
        finish_image_constructs(module, nodes, &mut progress);
        if !progress {
            break;
        }
    }
}
