//! Constant evaluation over the argument graph.

use std::rc::Rc;

use braid_ir::{BinaryOp, ConstantValue, IrModule, NodeKind, Ref, SwapchainDesc};

/// Evaluates a ref to a `u32`, folding math-binary nodes over
/// constants. `None` when a placeholder or opaque value is reached.
pub fn eval_u32(module: &IrModule, r: Ref) -> Option<u32> {
    match &module.op_arena[r.node].kind {
        NodeKind::Constant { value } => value.as_u32(),
        NodeKind::MathBinary { args, op } => {
            let a = eval_u32(module, args[0])?;
            let b = eval_u32(module, args[1])?;
            match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div => a.checked_div(b),
                BinaryOp::Mod => a.checked_rem(b),
            }
        }
        _ => None,
    }
}

/// Evaluates a ref to the swapchain it denotes, looking through a
/// construct's prototype constant.
pub fn eval_swapchain(module: &IrModule, r: Ref) -> Option<Rc<SwapchainDesc>> {
    match &module.op_arena[r.node].kind {
        NodeKind::Constant { value } => match value {
            ConstantValue::Swapchain(swp) => Some(swp.clone()),
            _ => None,
        },
        NodeKind::Construct { args } => eval_swapchain(module, args[0]),
        _ => None,
    }
}
