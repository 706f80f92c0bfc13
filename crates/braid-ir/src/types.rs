//! The interned type system of the IR.

use crate::access::Access;
use crate::arena::Handle;

/// Width of an integer type in bytes.
pub type Bytes = u8;

/// A named, interned type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Type {
    pub name: Option<String>,
    pub inner: TypeInner,
}

/// The concrete shape of a type.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum TypeInner {
    /// An unsigned integer of the given byte width.
    Integer { width: Bytes },
    /// An opaque blob of bytes (resource prototypes and the like).
    Memory,
    /// A homogeneous fixed-length array.
    Array { elem: Handle<Type>, len: u32 },
    /// An image resource.
    Image,
    /// A buffer resource.
    Buffer,
    /// A presentation swapchain.
    Swapchain,
    /// A value imbued with the access a callee performs on it.
    Imbued { base: Handle<Type>, access: Access },
    /// A call result that aliases the argument at `ref_idx`.
    Aliased { base: Handle<Type>, ref_idx: u32 },
    /// An opaque host function; `execute` names its body to the
    /// executor.
    OpaqueFn {
        args: Vec<Handle<Type>>,
        rets: Vec<Handle<Type>>,
        execute: u32,
    },
    /// A shader entry point; `shader` names the pipeline.
    ShaderFn {
        args: Vec<Handle<Type>>,
        rets: Vec<Handle<Type>>,
        shader: u32,
    },
}

impl TypeInner {
    /// Returns `true` for the function type variants.
    pub fn is_fn(&self) -> bool {
        matches!(self, Self::OpaqueFn { .. } | Self::ShaderFn { .. })
    }

    /// Parameter types of a function type.
    pub fn fn_args(&self) -> Option<&[Handle<Type>]> {
        match self {
            Self::OpaqueFn { args, .. } | Self::ShaderFn { args, .. } => Some(args),
            _ => None,
        }
    }

    /// Result types of a function type.
    pub fn fn_rets(&self) -> Option<&[Handle<Type>]> {
        match self {
            Self::OpaqueFn { rets, .. } | Self::ShaderFn { rets, .. } => Some(rets),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::TypeInterner;

    #[test]
    fn type_dedup() {
        let mut types = TypeInterner::new();
        let t0 = types.insert(Type {
            name: None,
            inner: TypeInner::Buffer,
        });
        let t1 = types.insert(Type {
            name: None,
            inner: TypeInner::Buffer,
        });
        assert_eq!(t0, t1);
        assert_eq!(types.len(), 1);
    }

    #[test]
    fn imbued_types_distinct_by_access() {
        let mut types = TypeInterner::new();
        let buf = types.insert(Type {
            name: None,
            inner: TypeInner::Buffer,
        });
        let w = types.insert(Type {
            name: None,
            inner: TypeInner::Imbued {
                base: buf,
                access: Access::TransferWrite,
            },
        });
        let r = types.insert(Type {
            name: None,
            inner: TypeInner::Imbued {
                base: buf,
                access: Access::TransferRead,
            },
        });
        assert_ne!(w, r);
    }

    #[test]
    fn fn_accessors() {
        let mut types = TypeInterner::new();
        let buf = types.insert(Type {
            name: None,
            inner: TypeInner::Buffer,
        });
        let fn_ty = TypeInner::OpaqueFn {
            args: vec![buf],
            rets: vec![buf],
            execute: 0,
        };
        assert!(fn_ty.is_fn());
        assert_eq!(fn_ty.fn_args().unwrap().len(), 1);
        assert_eq!(fn_ty.fn_rets().unwrap().len(), 1);
        assert!(TypeInner::Buffer.fn_args().is_none());
    }
}
