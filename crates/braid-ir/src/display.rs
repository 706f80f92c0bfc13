//! Display implementations for diagnostics and graph dumps.

use std::fmt;

use crate::access::{Access, ImageLayout};
use crate::node::BinaryOp;

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Sampled => "sampled",
            Self::StorageRead => "storage_read",
            Self::StorageWrite => "storage_write",
            Self::StorageRW => "storage_rw",
            Self::ColorRW => "color_rw",
            Self::DepthStencilRW => "depth_stencil_rw",
            Self::TransferRead => "transfer_read",
            Self::TransferWrite => "transfer_write",
            Self::Clear => "clear",
            Self::Consume => "consume",
            Self::MemoryRW => "memory_rw",
            Self::ColorResolveRead => "resolve_read",
            Self::ColorResolveWrite => "resolve_write",
        })
    }
}

impl fmt::Display for ImageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Undefined => "undefined",
            Self::General => "general",
            Self::ReadOnlyOptimal => "read_only_optimal",
            Self::AttachmentOptimal => "attachment_optimal",
            Self::TransferSrcOptimal => "transfer_src_optimal",
            Self::TransferDstOptimal => "transfer_dst_optimal",
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_names() {
        assert_eq!(Access::TransferWrite.to_string(), "transfer_write");
        assert_eq!(Access::ColorRW.to_string(), "color_rw");
    }

    #[test]
    fn layout_names() {
        assert_eq!(ImageLayout::General.to_string(), "general");
        assert_eq!(
            ImageLayout::TransferSrcOptimal.to_string(),
            "transfer_src_optimal"
        );
    }
}
