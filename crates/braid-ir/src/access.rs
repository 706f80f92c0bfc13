//! Access classification and the synchronization state it maps to.

use crate::domain::DomainMask;

/// How an operation touches a resource.
///
/// Each variant implies a read/write direction, the pipeline stages
/// that perform it, and an image layout preference.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Access {
    /// No declared use.
    None,
    /// Sampled in a shader.
    Sampled,
    /// Storage read in a shader.
    StorageRead,
    /// Storage write in a shader.
    StorageWrite,
    /// Storage read-write in a shader.
    StorageRW,
    /// Color attachment read-write.
    ColorRW,
    /// Depth-stencil attachment read-write.
    DepthStencilRW,
    /// Source of a transfer operation.
    TransferRead,
    /// Destination of a transfer operation.
    TransferWrite,
    /// Cleared.
    Clear,
    /// Consumed: the value ends here.
    Consume,
    /// Unknown future use; conservatively everything.
    MemoryRW,
    /// Multisample resolve source.
    ColorResolveRead,
    /// Multisample resolve destination.
    ColorResolveWrite,
}

/// Returns `true` if the access writes the resource.
pub fn is_write_access(access: Access) -> bool {
    matches!(
        access,
        Access::StorageWrite
            | Access::StorageRW
            | Access::ColorRW
            | Access::DepthStencilRW
            | Access::TransferWrite
            | Access::Clear
            | Access::MemoryRW
            | Access::ColorResolveWrite
    )
}

/// Returns `true` for plain read-only accesses.
///
/// Transfer and storage reads are excluded: they constrain the image
/// layout on their own and are classified separately.
pub fn is_readonly_access(access: Access) -> bool {
    matches!(access, Access::Sampled | Access::ColorResolveRead)
}

/// Returns `true` if the access runs on the transfer unit.
pub fn is_transfer_access(access: Access) -> bool {
    matches!(
        access,
        Access::TransferRead | Access::TransferWrite | Access::Clear
    )
}

/// Returns `true` if the access goes through a storage descriptor.
pub fn is_storage_access(access: Access) -> bool {
    matches!(
        access,
        Access::StorageRead | Access::StorageWrite | Access::StorageRW
    )
}

/// Returns `true` if the access uses the resource as a framebuffer
/// attachment.
pub fn is_framebuffer_attachment(access: Access) -> bool {
    matches!(
        access,
        Access::ColorRW
            | Access::DepthStencilRW
            | Access::ColorResolveRead
            | Access::ColorResolveWrite
    )
}

/// Pipeline stage bitmask.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct PipelineStages(u32);

impl PipelineStages {
    /// No stages.
    pub const NONE: Self = Self(0);
    /// Transfer/copy engine.
    pub const TRANSFER: Self = Self(1);
    /// Compute shader.
    pub const COMPUTE_SHADER: Self = Self(1 << 1);
    /// Fragment shader.
    pub const FRAGMENT_SHADER: Self = Self(1 << 2);
    /// Color attachment output.
    pub const COLOR_ATTACHMENT_OUTPUT: Self = Self(1 << 3);
    /// Early and late depth-stencil tests.
    pub const FRAGMENT_TESTS: Self = Self(1 << 4);
    /// Everything.
    pub const ALL_COMMANDS: Self = Self(1 << 5);

    /// Returns `true` if `self` contains all flags in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no flags are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for PipelineStages {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for PipelineStages {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Memory access bitmask paired with [`PipelineStages`].
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct AccessFlags(u32);

impl AccessFlags {
    /// No access.
    pub const NONE: Self = Self(0);
    /// Transfer read.
    pub const TRANSFER_READ: Self = Self(1);
    /// Transfer write.
    pub const TRANSFER_WRITE: Self = Self(1 << 1);
    /// Shader sampled/storage read.
    pub const SHADER_READ: Self = Self(1 << 2);
    /// Shader storage write.
    pub const SHADER_WRITE: Self = Self(1 << 3);
    /// Color attachment read.
    pub const COLOR_ATTACHMENT_READ: Self = Self(1 << 4);
    /// Color attachment write.
    pub const COLOR_ATTACHMENT_WRITE: Self = Self(1 << 5);
    /// Depth-stencil attachment read.
    pub const DEPTH_STENCIL_READ: Self = Self(1 << 6);
    /// Depth-stencil attachment write.
    pub const DEPTH_STENCIL_WRITE: Self = Self(1 << 7);
    /// Any read.
    pub const MEMORY_READ: Self = Self(1 << 8);
    /// Any write.
    pub const MEMORY_WRITE: Self = Self(1 << 9);

    /// Returns `true` if `self` contains all flags in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no flags are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for AccessFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for AccessFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Image layout a use requires. Ignored for buffers.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum ImageLayout {
    /// Contents undefined.
    #[default]
    Undefined,
    /// Any use, no compression.
    General,
    /// Any read-only use.
    ReadOnlyOptimal,
    /// Attachment write.
    AttachmentOptimal,
    /// Transfer source.
    TransferSrcOptimal,
    /// Transfer destination.
    TransferDstOptimal,
}

/// The synchronization state one use of a resource requires on a queue.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct QueueResourceUse {
    /// Stages that perform the access.
    pub stages: PipelineStages,
    /// Memory access flags.
    pub access: AccessFlags,
    /// Required image layout.
    pub layout: ImageLayout,
    /// Queue domain of the use.
    pub domain: DomainMask,
}

/// Maps an [`Access`] to the stages, access flags, and layout it implies.
pub fn to_use(access: Access) -> QueueResourceUse {
    let (stages, flags, layout) = match access {
        Access::None => (
            PipelineStages::NONE,
            AccessFlags::NONE,
            ImageLayout::Undefined,
        ),
        Access::Sampled => (
            PipelineStages::FRAGMENT_SHADER | PipelineStages::COMPUTE_SHADER,
            AccessFlags::SHADER_READ,
            ImageLayout::ReadOnlyOptimal,
        ),
        Access::StorageRead => (
            PipelineStages::COMPUTE_SHADER,
            AccessFlags::SHADER_READ,
            ImageLayout::General,
        ),
        Access::StorageWrite => (
            PipelineStages::COMPUTE_SHADER,
            AccessFlags::SHADER_WRITE,
            ImageLayout::General,
        ),
        Access::StorageRW => (
            PipelineStages::COMPUTE_SHADER,
            AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE,
            ImageLayout::General,
        ),
        Access::ColorRW => (
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
            ImageLayout::AttachmentOptimal,
        ),
        Access::DepthStencilRW => (
            PipelineStages::FRAGMENT_TESTS,
            AccessFlags::DEPTH_STENCIL_READ | AccessFlags::DEPTH_STENCIL_WRITE,
            ImageLayout::AttachmentOptimal,
        ),
        Access::TransferRead => (
            PipelineStages::TRANSFER,
            AccessFlags::TRANSFER_READ,
            ImageLayout::TransferSrcOptimal,
        ),
        Access::TransferWrite | Access::Clear => (
            PipelineStages::TRANSFER,
            AccessFlags::TRANSFER_WRITE,
            ImageLayout::TransferDstOptimal,
        ),
        Access::Consume => (
            PipelineStages::ALL_COMMANDS,
            AccessFlags::MEMORY_READ,
            ImageLayout::Undefined,
        ),
        Access::MemoryRW => (
            PipelineStages::ALL_COMMANDS,
            AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE,
            ImageLayout::General,
        ),
        Access::ColorResolveRead => (
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            AccessFlags::COLOR_ATTACHMENT_READ,
            ImageLayout::AttachmentOptimal,
        ),
        Access::ColorResolveWrite => (
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            AccessFlags::COLOR_ATTACHMENT_WRITE,
            ImageLayout::AttachmentOptimal,
        ),
    };
    QueueResourceUse {
        stages,
        access: flags,
        layout,
        domain: DomainMask::ANY,
    }
}

/// Image usage bitmask derived from the accesses along a chain.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct ImageUsage(u32);

impl ImageUsage {
    /// No usage.
    pub const NONE: Self = Self(0);
    /// Color attachment.
    pub const COLOR_ATTACHMENT: Self = Self(1);
    /// Sampled image.
    pub const SAMPLED: Self = Self(1 << 1);
    /// Depth-stencil attachment.
    pub const DEPTH_STENCIL_ATTACHMENT: Self = Self(1 << 2);
    /// Transfer source.
    pub const TRANSFER_SRC: Self = Self(1 << 3);
    /// Transfer destination.
    pub const TRANSFER_DST: Self = Self(1 << 4);
    /// Storage image.
    pub const STORAGE: Self = Self(1 << 5);

    /// Returns `true` if `self` contains all flags in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no flags are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ImageUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ImageUsage {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Folds one access into an image-usage mask.
pub fn access_to_usage(usage: &mut ImageUsage, access: Access) {
    if matches!(
        access,
        Access::MemoryRW | Access::ColorRW | Access::ColorResolveRead | Access::ColorResolveWrite
    ) {
        *usage |= ImageUsage::COLOR_ATTACHMENT;
    }
    if matches!(access, Access::MemoryRW | Access::Sampled) {
        *usage |= ImageUsage::SAMPLED;
    }
    if matches!(access, Access::MemoryRW | Access::DepthStencilRW) {
        *usage |= ImageUsage::DEPTH_STENCIL_ATTACHMENT;
    }
    if matches!(access, Access::MemoryRW | Access::TransferRead) {
        *usage |= ImageUsage::TRANSFER_SRC;
    }
    if matches!(access, Access::MemoryRW | Access::TransferWrite | Access::Clear) {
        *usage |= ImageUsage::TRANSFER_DST;
    }
    if is_storage_access(access) || access == Access::MemoryRW {
        *usage |= ImageUsage::STORAGE;
    }
}
