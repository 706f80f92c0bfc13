//! Resource descriptors and the constant values that carry them.

use std::rc::Rc;

/// Pixel format of an image. A small subset; the compiler only ever
/// compares formats and checks depth-ness.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Format {
    R8Unorm,
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Srgb,
    Rgba16Sfloat,
    R32Uint,
    D32Sfloat,
    D24UnormS8Uint,
}

impl Format {
    /// Returns `true` if the format has a depth aspect.
    pub fn has_depth(self) -> bool {
        matches!(self, Self::D32Sfloat | Self::D24UnormS8Uint)
    }
}

/// Multisample count.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Samples {
    S1,
    S2,
    S4,
    S8,
}

/// Dimensionality of an image view.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ImageViewType {
    D1,
    D2,
    D2Array,
    D3,
    Cube,
}

/// Where a buffer's memory lives.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum MemoryUsage {
    /// Device-local, not host-visible.
    #[default]
    GpuOnly,
    /// Host-visible upload heap.
    CpuToGpu,
    /// Host-visible readback heap.
    GpuToCpu,
}

/// Opaque handle of an already-created GPU image.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct ImageHandle(pub u64);

/// Opaque handle of an already-created GPU buffer.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct BufferHandle(pub u64);

/// Description of an image resource.
///
/// `None` fields are unknown at declaration time; the reifier fills
/// them from later field writes or framebuffer inference. A concrete
/// `image` handle means the resource is imported rather than
/// graph-allocated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageDesc {
    pub image: Option<ImageHandle>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub depth: Option<u32>,
    pub format: Option<Format>,
    pub samples: Option<Samples>,
    pub base_layer: Option<u32>,
    pub layer_count: Option<u32>,
    pub base_level: Option<u32>,
    pub level_count: Option<u32>,
    pub view_type: Option<ImageViewType>,
}

impl ImageDesc {
    /// Returns `true` once every field a view and an allocation need
    /// is known.
    pub fn is_fully_known(&self) -> bool {
        self.width.is_some()
            && self.height.is_some()
            && self.depth.is_some()
            && self.format.is_some()
            && self.samples.is_some()
            && self.base_layer.is_some()
            && self.layer_count.is_some()
            && self.base_level.is_some()
            && self.level_count.is_some()
    }
}

/// Description of a buffer resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferDesc {
    pub buffer: Option<BufferHandle>,
    pub size: Option<u64>,
    pub memory_usage: MemoryUsage,
}

/// A presentation swapchain; acquisition yields one of its images.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub images: Vec<ImageDesc>,
}

/// The payload of a constant node.
#[derive(Clone, Debug)]
pub enum ConstantValue {
    U32(u32),
    U64(u64),
    Format(Format),
    Samples(Samples),
    Image(ImageDesc),
    Buffer(BufferDesc),
    Swapchain(Rc<SwapchainDesc>),
}

impl ConstantValue {
    /// The value as a `u32`, if it is one.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::U32(v) => Some(v),
            _ => None,
        }
    }

    /// The value as a `u64`, widening a `u32`.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::U32(v) => Some(u64::from(v)),
            Self::U64(v) => Some(v),
            _ => None,
        }
    }

    /// The image description, if the value is one.
    pub fn as_image(&self) -> Option<&ImageDesc> {
        match self {
            Self::Image(desc) => Some(desc),
            _ => None,
        }
    }

    /// The buffer description, if the value is one.
    pub fn as_buffer(&self) -> Option<&BufferDesc> {
        match self {
            Self::Buffer(desc) => Some(desc),
            _ => None,
        }
    }

    /// The swapchain, if the value is one.
    pub fn as_swapchain(&self) -> Option<&Rc<SwapchainDesc>> {
        match self {
            Self::Swapchain(swp) => Some(swp),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats() {
        assert!(Format::D32Sfloat.has_depth());
        assert!(Format::D24UnormS8Uint.has_depth());
        assert!(!Format::Rgba8Unorm.has_depth());
    }

    #[test]
    fn image_fully_known() {
        let mut desc = ImageDesc {
            width: Some(2),
            height: Some(2),
            depth: Some(1),
            format: Some(Format::Rgba8Unorm),
            samples: Some(Samples::S1),
            base_layer: Some(0),
            layer_count: Some(1),
            base_level: Some(0),
            level_count: Some(1),
            ..Default::default()
        };
        assert!(desc.is_fully_known());
        desc.samples = None;
        assert!(!desc.is_fully_known());
    }

    #[test]
    fn constant_conversions() {
        assert_eq!(ConstantValue::U32(7).as_u32(), Some(7));
        assert_eq!(ConstantValue::U32(7).as_u64(), Some(7));
        assert_eq!(ConstantValue::U64(9).as_u64(), Some(9));
        assert!(ConstantValue::U64(9).as_u32().is_none());
        assert!(ConstantValue::Buffer(BufferDesc::default()).as_image().is_none());
    }
}
