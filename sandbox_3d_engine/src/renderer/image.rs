/// Image trait, image descriptor, formats and layout transitions

use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::renderer::{Buffer, BufferUsage, BufferDesc, MemoryLocation, GraphicsDevice};

/// Image and surface format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
    /// Format unknown to the engine (raw backend value)
    Other(i32),
}

impl TextureFormat {
    /// Size of one texel, `None` for unknown formats
    pub fn bytes_per_pixel(&self) -> Option<u32> {
        match self {
            TextureFormat::Other(_) => None,
            _ => Some(4),
        }
    }

    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::D32_SFLOAT | TextureFormat::D24_UNORM_S8_UINT)
    }

    /// Aspect a default view of this format covers
    pub fn aspect(&self) -> ImageAspect {
        if self.is_depth() {
            ImageAspect::Depth
        } else {
            ImageAspect::Color
        }
    }
}

/// Part of the image a view covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAspect {
    Color,
    Depth,
}

/// Texel arrangement in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTiling {
    Optimal,
    Linear,
}

bitflags! {
    /// Image usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const SAMPLED = 1 << 0;
        const TRANSFER_SRC = 1 << 1;
        const TRANSFER_DST = 1 << 2;
        const COLOR_ATTACHMENT = 1 << 3;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 4;
    }
}

/// Descriptor for creating an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub tiling: ImageTiling,
    pub usage: ImageUsage,
    pub mip_levels: u32,
}

impl ImageDesc {
    /// Sampled texture that receives data through a staging upload
    pub fn texture(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            tiling: ImageTiling::Optimal,
            usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
            mip_levels: 1,
        }
    }

    /// Depth attachment in D32_SFLOAT
    pub fn depth(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::D32_SFLOAT,
            tiling: ImageTiling::Optimal,
            usage: ImageUsage::DEPTH_STENCIL_ATTACHMENT,
            mip_levels: 1,
        }
    }

    /// Byte size of mip level 0, `None` for unknown formats
    pub fn byte_size(&self) -> Option<u64> {
        self.format
            .bytes_per_pixel()
            .map(|bpp| self.width as u64 * self.height as u64 * bpp as u64)
    }
}

// ===== LAYOUTS =====

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    TransferDst,
    ShaderReadOnly,
    ColorAttachment,
    DepthStencilAttachment,
    PresentSrc,
}

/// Supported layout transitions
///
/// The backend maps each one to a pipeline barrier (stages + access masks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutTransition {
    /// Fresh image about to receive a buffer copy
    UndefinedToTransferDst,
    /// Copied image about to be sampled by fragment shaders
    TransferDstToShaderReadOnly,
    /// Fresh depth buffer
    UndefinedToDepthStencilAttachment,
    /// Fresh color target
    UndefinedToColorAttachment,
}

impl LayoutTransition {
    pub fn old_layout(&self) -> ImageLayout {
        match self {
            LayoutTransition::TransferDstToShaderReadOnly => ImageLayout::TransferDst,
            _ => ImageLayout::Undefined,
        }
    }

    pub fn new_layout(&self) -> ImageLayout {
        match self {
            LayoutTransition::UndefinedToTransferDst => ImageLayout::TransferDst,
            LayoutTransition::TransferDstToShaderReadOnly => ImageLayout::ShaderReadOnly,
            LayoutTransition::UndefinedToDepthStencilAttachment => ImageLayout::DepthStencilAttachment,
            LayoutTransition::UndefinedToColorAttachment => ImageLayout::ColorAttachment,
        }
    }
}

impl ImageLayout {
    /// Look up the barrier for `self -> new_layout`
    ///
    /// Anything outside the table is a programming error and fails with
    /// `InvalidAccess`.
    pub fn transition_to(self, new_layout: ImageLayout) -> Result<LayoutTransition> {
        use ImageLayout::*;
        match (self, new_layout) {
            (Undefined, TransferDst) => Ok(LayoutTransition::UndefinedToTransferDst),
            (TransferDst, ShaderReadOnly) => Ok(LayoutTransition::TransferDstToShaderReadOnly),
            (Undefined, DepthStencilAttachment) => Ok(LayoutTransition::UndefinedToDepthStencilAttachment),
            (Undefined, ColorAttachment) => Ok(LayoutTransition::UndefinedToColorAttachment),
            (old, new) => Err(Error::InvalidAccess(format!(
                "Unsupported image layout transition {:?} -> {:?}",
                old, new
            ))),
        }
    }
}

// ===== SAMPLER =====

/// Texel filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerFilter {
    Nearest,
    Linear,
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

/// Sampler parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub filter: SamplerFilter,
    pub address_mode: AddressMode,
    /// Maximum anisotropy; ignored when the device lacks the feature
    pub max_anisotropy: Option<f32>,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            filter: SamplerFilter::Linear,
            address_mode: AddressMode::Repeat,
            max_anisotropy: Some(16.0),
        }
    }
}

// ===== IMAGE TRAIT =====

/// Image resource trait
///
/// An image has exactly one current layout. Every operation checks it and
/// fails with `InvalidAccess` instead of recording undefined GPU work.
pub trait Image: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> TextureFormat;
    fn mip_levels(&self) -> u32;

    /// Current layout
    fn layout(&self) -> ImageLayout;

    /// (Re)create the image view for `aspect`
    fn create_view(&mut self, aspect: ImageAspect) -> Result<()>;

    /// Create (or replace) the sampler attached to this image
    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<()>;

    /// True once `create_sampler` succeeded
    fn has_sampler(&self) -> bool;

    /// Record and wait for a layout barrier
    fn transition_layout(&mut self, new_layout: ImageLayout) -> Result<()>;

    /// Copy mip level 0 from `buffer` (image must be in `TransferDst`)
    fn copy_from_buffer(&mut self, buffer: &dyn Buffer) -> Result<()>;
}

/// Check the preconditions of a buffer-to-image copy
pub fn validate_image_copy(image: &dyn Image, buffer: &dyn Buffer) -> Result<()> {
    if image.layout() != ImageLayout::TransferDst {
        return Err(Error::InvalidAccess(format!(
            "Buffer-to-image copy requires TransferDst layout, image is in {:?}",
            image.layout()
        )));
    }
    if !buffer.usage().contains(BufferUsage::TRANSFER_SRC) {
        return Err(Error::InvalidResource("Copy source lacks TRANSFER_SRC usage".to_string()));
    }
    let bpp = image.format().bytes_per_pixel().ok_or_else(|| {
        Error::InvalidResource(format!("Cannot copy into format {:?}", image.format()))
    })?;
    let needed = image.width() as u64 * image.height() as u64 * bpp as u64;
    if buffer.size() < needed {
        return Err(Error::InvalidResource(format!(
            "Source buffer holds {} bytes, image needs {}",
            buffer.size(), needed
        )));
    }
    Ok(())
}

/// Upload pixels into a fresh image and leave it shader-readable
///
/// Undefined -> TransferDst, staged copy, TransferDst -> ShaderReadOnly.
pub fn upload_image_data(
    device: &dyn GraphicsDevice,
    image: &mut dyn Image,
    pixels: &[u8],
) -> Result<()> {
    let bpp = image.format().bytes_per_pixel().ok_or_else(|| {
        Error::InvalidResource(format!("Cannot upload into format {:?}", image.format()))
    })?;
    let expected = image.width() as u64 * image.height() as u64 * bpp as u64;
    if pixels.len() as u64 != expected {
        return Err(Error::InvalidResource(format!(
            "Pixel data is {} bytes, {}x{} image needs {}",
            pixels.len(), image.width(), image.height(), expected
        )));
    }

    let mut staging = device.create_buffer(&BufferDesc {
        size: expected,
        usage: BufferUsage::TRANSFER_SRC,
        location: MemoryLocation::CpuToGpu,
    })?;
    staging.write(0, pixels)?;

    image.transition_layout(ImageLayout::TransferDst)?;
    image.copy_from_buffer(&*staging)?;
    image.transition_layout(ImageLayout::ShaderReadOnly)?;
    Ok(())
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
