/// Swapchain selection logic and lifecycle state
///
/// The backend queries the surface, converts the answers into these types
/// and lets `SwapchainConfig::select` decide. Keeping the choice here means
/// it can be tested without a window.

use crate::error::{Error, Result};
use crate::renderer::{QueueFamilyIndices, TextureFormat};

/// Width and height in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (minimised window)
    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Component-wise clamp
    pub fn clamp(&self, min: Extent2D, max: Extent2D) -> Extent2D {
        Extent2D {
            width: self.width.clamp(min.width, max.width.max(min.width)),
            height: self.height.clamp(min.height, max.height.max(min.height)),
        }
    }
}

/// Surface color space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Standard sRGB non-linear
    SrgbNonLinear,
    /// Any other color space (raw backend value)
    Other(i32),
}

/// One format/color-space pair supported by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFormat {
    pub format: TextureFormat,
    pub color_space: ColorSpace,
}

/// Presentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentMode {
    /// No vsync, may tear
    Immediate,
    /// Triple-buffered, low latency
    Mailbox,
    /// Vsync'd queue, always available
    Fifo,
    /// Vsync'd queue that tears when late
    FifoRelaxed,
}

/// How swapchain images are shared between queue families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingMode {
    Exclusive,
    Concurrent,
}

/// Surface capabilities as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    /// Current extent; `u32::MAX` in both dimensions means "defined by the swapchain"
    pub current_extent: Extent2D,
    pub min_extent: Extent2D,
    pub max_extent: Extent2D,
    pub min_image_count: u32,
    /// 0 means no upper bound
    pub max_image_count: u32,
}

impl SurfaceCapabilities {
    /// Sentinel value of `current_extent` meaning "undefined"
    pub const UNDEFINED_EXTENT: u32 = u32::MAX;
}

// ===== SELECTION =====

/// Prefer B8G8R8A8_SRGB in the non-linear sRGB space, else the first format
pub fn choose_surface_format(available: &[SurfaceFormat]) -> Option<SurfaceFormat> {
    available
        .iter()
        .find(|f| {
            f.format == TextureFormat::B8G8R8A8_SRGB && f.color_space == ColorSpace::SrgbNonLinear
        })
        .or_else(|| available.first())
        .copied()
}

/// Prefer Mailbox, else Fifo (always supported)
pub fn choose_present_mode(available: &[PresentMode]) -> PresentMode {
    if available.contains(&PresentMode::Mailbox) {
        PresentMode::Mailbox
    } else {
        PresentMode::Fifo
    }
}

/// Resolve the swapchain extent
///
/// An undefined current extent is replaced by the framebuffer size. The
/// result is always clamped to the surface bounds, so a 500x0 request on a
/// surface with a 1x1 minimum becomes 500x1.
pub fn choose_extent(caps: &SurfaceCapabilities, framebuffer: Extent2D) -> Extent2D {
    let requested = if caps.current_extent.width == SurfaceCapabilities::UNDEFINED_EXTENT {
        framebuffer
    } else {
        caps.current_extent
    };
    requested.clamp(caps.min_extent, caps.max_extent)
}

/// `min_image_count + 1`, capped by `max_image_count` when finite
pub fn choose_image_count(caps: &SurfaceCapabilities) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 && desired > caps.max_image_count {
        caps.max_image_count
    } else {
        desired
    }
}

/// Exclusive when one family does graphics and present, concurrent otherwise
pub fn choose_sharing_mode(indices: &QueueFamilyIndices) -> SharingMode {
    if indices.is_shared() {
        SharingMode::Exclusive
    } else {
        SharingMode::Concurrent
    }
}

/// Complete set of swapchain creation choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub surface_format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub extent: Extent2D,
    pub image_count: u32,
    pub sharing_mode: SharingMode,
}

impl SwapchainConfig {
    /// Apply every selection rule
    pub fn select(
        caps: &SurfaceCapabilities,
        formats: &[SurfaceFormat],
        present_modes: &[PresentMode],
        framebuffer: Extent2D,
        indices: &QueueFamilyIndices,
    ) -> Result<Self> {
        let surface_format = choose_surface_format(formats).ok_or_else(|| {
            Error::InitializationFailed("Surface reports no formats".to_string())
        })?;

        Ok(Self {
            surface_format,
            present_mode: choose_present_mode(present_modes),
            extent: choose_extent(caps, framebuffer),
            image_count: choose_image_count(caps),
            sharing_mode: choose_sharing_mode(indices),
        })
    }
}

// ===== LIFECYCLE =====

/// Swapchain lifecycle
///
/// `Uninitialized -> Ready -> (Stale -> Ready)* -> Destroyed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    Uninitialized,
    Ready,
    Stale,
    Destroyed,
}

impl SwapchainState {
    /// Check whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: SwapchainState) -> bool {
        use SwapchainState::*;
        matches!(
            (self, next),
            (Uninitialized, Ready)
                | (Ready, Ready)
                | (Ready, Stale)
                | (Stale, Stale)
                | (Stale, Ready)
                | (Uninitialized, Destroyed)
                | (Ready, Destroyed)
                | (Stale, Destroyed)
                | (Destroyed, Destroyed)
        )
    }

    /// Move to `next`, failing with `InvalidAccess` on an illegal transition
    pub fn transition(&mut self, next: SwapchainState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(Error::InvalidAccess(format!(
                "Illegal swapchain transition {:?} -> {:?}",
                self, next
            )));
        }
        *self = next;
        Ok(())
    }

    /// Apply the outcome of a rebuild attempt
    ///
    /// Success moves to `Ready`, a stale surface to `Stale`. Any other
    /// failure leaves the state unchanged.
    pub fn settle_rebuild<T>(&mut self, outcome: &Result<T>) -> Result<()> {
        match outcome {
            Ok(_) => self.transition(SwapchainState::Ready),
            Err(e) if e.is_surface_stale() => self.transition(SwapchainState::Stale),
            Err(_) => Ok(()),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self == SwapchainState::Ready
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
