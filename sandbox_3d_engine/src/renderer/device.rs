/// GraphicsDevice trait, physical device description and device selection
///
/// Selection is backend-independent: the backend describes every physical
/// device it enumerates as a `PhysicalDeviceInfo`, and `select_device`
/// applies the scoring rubric.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::renderer::{
    Buffer, BufferDesc, Image, ImageDesc,
    Pipeline, PipelineDesc, PipelineLayout, PipelineLayoutDesc,
};

// ===== PHYSICAL DEVICE DESCRIPTION =====

/// Physical device category reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    DiscreteGpu,
    IntegratedGpu,
    VirtualGpu,
    Cpu,
    Other,
}

impl DeviceType {
    /// Base score of the device category
    pub fn base_score(&self) -> u32 {
        match self {
            DeviceType::DiscreteGpu => 1000,
            DeviceType::IntegratedGpu => 500,
            DeviceType::VirtualGpu => 100,
            DeviceType::Cpu | DeviceType::Other => 10,
        }
    }
}

/// Capabilities of one queue family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    /// Family index
    pub index: u32,
    /// Supports graphics commands
    pub graphics: bool,
    /// Can present to the live surface
    pub present: bool,
}

/// Everything the selection rubric needs to know about a physical device
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    pub name: String,
    pub device_type: DeviceType,
    pub supports_anisotropy: bool,
    pub has_swapchain_extension: bool,
    pub surface_format_count: u32,
    pub present_mode_count: u32,
    pub max_image_dimension_2d: u32,
    pub queue_families: Vec<QueueFamilyInfo>,
}

/// Graphics and present family indices for one physical device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both families were found
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Graphics and present are served by the same family
    pub fn is_shared(&self) -> bool {
        self.is_complete() && self.graphics == self.present
    }

    /// Distinct family indices, graphics first
    pub fn unique(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.graphics.into_iter().chain(self.present).collect();
        indices.dedup();
        indices
    }
}

/// Find graphics and present families
///
/// A family supporting both is preferred. Otherwise the first graphics
/// family and the first present family are used.
pub fn find_queue_families(families: &[QueueFamilyInfo]) -> QueueFamilyIndices {
    if let Some(both) = families.iter().find(|f| f.graphics && f.present) {
        return QueueFamilyIndices {
            graphics: Some(both.index),
            present: Some(both.index),
        };
    }

    QueueFamilyIndices {
        graphics: families.iter().find(|f| f.graphics).map(|f| f.index),
        present: families.iter().find(|f| f.present).map(|f| f.index),
    }
}

/// Score a physical device, or `None` when it is unusable
///
/// Rejections are absolute: a missing queue family, a missing swapchain
/// extension or a surface without formats or present modes disqualifies
/// the device whatever its type.
pub fn score_device(info: &PhysicalDeviceInfo) -> Option<u32> {
    if !find_queue_families(&info.queue_families).is_complete() {
        return None;
    }
    if !info.has_swapchain_extension {
        return None;
    }
    if info.surface_format_count == 0 || info.present_mode_count == 0 {
        return None;
    }

    let mut score = info.device_type.base_score();
    score = score.saturating_add(info.max_image_dimension_2d);
    if info.supports_anisotropy {
        score = score.saturating_add(200);
    }
    Some(score)
}

/// Pick the best device (ties keep the first enumerated one)
pub fn select_device(devices: &[PhysicalDeviceInfo]) -> Result<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (index, info) in devices.iter().enumerate() {
        if let Some(score) = score_device(info) {
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }
    }

    best.map(|(index, _)| index).ok_or_else(|| {
        Error::InitializationFailed(format!(
            "No suitable GPU among {} physical device(s)",
            devices.len()
        ))
    })
}

// ===== GRAPHICS DEVICE TRAIT =====

/// Resource factory implemented by the backend's device context
///
/// Resources returned here own their GPU memory and release it on drop.
pub trait GraphicsDevice: Send + Sync {
    /// Allocate a buffer (fails with `OutOfMemory` when the heap is exhausted)
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Box<dyn Buffer>>;

    /// Allocate an image with a default view, in the `Undefined` layout
    fn create_image(&self, desc: &ImageDesc) -> Result<Box<dyn Image>>;

    /// Create a pipeline layout (descriptor sets + push constants)
    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<Arc<dyn PipelineLayout>>;

    /// Create an immutable graphics pipeline
    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>>;

    /// Block until the device has finished all submitted work
    fn wait_idle(&self) -> Result<()>;
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
