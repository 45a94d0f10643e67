/// Buffer - Vulkan implementation of the Buffer trait

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use sandbox_3d_engine::sandbox3d::render::{
    validate_copy, Buffer as RendererBuffer, BufferDesc, BufferUsage, MemoryLocation,
};
use sandbox_3d_engine::sandbox3d::{Error, Result};
use sandbox_3d_engine::{engine_err, engine_error, engine_warn_err};
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, SOURCE};
use crate::vulkan_convert::buffer_usage_to_vk;

pub(crate) fn memory_location_to_allocator(location: MemoryLocation) -> gpu_allocator::MemoryLocation {
    match location {
        MemoryLocation::GpuOnly => gpu_allocator::MemoryLocation::GpuOnly,
        MemoryLocation::CpuToGpu => gpu_allocator::MemoryLocation::CpuToGpu,
        MemoryLocation::GpuToCpu => gpu_allocator::MemoryLocation::GpuToCpu,
    }
}

/// Vulkan buffer implementation
pub struct Buffer {
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    desc: BufferDesc,
}

impl Buffer {
    /// Create the buffer, allocate its memory and bind it
    pub(crate) fn create(ctx: Arc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        if desc.size == 0 {
            return Err(engine_warn_err!(SOURCE, "Cannot create a zero-sized buffer"));
        }

        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx.device.create_buffer(&buffer_create_info, None).map_err(|e| {
                engine_err!(SOURCE, "Failed to create buffer of size {} bytes: {:?}", desc.size, e)
            })?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = ctx.lock_allocator().allocate(&AllocationCreateDesc {
                name: "buffer",
                requirements,
                location: memory_location_to_allocator(desc.location),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(_) => {
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!(SOURCE, "Out of GPU memory for buffer (required: {:.2} MB)", size_mb);
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                let _ = ctx.lock_allocator().free(allocation);
                ctx.device.destroy_buffer(buffer, None);
                return Err(engine_err!(SOURCE, "Failed to bind buffer memory: {:?}", e));
            }

            Ok(Self { ctx, buffer, allocation: Some(allocation), desc: *desc })
        }
    }
}

impl RendererBuffer for Buffer {
    fn size(&self) -> u64 {
        self.desc.size
    }

    fn usage(&self) -> BufferUsage {
        self.desc.usage
    }

    fn location(&self) -> MemoryLocation {
        self.desc.location
    }

    fn map(&mut self) -> Result<&mut [u8]> {
        if !self.desc.location.is_host_visible() {
            return Err(Error::InvalidAccess("Cannot map a GpuOnly buffer".to_string()));
        }
        let size = self.desc.size as usize;
        let slice = self
            .allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or_else(|| engine_err!(SOURCE, "Buffer memory is not host mapped"))?;
        Ok(&mut slice[..size])
    }

    fn unmap(&mut self) {
        // Host-visible allocations stay persistently mapped; memory is coherent
    }

    fn copy_from(&mut self, src: &dyn RendererBuffer, size: u64) -> Result<()> {
        validate_copy(src, &*self, size)?;

        // All buffers handed to this device are Vulkan buffers
        let vk_src = unsafe { &*(src as *const dyn RendererBuffer as *const Buffer) };
        let (src_buffer, dst_buffer) = (vk_src.buffer, self.buffer);

        self.ctx.one_shot(|cmd| unsafe {
            let region = vk::BufferCopy::default().size(size);
            self.ctx.device.cmd_copy_buffer(cmd, src_buffer, dst_buffer, &[region]);
        })
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                let _ = self.ctx.lock_allocator().free(allocation);
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
