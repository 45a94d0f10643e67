/// Buffer trait, buffer descriptor and the staged-upload protocol

use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::renderer::GraphicsDevice;

/// Where the buffer memory lives and who can touch it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Device-local, never mappable
    GpuOnly,
    /// Host-visible, written by the CPU and read by the GPU
    CpuToGpu,
    /// Host-visible, written by the GPU and read back by the CPU
    GpuToCpu,
}

impl MemoryLocation {
    /// True for locations that may be mapped
    pub fn is_host_visible(&self) -> bool {
        !matches!(self, MemoryLocation::GpuOnly)
    }
}

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
    /// Memory location
    pub location: MemoryLocation,
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types (e.g., VulkanBuffer).
/// The buffer is automatically destroyed when dropped.
pub trait Buffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    /// Usage flags the buffer was created with
    fn usage(&self) -> BufferUsage;

    /// Memory location the buffer was created with
    fn location(&self) -> MemoryLocation;

    /// Map the whole buffer for CPU access
    ///
    /// Fails with `InvalidAccess` for `GpuOnly` buffers. The returned slice
    /// is exactly `size()` bytes long.
    fn map(&mut self) -> Result<&mut [u8]>;

    /// End CPU access started by `map`
    fn unmap(&mut self);

    /// Copy `size` bytes from `src` on the GPU
    ///
    /// Records a one-shot command buffer, submits it and blocks until the
    /// copy has completed.
    fn copy_from(&mut self, src: &dyn Buffer, size: u64) -> Result<()>;

    /// Write `data` at `offset` through a scoped map
    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size()) {
            return Err(Error::InvalidResource(format!(
                "Write of {} bytes at offset {} exceeds buffer size {}",
                data.len(), offset, self.size()
            )));
        }
        let region = self.map()?;
        let start = offset as usize;
        region[start..start + data.len()].copy_from_slice(data);
        self.unmap();
        Ok(())
    }

    /// Read the whole buffer through a scoped map
    fn read(&mut self) -> Result<Vec<u8>> {
        let bytes = self.map()?.to_vec();
        self.unmap();
        Ok(bytes)
    }
}

/// Check the usage and size contract of a GPU-side buffer copy
pub fn validate_copy(src: &dyn Buffer, dst: &dyn Buffer, size: u64) -> Result<()> {
    if !src.usage().contains(BufferUsage::TRANSFER_SRC) {
        return Err(Error::InvalidResource("Copy source lacks TRANSFER_SRC usage".to_string()));
    }
    if !dst.usage().contains(BufferUsage::TRANSFER_DST) {
        return Err(Error::InvalidResource("Copy destination lacks TRANSFER_DST usage".to_string()));
    }
    if size == 0 || size > src.size() || size > dst.size() {
        return Err(Error::InvalidResource(format!(
            "Copy size {} invalid for source of {} and destination of {} bytes",
            size, src.size(), dst.size()
        )));
    }
    Ok(())
}

/// Upload `data` into a new device-only buffer
///
/// 1. allocate a host-visible staging buffer and copy `data` into it
/// 2. allocate the `GpuOnly` destination (`usage | TRANSFER_DST`)
/// 3. copy staging -> destination on the GPU (blocking)
/// 4. release the staging buffer
pub fn create_buffer_with_data(
    device: &dyn GraphicsDevice,
    data: &[u8],
    usage: BufferUsage,
) -> Result<Box<dyn Buffer>> {
    if data.is_empty() {
        return Err(Error::InvalidResource("Cannot upload an empty buffer".to_string()));
    }
    let size = data.len() as u64;

    let mut staging = device.create_buffer(&BufferDesc {
        size,
        usage: BufferUsage::TRANSFER_SRC,
        location: MemoryLocation::CpuToGpu,
    })?;
    staging.write(0, data)?;

    let mut buffer = device.create_buffer(&BufferDesc {
        size,
        usage: usage | BufferUsage::TRANSFER_DST,
        location: MemoryLocation::GpuOnly,
    })?;
    buffer.copy_from(&*staging, size)?;

    drop(staging);
    Ok(buffer)
}

/// Copy a buffer into a `GpuToCpu` buffer and read it back
///
/// `src` must have been created with `TRANSFER_SRC`.
pub fn read_buffer_back(device: &dyn GraphicsDevice, src: &dyn Buffer) -> Result<Vec<u8>> {
    let mut readback = device.create_buffer(&BufferDesc {
        size: src.size(),
        usage: BufferUsage::TRANSFER_DST,
        location: MemoryLocation::GpuToCpu,
    })?;
    readback.copy_from(src, src.size())?;
    readback.read()
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
