/*!
# Sandbox 3D Engine - Vulkan Backend

Vulkan implementation of the `sandbox_3d_engine` traits, built on `ash`
for the API bindings and `gpu-allocator` for device memory.

- `VulkanDevice` creates buffers, images, pipeline layouts and pipelines
- `VulkanRenderer` owns the window swapchain and runs the frame loop

Validation layer support is compiled in with the `vulkan-validation`
feature and switched on at runtime through `Config::enable_validation`.

```no_run
use sandbox_3d_engine::sandbox3d::Config;
use sandbox_3d_engine_renderer_vulkan::sandbox3d::VulkanRenderer;

# fn run(window: &winit::window::Window) -> sandbox_3d_engine::sandbox3d::Result<()> {
let size = window.inner_size();
let config = Config::default().with_window_size(size.width, size.height);
let renderer = VulkanRenderer::new(window, &config)?;
println!("Rendering on {}", renderer.device().device_name());
# Ok(())
# }
```
*/

mod debug;
mod vulkan_context;
mod vulkan_convert;
mod vulkan_buffer;
mod vulkan_image;
mod vulkan_render_pass;
mod vulkan_pipeline;
mod vulkan_swapchain;
mod vulkan_command_list;
mod vulkan_device;
mod vulkan_renderer;

pub mod sandbox3d {
    pub use crate::vulkan_context::GpuContext;
    pub use crate::vulkan_device::VulkanDevice;
    pub use crate::vulkan_renderer::{VulkanFrameBackend, VulkanRenderer};
    pub use crate::vulkan_swapchain::Swapchain;

    // Validation message routing and statistics
    pub use crate::debug::{get_validation_stats, print_validation_stats_report, Config as DebugConfig};
}
