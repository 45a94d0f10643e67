/// Renderer module - all rendering-related types and traits

// Module declarations
pub mod device;
pub mod swapchain;
pub mod buffer;
pub mod image;
pub mod pipeline;
pub mod command_list;
pub mod render_pass;
pub mod frame;

#[cfg(test)]
pub mod mock_device;

// Re-export everything
pub use device::*;
pub use swapchain::*;
pub use buffer::*;
pub use image::*;
pub use pipeline::*;
pub use command_list::*;
pub use render_pass::*;
pub use frame::*;
