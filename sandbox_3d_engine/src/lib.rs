/*!
# Sandbox 3D Engine

Core traits and types of a minimal real-time 3D renderer.

The crate is platform-agnostic: GPU resources are reached through traits
(`GraphicsDevice`, `Buffer`, `Image`, `Pipeline`, `CommandList`) and the
per-frame protocol is driven by `FrameOrchestrator` over a `FrameBackend`.
The Vulkan implementation lives in `sandbox_3d_engine_renderer_vulkan`.

## Architecture

- **Device**: physical-device scoring and queue-family selection
- **Swapchain**: surface format / present mode / extent / image count rules and lifecycle state
- **Buffer / Image**: GPU memory and the staged-upload protocol
- **PipelineBuilder**: declarative pipeline description, single `build`
- **FrameOrchestrator**: acquire → record → submit → present over N frame slots
- **Scene**: meshes, materials, entity registry and the forward pass
*/

// Internal modules
mod error;
mod engine;
mod config;
mod input;
pub mod log;
pub mod renderer;
pub mod scene;
pub mod camera;

// Main sandbox3d namespace module
pub mod sandbox3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton (global logger)
    pub use crate::engine::Engine;

    // Startup options
    pub use crate::config::{Config, DebugMessageFilter, DebugSeverity, ValidationStats};

    // Logging sub-module (types only, macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Render sub-module with all rendering types
    pub mod render {
        pub use crate::renderer::*;
    }

    // Scene sub-module
    pub mod scene {
        pub use crate::scene::*;
    }

    // Camera and input collaborators
    pub use crate::camera::Camera;
    pub use crate::input::{InputState, KeyCode, MouseButton};
}

// Re-export math library at crate root
pub use glam;
