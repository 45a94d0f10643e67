//! Error types for the Sandbox3D engine
//!
//! One error enum covers the whole rendering core: bootstrap failures,
//! GPU memory exhaustion, invalid resource access, stale surfaces and
//! pipeline construction failures.

use std::fmt;

/// Result type for Sandbox3D engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Sandbox3D engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan driver failure not covered by another variant)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (bad size, bad index, wrong usage)
    InvalidResource(String),

    /// Initialization failed (no suitable device, surface or context creation failure)
    InitializationFailed(String),

    /// Invalid access (mapping device-only memory, wrong image layout, incompatible render pass)
    InvalidAccess(String),

    /// Surface is out of date or suboptimal; the swapchain must be rebuilt
    SurfaceStale,

    /// Shader binary could not be read or is malformed
    ShaderLoad(String),

    /// The device rejected the combined pipeline state
    PipelineCreation(String),
}

impl Error {
    /// True for conditions the frame orchestrator recovers from locally
    pub fn is_surface_stale(&self) -> bool {
        matches!(self, Error::SurfaceStale)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidAccess(msg) => write!(f, "Invalid access: {}", msg),
            Error::SurfaceStale => write!(f, "Surface is out of date"),
            Error::ShaderLoad(msg) => write!(f, "Shader load failed: {}", msg),
            Error::PipelineCreation(msg) => write!(f, "Pipeline creation failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Log an ERROR message and produce an `Error::BackendError` with the same text
///
/// # Example
///
/// ```no_run
/// # use sandbox_3d_engine::engine_err;
/// let err = engine_err!("sandbox3d::vulkan", "Failed to create fence: {}", 42);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::sandbox3d::Engine::log_detailed(
            $crate::sandbox3d::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::sandbox3d::Error::BackendError(message)
    }};
}

/// Log an ERROR message and return `Err(Error::BackendError)` from the enclosing function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log a WARN message and produce an `Error::InvalidResource` with the same text
///
/// Used for caller mistakes that do not indicate a driver failure.
#[macro_export]
macro_rules! engine_warn_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::sandbox3d::Engine::log(
            $crate::sandbox3d::log::LogSeverity::Warn,
            $source,
            message.clone()
        );
        $crate::sandbox3d::Error::InvalidResource(message)
    }};
}

/// Log a WARN message and return `Err(Error::InvalidResource)` from the enclosing function
#[macro_export]
macro_rules! engine_bail_warn {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_warn_err!($source, $($arg)*))
    };
}
