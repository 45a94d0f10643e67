//! Startup configuration
//!
//! A single `Config` value carries everything the core needs at startup:
//! window size and title, validation settings and the frame-in-flight count.

/// Severity filter applied to validation-layer messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything, including info and verbose
    All,
}

/// Category filter applied to validation-layer messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Counters of validation messages received since the device was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    /// Sum of all counters
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    /// True when at least one error was reported
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Startup options
///
/// # Example
///
/// ```
/// use sandbox_3d_engine::sandbox3d::Config;
///
/// let config = Config::default()
///     .with_window_size(800, 600)
///     .with_title("Demo")
///     .with_validation(false);
/// assert_eq!(config.aspect_ratio(), 800.0 / 600.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Initial window width in pixels
    pub window_width: u32,
    /// Initial window height in pixels
    pub window_height: u32,
    /// Window title
    pub window_title: String,
    /// Request the Khronos validation layer (needs the `vulkan-validation` backend feature)
    pub enable_validation: bool,
    /// Which validation messages reach the logger
    pub debug_severity: DebugSeverity,
    /// Which validation categories reach the logger
    pub debug_filter: DebugMessageFilter,
    /// Count validation messages (see `ValidationStats`)
    pub enable_validation_stats: bool,
    /// Number of frame-in-flight slots
    pub frames_in_flight: usize,
    /// Clear color of the main render pass (RGBA)
    pub clear_color: [f32; 4],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            window_title: "Vulkan Sandbox".to_string(),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_filter: DebugMessageFilter::default(),
            enable_validation_stats: true,
            frames_in_flight: 2,
            clear_color: [0.1, 0.1, 0.1, 1.0],
        }
    }
}

impl Config {
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = title.into();
        self
    }

    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    pub fn with_debug_severity(mut self, severity: DebugSeverity) -> Self {
        self.debug_severity = severity;
        self
    }

    pub fn with_debug_filter(mut self, filter: DebugMessageFilter) -> Self {
        self.debug_filter = filter;
        self
    }

    pub fn with_validation_stats(mut self, enable: bool) -> Self {
        self.enable_validation_stats = enable;
        self
    }

    /// Set the frame-in-flight count (values below 1 become 1)
    pub fn with_frames_in_flight(mut self, count: usize) -> Self {
        self.frames_in_flight = count.max(1);
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Frame-in-flight count as used by the renderer (never 0)
    pub fn effective_frames_in_flight(&self) -> usize {
        self.frames_in_flight.max(1)
    }

    /// Width / height of the initial window (1.0 for a degenerate height)
    pub fn aspect_ratio(&self) -> f32 {
        if self.window_height == 0 {
            1.0
        } else {
            self.window_width as f32 / self.window_height as f32
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
