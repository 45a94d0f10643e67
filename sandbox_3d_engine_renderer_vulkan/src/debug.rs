/// Vulkan debug messenger - validation layer messages routed to the engine logger
///
/// The callback is installed only when the `vulkan-validation` feature is on
/// and the Khronos layer is present. Statistics and the report are always
/// compiled so applications can call them unconditionally.

use ash::vk;
use colored::*;
use rustc_hash::FxHashMap;
use sandbox_3d_engine::sandbox3d::log::LogSeverity;
use sandbox_3d_engine::sandbox3d::{DebugMessageFilter, DebugSeverity, ValidationStats};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

pub(crate) const SOURCE: &str = "sandbox3d::vulkan::validation";

/// Active callback configuration
static DEBUG_CONFIG: Mutex<Option<Config>> = Mutex::new(None);

/// Per-severity counters
static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrences of each distinct message text
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Debug configuration read by the callback
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub severity: DebugSeverity,
    pub message_filter: DebugMessageFilter,
    pub enable_stats: bool,
}

impl From<&sandbox_3d_engine::sandbox3d::Config> for Config {
    fn from(config: &sandbox_3d_engine::sandbox3d::Config) -> Self {
        Self {
            severity: config.debug_severity,
            message_filter: config.debug_filter,
            enable_stats: config.enable_validation_stats,
        }
    }
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn increment(&self, severity: LogSeverity) {
        let counter = match severity {
            LogSeverity::Error => &self.errors,
            LogSeverity::Warn => &self.warnings,
            LogSeverity::Info => &self.info,
            LogSeverity::Debug | LogSeverity::Trace => &self.verbose,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get_stats(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Install the callback configuration and reset statistics
pub fn init_debug_config(config: Config) {
    VALIDATION_STATS.reset();
    *MESSAGE_TRACKER.lock().unwrap_or_else(PoisonError::into_inner) = Some(FxHashMap::default());
    *DEBUG_CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = Some(config);
}

/// Remove the callback configuration (statistics are kept for the final report)
pub fn cleanup_debug_config() {
    *DEBUG_CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = None;
}

pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.get_stats()
}

/// Print a colored summary of the validation messages seen so far
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "✓ No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());

    let repeated = MESSAGE_TRACKER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map_or(0, |messages| messages.values().filter(|&&count| count > 1).count());
    if repeated > 0 {
        println!("\n  {} {} message(s) appeared multiple times", "ℹ".cyan(), repeated);
    }

    println!("{}\n", "====================================".bright_blue().bold());
}

// ===== FILTERS =====

/// Engine severity of a Vulkan message severity
pub(crate) fn map_severity(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Info
    } else {
        LogSeverity::Debug
    }
}

pub(crate) fn passes_severity(filter: DebugSeverity, severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> bool {
    match filter {
        DebugSeverity::ErrorsOnly => severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR),
        DebugSeverity::ErrorsAndWarnings => severity.intersects(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        ),
        DebugSeverity::All => true,
    }
}

/// Category label, or `None` when the filter hides it
pub(crate) fn category(
    filter: &DebugMessageFilter,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
) -> Option<&'static str> {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        filter.show_validation.then_some("Validation")
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        filter.show_performance.then_some("Performance")
    } else {
        filter.show_general.then_some("General")
    }
}

/// Severity flags the messenger subscribes to
pub(crate) fn messenger_severity_flags(filter: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    let errors = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    match filter {
        DebugSeverity::ErrorsOnly => errors,
        DebugSeverity::ErrorsAndWarnings => errors | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        DebugSeverity::All => {
            errors
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

/// Count one more occurrence of `message`
fn track_message(message: &str) -> u32 {
    let mut guard = MESSAGE_TRACKER.lock().unwrap_or_else(PoisonError::into_inner);
    let count = guard.get_or_insert_with(FxHashMap::default).entry(message.to_string()).or_insert(0);
    *count += 1;
    *count
}

/// Filter, count and log one validation message
///
/// Returns the formatted line when the message was emitted.
pub(crate) fn handle_message(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    message_id: &str,
    message: &str,
) -> Option<String> {
    let config = (*DEBUG_CONFIG.lock().unwrap_or_else(PoisonError::into_inner))?;

    if !passes_severity(config.severity, severity) {
        return None;
    }
    let type_str = category(&config.message_filter, message_type)?;

    let log_severity = map_severity(severity);
    let occurrences = if config.enable_stats {
        VALIDATION_STATS.increment(log_severity);
        track_message(message)
    } else {
        1
    };

    let repeat = if occurrences > 1 { format!(" [x{}]", occurrences) } else { String::new() };
    let line = format!("[{}] {}: {}{}", type_str, message_id, message, repeat);
    sandbox_3d_engine::sandbox3d::Engine::log(log_severity, SOURCE, line.clone());
    Some(line)
}

/// Messenger callback; never asks the driver to abort the call
#[cfg(feature = "vulkan-validation")]
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    unsafe {
        if p_callback_data.is_null() {
            return vk::FALSE;
        }
        let data = &*p_callback_data;
        let message_id = data.message_id_name_as_c_str().map_or("Unknown".into(), |s| s.to_string_lossy());
        let message = data.message_as_c_str().map_or("No message".into(), |s| s.to_string_lossy());

        handle_message(message_severity, message_type, &message_id, &message);
    }
    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
