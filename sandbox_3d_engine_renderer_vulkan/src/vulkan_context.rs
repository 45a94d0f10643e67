/// GpuContext - instance, surface, device and allocator shared by every Vulkan object
///
/// Every resource (buffer, image, pipeline, swapchain, frame backend) holds an
/// `Arc<GpuContext>`, so the context is destroyed after the last of them.
/// The window the surface was created from must outlive the context.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use sandbox_3d_engine::sandbox3d::render::{
    find_queue_families, score_device, select_device, PhysicalDeviceInfo, QueueFamilyIndices,
    QueueFamilyInfo,
};
use sandbox_3d_engine::sandbox3d::{Config, Error, Result};
use sandbox_3d_engine::{engine_debug, engine_err, engine_error, engine_info, engine_warn};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use crate::vulkan_convert::device_type_from_vk;

pub(crate) const SOURCE: &str = "sandbox3d::vulkan";

const VALIDATION_LAYER: &std::ffi::CStr = c"VK_LAYER_KHRONOS_validation";

/// Shared GPU context
pub struct GpuContext {
    _entry: ash::Entry,
    instance: ash::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,

    pub(crate) surface_loader: ash::khr::surface::Instance,
    pub(crate) surface: vk::SurfaceKHR,

    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: ash::Device,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,

    pub(crate) queue_families: QueueFamilyIndices,
    pub(crate) graphics_family: u32,
    pub(crate) present_family: u32,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,
    /// Queues are externally synchronized; every submit and present takes this lock
    queue_lock: Mutex<()>,

    /// Dropped explicitly, before the device
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,

    /// TRANSIENT + RESET pool for blocking one-shot uploads
    upload_pool: Mutex<vk::CommandPool>,

    pub(crate) anisotropy_enabled: bool,
    pub(crate) max_anisotropy: f32,
    device_name: String,
}

impl GpuContext {
    /// Create instance, surface, device, queues and allocator for `window`
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Arc<Self>> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!(SOURCE, "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let display_handle = window.display_handle().map_err(|e| {
                engine_error!(SOURCE, "Failed to get display handle: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?;
            let window_handle = window.window_handle().map_err(|e| {
                engine_error!(SOURCE, "Failed to get window handle: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?;

            let validation = config.enable_validation && Self::validation_available(&entry);

            let app_info = vk::ApplicationInfo::default()
                .application_name(c"Sandbox3D Application")
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Sandbox3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to get required extensions: {}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
                })?
                .to_vec();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if validation { vec![VALIDATION_LAYER.as_ptr()] } else { Vec::new() };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                engine_error!(SOURCE, "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            let debug_utils = if validation {
                match Self::create_debug_messenger(&entry, &instance, config) {
                    Ok(debug_utils) => debug_utils,
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                None
            };

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let surface = match ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            ) {
                Ok(surface) => surface,
                Err(e) => {
                    engine_error!(SOURCE, "Failed to create surface: {:?}", e);
                    Self::destroy_instance(&instance, debug_utils);
                    return Err(Error::InitializationFailed(format!("Failed to create surface: {:?}", e)));
                }
            };

            let partial = PartialInstance { entry, instance, debug_utils, surface_loader, surface };
            match Self::create_device(&partial) {
                Ok(parts) => Ok(Arc::new(Self::assemble(partial, parts))),
                Err(e) => {
                    partial.surface_loader.destroy_surface(partial.surface, None);
                    Self::destroy_instance(&partial.instance, partial.debug_utils);
                    Err(e)
                }
            }
        }
    }

    /// Name of the selected physical device
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn validation_enabled(&self) -> bool {
        self.debug_utils.is_some()
    }

    /// Exclusive access to the graphics/present queues
    pub(crate) fn lock_queues(&self) -> MutexGuard<'_, ()> {
        self.queue_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_allocator(&self) -> MutexGuard<'_, Allocator> {
        self.allocator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record commands into a transient buffer, submit and wait for completion
    pub(crate) fn one_shot<F: FnOnce(vk::CommandBuffer)>(&self, record: F) -> Result<()> {
        let pool = self.upload_pool.lock().unwrap_or_else(PoisonError::into_inner);
        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let cmd = self
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to allocate upload command buffer: {:?}", e))?[0];

            let result = self.record_and_wait(cmd, record);
            self.device.free_command_buffers(*pool, &[cmd]);
            result
        }
    }

    unsafe fn record_and_wait<F: FnOnce(vk::CommandBuffer)>(&self, cmd: vk::CommandBuffer, record: F) -> Result<()> {
        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to begin upload command buffer: {:?}", e))?;

            record(cmd);

            self.device
                .end_command_buffer(cmd)
                .map_err(|e| engine_err!(SOURCE, "Failed to end upload command buffer: {:?}", e))?;

            let command_buffers = [cmd];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            let _queue = self.lock_queues();
            self.device
                .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
                .map_err(|e| engine_err!(SOURCE, "Failed to submit upload commands: {:?}", e))?;
            self.device
                .queue_wait_idle(self.graphics_queue)
                .map_err(|e| engine_err!(SOURCE, "Failed to wait for upload completion: {:?}", e))?;
        }
        Ok(())
    }

    pub(crate) fn wait_idle(&self) -> Result<()> {
        let _queue = self.lock_queues();
        unsafe {
            self.device
                .device_wait_idle()
                .map_err(|e| engine_err!(SOURCE, "Failed to wait for device idle: {:?}", e))
        }
    }

    // ===== INITIALIZATION HELPERS =====

    /// Validation needs the cargo feature and the Khronos layer on this machine
    fn validation_available(entry: &ash::Entry) -> bool {
        if !cfg!(feature = "vulkan-validation") {
            engine_warn!(SOURCE, "Validation requested but the vulkan-validation feature is off, continuing without validation");
            return false;
        }
        let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
        let present = layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER));
        if !present {
            engine_warn!(SOURCE, "VK_LAYER_KHRONOS_validation not installed, continuing without validation");
        }
        present
    }

    #[cfg(feature = "vulkan-validation")]
    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &Config,
    ) -> Result<Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
        crate::debug::init_debug_config(crate::debug::Config::from(config));

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(crate::debug::messenger_severity_flags(config.debug_severity))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&debug_info, None) }.map_err(|e| {
            engine_error!(SOURCE, "Failed to create debug messenger: {:?}", e);
            Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
        })?;
        engine_info!(SOURCE, "Validation layer enabled");
        Ok(Some((debug_utils, messenger)))
    }

    #[cfg(not(feature = "vulkan-validation"))]
    unsafe fn create_debug_messenger(
        _entry: &ash::Entry,
        _instance: &ash::Instance,
        _config: &Config,
    ) -> Result<Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>> {
        Ok(None)
    }

    /// Describe one physical device for the selection rubric
    unsafe fn describe_device(partial: &PartialInstance, physical_device: vk::PhysicalDevice) -> PhysicalDeviceInfo {
        unsafe {
            let instance = &partial.instance;
            let props = instance.get_physical_device_properties(physical_device);
            let features = instance.get_physical_device_features(physical_device);

            let has_swapchain_extension = instance
                .enumerate_device_extension_properties(physical_device)
                .unwrap_or_default()
                .iter()
                .any(|ext| ext.extension_name_as_c_str().is_ok_and(|name| name == ash::khr::swapchain::NAME));

            let surface_format_count = partial
                .surface_loader
                .get_physical_device_surface_formats(physical_device, partial.surface)
                .map_or(0, |formats| formats.len() as u32);
            let present_mode_count = partial
                .surface_loader
                .get_physical_device_surface_present_modes(physical_device, partial.surface)
                .map_or(0, |modes| modes.len() as u32);

            let queue_families = instance
                .get_physical_device_queue_family_properties(physical_device)
                .iter()
                .enumerate()
                .map(|(index, family)| QueueFamilyInfo {
                    index: index as u32,
                    graphics: family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                    present: partial
                        .surface_loader
                        .get_physical_device_surface_support(physical_device, index as u32, partial.surface)
                        .unwrap_or(false),
                })
                .collect();

            PhysicalDeviceInfo {
                name: props
                    .device_name_as_c_str()
                    .map_or_else(|_| "Unknown device".to_string(), |name| name.to_string_lossy().into_owned()),
                device_type: device_type_from_vk(props.device_type),
                supports_anisotropy: features.sampler_anisotropy == vk::TRUE,
                has_swapchain_extension,
                surface_format_count,
                present_mode_count,
                max_image_dimension_2d: props.limits.max_image_dimension2_d,
                queue_families,
            }
        }
    }

    /// Pick the physical device and create the logical device, queues and allocator
    unsafe fn create_device(partial: &PartialInstance) -> Result<DeviceParts> {
        unsafe {
            let physical_devices = partial.instance.enumerate_physical_devices().map_err(|e| {
                engine_error!(SOURCE, "Failed to enumerate physical devices: {:?}", e);
                Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
            })?;

            let infos: Vec<PhysicalDeviceInfo> = physical_devices
                .iter()
                .map(|&pd| Self::describe_device(partial, pd))
                .collect();
            for info in &infos {
                match score_device(info) {
                    Some(score) => engine_debug!(SOURCE, "Candidate GPU '{}' scored {}", info.name, score),
                    None => engine_debug!(SOURCE, "GPU '{}' rejected", info.name),
                }
            }
            let chosen = select_device(&infos).inspect_err(|e| engine_error!(SOURCE, "{}", e))?;
            let physical_device = physical_devices[chosen];
            let info = &infos[chosen];

            let queue_families = find_queue_families(&info.queue_families);
            let (Some(graphics_family), Some(present_family)) = (queue_families.graphics, queue_families.present)
            else {
                return Err(Error::InitializationFailed("Selected GPU lacks queue families".to_string()));
            };

            let queue_priorities = [1.0];
            let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
                .unique()
                .into_iter()
                .map(|family| {
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(family)
                        .queue_priorities(&queue_priorities)
                })
                .collect();

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let device_features = vk::PhysicalDeviceFeatures::default()
                .sampler_anisotropy(info.supports_anisotropy);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);

            let device = partial
                .instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let allocator = match Allocator::new(&AllocatorCreateDesc {
                instance: partial.instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            }) {
                Ok(allocator) => allocator,
                Err(e) => {
                    engine_error!(SOURCE, "Failed to create GPU allocator: {:?}", e);
                    device.destroy_device(None);
                    return Err(Error::InitializationFailed(format!("Failed to create allocator: {:?}", e)));
                }
            };

            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(graphics_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_pool = match device.create_command_pool(&pool_info, None) {
                Ok(pool) => pool,
                Err(e) => {
                    engine_error!(SOURCE, "Failed to create upload command pool: {:?}", e);
                    drop(allocator);
                    device.destroy_device(None);
                    return Err(Error::InitializationFailed(format!("Failed to create upload pool: {:?}", e)));
                }
            };

            let max_anisotropy = partial
                .instance
                .get_physical_device_properties(physical_device)
                .limits
                .max_sampler_anisotropy;

            engine_info!(
                SOURCE,
                "Using GPU '{}' ({:?}), graphics family {}, present family {}",
                info.name, info.device_type, graphics_family, present_family
            );

            Ok(DeviceParts {
                physical_device,
                graphics_queue: device.get_device_queue(graphics_family, 0),
                present_queue: device.get_device_queue(present_family, 0),
                swapchain_loader: ash::khr::swapchain::Device::new(&partial.instance, &device),
                device,
                queue_families,
                graphics_family,
                present_family,
                allocator,
                upload_pool,
                anisotropy_enabled: info.supports_anisotropy,
                max_anisotropy,
                device_name: info.name.clone(),
            })
        }
    }

    fn assemble(partial: PartialInstance, parts: DeviceParts) -> Self {
        Self {
            _entry: partial.entry,
            instance: partial.instance,
            debug_utils: partial.debug_utils,
            surface_loader: partial.surface_loader,
            surface: partial.surface,
            physical_device: parts.physical_device,
            device: parts.device,
            swapchain_loader: parts.swapchain_loader,
            queue_families: parts.queue_families,
            graphics_family: parts.graphics_family,
            present_family: parts.present_family,
            graphics_queue: parts.graphics_queue,
            present_queue: parts.present_queue,
            queue_lock: Mutex::new(()),
            allocator: ManuallyDrop::new(Mutex::new(parts.allocator)),
            upload_pool: Mutex::new(parts.upload_pool),
            anisotropy_enabled: parts.anisotropy_enabled,
            max_anisotropy: parts.max_anisotropy,
            device_name: parts.device_name,
        }
    }

    fn destroy_instance(
        instance: &ash::Instance,
        debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    ) {
        unsafe {
            if let Some((loader, messenger)) = debug_utils {
                crate::debug::cleanup_debug_config();
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            instance.destroy_instance(None);
        }
    }
}

/// Instance-level objects created before device selection
struct PartialInstance {
    entry: ash::Entry,
    instance: ash::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
}

/// Device-level objects
struct DeviceParts {
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
    queue_families: QueueFamilyIndices,
    graphics_family: u32,
    present_family: u32,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    allocator: Allocator,
    upload_pool: vk::CommandPool,
    anisotropy_enabled: bool,
    max_anisotropy: f32,
    device_name: String,
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            let pool = *self.upload_pool.get_mut().unwrap_or_else(PoisonError::into_inner);
            self.device.destroy_command_pool(pool, None);

            // Allocator frees its memory blocks through the device
            ManuallyDrop::drop(&mut self.allocator);

            self.surface_loader.destroy_surface(self.surface, None);

            if let Some((loader, messenger)) = self.debug_utils.take() {
                crate::debug::cleanup_debug_config();
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        engine_debug!(SOURCE, "GPU context destroyed");
    }
}
