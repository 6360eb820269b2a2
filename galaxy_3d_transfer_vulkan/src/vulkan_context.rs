/// GpuContext - Vulkan objects shared by every device operation
///
/// Contains everything needed for headless transfers:
/// - Instance and logical device (no surface, no swapchain)
/// - One queue able to execute transfer commands
/// - Transient command pool and fence for blocking one-shot copies
/// - Optional validation debug messenger

use ash::vk;
use std::ffi::CString;
use std::sync::Mutex;
use galaxy_3d_transfer::galaxy3d::{Result, Error};
use galaxy_3d_transfer::galaxy3d::render::{Config, DebugSeverity};
use galaxy_3d_transfer::{engine_debug, engine_error, engine_info, engine_warn};

/// One-shot transfer submission state, guarded by `GpuContext::transfer`
pub(crate) struct TransferState {
    /// Command pool (TRANSIENT + RESET_COMMAND_BUFFER)
    pub command_pool: vk::CommandPool,
    /// Fence signaled when the last submitted copy completes
    pub fence: vk::Fence,
    /// Command buffer of a copy that timed out and may still be executing
    pub pending: Option<vk::CommandBuffer>,
}

/// Shared Vulkan context
///
/// Destroys its objects on drop in dependency order: wait idle, fence and
/// pool, debug messenger, device, instance.
pub struct GpuContext {
    /// Vulkan entry (keeps the loader alive)
    _entry: ash::Entry,

    /// Vulkan instance
    pub instance: ash::Instance,

    /// Selected physical device
    pub physical_device: vk::PhysicalDevice,

    /// Vulkan logical device
    pub device: ash::Device,

    /// Queue used for transfer submissions
    pub queue: vk::Queue,

    /// Queue family index of `queue`
    pub queue_family: u32,

    /// Command pool + fence; the lock also serializes queue access
    pub(crate) transfer: Mutex<TransferState>,

    /// Debug utils loader (for validation layers)
    debug_utils_loader: Option<ash::ext::debug_utils::Instance>,

    /// Debug messenger handle
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    /// Create a headless Vulkan context
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` when the loader, instance, device or
    /// transfer objects cannot be created, or no GPU has a usable queue.
    pub fn new(config: &Config) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| init_error(format!("Failed to load Vulkan library: {:?}", e)))?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|e| init_error(format!("Invalid application name: {}", e)))?;

            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Galaxy3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_1);

            // Headless: no surface extensions
            let enable_validation = validation_requested(config);
            let mut extension_names = Vec::new();
            let mut layer_names = Vec::new();
            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(c"VK_LAYER_KHRONOS_validation".as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_error(format!("Failed to create Vulkan instance: {:?}", e)))?;

            let (debug_utils_loader, debug_messenger) = if enable_validation {
                match create_debug_messenger(&entry, &instance, config.debug_severity) {
                    Ok((loader, messenger)) => (Some(loader), Some(messenger)),
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                (None, None)
            };

            // Everything created from here on is released by Drop if a later step fails
            let mut partial = PartialContext {
                instance: &instance,
                debug_utils_loader: debug_utils_loader.as_ref(),
                debug_messenger,
                device: None,
                command_pool: None,
            };

            let (physical_device, queue_family) = pick_physical_device(&instance)?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .ok()
                .and_then(|name| name.to_str().ok())
                .unwrap_or("Unknown");
            engine_info!("galaxy3d::vulkan", "Using GPU '{}' (queue family {})", device_name, queue_family);

            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family)
                .queue_priorities(&queue_priorities)];

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| init_error(format!("Failed to create logical device: {:?}", e)))?;
            partial.device = Some(device.clone());

            let queue = device.get_device_queue(queue_family, 0);

            let pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = device.create_command_pool(&pool_create_info, None)
                .map_err(|e| init_error(format!("Failed to create transfer command pool: {:?}", e)))?;
            partial.command_pool = Some(command_pool);

            let fence = device.create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| init_error(format!("Failed to create transfer fence: {:?}", e)))?;

            partial.disarm();

            Ok(Self {
                _entry: entry,
                instance,
                physical_device,
                device,
                queue,
                queue_family,
                transfer: Mutex::new(TransferState {
                    command_pool,
                    fence,
                    pending: None,
                }),
                debug_utils_loader,
                debug_messenger,
            })
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            // 1. Wait for the device to finish (pending copies included)
            self.device.device_wait_idle().ok();

            // 2. Fence and command pool (frees every command buffer)
            let transfer = match self.transfer.get_mut() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            self.device.destroy_fence(transfer.fence, None);
            self.device.destroy_command_pool(transfer.command_pool, None);
            transfer.pending = None;

            // 3. Stop routing validation messages before the messenger goes away
            crate::debug::cleanup_debug_config();

            // 4. Debug messenger BEFORE device and instance
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils_loader, self.debug_messenger) {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            // 5. Device and instance
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        engine_debug!("galaxy3d::vulkan", "GPU context destroyed");
    }
}

/// Releases partially created objects when `GpuContext::new` fails midway
struct PartialContext<'a> {
    instance: &'a ash::Instance,
    debug_utils_loader: Option<&'a ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    device: Option<ash::Device>,
    command_pool: Option<vk::CommandPool>,
}

impl PartialContext<'_> {
    /// Construction succeeded, ownership moves to GpuContext
    fn disarm(self) {
        std::mem::forget(self);
    }
}

impl Drop for PartialContext<'_> {
    fn drop(&mut self) {
        unsafe {
            if let Some(device) = &self.device {
                if let Some(pool) = self.command_pool {
                    device.destroy_command_pool(pool, None);
                }
                device.destroy_device(None);
            }
            if let (Some(debug_utils), Some(messenger)) = (self.debug_utils_loader, self.debug_messenger) {
                crate::debug::cleanup_debug_config();
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn init_error(message: String) -> Error {
    engine_error!("galaxy3d::vulkan", "{}", message);
    Error::InitializationFailed(message)
}

/// Validation is compiled in only with the `vulkan-validation` feature
fn validation_requested(config: &Config) -> bool {
    if config.enable_validation && !cfg!(feature = "vulkan-validation") {
        engine_warn!("galaxy3d::vulkan",
            "Validation requested but the 'vulkan-validation' feature is disabled, ignoring");
        return false;
    }
    config.enable_validation
}

/// Pick the first GPU exposing a queue family that can execute transfer commands
///
/// Graphics and compute queues support transfers implicitly.
unsafe fn pick_physical_device(instance: &ash::Instance) -> Result<(vk::PhysicalDevice, u32)> {
    let physical_devices = instance
        .enumerate_physical_devices()
        .map_err(|e| init_error(format!("Failed to enumerate physical devices: {:?}", e)))?;

    let transfer_capable = vk::QueueFlags::TRANSFER | vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE;

    physical_devices
        .into_iter()
        .find_map(|physical_device| {
            instance
                .get_physical_device_queue_family_properties(physical_device)
                .iter()
                .position(|family| family.queue_count > 0 && family.queue_flags.intersects(transfer_capable))
                .map(|index| (physical_device, index as u32))
        })
        .ok_or_else(|| init_error("No Vulkan GPU with a transfer-capable queue found".to_string()))
}

unsafe fn create_debug_messenger(
    entry: &ash::Entry,
    instance: &ash::Instance,
    severity: DebugSeverity,
) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

    crate::debug::init_debug_config(crate::debug::Config {
        severity,
        enable_stats: true,
    });

    let severity_flags = match severity {
        DebugSeverity::ErrorsOnly => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
        }
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    };

    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(severity_flags)
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
        )
        .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

    let messenger = debug_utils
        .create_debug_utils_messenger(&debug_info, None)
        .map_err(|e| {
            crate::debug::cleanup_debug_config();
            init_error(format!("Failed to create debug messenger: {:?}", e))
        })?;

    Ok((debug_utils, messenger))
}
