//! Vulkan instance creation.

use std::ffi::{CStr, CString};

use ash::vk;
use helion_rhi::{DeviceDesc, PresentTarget, RenderDevice, RenderInstance, Result, RhiError};

use crate::device::VulkanDevice;
use crate::error::vk_err;

/// Required instance extensions.
pub fn required_instance_extensions() -> Vec<&'static CStr> {
    let extensions = vec![
        ash::khr::surface::NAME,
        #[cfg(target_os = "windows")]
        ash::khr::win32_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::xlib_surface::NAME,
        #[cfg(target_os = "linux")]
        ash::khr::wayland_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::ext::metal_surface::NAME,
        #[cfg(target_os = "macos")]
        ash::khr::portability_enumeration::NAME,
    ];

    extensions
}

/// Validation layers to enable in debug builds.
pub fn validation_layers() -> Vec<&'static CStr> {
    vec![c"VK_LAYER_KHRONOS_validation"]
}

/// Route validation messages into the tracing subscriber.
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() {
        return vk::FALSE;
    }

    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::error!("vulkan: {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::warn!("vulkan: {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        tracing::info!("vulkan: {message}");
    } else {
        tracing::trace!("vulkan: {message}");
    }

    vk::FALSE
}

fn messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

/// Entry point of the Vulkan backend: the loaded library, the instance,
/// and the optional debug messenger.
pub struct VulkanInstance {
    entry: ash::Entry,
    instance: ash::Instance,
    debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    debug_enabled: bool,
}

impl VulkanInstance {
    /// Load Vulkan and create an instance.
    ///
    /// Validation layers and the debug messenger are enabled when
    /// `enable_debug` is set; a missing layer is logged, not fatal.
    pub fn new(app_name: &str, enable_debug: bool) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| RhiError::Driver(format!("failed to load Vulkan: {e}")))?;

        let app_name = CString::new(app_name)
            .map_err(|_| RhiError::InvalidState("app name contains a NUL byte".to_string()))?;
        let engine_name = CString::new("Helion").unwrap();

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_1);

        let mut extensions = required_instance_extensions();
        if enable_debug {
            extensions.push(ash::ext::debug_utils::NAME);
        }
        let extension_names: Vec<*const i8> = extensions.iter().map(|ext| ext.as_ptr()).collect();

        let layers = if enable_debug {
            validation_layers()
        } else {
            vec![]
        };

        // Missing layers degrade to an unvalidated instance rather than a
        // hard failure.
        let available_layers = unsafe { entry.enumerate_instance_layer_properties() }
            .map_err(vk_err)?;
        let layers: Vec<&'static CStr> = layers
            .into_iter()
            .filter(|layer| {
                let found = available_layers.iter().any(|props| {
                    let name = unsafe { CStr::from_ptr(props.layer_name.as_ptr()) };
                    name == *layer
                });
                if !found {
                    tracing::warn!("validation layer {:?} not available", layer);
                }
                found
            })
            .collect();
        let layer_names: Vec<*const i8> = layers.iter().map(|l| l.as_ptr()).collect();

        #[cfg(target_os = "macos")]
        let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        #[cfg(not(target_os = "macos"))]
        let create_flags = vk::InstanceCreateFlags::empty();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .flags(create_flags);

        let instance =
            unsafe { entry.create_instance(&create_info, None) }.map_err(vk_err)?;

        let debug = if enable_debug {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger =
                unsafe { loader.create_debug_utils_messenger(&messenger_info(), None) };
            match messenger {
                Ok(messenger) => Some((loader, messenger)),
                Err(err) => {
                    tracing::warn!("failed to create debug messenger: {err}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug,
            debug_enabled: enable_debug,
        })
    }

    /// The loaded Vulkan entry point.
    #[must_use]
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// The raw instance handle.
    #[must_use]
    pub fn raw(&self) -> &ash::Instance {
        &self.instance
    }
}

impl RenderInstance for VulkanInstance {
    fn create_device(
        &self,
        desc: &DeviceDesc,
        target: Option<&dyn PresentTarget>,
    ) -> Result<Box<dyn RenderDevice>> {
        Ok(Box::new(VulkanDevice::new(self, desc, target)?))
    }

    fn debug_enabled(&self) -> bool {
        self.debug_enabled
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}
