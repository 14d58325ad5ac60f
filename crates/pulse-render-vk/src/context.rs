// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_char, CStr, CString};

use anyhow::{Context, Result};
use ash::ext::debug_utils as ext_debug;
use ash::khr::swapchain;
use ash::{vk, Entry, Instance};
use pulse_core::Failure;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::{debug, error, info, trace, warn};

use crate::capability::{list_layers, list_supported, require_all, Scope};
use crate::selector::QueueSelection;
use crate::status;

pub const API_VERSION: u32 = vk::API_VERSION_1_2;
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Instance identity and switches.
#[derive(Clone, Debug)]
pub struct VkSettings {
    pub app_name: String,
    pub validation: bool,
}

impl Default for VkSettings {
    fn default() -> Self {
        Self {
            app_name: "pulse".to_owned(),
            validation: false,
        }
    }
}

/// Device handle plus the two role queues. When both roles share a family
/// the queues are the same object.
pub struct LogicalDevice {
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

pub unsafe fn create_instance(
    entry: &Entry,
    display_raw: RawDisplayHandle,
    settings: &VkSettings,
) -> Result<Instance> {
    // Surface + platform surface, as the windowing system needs them.
    let wsi = ash_window::enumerate_required_extensions(display_raw)
        .map_err(status("enumerate_required_extensions"))?;

    let mut ext_ptrs: Vec<*const c_char> = wsi.to_vec();
    if settings.validation {
        ext_ptrs.push(ext_debug::NAME.as_ptr());
    }

    let available = list_supported(Scope::Instance(entry))?;
    require_all(
        "instance extension",
        ext_ptrs.iter().map(|&p| CStr::from_ptr(p)),
        &available,
    )?;

    let layers: Vec<*const c_char> = if settings.validation {
        let available = list_layers(entry)?;
        require_all("instance layer", [VALIDATION_LAYER], &available)?;
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        Vec::new()
    };

    let app_name = CString::new(settings.app_name.as_str()).context("application name")?;
    let version = vk::make_api_version(0, 0, 1, 0);
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app_name.as_ptr(),
        application_version: version,
        p_engine_name: app_name.as_ptr(),
        engine_version: version,
        api_version: API_VERSION,
        ..Default::default()
    };

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: ext_ptrs.len() as u32,
        pp_enabled_extension_names: ext_ptrs.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };

    let instance = entry
        .create_instance(&create_info, None)
        .map_err(status("vkCreateInstance"))?;
    info!(
        "instance ready: api {}.{}, {} extensions, validation={}",
        vk::api_version_major(API_VERSION),
        vk::api_version_minor(API_VERSION),
        ext_ptrs.len(),
        settings.validation
    );
    Ok(instance)
}

pub unsafe fn create_surface(
    entry: &Entry,
    instance: &Instance,
    display_raw: RawDisplayHandle,
    window_raw: RawWindowHandle,
) -> Result<vk::SurfaceKHR, Failure> {
    ash_window::create_surface(entry, instance, display_raw, window_raw, None)
        .map_err(status("vkCreateSurfaceKHR"))
}

/// One create-info per distinct family, one queue each.
pub fn queue_create_infos(
    selection: QueueSelection,
    priorities: &[f32],
) -> Vec<vk::DeviceQueueCreateInfo<'_>> {
    selection
        .families()
        .into_iter()
        .map(|family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect()
}

pub unsafe fn create_logical_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    selection: QueueSelection,
) -> Result<LogicalDevice, Failure> {
    let priorities = [1.0_f32];
    let qinfos = queue_create_infos(selection, &priorities);

    // Swapchain only. Nothing else is enabled.
    let device_exts = [swapchain::NAME.as_ptr()];
    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: qinfos.len() as u32,
        p_queue_create_infos: qinfos.as_ptr(),
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        ..Default::default()
    };

    let device = instance
        .create_device(phys, &dinfo, None)
        .map_err(status("vkCreateDevice"))?;

    let graphics_queue = device.get_device_queue(selection.graphics, 0);
    let present_queue = device.get_device_queue(selection.present, 0);
    debug!(
        "device created with {} queue create info(s); graphics={:?} present={:?}",
        qinfos.len(),
        graphics_queue,
        present_queue
    );

    Ok(LogicalDevice {
        device,
        graphics_queue,
        present_queue,
    })
}

/// Validation output routed into tracing.
pub struct DebugMessenger {
    loader: ext_debug::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!(target: "vulkan", "{msg}");
    } else {
        trace!(target: "vulkan", "{msg}");
    }
    vk::FALSE
}

impl DebugMessenger {
    pub unsafe fn create(entry: &Entry, instance: &Instance) -> Result<Self, Failure> {
        let loader = ext_debug::Instance::new(entry, instance);
        let ci = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(debug_callback),
            ..Default::default()
        };
        let handle = loader
            .create_debug_utils_messenger(&ci, None)
            .map_err(status("vkCreateDebugUtilsMessengerEXT"))?;
        Ok(Self { loader, handle })
    }

    pub unsafe fn destroy(&self) {
        self.loader.destroy_debug_utils_messenger(self.handle, None);
    }
}
