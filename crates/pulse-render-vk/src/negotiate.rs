// SPDX-License-Identifier: CEPL-1.0
use ash::khr::surface;
use ash::vk;
use pulse_core::Failure;
use pulse_render::RenderSize;
use tracing::info;

use crate::status;

/// Double buffering.
pub const REQUESTED_IMAGE_COUNT: u32 = 2;

pub const REQUIRED_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;
pub const REQUIRED_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;
pub const REQUIRED_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

/// Images are cleared by transfer, then presented.
pub const REQUIRED_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
    vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw() | vk::ImageUsageFlags::TRANSFER_DST.as_raw(),
);

/// Everything the swapchain is created from.
#[derive(Clone, Copy, Debug)]
pub struct SwapchainParams {
    pub image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub usage: vk::ImageUsageFlags,
    pub transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
}

/// Checks the surface against the fixed requirements. No fallbacks: any
/// unmet requirement is a missing capability.
pub fn negotiate(
    caps: &vk::SurfaceCapabilitiesKHR,
    formats: &[vk::SurfaceFormatKHR],
    modes: &[vk::PresentModeKHR],
    window: RenderSize,
) -> Result<SwapchainParams, Failure> {
    // max_image_count == 0 means no upper bound.
    let n = REQUESTED_IMAGE_COUNT;
    if n < caps.min_image_count || (caps.max_image_count != 0 && n > caps.max_image_count) {
        return Err(Failure::missing(format!(
            "surface image count {n} (supported {}..={})",
            caps.min_image_count, caps.max_image_count
        )));
    }
    if caps.max_image_array_layers == 0 {
        return Err(Failure::missing("surface image array layers"));
    }
    if !caps.supported_usage_flags.contains(REQUIRED_USAGE) {
        return Err(Failure::missing(format!(
            "surface usage {:?} (supported {:?})",
            REQUIRED_USAGE, caps.supported_usage_flags
        )));
    }
    if !caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        return Err(Failure::missing("identity surface transform"));
    }
    if !caps
        .supported_composite_alpha
        .contains(vk::CompositeAlphaFlagsKHR::OPAQUE)
    {
        return Err(Failure::missing("opaque composite alpha"));
    }

    let format = formats
        .iter()
        .copied()
        .find(|f| f.format == REQUIRED_FORMAT && f.color_space == REQUIRED_COLOR_SPACE)
        .ok_or_else(|| {
            Failure::missing(format!(
                "surface format {REQUIRED_FORMAT:?} / {REQUIRED_COLOR_SPACE:?}"
            ))
        })?;

    if !modes.contains(&REQUIRED_PRESENT_MODE) {
        return Err(Failure::missing(format!(
            "present mode {REQUIRED_PRESENT_MODE:?}"
        )));
    }

    Ok(SwapchainParams {
        image_count: n,
        format,
        present_mode: REQUIRED_PRESENT_MODE,
        extent: extent_from_caps(caps, window),
        usage: REQUIRED_USAGE,
        transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
        composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
    })
}

/// The surface's own extent when it has one, else the window size within limits.
pub fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

pub unsafe fn query_and_negotiate(
    surf_i: &surface::Instance,
    phys: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    window: RenderSize,
) -> Result<SwapchainParams, Failure> {
    let caps = surf_i
        .get_physical_device_surface_capabilities(phys, surface)
        .map_err(status("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?;
    let formats = surf_i
        .get_physical_device_surface_formats(phys, surface)
        .map_err(status("vkGetPhysicalDeviceSurfaceFormatsKHR"))?;
    let modes = surf_i
        .get_physical_device_surface_present_modes(phys, surface)
        .map_err(status("vkGetPhysicalDeviceSurfacePresentModesKHR"))?;

    let params = negotiate(&caps, &formats, &modes, window)?;
    info!(
        "surface: format {:?} / {:?}, present_mode {:?}, extent {}x{}, images {} (min={} max={})",
        params.format.format,
        params.format.color_space,
        params.present_mode,
        params.extent.width,
        params.extent.height,
        params.image_count,
        caps.min_image_count,
        caps.max_image_count
    );
    Ok(params)
}
