// SPDX-License-Identifier: CEPL-1.0
use ash::khr::swapchain;
use ash::vk;
use pulse_core::Failure;
use tracing::{info, warn};

use crate::negotiate::SwapchainParams;
use crate::selector::QueueSelection;
use crate::status;

/// The swapchain and the images it owns, in index order.
pub struct SwapchainState {
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

pub struct CommandResources {
    pub pool: vk::CommandPool,
    pub bufs: Vec<vk::CommandBuffer>,
}

/// Exclusive when one family does everything. With split families the
/// images are shared concurrently so no ownership transfer is needed.
pub fn sharing_for(selection: QueueSelection) -> (vk::SharingMode, Vec<u32>) {
    if selection.is_shared() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, selection.families())
    }
}

pub fn check_image_count(requested: u32, got: usize) -> Result<(), Failure> {
    if got == requested as usize {
        Ok(())
    } else {
        Err(Failure::Status {
            call: "vkGetSwapchainImagesKHR",
            result: format!("returned {got} images, requested {requested}"),
            code: 1,
        })
    }
}

pub unsafe fn create_swapchain(
    swap_d: &swapchain::Device,
    surface: vk::SurfaceKHR,
    params: &SwapchainParams,
    selection: QueueSelection,
) -> Result<SwapchainState, Failure> {
    let (sharing_mode, families) = sharing_for(selection);
    if sharing_mode == vk::SharingMode::CONCURRENT {
        warn!(
            "graphics ({}) and present ({}) families differ; using concurrent image sharing",
            selection.graphics, selection.present
        );
    }

    let swap_info = vk::SwapchainCreateInfoKHR {
        s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
        surface,
        min_image_count: params.image_count,
        image_format: params.format.format,
        image_color_space: params.format.color_space,
        image_extent: params.extent,
        image_array_layers: 1,
        image_usage: params.usage,
        image_sharing_mode: sharing_mode,
        queue_family_index_count: families.len() as u32,
        p_queue_family_indices: families.as_ptr(),
        pre_transform: params.transform,
        composite_alpha: params.composite_alpha,
        present_mode: params.present_mode,
        clipped: vk::TRUE,
        ..Default::default()
    };

    let handle = swap_d
        .create_swapchain(&swap_info, None)
        .map_err(status("vkCreateSwapchainKHR"))?;
    let images = swap_d
        .get_swapchain_images(handle)
        .map_err(status("vkGetSwapchainImagesKHR"))?;
    check_image_count(params.image_count, images.len())?;

    info!(
        "swapchain ready ({}x{}, {} images, fmt {:?})",
        params.extent.width,
        params.extent.height,
        images.len(),
        params.format.format
    );
    Ok(SwapchainState {
        handle,
        images,
        format: params.format.format,
        extent: params.extent,
    })
}

/// One primary buffer per swapchain image, resettable individually.
pub unsafe fn create_command_resources(
    device: &ash::Device,
    queue_family: u32,
    image_count: usize,
) -> Result<CommandResources, Failure> {
    let pool_info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        queue_family_index: queue_family,
        flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        ..Default::default()
    };
    let pool = device
        .create_command_pool(&pool_info, None)
        .map_err(status("vkCreateCommandPool"))?;
    let alloc_info = vk::CommandBufferAllocateInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
        command_pool: pool,
        level: vk::CommandBufferLevel::PRIMARY,
        command_buffer_count: image_count as u32,
        ..Default::default()
    };
    match device.allocate_command_buffers(&alloc_info) {
        Ok(bufs) => Ok(CommandResources { pool, bufs }),
        Err(e) => {
            device.destroy_command_pool(pool, None);
            Err(status("vkAllocateCommandBuffers")(e))
        }
    }
}

fn color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// UNDEFINED -> TRANSFER_DST, clear, TRANSFER_DST -> PRESENT_SRC.
pub unsafe fn record_clear(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    clear: &vk::ClearColorValue,
) -> Result<(), Failure> {
    device
        .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
        .map_err(status("vkResetCommandBuffer"))?;
    let begin = vk::CommandBufferBeginInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
        ..Default::default()
    };
    device
        .begin_command_buffer(cmd, &begin)
        .map_err(status("vkBeginCommandBuffer"))?;

    let range = color_range();

    let to_transfer = vk::ImageMemoryBarrier {
        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::TRANSFER_WRITE,
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image,
        subresource_range: range,
        ..Default::default()
    };
    device.cmd_pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::TRANSFER,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[to_transfer],
    );

    device.cmd_clear_color_image(
        cmd,
        image,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        clear,
        &[range],
    );

    let to_present = vk::ImageMemoryBarrier {
        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
        src_access_mask: vk::AccessFlags::TRANSFER_WRITE,
        dst_access_mask: vk::AccessFlags::empty(),
        old_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image,
        subresource_range: range,
        ..Default::default()
    };
    device.cmd_pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[to_present],
    );

    device
        .end_command_buffer(cmd)
        .map_err(status("vkEndCommandBuffer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_family_keeps_exclusive_sharing() {
        let (mode, families) = sharing_for(QueueSelection {
            graphics: 2,
            present: 2,
        });
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(families.is_empty());
    }

    #[test]
    fn split_families_share_concurrently() {
        let (mode, families) = sharing_for(QueueSelection {
            graphics: 0,
            present: 1,
        });
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(families, [0, 1]);
    }

    #[test]
    fn image_count_must_match_request() {
        check_image_count(2, 2).unwrap();
        for got in [0, 1, 3] {
            match check_image_count(2, got) {
                Err(Failure::Status { call, result, .. }) => {
                    assert_eq!(call, "vkGetSwapchainImagesKHR");
                    assert!(result.contains(&format!("returned {got} images")));
                }
                other => panic!("expected a status failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn clear_range_covers_one_color_layer() {
        let r = color_range();
        assert_eq!(r.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!((r.level_count, r.layer_count), (1, 1));
    }
}
