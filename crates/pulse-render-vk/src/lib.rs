// SPDX-License-Identifier: CEPL-1.0
use std::fmt;
use std::io;

use anyhow::Result;
use ash::khr::{surface, swapchain as khr_swapchain};
use ash::{vk, Entry};
use pulse_core::Failure;
use pulse_render::{ClearColor, FrameTarget, RenderSize};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::info;

pub mod capability;
pub mod context;
pub mod negotiate;
pub mod selector;
pub mod swapchain;
pub mod sync;
pub mod teardown;

pub use context::VkSettings;
pub use selector::{DeviceSelectionPolicy, FirstEnumerated, PhysicalDeviceInfo, QueueSelection};

use crate::capability::require_all;
use crate::context::DebugMessenger;
use crate::swapchain::SwapchainState;
use crate::sync::FrameSync;
use crate::teardown::GpuObjects;

/// Maps a failed API call to a status failure naming the call.
pub(crate) fn status(call: &'static str) -> impl Fn(vk::Result) -> Failure {
    move |result| Failure::Status {
        call,
        result: format!("{result:?}"),
        code: result.as_raw(),
    }
}

/// Both acquire and present report SUBOPTIMAL_KHR as a success; here it ends the session.
fn require_optimal(call: &'static str, suboptimal: bool) -> Result<(), Failure> {
    if suboptimal {
        Err(status(call)(vk::Result::SUBOPTIMAL_KHR))
    } else {
        Ok(())
    }
}

fn load_failure(err: impl fmt::Display) -> Failure {
    handle_failure("load Vulkan library", err)
}

fn handle_failure(context: &str, err: impl fmt::Display) -> Failure {
    Failure::platform(context, io::Error::other(err.to_string()))
}

pub struct VkRenderer {
    // Declared first: destroyed before the loader library is released.
    owned: GpuObjects,

    queues: QueueSelection,
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,

    swapchain_loader: khr_swapchain::Device,
    swapchain: SwapchainState,

    sync: FrameSync,
    bufs: Vec<vk::CommandBuffer>,

    clear: vk::ClearColorValue,
    _entry: Entry,
}

// STRICT ORDER (bootstrap), mirrored by teardown::CREATION_ORDER:
// 1) Load the library, create the Instance after the required extensions were found
// 2) Debug messenger (validation only)
// 3) Surface FROM THIS INSTANCE
// 4) Devices snapshotted AGAINST THIS SURFACE, one chosen, queue families picked
// 5) Logical device + queues
// 6) Surface negotiated, swapchain created, image count checked
// 7) Semaphores, command pool, command buffers, initial recording
// Every handle goes into `owned` as soon as it exists, so an early return
// tears down exactly the steps that succeeded.
unsafe fn build_renderer(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: RenderSize,
    settings: &VkSettings,
    policy: &dyn DeviceSelectionPolicy,
) -> Result<VkRenderer> {
    let dh = display
        .display_handle()
        .map_err(|e| handle_failure("display handle", e))?
        .as_raw();
    let wh = window
        .window_handle()
        .map_err(|e| handle_failure("window handle", e))?
        .as_raw();

    let entry = Entry::load().map_err(|e| load_failure(e))?;
    let mut owned = GpuObjects::default();

    let instance = context::create_instance(&entry, dh, settings)?;
    owned.instance = Some(instance.clone());
    if settings.validation {
        owned.debug = Some(DebugMessenger::create(&entry, &instance)?);
    }

    let surface_loader = surface::Instance::new(&entry, &instance);
    let surface = context::create_surface(&entry, &instance, dh, wh)?;
    owned.surface = Some((surface_loader.clone(), surface));

    // Snapshots only live for the duration of the choice.
    let (phys, queues) = {
        let devices = selector::enumerate_devices(&instance, &surface_loader, surface)?;
        let chosen = selector::pick_device(policy, &devices)?;
        require_all("device extension", [khr_swapchain::NAME], &chosen.extensions)?;
        let queues = selector::select_queue_families(&chosen.queue_families)?;
        info!(
            "device {:?} ({} found): graphics family {}, present family {}",
            chosen.name,
            devices.len(),
            queues.graphics,
            queues.present
        );
        (chosen.handle, queues)
    };

    let logical = context::create_logical_device(&instance, phys, queues)?;
    let device = logical.device;
    owned.device = Some(device.clone());

    let params = negotiate::query_and_negotiate(&surface_loader, phys, surface, size)?;
    let swapchain_loader = khr_swapchain::Device::new(&instance, &device);
    let sc = swapchain::create_swapchain(&swapchain_loader, surface, &params, queues)?;
    owned.swapchain = Some((swapchain_loader.clone(), sc.handle));

    let sync = FrameSync::create(&device)?;
    owned.sync = Some(sync);

    // Submission goes to the present queue, so the pool belongs to its family.
    let commands = swapchain::create_command_resources(&device, queues.present, sc.images.len())?;
    owned.pool = Some(commands.pool);
    owned.bufs = commands.bufs.clone();

    let mut r = VkRenderer {
        owned,
        queues,
        device,
        graphics_queue: logical.graphics_queue,
        present_queue: logical.present_queue,
        swapchain_loader,
        swapchain: sc,
        sync,
        bufs: commands.bufs,
        clear: vk::ClearColorValue {
            float32: [0.0, 0.0, 0.0, 1.0],
        },
        _entry: entry,
    };

    r.record_commands()?;
    Ok(r)
}

impl VkRenderer {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &VkSettings,
    ) -> Result<Self> {
        Self::with_policy(window, display, size, settings, &FirstEnumerated)
    }

    pub fn with_policy(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &VkSettings,
        policy: &dyn DeviceSelectionPolicy,
    ) -> Result<Self> {
        let r = unsafe { build_renderer(window, display, size, settings, policy)? };
        info!(
            "Vulkan swapchain ready ({}x{}, fmt {:?}, shared queue family: {})",
            r.swapchain.extent.width,
            r.swapchain.extent.height,
            r.swapchain.format,
            r.queues.is_shared()
        );
        Ok(r)
    }

    pub fn queues(&self) -> QueueSelection {
        self.queues
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.images.len()
    }

    unsafe fn record_commands(&mut self) -> Result<(), Failure> {
        for (&cmd, &image) in self.bufs.iter().zip(&self.swapchain.images) {
            swapchain::record_clear(&self.device, cmd, image, &self.clear)?;
        }
        Ok(())
    }

    // STRICT TEARDOWN ORDER: see teardown::teardown_order(). Running it again
    // is a no-op; dropping the renderer runs it if shutdown never did.
    unsafe fn teardown(&mut self) -> Result<(), Failure> {
        if self.owned.created().is_empty() {
            return Ok(());
        }
        self.owned.destroy_all()?;
        self.bufs.clear();
        self.swapchain.images.clear();
        info!("teardown complete");
        Ok(())
    }
}

// STRICT PER-FRAME ORDER:
// 1) record (host waits for the present queue first: one frame in flight)
// 2) acquire_next_image (signals image_available)
// 3) queue_submit (waits image_available at TRANSFER, signals render_finished)
// 4) queue_present (waits render_finished)
// One semaphore pair for all frames; do not pipeline past one frame.
impl FrameTarget for VkRenderer {
    fn record(&mut self, clear: ClearColor) -> Result<()> {
        unsafe {
            self.device
                .queue_wait_idle(self.present_queue)
                .map_err(status("vkQueueWaitIdle"))?;
            self.clear = vk::ClearColorValue { float32: clear.0 };
            self.record_commands()?;
        }
        Ok(())
    }

    fn acquire(&mut self) -> Result<u32> {
        let (image_index, suboptimal) = unsafe {
            self.swapchain_loader
                .acquire_next_image(
                    self.swapchain.handle,
                    u64::MAX,
                    self.sync.image_available,
                    vk::Fence::null(),
                )
                .map_err(status("vkAcquireNextImageKHR"))?
        };
        require_optimal("vkAcquireNextImageKHR", suboptimal)?;
        Ok(image_index)
    }

    fn submit(&mut self, image_index: u32) -> Result<()> {
        let cmd = self.bufs[image_index as usize];
        let wait_stages = [vk::PipelineStageFlags::TRANSFER];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &self.sync.image_available,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &self.sync.render_finished,
            ..Default::default()
        };
        unsafe {
            self.device
                .queue_submit(
                    self.present_queue,
                    std::slice::from_ref(&submit),
                    vk::Fence::null(),
                )
                .map_err(status("vkQueueSubmit"))?;
        }
        Ok(())
    }

    fn present(&mut self, image_index: u32) -> Result<()> {
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &self.sync.render_finished,
            swapchain_count: 1,
            p_swapchains: &self.swapchain.handle,
            p_image_indices: &image_index,
            ..Default::default()
        };
        let suboptimal = unsafe {
            self.swapchain_loader
                .queue_present(self.present_queue, &present)
                .map_err(status("vkQueuePresentKHR"))?
        };
        require_optimal("vkQueuePresentKHR", suboptimal)?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        unsafe { self.teardown()? };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_the_call_and_result() {
        let f = status("vkCreateDevice")(vk::Result::ERROR_INITIALIZATION_FAILED);
        match f {
            Failure::Status { call, result, code } => {
                assert_eq!(call, "vkCreateDevice");
                assert_eq!(result, "ERROR_INITIALIZATION_FAILED");
                assert_eq!(code, vk::Result::ERROR_INITIALIZATION_FAILED.as_raw());
            }
            other => panic!("unexpected failure: {other}"),
        }
    }

    #[test]
    fn suboptimal_acquire_is_a_status_failure() {
        require_optimal("vkAcquireNextImageKHR", false).unwrap();
        match require_optimal("vkAcquireNextImageKHR", true) {
            Err(Failure::Status { result, code, .. }) => {
                assert_eq!(result, "SUBOPTIMAL_KHR");
                assert_eq!(code, vk::Result::SUBOPTIMAL_KHR.as_raw());
            }
            other => panic!("expected a status failure, got {other:?}"),
        }
    }

    #[test]
    fn missing_loader_is_a_platform_failure() {
        let f = load_failure("libvulkan.so.1: cannot open shared object file");
        assert_eq!(f.exit_code(), 1);
        match f {
            Failure::Platform { context, source } => {
                assert_eq!(context, "load Vulkan library");
                assert!(source.to_string().contains("libvulkan.so.1"));
            }
            other => panic!("unexpected failure: {other}"),
        }
    }

    #[test]
    fn shared_selection_builds_single_queue_request() {
        let sel = selector::select_queue_families(&[selector::QueueFamilyCaps {
            graphics: true,
            present: true,
        }])
        .unwrap();
        assert_eq!(sel, QueueSelection { graphics: 0, present: 0 });
        assert_eq!(context::queue_create_infos(sel, &[1.0]).len(), 1);
    }

    #[test]
    fn split_selection_builds_two_queue_requests() {
        let sel = selector::select_queue_families(&[
            selector::QueueFamilyCaps {
                graphics: true,
                present: false,
            },
            selector::QueueFamilyCaps {
                graphics: false,
                present: true,
            },
        ])
        .unwrap();
        assert_eq!(sel, QueueSelection { graphics: 0, present: 1 });
        assert_eq!(context::queue_create_infos(sel, &[1.0]).len(), 2);
    }
}
