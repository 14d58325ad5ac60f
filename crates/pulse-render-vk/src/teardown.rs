// SPDX-License-Identifier: CEPL-1.0
use ash::khr::{surface, swapchain};
use ash::{vk, Instance};
use pulse_core::Failure;
use tracing::{debug, warn};

use crate::context::DebugMessenger;
use crate::status;
use crate::sync::FrameSync;

/// GPU objects the renderer owns, one entry per destroy step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpuObject {
    Instance,
    DebugMessenger,
    Surface,
    Device,
    Swapchain,
    Semaphores,
    CommandPool,
    CommandBuffers,
}

/// Order of creation during bootstrap.
pub const CREATION_ORDER: [GpuObject; 8] = [
    GpuObject::Instance,
    GpuObject::DebugMessenger,
    GpuObject::Surface,
    GpuObject::Device,
    GpuObject::Swapchain,
    GpuObject::Semaphores,
    GpuObject::CommandPool,
    GpuObject::CommandBuffers,
];

/// Strict reverse of creation.
pub fn teardown_order() -> impl Iterator<Item = GpuObject> {
    CREATION_ORDER.into_iter().rev()
}

/// Destroy steps for whatever subset actually got created, still in strict
/// reverse order. A bootstrap that fails half way only undoes its own steps.
pub fn teardown_plan(created: &[GpuObject]) -> Vec<GpuObject> {
    teardown_order().filter(|o| created.contains(o)).collect()
}

/// Owner of every destroyable handle, filled in step by step during
/// bootstrap. Dropping it tears down whatever it holds.
#[derive(Default)]
pub(crate) struct GpuObjects {
    pub instance: Option<Instance>,
    pub debug: Option<DebugMessenger>,
    pub surface: Option<(surface::Instance, vk::SurfaceKHR)>,
    pub device: Option<ash::Device>,
    pub swapchain: Option<(swapchain::Device, vk::SwapchainKHR)>,
    pub sync: Option<FrameSync>,
    pub pool: Option<vk::CommandPool>,
    pub bufs: Vec<vk::CommandBuffer>,
}

impl GpuObjects {
    pub fn created(&self) -> Vec<GpuObject> {
        CREATION_ORDER
            .into_iter()
            .filter(|o| match o {
                GpuObject::Instance => self.instance.is_some(),
                GpuObject::DebugMessenger => self.debug.is_some(),
                GpuObject::Surface => self.surface.is_some(),
                GpuObject::Device => self.device.is_some(),
                GpuObject::Swapchain => self.swapchain.is_some(),
                GpuObject::Semaphores => self.sync.is_some(),
                GpuObject::CommandPool => self.pool.is_some(),
                GpuObject::CommandBuffers => !self.bufs.is_empty(),
            })
            .collect()
    }

    // The idle wait is what makes destroying safe, so a failure there
    // returns before anything is destroyed.
    pub unsafe fn destroy_all(&mut self) -> Result<(), Failure> {
        let plan = teardown_plan(&self.created());
        if plan.is_empty() {
            return Ok(());
        }
        if let Some(device) = &self.device {
            device
                .device_wait_idle()
                .map_err(status("vkDeviceWaitIdle"))?;
        }
        for object in plan {
            debug!("destroy {object:?}");
            self.destroy(object);
        }
        Ok(())
    }

    unsafe fn destroy(&mut self, object: GpuObject) {
        match object {
            GpuObject::CommandBuffers => {
                if let (Some(d), Some(pool)) = (&self.device, self.pool) {
                    d.free_command_buffers(pool, &self.bufs);
                }
                self.bufs.clear();
            }
            GpuObject::CommandPool => {
                if let (Some(d), Some(pool)) = (&self.device, self.pool.take()) {
                    d.destroy_command_pool(pool, None);
                }
            }
            GpuObject::Semaphores => {
                if let (Some(d), Some(sync)) = (&self.device, self.sync.take()) {
                    sync.destroy(d);
                }
            }
            GpuObject::Swapchain => {
                if let Some((loader, handle)) = self.swapchain.take() {
                    loader.destroy_swapchain(handle, None);
                }
            }
            GpuObject::Device => {
                if let Some(d) = self.device.take() {
                    d.destroy_device(None);
                }
            }
            GpuObject::Surface => {
                if let Some((loader, handle)) = self.surface.take() {
                    loader.destroy_surface(handle, None);
                }
            }
            GpuObject::DebugMessenger => {
                if let Some(debug) = self.debug.take() {
                    debug.destroy();
                }
            }
            GpuObject::Instance => {
                if let Some(instance) = self.instance.take() {
                    instance.destroy_instance(None);
                }
            }
        }
    }
}

impl Drop for GpuObjects {
    fn drop(&mut self) {
        if let Err(e) = unsafe { self.destroy_all() } {
            warn!("teardown on drop failed: {e}");
        }
    }
}
