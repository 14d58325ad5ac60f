// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use pulse_core::Failure;

use crate::status;

/// The one semaphore pair every frame uses.
///
/// Sharing it across frames is only valid with at most one frame in flight;
/// the renderer waits for the present queue before re-recording to keep it so.
#[derive(Clone, Copy)]
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
}

impl FrameSync {
    pub unsafe fn create(device: &ash::Device) -> Result<Self, Failure> {
        let sem_ci = vk::SemaphoreCreateInfo::default();
        let image_available = device
            .create_semaphore(&sem_ci, None)
            .map_err(status("vkCreateSemaphore"))?;
        let render_finished = match device.create_semaphore(&sem_ci, None) {
            Ok(s) => s,
            Err(e) => {
                device.destroy_semaphore(image_available, None);
                return Err(status("vkCreateSemaphore")(e));
            }
        };
        Ok(Self {
            image_available,
            render_finished,
        })
    }

    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.image_available, None);
        device.destroy_semaphore(self.render_finished, None);
    }
}
