// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CStr;

use ash::khr::surface;
use ash::{vk, Instance};
use pulse_core::Failure;

use crate::capability::{list_supported, NameSet, Scope};
use crate::status;

/// What one queue family can do for us.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyCaps {
    pub graphics: bool,
    pub present: bool,
}

/// Queue family indices for the two roles; equal when one family does both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueSelection {
    pub graphics: u32,
    pub present: u32,
}

impl QueueSelection {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn families(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Snapshot of one enumerated device, only kept around while choosing.
#[derive(Clone, Debug)]
pub struct PhysicalDeviceInfo {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub queue_families: Vec<QueueFamilyCaps>,
    pub extensions: NameSet,
}

pub trait DeviceSelectionPolicy {
    /// Index into `devices` of the one to use, if any.
    fn choose(&self, devices: &[PhysicalDeviceInfo]) -> Option<usize>;
}

/// Takes whatever the driver lists first. No ranking.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstEnumerated;

impl DeviceSelectionPolicy for FirstEnumerated {
    fn choose(&self, devices: &[PhysicalDeviceInfo]) -> Option<usize> {
        (!devices.is_empty()).then_some(0)
    }
}

pub fn pick_device<'a>(
    policy: &dyn DeviceSelectionPolicy,
    devices: &'a [PhysicalDeviceInfo],
) -> Result<&'a PhysicalDeviceInfo, Failure> {
    policy
        .choose(devices)
        .and_then(|i| devices.get(i))
        .ok_or_else(|| Failure::missing("physical device"))
}

/// Single pass over the families. A family that does both graphics and
/// present wins outright; otherwise the first family for each role is used.
pub fn select_queue_families(families: &[QueueFamilyCaps]) -> Result<QueueSelection, Failure> {
    let mut graphics = None;
    let mut present = None;

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.graphics && family.present {
            return Ok(QueueSelection {
                graphics: i,
                present: i,
            });
        }
        if family.graphics && graphics.is_none() {
            graphics = Some(i);
        }
        if family.present && present.is_none() {
            present = Some(i);
        }
    }

    match (graphics, present) {
        (Some(graphics), Some(present)) => Ok(QueueSelection { graphics, present }),
        (None, _) => Err(Failure::missing("queue family with graphics support")),
        (_, None) => Err(Failure::missing("queue family with present support")),
    }
}

pub unsafe fn enumerate_devices(
    instance: &Instance,
    surf_i: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<Vec<PhysicalDeviceInfo>, Failure> {
    let handles = instance
        .enumerate_physical_devices()
        .map_err(status("vkEnumeratePhysicalDevices"))?;

    let mut devices = Vec::with_capacity(handles.len());
    for phys in handles {
        let props = instance.get_physical_device_properties(phys);
        let name = CStr::from_ptr(props.device_name.as_ptr())
            .to_string_lossy()
            .into_owned();

        let qprops = instance.get_physical_device_queue_family_properties(phys);
        let mut queue_families = Vec::with_capacity(qprops.len());
        for (i, q) in qprops.iter().enumerate() {
            let present = surf_i
                .get_physical_device_surface_support(phys, i as u32, surface)
                .map_err(status("vkGetPhysicalDeviceSurfaceSupportKHR"))?;
            queue_families.push(QueueFamilyCaps {
                graphics: q.queue_count > 0 && q.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                present,
            });
        }

        let extensions = list_supported(Scope::Device(instance, phys))?;
        tracing::debug!(
            "device {:?}: {} queue families, {} extensions",
            name,
            queue_families.len(),
            extensions.len()
        );
        devices.push(PhysicalDeviceInfo {
            handle: phys,
            name,
            queue_families,
            extensions,
        });
    }
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    const GRAPHICS: QueueFamilyCaps = QueueFamilyCaps {
        graphics: true,
        present: false,
    };
    const PRESENT: QueueFamilyCaps = QueueFamilyCaps {
        graphics: false,
        present: true,
    };
    const BOTH: QueueFamilyCaps = QueueFamilyCaps {
        graphics: true,
        present: true,
    };
    const NEITHER: QueueFamilyCaps = QueueFamilyCaps {
        graphics: false,
        present: false,
    };

    fn device(raw: u64, name: &str) -> PhysicalDeviceInfo {
        PhysicalDeviceInfo {
            handle: vk::PhysicalDevice::from_raw(raw),
            name: name.to_owned(),
            queue_families: vec![BOTH],
            extensions: NameSet::new(),
        }
    }

    #[test]
    fn combined_family_is_used_for_both_roles() {
        let sel = select_queue_families(&[BOTH]).unwrap();
        assert_eq!(sel, QueueSelection { graphics: 0, present: 0 });
        assert!(sel.is_shared());
        assert_eq!(sel.families(), [0]);
    }

    #[test]
    fn split_families_fall_back_to_first_of_each() {
        let sel = select_queue_families(&[GRAPHICS, PRESENT]).unwrap();
        assert_eq!(sel, QueueSelection { graphics: 0, present: 1 });
        assert!(!sel.is_shared());
        assert_eq!(sel.families(), [0, 1]);
    }

    #[test]
    fn combined_family_beats_earlier_split_ones() {
        let sel = select_queue_families(&[GRAPHICS, PRESENT, NEITHER, BOTH]).unwrap();
        assert_eq!(sel, QueueSelection { graphics: 3, present: 3 });
    }

    #[test]
    fn first_match_per_role_is_kept() {
        let sel = select_queue_families(&[PRESENT, GRAPHICS, PRESENT, GRAPHICS]).unwrap();
        assert_eq!(sel, QueueSelection { graphics: 1, present: 0 });
    }

    #[test]
    fn no_graphics_family_is_missing_capability() {
        let err = select_queue_families(&[PRESENT, NEITHER]).unwrap_err();
        match err {
            Failure::MissingCapability { what } => assert!(what.contains("graphics")),
            other => panic!("unexpected failure: {other}"),
        }
    }

    #[test]
    fn no_present_family_is_missing_capability() {
        let err = select_queue_families(&[GRAPHICS]).unwrap_err();
        match err {
            Failure::MissingCapability { what } => assert!(what.contains("present")),
            other => panic!("unexpected failure: {other}"),
        }
    }

    #[test]
    fn no_families_at_all_fails() {
        assert!(select_queue_families(&[]).is_err());
    }

    #[test]
    fn first_enumerated_takes_index_zero() {
        let devices = [device(1, "a"), device(2, "b")];
        let chosen = pick_device(&FirstEnumerated, &devices).unwrap();
        assert_eq!(chosen.name, "a");
    }

    #[test]
    fn empty_device_list_is_missing_capability() {
        let err = pick_device(&FirstEnumerated, &[]).unwrap_err();
        assert!(matches!(err, Failure::MissingCapability { .. }));
    }

    struct ByName(&'static str);

    impl DeviceSelectionPolicy for ByName {
        fn choose(&self, devices: &[PhysicalDeviceInfo]) -> Option<usize> {
            devices.iter().position(|d| d.name == self.0)
        }
    }

    #[test]
    fn policies_can_be_swapped() {
        let devices = [device(1, "a"), device(2, "b")];
        let chosen = pick_device(&ByName("b"), &devices).unwrap();
        assert_eq!(chosen.handle, vk::PhysicalDevice::from_raw(2));
        assert!(pick_device(&ByName("c"), &devices).is_err());
    }
}
