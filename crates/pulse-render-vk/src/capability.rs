// SPDX-License-Identifier: CEPL-1.0
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};

use ash::{vk, Entry, Instance};
use pulse_core::Failure;

use crate::status;

pub type NameSet = BTreeSet<CString>;

/// Where to look for extensions.
#[derive(Clone, Copy)]
pub enum Scope<'a> {
    Instance(&'a Entry),
    Device(&'a Instance, vk::PhysicalDevice),
}

pub unsafe fn list_supported(scope: Scope<'_>) -> Result<NameSet, Failure> {
    let props = match scope {
        Scope::Instance(entry) => entry
            .enumerate_instance_extension_properties(None)
            .map_err(status("vkEnumerateInstanceExtensionProperties"))?,
        Scope::Device(instance, phys) => instance
            .enumerate_device_extension_properties(phys)
            .map_err(status("vkEnumerateDeviceExtensionProperties"))?,
    };
    Ok(props
        .iter()
        .map(|p| CStr::from_ptr(p.extension_name.as_ptr()).to_owned())
        .collect())
}

pub unsafe fn list_layers(entry: &Entry) -> Result<NameSet, Failure> {
    let props = entry
        .enumerate_instance_layer_properties()
        .map_err(status("vkEnumerateInstanceLayerProperties"))?;
    Ok(props
        .iter()
        .map(|p| CStr::from_ptr(p.layer_name.as_ptr()).to_owned())
        .collect())
}

/// Fails with every missing name listed, not just the first one.
pub fn require_all<'a, I>(kind: &str, required: I, available: &NameSet) -> Result<(), Failure>
where
    I: IntoIterator<Item = &'a CStr>,
{
    let missing: Vec<String> = required
        .into_iter()
        .filter(|name| !available.contains(*name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Failure::missing(format!("{kind}: {}", missing.join(", "))))
    }
}
