// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

use crate::buffer_negotiation::negotiate_buffer;
use crate::device_interface::DeviceInterfaceIter;
use crate::platform::{DevInfoData, DevicePlatform, RawDeviceInfoList, ERROR_NO_MORE_ITEMS};
use crate::{ClassInstallScope, ClassInstallState, GetClassFlag, GetClassFlags, Guid, RemountError, Result};
use devremount_common::utf16::from_utf16_null_terminated;

// scratch buffer handed to CM_Get_Device_IDW, in utf16 units (MAX_DEVICE_ID_LEN is 200; generous headroom)
const DEVICE_ID_BUFFER_CHARS: usize = 2048;

/// An open SetupAPI device information list (`HDEVINFO`).
///
/// The list is destroyed exactly once: by [`DeviceInfoList::close`] or, failing that, on drop. Device entries
/// borrow the list, so none can outlive it or be used across a close.
pub struct DeviceInfoList<'p, P: DevicePlatform> {
    platform: &'p P,
    handle: Option<RawDeviceInfoList>,
    machine_name: Option<String>,
}

impl<'p, P: DevicePlatform> DeviceInfoList<'p, P> {
    /// Opens a list restricted to the setup classes registered under `class_names`, or spanning all classes
    /// when `class_names` is empty.
    pub fn open(platform: &'p P, class_names: &[&str], flags: GetClassFlags, machine_name: Option<&str>) -> Result<Self> {
        let mut class_guids = Vec::<Guid>::new();
        for class_name in class_names {
            class_guids.extend(resolve_class_name(platform, class_name, machine_name)?);
        }

        DeviceInfoList::open_with_class_guids(platform, &class_guids, flags, machine_name)
    }

    pub fn open_with_class_guids(platform: &'p P, class_guids: &[Guid], flags: GetClassFlags, machine_name: Option<&str>) -> Result<Self> {
        // NOTE: the list is owned from the first successful creation on, so an error while extending it still releases it
        let mut list = DeviceInfoList {
            platform,
            handle: None,
            machine_name: machine_name.map(str::to_string),
        };

        if class_guids.is_empty() {
            let handle = platform.create_device_info_list(None, flags | GetClassFlag::AllClasses, None, machine_name)
                .map_err(|code| RemountError::ListCreationFailed { code })?;
            list.handle = Some(handle);
        } else {
            // fold every class into one list; each call after the first extends the list it is handed
            for class_guid in class_guids {
                let handle = platform.create_device_info_list(Some(class_guid), flags, list.handle, machine_name)
                    .map_err(|code| RemountError::ListCreationFailed { code })?;
                list.handle = Some(handle);
            }
        }

        log::debug!("opened device information list {:?} ({} class filter(s), flags {:?})", list.handle, class_guids.len(), flags);
        Ok(list)
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn machine_name(&self) -> Option<&str> {
        self.machine_name.as_deref()
    }

    pub(crate) fn platform(&self) -> &'p P {
        self.platform
    }

    pub(crate) fn raw(&self) -> Result<RawDeviceInfoList> {
        self.handle.ok_or(RemountError::InvalidState)
    }

    /// Lazily walks the devices of this list from index 0.
    pub fn devices(&self) -> Result<DeviceIter<'_, P>> {
        Ok(DeviceIter {
            list: self,
            raw: self.raw()?,
            next_index: 0,
            finished: false,
        })
    }

    /// Looks a device up by its (setup class, devnode) pair.
    pub fn find_device(&self, class_guid: &Guid, dev_inst: u32) -> Result<Option<DeviceEntry<'_, P>>> {
        for device in self.devices()? {
            let device = device?;
            if device.class_guid() == *class_guid && device.instance() == dev_inst {
                return Ok(Some(device));
            }
        }
        Ok(None)
    }

    /// Destroys the list now; any later use of it fails with `InvalidState`.
    pub fn close(&mut self) -> Result<()> {
        let handle = self.handle.take().ok_or(RemountError::InvalidState)?;
        self.platform.destroy_device_info_list(handle)
            .map_err(|code| RemountError::ListReleaseFailed { code })?;
        log::debug!("closed device information list {:?}", handle);
        Ok(())
    }
}

impl<'p, P: DevicePlatform> Drop for DeviceInfoList<'p, P> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let destroy_result = self.platform.destroy_device_info_list(handle);
            debug_assert!(destroy_result.is_ok(), "Could not clean up device info set; win32 error: {:?}", destroy_result);
        }
    }
}

fn resolve_class_name<P: DevicePlatform>(platform: &P, class_name: &str, machine_name: Option<&str>) -> Result<Vec<Guid>> {
    // NOTE: start with room for one GUID; names registered under several classes report ERROR_INSUFFICIENT_BUFFER with the full count
    let (mut class_guids, required) = negotiate_buffer::<Guid, _>(1, usize::MAX, |buffer, required_size| {
        platform.class_guids_from_name(class_name, machine_name, buffer, required_size)
    }).map_err(|error| error.into_remount_error(
        |code| RemountError::UnknownDeviceClass { name: class_name.to_string(), code },
        |_| RemountError::UnknownDeviceClass { name: class_name.to_string(), code: 0 },
    ))?;

    if required == 0 {
        return Err(RemountError::UnknownDeviceClass { name: class_name.to_string(), code: 0 });
    }
    class_guids.truncate(required);
    Ok(class_guids)
}

//

/// One device of a [`DeviceInfoList`] (`SP_DEVINFO_DATA`) together with its device instance id.
pub struct DeviceEntry<'l, P: DevicePlatform> {
    list: &'l DeviceInfoList<'l, P>,
    data: DevInfoData,
    device_id: String,
}

impl<'l, P: DevicePlatform> DeviceEntry<'l, P> {
    pub fn class_guid(&self) -> Guid {
        self.data.class_guid
    }

    // devnode handle (DEVINST)
    pub fn instance(&self) -> u32 {
        self.data.dev_inst
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub(crate) fn list(&self) -> &'l DeviceInfoList<'l, P> {
        self.list
    }

    pub(crate) fn data(&self) -> &DevInfoData {
        &self.data
    }

    /// Lazily walks this device's interfaces of the given interface class.
    pub fn interfaces(&self, interface_class_guid: &Guid) -> Result<DeviceInterfaceIter<'l, P>> {
        DeviceInterfaceIter::new(self.list, self.data, *interface_class_guid)
    }

    /// See [`crate::change_state`].
    pub fn change_state(&self, state: ClassInstallState, scope: ClassInstallScope, install_function: u32) -> Result<()> {
        crate::change_state(self, state, scope, install_function)
    }
}

impl<'l, P: DevicePlatform> std::fmt::Debug for DeviceEntry<'l, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceEntry")
            .field("class_guid", &self.data.class_guid)
            .field("instance", &self.data.dev_inst)
            .field("device_id", &self.device_id)
            .finish()
    }
}

fn query_device_id<P: DevicePlatform>(platform: &P, dev_inst: u32) -> Result<String> {
    let mut buffer = vec![0u16; DEVICE_ID_BUFFER_CHARS];
    platform.device_id(dev_inst, &mut buffer)
        .map_err(|code| RemountError::IdentityQueryFailed { code })?;

    from_utf16_null_terminated(&buffer).map_err(|_| RemountError::StringDecodingError)
}

/// Forward-only walk over the devices of a list; ends at `ERROR_NO_MORE_ITEMS`, and after the first error.
pub struct DeviceIter<'l, P: DevicePlatform> {
    list: &'l DeviceInfoList<'l, P>,
    raw: RawDeviceInfoList,
    next_index: u32,
    finished: bool,
}

impl<'l, P: DevicePlatform> Iterator for DeviceIter<'l, P> {
    type Item = Result<DeviceEntry<'l, P>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let platform = self.list.platform();
        let data = match platform.enum_device_info(self.raw, self.next_index) {
            Ok(value) => value,
            Err(ERROR_NO_MORE_ITEMS) => {
                // end of the list; this is success
                self.finished = true;
                return None;
            },
            Err(code) => {
                self.finished = true;
                return Some(Err(RemountError::EnumerationFailed { code }));
            },
        };
        self.next_index += 1;

        let device_id = match query_device_id(platform, data.dev_inst) {
            Ok(value) => value,
            Err(error) => {
                self.finished = true;
                return Some(Err(error));
            },
        };
        log::debug!("device {}: {} (class {})", data.dev_inst, device_id, data.class_guid);

        Some(Ok(DeviceEntry { list: self.list, data, device_id }))
    }
}

impl<'l, P: DevicePlatform> std::iter::FusedIterator for DeviceIter<'l, P> {}
