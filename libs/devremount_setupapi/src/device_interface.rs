// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

use crate::buffer_negotiation::negotiate_buffer;
use crate::platform::{DevInfoData, DeviceInterfaceData, DevicePlatform, RawDeviceInfoList, ERROR_NO_MORE_ITEMS};
use crate::{DeviceInfoList, Guid, RemountError, Result};
use devremount_common::utf16::from_utf16_le_bytes_null_terminated;

// longest device path accepted, in utf16 units; the null terminator comes on top of this
pub const MAX_INTERFACE_PATH_CHARS: usize = 1024;

// SP_DEVICE_INTERFACE_DETAIL_DATA_W.cbSize precedes the path
const DETAIL_HEADER_BYTES: usize = std::mem::size_of::<u32>();
// first guess; volume paths are usually well under MAX_PATH
const INITIAL_DETAIL_BUFFER_BYTES: usize = DETAIL_HEADER_BYTES + 260 * 2;
const MAX_DETAIL_BUFFER_BYTES: usize = DETAIL_HEADER_BYTES + (MAX_INTERFACE_PATH_CHARS + 1) * 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInterface {
    pub interface_class_guid: Guid,
    // SPINT_* flags
    pub flags: u32,
    pub path: String,
}

/// Forward-only walk over one device's interfaces of a single interface class.
pub struct DeviceInterfaceIter<'l, P: DevicePlatform> {
    list: &'l DeviceInfoList<'l, P>,
    raw: RawDeviceInfoList,
    device: DevInfoData,
    interface_class_guid: Guid,
    next_index: u32,
    finished: bool,
}

impl<'l, P: DevicePlatform> DeviceInterfaceIter<'l, P> {
    pub(crate) fn new(list: &'l DeviceInfoList<'l, P>, device: DevInfoData, interface_class_guid: Guid) -> Result<Self> {
        Ok(DeviceInterfaceIter {
            list,
            raw: list.raw()?,
            device,
            interface_class_guid,
            next_index: 0,
            finished: false,
        })
    }

    fn fetch(&mut self) -> Result<Option<DeviceInterface>> {
        let platform = self.list.platform();
        let interface_data = match platform.enum_device_interfaces(self.raw, &self.device, &self.interface_class_guid, self.next_index) {
            Ok(value) => value,
            Err(ERROR_NO_MORE_ITEMS) => return Ok(None),
            Err(code) => return Err(RemountError::EnumerationFailed { code }),
        };
        self.next_index += 1;

        let path = query_interface_path(platform, self.raw, &interface_data)?;
        log::debug!("device {}: interface {}", self.device.dev_inst, path);

        Ok(Some(DeviceInterface {
            interface_class_guid: interface_data.interface_class_guid,
            flags: interface_data.flags,
            path,
        }))
    }
}

impl<'l, P: DevicePlatform> Iterator for DeviceInterfaceIter<'l, P> {
    type Item = Result<DeviceInterface>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let fetched = self.fetch();
        if !matches!(fetched, Ok(Some(_))) {
            self.finished = true;
        }
        fetched.transpose()
    }
}

impl<'l, P: DevicePlatform> std::iter::FusedIterator for DeviceInterfaceIter<'l, P> {}

fn query_interface_path<P: DevicePlatform>(platform: &P, list: RawDeviceInfoList, interface_data: &DeviceInterfaceData) -> Result<String> {
    let (buffer, _) = negotiate_buffer::<u8, _>(INITIAL_DETAIL_BUFFER_BYTES, MAX_DETAIL_BUFFER_BYTES, |buffer, required_size| {
        platform.device_interface_detail(list, interface_data, buffer, required_size)
    }).map_err(|error| error.into_remount_error(
        |code| RemountError::EnumerationFailed { code },
        |required| RemountError::InterfacePathTooLong { required_chars: (required.saturating_sub(DETAIL_HEADER_BYTES) / 2).saturating_sub(1) },
    ))?;

    from_utf16_le_bytes_null_terminated(&buffer[DETAIL_HEADER_BYTES..]).map_err(|_| RemountError::StringDecodingError)
}
