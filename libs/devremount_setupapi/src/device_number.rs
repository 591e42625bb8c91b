// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

use crate::platform::{
    DevicePlatform, RawDeviceFile, ERROR_INCORRECT_FUNCTION, ERROR_INVALID_DATA, ERROR_MORE_DATA,
    IOCTL_STORAGE_GET_DEVICE_NUMBER, IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS,
};
use crate::{RemountError, Result};

// STORAGE_DEVICE_NUMBER: DeviceType, DeviceNumber, PartitionNumber
const STORAGE_DEVICE_NUMBER_BYTES: usize = 12;

// VOLUME_DISK_EXTENTS: a u32 count padded to 8 bytes, then DISK_EXTENT records of
// { DiskNumber: u32, (4 bytes padding), StartingOffset: i64, ExtentLength: i64 }
const DISK_EXTENTS_HEADER_BYTES: usize = 8;
const DISK_EXTENT_BYTES: usize = 24;
const MAX_DISK_EXTENTS: usize = 64;

/// Stable identity of the storage behind a volume path.
///
/// Simple partitions are identified by what `IOCTL_STORAGE_GET_DEVICE_NUMBER` reports. Dynamic (software-composed)
/// volumes do not answer that query; when such a volume lives on a single disk it is identified by that disk alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceIdentity {
    Partitioned { device: u32, partition: u32, device_type: u32 },
    SpannedDisk { disk_number: u32 },
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceIdentity::Partitioned { device, partition, device_type } => write!(f, "<{}: {}, {}>", device_type, device, partition),
            DeviceIdentity::SpannedDisk { disk_number } => write!(f, "<dynamic: disk {}>", disk_number),
        }
    }
}

// an open volume handle, closed on every exit path
struct DeviceFile<'p, P: DevicePlatform> {
    platform: &'p P,
    raw: RawDeviceFile,
}

impl<'p, P: DevicePlatform> DeviceFile<'p, P> {
    fn open(platform: &'p P, path: &str) -> Result<Self> {
        let raw = platform.open_device_file(path)
            .map_err(|code| RemountError::PathOpenFailed { path: path.to_string(), code })?;
        Ok(DeviceFile { platform, raw })
    }

    fn control(&self, control_code: u32, output: &mut [u8]) -> std::result::Result<u32, u32> {
        self.platform.device_io_control(self.raw, control_code, output)
    }
}

impl<'p, P: DevicePlatform> Drop for DeviceFile<'p, P> {
    fn drop(&mut self) {
        self.platform.close_device_file(self.raw);
    }
}

fn read_u32(buffer: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buffer[offset], buffer[offset + 1], buffer[offset + 2], buffer[offset + 3]])
}

/// Resolves a volume path (`\\.\E:` or a device interface path) to the identity of the storage behind it.
pub fn resolve_device_identity<P: DevicePlatform>(platform: &P, path: &str) -> Result<DeviceIdentity> {
    let file = DeviceFile::open(platform, path)?;

    let mut device_number = [0u8; STORAGE_DEVICE_NUMBER_BYTES];
    match file.control(IOCTL_STORAGE_GET_DEVICE_NUMBER, &mut device_number) {
        Ok(_) => Ok(DeviceIdentity::Partitioned {
            device_type: read_u32(&device_number, 0),
            device: read_u32(&device_number, 4),
            partition: read_u32(&device_number, 8),
        }),
        // dynamic volumes do not support the storage device number query; fall back to their disk extents
        Err(ERROR_INCORRECT_FUNCTION) => resolve_single_extent_disk(&file),
        Err(code) => Err(RemountError::ControlQueryFailed { control_code: IOCTL_STORAGE_GET_DEVICE_NUMBER, code }),
    }
}

fn resolve_single_extent_disk<P: DevicePlatform>(file: &DeviceFile<'_, P>) -> Result<DeviceIdentity> {
    let mut extents = vec![0u8; DISK_EXTENTS_HEADER_BYTES + DISK_EXTENT_BYTES * MAX_DISK_EXTENTS];
    match file.control(IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS, &mut extents) {
        Ok(_) => {},
        // NOTE: ERROR_MORE_DATA still fills in the extent count, which is all we need to reject the volume
        Err(ERROR_MORE_DATA) => {
            return Err(RemountError::MultiExtentUnsupported { extents: read_u32(&extents, 0) });
        },
        Err(code) => {
            return Err(RemountError::ControlQueryFailed { control_code: IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS, code });
        },
    }

    match read_u32(&extents, 0) {
        0 => Err(RemountError::ControlQueryFailed { control_code: IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS, code: ERROR_INVALID_DATA }),
        1 => Ok(DeviceIdentity::SpannedDisk { disk_number: read_u32(&extents, DISK_EXTENTS_HEADER_BYTES) }),
        count => Err(RemountError::MultiExtentUnsupported { extents: count }),
    }
}
