// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

use crate::{ClassInstallScope, ClassInstallState, GetClassFlags, Guid};

// Win32 status codes this crate interprets (all others are surfaced verbatim)
pub const ERROR_INCORRECT_FUNCTION: u32 = 1;
pub const ERROR_FILE_NOT_FOUND: u32 = 2;
pub const ERROR_ACCESS_DENIED: u32 = 5;
pub const ERROR_INVALID_DATA: u32 = 13;
pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
pub const ERROR_MORE_DATA: u32 = 234;
pub const ERROR_NO_MORE_ITEMS: u32 = 259;

pub const IOCTL_STORAGE_GET_DEVICE_NUMBER: u32 = 0x002D_1080;
pub const IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS: u32 = 0x0056_0000;

// opaque HDEVINFO value; only DeviceInfoList may hold one
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawDeviceInfoList(pub isize);

// opaque file HANDLE value; only DeviceFile may hold one
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawDeviceFile(pub isize);

// SP_DEVINFO_DATA without cbSize
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DevInfoData {
    pub class_guid: Guid,
    pub dev_inst: u32,
    pub reserved: usize,
}

// SP_DEVICE_INTERFACE_DATA without cbSize
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceInterfaceData {
    pub interface_class_guid: Guid,
    pub flags: u32,
    pub reserved: usize,
}

// SP_PROPCHANGE_PARAMS (the class-install header's cbSize is filled in by the platform)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropChangeParams {
    pub install_function: u32,
    pub state_change: ClassInstallState,
    pub scope: ClassInstallScope,
    pub hw_profile: u32,
}

/// The SetupAPI / CfgMgr32 / kernel32 surface the engine consumes.
///
/// Every method is a thin, one-call mapping of the platform function it names. Failures are the raw
/// status the platform reported (`GetLastError()` or the `CONFIGRET` value); interpretation of those
/// statuses (end-of-enumeration, buffer negotiation, fallback) happens in the callers.
pub trait DevicePlatform {
    /// `SetupDiClassGuidsFromNameExW`. Writes up to `guids.len()` class GUIDs and stores the number of
    /// GUIDs registered under the name in `required_size`; a too-small buffer fails with
    /// `ERROR_INSUFFICIENT_BUFFER`. An unknown name succeeds with `required_size == 0`.
    fn class_guids_from_name(&self, class_name: &str, machine_name: Option<&str>, guids: &mut [Guid], required_size: &mut u32) -> Result<(), u32>;

    /// `SetupDiGetClassDevsExW`. When `existing` is supplied the devices are merged into that list and
    /// the same handle is returned.
    fn create_device_info_list(&self, class_guid: Option<&Guid>, flags: GetClassFlags, existing: Option<RawDeviceInfoList>, machine_name: Option<&str>) -> Result<RawDeviceInfoList, u32>;

    /// `SetupDiDestroyDeviceInfoList`.
    fn destroy_device_info_list(&self, list: RawDeviceInfoList) -> Result<(), u32>;

    /// `SetupDiEnumDeviceInfo`.
    fn enum_device_info(&self, list: RawDeviceInfoList, member_index: u32) -> Result<DevInfoData, u32>;

    /// `CM_Get_Device_IDW`; writes a null-terminated id into `buffer`. Failure is a `CONFIGRET`.
    fn device_id(&self, dev_inst: u32, buffer: &mut [u16]) -> Result<(), u32>;

    /// `SetupDiEnumDeviceInterfaces` scoped to one device.
    fn enum_device_interfaces(&self, list: RawDeviceInfoList, device: &DevInfoData, interface_class_guid: &Guid, member_index: u32) -> Result<DeviceInterfaceData, u32>;

    /// `SetupDiGetDeviceInterfaceDetailW`. `buffer` receives the SP_DEVICE_INTERFACE_DETAIL_DATA_W
    /// image: a 4-byte cbSize followed by the null-terminated utf16 (little-endian) device path.
    /// `required_size` always receives the byte count the platform needs.
    fn device_interface_detail(&self, list: RawDeviceInfoList, interface: &DeviceInterfaceData, buffer: &mut [u8], required_size: &mut u32) -> Result<(), u32>;

    /// `CreateFileW` with GENERIC_READ, FILE_SHARE_READ | FILE_SHARE_WRITE, OPEN_EXISTING, no flags.
    fn open_device_file(&self, path: &str) -> Result<RawDeviceFile, u32>;

    /// `CloseHandle`.
    fn close_device_file(&self, file: RawDeviceFile);

    /// `DeviceIoControl` with no input buffer; returns the number of bytes written to `output`.
    fn device_io_control(&self, file: RawDeviceFile, control_code: u32, output: &mut [u8]) -> Result<u32, u32>;

    /// `SetupDiSetClassInstallParamsW` with an SP_PROPCHANGE_PARAMS block.
    fn set_class_install_params(&self, list: RawDeviceInfoList, device: &DevInfoData, params: &PropChangeParams) -> Result<(), u32>;

    /// `SetupDiCallClassInstaller`.
    fn call_class_installer(&self, install_function: u32, list: RawDeviceInfoList, device: &DevInfoData) -> Result<(), u32>;
}
