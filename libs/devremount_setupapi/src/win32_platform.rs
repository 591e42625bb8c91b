// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

use crate::platform::{
    DevInfoData, DeviceInterfaceData, DevicePlatform, PropChangeParams, RawDeviceFile, RawDeviceInfoList,
    ERROR_INVALID_DATA,
};
use crate::{GetClassFlags, Guid};
use devremount_common::utf16::to_utf16_null_terminated;
use devremount_common::win32_utils;
use windows_sys::{
    core::GUID,
    Win32::Devices::DeviceAndDriverInstallation::{
        CM_Get_Device_IDW,
        SetupDiCallClassInstaller,
        SetupDiClassGuidsFromNameExW,
        SetupDiDestroyDeviceInfoList,
        SetupDiEnumDeviceInfo,
        SetupDiEnumDeviceInterfaces,
        SetupDiGetClassDevsExW,
        SetupDiGetDeviceInterfaceDetailW,
        SetupDiSetClassInstallParamsW,
        CR_SUCCESS,
        HDEVINFO,
        SP_CLASSINSTALL_HEADER,
        SP_DEVICE_INTERFACE_DATA,
        SP_DEVICE_INTERFACE_DETAIL_DATA_W,
        SP_DEVINFO_DATA,
        SP_PROPCHANGE_PARAMS,
    },
    Win32::Foundation::{CloseHandle, GENERIC_READ, HANDLE, INVALID_HANDLE_VALUE},
    Win32::Storage::FileSystem::{CreateFileW, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING},
    Win32::System::IO::DeviceIoControl,
};

/// `DevicePlatform` backed by SetupAPI, CfgMgr32 and kernel32.
#[derive(Default)]
pub struct Win32Platform {
}
//
impl Win32Platform {
    pub fn new() -> Self {
        Win32Platform { }
    }
}

fn to_hdevinfo(list: RawDeviceInfoList) -> HDEVINFO {
    list.0 as HDEVINFO
}

fn to_devinfo_data(device: &DevInfoData) -> SP_DEVINFO_DATA {
    SP_DEVINFO_DATA {
        cbSize: std::mem::size_of::<SP_DEVINFO_DATA>() as u32,
        ClassGuid: device.class_guid.into(),
        DevInst: device.dev_inst,
        Reserved: device.reserved,
    }
}

fn to_device_interface_data(interface: &DeviceInterfaceData) -> SP_DEVICE_INTERFACE_DATA {
    SP_DEVICE_INTERFACE_DATA {
        cbSize: std::mem::size_of::<SP_DEVICE_INTERFACE_DATA>() as u32,
        InterfaceClassGuid: interface.interface_class_guid.into(),
        Flags: interface.flags,
        Reserved: interface.reserved,
    }
}

// NOTE: a few SetupAPI calls can fail without setting a last error; never report such a failure as success
fn last_error_or(fallback: u32) -> u32 {
    match win32_utils::get_last_error_code() {
        0 => fallback,
        code => code,
    }
}

impl DevicePlatform for Win32Platform {
    fn class_guids_from_name(&self, class_name: &str, machine_name: Option<&str>, guids: &mut [Guid], required_size: &mut u32) -> Result<(), u32> {
        let class_name_as_utf16_chars = to_utf16_null_terminated(class_name);
        let machine_name_as_utf16_chars = machine_name.map(to_utf16_null_terminated);
        let machine_name_as_pwstr = match machine_name_as_utf16_chars {
            Some(ref value) => value.as_ptr(),
            None => std::ptr::null(),
        };

        let mut raw_guids: Vec<GUID> = guids.iter().map(|guid| GUID::from(*guid)).collect();
        let raw_guids_ptr = if raw_guids.is_empty() { std::ptr::null_mut() } else { raw_guids.as_mut_ptr() };

        // see: https://learn.microsoft.com/en-us/windows/win32/api/setupapi/nf-setupapi-setupdiclassguidsfromnameexw
        let result = unsafe { SetupDiClassGuidsFromNameExW(class_name_as_utf16_chars.as_ptr(), raw_guids_ptr, raw_guids.len() as u32, required_size, machine_name_as_pwstr, std::ptr::null()) };
        if result == 0 {
            return Err(last_error_or(ERROR_INVALID_DATA));
        }

        for (guid, raw_guid) in guids.iter_mut().zip(raw_guids) {
            *guid = Guid::from(raw_guid);
        }
        Ok(())
    }

    fn create_device_info_list(&self, class_guid: Option<&Guid>, flags: GetClassFlags, existing: Option<RawDeviceInfoList>, machine_name: Option<&str>) -> Result<RawDeviceInfoList, u32> {
        let raw_class_guid: Option<GUID> = class_guid.map(|guid| GUID::from(*guid));
        let raw_class_guid_ptr = match raw_class_guid {
            Some(ref value) => value as *const GUID,
            None => std::ptr::null(),
        };

        // NOTE: keep the utf16 buffer bound in this scope so the pointer stays valid for the duration of the call
        let machine_name_as_utf16_chars = machine_name.map(to_utf16_null_terminated);
        let machine_name_as_pwstr = match machine_name_as_utf16_chars {
            Some(ref value) => value.as_ptr(),
            None => std::ptr::null(),
        };

        let existing_device_info_set = match existing {
            Some(list) => to_hdevinfo(list),
            None => 0isize as HDEVINFO,
        };

        // see: https://learn.microsoft.com/en-us/windows/win32/api/setupapi/nf-setupapi-setupdigetclassdevsexw
        let handle_to_device_info_set = unsafe { SetupDiGetClassDevsExW(raw_class_guid_ptr, std::ptr::null(), std::ptr::null_mut(), flags.bits(), existing_device_info_set, machine_name_as_pwstr, std::ptr::null()) };
        if handle_to_device_info_set as isize == INVALID_HANDLE_VALUE as isize {
            return Err(last_error_or(ERROR_INVALID_DATA));
        }

        Ok(RawDeviceInfoList(handle_to_device_info_set as isize))
    }

    fn destroy_device_info_list(&self, list: RawDeviceInfoList) -> Result<(), u32> {
        let destroy_result = unsafe { SetupDiDestroyDeviceInfoList(to_hdevinfo(list)) };
        if destroy_result == 0 {
            return Err(last_error_or(ERROR_INVALID_DATA));
        }
        Ok(())
    }

    fn enum_device_info(&self, list: RawDeviceInfoList, member_index: u32) -> Result<DevInfoData, u32> {
        let mut devinfo_data = SP_DEVINFO_DATA { cbSize: 0, ClassGuid: GUID::from_u128(0), DevInst: 0, Reserved: 0 };
        devinfo_data.cbSize = std::mem::size_of::<SP_DEVINFO_DATA>() as u32;

        // see: https://learn.microsoft.com/en-us/windows/win32/api/setupapi/nf-setupapi-setupdienumdeviceinfo
        let enum_device_info_result = unsafe { SetupDiEnumDeviceInfo(to_hdevinfo(list), member_index, &mut devinfo_data) };
        if enum_device_info_result == 0 {
            return Err(last_error_or(ERROR_INVALID_DATA));
        }

        Ok(DevInfoData {
            class_guid: Guid::from(devinfo_data.ClassGuid),
            dev_inst: devinfo_data.DevInst,
            reserved: devinfo_data.Reserved,
        })
    }

    fn device_id(&self, dev_inst: u32, buffer: &mut [u16]) -> Result<(), u32> {
        // see: https://learn.microsoft.com/en-us/windows/win32/api/cfgmgr32/nf-cfgmgr32-cm_get_device_idw
        let config_ret = unsafe { CM_Get_Device_IDW(dev_inst, buffer.as_mut_ptr(), buffer.len() as u32, 0) };
        if config_ret != CR_SUCCESS {
            return Err(config_ret);
        }
        Ok(())
    }

    fn enum_device_interfaces(&self, list: RawDeviceInfoList, device: &DevInfoData, interface_class_guid: &Guid, member_index: u32) -> Result<DeviceInterfaceData, u32> {
        let devinfo_data = to_devinfo_data(device);
        let raw_interface_class_guid = GUID::from(*interface_class_guid);

        let mut device_interface_data = SP_DEVICE_INTERFACE_DATA { cbSize: 0, InterfaceClassGuid: GUID::from_u128(0), Flags: 0, Reserved: 0 };
        device_interface_data.cbSize = std::mem::size_of::<SP_DEVICE_INTERFACE_DATA>() as u32;

        // see: https://learn.microsoft.com/en-us/windows/win32/api/setupapi/nf-setupapi-setupdienumdeviceinterfaces
        let enum_device_interfaces_result = unsafe { SetupDiEnumDeviceInterfaces(to_hdevinfo(list), &devinfo_data, &raw_interface_class_guid, member_index, &mut device_interface_data) };
        if enum_device_interfaces_result == 0 {
            return Err(last_error_or(ERROR_INVALID_DATA));
        }

        Ok(DeviceInterfaceData {
            interface_class_guid: Guid::from(device_interface_data.InterfaceClassGuid),
            flags: device_interface_data.Flags,
            reserved: device_interface_data.Reserved,
        })
    }

    fn device_interface_detail(&self, list: RawDeviceInfoList, interface: &DeviceInterfaceData, buffer: &mut [u8], required_size: &mut u32) -> Result<(), u32> {
        let device_interface_data = to_device_interface_data(interface);

        // NOTE: SP_DEVICE_INTERFACE_DETAIL_DATA_W must be 4-byte aligned, which a byte buffer does not guarantee; stage the call through a u32 buffer
        let mut aligned_buffer = vec![0u32; buffer.len().div_ceil(4)];
        let detail_data_ptr = aligned_buffer.as_mut_ptr() as *mut SP_DEVICE_INTERFACE_DETAIL_DATA_W;
        if buffer.len() >= std::mem::size_of::<u32>() {
            // NOTE: cbSize is the fixed portion of the structure (8 on 64-bit, 6 on 32-bit), not the buffer size
            unsafe { (*detail_data_ptr).cbSize = std::mem::size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>() as u32; }
        }
        let detail_data_ptr = if buffer.is_empty() { std::ptr::null_mut() } else { detail_data_ptr };

        // see: https://learn.microsoft.com/en-us/windows/win32/api/setupapi/nf-setupapi-setupdigetdeviceinterfacedetailw
        let get_device_interface_detail_result = unsafe { SetupDiGetDeviceInterfaceDetailW(to_hdevinfo(list), &device_interface_data, detail_data_ptr, buffer.len() as u32, required_size, std::ptr::null_mut()) };
        if get_device_interface_detail_result == 0 {
            return Err(last_error_or(ERROR_INVALID_DATA));
        }

        let aligned_bytes = unsafe { std::slice::from_raw_parts(aligned_buffer.as_ptr() as *const u8, buffer.len()) };
        buffer.copy_from_slice(aligned_bytes);
        Ok(())
    }

    fn open_device_file(&self, path: &str) -> Result<RawDeviceFile, u32> {
        let path_as_utf16_chars = to_utf16_null_terminated(path);

        // see: https://learn.microsoft.com/en-us/windows/win32/api/fileapi/nf-fileapi-createfilew
        let handle: HANDLE = unsafe { CreateFileW(path_as_utf16_chars.as_ptr(), GENERIC_READ, FILE_SHARE_READ | FILE_SHARE_WRITE, std::ptr::null(), OPEN_EXISTING, 0, std::ptr::null_mut()) };
        if handle as isize == INVALID_HANDLE_VALUE as isize {
            return Err(last_error_or(ERROR_INVALID_DATA));
        }

        Ok(RawDeviceFile(handle as isize))
    }

    fn close_device_file(&self, file: RawDeviceFile) {
        let close_result = unsafe { CloseHandle(file.0 as HANDLE) };
        debug_assert!(close_result != 0, "Could not close device handle; win32 error: {}", win32_utils::get_last_error_code());
    }

    fn device_io_control(&self, file: RawDeviceFile, control_code: u32, output: &mut [u8]) -> Result<u32, u32> {
        let mut bytes_returned: u32 = 0;

        // see: https://learn.microsoft.com/en-us/windows/win32/api/ioapiset/nf-ioapiset-deviceiocontrol
        let device_io_control_result = unsafe { DeviceIoControl(file.0 as HANDLE, control_code, std::ptr::null(), 0, output.as_mut_ptr() as *mut core::ffi::c_void, output.len() as u32, &mut bytes_returned, std::ptr::null_mut()) };
        if device_io_control_result == 0 {
            return Err(last_error_or(ERROR_INVALID_DATA));
        }

        Ok(bytes_returned)
    }

    fn set_class_install_params(&self, list: RawDeviceInfoList, device: &DevInfoData, params: &PropChangeParams) -> Result<(), u32> {
        let devinfo_data = to_devinfo_data(device);
        let propchange_params = SP_PROPCHANGE_PARAMS {
            ClassInstallHeader: SP_CLASSINSTALL_HEADER {
                cbSize: std::mem::size_of::<SP_CLASSINSTALL_HEADER>() as u32,
                InstallFunction: params.install_function,
            },
            StateChange: params.state_change as u32,
            Scope: params.scope as u32,
            HwProfile: params.hw_profile,
        };

        // see: https://learn.microsoft.com/en-us/windows/win32/api/setupapi/nf-setupapi-setupdisetclassinstallparamsw
        let set_class_install_params_result = unsafe { SetupDiSetClassInstallParamsW(to_hdevinfo(list), &devinfo_data, &propchange_params.ClassInstallHeader, std::mem::size_of::<SP_PROPCHANGE_PARAMS>() as u32) };
        if set_class_install_params_result == 0 {
            return Err(last_error_or(ERROR_INVALID_DATA));
        }
        Ok(())
    }

    fn call_class_installer(&self, install_function: u32, list: RawDeviceInfoList, device: &DevInfoData) -> Result<(), u32> {
        let devinfo_data = to_devinfo_data(device);

        // see: https://learn.microsoft.com/en-us/windows/win32/api/setupapi/nf-setupapi-setupdicallclassinstaller
        let call_class_installer_result = unsafe { SetupDiCallClassInstaller(install_function, to_hdevinfo(list), &devinfo_data) };
        if call_class_installer_result == 0 {
            return Err(last_error_or(ERROR_INVALID_DATA));
        }
        Ok(())
    }
}
