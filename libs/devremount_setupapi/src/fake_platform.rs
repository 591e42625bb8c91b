// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

// In-memory DevicePlatform used by the unit tests: a small device tree with volume interfaces,
// failure injection, handle accounting and a log of every class-installer invocation.

use crate::platform::*;
use crate::{ClassInstallScope, ClassInstallState, GetClassFlag, GetClassFlags, Guid, GUID_DEVINTERFACE_VOLUME};
use std::cell::RefCell;
use std::collections::HashMap;

pub(crate) const ERROR_INVALID_HANDLE: u32 = 6;
pub(crate) const ERROR_INVALID_PARAMETER: u32 = 87;
pub(crate) const CR_NO_SUCH_DEVINST: u32 = 0x0000_000D;
pub(crate) const CR_BUFFER_SMALL: u32 = 0x0000_001A;

pub(crate) const GUID_DEVCLASS_VOLUME: Guid = Guid::from_u128(0x71a27cdd_812a_11d0_bec7_08002be2092f);
pub(crate) const GUID_DEVCLASS_DISKDRIVE: Guid = Guid::from_u128(0x4d36e967_e325_11ce_bfc1_08002be10318);
pub(crate) const GUID_DEVINTERFACE_DISK: Guid = Guid::from_u128(0x53f56307_b6bf_11d0_94f2_00a0c91efb8b);

pub(crate) const FILE_DEVICE_DISK: u32 = 7;

#[derive(Clone, Debug)]
pub(crate) enum FakeVolume {
    Partition { device_type: u32, device_number: u32, partition_number: u32 },
    // dynamic volume: IOCTL_STORAGE_GET_DEVICE_NUMBER is an incorrect function; extents list the disk numbers
    Dynamic { disks: Vec<u32> },
    OpenFails(u32),
    QueryFails(u32),
}

#[derive(Clone, Debug)]
struct FakeInterface {
    class_guid: Guid,
    path: String,
}

#[derive(Clone, Debug)]
struct FakeDevice {
    class_guid: Guid,
    dev_inst: u32,
    device_id: String,
    interfaces: Vec<FakeInterface>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct StateChangeRecord {
    pub list: RawDeviceInfoList,
    pub dev_inst: u32,
    pub install_function: u32,
    pub state: ClassInstallState,
    pub scope: ClassInstallScope,
}

#[derive(Default)]
struct FakeState {
    next_handle: isize,
    open_lists: HashMap<isize, Vec<usize>>,
    destroyed_lists: Vec<isize>,
    created_lists: usize,
    extended_lists: usize,
    create_calls: usize,
    open_files: HashMap<isize, String>,
    files_opened: usize,
    pending_params: HashMap<u32, PropChangeParams>,
    state_changes: Vec<StateChangeRecord>,
    platform_calls: usize,
}

#[derive(Default)]
pub(crate) struct FakePlatform {
    devices: Vec<FakeDevice>,
    class_names: HashMap<String, Vec<Guid>>,
    volumes: HashMap<String, FakeVolume>,
    state_change_failures: HashMap<u32, u32>,
    create_failure: Option<(usize, u32)>,
    enum_device_failure: Option<(u32, u32)>,
    device_id_failure: Option<u32>,
    state: RefCell<FakeState>,
}

impl FakePlatform {
    pub fn new() -> Self {
        let mut platform = FakePlatform::default();
        platform.state.get_mut().next_handle = 0x1000;
        platform
    }

    pub fn with_class_name(mut self, class_name: &str, guids: &[Guid]) -> Self {
        self.class_names.insert(class_name.to_ascii_lowercase(), guids.to_vec());
        self
    }

    pub fn with_device(mut self, class_guid: Guid, dev_inst: u32, device_id: &str) -> Self {
        self.devices.push(FakeDevice { class_guid, dev_inst, device_id: device_id.to_string(), interfaces: Vec::new() });
        self
    }

    pub fn with_interface(mut self, dev_inst: u32, class_guid: Guid, path: &str) -> Self {
        let device = self.devices.iter_mut().find(|device| device.dev_inst == dev_inst).expect("interface added to an unknown device");
        device.interfaces.push(FakeInterface { class_guid, path: path.to_string() });
        self
    }

    pub fn with_volume(mut self, path: &str, volume: FakeVolume) -> Self {
        self.volumes.insert(path.to_ascii_uppercase(), volume);
        self
    }

    // shorthand for a volume device exposing one volume interface backed by `volume`
    pub fn with_volume_device(self, dev_inst: u32, path: &str, volume: FakeVolume) -> Self {
        let device_id = format!("STORAGE\\VOLUME\\{}", dev_inst);
        self.with_device(GUID_DEVCLASS_VOLUME, dev_inst, &device_id)
            .with_interface(dev_inst, GUID_DEVINTERFACE_VOLUME, path)
            .with_volume(path, volume)
    }

    pub fn with_state_change_failure(mut self, dev_inst: u32, code: u32) -> Self {
        self.state_change_failures.insert(dev_inst, code);
        self
    }

    // fails the `call_index`-th (0-based) SetupDiGetClassDevsExW call, whether it creates or extends a list
    pub fn with_create_failure(mut self, call_index: usize, code: u32) -> Self {
        self.create_failure = Some((call_index, code));
        self
    }

    pub fn with_enum_device_failure(mut self, member_index: u32, code: u32) -> Self {
        self.enum_device_failure = Some((member_index, code));
        self
    }

    pub fn with_device_id_failure(mut self, config_ret: u32) -> Self {
        self.device_id_failure = Some(config_ret);
        self
    }

    //

    pub fn open_list_count(&self) -> usize {
        self.state.borrow().open_lists.len()
    }

    pub fn destroyed_lists(&self) -> Vec<isize> {
        self.state.borrow().destroyed_lists.clone()
    }

    pub fn created_list_count(&self) -> usize {
        self.state.borrow().created_lists
    }

    pub fn extended_list_count(&self) -> usize {
        self.state.borrow().extended_lists
    }

    pub fn open_file_count(&self) -> usize {
        self.state.borrow().open_files.len()
    }

    pub fn files_opened(&self) -> usize {
        self.state.borrow().files_opened
    }

    pub fn state_changes(&self) -> Vec<StateChangeRecord> {
        self.state.borrow().state_changes.clone()
    }

    pub fn platform_calls(&self) -> usize {
        self.state.borrow().platform_calls
    }

    //

    fn count_call(&self) {
        self.state.borrow_mut().platform_calls += 1;
    }

    fn list_members(&self, list: RawDeviceInfoList) -> Result<Vec<usize>, u32> {
        match self.state.borrow().open_lists.get(&list.0) {
            Some(members) => Ok(members.clone()),
            None => Err(ERROR_INVALID_HANDLE),
        }
    }

    fn device_by_inst(&self, dev_inst: u32) -> Option<&FakeDevice> {
        self.devices.iter().find(|device| device.dev_inst == dev_inst)
    }

    fn volume_for_file(&self, file: RawDeviceFile) -> Result<FakeVolume, u32> {
        let state = self.state.borrow();
        let path = state.open_files.get(&file.0).ok_or(ERROR_INVALID_HANDLE)?;
        self.volumes.get(path).cloned().ok_or(ERROR_INVALID_HANDLE)
    }
}

fn write_u32(buffer: &mut [u8], offset: usize, value: u32) {
    buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_u64(buffer: &mut [u8], offset: usize, value: u64) {
    buffer[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

impl DevicePlatform for FakePlatform {
    fn class_guids_from_name(&self, class_name: &str, _machine_name: Option<&str>, guids: &mut [Guid], required_size: &mut u32) -> Result<(), u32> {
        self.count_call();
        let registered = self.class_names.get(&class_name.to_ascii_lowercase()).cloned().unwrap_or_default();
        *required_size = registered.len() as u32;
        if registered.len() > guids.len() {
            guids.copy_from_slice(&registered[..guids.len()]);
            return Err(ERROR_INSUFFICIENT_BUFFER);
        }
        guids[..registered.len()].copy_from_slice(&registered);
        Ok(())
    }

    fn create_device_info_list(&self, class_guid: Option<&Guid>, flags: GetClassFlags, existing: Option<RawDeviceInfoList>, _machine_name: Option<&str>) -> Result<RawDeviceInfoList, u32> {
        self.count_call();
        let call_index = {
            let mut state = self.state.borrow_mut();
            state.create_calls += 1;
            state.create_calls - 1
        };
        if let Some((failing_index, code)) = self.create_failure {
            if failing_index == call_index {
                return Err(code);
            }
        }
        if class_guid.is_none() && !flags.contains(GetClassFlag::AllClasses) {
            return Err(ERROR_INVALID_PARAMETER);
        }

        let selected: Vec<usize> = self.devices.iter().enumerate()
            .filter(|(_, device)| {
                if flags.contains(GetClassFlag::AllClasses) {
                    return true;
                }
                let guid = class_guid.copied().unwrap_or_default();
                if flags.contains(GetClassFlag::DeviceInterface) {
                    device.interfaces.iter().any(|interface| interface.class_guid == guid)
                } else {
                    device.class_guid == guid
                }
            })
            .map(|(index, _)| index)
            .collect();

        let mut state = self.state.borrow_mut();
        match existing {
            Some(list) => {
                let members = state.open_lists.get_mut(&list.0).ok_or(ERROR_INVALID_HANDLE)?;
                for index in selected {
                    if !members.contains(&index) {
                        members.push(index);
                    }
                }
                state.extended_lists += 1;
                Ok(list)
            },
            None => {
                let handle = state.next_handle;
                state.next_handle += 1;
                state.open_lists.insert(handle, selected);
                state.created_lists += 1;
                Ok(RawDeviceInfoList(handle))
            },
        }
    }

    fn destroy_device_info_list(&self, list: RawDeviceInfoList) -> Result<(), u32> {
        self.count_call();
        let mut state = self.state.borrow_mut();
        if state.open_lists.remove(&list.0).is_none() {
            return Err(ERROR_INVALID_HANDLE);
        }
        state.destroyed_lists.push(list.0);
        Ok(())
    }

    fn enum_device_info(&self, list: RawDeviceInfoList, member_index: u32) -> Result<DevInfoData, u32> {
        self.count_call();
        let members = self.list_members(list)?;
        if let Some((failing_index, code)) = self.enum_device_failure {
            if failing_index == member_index {
                return Err(code);
            }
        }

        let device = match members.get(member_index as usize) {
            Some(index) => &self.devices[*index],
            None => return Err(ERROR_NO_MORE_ITEMS),
        };
        Ok(DevInfoData { class_guid: device.class_guid, dev_inst: device.dev_inst, reserved: list.0 as usize })
    }

    fn device_id(&self, dev_inst: u32, buffer: &mut [u16]) -> Result<(), u32> {
        self.count_call();
        if let Some(config_ret) = self.device_id_failure {
            return Err(config_ret);
        }
        let device = self.device_by_inst(dev_inst).ok_or(CR_NO_SUCH_DEVINST)?;
        let chars: Vec<u16> = device.device_id.encode_utf16().chain(std::iter::once(0)).collect();
        if chars.len() > buffer.len() {
            return Err(CR_BUFFER_SMALL);
        }
        buffer[..chars.len()].copy_from_slice(&chars);
        Ok(())
    }

    fn enum_device_interfaces(&self, list: RawDeviceInfoList, device: &DevInfoData, interface_class_guid: &Guid, member_index: u32) -> Result<DeviceInterfaceData, u32> {
        self.count_call();
        self.list_members(list)?;
        let fake_device = self.device_by_inst(device.dev_inst).ok_or(ERROR_INVALID_PARAMETER)?;
        let (position, interface) = fake_device.interfaces.iter().enumerate()
            .filter(|(_, interface)| interface.class_guid == *interface_class_guid)
            .nth(member_index as usize)
            .ok_or(ERROR_NO_MORE_ITEMS)?;

        // NOTE: the reserved field encodes (dev_inst, interface position) so the detail call can find the path again
        Ok(DeviceInterfaceData {
            interface_class_guid: interface.class_guid,
            flags: 0x1, // SPINT_ACTIVE
            reserved: ((device.dev_inst as usize) << 16) | position,
        })
    }

    fn device_interface_detail(&self, list: RawDeviceInfoList, interface: &DeviceInterfaceData, buffer: &mut [u8], required_size: &mut u32) -> Result<(), u32> {
        self.count_call();
        self.list_members(list)?;
        let dev_inst = (interface.reserved >> 16) as u32;
        let position = interface.reserved & 0xffff;
        let path = &self.device_by_inst(dev_inst).ok_or(ERROR_INVALID_PARAMETER)?.interfaces[position].path;

        let chars: Vec<u16> = path.encode_utf16().chain(std::iter::once(0)).collect();
        let needed = 4 + chars.len() * 2;
        *required_size = needed as u32;
        if buffer.len() < needed {
            return Err(ERROR_INSUFFICIENT_BUFFER);
        }

        write_u32(buffer, 0, 8);
        for (index, ch) in chars.iter().enumerate() {
            buffer[4 + index * 2..6 + index * 2].copy_from_slice(&ch.to_le_bytes());
        }
        Ok(())
    }

    fn open_device_file(&self, path: &str) -> Result<RawDeviceFile, u32> {
        self.count_call();
        let key = path.to_ascii_uppercase();
        match self.volumes.get(&key) {
            None => return Err(ERROR_FILE_NOT_FOUND),
            Some(FakeVolume::OpenFails(code)) => return Err(*code),
            Some(_) => {},
        }

        let mut state = self.state.borrow_mut();
        let handle = state.next_handle;
        state.next_handle += 1;
        state.open_files.insert(handle, key);
        state.files_opened += 1;
        Ok(RawDeviceFile(handle))
    }

    fn close_device_file(&self, file: RawDeviceFile) {
        self.count_call();
        let removed = self.state.borrow_mut().open_files.remove(&file.0);
        assert!(removed.is_some(), "device file {:?} closed twice", file);
    }

    fn device_io_control(&self, file: RawDeviceFile, control_code: u32, output: &mut [u8]) -> Result<u32, u32> {
        self.count_call();
        let volume = self.volume_for_file(file)?;
        match (control_code, volume) {
            (_, FakeVolume::QueryFails(code)) => Err(code),
            (IOCTL_STORAGE_GET_DEVICE_NUMBER, FakeVolume::Partition { device_type, device_number, partition_number }) => {
                if output.len() < 12 {
                    return Err(ERROR_INSUFFICIENT_BUFFER);
                }
                write_u32(output, 0, device_type);
                write_u32(output, 4, device_number);
                write_u32(output, 8, partition_number);
                Ok(12)
            },
            (IOCTL_STORAGE_GET_DEVICE_NUMBER, FakeVolume::Dynamic { .. }) => Err(ERROR_INCORRECT_FUNCTION),
            (IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS, volume) => {
                let disks = match volume {
                    FakeVolume::Partition { device_number, .. } => vec![device_number],
                    FakeVolume::Dynamic { disks } => disks,
                    _ => unreachable!(),
                };
                // VOLUME_DISK_EXTENTS: u32 count, 4 bytes padding, then 24-byte DISK_EXTENT records
                write_u32(output, 0, disks.len() as u32);
                let needed = 8 + disks.len() * 24;
                if output.len() < needed {
                    return Err(ERROR_MORE_DATA);
                }
                for (index, disk) in disks.iter().enumerate() {
                    let offset = 8 + index * 24;
                    write_u32(output, offset, *disk);
                    write_u64(output, offset + 8, (index as u64) * 0x1000_0000);
                    write_u64(output, offset + 16, 0x1000_0000);
                }
                Ok(needed as u32)
            },
            _ => Err(ERROR_INVALID_PARAMETER),
        }
    }

    fn set_class_install_params(&self, list: RawDeviceInfoList, device: &DevInfoData, params: &PropChangeParams) -> Result<(), u32> {
        self.count_call();
        self.list_members(list)?;
        self.state.borrow_mut().pending_params.insert(device.dev_inst, *params);
        Ok(())
    }

    fn call_class_installer(&self, install_function: u32, list: RawDeviceInfoList, device: &DevInfoData) -> Result<(), u32> {
        self.count_call();
        self.list_members(list)?;
        let mut state = self.state.borrow_mut();
        let params = state.pending_params.get(&device.dev_inst).copied().ok_or(ERROR_INVALID_PARAMETER)?;
        state.state_changes.push(StateChangeRecord {
            list,
            dev_inst: device.dev_inst,
            install_function,
            state: params.state_change,
            scope: params.scope,
        });
        match self.state_change_failures.get(&device.dev_inst) {
            Some(code) => Err(*code),
            None => Ok(()),
        }
    }
}
