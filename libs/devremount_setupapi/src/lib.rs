// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

mod buffer_negotiation;

pub mod platform;

mod enums;
pub use enums::*;

mod errors;
pub use errors::*;

mod guid;
pub use guid::{Guid, GUID_DEVINTERFACE_VOLUME};

mod device_info_list;
pub use device_info_list::{DeviceEntry, DeviceInfoList, DeviceIter};

mod device_interface;
pub use device_interface::{DeviceInterface, DeviceInterfaceIter, MAX_INTERFACE_PATH_CHARS};

mod device_number;
pub use device_number::{resolve_device_identity, DeviceIdentity};

mod state_change;
pub use state_change::change_state;

mod selection;
pub use selection::{Selection, Target};

mod remount_engine;
pub use remount_engine::{DeviceOutcome, EngineConfig, RemountEngine, RemountReport, StepOutcome};

#[cfg(target_os = "windows")]
mod win32_platform;
#[cfg(target_os = "windows")]
pub use win32_platform::Win32Platform;

#[cfg(test)]
mod fake_platform;
