// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

use enumflags2::{bitflags, BitFlags};

// DIGCF_* flags accepted by SetupDiGetClassDevsExW
#[bitflags]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GetClassFlag {
    // only valid together with DeviceInterface
    Default = 0x0000_0001,
    Present = 0x0000_0002,
    AllClasses = 0x0000_0004,
    Profile = 0x0000_0008,
    DeviceInterface = 0x0000_0010,
}

pub type GetClassFlags = BitFlags<GetClassFlag>;
