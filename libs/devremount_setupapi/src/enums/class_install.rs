// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

// DICS_* state values carried in SP_PROPCHANGE_PARAMS.StateChange
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ClassInstallState {
    Enable = 1,
    Disable = 2,
    PropertyChange = 3,
}

// DICS_FLAG_* values carried in SP_PROPCHANGE_PARAMS.Scope
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ClassInstallScope {
    Global = 1,
    ConfigSpecific = 2,
    ConfigGeneral = 4,
}

// DIF_PROPERTYCHANGE; the only class-installer function this crate invokes
pub const DIF_PROPERTYCHANGE: u32 = 0x0000_0012;
