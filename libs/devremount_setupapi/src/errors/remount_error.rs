// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

use crate::ClassInstallState;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RemountError>;

// NOTE: every `code` below is the unmodified Win32 (or CONFIGRET) status reported by the platform call that failed
#[derive(Error, Debug)]
pub enum RemountError {
    #[error("could not open {path} (win32 error {code})")]
    PathOpenFailed { path: String, code: u32 },

    #[error("device id query failed (configret {code})")]
    IdentityQueryFailed { code: u32 },

    #[error("control query {control_code:#010x} failed (win32 error {code})")]
    ControlQueryFailed { control_code: u32, code: u32 },

    #[error("volume spans {extents} disk extents; volumes spread across multiple physical disks are not supported")]
    MultiExtentUnsupported { extents: u32 },

    #[error("unable to resolve device class name '{name}' (win32 error {code})")]
    UnknownDeviceClass { name: String, code: u32 },

    #[error("buffer negotiation failed: platform asked for {required} units after being given {supplied}")]
    BufferNegotiationFailed { required: usize, supplied: usize },

    #[error("device interface path needs {required_chars} characters, more than the supported maximum")]
    InterfacePathTooLong { required_chars: usize },

    #[error("{step:?} state change failed (win32 error {code})")]
    StateChangeFailed { step: ClassInstallState, code: u32 },

    #[error("device information list has already been released")]
    InvalidState,

    #[error("failed to create device information list (win32 error {code})")]
    ListCreationFailed { code: u32 },

    #[error("failed to release device information list (win32 error {code})")]
    ListReleaseFailed { code: u32 },

    #[error("device enumeration failed (win32 error {code})")]
    EnumerationFailed { code: u32 },

    #[error("platform returned a malformed string")]
    StringDecodingError,

    #[error("'{token}' is neither a drive letter nor a #<instance> id")]
    InvalidTarget { token: String },

    #[error("Failed to access drive {drive}")]
    DriveAccessFailed {
        drive: String,
        #[source]
        source: Box<RemountError>,
    },
}
