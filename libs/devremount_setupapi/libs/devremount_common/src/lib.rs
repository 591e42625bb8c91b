// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

pub mod utf16;

#[cfg(target_os = "windows")]
pub mod win32_utils;
