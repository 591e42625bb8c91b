// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

use windows::Win32::Foundation::{GetLastError, WIN32_ERROR};

// NOTE: must be called immediately after the failing Win32 call; any intervening call may overwrite the thread's last-error value
pub fn get_last_error_as_win32_error() -> WIN32_ERROR {
    unsafe { GetLastError() }
}

pub fn get_last_error_code() -> u32 {
    get_last_error_as_win32_error().0
}
