// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

mod remount_error;
pub use remount_error::*;
