// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

mod class_install;
pub use class_install::*;

mod get_class_flag;
pub use get_class_flag::*;

mod remount_action;
pub use remount_action::*;
