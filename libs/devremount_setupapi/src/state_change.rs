// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

use crate::platform::{DevicePlatform, PropChangeParams};
use crate::{ClassInstallScope, ClassInstallState, DeviceEntry, RemountError, Result};

/// Asks the class installer to move `device` to `state`.
///
/// Installs an SP_PROPCHANGE_PARAMS block on the device, then invokes the class installer with `install_function`
/// (normally `DIF_PROPERTYCHANGE`). This is a single attempt: nothing is retried, and a disable followed by an enable
/// is two independent calls.
pub fn change_state<P: DevicePlatform>(device: &DeviceEntry<'_, P>, state: ClassInstallState, scope: ClassInstallScope, install_function: u32) -> Result<()> {
    let list = device.list();
    let raw = list.raw()?;
    let platform = list.platform();

    let params = PropChangeParams {
        install_function,
        state_change: state,
        scope,
        hw_profile: 0,
    };

    platform.set_class_install_params(raw, device.data(), &params)
        .map_err(|code| RemountError::StateChangeFailed { step: state, code })?;
    platform.call_class_installer(install_function, raw, device.data())
        .map_err(|code| RemountError::StateChangeFailed { step: state, code })?;

    log::debug!("device {} ({}): {:?} ({:?}) applied", device.instance(), device.device_id(), state, scope);
    Ok(())
}
