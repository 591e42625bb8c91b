// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

use crate::platform::DevicePlatform;
use crate::{
    resolve_device_identity, ClassInstallScope, ClassInstallState, DeviceEntry, DeviceInfoList, GetClassFlag, RemountAction,
    RemountError, Result, Selection, DIF_PROPERTYCHANGE, GUID_DEVINTERFACE_VOLUME,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub action: RemountAction,
    // None targets the local machine
    pub machine_name: Option<String>,
}

impl From<RemountAction> for EngineConfig {
    fn from(action: RemountAction) -> Self {
        EngineConfig { action, machine_name: None }
    }
}

#[derive(Debug)]
pub struct StepOutcome {
    pub state: ClassInstallState,
    pub scope: ClassInstallScope,
    pub result: Result<()>,
}

/// What happened to one matched device.
#[derive(Debug)]
pub struct DeviceOutcome {
    pub label: String,
    // further selections that turned out to name this same device
    pub aliases: Vec<String>,
    pub device_id: String,
    pub steps: Vec<StepOutcome>,
}

impl DeviceOutcome {
    pub fn succeeded(&self) -> bool {
        self.steps.iter().all(|step| step.result.is_ok())
    }
}

#[derive(Debug, Default)]
pub struct RemountReport {
    pub outcomes: Vec<DeviceOutcome>,
    // labels of selections no device matched, sorted
    pub unmatched: Vec<String>,
    // set when the scan stopped early; `outcomes` still lists every device changed before that
    pub aborted: Option<RemountError>,
}

impl RemountReport {
    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.succeeded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.succeeded_count()
    }
}

/// Maps a [`Selection`] onto the devices of one enumeration session and drives the configured state changes on
/// every device it matches.
///
/// Each device is first checked against the instance selections; only when that misses are its volume interfaces
/// resolved and checked against the identity selections. The state change is applied to the entry the scan is
/// holding. A volume whose identity cannot be resolved, or a device whose interfaces cannot be listed, is skipped;
/// a failed state change is recorded in the report and the scan moves on. Only a failure to walk the device list
/// itself stops the scan, and the report handed back still carries what was done up to that point.
pub struct RemountEngine<'p, P: DevicePlatform> {
    platform: &'p P,
    config: EngineConfig,
}

impl<'p, P: DevicePlatform> RemountEngine<'p, P> {
    pub fn new(platform: &'p P, config: EngineConfig) -> Self {
        RemountEngine { platform, config }
    }

    /// Fails only when the session cannot be opened; every later failure is recorded in the report.
    pub fn run(&self, selection: &mut Selection) -> Result<RemountReport> {
        let mut report = RemountReport::default();

        if !selection.is_empty() {
            let mut list = DeviceInfoList::open(
                self.platform,
                &[],
                GetClassFlag::Present | GetClassFlag::DeviceInterface,
                self.config.machine_name.as_deref(),
            )?;

            if let Err(error) = self.scan(&list, selection, &mut report) {
                log::error!("device scan stopped after {} matched device(s): {}", report.outcomes.len(), error);
                report.aborted = Some(error);
            }

            if let Err(error) = list.close() {
                log::warn!("{}", error);
                if report.aborted.is_none() {
                    report.aborted = Some(error);
                }
            }
        }

        report.unmatched = selection.remaining_labels();
        for label in &report.unmatched {
            log::debug!("{} did not match any present device", label);
        }
        Ok(report)
    }

    fn scan(&self, list: &DeviceInfoList<'p, P>, selection: &mut Selection, report: &mut RemountReport) -> Result<()> {
        for device in list.devices()? {
            let device = device?;
            if let Some(label) = self.match_device(&device, selection) {
                let aliases = self.take_aliases(&device, selection);
                report.outcomes.push(self.apply(&device, label, aliases));
            }
            if selection.is_empty() {
                break;
            }
        }
        Ok(())
    }

    // removes and returns the selection label this device satisfies, if any
    fn match_device(&self, device: &DeviceEntry<'_, P>, selection: &mut Selection) -> Option<String> {
        if let Some(label) = selection.take_instance(device.instance()) {
            log::info!("{} matched device {}", label, device.device_id());
            return Some(label);
        }
        if !selection.has_identities() {
            return None;
        }

        for path in self.volume_paths(device) {
            let identity = match resolve_device_identity(self.platform, &path) {
                Ok(identity) => identity,
                Err(error) => {
                    log::debug!("skipping {}: {}", path, error);
                    continue;
                },
            };
            if let Some(label) = selection.take_identity(&identity) {
                log::info!("{} matched device {} via {}", label, device.device_id(), path);
                return Some(label);
            }
        }

        None
    }

    // removes every remaining identity selection that resolves to one of this (already matched) device's volumes
    fn take_aliases(&self, device: &DeviceEntry<'_, P>, selection: &mut Selection) -> Vec<String> {
        let mut aliases = Vec::new();
        if !selection.has_identities() {
            return aliases;
        }

        for path in self.volume_paths(device) {
            if let Ok(identity) = resolve_device_identity(self.platform, &path) {
                if let Some(label) = selection.take_identity(&identity) {
                    log::info!("{} names the same device {}", label, device.device_id());
                    aliases.push(label);
                }
            }
        }
        aliases
    }

    // the device's volume interface paths; a device whose interfaces cannot be listed contributes none
    fn volume_paths(&self, device: &DeviceEntry<'_, P>) -> Vec<String> {
        let interfaces = match device.interfaces(&GUID_DEVINTERFACE_VOLUME) {
            Ok(interfaces) => interfaces,
            Err(error) => {
                log::warn!("skipping device {}: {}", device.device_id(), error);
                return Vec::new();
            },
        };

        let mut paths = Vec::new();
        for interface in interfaces {
            match interface {
                Ok(interface) => paths.push(interface.path),
                Err(error) => {
                    log::warn!("skipping the remaining volume interfaces of device {}: {}", device.device_id(), error);
                    break;
                },
            }
        }
        paths
    }

    fn apply(&self, device: &DeviceEntry<'_, P>, label: String, aliases: Vec<String>) -> DeviceOutcome {
        let steps = self.config.action.steps().iter()
            .map(|step| {
                let result = device.change_state(step.state, step.scope, DIF_PROPERTYCHANGE);
                if let Err(error) = &result {
                    log::warn!("{} ({}): {}", label, device.device_id(), error);
                }
                StepOutcome { state: step.state, scope: step.scope, result }
            })
            .collect();

        DeviceOutcome {
            label,
            aliases,
            device_id: device.device_id().to_string(),
            steps,
        }
    }
}
