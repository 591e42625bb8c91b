// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

use crate::platform::DevicePlatform;
use crate::{resolve_device_identity, DeviceIdentity, RemountError, Result};
use std::collections::HashMap;
use std::str::FromStr;

/// A volume named on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    // uppercase drive letter
    Drive(char),
    // devnode handle, written `#<instance>`
    Instance(u32),
}

impl Target {
    pub fn label(&self) -> String {
        match self {
            Target::Drive(letter) => format!("{}:", letter),
            Target::Instance(dev_inst) => format!("#{}", dev_inst),
        }
    }

    /// The `\\.\X:` path a drive target is opened through.
    pub fn device_path(&self) -> Option<String> {
        match self {
            Target::Drive(letter) => Some(format!(r"\\.\{}:", letter)),
            Target::Instance(_) => None,
        }
    }
}

impl FromStr for Target {
    type Err = RemountError;

    fn from_str(token: &str) -> Result<Self> {
        let invalid = || RemountError::InvalidTarget { token: token.to_string() };

        if let Some(digits) = token.strip_prefix('#') {
            if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
                return Err(invalid());
            }
            return digits.parse::<u32>().map(Target::Instance).map_err(|_| invalid());
        }

        let mut chars = token.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(letter), None, None) | (Some(letter), Some(':'), None) if letter.is_ascii_alphabetic() => {
                Ok(Target::Drive(letter.to_ascii_uppercase()))
            },
            _ => Err(invalid()),
        }
    }
}

/// What the caller asked to act on: storage identities (resolved from drive letters) and raw devnode handles, each
/// mapped to the label reported back. Matching removes an entry, so each one is acted on at most once.
#[derive(Debug, Default)]
pub struct Selection {
    identities: HashMap<DeviceIdentity, String>,
    instances: HashMap<u32, String>,
}

impl Selection {
    pub fn new() -> Self {
        Selection::default()
    }

    /// Resolves every drive target now; the first drive that cannot be resolved aborts the whole build.
    pub fn build<P: DevicePlatform>(platform: &P, targets: &[Target]) -> Result<Self> {
        let mut selection = Selection::new();

        for target in targets {
            match target {
                Target::Drive(_) => {
                    let path = target.device_path().unwrap_or_default();
                    let identity = resolve_device_identity(platform, &path).map_err(|source| RemountError::DriveAccessFailed {
                        drive: target.label(),
                        source: Box::new(source),
                    })?;
                    log::debug!("{} resolves to {}", target.label(), identity);
                    selection.insert_identity(identity, target.label());
                },
                Target::Instance(dev_inst) => {
                    selection.insert_instance(*dev_inst, target.label());
                },
            }
        }

        Ok(selection)
    }

    /// Returns false (keeping the existing label) when the identity was already selected.
    pub fn insert_identity(&mut self, identity: DeviceIdentity, label: String) -> bool {
        if let Some(existing) = self.identities.get(&identity) {
            log::warn!("{} refers to the same volume as {}; ignoring it", label, existing);
            return false;
        }
        self.identities.insert(identity, label);
        true
    }

    /// Returns false (keeping the existing label) when the instance was already selected.
    pub fn insert_instance(&mut self, dev_inst: u32, label: String) -> bool {
        if self.instances.contains_key(&dev_inst) {
            log::warn!("{} was requested more than once; ignoring the repeat", label);
            return false;
        }
        self.instances.insert(dev_inst, label);
        true
    }

    pub fn take_identity(&mut self, identity: &DeviceIdentity) -> Option<String> {
        self.identities.remove(identity)
    }

    pub fn take_instance(&mut self, dev_inst: u32) -> Option<String> {
        self.instances.remove(&dev_inst)
    }

    pub fn has_identities(&self) -> bool {
        !self.identities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.identities.len() + self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels still waiting for a match, sorted.
    pub fn remaining_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.identities.values().chain(self.instances.values()).cloned().collect();
        labels.sort();
        labels
    }
}
