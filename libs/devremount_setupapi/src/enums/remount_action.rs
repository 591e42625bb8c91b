// Copyright (c) ScaleFS LLC; used with permission
// Licensed under the MIT License

use crate::{ClassInstallScope, ClassInstallState};

// one class-installer request: the DICS_* state and the DICS_FLAG_* scope it applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemountStep {
    pub state: ClassInstallState,
    pub scope: ClassInstallScope,
}

const fn step(state: ClassInstallState, scope: ClassInstallScope) -> RemountStep {
    RemountStep { state, scope }
}

static RESET_STEPS: [RemountStep; 2] = [
    step(ClassInstallState::Disable, ClassInstallScope::ConfigSpecific),
    step(ClassInstallState::Enable, ClassInstallScope::ConfigSpecific),
];
static DISABLE_STEPS: [RemountStep; 1] = [step(ClassInstallState::Disable, ClassInstallScope::ConfigSpecific)];
static ENABLE_STEPS: [RemountStep; 1] = [step(ClassInstallState::Enable, ClassInstallScope::ConfigSpecific)];
static PROPERTY_CHANGE_STEPS: [RemountStep; 2] = [
    step(ClassInstallState::PropertyChange, ClassInstallScope::Global),
    step(ClassInstallState::PropertyChange, ClassInstallScope::ConfigSpecific),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RemountAction {
    // disable, then enable; the enable is attempted even when the disable fails
    #[default]
    Reset,
    Disable,
    Enable,
    // property change broadcast globally, then for the current hardware profile
    PropertyChange,
}
impl RemountAction {
    pub fn steps(&self) -> &'static [RemountStep] {
        match self {
            RemountAction::Reset => &RESET_STEPS,
            RemountAction::Disable => &DISABLE_STEPS,
            RemountAction::Enable => &ENABLE_STEPS,
            RemountAction::PropertyChange => &PROPERTY_CHANGE_STEPS,
        }
    }
}
