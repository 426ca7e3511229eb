//! [`Feature`] – one capability of a robot (description, manipulation,
//! navigation, gripper) and the processes that provide it.
//!
//! A feature is provided by up to two processes: an optional *driver* that
//! talks to the hardware, and a *controller* that builds on the driver.
//! The driver is always brought up first and torn down last.

use std::fmt;

use armada_types::{LaunchSpec, ResourceId};

/// Package and executable of the built-in loader that publishes a robot
/// description file as a parameter.
pub const URDF_LOADER_PACKAGE: &str = "robot_manager";
pub const URDF_LOADER_EXECUTABLE: &str = "urdf_loader.py";

// ────────────────────────────────────────────────────────────────────────────
// Kind / stage
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    Urdf,
    Manipulation,
    Navigation,
    Gripper,
}

impl FeatureKind {
    /// The order features are loaded in.
    pub const LOAD_ORDER: [FeatureKind; 4] = [
        FeatureKind::Urdf,
        FeatureKind::Manipulation,
        FeatureKind::Navigation,
        FeatureKind::Gripper,
    ];

    /// Key of the feature's block in a robot description document.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Urdf => "urdf",
            FeatureKind::Manipulation => "manipulation",
            FeatureKind::Navigation => "navigation",
            FeatureKind::Gripper => "gripper",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of a feature's two processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Driver,
    Controller,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Driver => f.write_str("driver"),
            Stage::Controller => f.write_str("controller"),
        }
    }
}

/// Derived lifecycle state of a [`Feature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureState {
    Disabled,
    NotLoaded,
    DriverLoading,
    DriverLoaded,
    ControllerLoading,
    Loaded,
}

// ────────────────────────────────────────────────────────────────────────────
// Feature
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub kind: FeatureKind,
    pub enabled: bool,
    pub driver_enabled: bool,

    pub package_name: String,
    pub executable: String,
    pub args: String,
    pub driver_package_name: String,
    pub driver_executable: String,
    pub driver_args: String,

    pub resource_id: Option<ResourceId>,
    pub driver_resource_id: Option<ResourceId>,
    pub loaded: bool,
    pub driver_loaded: bool,

    /// Manipulation only.
    pub planning_groups: Vec<String>,
    /// Manipulation only; the group used when a request names none.
    pub active_planning_group: Option<String>,
    /// Navigation only.
    pub global_planner: Option<String>,
    /// Navigation only.
    pub local_planner: Option<String>,
}

impl Feature {
    /// A disabled feature with nothing configured.
    pub fn disabled(kind: FeatureKind) -> Self {
        Self {
            kind,
            enabled: false,
            driver_enabled: false,
            package_name: String::new(),
            executable: String::new(),
            args: String::new(),
            driver_package_name: String::new(),
            driver_executable: String::new(),
            driver_args: String::new(),
            resource_id: None,
            driver_resource_id: None,
            loaded: false,
            driver_loaded: false,
            planning_groups: Vec::new(),
            active_planning_group: None,
            global_planner: None,
            local_planner: None,
        }
    }

    pub fn state(&self) -> FeatureState {
        if !self.enabled {
            return FeatureState::Disabled;
        }
        if self.loaded {
            return FeatureState::Loaded;
        }
        if self.resource_id.is_some() {
            return FeatureState::ControllerLoading;
        }
        if self.driver_enabled {
            if self.driver_loaded {
                return FeatureState::DriverLoaded;
            }
            if self.driver_resource_id.is_some() {
                return FeatureState::DriverLoading;
            }
        }
        FeatureState::NotLoaded
    }

    /// Stages this feature runs, in load order.
    pub fn stages(&self) -> Vec<Stage> {
        if !self.enabled {
            return Vec::new();
        }
        if self.driver_enabled {
            vec![Stage::Driver, Stage::Controller]
        } else {
            vec![Stage::Controller]
        }
    }

    pub fn is_stage_loaded(&self, stage: Stage) -> bool {
        match stage {
            Stage::Driver => self.driver_loaded,
            Stage::Controller => self.loaded,
        }
    }

    pub fn slot(&self, stage: Stage) -> Option<ResourceId> {
        match stage {
            Stage::Driver => self.driver_resource_id,
            Stage::Controller => self.resource_id,
        }
    }

    /// Which stage `id` backs, if any.
    pub fn stage_of(&self, id: ResourceId) -> Option<Stage> {
        if self.driver_resource_id == Some(id) {
            Some(Stage::Driver)
        } else if self.resource_id == Some(id) {
            Some(Stage::Controller)
        } else {
            None
        }
    }

    /// Record that `id` was requested for `stage` (not yet ready).
    pub fn assign(&mut self, stage: Stage, id: ResourceId) {
        match stage {
            Stage::Driver => self.driver_resource_id = Some(id),
            Stage::Controller => self.resource_id = Some(id),
        }
    }

    pub fn mark_loaded(&mut self, stage: Stage) {
        match stage {
            Stage::Driver => self.driver_loaded = true,
            Stage::Controller => self.loaded = true,
        }
    }

    /// Forget the resource of `stage`, returning it.
    pub fn clear(&mut self, stage: Stage) -> Option<ResourceId> {
        match stage {
            Stage::Driver => {
                self.driver_loaded = false;
                self.driver_resource_id.take()
            }
            Stage::Controller => {
                self.loaded = false;
                self.resource_id.take()
            }
        }
    }

    /// How to launch `stage` inside `namespace`.
    ///
    /// The description feature's controller is the built-in loader, handed
    /// the description path as its argument.
    pub fn launch_spec(&self, stage: Stage, namespace: &str) -> LaunchSpec {
        match (stage, self.kind) {
            (Stage::Controller, FeatureKind::Urdf) => LaunchSpec::new(
                URDF_LOADER_PACKAGE,
                URDF_LOADER_EXECUTABLE,
                format!("{}/{}", self.package_name, self.executable),
                namespace,
            ),
            (Stage::Controller, _) => {
                LaunchSpec::new(&self.package_name, &self.executable, &self.args, namespace)
            }
            (Stage::Driver, _) => LaunchSpec::new(
                &self.driver_package_name,
                &self.driver_executable,
                &self.driver_args,
                namespace,
            ),
        }
    }
}
