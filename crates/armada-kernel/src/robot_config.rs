//! [`RobotConfig`] and the robot description document format.
//!
//! A description document is YAML with a top-level `Robots` sequence:
//!
//! ```yaml
//! Robots:
//!   - name: arm1
//!     reliability: 0.9
//!     urdf:
//!       package_name: arm_description
//!       executable: urdf/arm.urdf
//!     manipulation:
//!       controller:
//!         package_name: arm_moveit
//!         executable: move_group.launch
//!         planning_groups: [arm, gripper_group]
//!       driver:
//!         package_name: arm_driver
//!         executable: driver.launch
//! ```
//!
//! A feature block that is present enables the feature unless it carries
//! `enabled: false`.  Entries that fail to parse are logged and skipped; the
//! rest of the document is still used.
//!
//! The parsed entry is kept verbatim so the config can be re-emitted for
//! peers exactly as it was read, with only `reliability` refreshed.

use armada_types::FleetError;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::feature::{Feature, FeatureKind};

/// Top-level key of a description document.
pub const ROBOTS_KEY: &str = "Robots";

// ────────────────────────────────────────────────────────────────────────────
// Reliability
// ────────────────────────────────────────────────────────────────────────────

/// A robot's reliability score in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Reliability(f64);

impl Reliability {
    pub const DEFAULT: f64 = 0.8;
    /// Fraction of the distance to the target covered by one adjustment.
    pub const SMOOTHING: f64 = 0.5;

    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(Self::DEFAULT);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Move the score toward `target`.
    pub fn adjust(&mut self, target: f64) {
        let target = target.clamp(0.0, 1.0);
        self.0 = (self.0 + Self::SMOOTHING * (target - self.0)).clamp(0.0, 1.0);
    }
}

impl Default for Reliability {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Document shape
// ────────────────────────────────────────────────────────────────────────────

fn enabled_by_default() -> bool {
    true
}

#[derive(Deserialize)]
struct EntryDoc {
    #[serde(alias = "robot_name")]
    name: String,
    reliability: Option<f64>,
    urdf: Option<UrdfBlock>,
    manipulation: Option<StagedBlock>,
    navigation: Option<StagedBlock>,
    gripper: Option<StagedBlock>,
}

#[derive(Deserialize)]
struct UrdfBlock {
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    package_name: String,
    executable: String,
}

#[derive(Deserialize)]
struct StagedBlock {
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    controller: ProcessBlock,
    driver: Option<ProcessBlock>,
}

#[derive(Deserialize)]
struct ProcessBlock {
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    package_name: String,
    executable: String,
    #[serde(default)]
    args: String,
    #[serde(default)]
    planning_groups: Vec<String>,
    global_planner: Option<String>,
    local_planner: Option<String>,
}

impl StagedBlock {
    fn into_feature(self, kind: FeatureKind) -> Feature {
        let mut feature = Feature::disabled(kind);
        feature.enabled = self.enabled;
        feature.package_name = self.controller.package_name;
        feature.executable = self.controller.executable;
        feature.args = self.controller.args;
        if let Some(driver) = self.driver {
            feature.driver_enabled = driver.enabled;
            feature.driver_package_name = driver.package_name;
            feature.driver_executable = driver.executable;
            feature.driver_args = driver.args;
        }
        feature.active_planning_group = self.controller.planning_groups.first().cloned();
        feature.planning_groups = self.controller.planning_groups;
        feature.global_planner = self.controller.global_planner;
        feature.local_planner = self.controller.local_planner;
        feature
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RobotConfig
// ────────────────────────────────────────────────────────────────────────────

/// Description of one robot and where it is owned.
///
/// Two configs are equal when they share name and owning namespace.
#[derive(Debug, Clone)]
pub struct RobotConfig {
    name: String,
    owning_namespace: String,
    reliability: Reliability,
    urdf: Feature,
    manipulation: Feature,
    navigation: Feature,
    gripper: Feature,
    raw: Mapping,
}

impl PartialEq for RobotConfig {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.owning_namespace == other.owning_namespace
    }
}

impl RobotConfig {
    /// Parse one `Robots` entry owned by `owning_namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Configuration`] when the entry is not a mapping
    /// or misses a required key.
    pub fn from_entry(entry: &Value, owning_namespace: &str) -> Result<Self, FleetError> {
        let raw = entry
            .as_mapping()
            .cloned()
            .ok_or_else(|| FleetError::Configuration("robot entry is not a mapping".into()))?;
        let doc: EntryDoc = serde_yaml::from_value(entry.clone())
            .map_err(|e| FleetError::Configuration(format!("invalid robot entry: {e}")))?;
        if doc.name.trim().is_empty() {
            return Err(FleetError::Configuration("robot entry has an empty name".into()));
        }

        let urdf = match doc.urdf {
            Some(block) => Feature {
                enabled: block.enabled,
                package_name: block.package_name,
                executable: block.executable,
                ..Feature::disabled(FeatureKind::Urdf)
            },
            None => Feature::disabled(FeatureKind::Urdf),
        };
        let staged = |block: Option<StagedBlock>, kind| match block {
            Some(block) => block.into_feature(kind),
            None => Feature::disabled(kind),
        };

        Ok(Self {
            name: doc.name,
            owning_namespace: owning_namespace.to_string(),
            reliability: doc.reliability.map(Reliability::new).unwrap_or_default(),
            urdf,
            manipulation: staged(doc.manipulation, FeatureKind::Manipulation),
            navigation: staged(doc.navigation, FeatureKind::Navigation),
            gripper: staged(doc.gripper, FeatureKind::Gripper),
            raw,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owning_namespace(&self) -> &str {
        &self.owning_namespace
    }

    /// Re-home the config, e.g. when a peer advertises it.
    pub fn set_owning_namespace(&mut self, namespace: impl Into<String>) {
        self.owning_namespace = namespace.into();
    }

    /// `/{owning_namespace}/robot_manager/robots/{name}`
    pub fn abs_robot_namespace(&self) -> String {
        format!(
            "/{}/robot_manager/robots/{}",
            self.owning_namespace.trim_matches('/'),
            self.name
        )
    }

    pub fn reliability(&self) -> f64 {
        self.reliability.value()
    }

    pub fn adjust_reliability(&mut self, target: f64) {
        self.reliability.adjust(target);
    }

    pub fn feature(&self, kind: FeatureKind) -> &Feature {
        match kind {
            FeatureKind::Urdf => &self.urdf,
            FeatureKind::Manipulation => &self.manipulation,
            FeatureKind::Navigation => &self.navigation,
            FeatureKind::Gripper => &self.gripper,
        }
    }

    pub fn feature_mut(&mut self, kind: FeatureKind) -> &mut Feature {
        match kind {
            FeatureKind::Urdf => &mut self.urdf,
            FeatureKind::Manipulation => &mut self.manipulation,
            FeatureKind::Navigation => &mut self.navigation,
            FeatureKind::Gripper => &mut self.gripper,
        }
    }

    /// Features in load order.
    pub fn features(&self) -> [&Feature; 4] {
        [&self.urdf, &self.manipulation, &self.navigation, &self.gripper]
    }

    pub fn any_enabled(&self) -> bool {
        self.features().iter().any(|f| f.enabled)
    }

    pub fn active_planning_group(&self) -> Option<&str> {
        self.manipulation.active_planning_group.as_deref()
    }

    pub fn set_active_planning_group(&mut self, group: impl Into<String>) {
        self.manipulation.active_planning_group = Some(group.into());
    }

    /// The entry as read, with the current reliability.
    pub fn to_entry(&self) -> Value {
        let mut raw = self.raw.clone();
        raw.insert(
            Value::String("reliability".into()),
            Value::Number(self.reliability.value().into()),
        );
        Value::Mapping(raw)
    }

    /// A document holding only this config.
    pub fn to_document(&self) -> Result<String, FleetError> {
        serialize_document(std::slice::from_ref(self))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Documents
// ────────────────────────────────────────────────────────────────────────────

/// Parse a description document, stamping every config with
/// `owning_namespace`.
///
/// # Errors
///
/// Returns [`FleetError::Configuration`] when the text is not YAML or has no
/// `Robots` sequence.  Individual bad entries are skipped with a warning.
pub fn parse_document(text: &str, owning_namespace: &str) -> Result<Vec<RobotConfig>, FleetError> {
    let root: Value = serde_yaml::from_str(text)
        .map_err(|e| FleetError::Configuration(format!("document is not valid YAML: {e}")))?;
    let robots = root
        .get(ROBOTS_KEY)
        .and_then(Value::as_sequence)
        .ok_or_else(|| {
            FleetError::Configuration(format!("document has no '{ROBOTS_KEY}' sequence"))
        })?;

    let mut configs = Vec::with_capacity(robots.len());
    for (index, entry) in robots.iter().enumerate() {
        match RobotConfig::from_entry(entry, owning_namespace) {
            Ok(config) => configs.push(config),
            Err(e) => warn!(index, namespace = owning_namespace, error = %e, "skipping robot entry"),
        }
    }
    Ok(configs)
}

/// Emit a `Robots` document for `configs`.
pub fn serialize_document(configs: &[RobotConfig]) -> Result<String, FleetError> {
    let entries: Vec<Value> = configs.iter().map(RobotConfig::to_entry).collect();
    let mut root = Mapping::new();
    root.insert(Value::String(ROBOTS_KEY.into()), Value::Sequence(entries));
    serde_yaml::to_string(&root).map_err(|e| FleetError::Serialization(e.to_string()))
}
