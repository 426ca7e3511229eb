//! `armada-kernel` – Robot lifecycle.
//!
//! Everything needed to take one robot description and turn it into running,
//! supervised processes.
//!
//! # Modules
//!
//! - [`feature`] – [`Feature`][feature::Feature]: one capability, its driver
//!   and controller processes, and its derived [`FeatureState`][feature::FeatureState].
//! - [`robot_config`] – [`RobotConfig`][robot_config::RobotConfig] and the
//!   YAML description document format.
//! - [`resource_tracker`] – [`ResourceTracker`][resource_tracker::ResourceTracker]:
//!   allocated resources and their status, optionally mirrored to a catalog.
//! - [`readiness`] – readiness signals and the bounded wait for them.
//! - [`robot`] – [`Robot`][robot::Robot]: load / unload / reload and the
//!   per-robot operations (plan, execute, navigate, gripper, viz info).

pub mod feature;
pub mod readiness;
pub mod resource_tracker;
pub mod robot;
pub mod robot_config;

pub use feature::{Feature, FeatureKind, FeatureState, Stage};
pub use readiness::LifecycleTimings;
pub use resource_tracker::ResourceTracker;
pub use robot::{ReloadOutcome, Robot, RobotBackend, TeardownReport};
pub use robot_config::{Reliability, RobotConfig, parse_document, serialize_document};
