//! `armada-hal` – External collaborator seams.
//!
//! A coordinator never talks to processes, planners or actuators directly;
//! it goes through the traits in this crate.
//!
//! # Modules
//!
//! - [`launcher`] – [`Launcher`][launcher::Launcher]: starts and stops the
//!   driver/controller processes and pushes [`StatusEvent`][launcher::StatusEvent]s.
//! - [`graph`] – [`SystemGraph`][graph::SystemGraph]: readiness probing of
//!   parameters, topics and services; parameter cleanup.
//! - [`planner`] – [`MotionPlanner`][planner::MotionPlanner] and per-group
//!   [`PlanningSession`][planner::PlanningSession]s.
//! - [`actuator`] – navigation and gripper actuators.
//! - [`registry`] – [`Collaborators`][registry::Collaborators]: the bundle a
//!   robot is constructed with.
//! - [`sim`] – [`SimWorld`][sim::SimWorld]: in-process implementation of all
//!   of the above.

pub mod actuator;
pub mod graph;
pub mod launcher;
pub mod planner;
pub mod registry;
pub mod sim;

pub use actuator::{GripperActuator, NavigationActuator, NavigationGoal, NavigationOutcome};
pub use graph::{Signal, SystemGraph};
pub use launcher::{Launcher, StatusEvent, StatusFeed, StatusReceiver, StatusSender};
pub use planner::{MotionPlanner, PlanHandle, PlanningSession, SessionOptions};
pub use registry::Collaborators;
pub use sim::{SimEvent, SimWorld};
