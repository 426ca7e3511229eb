//! `armada-runtime` – The coordinator.
//!
//! Ties the robot lifecycle from `armada-kernel` to the plumbing from
//! `armada-middleware`: which robots exist and where, which coordinator
//! serves a request, and what happens when a launched process dies.
//!
//! # Modules
//!
//! - [`registry`] – [`ConfigRegistry`][registry::ConfigRegistry]: local and
//!   remote robot configs, plus [`find_robot`][registry::find_robot]
//!   candidate selection by reliability.
//! - [`sync`] – [`ConfigSyncer`][sync::ConfigSyncer]: the request/advertise
//!   config sync protocol on the shared bus.
//! - [`manager`] – [`RobotManager`][manager::RobotManager]: load, unload,
//!   routing and forwarding, failure-triggered reload.
//! - [`discovery`] – locating `robot_description.yaml` files.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP span export.

pub mod discovery;
pub mod manager;
pub mod registry;
pub mod sync;
pub mod telemetry;

pub use discovery::{DESCRIPTION_FILE_NAME, DescriptionFile, find_description_files};
pub use manager::{ManagerConfig, ReloadPolicy, RobotManager};
pub use registry::{ConfigRegistry, MergeSummary, find_robot};
pub use sync::ConfigSyncer;
pub use telemetry::{TracerProviderGuard, init_tracing};
