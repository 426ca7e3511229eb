//! `armada-types` – shared vocabulary for every Armada crate.
//!
//! Everything that crosses a crate boundary or the wire between two
//! coordinators lives here: resource identifiers, poses, the operation
//! request/response envelope, config-sync messages and the [`FleetError`]
//! taxonomy.

pub mod error;
pub mod geometry;
pub mod resource;
pub mod service;
pub mod sync;

pub use error::{FleetError, FleetResultExt};
pub use geometry::{Point, Pose, PoseStamped, Quaternion};
pub use resource::{LaunchSpec, ResourceId, ResourceStatus};
pub use service::{
    LoadResponse, PeerFrame, PlanTarget, ServiceReply, ServiceRequest, ServiceResponse,
};
pub use sync::{SyncAction, SyncMessage};
