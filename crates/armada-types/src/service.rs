//! Operation requests and responses, mirrored locally and on the forwarding
//! path between coordinators.
//!
//! A coordinator that receives a [`ServiceRequest`] for a robot it does not
//! own forwards the request unmodified inside a [`PeerFrame::Request`] and
//! relays the [`ServiceReply`] it gets back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FleetError;
use crate::geometry::{Pose, PoseStamped};
use crate::sync::SyncMessage;

/// What a manipulation plan should aim for.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PlanTarget {
    /// Let the planning session pick its default target.
    #[default]
    Default,
    /// A Cartesian goal pose for the group's end effector.
    Pose(PoseStamped),
    /// A named configuration stored with the planning group (e.g. `"home"`).
    Named(String),
}

/// Every operation a coordinator serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ServiceRequest {
    Load {
        robot_name: String,
    },
    Unload {
        robot_name: String,
    },
    PlanManipulation {
        robot_name: String,
        /// Empty selects the robot's active planning group.
        planning_group: String,
        target: PlanTarget,
    },
    ExecutePlan {
        robot_name: String,
    },
    GetVizInfo {
        robot_name: String,
    },
    GetManipulationTarget {
        robot_name: String,
    },
    NavigationGoal {
        robot_name: String,
        reference_frame: String,
        target_pose: PoseStamped,
    },
    GripperControl {
        robot_name: String,
        position: f32,
    },
    GetConfig {
        robot_name: String,
    },
}

impl ServiceRequest {
    /// The robot the request addresses.
    pub fn robot_name(&self) -> &str {
        match self {
            ServiceRequest::Load { robot_name }
            | ServiceRequest::Unload { robot_name }
            | ServiceRequest::PlanManipulation { robot_name, .. }
            | ServiceRequest::ExecutePlan { robot_name }
            | ServiceRequest::GetVizInfo { robot_name }
            | ServiceRequest::GetManipulationTarget { robot_name }
            | ServiceRequest::NavigationGoal { robot_name, .. }
            | ServiceRequest::GripperControl { robot_name, .. }
            | ServiceRequest::GetConfig { robot_name } => robot_name,
        }
    }

    /// Stable endpoint name, used in logs and peer frames.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ServiceRequest::Load { .. } => "load",
            ServiceRequest::Unload { .. } => "unload",
            ServiceRequest::PlanManipulation { .. } => "plan_manipulation",
            ServiceRequest::ExecutePlan { .. } => "execute_plan",
            ServiceRequest::GetVizInfo { .. } => "get_viz_info",
            ServiceRequest::GetManipulationTarget { .. } => "get_manipulation_target",
            ServiceRequest::NavigationGoal { .. } => "navigation_goal",
            ServiceRequest::GripperControl { .. } => "gripper_control",
            ServiceRequest::GetConfig { .. } => "get_config",
        }
    }
}

/// Handle describing a loaded robot instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResponse {
    pub handle: Uuid,
    pub robot_name: String,
    pub owning_namespace: String,
    pub loaded_at: DateTime<Utc>,
}

/// Successful outcome of a [`ServiceRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceResponse {
    Loaded(LoadResponse),
    /// The operation completed and carries no payload.
    Done,
    VizInfo {
        info: String,
    },
    Target {
        pose: Pose,
    },
    Config {
        robot_config: String,
        robot_absolute_namespace: String,
    },
}

/// Wire form of `Result<ServiceResponse, FleetError>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "body", rename_all = "snake_case")]
pub enum ServiceReply {
    Success(ServiceResponse),
    Failure(FleetError),
}

impl ServiceReply {
    pub fn into_result(self) -> Result<ServiceResponse, FleetError> {
        match self {
            ServiceReply::Success(response) => Ok(response),
            ServiceReply::Failure(error) => Err(error),
        }
    }
}

impl From<Result<ServiceResponse, FleetError>> for ServiceReply {
    fn from(result: Result<ServiceResponse, FleetError>) -> Self {
        match result {
            Ok(response) => ServiceReply::Success(response),
            Err(error) => ServiceReply::Failure(error),
        }
    }
}

/// One text frame exchanged between two coordinators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum PeerFrame {
    Request { id: Uuid, request: ServiceRequest },
    Reply { id: Uuid, reply: ServiceReply },
    Sync { message: SyncMessage },
}
