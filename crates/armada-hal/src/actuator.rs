//! Navigation and gripper actuator seams.
//!
//! Both are request/response style: the robot hands over a goal and waits
//! for the outcome.  Implementations own their transport (action servers,
//! services) and the bounded wait for that transport to come up.

use std::time::Duration;

use armada_types::{FleetError, Pose};
use async_trait::async_trait;

/// How long a navigation actuator waits for its action server before giving
/// up on a goal.
pub const NAVIGATION_SERVER_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationGoal {
    /// Frame the goal pose is expressed in (e.g. `"map"`).
    pub reference_frame: String,
    pub pose: Pose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    Succeeded,
    Failed,
}

#[async_trait]
pub trait NavigationActuator: Send + Sync {
    /// Drive the base whose action server lives under `action_namespace` to
    /// `goal` and wait for the result.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::ActuationFailed`] when the action server did not
    /// come up within [`NAVIGATION_SERVER_WAIT`].
    async fn navigate_to(
        &self,
        action_namespace: &str,
        goal: &NavigationGoal,
    ) -> Result<NavigationOutcome, FleetError>;
}

#[async_trait]
pub trait GripperActuator: Send + Sync {
    /// Command `gripper_name` behind `service` to `position`. Returns whether
    /// the service accepted the command.
    async fn set_position(
        &self,
        service: &str,
        gripper_name: &str,
        position: f32,
    ) -> Result<bool, FleetError>;
}
