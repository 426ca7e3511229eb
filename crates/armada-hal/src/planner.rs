//! Motion-planning seam: one [`PlanningSession`] per planning group.
//!
//! The planning engine itself is external.  A robot opens a session per
//! configured group once its manipulation controller is ready, then plans and
//! executes through those sessions.

use std::time::Duration;

use armada_types::{FleetError, PlanTarget, Pose};
use async_trait::async_trait;

/// Fixed planner settings applied to every session a robot opens.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub planner_id: String,
    pub planning_attempts: u32,
    pub planning_time: Duration,
    pub goal_position_tolerance: f64,
    pub goal_orientation_tolerance: f64,
    pub goal_joint_tolerance: f64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            planner_id: "RRTConnectkConfigDefault".to_string(),
            planning_attempts: 2,
            planning_time: Duration::from_secs(5),
            goal_position_tolerance: 0.001,
            goal_orientation_tolerance: 0.001,
            goal_joint_tolerance: 0.001,
        }
    }
}

/// Opaque reference to a computed plan, valid for the session that made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanHandle {
    pub id: u64,
    pub group: String,
}

#[async_trait]
pub trait MotionPlanner: Send + Sync {
    /// Open a session for `group`, planning in `namespace` (the robot's
    /// absolute namespace).
    async fn open_session(
        &self,
        namespace: &str,
        group: &str,
        options: &SessionOptions,
    ) -> Result<Box<dyn PlanningSession>, FleetError>;
}

#[async_trait]
pub trait PlanningSession: Send + Sync {
    fn group(&self) -> &str;

    fn end_effector_link(&self) -> &str;

    /// Plan from the current state toward `target`.  `Ok(None)` means the
    /// planner ran but found no viable plan.
    async fn plan(&mut self, target: &PlanTarget) -> Result<Option<PlanHandle>, FleetError>;

    /// Execute `plan`. Returns whether execution succeeded.
    async fn execute(&mut self, plan: &PlanHandle) -> Result<bool, FleetError>;

    /// Current pose of the group's end effector.
    async fn current_pose(&self) -> Result<Pose, FleetError>;
}
