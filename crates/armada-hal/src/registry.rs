//! [`Collaborators`] – the bundle of external-collaborator handles a
//! coordinator is wired with.
//!
//! Every robot a coordinator loads shares the same launcher, graph, planner
//! and actuators.  Handles are reference counted so the bundle can be cloned
//! into each [`Robot`](../../armada_kernel/robot/index.html) cheaply.

use std::sync::Arc;

use crate::actuator::{GripperActuator, NavigationActuator};
use crate::graph::SystemGraph;
use crate::launcher::Launcher;
use crate::planner::MotionPlanner;

#[derive(Clone)]
pub struct Collaborators {
    pub launcher: Arc<dyn Launcher>,
    pub graph: Arc<dyn SystemGraph>,
    pub planner: Arc<dyn MotionPlanner>,
    pub navigation: Arc<dyn NavigationActuator>,
    pub gripper: Arc<dyn GripperActuator>,
}

impl Collaborators {
    /// Wire every seam to the same backend, e.g. a [`SimWorld`](crate::sim::SimWorld).
    pub fn uniform<B>(backend: Arc<B>) -> Self
    where
        B: Launcher + SystemGraph + MotionPlanner + NavigationActuator + GripperActuator + 'static,
    {
        Self {
            launcher: backend.clone(),
            graph: backend.clone(),
            planner: backend.clone(),
            navigation: backend.clone(),
            gripper: backend,
        }
    }

    /// Replace the launcher, keeping every other handle.
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
