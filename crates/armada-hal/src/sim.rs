//! In-process simulation of every external collaborator, for tests and for
//! running a coordinator without a robot middleware installed.
//!
//! [`SimWorld`] implements [`Launcher`], [`SystemGraph`], [`MotionPlanner`],
//! [`NavigationActuator`] and [`GripperActuator`] on top of one shared state.
//! Launched processes "publish" readiness signals according to per-executable
//! ready rules, so the full load sequence of a robot can be exercised in a
//! headless test.
//!
//! # Example
//!
//! ```rust
//! use armada_hal::graph::Signal;
//! use armada_hal::sim::SimWorld;
//!
//! let world = SimWorld::builder()
//!     .ready_on("arm_driver", Signal::Topic("joint_states".into()))
//!     .with_named_target("home", armada_types::Pose::from_position(0.3, 0.0, 0.5))
//!     .build();
//! assert!(world.running().is_empty());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use armada_types::{FleetError, LaunchSpec, PlanTarget, Pose, ResourceId, ResourceStatus};
use async_trait::async_trait;
use tracing::debug;

use crate::actuator::{GripperActuator, NavigationActuator, NavigationGoal, NavigationOutcome};
use crate::graph::{Signal, SystemGraph};
use crate::launcher::{Launcher, StatusEvent, StatusFeed, StatusReceiver, StatusSender};
use crate::planner::{MotionPlanner, PlanHandle, PlanningSession, SessionOptions};

// ────────────────────────────────────────────────────────────────────────────
// Journal
// ────────────────────────────────────────────────────────────────────────────

/// Everything the simulation was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    Launched { id: ResourceId, spec: LaunchSpec },
    Released { id: ResourceId },
    ParamsDeleted { prefix: String },
    SessionOpened { namespace: String, group: String },
    Navigated { action_namespace: String, goal: NavigationGoal },
    GripperCommanded { service: String, gripper_name: String, position: f32 },
}

// ────────────────────────────────────────────────────────────────────────────
// Shared state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct SimState {
    next_id: u64,
    next_plan: u64,
    running: HashMap<ResourceId, LaunchSpec>,
    published: HashMap<ResourceId, Vec<Signal>>,
    available: HashSet<Signal>,
    journal: Vec<SimEvent>,
    current_pose: Pose,
    planned: HashMap<u64, Pose>,

    // behaviour knobs, fixed at build time unless a test flips them
    permissive: bool,
    ready_rules: HashMap<String, Vec<Signal>>,
    refused: HashSet<String>,
    broken_groups: HashSet<String>,
    named_targets: HashMap<String, Pose>,
    fail_execution: bool,
    reject_navigation: bool,
    reject_gripper: bool,
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// SimWorld
// ────────────────────────────────────────────────────────────────────────────

pub struct SimWorld {
    state: Arc<Mutex<SimState>>,
    status_tx: StatusSender,
    status_rx: Mutex<Option<StatusReceiver>>,
}

impl SimWorld {
    pub fn builder() -> SimWorldBuilder {
        SimWorldBuilder::default()
    }

    /// A world where every readiness signal is always available and every
    /// request succeeds.
    pub fn permissive() -> Self {
        Self::builder().permissive().build()
    }

    /// The receiving half of the status feed. Returns `None` after the first
    /// call.
    pub fn take_status_feed(&self) -> Option<StatusReceiver> {
        self.status_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Simulate the crash of a running resource: its signals disappear and a
    /// `Failed` status event is emitted.
    pub fn fail(&self, id: ResourceId) {
        {
            let mut state = lock(&self.state);
            if let Some(signals) = state.published.remove(&id) {
                for signal in signals {
                    state.available.remove(&signal);
                }
            }
        }
        let _ = self.status_tx.send(StatusEvent {
            resource_id: id,
            status: ResourceStatus::Failed,
        });
    }

    /// Make `signal` available regardless of any launched process.
    pub fn publish(&self, signal: Signal) {
        lock(&self.state).available.insert(signal);
    }

    pub fn set_fail_execution(&self, fail: bool) {
        lock(&self.state).fail_execution = fail;
    }

    pub fn set_reject_navigation(&self, reject: bool) {
        lock(&self.state).reject_navigation = reject;
    }

    /// Running resources, ordered by id.
    pub fn running(&self) -> Vec<(ResourceId, LaunchSpec)> {
        let state = lock(&self.state);
        let mut running: Vec<_> = state
            .running
            .iter()
            .map(|(id, spec)| (*id, spec.clone()))
            .collect();
        running.sort_by_key(|(id, _)| *id);
        running
    }

    /// Id of the running resource started from `executable`, if any.
    pub fn resource_for(&self, executable: &str) -> Option<ResourceId> {
        self.running()
            .into_iter()
            .find(|(_, spec)| spec.executable == executable)
            .map(|(id, _)| id)
    }

    pub fn journal(&self) -> Vec<SimEvent> {
        lock(&self.state).journal.clone()
    }

    /// Executables in the order they were launched.
    pub fn launch_order(&self) -> Vec<String> {
        lock(&self.state)
            .journal
            .iter()
            .filter_map(|event| match event {
                SimEvent::Launched { spec, .. } => Some(spec.executable.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn released(&self) -> Vec<ResourceId> {
        lock(&self.state)
            .journal
            .iter()
            .filter_map(|event| match event {
                SimEvent::Released { id } => Some(*id),
                _ => None,
            })
            .collect()
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::builder().build()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

/// Builder for a [`SimWorld`].
///
/// Call the `with_*` / rule methods for the behaviour a test needs, then
/// [`build`][Self::build].
#[derive(Default)]
pub struct SimWorldBuilder {
    state: SimState,
}

impl SimWorldBuilder {
    /// Every signal is reported available.
    pub fn permissive(mut self) -> Self {
        self.state.permissive = true;
        self
    }

    /// When a process running `executable` is launched, `signal` (relative to
    /// the launch namespace) becomes available.
    pub fn ready_on(mut self, executable: impl Into<String>, signal: Signal) -> Self {
        self.state
            .ready_rules
            .entry(executable.into())
            .or_default()
            .push(signal);
        self
    }

    /// Launch requests for `executable` are refused.
    pub fn refuse(mut self, executable: impl Into<String>) -> Self {
        self.state.refused.insert(executable.into());
        self
    }

    /// Opening a planning session for `group` fails.
    pub fn with_broken_group(mut self, group: impl Into<String>) -> Self {
        self.state.broken_groups.insert(group.into());
        self
    }

    pub fn with_named_target(mut self, name: impl Into<String>, pose: Pose) -> Self {
        self.state.named_targets.insert(name.into(), pose);
        self
    }

    pub fn reject_gripper(mut self) -> Self {
        self.state.reject_gripper = true;
        self
    }

    pub fn build(self) -> SimWorld {
        let feed = StatusFeed::new();
        let status_tx = feed.sender();
        SimWorld {
            state: Arc::new(Mutex::new(self.state)),
            status_tx,
            status_rx: Mutex::new(Some(feed.into_receiver())),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Collaborator impls
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl Launcher for SimWorld {
    async fn launch(&self, spec: &LaunchSpec) -> Result<ResourceId, FleetError> {
        let mut state = lock(&self.state);
        if state.refused.contains(&spec.executable) {
            return Err(FleetError::ResourceRequestFailed(format!(
                "launcher refused '{spec}'"
            )));
        }

        state.next_id += 1;
        let id = ResourceId(state.next_id);
        let signals: Vec<Signal> = state
            .ready_rules
            .get(&spec.executable)
            .map(|rules| rules.iter().map(|s| s.prefixed(&spec.namespace)).collect())
            .unwrap_or_default();
        for signal in &signals {
            state.available.insert(signal.clone());
        }
        state.published.insert(id, signals);
        state.running.insert(id, spec.clone());
        state.journal.push(SimEvent::Launched {
            id,
            spec: spec.clone(),
        });
        debug!(resource = %id, spec = %spec, "sim: launched");
        Ok(id)
    }

    async fn release(&self, id: ResourceId) -> Result<(), FleetError> {
        let mut state = lock(&self.state);
        if state.running.remove(&id).is_none() {
            return Err(FleetError::ResourceRequestFailed(format!(
                "resource {id} is not running"
            )));
        }
        if let Some(signals) = state.published.remove(&id) {
            for signal in signals {
                state.available.remove(&signal);
            }
        }
        state.journal.push(SimEvent::Released { id });
        debug!(resource = %id, "sim: released");
        Ok(())
    }
}

#[async_trait]
impl SystemGraph for SimWorld {
    async fn is_available(&self, signal: &Signal) -> bool {
        let state = lock(&self.state);
        state.permissive || state.available.contains(signal)
    }

    async fn delete_params(&self, prefix: &str) -> bool {
        let mut state = lock(&self.state);
        let before = state.available.len();
        state
            .available
            .retain(|s| !(matches!(s, Signal::Param(_)) && s.name().starts_with(prefix)));
        state.journal.push(SimEvent::ParamsDeleted {
            prefix: prefix.to_string(),
        });
        state.permissive || state.available.len() < before
    }
}

#[async_trait]
impl MotionPlanner for SimWorld {
    async fn open_session(
        &self,
        namespace: &str,
        group: &str,
        _options: &SessionOptions,
    ) -> Result<Box<dyn PlanningSession>, FleetError> {
        let mut state = lock(&self.state);
        if state.broken_groups.contains(group) {
            return Err(FleetError::PlanningFailed(format!(
                "planning group '{group}' does not exist in '{namespace}'"
            )));
        }
        state.journal.push(SimEvent::SessionOpened {
            namespace: namespace.to_string(),
            group: group.to_string(),
        });
        Ok(Box::new(SimSession {
            group: group.to_string(),
            end_effector: format!("{group}_ee_link"),
            state: Arc::clone(&self.state),
        }))
    }
}

#[async_trait]
impl NavigationActuator for SimWorld {
    async fn navigate_to(
        &self,
        action_namespace: &str,
        goal: &NavigationGoal,
    ) -> Result<NavigationOutcome, FleetError> {
        let mut state = lock(&self.state);
        state.journal.push(SimEvent::Navigated {
            action_namespace: action_namespace.to_string(),
            goal: goal.clone(),
        });
        Ok(if state.reject_navigation {
            NavigationOutcome::Failed
        } else {
            NavigationOutcome::Succeeded
        })
    }
}

#[async_trait]
impl GripperActuator for SimWorld {
    async fn set_position(
        &self,
        service: &str,
        gripper_name: &str,
        position: f32,
    ) -> Result<bool, FleetError> {
        let mut state = lock(&self.state);
        state.journal.push(SimEvent::GripperCommanded {
            service: service.to_string(),
            gripper_name: gripper_name.to_string(),
            position,
        });
        Ok(!state.reject_gripper)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Planning session
// ────────────────────────────────────────────────────────────────────────────

struct SimSession {
    group: String,
    end_effector: String,
    state: Arc<Mutex<SimState>>,
}

#[async_trait]
impl PlanningSession for SimSession {
    fn group(&self) -> &str {
        &self.group
    }

    fn end_effector_link(&self) -> &str {
        &self.end_effector
    }

    async fn plan(&mut self, target: &PlanTarget) -> Result<Option<PlanHandle>, FleetError> {
        let mut state = lock(&self.state);
        let goal = match target {
            PlanTarget::Default => state.current_pose,
            PlanTarget::Pose(stamped) => stamped.pose,
            PlanTarget::Named(name) => match state.named_targets.get(name) {
                Some(pose) => *pose,
                None => return Ok(None),
            },
        };
        state.next_plan += 1;
        let id = state.next_plan;
        state.planned.insert(id, goal);
        Ok(Some(PlanHandle {
            id,
            group: self.group.clone(),
        }))
    }

    async fn execute(&mut self, plan: &PlanHandle) -> Result<bool, FleetError> {
        let mut state = lock(&self.state);
        if state.fail_execution || plan.group != self.group {
            return Ok(false);
        }
        match state.planned.get(&plan.id).copied() {
            Some(goal) => {
                state.current_pose = goal;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn current_pose(&self) -> Result<Pose, FleetError> {
        Ok(lock(&self.state).current_pose)
    }
}
