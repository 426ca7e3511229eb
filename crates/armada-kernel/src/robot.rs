//! [`Robot`] – lifecycle state machine of one loaded robot.
//!
//! A local robot brings its features up in a fixed order (description,
//! manipulation, navigation, gripper); within a feature the driver is
//! launched and awaited before the controller.  Teardown walks the same order,
//! releasing controller then driver, and keeps going past failures.
//!
//! A remote robot is a proxy: it only carries the config of a robot owned by
//! another coordinator, and every operation on it is refused locally.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn demo(config: armada_kernel::RobotConfig, backend: armada_kernel::RobotBackend)
//! # -> Result<(), armada_types::FleetError> {
//! use armada_types::PlanTarget;
//!
//! let mut robot = armada_kernel::Robot::local(config, backend);
//! robot.load().await?;
//! robot.plan_manipulation("", &PlanTarget::Named("home".into())).await?;
//! robot.execute_plan().await?;
//! let report = robot.unload().await;
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use armada_hal::{Collaborators, NavigationGoal, NavigationOutcome, PlanHandle, PlanningSession, SessionOptions};
use armada_types::{FleetError, FleetResultExt, PlanTarget, Pose, PoseStamped, ResourceId};
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

use crate::feature::{FeatureKind, Stage};
use crate::readiness::{self, LifecycleTimings};
use crate::resource_tracker::ResourceTracker;
use crate::robot_config::RobotConfig;

/// Everything a local robot needs to drive its processes.
#[derive(Clone)]
pub struct RobotBackend {
    pub collaborators: Collaborators,
    pub tracker: Arc<ResourceTracker>,
    pub timings: LifecycleTimings,
    pub session_options: SessionOptions,
}

/// Result of a best-effort teardown.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub released: Vec<ResourceId>,
    pub failures: Vec<(ResourceId, FleetError)>,
    pub params_deleted: bool,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What [`Robot::reload_resource`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The resource does not back any of this robot's stages.
    Untracked,
    /// The stage backed by the resource is not currently loaded.
    NotLoaded,
    /// The stage already used up its reload attempts.
    Exhausted,
    Reloaded,
}

pub struct Robot {
    config: RobotConfig,
    backend: Option<RobotBackend>,
    sessions: HashMap<String, Box<dyn PlanningSession>>,
    last_plan: Option<PlanHandle>,
    last_plan_valid: bool,
    reload_attempts: HashMap<(FeatureKind, Stage), u32>,
}

impl Robot {
    /// A robot this coordinator owns. Nothing is launched until
    /// [`load`](Self::load).
    pub fn local(config: RobotConfig, backend: RobotBackend) -> Self {
        Self {
            config,
            backend: Some(backend),
            sessions: HashMap::new(),
            last_plan: None,
            last_plan_valid: false,
            reload_attempts: HashMap::new(),
        }
    }

    /// A stand-in for a robot owned by another coordinator.
    pub fn proxy(config: RobotConfig) -> Self {
        Self {
            config,
            backend: None,
            sessions: HashMap::new(),
            last_plan: None,
            last_plan_valid: false,
            reload_attempts: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn is_local(&self) -> bool {
        self.backend.is_some()
    }

    pub fn planning_groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = self.sessions.keys().map(String::as_str).collect();
        groups.sort_unstable();
        groups
    }

    pub fn is_plan_valid(&self) -> bool {
        self.last_plan_valid
    }

    fn backend(&self) -> Result<&RobotBackend, FleetError> {
        self.backend.as_ref().ok_or_else(|| {
            FleetError::Configuration(format!(
                "robot '{}' is owned by '{}' and cannot be driven from here",
                self.config.name(),
                self.config.owning_namespace()
            ))
        })
    }

    // ── Loading ─────────────────────────────────────────────────────────────

    /// Bring every enabled feature up. Stages that are already loaded are
    /// skipped. On failure every stage launched so far is torn down.
    pub async fn load(&mut self) -> Result<(), FleetError> {
        self.backend()?;
        if !self.config.any_enabled() {
            return Err(FleetError::Configuration(format!(
                "robot '{}' has no enabled features; specify urdf, manipulation, navigation or gripper",
                self.config.name()
            )));
        }

        info!(robot = self.config.name(), namespace = %self.config.abs_robot_namespace(), "loading robot");
        for kind in FeatureKind::LOAD_ORDER {
            for stage in self.config.feature(kind).stages() {
                if self.config.feature(kind).is_stage_loaded(stage) {
                    continue;
                }
                if let Err(e) = self.load_stage(kind, stage).await {
                    warn!(robot = self.config.name(), feature = %kind, stage = %stage, error = %e, "load failed, tearing down");
                    let report = self.unload().await;
                    if !report.is_clean() {
                        warn!(robot = self.config.name(), failures = report.failures.len(), "teardown after failed load was incomplete");
                    }
                    return Err(e.context(format!(
                        "loading {kind} {stage} of robot '{}'",
                        self.config.name()
                    )));
                }
            }
        }
        info!(robot = self.config.name(), "robot loaded");
        Ok(())
    }

    async fn load_stage(&mut self, kind: FeatureKind, stage: Stage) -> Result<(), FleetError> {
        let backend = self.backend()?.clone();
        let namespace = self.config.abs_robot_namespace();
        let spec = self.config.feature(kind).launch_spec(stage, &namespace);

        debug!(robot = self.config.name(), feature = %kind, stage = %stage, spec = %spec, "requesting stage");
        let id = backend.tracker.allocate(&spec).await?;
        self.config.feature_mut(kind).assign(stage, id);

        let status = backend
            .tracker
            .watch(id)
            .ok_or_else(|| FleetError::ResourceRequestFailed(format!("resource {id} vanished after allocation")))?;
        let signal = readiness::readiness_signal(kind, stage).map(|s| s.prefixed(&namespace));
        readiness::wait_until_ready(backend.collaborators.graph.as_ref(), signal.as_ref(), status, &backend.timings)
            .await?;
        if readiness::settles(kind, stage) && !backend.timings.settle_delay.is_zero() {
            tokio::time::sleep(backend.timings.settle_delay).await;
        }

        backend.tracker.mark_active(id);
        self.config.feature_mut(kind).mark_loaded(stage);
        debug!(robot = self.config.name(), feature = %kind, stage = %stage, resource = %id, "stage ready");

        if kind == FeatureKind::Manipulation && stage == Stage::Controller {
            self.open_planning_sessions(&backend).await;
        }
        Ok(())
    }

    async fn open_planning_sessions(&mut self, backend: &RobotBackend) {
        let namespace = self.config.abs_robot_namespace();
        let groups = self.config.feature(FeatureKind::Manipulation).planning_groups.clone();
        for group in groups {
            match backend
                .collaborators
                .planner
                .open_session(&namespace, &group, &backend.session_options)
                .await
            {
                Ok(session) => {
                    debug!(robot = self.config.name(), group = %group, end_effector = session.end_effector_link(), "planning session opened");
                    self.sessions.insert(group, session);
                }
                Err(e) => warn!(robot = self.config.name(), group = %group, error = %e, "skipping planning group"),
            }
        }
    }

    // ── Teardown ────────────────────────────────────────────────────────────

    /// Release every launched stage (controller, then driver, per feature) and
    /// delete the robot's parameters. Never stops at the first failure.
    pub async fn unload(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        let Some(backend) = self.backend.clone() else {
            return report;
        };

        for kind in FeatureKind::LOAD_ORDER {
            for stage in [Stage::Controller, Stage::Driver] {
                self.release_stage(&backend, kind, stage, &mut report).await;
            }
        }

        let namespace = self.config.abs_robot_namespace();
        report.params_deleted = backend.collaborators.graph.delete_params(&namespace).await;
        if !report.params_deleted {
            warn!(robot = self.config.name(), namespace = %namespace, "parameters not removed");
        }
        info!(robot = self.config.name(), released = report.released.len(), failures = report.failures.len(), "robot unloaded");
        report
    }

    async fn release_stage(
        &mut self,
        backend: &RobotBackend,
        kind: FeatureKind,
        stage: Stage,
        report: &mut TeardownReport,
    ) {
        if kind == FeatureKind::Manipulation && stage == Stage::Controller {
            self.sessions.clear();
            self.last_plan = None;
            self.last_plan_valid = false;
        }
        let Some(id) = self.config.feature_mut(kind).clear(stage) else {
            return;
        };
        match backend.tracker.release(id).await {
            Ok(()) => report.released.push(id),
            Err(e) => {
                warn!(robot = self.config.name(), feature = %kind, stage = %stage, resource = %id, error = %e, "release failed");
                report.failures.push((id, e));
            }
        }
    }

    // ── Failure handling ────────────────────────────────────────────────────

    /// Whether `id` backs any of this robot's stages.
    pub fn has_resource(&self, id: ResourceId) -> bool {
        self.stage_of(id).is_some()
    }

    /// The feature and stage `id` backs, if any.
    pub fn stage_of(&self, id: ResourceId) -> Option<(FeatureKind, Stage)> {
        FeatureKind::LOAD_ORDER
            .iter()
            .find_map(|kind| self.config.feature(*kind).stage_of(id).map(|stage| (*kind, stage)))
    }

    /// Unload and re-request the stage backed by `id`, but only while that
    /// stage is marked loaded and has reloads left. A replacement that does
    /// not become ready is released again.
    pub async fn reload_resource(&mut self, id: ResourceId, max_attempts: u32) -> Result<ReloadOutcome, FleetError> {
        let backend = self.backend()?.clone();
        let Some((kind, stage)) = self.stage_of(id) else {
            return Ok(ReloadOutcome::Untracked);
        };
        if !self.config.feature(kind).is_stage_loaded(stage) {
            return Ok(ReloadOutcome::NotLoaded);
        }

        let attempts = self.reload_attempts.entry((kind, stage)).or_insert(0);
        if *attempts >= max_attempts {
            warn!(robot = self.config.name(), feature = %kind, stage = %stage, attempts = *attempts, "reload attempts exhausted");
            return Ok(ReloadOutcome::Exhausted);
        }
        *attempts += 1;
        let attempt = *attempts;

        info!(robot = self.config.name(), feature = %kind, stage = %stage, resource = %id, attempt, "reloading stage");
        let mut report = TeardownReport::default();
        self.release_stage(&backend, kind, stage, &mut report).await;
        for (failed, e) in &report.failures {
            debug!(resource = %failed, error = %e, "failed resource could not be released cleanly");
        }
        let reloaded = self.load_stage(kind, stage).await;
        if reloaded.is_err() {
            self.release_stage(&backend, kind, stage, &mut report).await;
        }
        reloaded.with_context(|| format!("reloading {kind} {stage} of robot '{}'", self.config.name()))?;
        Ok(ReloadOutcome::Reloaded)
    }

    // ── Manipulation ────────────────────────────────────────────────────────

    /// Plan toward `target` with `group` (empty: the active group). The group
    /// used becomes the active one.
    pub async fn plan_manipulation(&mut self, group: &str, target: &PlanTarget) -> Result<(), FleetError> {
        self.backend()?;
        if self.sessions.is_empty() {
            return Err(FleetError::PlanningFailed(format!(
                "robot '{}' has no planning groups",
                self.config.name()
            )));
        }
        let group = if group.is_empty() {
            self.config.active_planning_group().unwrap_or_default().to_string()
        } else {
            group.to_string()
        };
        let session = self
            .sessions
            .get_mut(&group)
            .ok_or_else(|| FleetError::NotFound(format!("planning group '{group}' was not found")))?;
        self.config.set_active_planning_group(&group);

        let planned = session.plan(target).await;
        self.last_plan_valid = false;
        self.last_plan = None;
        match planned? {
            Some(plan) => {
                debug!(robot = self.config.name(), group = %group, plan = plan.id, "plan found");
                self.last_plan = Some(plan);
                self.last_plan_valid = true;
                Ok(())
            }
            None => Err(FleetError::PlanningFailed(format!("planning with group '{group}' failed"))),
        }
    }

    /// Execute the last valid plan with the active group.
    pub async fn execute_plan(&mut self) -> Result<(), FleetError> {
        self.backend()?;
        let plan = match (&self.last_plan, self.last_plan_valid) {
            (Some(plan), true) => plan.clone(),
            _ => return Err(FleetError::PlanningFailed("no valid plan".into())),
        };
        let session = self.active_session_mut()?;
        if !session.execute(&plan).await? {
            return Err(FleetError::PlanningFailed(format!(
                "execution with group '{}' failed",
                plan.group
            )));
        }
        info!(robot = self.config.name(), group = %plan.group, "plan executed");
        Ok(())
    }

    /// Current end-effector pose of the active group.
    pub async fn manipulation_target(&mut self) -> Result<Pose, FleetError> {
        self.backend()?;
        self.active_session_mut()?.current_pose().await
    }

    fn active_session_mut(&mut self) -> Result<&mut Box<dyn PlanningSession>, FleetError> {
        let group = self.config.active_planning_group().unwrap_or_default().to_string();
        self.sessions
            .get_mut(&group)
            .ok_or_else(|| FleetError::NotFound(format!("planning group '{group}' was not found")))
    }

    // ── Navigation / gripper ────────────────────────────────────────────────

    fn require_loaded(&self, kind: FeatureKind) -> Result<(), FleetError> {
        if self.config.feature(kind).loaded {
            Ok(())
        } else {
            Err(FleetError::Configuration(format!(
                "feature '{kind}' of robot '{}' is not loaded",
                self.config.name()
            )))
        }
    }

    pub async fn navigate(&self, reference_frame: &str, target: &PoseStamped) -> Result<(), FleetError> {
        let backend = self.backend()?;
        self.require_loaded(FeatureKind::Navigation)?;
        let action_namespace = format!("{}/move_base", self.config.abs_robot_namespace());
        let goal = NavigationGoal {
            reference_frame: reference_frame.to_string(),
            pose: target.pose,
        };
        match backend.collaborators.navigation.navigate_to(&action_namespace, &goal).await? {
            NavigationOutcome::Succeeded => {
                info!(robot = self.config.name(), frame = reference_frame, "navigation succeeded");
                Ok(())
            }
            NavigationOutcome::Failed => Err(FleetError::ActuationFailed(format!(
                "robot '{}' failed to reach the navigation goal",
                self.config.name()
            ))),
        }
    }

    pub async fn control_gripper(&self, position: f32) -> Result<(), FleetError> {
        let backend = self.backend()?;
        self.require_loaded(FeatureKind::Gripper)?;
        let service = format!("{}/gripper_control", self.config.abs_robot_namespace());
        if backend
            .collaborators
            .gripper
            .set_position(&service, self.config.name(), position)
            .await?
        {
            debug!(robot = self.config.name(), position, "gripper commanded");
            Ok(())
        } else {
            Err(FleetError::ActuationFailed(format!("gripper service '{service}' rejected the command")))
        }
    }

    // ── Introspection ───────────────────────────────────────────────────────

    /// Visualisation hints as a YAML document rooted at `RViz`.
    pub fn viz_info(&self) -> Result<String, FleetError> {
        let namespace = self.config.abs_robot_namespace();
        let entry = |pairs: Vec<(&str, String)>| {
            let mut map = Mapping::new();
            for (key, value) in pairs {
                map.insert(Value::String(key.into()), Value::String(value));
            }
            Value::Mapping(map)
        };

        let mut rviz = Mapping::new();
        if self.config.feature(FeatureKind::Urdf).enabled {
            rviz.insert(
                "urdf".into(),
                entry(vec![("robot_description", format!("{namespace}/robot_description"))]),
            );
        }
        if self.config.feature(FeatureKind::Manipulation).enabled {
            rviz.insert(
                "manipulation".into(),
                entry(vec![
                    ("move_group_ns", namespace.clone()),
                    (
                        "active_planning_group",
                        self.config.active_planning_group().unwrap_or_default().to_string(),
                    ),
                ]),
            );
        }
        let navigation = self.config.feature(FeatureKind::Navigation);
        if navigation.enabled {
            rviz.insert(
                "navigation".into(),
                entry(vec![
                    ("move_base_ns", namespace.clone()),
                    ("global_planner", navigation.global_planner.clone().unwrap_or_default()),
                    ("local_planner", navigation.local_planner.clone().unwrap_or_default()),
                ]),
            );
        }
        if self.config.feature(FeatureKind::Gripper).enabled {
            rviz.insert("gripper".into(), entry(vec![("gripper_ns", namespace.clone())]));
        }

        let mut root = Mapping::new();
        root.insert("RViz".into(), Value::Mapping(rviz));
        serde_yaml::to_string(&root).map_err(|e| FleetError::Serialization(e.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot_config::parse_document;
    use armada_hal::{Signal, SimEvent, SimWorld, SystemGraph};
    use armada_types::ResourceStatus;

    const ARM: &str = r#"
Robots:
  - name: arm1
    urdf:
      package_name: arm_description
      executable: urdf/arm.urdf
    manipulation:
      controller:
        package_name: arm_moveit
        executable: move_group
        planning_groups: [arm, broken_group]
      driver:
        package_name: arm_hw
        executable: arm_driver
    navigation:
      controller:
        package_name: base_nav
        executable: move_base
        global_planner: navfn
        local_planner: dwa
      driver:
        package_name: base_hw
        executable: base_driver
    gripper:
      controller:
        package_name: grip
        executable: grip_controller
      driver:
        package_name: grip_hw
        executable: grip_driver
"#;

    fn ready_world() -> SimWorld {
        SimWorld::builder()
            .ready_on("urdf_loader.py", Signal::Param("robot_description".into()))
            .ready_on("arm_driver", Signal::Topic("joint_states".into()))
            .ready_on("move_group", Signal::Param("robot_description_semantic".into()))
            .ready_on("base_driver", Signal::Topic("odom".into()))
            .ready_on("move_base", Signal::Topic("cmd_vel".into()))
            .ready_on("grip_controller", Signal::Service("gripper_control".into()))
            .with_named_target("home", Pose::from_position(0.3, 0.0, 0.5))
            .with_broken_group("broken_group")
            .build()
    }

    fn robot_on(world: Arc<SimWorld>, doc: &str) -> (Robot, Arc<ResourceTracker>) {
        let config = parse_document(doc, "lab").unwrap().remove(0);
        let tracker = Arc::new(ResourceTracker::new(world.clone()));
        let backend = RobotBackend {
            collaborators: Collaborators::uniform(world),
            tracker: tracker.clone(),
            timings: LifecycleTimings::immediate(),
            session_options: SessionOptions::default(),
        };
        (Robot::local(config, backend), tracker)
    }

    #[tokio::test]
    async fn drivers_load_before_controllers_in_feature_order() {
        let world = Arc::new(ready_world());
        let (mut robot, tracker) = robot_on(world.clone(), ARM);
        robot.load().await.unwrap();

        assert_eq!(
            world.launch_order(),
            vec![
                "urdf_loader.py",
                "arm_driver",
                "move_group",
                "base_driver",
                "move_base",
                "grip_driver",
                "grip_controller",
            ]
        );
        assert!(tracker.snapshot().iter().all(|(_, _, s)| *s == ResourceStatus::Active));
        assert_eq!(robot.planning_groups(), vec!["arm"]);
    }

    #[tokio::test]
    async fn controller_waits_for_driver_readiness() {
        let world = Arc::new(
            SimWorld::builder()
                .ready_on("urdf_loader.py", Signal::Param("robot_description".into()))
                // arm_driver never publishes joint_states
                .ready_on("move_group", Signal::Param("robot_description_semantic".into()))
                .build(),
        );
        let (mut robot, tracker) = robot_on(world.clone(), ARM);
        let err = robot.load().await.unwrap_err();

        assert!(matches!(err.root_cause(), FleetError::ResourceRequestFailed(_)));
        let launched = world.launch_order();
        assert!(launched.contains(&"arm_driver".to_string()));
        assert!(!launched.contains(&"move_group".to_string()));
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn load_is_idempotent() {
        let world = Arc::new(ready_world());
        let (mut robot, _tracker) = robot_on(world.clone(), ARM);
        robot.load().await.unwrap();
        robot.load().await.unwrap();
        assert_eq!(world.launch_order().len(), 7);
    }

    #[tokio::test]
    async fn robot_without_features_is_rejected() {
        let world = Arc::new(SimWorld::permissive());
        let (mut robot, _tracker) = robot_on(world.clone(), "Robots:\n  - name: empty\n");
        let err = robot.load().await.unwrap_err();
        assert!(matches!(err, FleetError::Configuration(_)));
        assert!(world.launch_order().is_empty());
    }

    #[tokio::test]
    async fn failed_load_tears_down_launched_stages() {
        let world = Arc::new(
            SimWorld::builder()
                .ready_on("urdf_loader.py", Signal::Param("robot_description".into()))
                .ready_on("arm_driver", Signal::Topic("joint_states".into()))
                // move_group never publishes its semantic description
                .build(),
        );
        let (mut robot, tracker) = robot_on(world.clone(), ARM);
        let err = robot.load().await.unwrap_err();

        assert!(matches!(err.root_cause(), FleetError::ResourceRequestFailed(_)));
        assert!(world.running().is_empty());
        assert!(tracker.is_empty());
        assert_eq!(world.released().len(), 3);
    }

    #[tokio::test]
    async fn unload_releases_controller_then_driver_and_deletes_params() {
        let world = Arc::new(ready_world());
        let (mut robot, tracker) = robot_on(world.clone(), ARM);
        robot.load().await.unwrap();

        let arm_driver = world.resource_for("arm_driver").unwrap();
        let move_group = world.resource_for("move_group").unwrap();
        let report = robot.unload().await;

        assert!(report.is_clean());
        assert!(report.params_deleted);
        assert_eq!(report.released.len(), 7);
        let driver_pos = report.released.iter().position(|id| *id == arm_driver).unwrap();
        let controller_pos = report.released.iter().position(|id| *id == move_group).unwrap();
        assert!(controller_pos < driver_pos);
        assert!(tracker.is_empty());
        assert!(robot.planning_groups().is_empty());
        assert!(matches!(world.journal().last(), Some(SimEvent::ParamsDeleted { .. })));
    }

    #[tokio::test]
    async fn unload_continues_past_release_failures() {
        let world = Arc::new(ready_world());
        let (mut robot, _tracker) = robot_on(world.clone(), ARM);
        robot.load().await.unwrap();

        // Release the navigation controller behind the robot's back.
        let move_base = world.resource_for("move_base").unwrap();
        armada_hal::Launcher::release(world.as_ref(), move_base).await.unwrap();

        let report = robot.unload().await;
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, move_base);
        assert_eq!(report.released.len(), 6);
        assert!(world.running().is_empty());
    }

    #[tokio::test]
    async fn plan_and_execute_named_target() {
        let world = Arc::new(ready_world());
        let (mut robot, _tracker) = robot_on(world.clone(), ARM);
        robot.load().await.unwrap();

        robot.plan_manipulation("", &PlanTarget::Named("home".into())).await.unwrap();
        assert!(robot.is_plan_valid());
        robot.execute_plan().await.unwrap();
        assert!(robot.is_plan_valid());
        assert_eq!(
            robot.manipulation_target().await.unwrap(),
            Pose::from_position(0.3, 0.0, 0.5)
        );
    }

    #[tokio::test]
    async fn failed_plan_invalidates_previous_plan() {
        let world = Arc::new(ready_world());
        let (mut robot, _tracker) = robot_on(world.clone(), ARM);
        robot.load().await.unwrap();

        robot.plan_manipulation("arm", &PlanTarget::Default).await.unwrap();
        let err = robot
            .plan_manipulation("arm", &PlanTarget::Named("nowhere".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::PlanningFailed(_)));

        let err = robot.execute_plan().await.unwrap_err();
        assert_eq!(err, FleetError::PlanningFailed("no valid plan".into()));
    }

    #[tokio::test]
    async fn unknown_group_is_not_found() {
        let world = Arc::new(ready_world());
        let (mut robot, _tracker) = robot_on(world.clone(), ARM);
        robot.load().await.unwrap();

        let err = robot
            .plan_manipulation("broken_group", &PlanTarget::Default)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::NotFound(_)));
    }

    #[tokio::test]
    async fn navigation_and_gripper_use_robot_namespace() {
        let world = Arc::new(ready_world());
        let (mut robot, _tracker) = robot_on(world.clone(), ARM);
        robot.load().await.unwrap();

        robot
            .navigate("map", &PoseStamped::new("map", Pose::from_position(2.0, 1.0, 0.0)))
            .await
            .unwrap();
        robot.control_gripper(0.02).await.unwrap();

        let journal = world.journal();
        assert!(journal.iter().any(|e| matches!(e,
            SimEvent::Navigated { action_namespace, .. } if action_namespace == "/lab/robot_manager/robots/arm1/move_base")));
        assert!(journal.iter().any(|e| matches!(e,
            SimEvent::GripperCommanded { service, gripper_name, .. }
                if service == "/lab/robot_manager/robots/arm1/gripper_control" && gripper_name == "arm1")));

        world.set_reject_navigation(true);
        let err = robot.navigate("map", &PoseStamped::default()).await.unwrap_err();
        assert!(matches!(err, FleetError::ActuationFailed(_)));
    }

    #[tokio::test]
    async fn reload_replaces_only_the_failed_stage() {
        let world = Arc::new(ready_world());
        let (mut robot, _tracker) = robot_on(world.clone(), ARM);
        robot.load().await.unwrap();

        let old = world.resource_for("base_driver").unwrap();
        world.fail(old);
        assert!(robot.has_resource(old));

        assert_eq!(robot.reload_resource(old, 3).await.unwrap(), ReloadOutcome::Reloaded);
        let new = world.resource_for("base_driver").unwrap();
        assert_ne!(old, new);
        assert!(!robot.has_resource(old));
        assert!(robot.has_resource(new));
        assert_eq!(world.launch_order().len(), 8);

        // The old id no longer backs a stage.
        assert_eq!(robot.reload_resource(old, 3).await.unwrap(), ReloadOutcome::Untracked);
    }

    #[tokio::test]
    async fn replacement_that_never_becomes_ready_is_released() {
        let world = Arc::new(
            SimWorld::builder()
                .ready_on("urdf_loader.py", Signal::Param("robot_description".into()))
                .ready_on("arm_driver", Signal::Topic("joint_states".into()))
                .ready_on("base_driver", Signal::Topic("odom".into()))
                .ready_on("move_base", Signal::Topic("cmd_vel".into()))
                .ready_on("grip_controller", Signal::Service("gripper_control".into()))
                .build(),
        );
        world.publish(Signal::Param("/lab/robot_manager/robots/arm1/robot_description_semantic".into()));
        let (mut robot, tracker) = robot_on(world.clone(), ARM);
        robot.load().await.unwrap();

        world.delete_params("/lab/robot_manager/robots/arm1").await;
        let failed = world.resource_for("move_group").unwrap();
        world.fail(failed);
        tracker.on_status(failed, ResourceStatus::Failed);

        let err = robot.reload_resource(failed, 3).await.unwrap_err();
        assert!(matches!(err.root_cause(), FleetError::ResourceRequestFailed(_)));
        assert!(world.resource_for("move_group").is_none());
        assert!(tracker.snapshot().iter().all(|(_, spec, _)| spec.executable != "move_group"));
        assert!(robot.planning_groups().is_empty());
    }

    #[tokio::test]
    async fn reload_is_bounded() {
        let world = Arc::new(ready_world());
        let (mut robot, _tracker) = robot_on(world.clone(), ARM);
        robot.load().await.unwrap();

        let first = world.resource_for("grip_driver").unwrap();
        assert_eq!(robot.reload_resource(first, 1).await.unwrap(), ReloadOutcome::Reloaded);
        let second = world.resource_for("grip_driver").unwrap();
        assert_eq!(robot.reload_resource(second, 1).await.unwrap(), ReloadOutcome::Exhausted);
    }

    #[tokio::test]
    async fn proxy_refuses_local_operations() {
        let config = parse_document(ARM, "other_lab").unwrap().remove(0);
        let mut proxy = Robot::proxy(config);
        assert!(!proxy.is_local());
        assert!(matches!(proxy.load().await, Err(FleetError::Configuration(_))));
        assert!(proxy.unload().await.released.is_empty());
    }

    #[test]
    fn viz_info_lists_enabled_features() {
        let config = parse_document(ARM, "lab").unwrap().remove(0);
        let robot = Robot::proxy(config);
        let info: Value = serde_yaml::from_str(&robot.viz_info().unwrap()).unwrap();
        let rviz = &info["RViz"];
        assert_eq!(
            rviz["urdf"]["robot_description"].as_str(),
            Some("/lab/robot_manager/robots/arm1/robot_description")
        );
        assert_eq!(rviz["manipulation"]["active_planning_group"].as_str(), Some("arm"));
        assert_eq!(rviz["navigation"]["local_planner"].as_str(), Some("dwa"));
        assert_eq!(rviz["gripper"]["gripper_ns"].as_str(), Some("/lab/robot_manager/robots/arm1"));
    }
}
