//! [`RobotManager`] – one coordinator.
//!
//! The manager owns the config registry and the set of loaded robots, and
//! decides for every request whether it is served here or forwarded to the
//! coordinator that owns the robot.
//!
//! | Request | Handled by |
//! |---|---|
//! | `Load` | local candidate first, else forwarded to the most reliable remote owner |
//! | `Unload` | local teardown, or proxy removal plus forwarded `Unload` |
//! | `GetConfig` | registry lookup (local first) |
//! | everything else | the loaded robot, locally or via its owner |
//!
//! Load and unload are serialised by one manager-wide lock; operations on a
//! loaded robot hold only that robot's mutex.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), armada_types::FleetError> {
//! use std::sync::Arc;
//! use armada_hal::{Collaborators, SimWorld};
//! use armada_middleware::{InProcessTransport, SyncBus};
//! use armada_runtime::{ManagerConfig, RobotManager};
//!
//! let world = Arc::new(SimWorld::permissive());
//! let manager = Arc::new(RobotManager::new(
//!     ManagerConfig::new("lab"),
//!     Collaborators::uniform(world),
//!     SyncBus::default(),
//!     Arc::new(InProcessTransport::new()),
//! ));
//! manager.register_local_document("Robots:\n  - name: arm1\n    urdf: {package_name: p, executable: a.urdf}\n").await?;
//! let handle = manager.load("arm1").await?;
//! assert_eq!(handle.owning_namespace, "lab");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use armada_hal::{Collaborators, SessionOptions, StatusEvent, StatusReceiver};
use armada_kernel::{LifecycleTimings, ResourceTracker, Robot, RobotBackend, RobotConfig, parse_document};
use armada_middleware::{PeerTransport, ServiceHandler, SyncBus};
use armada_types::{
    FleetError, LoadResponse, PlanTarget, Pose, PoseStamped, ResourceId, ResourceStatus, ServiceRequest,
    ServiceResponse,
};
use async_trait::async_trait;
use chrono::Utc;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::discovery;
use crate::registry::{ConfigRegistry, find_robot};
use crate::sync::ConfigSyncer;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Bounds on automatic reloads of failed stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadPolicy {
    pub enabled: bool,
    /// Reloads allowed per stage over the robot's lifetime.
    pub max_attempts: u32,
    /// Reloads allowed per stage per minute.
    pub per_minute: u32,
}

impl Default for ReloadPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            per_minute: 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// This coordinator's namespace; configs parsed here are owned by it.
    pub namespace: String,
    pub timings: LifecycleTimings,
    pub session_options: SessionOptions,
    /// Upper bound on one forwarded request.
    pub forward_timeout: Duration,
    pub reload: ReloadPolicy,
}

impl ManagerConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            timings: LifecycleTimings::default(),
            session_options: SessionOptions::default(),
            forward_timeout: Duration::from_secs(30),
            reload: ReloadPolicy::default(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RobotManager
// ────────────────────────────────────────────────────────────────────────────

struct LoadedRobot {
    robot: Arc<Mutex<Robot>>,
    response: LoadResponse,
}

pub struct RobotManager {
    namespace: String,
    registry: Arc<ConfigRegistry>,
    syncer: Arc<ConfigSyncer>,
    backend: RobotBackend,
    transport: Arc<dyn PeerTransport>,
    forward_timeout: Duration,
    loaded: RwLock<HashMap<String, LoadedRobot>>,
    load_lock: Mutex<()>,
    reload: ReloadPolicy,
    reload_limiter: DefaultKeyedRateLimiter<String>,
}

impl RobotManager {
    pub fn new(
        config: ManagerConfig,
        collaborators: Collaborators,
        bus: SyncBus,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        let registry = Arc::new(ConfigRegistry::new());
        let syncer = Arc::new(ConfigSyncer::new(config.namespace.clone(), bus, registry.clone()));
        let tracker = Arc::new(ResourceTracker::new(collaborators.launcher.clone()));
        let quota = Quota::per_minute(NonZeroU32::new(config.reload.per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            namespace: config.namespace,
            registry,
            syncer,
            backend: RobotBackend {
                collaborators,
                tracker,
                timings: config.timings,
                session_options: config.session_options,
            },
            transport,
            forward_timeout: config.forward_timeout,
            loaded: RwLock::new(HashMap::new()),
            load_lock: Mutex::new(()),
            reload: config.reload,
            reload_limiter: RateLimiter::keyed(quota),
        }
    }

    /// Use `tracker` (e.g. one backed by a catalog) instead of the default
    /// in-memory one.
    pub fn with_tracker(mut self, tracker: Arc<ResourceTracker>) -> Self {
        self.backend.tracker = tracker;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn tracker(&self) -> &Arc<ResourceTracker> {
        &self.backend.tracker
    }

    pub fn registry(&self) -> &Arc<ConfigRegistry> {
        &self.registry
    }

    // ── Configs ─────────────────────────────────────────────────────────────

    /// Parse a description document as owned by this coordinator and
    /// advertise the result. Returns how many configs were added; duplicate
    /// names are logged and skipped.
    pub async fn register_local_document(&self, text: &str) -> Result<usize, FleetError> {
        let mut added = 0;
        for config in parse_document(text, &self.namespace)? {
            match self.registry.add_local(config).await {
                Ok(()) => added += 1,
                Err(e) => warn!(namespace = %self.namespace, error = %e, "ignoring robot config"),
            }
        }
        if added > 0 {
            self.syncer.advertise_local().await?;
        }
        Ok(added)
    }

    /// Register every description file found under `root`. Returns how many
    /// configs were added.
    pub async fn discover(&self, root: impl AsRef<Path>) -> usize {
        let mut added = 0;
        for file in discovery::find_description_files(root) {
            match self.register_local_document(&file.text).await {
                Ok(n) => added += n,
                Err(e) => warn!(path = %file.path.display(), error = %e, "cannot use robot description"),
            }
        }
        added
    }

    /// Start processing sync messages, advertise local configs and ask peers
    /// for theirs.
    pub async fn start_sync(&self) -> JoinHandle<()> {
        let task = self.syncer.clone().spawn();
        if let Err(e) = self.syncer.advertise_local().await {
            warn!(error = %e, "cannot advertise local configs");
        }
        self.syncer.request_remote_configs();
        task
    }

    /// `(local, remote)` configs.
    pub async fn known_configs(&self) -> (Vec<RobotConfig>, Vec<RobotConfig>) {
        (self.registry.local_configs().await, self.registry.remote_configs().await)
    }

    pub async fn loaded_robots(&self) -> Vec<LoadResponse> {
        let mut robots: Vec<LoadResponse> = self
            .loaded
            .read()
            .await
            .values()
            .map(|l| l.response.clone())
            .collect();
        robots.sort_by(|a, b| a.robot_name.cmp(&b.robot_name));
        robots
    }

    /// The config document and absolute namespace of `name`; local configs
    /// win over remote ones.
    pub async fn get_robot_config(&self, name: &str) -> Result<(String, String), FleetError> {
        let named = |configs: Vec<RobotConfig>| configs.into_iter().find(|c| !name.is_empty() && c.name() == name);
        let config = match named(self.registry.local_configs().await) {
            Some(config) => config,
            None => named(self.registry.remote_configs().await)
                .ok_or_else(|| FleetError::NotFound(format!("robot '{name}' has no known config")))?,
        };
        Ok((config.to_document()?, config.abs_robot_namespace()))
    }

    // ── Load / unload ───────────────────────────────────────────────────────

    /// Load `name`, or return the existing handle when it is already loaded.
    pub async fn load(&self, name: &str) -> Result<LoadResponse, FleetError> {
        let _guard = self.load_lock.lock().await;

        let local = find_robot(name, &self.registry.local_configs().await).into_iter().next();
        let candidate = match local {
            Some(config) => config,
            None => find_robot(name, &self.registry.remote_configs().await)
                .into_iter()
                .next()
                .ok_or_else(|| FleetError::NotFound(format!("robot '{name}' is not known to any coordinator")))?,
        };
        if let Some(existing) = self.loaded.read().await.get(candidate.name()) {
            debug!(robot = candidate.name(), "robot already loaded");
            return Ok(existing.response.clone());
        }

        if candidate.owning_namespace() == self.namespace {
            self.load_local(candidate).await
        } else {
            self.load_remote(candidate).await
        }
    }

    async fn load_local(&self, config: RobotConfig) -> Result<LoadResponse, FleetError> {
        let name = config.name().to_string();
        let mut robot = Robot::local(config, self.backend.clone());
        if let Err(e) = robot.load().await {
            if matches!(e.root_cause(), FleetError::ResourceRequestFailed(_)) {
                self.downgrade(&name, &self.namespace).await;
            }
            return Err(e);
        }

        let response = LoadResponse {
            handle: Uuid::new_v4(),
            robot_name: name.clone(),
            owning_namespace: self.namespace.clone(),
            loaded_at: Utc::now(),
        };
        info!(robot = %name, handle = %response.handle, "robot loaded locally");
        self.insert_loaded(robot, response.clone()).await;
        Ok(response)
    }

    async fn load_remote(&self, config: RobotConfig) -> Result<LoadResponse, FleetError> {
        let owner = config.owning_namespace().to_string();
        let name = config.name().to_string();
        info!(robot = %name, owner = %owner, "forwarding load");
        let response = match self.forward(&owner, ServiceRequest::Load { robot_name: name }).await? {
            ServiceResponse::Loaded(response) => response,
            other => return Err(unexpected("load", &other)),
        };
        self.insert_loaded(Robot::proxy(config), response.clone()).await;
        Ok(response)
    }

    async fn insert_loaded(&self, robot: Robot, response: LoadResponse) {
        self.loaded.write().await.insert(
            response.robot_name.clone(),
            LoadedRobot {
                robot: Arc::new(Mutex::new(robot)),
                response,
            },
        );
    }

    /// Unload `name`. Local teardown failures are logged, not returned.
    pub async fn unload(&self, name: &str) -> Result<(), FleetError> {
        let _guard = self.load_lock.lock().await;
        let loaded = self
            .loaded
            .write()
            .await
            .remove(name)
            .ok_or_else(|| FleetError::NotFound(format!("robot '{name}' is not loaded")))?;

        let mut robot = loaded.robot.lock().await;
        if robot.is_local() {
            let report = robot.unload().await;
            if !report.is_clean() {
                warn!(robot = name, failures = report.failures.len(), "robot unloaded with release failures");
            }
            return Ok(());
        }

        let owner = robot.config().owning_namespace().to_string();
        drop(robot);
        info!(robot = name, owner = %owner, "forwarding unload");
        self.forward(&owner, ServiceRequest::Unload { robot_name: name.to_string() })
            .await
            .map(|_| ())
    }

    /// Tear down every local robot, drop every proxy and erase the catalog.
    pub async fn shutdown(&self) {
        let _guard = self.load_lock.lock().await;
        let loaded: Vec<(String, LoadedRobot)> = self.loaded.write().await.drain().collect();
        for (name, loaded) in loaded {
            let mut robot = loaded.robot.lock().await;
            if robot.is_local() {
                let report = robot.unload().await;
                debug!(robot = %name, released = report.released.len(), failures = report.failures.len(), "released at shutdown");
            }
        }
        self.backend.tracker.erase_catalog();
        info!(namespace = %self.namespace, "coordinator shut down");
    }

    // ── Routing ─────────────────────────────────────────────────────────────

    async fn forward(&self, namespace: &str, request: ServiceRequest) -> Result<ServiceResponse, FleetError> {
        match tokio::time::timeout(self.forward_timeout, self.transport.call(namespace, request)).await {
            Ok(result) => result,
            Err(_) => Err(FleetError::TransportFailed {
                namespace: namespace.to_string(),
                details: format!("no answer within {:?}", self.forward_timeout),
            }),
        }
    }

    /// Serve a per-robot request here or at the robot's owner.
    async fn route(&self, request: ServiceRequest) -> Result<ServiceResponse, FleetError> {
        let robot = self
            .loaded
            .read()
            .await
            .get(request.robot_name())
            .map(|l| l.robot.clone())
            .ok_or_else(|| FleetError::NotFound(format!("robot '{}' is not loaded", request.robot_name())))?;

        let mut robot = robot.lock().await;
        let owner = robot.config().owning_namespace().to_string();
        if owner != self.namespace {
            drop(robot);
            debug!(robot = request.robot_name(), owner = %owner, endpoint = request.endpoint(), "forwarding request");
            return self.forward(&owner, request).await;
        }

        match request {
            ServiceRequest::PlanManipulation {
                planning_group, target, ..
            } => robot
                .plan_manipulation(&planning_group, &target)
                .await
                .map(|()| ServiceResponse::Done),
            ServiceRequest::ExecutePlan { .. } => robot.execute_plan().await.map(|()| ServiceResponse::Done),
            ServiceRequest::GetManipulationTarget { .. } => robot
                .manipulation_target()
                .await
                .map(|pose| ServiceResponse::Target { pose }),
            ServiceRequest::NavigationGoal {
                reference_frame,
                target_pose,
                ..
            } => robot
                .navigate(&reference_frame, &target_pose)
                .await
                .map(|()| ServiceResponse::Done),
            ServiceRequest::GripperControl { position, .. } => {
                robot.control_gripper(position).await.map(|()| ServiceResponse::Done)
            }
            ServiceRequest::GetVizInfo { .. } => robot.viz_info().map(|info| ServiceResponse::VizInfo { info }),
            other => Err(FleetError::Configuration(format!(
                "'{}' is not a per-robot operation",
                other.endpoint()
            ))),
        }
    }

    pub async fn plan_manipulation(&self, name: &str, group: &str, target: PlanTarget) -> Result<(), FleetError> {
        let request = ServiceRequest::PlanManipulation {
            robot_name: name.to_string(),
            planning_group: group.to_string(),
            target,
        };
        expect_done("plan_manipulation", self.route(request).await?)
    }

    pub async fn execute_plan(&self, name: &str) -> Result<(), FleetError> {
        let request = ServiceRequest::ExecutePlan { robot_name: name.to_string() };
        expect_done("execute_plan", self.route(request).await?)
    }

    pub async fn manipulation_target(&self, name: &str) -> Result<Pose, FleetError> {
        let request = ServiceRequest::GetManipulationTarget { robot_name: name.to_string() };
        match self.route(request).await? {
            ServiceResponse::Target { pose } => Ok(pose),
            other => Err(unexpected("get_manipulation_target", &other)),
        }
    }

    pub async fn navigate(&self, name: &str, reference_frame: &str, target_pose: PoseStamped) -> Result<(), FleetError> {
        let request = ServiceRequest::NavigationGoal {
            robot_name: name.to_string(),
            reference_frame: reference_frame.to_string(),
            target_pose,
        };
        expect_done("navigation_goal", self.route(request).await?)
    }

    pub async fn control_gripper(&self, name: &str, position: f32) -> Result<(), FleetError> {
        let request = ServiceRequest::GripperControl {
            robot_name: name.to_string(),
            position,
        };
        expect_done("gripper_control", self.route(request).await?)
    }

    pub async fn viz_info(&self, name: &str) -> Result<String, FleetError> {
        match self.route(ServiceRequest::GetVizInfo { robot_name: name.to_string() }).await? {
            ServiceResponse::VizInfo { info } => Ok(info),
            other => Err(unexpected("get_viz_info", &other)),
        }
    }

    // ── Failure handling ────────────────────────────────────────────────────

    /// Halve the reliability of `(name, namespace)` and re-advertise it when
    /// it is ours.
    async fn downgrade(&self, name: &str, namespace: &str) {
        let Some(updated) = self.registry.adjust_reliability(name, namespace, 0.0).await else {
            return;
        };
        warn!(robot = name, reliability = updated.reliability(), "robot reliability downgraded");
        if namespace == self.namespace {
            if let Err(e) = self.syncer.advertise(std::slice::from_ref(&updated)) {
                warn!(robot = name, error = %e, "cannot advertise downgraded config");
            }
        }
    }

    /// Apply one launcher status notification.
    ///
    /// A failure of a resource backing a loaded local robot downgrades the
    /// robot and, within the reload policy, reloads the failed stage.
    pub async fn handle_status(&self, event: StatusEvent) {
        if self.apply_status(event) {
            self.recover(event.resource_id).await;
        }
    }

    /// Record `event` in the tracker. Returns whether the resource failed.
    fn apply_status(&self, event: StatusEvent) -> bool {
        let StatusEvent { resource_id, status } = event;
        if !self.backend.tracker.on_status(resource_id, status) {
            debug!(resource = %resource_id, status = status.as_str(), "status for untracked resource");
        }
        status == ResourceStatus::Failed
    }

    async fn recover(&self, resource_id: ResourceId) {
        let robots: Vec<Arc<Mutex<Robot>>> = self.loaded.read().await.values().map(|l| l.robot.clone()).collect();
        for robot in robots {
            let mut robot = robot.lock().await;
            if !robot.is_local() {
                continue;
            }
            let Some((kind, stage)) = robot.stage_of(resource_id) else {
                continue;
            };
            let name = robot.name().to_string();
            warn!(robot = %name, feature = %kind, stage = %stage, resource = %resource_id, "resource failed");
            self.downgrade(&name, &self.namespace).await;

            if !self.reload.enabled {
                return;
            }
            let key = format!("{name}/{kind}/{stage}");
            if self.reload_limiter.check_key(&key).is_err() {
                warn!(robot = %name, feature = %kind, stage = %stage, "reload rate limit reached");
                return;
            }
            match robot.reload_resource(resource_id, self.reload.max_attempts).await {
                Ok(outcome) => info!(robot = %name, outcome = ?outcome, "reload finished"),
                Err(e) => warn!(robot = %name, error = %e.report(), "reload failed"),
            }
            return;
        }
    }

    /// Consume launcher status notifications until the sender side closes.
    ///
    /// Statuses reach the tracker in arrival order so readiness waits see a
    /// failure immediately; downgrade and reload run in their own task.
    pub fn spawn_status_listener(self: &Arc<Self>, mut receiver: StatusReceiver) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                if manager.apply_status(event) {
                    let manager = Arc::clone(&manager);
                    tokio::spawn(async move { manager.recover(event.resource_id).await });
                }
            }
            debug!("status feed closed");
        })
    }
}

fn unexpected(endpoint: &str, response: &ServiceResponse) -> FleetError {
    FleetError::Serialization(format!("unexpected response to '{endpoint}': {response:?}"))
}

fn expect_done(endpoint: &str, response: ServiceResponse) -> Result<(), FleetError> {
    match response {
        ServiceResponse::Done => Ok(()),
        other => Err(unexpected(endpoint, &other)),
    }
}

#[async_trait]
impl ServiceHandler for RobotManager {
    async fn handle(&self, request: ServiceRequest) -> Result<ServiceResponse, FleetError> {
        debug!(namespace = %self.namespace, endpoint = request.endpoint(), robot = request.robot_name(), "request");
        match request {
            ServiceRequest::Load { robot_name } => self.load(&robot_name).await.map(ServiceResponse::Loaded),
            ServiceRequest::Unload { robot_name } => self.unload(&robot_name).await.map(|()| ServiceResponse::Done),
            ServiceRequest::GetConfig { robot_name } => {
                self.get_robot_config(&robot_name)
                    .await
                    .map(|(robot_config, robot_absolute_namespace)| ServiceResponse::Config {
                        robot_config,
                        robot_absolute_namespace,
                    })
            }
            other => self.route(other).await,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use armada_hal::{Signal, SimWorld, SystemGraph};
    use armada_middleware::InProcessTransport;
    use armada_types::SyncAction;

    const ARM: &str = r#"
Robots:
  - name: arm1
    manipulation:
      controller:
        package_name: arm_moveit
        executable: move_group
        planning_groups: [arm]
      driver:
        package_name: arm_hw
        executable: arm_driver
    gripper:
      controller:
        package_name: grip
        executable: grip_controller
"#;

    fn world() -> Arc<SimWorld> {
        Arc::new(
            SimWorld::builder()
                .permissive()
                .with_named_target("home", Pose::from_position(0.3, 0.0, 0.5))
                .build(),
        )
    }

    fn config(namespace: &str) -> ManagerConfig {
        ManagerConfig {
            timings: LifecycleTimings::immediate(),
            forward_timeout: Duration::from_secs(2),
            ..ManagerConfig::new(namespace)
        }
    }

    fn manager(namespace: &str, world: Arc<SimWorld>, bus: &SyncBus, transport: &Arc<InProcessTransport>) -> Arc<RobotManager> {
        let manager = Arc::new(RobotManager::new(
            config(namespace),
            Collaborators::uniform(world),
            bus.clone(),
            transport.clone(),
        ));
        let handler: Arc<dyn ServiceHandler> = manager.clone();
        transport.register(namespace, &handler);
        manager
    }

    async fn eventually<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..200 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn arm1_plan_and_execute_locally() {
        let transport = Arc::new(InProcessTransport::new());
        let world = world();
        let lab = manager("lab", world.clone(), &SyncBus::default(), &transport);
        assert_eq!(lab.register_local_document(ARM).await.unwrap(), 1);

        let handle = lab.load("arm1").await.unwrap();
        assert_eq!(handle.owning_namespace, "lab");
        assert_eq!(lab.load("arm1").await.unwrap(), handle);

        lab.plan_manipulation("arm1", "", PlanTarget::Named("home".into())).await.unwrap();
        lab.execute_plan("arm1").await.unwrap();
        assert_eq!(
            lab.manipulation_target("arm1").await.unwrap(),
            Pose::from_position(0.3, 0.0, 0.5)
        );
        lab.control_gripper("arm1", 0.01).await.unwrap();

        let err = lab
            .navigate("arm1", "map", PoseStamped::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Configuration(_)));

        lab.unload("arm1").await.unwrap();
        assert!(world.running().is_empty());
        assert!(matches!(lab.unload("arm1").await, Err(FleetError::NotFound(_))));
        assert!(matches!(lab.execute_plan("arm1").await, Err(FleetError::NotFound(_))));
    }

    #[tokio::test]
    async fn unknown_robot_is_not_found() {
        let transport = Arc::new(InProcessTransport::new());
        let lab = manager("lab", world(), &SyncBus::default(), &transport);
        assert!(matches!(lab.load("ghost").await, Err(FleetError::NotFound(_))));
        assert!(matches!(lab.get_robot_config("ghost").await, Err(FleetError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_local_names_are_skipped() {
        let transport = Arc::new(InProcessTransport::new());
        let lab = manager("lab", world(), &SyncBus::default(), &transport);
        assert_eq!(lab.register_local_document(ARM).await.unwrap(), 1);
        assert_eq!(lab.register_local_document(ARM).await.unwrap(), 0);
        assert_eq!(lab.known_configs().await.0.len(), 1);
    }

    #[tokio::test]
    async fn two_coordinators_sync_and_forward() {
        let bus = SyncBus::default();
        let transport = Arc::new(InProcessTransport::new());
        let owner_world = world();
        let owner = manager("lab_a", owner_world.clone(), &bus, &transport);
        let caller = manager("lab_b", world(), &bus, &transport);

        owner.register_local_document(ARM).await.unwrap();
        let _owner_sync = owner.start_sync().await;
        let _caller_sync = caller.start_sync().await;

        eventually(|| {
            let caller = caller.clone();
            async move { !caller.known_configs().await.1.is_empty() }
        })
        .await;
        let (_, remote) = caller.known_configs().await;
        assert_eq!(remote[0].owning_namespace(), "lab_a");

        let handle = caller.load("arm1").await.unwrap();
        assert_eq!(handle.owning_namespace, "lab_a");
        assert_eq!(owner.loaded_robots().await, vec![handle.clone()]);
        assert_eq!(caller.loaded_robots().await, vec![handle]);

        caller
            .plan_manipulation("arm1", "arm", PlanTarget::Named("home".into()))
            .await
            .unwrap();
        caller.execute_plan("arm1").await.unwrap();
        let info = caller.viz_info("arm1").await.unwrap();
        assert!(info.contains("/lab_a/robot_manager/robots/arm1"));

        let (document, abs_ns) = caller.get_robot_config("arm1").await.unwrap();
        assert_eq!(abs_ns, "/lab_a/robot_manager/robots/arm1");
        assert!(document.contains("arm1"));

        caller.unload("arm1").await.unwrap();
        assert!(owner.loaded_robots().await.is_empty());
        assert!(owner_world.running().is_empty());
    }

    #[tokio::test]
    async fn unreachable_owner_is_transport_failure() {
        let bus = SyncBus::default();
        let transport = Arc::new(InProcessTransport::new());
        let owner = manager("lab_a", world(), &bus, &transport);
        let caller = manager("lab_b", world(), &bus, &transport);

        owner.register_local_document(ARM).await.unwrap();
        let _sync = caller.start_sync().await;
        let _owner_sync = owner.start_sync().await;
        eventually(|| {
            let caller = caller.clone();
            async move { !caller.known_configs().await.1.is_empty() }
        })
        .await;
        caller.load("arm1").await.unwrap();

        transport.unregister("lab_a");
        let err = caller.execute_plan("arm1").await.unwrap_err();
        assert!(matches!(err, FleetError::TransportFailed { namespace, .. } if namespace == "lab_a"));
    }

    #[tokio::test]
    async fn owner_failures_are_relayed() {
        let bus = SyncBus::default();
        let transport = Arc::new(InProcessTransport::new());
        let owner = manager("lab_a", world(), &bus, &transport);
        let caller = manager("lab_b", world(), &bus, &transport);

        owner.register_local_document(ARM).await.unwrap();
        let _owner_sync = owner.start_sync().await;
        let _sync = caller.start_sync().await;
        eventually(|| {
            let caller = caller.clone();
            async move { !caller.known_configs().await.1.is_empty() }
        })
        .await;
        caller.load("arm1").await.unwrap();

        let err = caller.execute_plan("arm1").await.unwrap_err();
        assert_eq!(err, FleetError::PlanningFailed("no valid plan".into()));
    }

    #[tokio::test]
    async fn local_candidate_wins_over_more_reliable_remote() {
        let bus = SyncBus::default();
        let transport = Arc::new(InProcessTransport::new());
        let world = world();
        let lab = manager("lab", world.clone(), &bus, &transport);
        lab.register_local_document(ARM).await.unwrap();
        let remote = parse_document(&ARM.replace("name: arm1", "name: arm1\n    reliability: 1.0"), "peer").unwrap();
        lab.registry().merge_remote(remote).await;

        let handle = lab.load("arm1").await.unwrap();
        assert_eq!(handle.owning_namespace, "lab");
        assert!(!world.running().is_empty());
    }

    #[tokio::test]
    async fn config_lookup_is_by_exact_name_and_prefers_local() {
        let transport = Arc::new(InProcessTransport::new());
        let lab = manager("lab", world(), &SyncBus::default(), &transport);
        lab.register_local_document(ARM).await.unwrap();
        let remote = parse_document(&ARM.replace("name: arm1", "name: arm1\n    reliability: 1.0"), "peer").unwrap();
        lab.registry().merge_remote(remote).await;

        let (_, abs_ns) = lab.get_robot_config("arm1").await.unwrap();
        assert_eq!(abs_ns, "/lab/robot_manager/robots/arm1");
        assert!(matches!(lab.get_robot_config("").await, Err(FleetError::NotFound(_))));
        assert!(matches!(lab.get_robot_config("arm").await, Err(FleetError::NotFound(_))));
    }

    #[tokio::test]
    async fn remote_only_config_is_found_by_name() {
        let transport = Arc::new(InProcessTransport::new());
        let lab = manager("lab", world(), &SyncBus::default(), &transport);
        lab.registry().merge_remote(parse_document(ARM, "peer").unwrap()).await;

        let (_, abs_ns) = lab.get_robot_config("arm1").await.unwrap();
        assert_eq!(abs_ns, "/peer/robot_manager/robots/arm1");
    }

    #[tokio::test]
    async fn failure_during_reload_interrupts_the_readiness_wait() {
        let transport = Arc::new(InProcessTransport::new());
        let namespace = "/lab/robot_manager/robots/arm1";
        let semantic = Signal::Param("robot_description_semantic".into()).prefixed(namespace);
        let world = Arc::new(
            SimWorld::builder()
                .ready_on("arm_driver", Signal::Topic("joint_states".into()))
                .ready_on("grip_controller", Signal::Service("gripper_control".into()))
                .build(),
        );
        // move_group has no ready rule: only this published parameter makes it ready
        world.publish(semantic);
        let feed = world.take_status_feed().unwrap();
        let lab = Arc::new(RobotManager::new(
            ManagerConfig {
                timings: LifecycleTimings {
                    readiness_timeout: Duration::from_secs(10),
                    ..LifecycleTimings::immediate()
                },
                ..config("lab")
            },
            Collaborators::uniform(world.clone()),
            SyncBus::default(),
            transport,
        ));
        lab.register_local_document(ARM).await.unwrap();
        lab.load("arm1").await.unwrap();
        let _listener = lab.spawn_status_listener(feed);

        world.delete_params(namespace).await;
        let failed = world.resource_for("move_group").unwrap();
        world.fail(failed);

        // the reload relaunches move_group, which can never become ready
        eventually(|| {
            let world = world.clone();
            let lab = lab.clone();
            async move {
                world
                    .resource_for("move_group")
                    .is_some_and(|id| id != failed && lab.tracker().status(id) == Some(ResourceStatus::Pending))
            }
        })
        .await;
        let replacement = world.resource_for("move_group").unwrap();
        world.fail(replacement);

        eventually(|| {
            let lab = lab.clone();
            async move { !lab.tracker().snapshot().iter().any(|(id, _, _)| *id == replacement) }
        })
        .await;
        assert!(world.resource_for("move_group").is_none());
    }

    #[tokio::test]
    async fn refused_launch_downgrades_and_readvertises() {
        let bus = SyncBus::default();
        let mut adverts = bus.subscribe();
        let transport = Arc::new(InProcessTransport::new());
        let world = Arc::new(SimWorld::builder().permissive().refuse("move_group").build());
        let lab = manager("lab", world.clone(), &bus, &transport);
        lab.register_local_document(ARM).await.unwrap();
        let _initial = adverts.recv().await.unwrap();

        let err = lab.load("arm1").await.unwrap_err();
        assert!(matches!(err.root_cause(), FleetError::ResourceRequestFailed(_)));
        assert!(world.running().is_empty());

        let (local, _) = lab.known_configs().await;
        assert!((local[0].reliability() - 0.4).abs() < 1e-9);
        let advert = adverts.recv().await.unwrap();
        assert_eq!(advert.action, SyncAction::AdvertiseConfig);
        assert!(advert.payload.contains("0.4"));
    }

    #[tokio::test]
    async fn failed_resource_is_reloaded_once() {
        let transport = Arc::new(InProcessTransport::new());
        let world = Arc::new(
            SimWorld::builder()
                .ready_on("arm_driver", Signal::Topic("joint_states".into()))
                .ready_on("move_group", Signal::Param("robot_description_semantic".into()))
                .ready_on("grip_controller", Signal::Service("gripper_control".into()))
                .build(),
        );
        let mut feed = world.take_status_feed().unwrap();
        let lab = manager("lab", world.clone(), &SyncBus::default(), &transport);
        lab.register_local_document(ARM).await.unwrap();
        lab.load("arm1").await.unwrap();
        let launched = world.launch_order().len();

        let failed = world.resource_for("arm_driver").unwrap();
        world.fail(failed);
        let event = feed.recv().await.unwrap();
        lab.handle_status(event).await;
        lab.handle_status(event).await;

        assert_eq!(world.launch_order().len(), launched + 1);
        let replacement = world.resource_for("arm_driver").unwrap();
        assert_ne!(replacement, failed);
        assert_eq!(lab.tracker().status(replacement), Some(ResourceStatus::Active));
        let (local, _) = lab.known_configs().await;
        assert!((local[0].reliability() - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn disabled_reload_policy_only_downgrades() {
        let transport = Arc::new(InProcessTransport::new());
        let world = world();
        let mut feed = world.take_status_feed().unwrap();
        let lab = Arc::new(RobotManager::new(
            ManagerConfig {
                reload: ReloadPolicy {
                    enabled: false,
                    ..ReloadPolicy::default()
                },
                ..config("lab")
            },
            Collaborators::uniform(world.clone()),
            SyncBus::default(),
            transport,
        ));
        lab.register_local_document(ARM).await.unwrap();
        lab.load("arm1").await.unwrap();
        let launched = world.launch_order().len();

        world.fail(world.resource_for("grip_controller").unwrap());
        lab.handle_status(feed.recv().await.unwrap()).await;
        assert_eq!(world.launch_order().len(), launched);
        assert!((lab.known_configs().await.0[0].reliability() - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn shutdown_releases_everything() {
        let transport = Arc::new(InProcessTransport::new());
        let world = world();
        let lab = manager("lab", world.clone(), &SyncBus::default(), &transport);
        lab.register_local_document(ARM).await.unwrap();
        lab.load("arm1").await.unwrap();

        lab.shutdown().await;
        assert!(world.running().is_empty());
        assert!(lab.loaded_robots().await.is_empty());
        assert!(lab.tracker().is_empty());
    }

    #[tokio::test]
    async fn discovered_descriptions_are_registered_and_advertised() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("cell_1");
        std::fs::create_dir_all(&nested)?;
        std::fs::write(nested.join(crate::DESCRIPTION_FILE_NAME), ARM)?;

        let bus = SyncBus::default();
        let mut adverts = bus.subscribe();
        let transport = Arc::new(InProcessTransport::new());
        let lab = manager("lab", world(), &bus, &transport);

        assert_eq!(lab.discover(dir.path()).await, 1);
        let advert = adverts.recv().await.ok_or("no advert")?;
        assert_eq!(advert.sender_namespace, "lab");
        assert_eq!(lab.known_configs().await.0[0].name(), "arm1");
        Ok(())
    }

    #[tokio::test]
    async fn requests_are_served_through_the_handler_seam() {
        let transport = Arc::new(InProcessTransport::new());
        let lab = manager("lab", world(), &SyncBus::default(), &transport);
        lab.register_local_document(ARM).await.unwrap();

        let response = transport
            .call("lab", ServiceRequest::Load { robot_name: "arm1".into() })
            .await
            .unwrap();
        assert!(matches!(response, ServiceResponse::Loaded(ref r) if r.robot_name == "arm1"));

        let response = transport
            .call("lab", ServiceRequest::GetConfig { robot_name: "arm1".into() })
            .await
            .unwrap();
        assert!(matches!(response,
            ServiceResponse::Config { ref robot_absolute_namespace, .. }
                if robot_absolute_namespace == "/lab/robot_manager/robots/arm1"));
    }
}
