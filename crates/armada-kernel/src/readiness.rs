//! Readiness waits for freshly launched stages.
//!
//! A stage counts as ready once its signal shows up in the system graph.
//! The wait polls the graph, gives up after a timeout, and aborts as soon as
//! the launcher reports the stage's resource as failed.

use std::time::Duration;

use armada_hal::{Signal, SystemGraph};
use armada_types::{FleetError, ResourceStatus};
use tokio::sync::watch;
use tokio::time;
use tracing::debug;

use crate::feature::{FeatureKind, Stage};

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleTimings {
    /// How often the graph is polled.
    pub poll_interval: Duration,
    /// Upper bound on one readiness wait.
    pub readiness_timeout: Duration,
    /// Extra wait after readiness for stages that keep initialising after
    /// their signal appears.
    pub settle_delay: Duration,
}

impl Default for LifecycleTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            readiness_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(5),
        }
    }
}

impl LifecycleTimings {
    /// Short timings for tests and simulations.
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            readiness_timeout: Duration::from_secs(2),
            settle_delay: Duration::ZERO,
        }
    }
}

/// The signal that marks `stage` of `kind` as ready, relative to the robot's
/// absolute namespace. `None` means the stage is only given the settle delay.
pub fn readiness_signal(kind: FeatureKind, stage: Stage) -> Option<Signal> {
    match (kind, stage) {
        (FeatureKind::Urdf, Stage::Controller) => Some(Signal::Param("robot_description".into())),
        (FeatureKind::Manipulation, Stage::Driver) => Some(Signal::Topic("joint_states".into())),
        (FeatureKind::Manipulation, Stage::Controller) => {
            Some(Signal::Param("robot_description_semantic".into()))
        }
        (FeatureKind::Navigation, Stage::Driver) => Some(Signal::Topic("odom".into())),
        (FeatureKind::Navigation, Stage::Controller) => Some(Signal::Topic("cmd_vel".into())),
        (FeatureKind::Gripper, Stage::Controller) => Some(Signal::Service("gripper_control".into())),
        (FeatureKind::Gripper, Stage::Driver) | (FeatureKind::Urdf, Stage::Driver) => None,
    }
}

/// Whether `stage` of `kind` gets the settle delay after becoming ready.
pub fn settles(kind: FeatureKind, stage: Stage) -> bool {
    matches!(
        (kind, stage),
        (FeatureKind::Manipulation, Stage::Controller)
            | (FeatureKind::Navigation, Stage::Controller)
            | (FeatureKind::Gripper, Stage::Driver)
    )
}

fn failed(status: &watch::Receiver<ResourceStatus>) -> bool {
    *status.borrow() == ResourceStatus::Failed
}

/// Wait until `signal` is available.
///
/// # Errors
///
/// [`FleetError::ResourceRequestFailed`] when the resource fails, its status
/// channel closes, or the signal does not appear within
/// `timings.readiness_timeout`.
pub async fn wait_until_ready(
    graph: &dyn SystemGraph,
    signal: Option<&Signal>,
    mut status: watch::Receiver<ResourceStatus>,
    timings: &LifecycleTimings,
) -> Result<(), FleetError> {
    if failed(&status) {
        return Err(FleetError::ResourceRequestFailed(
            "resource failed before becoming ready".into(),
        ));
    }
    let Some(signal) = signal else {
        return Ok(());
    };

    let deadline = time::sleep(timings.readiness_timeout);
    tokio::pin!(deadline);
    let mut ticker = time::interval(timings.poll_interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                return Err(FleetError::ResourceRequestFailed(format!(
                    "{signal} did not appear within {:?}",
                    timings.readiness_timeout
                )));
            }
            changed = status.changed() => {
                if changed.is_err() {
                    return Err(FleetError::ResourceRequestFailed(format!(
                        "resource released while waiting for {signal}"
                    )));
                }
                if failed(&status) {
                    return Err(FleetError::ResourceRequestFailed(format!(
                        "resource failed while waiting for {signal}"
                    )));
                }
            }
            _ = ticker.tick() => {
                if graph.is_available(signal).await {
                    debug!(signal = %signal, "readiness signal seen");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_hal::SimWorld;

    fn topic() -> Signal {
        Signal::Topic("/lab/robot_manager/robots/arm1/joint_states".into())
    }

    #[tokio::test(start_paused = true)]
    async fn returns_once_signal_appears() {
        let world = SimWorld::default();
        let (_tx, rx) = watch::channel(ResourceStatus::Pending);
        world.publish(topic());
        wait_until_ready(&world, Some(&topic()), rx, &LifecycleTimings::default())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_signal_never_appears() {
        let world = SimWorld::default();
        let (_tx, rx) = watch::channel(ResourceStatus::Pending);
        let err = wait_until_ready(&world, Some(&topic()), rx, &LifecycleTimings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::ResourceRequestFailed(msg) if msg.contains("did not appear")));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_interrupts_the_wait() {
        let world = SimWorld::default();
        let (tx, rx) = watch::channel(ResourceStatus::Pending);
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(3)).await;
            tx.send_replace(ResourceStatus::Failed);
            // keep the sender alive past the notification
            time::sleep(Duration::from_secs(60)).await;
        });

        let started = time::Instant::now();
        let err = wait_until_ready(&world, Some(&topic()), rx, &LifecycleTimings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::ResourceRequestFailed(msg) if msg.contains("failed while waiting")));
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn stage_without_signal_is_ready_unless_failed() {
        let world = SimWorld::default();
        let (tx, rx) = watch::channel(ResourceStatus::Pending);
        wait_until_ready(&world, None, rx.clone(), &LifecycleTimings::immediate())
            .await
            .unwrap();

        tx.send_replace(ResourceStatus::Failed);
        assert!(wait_until_ready(&world, None, rx, &LifecycleTimings::immediate()).await.is_err());
    }

    #[test]
    fn signal_table_matches_stage_roles() {
        assert_eq!(
            readiness_signal(FeatureKind::Navigation, Stage::Driver),
            Some(Signal::Topic("odom".into()))
        );
        assert_eq!(readiness_signal(FeatureKind::Gripper, Stage::Driver), None);
        assert!(settles(FeatureKind::Gripper, Stage::Driver));
        assert!(!settles(FeatureKind::Urdf, Stage::Controller));
    }
}
