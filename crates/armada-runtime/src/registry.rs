//! [`ConfigRegistry`] – the robot configs a coordinator knows about.
//!
//! Local configs come from this coordinator's description files; remote
//! configs arrive through config sync.  A local name may only appear once.
//! Remote configs are identified by name *and* owning namespace and are
//! replaced wholesale whenever their owner advertises them again.

use armada_kernel::RobotConfig;
use armada_types::FleetError;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default)]
struct Configs {
    local: Vec<RobotConfig>,
    remote: Vec<RobotConfig>,
}

/// What a [`ConfigRegistry::merge_remote`] call changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub updated: usize,
}

#[derive(Default)]
pub struct ConfigRegistry {
    configs: RwLock<Configs>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a config owned by this coordinator.
    ///
    /// # Errors
    ///
    /// [`FleetError::DuplicateConfig`] when a local config with the same name
    /// already exists; the registry is left unchanged.
    pub async fn add_local(&self, config: RobotConfig) -> Result<(), FleetError> {
        let mut configs = self.configs.write().await;
        if configs.local.iter().any(|c| c.name() == config.name()) {
            return Err(FleetError::DuplicateConfig(config.name().to_string()));
        }
        info!(robot = config.name(), namespace = config.owning_namespace(), "local robot config registered");
        configs.local.push(config);
        Ok(())
    }

    /// Insert or overwrite each config by `(name, owning namespace)`.
    pub async fn merge_remote(&self, incoming: Vec<RobotConfig>) -> MergeSummary {
        let mut configs = self.configs.write().await;
        let mut summary = MergeSummary::default();
        for config in incoming {
            match configs.remote.iter_mut().find(|known| **known == config) {
                Some(known) => {
                    debug!(robot = config.name(), namespace = config.owning_namespace(), "remote config updated");
                    *known = config;
                    summary.updated += 1;
                }
                None => {
                    info!(robot = config.name(), namespace = config.owning_namespace(), "remote config added");
                    configs.remote.push(config);
                    summary.added += 1;
                }
            }
        }
        summary
    }

    pub async fn local_configs(&self) -> Vec<RobotConfig> {
        self.configs.read().await.local.clone()
    }

    pub async fn remote_configs(&self) -> Vec<RobotConfig> {
        self.configs.read().await.remote.clone()
    }

    /// Move the reliability of the config identified by `(name, namespace)`
    /// toward `target`; local configs are searched first. Returns the
    /// updated config.
    pub async fn adjust_reliability(&self, name: &str, namespace: &str, target: f64) -> Option<RobotConfig> {
        let mut configs = self.configs.write().await;
        let Configs { local, remote } = &mut *configs;
        let config = local
            .iter_mut()
            .chain(remote.iter_mut())
            .find(|c| c.name() == name && c.owning_namespace() == namespace)?;
        config.adjust_reliability(target);
        debug!(robot = name, namespace, reliability = config.reliability(), "reliability adjusted");
        Some(config.clone())
    }
}

/// Configs named `name` (every config when `name` is empty), most reliable
/// first.  Ties keep their input order.
pub fn find_robot(name: &str, configs: &[RobotConfig]) -> Vec<RobotConfig> {
    let mut matches: Vec<RobotConfig> = configs
        .iter()
        .filter(|c| name.is_empty() || c.name() == name)
        .cloned()
        .collect();
    matches.sort_by(|a, b| {
        b.reliability()
            .partial_cmp(&a.reliability())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_kernel::parse_document;

    fn config(name: &str, namespace: &str, reliability: f64) -> RobotConfig {
        let doc = format!(
            "Robots:\n  - name: {name}\n    reliability: {reliability}\n    urdf:\n      package_name: p\n      executable: e.urdf\n"
        );
        parse_document(&doc, namespace).unwrap().remove(0)
    }

    #[tokio::test]
    async fn duplicate_local_name_is_rejected() {
        let registry = ConfigRegistry::new();
        registry.add_local(config("arm1", "lab", 0.8)).await.unwrap();
        let err = registry.add_local(config("arm1", "lab", 0.2)).await.unwrap_err();
        assert_eq!(err, FleetError::DuplicateConfig("arm1".into()));

        let local = registry.local_configs().await;
        assert_eq!(local.len(), 1);
        assert!((local[0].reliability() - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn merging_the_same_advert_twice_is_idempotent() {
        let registry = ConfigRegistry::new();
        let advert = vec![config("arm1", "peer", 0.9), config("base1", "peer", 0.5)];

        let first = registry.merge_remote(advert.clone()).await;
        assert_eq!(first, MergeSummary { added: 2, updated: 0 });
        let second = registry.merge_remote(advert).await;
        assert_eq!(second, MergeSummary { added: 0, updated: 2 });
        assert_eq!(registry.remote_configs().await.len(), 2);
    }

    #[tokio::test]
    async fn same_name_from_two_owners_is_kept_twice() {
        let registry = ConfigRegistry::new();
        registry.merge_remote(vec![config("arm1", "peer_a", 0.9)]).await;
        registry.merge_remote(vec![config("arm1", "peer_b", 0.4)]).await;
        assert_eq!(registry.remote_configs().await.len(), 2);
    }

    #[tokio::test]
    async fn readvertised_config_replaces_reliability() {
        let registry = ConfigRegistry::new();
        registry.merge_remote(vec![config("arm1", "peer", 0.9)]).await;
        registry.merge_remote(vec![config("arm1", "peer", 0.1)]).await;
        let remote = registry.remote_configs().await;
        assert!((remote[0].reliability() - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn adjust_targets_exact_owner() {
        let registry = ConfigRegistry::new();
        registry.add_local(config("arm1", "lab", 1.0)).await.unwrap();
        registry.merge_remote(vec![config("arm1", "peer", 1.0)]).await;

        let adjusted = registry.adjust_reliability("arm1", "peer", 0.0).await.unwrap();
        assert_eq!(adjusted.owning_namespace(), "peer");
        assert!((adjusted.reliability() - 0.5).abs() < 1e-9);
        assert!((registry.local_configs().await[0].reliability() - 1.0).abs() < 1e-9);
        assert!(registry.adjust_reliability("arm1", "nowhere", 0.0).await.is_none());
    }

    #[test]
    fn find_robot_orders_by_reliability_and_keeps_ties_stable() {
        let configs = vec![
            config("arm1", "a", 0.5),
            config("arm1", "b", 0.9),
            config("base1", "a", 1.0),
            config("arm1", "c", 0.5),
        ];
        let found = find_robot("arm1", &configs);
        let owners: Vec<_> = found.iter().map(RobotConfig::owning_namespace).collect();
        assert_eq!(owners, vec!["b", "a", "c"]);

        assert_eq!(find_robot("", &configs).len(), 4);
        assert!(find_robot("ghost", &configs).is_empty());
    }
}
