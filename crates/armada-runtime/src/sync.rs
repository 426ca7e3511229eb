//! Config sync between coordinators.
//!
//! | Message | Sent when | Receiver does |
//! |---|---|---|
//! | `REQUEST_CONFIG` | at startup | advertises its local configs, if it has any |
//! | `ADVERTISE_CONFIG` | on request, after local parse, after a reliability change | merges the payload as the sender's remote configs |
//!
//! A coordinator ignores its own messages.  Nothing a peer sends can stop the
//! sync task: bad payloads are logged and dropped.

use std::sync::Arc;

use armada_kernel::{RobotConfig, parse_document, serialize_document};
use armada_middleware::SyncBus;
use armada_types::{FleetError, SyncAction, SyncMessage};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::registry::ConfigRegistry;

pub struct ConfigSyncer {
    namespace: String,
    bus: SyncBus,
    registry: Arc<ConfigRegistry>,
}

impl ConfigSyncer {
    pub fn new(namespace: impl Into<String>, bus: SyncBus, registry: Arc<ConfigRegistry>) -> Self {
        Self {
            namespace: namespace.into(),
            bus,
            registry,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Ask every peer for its local configs.
    pub fn request_remote_configs(&self) {
        let delivered = self.bus.publish(SyncMessage::request(&self.namespace));
        debug!(namespace = %self.namespace, delivered, "requested remote configs");
    }

    /// Advertise every local config. Nothing is sent when there are none.
    pub async fn advertise_local(&self) -> Result<(), FleetError> {
        let local = self.registry.local_configs().await;
        if local.is_empty() {
            return Ok(());
        }
        self.advertise(&local)
    }

    /// Advertise `configs` as owned by this coordinator.
    pub fn advertise(&self, configs: &[RobotConfig]) -> Result<(), FleetError> {
        let payload = serialize_document(configs)?;
        let delivered = self
            .bus
            .publish(SyncMessage::advertise(&self.namespace, payload));
        debug!(namespace = %self.namespace, configs = configs.len(), delivered, "advertised configs");
        Ok(())
    }

    /// React to one message from the bus.
    pub async fn handle(&self, message: SyncMessage) {
        if message.sender_namespace == self.namespace {
            return;
        }
        match message.action {
            SyncAction::RequestConfig => {
                debug!(from = %message.sender_namespace, "peer requested configs");
                if let Err(e) = self.advertise_local().await {
                    warn!(error = %e, "cannot advertise local configs");
                }
            }
            SyncAction::AdvertiseConfig => match parse_document(&message.payload, &message.sender_namespace) {
                Ok(configs) => {
                    let summary = self.registry.merge_remote(configs).await;
                    info!(
                        from = %message.sender_namespace,
                        added = summary.added,
                        updated = summary.updated,
                        "merged remote configs"
                    );
                }
                Err(e) => warn!(from = %message.sender_namespace, error = %e, "dropping malformed advert"),
            },
        }
    }

    /// Subscribe now and process messages on a background task until the bus
    /// closes.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut subscriber = self.bus.subscribe();
        tokio::spawn(async move {
            while let Some(message) = subscriber.recv().await {
                self.handle(message).await;
            }
            debug!(namespace = %self.namespace, "sync bus closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "Robots:\n  - name: arm1\n    urdf:\n      package_name: p\n      executable: e.urdf\n";

    fn syncer(namespace: &str, bus: &SyncBus) -> (Arc<ConfigSyncer>, Arc<ConfigRegistry>) {
        let registry = Arc::new(ConfigRegistry::new());
        (
            Arc::new(ConfigSyncer::new(namespace, bus.clone(), registry.clone())),
            registry,
        )
    }

    #[tokio::test]
    async fn own_messages_are_ignored() {
        let bus = SyncBus::default();
        let (sync, registry) = syncer("lab", &bus);
        sync.handle(SyncMessage::advertise("lab", DOC)).await;
        assert!(registry.remote_configs().await.is_empty());
    }

    #[tokio::test]
    async fn advert_is_stamped_with_sender_namespace() {
        let bus = SyncBus::default();
        let (sync, registry) = syncer("lab", &bus);
        sync.handle(SyncMessage::advertise("peer", DOC)).await;

        let remote = registry.remote_configs().await;
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].owning_namespace(), "peer");
    }

    #[tokio::test]
    async fn malformed_advert_is_dropped() {
        let bus = SyncBus::default();
        let (sync, registry) = syncer("lab", &bus);
        sync.handle(SyncMessage::advertise("peer", "::: not yaml [")).await;
        sync.handle(SyncMessage::advertise("peer", "Machines: []")).await;
        assert!(registry.remote_configs().await.is_empty());
    }

    #[tokio::test]
    async fn request_is_answered_only_with_local_configs() {
        let bus = SyncBus::default();
        let mut rx = bus.subscribe();
        let (sync, registry) = syncer("lab", &bus);

        sync.handle(SyncMessage::request("peer")).await;
        assert_eq!(bus.publish(SyncMessage::request("probe")), 1);
        assert_eq!(rx.recv().await.unwrap(), SyncMessage::request("probe"));

        for config in parse_document(DOC, "lab").unwrap() {
            registry.add_local(config).await.unwrap();
        }
        sync.handle(SyncMessage::request("peer")).await;
        let advert = rx.recv().await.unwrap();
        assert_eq!(advert.action, SyncAction::AdvertiseConfig);
        assert_eq!(advert.sender_namespace, "lab");
        assert_eq!(parse_document(&advert.payload, "x").unwrap()[0].name(), "arm1");
    }

    #[tokio::test]
    async fn spawned_syncer_merges_peer_adverts() {
        let bus = SyncBus::default();
        let (sync, registry) = syncer("lab", &bus);
        let _task = sync.spawn();

        bus.publish(SyncMessage::advertise("peer", DOC));
        for _ in 0..100 {
            if !registry.remote_configs().await.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(registry.remote_configs().await.len(), 1);
    }
}
