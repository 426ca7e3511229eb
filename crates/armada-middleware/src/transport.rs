//! The forwarding seam between coordinators.
//!
//! A coordinator that does not own a robot hands the unmodified
//! [`ServiceRequest`] to a [`PeerTransport`], addressed by the owner's
//! namespace.  On the owning side the request reaches a [`ServiceHandler`]
//! (the owner's manager).
//!
//! - [`InProcessTransport`] – coordinators living in one process (tests,
//!   simulations).
//! - [`WsPeerTransport`][crate::peer_link::WsPeerTransport] – coordinators
//!   reachable over WebSocket.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use armada_types::{FleetError, ServiceRequest, ServiceResponse};
use async_trait::async_trait;
use tracing::debug;

/// Serves operation requests; implemented by the coordinator's manager.
#[async_trait]
pub trait ServiceHandler: Send + Sync {
    async fn handle(&self, request: ServiceRequest) -> Result<ServiceResponse, FleetError>;
}

/// Delivers a request to the coordinator owning `namespace` and returns its
/// answer verbatim.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// # Errors
    ///
    /// [`FleetError::TransportFailed`] when the owner cannot be reached; any
    /// other error is the owner's own failure, relayed unchanged.
    async fn call(&self, namespace: &str, request: ServiceRequest) -> Result<ServiceResponse, FleetError>;
}

/// Directory of coordinators in the same process.
///
/// Handlers are held weakly so a manager that owns the transport can also be
/// registered in it.
#[derive(Default)]
pub struct InProcessTransport {
    handlers: RwLock<HashMap<String, Weak<dyn ServiceHandler>>>,
}

impl InProcessTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, namespace: impl Into<String>, handler: &Arc<dyn ServiceHandler>) {
        let namespace = namespace.into();
        debug!(namespace = %namespace, "coordinator registered with in-process transport");
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(namespace, Arc::downgrade(handler));
    }

    pub fn unregister(&self, namespace: &str) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(namespace);
    }

    fn lookup(&self, namespace: &str) -> Option<Arc<dyn ServiceHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(namespace)
            .and_then(Weak::upgrade)
    }
}

#[async_trait]
impl PeerTransport for InProcessTransport {
    async fn call(&self, namespace: &str, request: ServiceRequest) -> Result<ServiceResponse, FleetError> {
        let handler = self.lookup(namespace).ok_or_else(|| FleetError::TransportFailed {
            namespace: namespace.to_string(),
            details: "no coordinator registered for namespace".into(),
        })?;
        debug!(namespace, endpoint = request.endpoint(), robot = request.robot_name(), "forwarding in-process");
        handler.handle(request).await
    }
}
