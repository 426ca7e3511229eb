//! [`Launcher`] – the external process launcher seam.
//!
//! Every driver and controller a robot feature needs is started through a
//! launcher.  The launcher hands back a [`ResourceId`] and, from then on,
//! reports health changes for that resource as [`StatusEvent`]s on a
//! [`StatusFeed`].

use armada_types::{FleetError, LaunchSpec, ResourceId, ResourceStatus};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Starts and stops external processes on behalf of a coordinator.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start the process described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::ResourceRequestFailed`] when the launcher cannot
    /// be reached or refuses the request.
    async fn launch(&self, spec: &LaunchSpec) -> Result<ResourceId, FleetError>;

    /// Stop the process behind `id`.
    async fn release(&self, id: ResourceId) -> Result<(), FleetError>;
}

/// A health change of one launched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    pub resource_id: ResourceId,
    pub status: ResourceStatus,
}

pub type StatusSender = mpsc::UnboundedSender<StatusEvent>;
pub type StatusReceiver = mpsc::UnboundedReceiver<StatusEvent>;

/// Channel pair carrying [`StatusEvent`]s from a launcher to the manager.
pub struct StatusFeed {
    sender: StatusSender,
    receiver: StatusReceiver,
}

impl StatusFeed {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    /// A sender the launcher keeps to report status changes.
    pub fn sender(&self) -> StatusSender {
        self.sender.clone()
    }

    /// Consume the feed, keeping only the receiving half.
    pub fn into_receiver(self) -> StatusReceiver {
        self.receiver
    }
}

impl Default for StatusFeed {
    fn default() -> Self {
        Self::new()
    }
}
