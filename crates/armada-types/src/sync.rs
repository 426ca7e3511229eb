//! Config-sync messages exchanged on the shared broadcast channel.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncAction {
    /// Ask every peer to advertise its local robot configs.
    RequestConfig,
    /// Carry the sender's serialised local robot configs.
    AdvertiseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub action: SyncAction,
    pub sender_namespace: String,
    /// `Robots:` YAML document for adverts, empty for requests.
    #[serde(default)]
    pub payload: String,
}

impl SyncMessage {
    pub fn request(sender_namespace: impl Into<String>) -> Self {
        Self {
            action: SyncAction::RequestConfig,
            sender_namespace: sender_namespace.into(),
            payload: String::new(),
        }
    }

    pub fn advertise(sender_namespace: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            action: SyncAction::AdvertiseConfig,
            sender_namespace: sender_namespace.into(),
            payload: payload.into(),
        }
    }
}
