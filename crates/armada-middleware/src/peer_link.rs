//! Coordinator-to-coordinator link over WebSocket.
//!
//! Every frame is one JSON text message carrying a [`PeerFrame`]:
//!
//! | Frame | Direction | Meaning |
//! |---|---|---|
//! | `request` | caller → owner | forwarded [`ServiceRequest`] |
//! | `reply` | owner → caller | the owner's result, success or failure |
//! | `sync` | any → any | a config-sync message for the receiver's bus |
//!
//! [`PeerServer`] accepts connections and dispatches frames;
//! [`WsPeerTransport`] opens one connection per forwarded request;
//! [`spawn_sync_relay`] pushes this coordinator's own sync messages to every
//! peer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use armada_types::{FleetError, PeerFrame, ServiceReply, ServiceRequest, ServiceResponse};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_async, connect_async};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bus::SyncBus;
use crate::transport::{PeerTransport, ServiceHandler};

type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn encode(frame: &PeerFrame) -> Result<Message, FleetError> {
    let json = serde_json::to_string(frame).map_err(|e| FleetError::Serialization(e.to_string()))?;
    Ok(Message::Text(json.into()))
}

fn transport_error(namespace: &str, details: impl Into<String>) -> FleetError {
    FleetError::TransportFailed {
        namespace: namespace.to_string(),
        details: details.into(),
    }
}

async fn open(namespace: &str, url: &str, timeout: Duration) -> Result<ClientStream, FleetError> {
    match tokio::time::timeout(timeout, connect_async(url)).await {
        Ok(Ok((stream, _))) => Ok(stream),
        Ok(Err(e)) => Err(transport_error(namespace, format!("connect to {url}: {e}"))),
        Err(_) => Err(transport_error(namespace, format!("connect to {url} timed out"))),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client side
// ────────────────────────────────────────────────────────────────────────────

/// Forwards requests to peers listed by namespace → `ws://` URL.
pub struct WsPeerTransport {
    peers: HashMap<String, String>,
    timeout: Duration,
}

impl WsPeerTransport {
    pub fn new(peers: HashMap<String, String>, timeout: Duration) -> Self {
        Self { peers, timeout }
    }

    pub fn peer_urls(&self) -> Vec<String> {
        self.peers.values().cloned().collect()
    }

    async fn exchange(&self, namespace: &str, url: &str, request: ServiceRequest) -> Result<ServiceReply, FleetError> {
        let mut stream = open(namespace, url, self.timeout).await?;
        let id = Uuid::new_v4();
        stream
            .send(encode(&PeerFrame::Request { id, request })?)
            .await
            .map_err(|e| transport_error(namespace, format!("send: {e}")))?;

        while let Some(message) = stream.next().await {
            let message = message.map_err(|e| transport_error(namespace, format!("receive: {e}")))?;
            let Message::Text(text) = message else {
                continue;
            };
            match serde_json::from_str::<PeerFrame>(text.as_str()) {
                Ok(PeerFrame::Reply { id: reply_id, reply }) if reply_id == id => {
                    let _ = stream.close(None).await;
                    return Ok(reply);
                }
                Ok(_) => continue,
                Err(e) => warn!(namespace, error = %e, "ignoring malformed peer frame"),
            }
        }
        Err(transport_error(namespace, "connection closed before reply"))
    }
}

#[async_trait]
impl PeerTransport for WsPeerTransport {
    async fn call(&self, namespace: &str, request: ServiceRequest) -> Result<ServiceResponse, FleetError> {
        let url = self
            .peers
            .get(namespace)
            .ok_or_else(|| transport_error(namespace, "no peer address configured"))?;
        debug!(namespace, url = %url, endpoint = request.endpoint(), "forwarding over websocket");
        let reply = tokio::time::timeout(self.timeout, self.exchange(namespace, url, request))
            .await
            .map_err(|_| transport_error(namespace, format!("no reply within {:?}", self.timeout)))??;
        reply.into_result()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Server side
// ────────────────────────────────────────────────────────────────────────────

/// Accepts peer connections: requests go to the handler, sync frames to the
/// bus.
#[derive(Clone)]
pub struct PeerServer {
    handler: Arc<dyn ServiceHandler>,
    bus: SyncBus,
}

impl PeerServer {
    pub fn new(handler: Arc<dyn ServiceHandler>, bus: SyncBus) -> Self {
        Self { handler, bus }
    }

    /// Bind `addr` and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// [`FleetError::TransportFailed`] if the listener cannot be bound.
    pub async fn serve(self, addr: SocketAddr) -> Result<(), FleetError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| transport_error(&addr.to_string(), format!("bind: {e}")))?;
        info!(addr = %addr, "peer server listening");
        self.run(listener).await;
        Ok(())
    }

    /// Serve connections from an already bound listener.
    pub async fn run(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_client(stream, peer).await {
                            error!(peer = %peer, error = %e, "peer connection error");
                        }
                    });
                }
                Err(e) => error!(error = %e, "peer accept error"),
            }
        }
    }

    async fn handle_client(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), FleetError> {
        let mut ws = accept_async(stream)
            .await
            .map_err(|e| transport_error(&peer.to_string(), format!("handshake: {e}")))?;

        while let Some(message) = ws.next().await {
            let text = match message {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            };
            let frame = match serde_json::from_str::<PeerFrame>(text.as_str()) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(peer = %peer, error = %e, "ignoring malformed peer frame");
                    continue;
                }
            };
            match frame {
                PeerFrame::Request { id, request } => {
                    debug!(peer = %peer, endpoint = request.endpoint(), robot = request.robot_name(), "serving forwarded request");
                    let reply = ServiceReply::from(self.handler.handle(request).await);
                    if ws.send(encode(&PeerFrame::Reply { id, reply })?).await.is_err() {
                        break;
                    }
                }
                PeerFrame::Sync { message } => {
                    self.bus.publish(message);
                }
                PeerFrame::Reply { .. } => {}
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sync relay
// ────────────────────────────────────────────────────────────────────────────

/// Push every sync message that `own_namespace` publishes on `bus` to all
/// `peer_urls`. Messages from other senders stay local.
pub fn spawn_sync_relay(
    bus: &SyncBus,
    own_namespace: impl Into<String>,
    peer_urls: Vec<String>,
    timeout: Duration,
) -> JoinHandle<()> {
    let own_namespace = own_namespace.into();
    let mut subscriber = bus.subscribe();
    tokio::spawn(async move {
        while let Some(message) = subscriber.recv().await {
            if message.sender_namespace != own_namespace {
                continue;
            }
            let frame = match encode(&PeerFrame::Sync { message }) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "cannot encode sync frame");
                    continue;
                }
            };
            for url in &peer_urls {
                if let Err(e) = push(url, frame.clone(), timeout).await {
                    warn!(url = %url, error = %e, "sync relay push failed");
                }
            }
        }
    })
}

async fn push(url: &str, frame: Message, timeout: Duration) -> Result<(), FleetError> {
    let mut stream = open(url, url, timeout).await?;
    stream
        .send(frame)
        .await
        .map_err(|e| transport_error(url, format!("send: {e}")))?;
    let _ = stream.close(None).await;
    Ok(())
}
