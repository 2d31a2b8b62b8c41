//! The live push connection: one bidirectional socket per controller,
//! subscribed to the user's inbox topic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as SocketFrame;
use url::Url;

use crate::api::events::{inbox_destination, Frame, Publish, Subscribe, SEND_DESTINATION};
use crate::api::models::ChatMessage;
use crate::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

struct ChannelShared {
    state: Mutex<ChannelState>,
    /// Bumped on every connect and disconnect. A task spawned under an
    /// older epoch may neither mutate state nor deliver frames.
    epoch: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
}

/// One live connection per controller instance. `connect` is idempotent,
/// `disconnect` tears down whatever exists, and a superseded connection can
/// never resurrect state it no longer owns.
pub struct LiveChannel {
    base_url: String,
    user_id: i64,
    shared: Arc<ChannelShared>,
    delivery_tx: mpsc::UnboundedSender<ChatMessage>,
    worker: Option<JoinHandle<()>>,
}

impl LiveChannel {
    /// `delivery_tx` receives every inbox push; the session controller owns
    /// the other end and decides what belongs in the open conversation.
    pub fn new(base_url: &str, user_id: i64, delivery_tx: mpsc::UnboundedSender<ChatMessage>) -> Self {
        Self {
            base_url: crate::utils::normalize_url(base_url),
            user_id,
            shared: Arc::new(ChannelShared {
                state: Mutex::new(ChannelState::Disconnected),
                epoch: AtomicU64::new(0),
                outbound: Mutex::new(None),
            }),
            delivery_tx,
            worker: None,
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.lock().unwrap()
    }

    /// Open the connection and subscribe to the inbox topic. No-op when
    /// already connected — calling this twice must not leave two live
    /// subscriptions behind. Resolution is asynchronous: completion or
    /// failure shows up in [`state`](Self::state), not a return value.
    pub fn connect(&mut self, token: &str) {
        if self.state() == ChannelState::Connected {
            debug!("live channel already connected, keeping existing subscription");
            return;
        }
        self.disconnect();
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        *self.shared.state.lock().unwrap() = ChannelState::Connecting;

        let endpoint = crate::utils::ws_endpoint(&self.base_url, token);
        let user_id = self.user_id;
        let shared = self.shared.clone();
        let delivery_tx = self.delivery_tx.clone();
        self.worker = Some(tokio::spawn(async move {
            if let Err(e) = run_connection(&endpoint, user_id, epoch, &shared, &delivery_tx).await {
                warn!("live channel for user {user_id} failed: {e}");
            }
            // Only the epoch that owns the connection may declare it dead.
            if shared.epoch.load(Ordering::SeqCst) == epoch {
                *shared.state.lock().unwrap() = ChannelState::Disconnected;
                shared.outbound.lock().unwrap().take();
            }
        }));
    }

    /// Fire-and-forget transmit. Fails fast with a logged warning when the
    /// channel is not connected; delivery durability is the backend's job.
    pub fn send(&self, message: ChatMessage) {
        if self.state() != ChannelState::Connected {
            warn!("dropping send, live channel is not connected");
            return;
        }
        let frame = Frame::Send(Publish {
            destination: SEND_DESTINATION.to_string(),
            message,
        });
        let guard = self.shared.outbound.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(frame).is_err() {
                    warn!("live channel writer is gone, send dropped");
                }
            }
            None => warn!("dropping send, live channel is not connected"),
        }
    }

    /// Tear down the connection if one exists. Safe to call repeatedly and
    /// required before connecting on behalf of a different conversation.
    pub fn disconnect(&mut self) {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.outbound.lock().unwrap().take();
        *self.shared.state.lock().unwrap() = ChannelState::Disconnected;
        if let Some(worker) = self.worker.take() {
            worker.abort();
            info!("live channel for user {} disconnected", self.user_id);
        }
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn run_connection(
    endpoint: &str,
    user_id: i64,
    epoch: u64,
    shared: &Arc<ChannelShared>,
    delivery_tx: &mpsc::UnboundedSender<ChatMessage>,
) -> Result<(), ChatError> {
    Url::parse(endpoint)?;
    let (stream, _) = connect_async(endpoint).await?;
    let (mut sink, mut source) = stream.split();

    // Logical handshake on top of the socket: connect, wait for the
    // server's ack, then subscribe to the inbox.
    sink.send(frame_text(&Frame::Connect)?).await?;
    loop {
        match source.next().await {
            Some(Ok(SocketFrame::Text(text))) => {
                if matches!(serde_json::from_str::<Frame>(&text), Ok(Frame::Connected)) {
                    break;
                }
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => return Err(ChatError::HandshakeClosed),
        }
    }
    sink.send(frame_text(&Frame::Subscribe(Subscribe {
        destination: inbox_destination(user_id),
    }))?)
    .await?;

    if shared.epoch.load(Ordering::SeqCst) != epoch {
        return Ok(()); // superseded while handshaking, drop the socket
    }
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
    *shared.outbound.lock().unwrap() = Some(outbound_tx);
    *shared.state.lock().unwrap() = ChannelState::Connected;
    info!("live channel connected for user {user_id}");

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => match frame {
                Some(frame) => sink.send(frame_text(&frame)?).await?,
                None => break, // writer taken away by disconnect
            },
            incoming = source.next() => match incoming {
                Some(Ok(SocketFrame::Text(text))) => {
                    if shared.epoch.load(Ordering::SeqCst) != epoch {
                        break;
                    }
                    dispatch_text(&text, delivery_tx);
                }
                Some(Ok(SocketFrame::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
        }
    }
    Ok(())
}

fn dispatch_text(text: &str, delivery_tx: &mpsc::UnboundedSender<ChatMessage>) {
    match serde_json::from_str::<Frame>(text) {
        Ok(Frame::Message(delivery)) => {
            let _ = delivery_tx.send(delivery.message);
        }
        Ok(Frame::Error(fault)) => warn!("live channel fault: {}", fault.message),
        Ok(other) => debug!("ignoring channel frame: {other:?}"),
        Err(e) => warn!("undecodable channel frame: {e}"),
    }
}

fn frame_text(frame: &Frame) -> Result<SocketFrame, ChatError> {
    Ok(SocketFrame::Text(serde_json::to_string(frame)?))
}
