//! Conversation lifecycle: owns the history load, the live channel, and the
//! message log for whichever peer is currently open.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::client::ApiClient;
use crate::api::models::{ChatMessage, UserSummary};
use crate::auth::TokenStore;
use crate::channel::{ChannelState, LiveChannel};
use crate::error::ChatError;
use crate::reconciler::MessageLog;

/// Controller for one user's chat view. At most one conversation is open at
/// a time; switching peers always tears the previous channel down before
/// anything about the new conversation starts.
///
/// Construction spawns the delivery drain task, so a `ChatSession` must be
/// created inside a tokio runtime.
pub struct ChatSession {
    current_user_id: i64,
    api: ApiClient,
    tokens: Arc<dyn TokenStore>,
    channel: Mutex<LiveChannel>,
    log: Arc<Mutex<MessageLog>>,
    active_peer: Arc<Mutex<Option<i64>>>,
    /// Bumped on every open/close so a history response that raced a
    /// conversation switch can be recognized as stale.
    epoch: AtomicU64,
    drain: JoinHandle<()>,
}

impl ChatSession {
    pub fn new(base_url: &str, current_user_id: i64, tokens: Arc<dyn TokenStore>) -> Self {
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
        let log = Arc::new(Mutex::new(MessageLog::new()));
        let active_peer = Arc::new(Mutex::new(None));
        let drain = tokio::spawn(drain_deliveries(delivery_rx, log.clone(), active_peer.clone()));
        Self {
            current_user_id,
            api: ApiClient::new(base_url),
            tokens,
            channel: Mutex::new(LiveChannel::new(base_url, current_user_id, delivery_tx)),
            log,
            active_peer,
            epoch: AtomicU64::new(0),
            drain,
        }
    }

    pub fn current_user_id(&self) -> i64 {
        self.current_user_id
    }

    pub fn active_peer(&self) -> Option<i64> {
        *self.active_peer.lock().unwrap()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.lock().unwrap().state()
    }

    /// Snapshot of the open conversation for rendering.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.log.lock().unwrap().snapshot()
    }

    /// Open the conversation with `peer_id`: load history first, then bring
    /// the live channel up, so the initial view always contains the full
    /// known backlog before any push can arrive.
    pub async fn open_conversation(&self, peer_id: i64) {
        if peer_id <= 0 {
            warn!("ignoring open_conversation with invalid peer id {peer_id}");
            return;
        }
        // Switch = close-then-open, never open-over-open.
        self.channel.lock().unwrap().disconnect();
        self.log.lock().unwrap().clear();
        *self.active_peer.lock().unwrap() = Some(peer_id);
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let token = self.token_or_empty();
        let history = self.api.chat_history(self.current_user_id, peer_id, &token).await;

        // The user may have switched again while the fetch was in flight;
        // seeding now would overwrite the newer conversation.
        if self.epoch.load(Ordering::SeqCst) != epoch
            || *self.active_peer.lock().unwrap() != Some(peer_id)
        {
            debug!("discarding stale history response for peer {peer_id}");
            return;
        }
        self.log.lock().unwrap().seed(history);
        self.channel.lock().unwrap().connect(&token);
    }

    /// Tear down the open conversation. Safe with none open; the message
    /// log is discarded, not reused.
    pub fn close_conversation(&self) {
        self.channel.lock().unwrap().disconnect();
        *self.active_peer.lock().unwrap() = None;
        self.log.lock().unwrap().clear();
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Append the send locally, then transmit — the view never waits on the
    /// network for its own echo. Rejected without touching anything when the
    /// content is blank, no conversation is open, or the channel is down;
    /// whatever the user typed stays in the input widget either way.
    pub fn send_message(&self, content: &str) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        let Some(peer_id) = *self.active_peer.lock().unwrap() else {
            warn!("send_message with no open conversation, dropped");
            return;
        };
        if self.channel_state() != ChannelState::Connected {
            warn!("send_message while live channel is offline, dropped");
            return;
        }
        let outgoing = ChatMessage::outgoing(self.current_user_id, peer_id, content);
        let mut optimistic = outgoing.clone();
        // Local stamp so the echo-suppression window has something to
        // compare against; the wire payload stays unstamped.
        optimistic.timestamp = Some(crate::utils::now_timestamp());
        self.log.lock().unwrap().append_optimistic(optimistic);
        self.channel.lock().unwrap().send(outgoing);
    }

    /// Remote delete, then local removal. On failure the entry stays
    /// visible and the error propagates — the user must see the delete did
    /// not take effect.
    pub async fn delete_message(&self, id: i64) -> Result<(), ChatError> {
        let token = self.tokens.bearer_token().ok_or(ChatError::MissingToken)?;
        self.api.delete_message(id, &token).await?;
        self.log.lock().unwrap().remove(id);
        Ok(())
    }

    /// The users this account can open a conversation with.
    pub async fn conversation_partners(&self) -> Result<Vec<UserSummary>, ChatError> {
        let token = self.tokens.bearer_token().ok_or(ChatError::MissingToken)?;
        self.api.conversation_partners(self.current_user_id, &token).await
    }

    fn token_or_empty(&self) -> String {
        match self.tokens.bearer_token() {
            Some(token) => token,
            None => {
                warn!("no bearer token available, proceeding unauthenticated");
                String::new()
            }
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Ok(mut channel) = self.channel.lock() {
            channel.disconnect();
        }
        self.drain.abort();
    }
}

/// Inbox pushes are user-wide; only deliveries involving the selected peer
/// belong in the open conversation's view.
async fn drain_deliveries(
    mut rx: mpsc::UnboundedReceiver<ChatMessage>,
    log: Arc<Mutex<MessageLog>>,
    active_peer: Arc<Mutex<Option<i64>>>,
) {
    while let Some(message) = rx.recv().await {
        let peer = *active_peer.lock().unwrap();
        let Some(peer) = peer else {
            debug!("delivery with no open conversation, dropped");
            continue;
        };
        if !message.involves(peer) {
            debug!("delivery for another conversation, dropped from this view");
            continue;
        }
        log.lock().unwrap().merge_incoming(message);
    }
}
