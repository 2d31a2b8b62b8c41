//! Client core for LinkUp's real-time messaging: per-conversation live
//! channel, history loading, and reconciliation of history, optimistic
//! sends, and push deliveries into one duplicate-free view.
//!
//! The crate renders nothing. A front end embeds [`ChatSession`], drives it
//! from its event loop, and reads [`ChatSession::messages`] and
//! [`ChatSession::channel_state`] for display.

pub mod api;
pub mod auth;
pub mod channel;
pub mod error;
pub mod reconciler;
pub mod session;
pub mod utils;

pub use api::client::ApiClient;
pub use api::models::{ChatMessage, UserSummary};
pub use auth::{user_id_from_token, AuthState, FileTokenStore, StaticTokenStore, TokenStore};
pub use channel::{ChannelState, LiveChannel};
pub use error::ChatError;
pub use reconciler::{is_duplicate, MessageLog, DEDUP_TOLERANCE_MS};
pub use session::ChatSession;
