use log::warn;
use reqwest::{Client as HttpClient, StatusCode};

use crate::api::models::{ChatMessage, UserSummary};
use crate::error::ChatError;

/// REST side of the chat backend. Push delivery is the live channel's job;
/// everything request/response shaped goes through here.
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: crate::utils::normalize_url(base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_v1(&self) -> String {
        let trimmed = self.base_url.trim_end_matches('/');
        if trimmed.ends_with("/api/v1") {
            trimmed.to_string()
        } else {
            format!("{}/api/v1", trimmed)
        }
    }

    fn bearer(req: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {token}"))
    }

    /// Prior messages of one conversation, oldest first as the backend
    /// returns them. Degrades to an empty history on any failure so the
    /// conversation can always open; 404 just means nothing has been said
    /// yet.
    pub async fn chat_history(&self, current_user_id: i64, peer_id: i64, token: &str) -> Vec<ChatMessage> {
        let endpoint = format!("{}/{}/messages/chat/{}", self.api_v1(), current_user_id, peer_id);
        let resp = match Self::bearer(self.http.get(&endpoint), token).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("history fetch for peer {peer_id} failed: {e}");
                return Vec::new();
            }
        };
        if resp.status() == StatusCode::NOT_FOUND {
            return Vec::new();
        }
        if !resp.status().is_success() {
            warn!("history fetch for peer {} returned {}", peer_id, resp.status());
            return Vec::new();
        }
        match resp.json::<Vec<ChatMessage>>().await {
            Ok(messages) => messages,
            Err(e) => {
                warn!("history body for peer {peer_id} did not parse: {e}");
                Vec::new()
            }
        }
    }

    /// Users this account has an open conversation with. Unlike history,
    /// failures here surface to the caller — the overview screen shows an
    /// error state instead of an empty list.
    pub async fn conversation_partners(
        &self,
        current_user_id: i64,
        token: &str,
    ) -> Result<Vec<UserSummary>, ChatError> {
        let endpoint = format!("{}/{}/messages", self.api_v1(), current_user_id);
        let resp = Self::bearer(self.http.get(&endpoint), token).send().await?;
        if !resp.status().is_success() {
            return Err(ChatError::Status(resp.status()));
        }
        Ok(resp.json::<Vec<UserSummary>>().await?)
    }

    /// Remote delete for one persisted message. The local view must only be
    /// updated after this returns Ok.
    pub async fn delete_message(&self, id: i64, token: &str) -> Result<(), ChatError> {
        let endpoint = format!("{}/messages/delete/{}", self.api_v1(), id);
        let resp = Self::bearer(self.http.delete(&endpoint), token).send().await?;
        if !resp.status().is_success() {
            return Err(ChatError::Status(resp.status()));
        }
        Ok(())
    }
}
