use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use axum::async_trait;
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::MeetingStore;

/// Call-control collaborator: issues the tenant-scoped "leave call"
/// command. Retry policy belongs to the implementation, not this crate.
#[async_trait]
pub trait CallControl: Send + Sync {
    async fn leave_call(&self, tenant_id: &str, call_id: &str) -> Result<()>;
}

/// Best-effort after-meeting signal to a user, typically the organizer.
#[async_trait]
pub trait AfterMeetingNotifier: Send + Sync {
    async fn notify(&self, user_id: &str, meeting_id: &str) -> Result<()>;
}

/// Leaves calls by deleting the call resource on the graph endpoint.
pub struct GraphCallControl {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GraphCallControl {
    pub fn new(client: Client, base_url: String, token: Option<String>) -> Self {
        Self {
            client,
            base_url,
            token,
        }
    }
}

#[async_trait]
impl CallControl for GraphCallControl {
    async fn leave_call(&self, tenant_id: &str, call_id: &str) -> Result<()> {
        let url = format!(
            "{}/communications/calls/{}",
            self.base_url.trim_end_matches('/'),
            call_id
        );
        let mut request = self.client.delete(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("leave call failed: status {}", response.status()));
        }
        info!(%call_id, %tenant_id, "left call");
        Ok(())
    }
}

/// Posts the after-meeting signal to a configured callback endpoint. With
/// no endpoint configured the signal is log-only.
pub struct WebhookNotifier {
    client: Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: Option<String>) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl AfterMeetingNotifier for WebhookNotifier {
    async fn notify(&self, user_id: &str, meeting_id: &str) -> Result<()> {
        let Some(url) = &self.url else {
            debug!(%user_id, %meeting_id, "no after-meeting endpoint configured");
            return Ok(());
        };
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "userId": user_id, "meetingId": meeting_id }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "after-meeting signal failed: status {}",
                response.status()
            ));
        }
        Ok(())
    }
}

/// Debounced auto-leave: when the bot is detected alone, wait out the
/// delay and issue the leave command only if the meeting is still down to
/// one participant. A rejoin during the window aborts the leave.
#[derive(Clone)]
pub struct AutoLeaveScheduler {
    store: MeetingStore,
    call_control: Arc<dyn CallControl>,
    delay: Duration,
}

impl AutoLeaveScheduler {
    pub fn new(store: MeetingStore, call_control: Arc<dyn CallControl>, delay: Duration) -> Self {
        Self {
            store,
            call_control,
            delay,
        }
    }

    pub fn schedule(&self, call_id: String, tenant_id: String) -> JoinHandle<()> {
        let store = self.store.clone();
        let call_control = self.call_control.clone();
        let delay = self.delay;
        info!(%call_id, delay_secs = delay.as_secs(), "bot alone in meeting; scheduling leave check");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let still_alone = store
                .get_by_call_id(&call_id)
                .map(|m| m.active_participants == 1)
                .unwrap_or(false);
            if !still_alone {
                info!(%call_id, "aborting auto-leave");
                return;
            }

            if let Err(err) = call_control.leave_call(&tenant_id, &call_id).await {
                warn!(%call_id, error = %err, "unable to leave call");
            }
        })
    }
}
