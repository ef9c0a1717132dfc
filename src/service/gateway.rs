//! External collaborators: the chat bot gateway that delivers notifications,
//! opens match threads and applies role markers.
//!
//! The ladder core only ever talks to the three traits below. Calls happen after
//! the ladder state is committed, so a failing collaborator can never undo a
//! result; callers turn failures into warnings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Mode, PlayerId};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Retry limit exceeded")]
    RetryLimitExceeded,
}

/// Delivers a direct message to a player
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, player: &PlayerId, message: &str) -> Result<(), GatewayError>;
}

/// Opens the discussion space for a new match and returns its reference
#[async_trait]
pub trait MatchSpaceProvisioner: Send + Sync {
    async fn open_thread(
        &self,
        mode: Mode,
        participants: &[PlayerId; 2],
        maps: &[String],
    ) -> Result<String, GatewayError>;
}

/// Assigns and removes external role markers
#[async_trait]
pub trait RoleGrantor: Send + Sync {
    async fn grant_role(&self, player: &PlayerId, marker: &str) -> Result<(), GatewayError>;
    async fn revoke_role(&self, player: &PlayerId, marker: &str) -> Result<(), GatewayError>;
}

/// The collaborator set shared by the ladder services
#[derive(Clone)]
pub struct Collaborators {
    pub notifications: Arc<dyn NotificationSink>,
    pub provisioner: Arc<dyn MatchSpaceProvisioner>,
    pub roles: Arc<dyn RoleGrantor>,
}

impl Collaborators {
    /// Uses one gateway for all three roles
    pub fn from_gateway<G>(gateway: Arc<G>) -> Self
    where
        G: NotificationSink + MatchSpaceProvisioner + RoleGrantor + 'static,
    {
        Self {
            notifications: gateway.clone(),
            provisioner: gateway.clone(),
            roles: gateway,
        }
    }

    /// Notifies a player, returning a warning line instead of an error
    pub async fn notify(&self, player: &PlayerId, message: &str) -> Option<String> {
        match self.notifications.notify(player, message).await {
            Ok(()) => None,
            Err(e) => {
                warn!(player = %player, error = %e, "Failed to notify player");
                Some(format!("could not notify {}: {}", player, e))
            }
        }
    }
}

// =============================================================================
// HTTP GATEWAY
// =============================================================================

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum GatewayRequest<'a> {
    Notify {
        player: &'a PlayerId,
        message: &'a str,
    },
    OpenThread {
        mode: Mode,
        participants: &'a [PlayerId; 2],
        maps: &'a [String],
    },
    GrantRole {
        player: &'a PlayerId,
        marker: &'a str,
    },
    RevokeRole {
        player: &'a PlayerId,
        marker: &'a str,
    },
}

#[derive(Debug, Deserialize)]
struct ThreadResponse {
    thread_id: String,
}

/// Talks to the chat bot over JSON/HTTP
#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
    retry_config: RetryConfig,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        Self::with_retry_config(base_url, timeout, RetryConfig::default())
    }

    pub fn with_retry_config(
        base_url: impl Into<String>,
        timeout: Duration,
        retry_config: RetryConfig,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            retry_config,
        })
    }

    /// POSTs a request, retrying transport errors and 5xx responses with exponential backoff
    async fn call(&self, request: &GatewayRequest<'_>) -> Result<String, GatewayError> {
        let url = format!("{}/ladder/events", self.base_url);
        let mut delay = self.retry_config.initial_delay_ms;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let failure = match self.client.post(&url).json(request).send().await {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await?;
                    if status.is_success() {
                        return Ok(text);
                    }
                    if status.is_client_error() {
                        return Err(GatewayError::RequestFailed(format!("HTTP {}: {}", status, text)));
                    }
                    format!("HTTP {}", status)
                }
                Err(e) => e.to_string(),
            };

            if attempt > self.retry_config.max_retries {
                warn!(attempts = attempt, error = %failure, "Gateway retry limit exceeded");
                return Err(GatewayError::RetryLimitExceeded);
            }

            debug!(attempt, delay_ms = delay, error = %failure, "Waiting before retry");
            tokio::time::sleep(Duration::from_millis(delay)).await;

            delay = (delay as f64 * self.retry_config.backoff_multiplier) as u64;
            delay = delay.min(self.retry_config.max_delay_ms);
        }
    }
}

#[async_trait]
impl NotificationSink for HttpGateway {
    async fn notify(&self, player: &PlayerId, message: &str) -> Result<(), GatewayError> {
        self.call(&GatewayRequest::Notify { player, message }).await?;
        Ok(())
    }
}

#[async_trait]
impl MatchSpaceProvisioner for HttpGateway {
    async fn open_thread(
        &self,
        mode: Mode,
        participants: &[PlayerId; 2],
        maps: &[String],
    ) -> Result<String, GatewayError> {
        let body = self
            .call(&GatewayRequest::OpenThread {
                mode,
                participants,
                maps,
            })
            .await?;
        let response: ThreadResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(response.thread_id)
    }
}

#[async_trait]
impl RoleGrantor for HttpGateway {
    async fn grant_role(&self, player: &PlayerId, marker: &str) -> Result<(), GatewayError> {
        self.call(&GatewayRequest::GrantRole { player, marker }).await?;
        Ok(())
    }

    async fn revoke_role(&self, player: &PlayerId, marker: &str) -> Result<(), GatewayError> {
        self.call(&GatewayRequest::RevokeRole { player, marker }).await?;
        Ok(())
    }
}

// =============================================================================
// LOG GATEWAY
// =============================================================================

/// Stand-in used when no bot gateway is configured: every call is logged and succeeds
#[derive(Debug, Default, Clone)]
pub struct LogGateway;

#[async_trait]
impl NotificationSink for LogGateway {
    async fn notify(&self, player: &PlayerId, message: &str) -> Result<(), GatewayError> {
        info!(player = %player, message, "Notification");
        Ok(())
    }
}

#[async_trait]
impl MatchSpaceProvisioner for LogGateway {
    async fn open_thread(
        &self,
        mode: Mode,
        participants: &[PlayerId; 2],
        maps: &[String],
    ) -> Result<String, GatewayError> {
        info!(
            mode = %mode,
            player1 = %participants[0],
            player2 = %participants[1],
            maps = ?maps,
            "Match thread requested"
        );
        Ok(format!("{}-{}-vs-{}", mode, participants[0], participants[1]))
    }
}

#[async_trait]
impl RoleGrantor for LogGateway {
    async fn grant_role(&self, player: &PlayerId, marker: &str) -> Result<(), GatewayError> {
        info!(player = %player, marker, "Role granted");
        Ok(())
    }

    async fn revoke_role(&self, player: &PlayerId, marker: &str) -> Result<(), GatewayError> {
        info!(player = %player, marker, "Role revoked");
        Ok(())
    }
}
