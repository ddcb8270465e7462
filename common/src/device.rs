// Device-control collaborator: gateway sessions and command batches

use crate::errors::DeviceError;
use crate::models::DeviceCommand;
use crate::retry::{FixedDelay, RetryStrategy};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Connection factory for the device gateway.
///
/// Each fired job opens its own session so concurrently firing jobs never
/// share connection state.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DeviceSession>, DeviceError>;
}

/// One live gateway session.
///
/// `send` ships an ordered command batch; the gateway applies it
/// asynchronously on the radio side.
#[async_trait]
pub trait DeviceSession: Send + Sync + std::fmt::Debug {
    async fn send(&self, batch: &[DeviceCommand]) -> Result<(), DeviceError>;
}

/// Configuration for the HTTP bridge client.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub endpoint: String,
    pub api_key: String,
    pub request_timeout_seconds: u64,
    /// Retries for transient failures within one send.
    pub send_retries: u32,
}

/// HTTP bridge client for the device gateway.
pub struct HttpDeviceGateway {
    client: reqwest::Client,
    config: HttpGatewayConfig,
}

impl HttpDeviceGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, DeviceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                DeviceError::ConnectFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl DeviceGateway for HttpDeviceGateway {
    /// The bridge itself is stateless over HTTP; connect probes the status
    /// endpoint so an unreachable gateway fails the job before any command
    /// is attempted.
    async fn connect(&self) -> Result<Box<dyn DeviceSession>, DeviceError> {
        let url = format!("{}/status", self.config.endpoint);
        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| DeviceError::ConnectFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeviceError::ConnectFailed(format!(
                "Gateway status endpoint returned {}",
                response.status()
            )));
        }

        debug!(endpoint = %self.config.endpoint, "Gateway session opened");
        Ok(Box::new(HttpDeviceSession {
            client: self.client.clone(),
            commands_url: format!("{}/commands", self.config.endpoint),
            api_key: self.config.api_key.clone(),
            retry: FixedDelay::new(Duration::from_millis(250), self.config.send_retries),
        }))
    }
}

#[derive(Debug)]
struct HttpDeviceSession {
    client: reqwest::Client,
    commands_url: String,
    api_key: String,
    retry: FixedDelay,
}

impl HttpDeviceSession {
    async fn send_once(&self, batch: &[DeviceCommand]) -> Result<(), DeviceError> {
        let response = self
            .client
            .post(&self.commands_url)
            .header("X-Api-Key", &self.api_key)
            .json(batch)
            .send()
            .await
            .map_err(|e| DeviceError::SendFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeviceError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    /// Network errors and gateway-side 5xx responses are worth retrying;
    /// a 4xx means the batch itself is bad and will not get better.
    fn is_transient(error: &DeviceError) -> bool {
        match error {
            DeviceError::SendFailed(_) => true,
            DeviceError::Rejected { status, .. } => *status >= 500,
            DeviceError::ConnectFailed(_) => false,
        }
    }
}

#[async_trait]
impl DeviceSession for HttpDeviceSession {
    async fn send(&self, batch: &[DeviceCommand]) -> Result<(), DeviceError> {
        let mut attempt = 0;
        loop {
            match self.send_once(batch).await {
                Ok(()) => return Ok(()),
                Err(e) if Self::is_transient(&e) => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        warn!(
                            error = %e,
                            attempt = attempt + 1,
                            "Transient gateway failure, retrying send"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }
}
