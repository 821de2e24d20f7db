//! Self-ping that keeps an idle host from suspending the process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};
use vigil_core::{
    stats::BotStats,
    task::{ShutdownSignal, TaskHandle},
};

pub type KeepAliveHandle = TaskHandle;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("keep-alive request timed out after {0:?}")]
    Timeout(Duration),
    #[error("keep-alive request failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait KeepAliveProbe: Send + Sync {
    /// Issues one request and returns the HTTP status code of the response.
    async fn probe(&self, url: &str) -> Result<u16, ProbeError>;
}

pub struct HttpProbe {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vigil-keepalive/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { http, timeout })
    }
}

#[async_trait]
impl KeepAliveProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<u16, ProbeError> {
        match self.http.get(url).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(error) if error.is_timeout() => Err(ProbeError::Timeout(self.timeout)),
            Err(error) => Err(ProbeError::Transport(error.to_string())),
        }
    }
}

pub struct KeepAlive {
    probe: Arc<dyn KeepAliveProbe>,
    stats: Arc<BotStats>,
    url: String,
    interval: Duration,
}

impl KeepAlive {
    pub fn new(
        probe: Arc<dyn KeepAliveProbe>,
        stats: Arc<BotStats>,
        url: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self { probe, stats, url: url.into(), interval }
    }

    /// Any HTTP response, whatever its status, counts as a successful ping.
    pub async fn tick(&self) -> Result<u16, ProbeError> {
        match self.probe.probe(&self.url).await {
            Ok(status) => {
                self.stats.record_ping(Utc::now());
                info!(
                    event_name = "system.keepalive.ping_ok",
                    correlation_id = "keepalive",
                    status,
                    "keep-alive ping answered"
                );
                Ok(status)
            }
            Err(error) => {
                self.stats.record_error();
                warn!(
                    event_name = "system.keepalive.ping_failed",
                    correlation_id = "keepalive",
                    error = %error,
                    "keep-alive ping failed"
                );
                Err(error)
            }
        }
    }

    /// First ping fires one full interval after the call.
    pub fn spawn(self) -> KeepAliveHandle {
        TaskHandle::spawn("keepalive", move |shutdown| self.run(shutdown))
    }

    async fn run(self, mut shutdown: ShutdownSignal) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            event_name = "system.keepalive.started",
            correlation_id = "bootstrap",
            interval_secs = self.interval.as_secs(),
            "keep-alive timer started"
        );

        loop {
            tokio::select! {
                _ = shutdown.requested() => break,
                _ = ticker.tick() => {
                    let _ = self.tick().await;
                }
            }
        }

        info!(
            event_name = "system.keepalive.stopped",
            correlation_id = "shutdown",
            "keep-alive timer stopped"
        );
    }
}
