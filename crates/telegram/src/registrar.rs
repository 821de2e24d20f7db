use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::api::BotApi;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    Webhook,
    Polling,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Polling => "polling",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, delay_ms: 5_000 }
    }
}

impl RetryPolicy {
    fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Registers the callback URL with the platform, downgrading to polling once
/// the attempt budget is spent. The downgrade is permanent.
pub struct WebhookRegistrar {
    api: Arc<dyn BotApi>,
    policy: RetryPolicy,
    webhook_url: SecretString,
    redacted_url: String,
    polling: AtomicBool,
}

impl WebhookRegistrar {
    pub fn new(
        api: Arc<dyn BotApi>,
        policy: RetryPolicy,
        webhook_url: SecretString,
        redacted_url: impl Into<String>,
    ) -> Self {
        Self {
            api,
            policy,
            webhook_url,
            redacted_url: redacted_url.into(),
            polling: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        if self.polling.load(Ordering::Acquire) {
            DeliveryMode::Polling
        } else {
            DeliveryMode::Webhook
        }
    }

    pub async fn register(&self) -> DeliveryMode {
        if self.mode() == DeliveryMode::Polling {
            return DeliveryMode::Polling;
        }

        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.api.set_webhook(self.webhook_url.expose_secret()).await {
                Ok(()) => {
                    info!(
                        event_name = "system.webhook.registered",
                        correlation_id = "bootstrap",
                        attempt,
                        url = %self.redacted_url,
                        "webhook registered"
                    );
                    return DeliveryMode::Webhook;
                }
                Err(error) => {
                    warn!(
                        event_name = "system.webhook.registration_failed",
                        correlation_id = "bootstrap",
                        attempt,
                        max_attempts,
                        error = %error,
                        "webhook registration attempt failed"
                    );

                    if attempt < max_attempts {
                        let delay = self.policy.delay();
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        self.polling.store(true, Ordering::Release);
        warn!(
            event_name = "system.webhook.fallback_to_polling",
            correlation_id = "bootstrap",
            max_attempts,
            "webhook retries exhausted; switching to polling"
        );
        DeliveryMode::Polling
    }
}
