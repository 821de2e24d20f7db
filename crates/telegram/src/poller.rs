use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use vigil_core::task::{ShutdownSignal, TaskHandle};

use crate::{
    api::{ApiError, BotApi},
    dispatcher::UpdateDispatcher,
};

pub type PollerHandle = TaskHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSettings {
    pub timeout_secs: u64,
    pub retry_delay: Duration,
}

/// Long-polls `getUpdates` while the bot runs without a webhook.
pub struct UpdatePoller {
    api: Arc<dyn BotApi>,
    dispatcher: Arc<UpdateDispatcher>,
    settings: PollSettings,
}

impl UpdatePoller {
    pub fn new(
        api: Arc<dyn BotApi>,
        dispatcher: Arc<UpdateDispatcher>,
        settings: PollSettings,
    ) -> Self {
        Self { api, dispatcher, settings }
    }

    /// Fetches one batch and dispatches it in order. Returns the offset that
    /// acknowledges the batch, or `None` when nothing arrived.
    pub async fn poll_once(&self, offset: Option<i64>) -> Result<Option<i64>, ApiError> {
        let updates = self.api.get_updates(offset, self.settings.timeout_secs).await?;
        let mut next_offset = None;
        for update in &updates {
            self.dispatcher.dispatch(update).await;
            next_offset = Some(update.update_id + 1);
        }

        if let Some(next) = next_offset {
            debug!(
                event_name = "ingress.telegram.batch_polled",
                correlation_id = %format!("update-{}", next - 1),
                updates = updates.len(),
                next_offset = next,
                "dispatched polled updates"
            );
        }
        Ok(next_offset)
    }

    pub fn spawn(self) -> PollerHandle {
        TaskHandle::spawn("update-poller", move |shutdown| self.run(shutdown))
    }

    async fn run(self, mut shutdown: ShutdownSignal) {
        info!(
            event_name = "system.poller.started",
            correlation_id = "bootstrap",
            timeout_secs = self.settings.timeout_secs,
            "update poller started"
        );

        let mut offset = None;
        while !shutdown.is_requested() {
            let result = tokio::select! {
                _ = shutdown.requested() => break,
                result = self.poll_once(offset) => result,
            };

            match result {
                Ok(Some(next)) => offset = Some(next),
                Ok(None) => {}
                Err(error) => {
                    self.dispatcher.stats().record_error();
                    warn!(
                        event_name = "ingress.telegram.poll_failed",
                        correlation_id = "poller",
                        error = %error,
                        "failed to fetch updates"
                    );
                    tokio::select! {
                        _ = shutdown.requested() => break,
                        _ = tokio::time::sleep(self.settings.retry_delay) => {}
                    }
                }
            }
        }

        info!(
            event_name = "system.poller.stopped",
            correlation_id = "shutdown",
            "update poller stopped"
        );
    }
}
