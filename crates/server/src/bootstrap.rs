use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use vigil_core::config::{AppConfig, ConfigError, LoadOptions};
use vigil_core::stats::BotStats;
use vigil_core::task::{ShutdownTrigger, TaskHandle};
use vigil_telegram::{
    ApiError, BotApi, BotProfile, DeliveryMode, HttpBotApi, PollSettings, PollerHandle,
    RetryPolicy, UpdateDispatcher, UpdatePoller, WebhookRegistrar,
};

use crate::keepalive::{HttpProbe, KeepAlive, KeepAliveProbe};
use crate::routes::AppState;

/// Headroom on top of the long-poll timeout for every Bot API request.
const API_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

pub struct Application {
    pub config: AppConfig,
    pub api: Arc<dyn BotApi>,
    pub stats: Arc<BotStats>,
    pub dispatcher: Arc<UpdateDispatcher>,
    pub registrar: WebhookRegistrar,
    pub probe: Arc<dyn KeepAliveProbe>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("bot api client could not be built: {0}")]
    BotClient(#[source] ApiError),
    #[error("keep-alive client could not be built: {0}")]
    KeepAliveClient(#[source] reqwest::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Clean,
    CloseFailed,
}

impl ShutdownOutcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Clean => ExitCode::SUCCESS,
            Self::CloseFailed => ExitCode::FAILURE,
        }
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let api_timeout = Duration::from_secs(config.polling.timeout_secs) + API_TIMEOUT_MARGIN;
    let api = HttpBotApi::new(
        config.telegram.api_base_url.clone(),
        config.telegram.bot_token.clone(),
        api_timeout,
    )
    .map_err(BootstrapError::BotClient)?;

    let probe = HttpProbe::new(Duration::from_secs(config.keepalive.timeout_secs))
        .map_err(BootstrapError::KeepAliveClient)?;

    info!(
        event_name = "system.bootstrap.clients_ready",
        correlation_id = "bootstrap",
        api_base_url = %config.telegram.api_base_url,
        webhook_url = %config.redacted_webhook_url(),
        "outbound clients initialized"
    );

    Ok(Application::assemble(config, Arc::new(api), Arc::new(probe)))
}

impl Application {
    /// Wires the runtime around already-built clients.
    pub fn assemble(
        config: AppConfig,
        api: Arc<dyn BotApi>,
        probe: Arc<dyn KeepAliveProbe>,
    ) -> Self {
        let stats = Arc::new(BotStats::new());
        let dispatcher = Arc::new(UpdateDispatcher::new(
            api.clone(),
            stats.clone(),
            BotProfile::new(config.bot.hosting_label.clone()),
        ));
        let registrar = WebhookRegistrar::new(
            api.clone(),
            RetryPolicy {
                max_attempts: config.webhook.max_attempts,
                delay_ms: config.webhook.retry_delay_ms,
            },
            config.webhook_url().into(),
            config.redacted_webhook_url(),
        );

        Self { config, api, stats, dispatcher, registrar, probe }
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.dispatcher.clone(),
            self.config.bot.name.clone(),
            &self.config.telegram.bot_token,
        )
    }

    pub fn keepalive(&self) -> KeepAlive {
        KeepAlive::new(
            self.probe.clone(),
            self.stats.clone(),
            self.config.telegram.public_url.clone(),
            Duration::from_secs(self.config.keepalive.interval_secs),
        )
    }

    pub fn poller(&self) -> UpdatePoller {
        UpdatePoller::new(
            self.api.clone(),
            self.dispatcher.clone(),
            PollSettings {
                timeout_secs: self.config.polling.timeout_secs,
                retry_delay: Duration::from_millis(self.config.polling.retry_delay_ms),
            },
        )
    }

    /// Registers the webhook; after a downgrade to polling, clears any stale
    /// webhook and starts the poller.
    pub async fn start_delivery(&self) -> (DeliveryMode, Option<PollerHandle>) {
        let mode = self.registrar.register().await;
        if mode == DeliveryMode::Webhook {
            return (mode, None);
        }

        if let Err(error) = self.api.delete_webhook().await {
            self.stats.record_error();
            warn!(
                event_name = "system.webhook.delete_failed",
                correlation_id = "bootstrap",
                error = %error,
                "could not clear webhook before polling"
            );
        }

        (mode, Some(self.poller().spawn()))
    }

    /// Starts delivery and the keep-alive, then runs until `shutdown`
    /// resolves. A shutdown that arrives while webhook registration is still
    /// retrying abandons it and goes straight to [`Application::shutdown`].
    pub async fn run_until<F>(
        &self,
        server_stop: ShutdownTrigger,
        server: JoinHandle<()>,
        shutdown: F,
    ) -> ShutdownOutcome
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut tasks = Vec::new();

        let delivery = tokio::select! {
            delivery = self.start_delivery() => Some(delivery),
            () = &mut shutdown => None,
        };

        if let Some((mode, poller)) = delivery {
            tasks.extend(poller);
            if self.config.keepalive.enabled {
                tasks.push(self.keepalive().spawn());
            }

            info!(
                event_name = "system.server.started",
                correlation_id = "bootstrap",
                delivery_mode = mode.as_str(),
                keepalive = self.config.keepalive.enabled,
                port = self.config.server.port,
                "vigil-server started"
            );
            shutdown.await;
        } else {
            warn!(
                event_name = "system.server.start_interrupted",
                correlation_id = "shutdown",
                "shutdown requested before delivery was established"
            );
        }

        self.shutdown(tasks, server_stop, server).await
    }

    /// Stops background tasks, drains the HTTP server, then closes the bot
    /// client. Only the `close` call decides the outcome.
    pub async fn shutdown(
        &self,
        tasks: Vec<TaskHandle>,
        server_stop: ShutdownTrigger,
        server: JoinHandle<()>,
    ) -> ShutdownOutcome {
        info!(
            event_name = "system.server.stopping",
            correlation_id = "shutdown",
            "shutting down gracefully"
        );

        for task in tasks {
            let name = task.name();
            if let Err(join_error) = task.stop().await {
                warn!(
                    event_name = "system.shutdown.task_failed",
                    correlation_id = "shutdown",
                    task = name,
                    error = %join_error,
                    "background task did not stop cleanly"
                );
            }
        }

        server_stop.trigger();
        if let Err(join_error) = server.await {
            warn!(
                event_name = "system.shutdown.task_failed",
                correlation_id = "shutdown",
                task = "http-server",
                error = %join_error,
                "http server did not stop cleanly"
            );
        }

        match self.api.close().await {
            Ok(()) => {
                info!(
                    event_name = "system.server.stopped",
                    correlation_id = "shutdown",
                    "bot closed"
                );
                ShutdownOutcome::Clean
            }
            Err(close_error) => {
                error!(
                    event_name = "system.shutdown.close_failed",
                    correlation_id = "shutdown",
                    error = %close_error,
                    "error during shutdown"
                );
                ShutdownOutcome::CloseFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::task::JoinHandle;
    use vigil_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use vigil_core::task::{shutdown_pair, ShutdownTrigger, TaskHandle};
    use vigil_telegram::{testkit::ScriptedBotApi, ApiError, DeliveryMode};

    use super::{bootstrap, Application, ShutdownOutcome};
    use crate::keepalive::{KeepAliveProbe, ProbeError};

    struct SilentProbe;

    #[async_trait]
    impl KeepAliveProbe for SilentProbe {
        async fn probe(&self, _url: &str) -> Result<u16, ProbeError> {
            Ok(200)
        }
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.telegram.bot_token = "123456:test-token".to_owned().into();
        config.telegram.public_url = "https://vigil.example/".to_owned();
        config.webhook.retry_delay_ms = 0;
        config
    }

    fn unreachable() -> ApiError {
        ApiError::Transport { method: "setWebhook", reason: "network down".to_owned() }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_with_malformed_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                bot_token: Some("not-a-token".to_owned()),
                public_url: Some("https://vigil.example".to_owned()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("telegram.bot_token"));
    }

    #[tokio::test]
    async fn webhook_delivery_registers_token_url_and_starts_no_poller() {
        let api = Arc::new(ScriptedBotApi::default());
        let app = Application::assemble(config(), api.clone(), Arc::new(SilentProbe));

        let (mode, poller) = app.start_delivery().await;

        assert_eq!(mode, DeliveryMode::Webhook);
        assert!(poller.is_none());
        assert_eq!(api.webhook_urls().await, vec!["https://vigil.example/bot123456:test-token"]);
        assert_eq!(api.delete_webhook_calls().await, 0);
    }

    #[tokio::test]
    async fn exhausted_registration_clears_webhook_and_starts_poller() {
        let api = Arc::new(ScriptedBotApi::default());
        api.script_set_webhook(vec![Err(unreachable()), Err(unreachable()), Err(unreachable())])
            .await;
        let app = Application::assemble(config(), api.clone(), Arc::new(SilentProbe));

        let (mode, poller) = app.start_delivery().await;

        assert_eq!(mode, DeliveryMode::Polling);
        assert_eq!(app.registrar.mode(), DeliveryMode::Polling);
        assert_eq!(api.delete_webhook_calls().await, 1);
        let poller = poller.expect("polling mode starts the poller");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        poller.stop().await.expect("poller should join");
        assert!(!api.update_offsets().await.is_empty());
    }

    #[tokio::test]
    async fn failed_webhook_delete_is_counted_but_polling_continues() {
        let api = Arc::new(ScriptedBotApi::default());
        let mut config = config();
        config.webhook.max_attempts = 1;
        api.script_set_webhook(vec![Err(unreachable())]).await;
        api.script_delete_webhook(vec![Err(ApiError::Rejected {
            method: "deleteWebhook",
            code: 500,
            description: "Internal Server Error".to_owned(),
        })])
        .await;
        let app = Application::assemble(config, api.clone(), Arc::new(SilentProbe));

        let (mode, poller) = app.start_delivery().await;

        assert_eq!(mode, DeliveryMode::Polling);
        assert_eq!(app.stats.snapshot().errors, 1);
        poller.expect("poller still starts").stop().await.expect("poller should join");
    }

    /// Stand-in for the HTTP server task: finishes once its trigger fires.
    fn idle_server() -> (ShutdownTrigger, JoinHandle<()>, Arc<AtomicBool>) {
        let (trigger, mut signal) = shutdown_pair();
        let drained = Arc::new(AtomicBool::new(false));
        let server_drained = drained.clone();
        let server = tokio::spawn(async move {
            signal.requested().await;
            server_drained.store(true, Ordering::SeqCst);
        });
        (trigger, server, drained)
    }

    /// A task that records whether the bot client was still open when it
    /// was asked to stop.
    fn task_observing_close(api: Arc<ScriptedBotApi>) -> (TaskHandle, Arc<AtomicBool>) {
        let stopped_before_close = Arc::new(AtomicBool::new(false));
        let flag = stopped_before_close.clone();
        let task = TaskHandle::spawn("observer", move |mut shutdown| async move {
            shutdown.requested().await;
            flag.store(api.close_calls().await == 0, Ordering::SeqCst);
        });
        (task, stopped_before_close)
    }

    #[tokio::test]
    async fn shutdown_stops_tasks_drains_server_then_closes_once() {
        let api = Arc::new(ScriptedBotApi::default());
        let app = Application::assemble(config(), api.clone(), Arc::new(SilentProbe));
        let (task, stopped_before_close) = task_observing_close(api.clone());
        let (server_stop, server, drained) = idle_server();

        let outcome = app.shutdown(vec![task], server_stop, server).await;

        assert_eq!(outcome, ShutdownOutcome::Clean);
        assert!(stopped_before_close.load(Ordering::SeqCst));
        assert!(drained.load(Ordering::SeqCst));
        assert_eq!(api.close_calls().await, 1);
    }

    #[tokio::test]
    async fn failed_close_reports_failure_outcome() {
        let api = Arc::new(ScriptedBotApi::default());
        api.script_close(vec![Err(ApiError::Rejected {
            method: "close",
            code: 429,
            description: "Too Many Requests: retry after 600".to_owned(),
        })])
        .await;
        let app = Application::assemble(config(), api.clone(), Arc::new(SilentProbe));
        let (server_stop, server, _) = idle_server();

        let outcome = app.shutdown(Vec::new(), server_stop, server).await;

        assert_eq!(outcome, ShutdownOutcome::CloseFailed);
        assert_eq!(api.close_calls().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_registration_retries_still_closes_client() {
        let api = Arc::new(ScriptedBotApi::default());
        api.script_set_webhook(vec![Err(unreachable()), Err(unreachable()), Err(unreachable())])
            .await;
        let mut config = config();
        config.webhook.retry_delay_ms = 5_000;
        let app = Application::assemble(config, api.clone(), Arc::new(SilentProbe));
        let (server_stop, server, drained) = idle_server();

        let outcome = app
            .run_until(server_stop, server, tokio::time::sleep(Duration::from_secs(1)))
            .await;

        assert_eq!(outcome, ShutdownOutcome::Clean);
        assert_eq!(api.webhook_urls().await.len(), 1, "registration abandoned mid-retry");
        assert_eq!(api.delete_webhook_calls().await, 0);
        assert!(drained.load(Ordering::SeqCst));
        assert_eq!(api.close_calls().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_until_serves_in_webhook_mode_and_stops_keepalive() {
        let api = Arc::new(ScriptedBotApi::default());
        let app = Application::assemble(config(), api.clone(), Arc::new(SilentProbe));
        let (server_stop, server, _) = idle_server();

        let outcome = app
            .run_until(server_stop, server, tokio::time::sleep(Duration::from_secs(60)))
            .await;

        assert_eq!(outcome, ShutdownOutcome::Clean);
        assert_eq!(app.registrar.mode(), DeliveryMode::Webhook);
        assert_eq!(api.close_calls().await, 1);
    }
}
