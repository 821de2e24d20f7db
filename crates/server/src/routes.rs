use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};
use vigil_core::{stats::BotStats, task::ShutdownSignal};
use vigil_telegram::UpdateDispatcher;

use crate::{health, webhook};

#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<BotStats>,
    pub dispatcher: Arc<UpdateDispatcher>,
    pub bot_name: String,
    /// Path segment the platform posts to: `bot{token}`.
    pub webhook_segment: Arc<SecretString>,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<UpdateDispatcher>,
        bot_name: impl Into<String>,
        bot_token: &SecretString,
    ) -> Self {
        let segment = format!("bot{}", bot_token.expose_secret());
        Self {
            stats: dispatcher.stats().clone(),
            dispatcher,
            bot_name: bot_name.into(),
            webhook_segment: Arc::new(segment.into()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::health))
        .route("/{segment}", post(webhook::receive_update))
        .with_state(state)
}

/// Serves the router until `shutdown` fires, then drains in-flight requests.
pub async fn spawn(
    bind_address: &str,
    port: u16,
    state: AppState,
    mut shutdown: ShutdownSignal,
) -> std::io::Result<JoinHandle<()>> {
    let address = format!("{bind_address}:{port}");
    let listener = TcpListener::bind(&address).await?;

    info!(
        event_name = "system.http.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "http server listening"
    );

    Ok(tokio::spawn(async move {
        let server = axum::serve(listener, router(state))
            .with_graceful_shutdown(async move { shutdown.requested().await });
        if let Err(error) = server.await {
            error!(
                event_name = "system.http.error",
                correlation_id = "bootstrap",
                error = %error,
                "http server terminated unexpectedly"
            );
        }
    }))
}
