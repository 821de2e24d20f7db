use std::process::ExitCode;

use anyhow::Result;
use tracing::info;
#[cfg(not(unix))]
use tracing::warn;
use vigil_core::config::{AppConfig, LoadOptions};
use vigil_core::task::shutdown_pair;
use vigil_server::{bootstrap, routes};

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use vigil_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("vigil-server: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    // Installed first so a signal during a slow startup still closes the client.
    let mut signals = ShutdownListener::install()?;
    let app = bootstrap::bootstrap_with_config(config)?;

    let (server_stop, server_signal) = shutdown_pair();
    let server = routes::spawn(
        &app.config.server.bind_address,
        app.config.server.port,
        app.app_state(),
        server_signal,
    )
    .await?;

    let outcome = app.run_until(server_stop, server, signals.recv()).await;
    Ok(outcome.exit_code())
}

struct ShutdownListener {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
}

impl ShutdownListener {
    #[cfg(unix)]
    fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    async fn recv(&mut self) {
        let signal = tokio::select! {
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.interrupt.recv() => "SIGINT",
        };
        info!(
            event_name = "system.signal.received",
            correlation_id = "shutdown",
            signal,
            "shutdown signal received"
        );
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(
                event_name = "system.signal.listen_failed",
                correlation_id = "shutdown",
                error = %error,
                "could not listen for ctrl-c; shutting down"
            );
        }
    }
}
