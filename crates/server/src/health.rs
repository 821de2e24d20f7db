use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use vigil_core::stats::{iso_timestamp, ErrorRate, StatsSnapshot};

use crate::routes::AppState;

pub const HEALTH_MESSAGE: &str = "Bot is running 24/7 with enhanced reliability!";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealthStatistics {
    pub messages_received: u64,
    pub commands_processed: u64,
    pub errors: u64,
    pub error_rate: ErrorRate,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub bot: String,
    pub message: &'static str,
    pub uptime: u64,
    pub uptime_formatted: String,
    pub statistics: HealthStatistics,
    pub last_ping: String,
    pub timestamp: String,
}

impl HealthResponse {
    pub fn from_snapshot(bot_name: &str, snapshot: &StatsSnapshot) -> Self {
        Self {
            status: "running",
            bot: bot_name.to_owned(),
            message: HEALTH_MESSAGE,
            uptime: snapshot.uptime_secs,
            uptime_formatted: snapshot.uptime_formatted(),
            statistics: HealthStatistics {
                messages_received: snapshot.messages_received,
                commands_processed: snapshot.commands_processed,
                errors: snapshot.errors,
                error_rate: snapshot.error_rate(),
            },
            last_ping: iso_timestamp(snapshot.last_ping),
            timestamp: iso_timestamp(snapshot.taken_at),
        }
    }
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = state.stats.snapshot();
    (StatusCode::OK, Json(HealthResponse::from_snapshot(&state.bot_name, &snapshot)))
}
