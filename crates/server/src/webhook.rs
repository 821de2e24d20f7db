use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use secrecy::ExposeSecret;
use tracing::{debug, warn};
use vigil_telegram::Update;

use crate::routes::AppState;

/// `POST /bot{token}`: the platform's webhook callback.
///
/// Any other single-segment path is a 404. A body that is not an `Update`
/// counts as an error and yields a 500 so the platform delivers it again.
pub async fn receive_update(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    body: Bytes,
) -> StatusCode {
    if !segment_matches(&segment, state.webhook_segment.expose_secret()) {
        debug!(event_name = "ingress.webhook.unknown_path", "rejected post to unknown path");
        return StatusCode::NOT_FOUND;
    }

    let update = match serde_json::from_slice::<Update>(&body) {
        Ok(update) => update,
        Err(error) => {
            state.stats.record_error();
            warn!(
                event_name = "ingress.webhook.decode_failed",
                correlation_id = "webhook",
                error = %error,
                "webhook payload is not a telegram update"
            );
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    state.dispatcher.dispatch(&update).await;
    StatusCode::OK
}

/// Compares the whole segment regardless of where the first byte differs.
fn segment_matches(candidate: &str, expected: &str) -> bool {
    let (candidate, expected) = (candidate.as_bytes(), expected.as_bytes());
    let mut diff = candidate.len() ^ expected.len();
    for (index, byte) in expected.iter().enumerate() {
        let other = candidate.get(index).copied().unwrap_or(!byte);
        diff |= usize::from(byte ^ other);
    }
    diff == 0
}
