use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report `degraded` while the media device cannot be reached.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let available = state.media().is_available().await;
    if !available {
        warn!("media player unavailable (degraded mode)");
    }
    HealthResponse::from_media(available)
}
