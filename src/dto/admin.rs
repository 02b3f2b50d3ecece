//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dto::validation::validate_playlist_names, state::scoring::Difficulty};

/// Payload describing the game to create from one or more playlist files.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateGameRequest {
    /// Playlist file names from the playlist directory, e.g. `80s.json`.
    #[validate(custom(function = "validate_playlist_names"))]
    pub playlists: Vec<String>,
    /// Falls back to the configured default when omitted.
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub movie_quiz: bool,
    #[serde(default)]
    pub artist_quiz: bool,
}

/// Generic action acknowledgement used by admin endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Requested playback volume; values outside 0.0 to 1.0 are clamped.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VolumeRequest {
    pub level: f64,
}

/// Volume actually applied to the device.
#[derive(Debug, Serialize, ToSchema)]
pub struct VolumeResponse {
    pub level: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_defaults_optional_flags() {
        let request: CreateGameRequest =
            serde_json::from_str(r#"{"playlists": ["80s.json"]}"#).unwrap();
        assert!(request.difficulty.is_none());
        assert!(!request.movie_quiz && !request.artist_quiz);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn create_request_rejects_paths() {
        let request: CreateGameRequest =
            serde_json::from_str(r#"{"playlists": ["../secrets.json"], "difficulty": "hard"}"#)
                .unwrap();
        assert!(request.validate().is_err());
    }
}
