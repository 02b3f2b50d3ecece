use serde::Serialize;
use utoipa::ToSchema;

/// Playlist file found in the playlist directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlaylistInfo {
    pub path: String,
    /// Name to pass when creating a game.
    pub filename: String,
    /// Display name from the file, or the file stem when missing.
    pub name: String,
    pub song_count: usize,
    pub is_valid: bool,
    /// Human-readable problems; empty when valid.
    pub errors: Vec<String>,
}
