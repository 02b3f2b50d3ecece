//! Validation helpers for DTOs.

use validator::ValidationError;

/// Rejects strings that are empty once trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates the playlist selection of a new game.
///
/// Each entry must be a bare `*.json` file name: no path separators and no parent references.
pub fn validate_playlist_names(names: &[String]) -> Result<(), ValidationError> {
    if names.is_empty() {
        let mut err = ValidationError::new("playlists_empty");
        err.message = Some("select at least one playlist".into());
        return Err(err);
    }

    for name in names {
        let name = name.trim();
        if name.contains(['/', '\\']) || name.starts_with('.') || !name.ends_with(".json") {
            let mut err = ValidationError::new("playlist_name");
            err.message = Some(format!("`{name}` is not a playlist file name").into());
            return Err(err);
        }
    }

    Ok(())
}
