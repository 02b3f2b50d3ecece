//! Playlist discovery and loading from the playlist directory.

use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde_json::Value;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    config::GameRules,
    dao::models::PlaylistFile,
    dto::playlist::PlaylistInfo,
    error::ServiceError,
    state::playlist::Song,
};

/// Parsed and checked playlist, or the list of problems found.
fn parse_playlist(contents: &str, rules: &GameRules) -> Result<PlaylistFile, Vec<String>> {
    let value: Value =
        serde_json::from_str(contents).map_err(|err| vec![format!("Invalid JSON: {err}")])?;
    let playlist: PlaylistFile =
        serde_json::from_value(value).map_err(|err| vec![format!("Invalid playlist: {err}")])?;

    let mut errors: Vec<String> = match playlist.validate() {
        Ok(()) => Vec::new(),
        Err(err) => err.to_string().lines().map(str::to_owned).collect(),
    };

    for (index, song) in playlist.songs.iter().enumerate() {
        if !rules.year_in_range(song.year) {
            errors.push(format!("Song {}: year {} out of range", index + 1, song.year));
        }
    }

    if errors.is_empty() {
        Ok(playlist)
    } else {
        Err(errors)
    }
}

/// Best-effort name and size of a file that may not be a valid playlist.
fn describe(contents: &str) -> Option<(Option<String>, usize)> {
    let value: Value = serde_json::from_str(contents).ok()?;
    let name = value.get("name").and_then(Value::as_str).map(str::to_owned);
    let songs = value.get("songs").and_then(Value::as_array).map_or(0, Vec::len);
    Some((name, songs))
}

/// List every `*.json` file of `dir` with its validation status.
pub async fn discover(dir: &Path, rules: &GameRules) -> Vec<PlaylistInfo> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "playlist directory does not exist");
            return Vec::new();
        }
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "failed to list playlist directory");
            return Vec::new();
        }
    };

    let mut paths = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    paths.push(path);
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "failed to read playlist entry");
                break;
            }
        }
    }
    paths.sort();

    let mut playlists = Vec::with_capacity(paths.len());
    for path in paths {
        playlists.push(inspect(&path, rules).await);
    }

    debug!(count = playlists.len(), "discovered playlists");
    playlists
}

async fn inspect(path: &Path, rules: &GameRules) -> PlaylistInfo {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) => {
            return PlaylistInfo {
                path: path.display().to_string(),
                filename,
                name: stem,
                song_count: 0,
                is_valid: false,
                errors: vec![format!("Unreadable file: {err}")],
            };
        }
    };

    let (name, song_count) = describe(&contents).unwrap_or((None, 0));
    let errors = parse_playlist(&contents, rules).err().unwrap_or_default();

    PlaylistInfo {
        path: path.display().to_string(),
        filename,
        name: name.filter(|n| !n.trim().is_empty()).unwrap_or(stem),
        song_count,
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Load the named playlists from `dir` into one song list.
///
/// Songs repeating a URI already loaded are skipped so every URI is unique within a game.
pub async fn load_songs(
    dir: &Path,
    filenames: &[String],
    rules: &GameRules,
) -> Result<Vec<Song>, ServiceError> {
    let mut songs = Vec::new();
    let mut seen = HashSet::new();

    for filename in filenames {
        let path: PathBuf = dir.join(filename.trim());
        let contents = tokio::fs::read_to_string(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ServiceError::NotFound(format!("playlist `{filename}`"))
            } else {
                ServiceError::InvalidInput(format!("cannot read playlist `{filename}`: {err}"))
            }
        })?;

        let playlist = parse_playlist(&contents, rules).map_err(|errors| {
            ServiceError::InvalidInput(format!(
                "playlist `{filename}` is invalid: {}",
                errors.join("; ")
            ))
        })?;

        let before = songs.len();
        songs.extend(
            playlist
                .songs
                .into_iter()
                .map(Song::from)
                .filter(|song| seen.insert(song.uri.clone())),
        );
        info!(
            playlist = %playlist.name,
            file = %filename,
            songs = songs.len() - before,
            "loaded playlist"
        );
    }

    if songs.is_empty() {
        return Err(ServiceError::InvalidInput("no songs to play".into()));
    }
    Ok(songs)
}
