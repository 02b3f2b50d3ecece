//! Device adapter used to actually play the round's song.

use std::{env, sync::Arc, time::Duration};

use futures::future::{self, BoxFuture};
use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::config::MediaConfig;

/// Result alias for media player operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Failure talking to the playback device.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Device reported it cannot play right now.
    #[error("media player unavailable: {0}")]
    Unavailable(String),
    /// Device answered with a non-success status.
    #[error("media player returned status {0}")]
    Status(u16),
    /// Device did not answer in time.
    #[error("media player did not answer within {0:?}")]
    Timeout(Duration),
    /// Transport failure.
    #[cfg(feature = "home-assistant")]
    #[error("media player request failed")]
    Request(#[from] reqwest::Error),
}

/// Metadata as reported by the device; any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialMetadata {
    /// Performing artist.
    pub artist: Option<String>,
    /// Track title.
    pub title: Option<String>,
    /// Absolute URL of the cover image.
    pub album_art: Option<String>,
}

/// Display metadata for the current round with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TrackMetadata {
    /// Artist, or `Unknown Artist`.
    pub artist: String,
    /// Title, or `Unknown Title`.
    pub title: String,
    /// Cover image, or the configured default artwork.
    pub album_art: String,
}

impl TrackMetadata {
    /// Fill each missing or blank field with its documented default.
    pub fn with_defaults(partial: PartialMetadata, default_artwork: &str) -> Self {
        fn present(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }

        Self {
            artist: present(partial.artist).unwrap_or_else(|| "Unknown Artist".into()),
            title: present(partial.title).unwrap_or_else(|| "Unknown Title".into()),
            album_art: present(partial.album_art).unwrap_or_else(|| default_artwork.into()),
        }
    }
}

/// Clamp a requested volume into `0.0..=1.0`.
pub fn clamp_volume(level: f64) -> f64 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}

/// Await a device call for at most `limit`; an elapsed call becomes [`MediaError::Timeout`].
pub async fn bounded<T>(
    limit: Duration,
    call: BoxFuture<'static, MediaResult<T>>,
) -> MediaResult<T> {
    timeout(limit, call)
        .await
        .map_err(|_| MediaError::Timeout(limit))?
}

/// Playback device consumed by the game session.
pub trait MediaPlayer: Send + Sync {
    /// Start playing `uri`.
    fn play(&self, uri: String) -> BoxFuture<'static, MediaResult<()>>;
    /// Read back what the device is currently showing.
    fn metadata(&self) -> BoxFuture<'static, MediaResult<PartialMetadata>>;
    /// Stop playback.
    fn stop(&self) -> BoxFuture<'static, MediaResult<()>>;
    /// Set the output volume; implementations clamp to `0.0..=1.0`.
    fn set_volume(&self, level: f64) -> BoxFuture<'static, MediaResult<()>>;
    /// Whether the device is reachable and ready.
    fn is_available(&self) -> BoxFuture<'static, bool>;
}

/// Offline player that accepts every request and reports no metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMediaPlayer;

impl MediaPlayer for NullMediaPlayer {
    fn play(&self, _uri: String) -> BoxFuture<'static, MediaResult<()>> {
        Box::pin(future::ready(Ok(())))
    }

    fn metadata(&self) -> BoxFuture<'static, MediaResult<PartialMetadata>> {
        Box::pin(future::ready(Ok(PartialMetadata::default())))
    }

    fn stop(&self) -> BoxFuture<'static, MediaResult<()>> {
        Box::pin(future::ready(Ok(())))
    }

    fn set_volume(&self, _level: f64) -> BoxFuture<'static, MediaResult<()>> {
        Box::pin(future::ready(Ok(())))
    }

    fn is_available(&self) -> BoxFuture<'static, bool> {
        Box::pin(future::ready(true))
    }
}

/// Build the configured player, falling back to [`NullMediaPlayer`].
pub fn from_config(config: Option<&MediaConfig>) -> Arc<dyn MediaPlayer> {
    let Some(config) = config else {
        info!("no media player configured; running offline");
        return Arc::new(NullMediaPlayer);
    };

    let Ok(token) = env::var(&config.token_env) else {
        warn!(
            token_env = %config.token_env,
            "media player token missing; running offline"
        );
        return Arc::new(NullMediaPlayer);
    };

    #[cfg(feature = "home-assistant")]
    {
        match HomeAssistantPlayer::new(config, token) {
            Ok(player) => {
                info!(entity_id = %config.entity_id, "using Home Assistant media player");
                Arc::new(player)
            }
            Err(err) => {
                warn!(error = %err, "failed to build media player client; running offline");
                Arc::new(NullMediaPlayer)
            }
        }
    }

    #[cfg(not(feature = "home-assistant"))]
    {
        let _ = token;
        warn!("built without Home Assistant support; running offline");
        Arc::new(NullMediaPlayer)
    }
}

/// Upper bound for a single Home Assistant REST call.
#[cfg(feature = "home-assistant")]
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Home Assistant `media_player` entity driven through the REST API.
#[cfg(feature = "home-assistant")]
#[derive(Clone)]
pub struct HomeAssistantPlayer {
    client: reqwest::Client,
    base_url: Arc<str>,
    entity_id: Arc<str>,
    token: Arc<str>,
}

#[cfg(feature = "home-assistant")]
#[derive(serde::Deserialize)]
struct EntityState {
    state: String,
    #[serde(default)]
    attributes: EntityAttributes,
}

#[cfg(feature = "home-assistant")]
#[derive(Default, serde::Deserialize)]
struct EntityAttributes {
    media_artist: Option<String>,
    media_title: Option<String>,
    entity_picture: Option<String>,
}

#[cfg(feature = "home-assistant")]
impl HomeAssistantPlayer {
    /// Build a client for `config` authenticated with `token`.
    pub fn new(config: &MediaConfig, token: String) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: Arc::from(config.url.trim_end_matches('/')),
            entity_id: Arc::from(config.entity_id.as_str()),
            token: Arc::from(token),
        })
    }

    fn call_service(
        &self,
        service: &'static str,
        extra: serde_json::Value,
    ) -> BoxFuture<'static, MediaResult<()>> {
        let this = self.clone();
        Box::pin(async move {
            let mut body = serde_json::json!({ "entity_id": this.entity_id.as_ref() });
            if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
                body.extend(extra.clone());
            }

            let url = format!("{}/api/services/media_player/{service}", this.base_url);
            let response = this
                .client
                .post(url)
                .bearer_auth(this.token.as_ref())
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(MediaError::Status(response.status().as_u16()))
            }
        })
    }

    fn fetch_state(&self) -> BoxFuture<'static, MediaResult<EntityState>> {
        let this = self.clone();
        Box::pin(async move {
            let url = format!("{}/api/states/{}", this.base_url, this.entity_id);
            let response = this
                .client
                .get(url)
                .bearer_auth(this.token.as_ref())
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(MediaError::Status(response.status().as_u16()));
            }

            Ok(response.json::<EntityState>().await?)
        })
    }
}

#[cfg(feature = "home-assistant")]
impl MediaPlayer for HomeAssistantPlayer {
    fn play(&self, uri: String) -> BoxFuture<'static, MediaResult<()>> {
        self.call_service(
            "play_media",
            serde_json::json!({ "media_content_id": uri, "media_content_type": "music" }),
        )
    }

    fn metadata(&self) -> BoxFuture<'static, MediaResult<PartialMetadata>> {
        let base_url = self.base_url.clone();
        let state = self.fetch_state();
        Box::pin(async move {
            let state = state.await?;
            let attributes = state.attributes;
            Ok(PartialMetadata {
                artist: attributes.media_artist,
                title: attributes.media_title,
                album_art: attributes.entity_picture.map(|picture| {
                    if picture.starts_with('/') {
                        format!("{base_url}{picture}")
                    } else {
                        picture
                    }
                }),
            })
        })
    }

    fn stop(&self) -> BoxFuture<'static, MediaResult<()>> {
        self.call_service("media_stop", serde_json::json!({}))
    }

    fn set_volume(&self, level: f64) -> BoxFuture<'static, MediaResult<()>> {
        self.call_service(
            "volume_set",
            serde_json::json!({ "volume_level": clamp_volume(level) }),
        )
    }

    fn is_available(&self) -> BoxFuture<'static, bool> {
        let state = self.fetch_state();
        Box::pin(async move {
            match state.await {
                Ok(state) => !matches!(state.state.as_str(), "unavailable" | "unknown"),
                Err(err) => {
                    warn!(error = %err, "media player availability check failed");
                    false
                }
            }
        })
    }
}

/// Scripted player for tests: fails or hangs on chosen URIs and records every play request.
#[cfg(test)]
#[derive(Default, Clone)]
pub(crate) struct ScriptedMediaPlayer {
    pub failing: std::collections::HashSet<String>,
    pub hanging: std::collections::HashSet<String>,
    pub hang_metadata: bool,
    pub metadata: PartialMetadata,
    pub played: Arc<std::sync::Mutex<Vec<String>>>,
}

#[cfg(test)]
impl ScriptedMediaPlayer {
    pub fn failing_on(uris: &[&str]) -> Self {
        Self {
            failing: uris.iter().map(|uri| uri.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn hanging_on(uris: &[&str]) -> Self {
        Self {
            hanging: uris.iter().map(|uri| uri.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl MediaPlayer for ScriptedMediaPlayer {
    fn play(&self, uri: String) -> BoxFuture<'static, MediaResult<()>> {
        self.played.lock().unwrap().push(uri.clone());
        if self.hanging.contains(&uri) {
            return Box::pin(future::pending::<MediaResult<()>>());
        }
        let result = if self.failing.contains(&uri) {
            Err(MediaError::Unavailable(format!("cannot play {uri}")))
        } else {
            Ok(())
        };
        Box::pin(future::ready(result))
    }

    fn metadata(&self) -> BoxFuture<'static, MediaResult<PartialMetadata>> {
        if self.hang_metadata {
            return Box::pin(future::pending::<MediaResult<PartialMetadata>>());
        }
        Box::pin(future::ready(Ok(self.metadata.clone())))
    }

    fn stop(&self) -> BoxFuture<'static, MediaResult<()>> {
        Box::pin(future::ready(Ok(())))
    }

    fn set_volume(&self, _level: f64) -> BoxFuture<'static, MediaResult<()>> {
        Box::pin(future::ready(Ok(())))
    }

    fn is_available(&self) -> BoxFuture<'static, bool> {
        Box::pin(future::ready(true))
    }
}
