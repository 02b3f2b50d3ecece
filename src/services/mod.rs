/// WebSocket fan-out of game snapshots.
pub mod broadcast;
/// Playlist discovery, validation and loading.
pub mod catalog_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Game orchestration across the session, media player, timer and statistics.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Media player abstraction and its backends.
pub mod media_player;
/// Per-round deadline task.
pub mod round_timer;
/// Persistent game statistics.
pub mod stats_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
