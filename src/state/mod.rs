pub mod challenge;
pub mod clock;
pub mod game;
pub mod leaderboard;
pub mod player;
pub mod playlist;
pub mod scoring;
pub mod state_machine;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc};

use crate::{
    config::AppConfig,
    dto::stats::GameComparison,
    services::{media_player::MediaPlayer, round_timer::RoundTimer, stats_service::StatsService},
    state::{clock::Clock, game::GameSession, player::ConnectionId},
};

pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to a connected client.
pub struct ClientConnection {
    pub id: ConnectionId,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state shared by every handler.
pub struct AppState {
    config: Arc<AppConfig>,
    clock: Arc<dyn Clock>,
    game: Mutex<GameSession>,
    connections: DashMap<ConnectionId, ClientConnection>,
    media: Arc<dyn MediaPlayer>,
    stats: StatsService,
    round_timer: RoundTimer,
    last_comparison: RwLock<Option<GameComparison>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        clock: Arc<dyn Clock>,
        media: Arc<dyn MediaPlayer>,
        stats: StatsService,
    ) -> SharedState {
        let session = GameSession::new(config.rules.clone(), config.scoring.clone(), clock.clone());
        Arc::new(Self {
            config: Arc::new(config),
            clock,
            game: Mutex::new(session),
            connections: DashMap::new(),
            media,
            stats,
            round_timer: RoundTimer::default(),
            last_comparison: RwLock::new(None),
        })
    }

    /// Shared configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// The single game session. Hold the lock only for synchronous work or media calls
    /// that are part of the same step.
    pub fn game(&self) -> &Mutex<GameSession> {
        &self.game
    }

    /// Registry of open sockets keyed by connection id.
    pub fn connections(&self) -> &DashMap<ConnectionId, ClientConnection> {
        &self.connections
    }

    pub fn media(&self) -> &dyn MediaPlayer {
        self.media.as_ref()
    }

    pub fn stats(&self) -> &StatsService {
        &self.stats
    }

    pub fn round_timer(&self) -> &RoundTimer {
        &self.round_timer
    }

    /// Comparison computed when the current game reached its end, if any.
    pub fn last_comparison(&self) -> &RwLock<Option<GameComparison>> {
        &self.last_comparison
    }
}
