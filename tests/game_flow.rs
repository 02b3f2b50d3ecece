//! End-to-end run of a one-song game through the service layer.

use std::sync::Arc;

use beatify_back::{
    config::{AppConfig, GameRules},
    dao::json_file::JsonFileStatsStore,
    dto::{admin::CreateGameRequest, phase::VisibleGamePhase},
    services::{game_service, media_player::NullMediaPlayer, stats_service::StatsService},
    state::{AppState, SharedState, clock::ManualClock},
};
use uuid::Uuid;

const START: u64 = 1_700_000_000_000;

fn app(dir: &tempfile::TempDir) -> (SharedState, Arc<ManualClock>) {
    std::fs::write(
        dir.path().join("one.json"),
        r#"{"name": "One hit", "songs": [{"year": 1984, "uri": "spotify:track:jump"}]}"#,
    )
    .unwrap();

    let config = AppConfig {
        playlist_dir: dir.path().to_path_buf(),
        stats_path: dir.path().join("stats.json"),
        rules: GameRules {
            playback_settle_ms: 0,
            min_players: 2,
            ..GameRules::default()
        },
        ..AppConfig::default()
    };
    let clock = Arc::new(ManualClock::new(START));
    let stats = StatsService::new(Arc::new(JsonFileStatsStore::new(&config.stats_path)));
    let state = AppState::new(config, clock.clone(), Arc::new(NullMediaPlayer), stats);
    (state, clock)
}

#[tokio::test]
async fn single_round_game_reaches_final_scoreboard() {
    let dir = tempfile::tempdir().unwrap();
    let (state, clock) = app(&dir);

    let created = game_service::create_game(
        &state,
        CreateGameRequest {
            playlists: vec!["one.json".into()],
            difficulty: None,
            movie_quiz: false,
            artist_quiz: false,
        },
    )
    .await
    .unwrap();
    assert_eq!(created.song_count, 1);

    let alice = game_service::join(&state, "Alice", Uuid::new_v4(), true)
        .await
        .unwrap();
    assert!(alice.is_admin);
    let bob = game_service::join(&state, "Bob", Uuid::new_v4(), true)
        .await
        .unwrap();
    assert!(!bob.is_admin, "admin seat is already taken");

    game_service::start_game(&state).await.unwrap();
    let playing = game_service::snapshot(&state).await.unwrap();
    assert_eq!(playing.phase, VisibleGamePhase::Playing);
    assert_eq!(playing.last_round, Some(true));
    assert!(state.round_timer().is_armed().await);

    game_service::submit_guess(&state, "Alice", 1984, false)
        .await
        .unwrap();
    clock.advance(5_000);
    assert!(game_service::close_round(&state).await.unwrap());
    assert!(!game_service::close_round(&state).await.unwrap());

    let reveal = game_service::snapshot(&state).await.unwrap();
    assert_eq!(reveal.phase, VisibleGamePhase::Reveal);
    let results = reveal.round_results.unwrap();
    let alice_result = results.iter().find(|r| r.name == "Alice").unwrap();
    assert_eq!(alice_result.round_score, 15);
    let bob_result = results.iter().find(|r| r.name == "Bob").unwrap();
    assert!(bob_result.missed_round);
    assert_eq!(bob_result.streak, 0);
    assert_eq!(bob_result.round_score, 0);

    game_service::next_round(&state).await.unwrap();
    let end = game_service::snapshot(&state).await.unwrap();
    assert_eq!(end.phase, VisibleGamePhase::End);

    let board = end.final_leaderboard.unwrap();
    assert_eq!(board[0].name, "Alice");
    assert_eq!(board[0].score, 15);
    assert_eq!(board[1].name, "Bob");
    assert!(end.comparison.unwrap().is_first_game);

    let history = state.stats().history(10).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].winner.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn start_needs_two_connected_players() {
    let dir = tempfile::tempdir().unwrap();
    let (state, _clock) = app(&dir);

    game_service::create_game(
        &state,
        CreateGameRequest {
            playlists: vec!["one.json".into()],
            difficulty: None,
            movie_quiz: false,
            artist_quiz: false,
        },
    )
    .await
    .unwrap();
    game_service::join(&state, "Solo", Uuid::new_v4(), true)
        .await
        .unwrap();

    assert!(game_service::start_game(&state).await.is_err());
    let lobby = game_service::snapshot(&state).await.unwrap();
    assert_eq!(lobby.phase, VisibleGamePhase::Lobby);
}
