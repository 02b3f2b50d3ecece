use uuid::Uuid;

use crate::state::scoring::{ArtistMatch, BetOutcome};

/// Identifier of the transport connection a player is attached to.
pub type ConnectionId = Uuid;

/// Fields wiped at the start of every round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundState {
    /// A year guess was recorded this round.
    pub submitted: bool,
    /// Guessed release year.
    pub guess: Option<i32>,
    /// Clock reading when the guess arrived.
    pub submitted_at_ms: Option<u64>,
    /// Time into the submission window, excluding paused time.
    pub elapsed_ms: u64,
    /// The player doubled down on this guess.
    pub bet: bool,
    /// Accuracy points before speed and bet are applied.
    pub base_score: u32,
    /// Speed factor applied to the base score.
    pub speed_multiplier: f64,
    /// Year points after speed and bet.
    pub round_score: u32,
    /// Distance from the actual year.
    pub years_off: Option<u32>,
    /// How the bet resolved, when one was placed.
    pub bet_outcome: Option<BetOutcome>,
    /// Milestone bonus earned this round.
    pub streak_bonus: u32,
    /// Connected but never submitted.
    pub missed_round: bool,
    /// Streak length before it broke this round.
    pub previous_streak: u32,
    /// Leaderboard rank before this round was scored.
    pub previous_rank: Option<usize>,
    /// A movie answer was recorded.
    pub movie_guessed: bool,
    /// Points from the movie challenge.
    pub movie_bonus: u32,
    /// An artist answer was recorded.
    pub artist_guessed: bool,
    /// Raw artist answer, trimmed.
    pub artist_guess: Option<String>,
    /// Points from the artist challenge.
    pub artist_bonus: u32,
    /// Exact or partial artist match.
    pub artist_match: Option<ArtistMatch>,
}

/// One participant in the current game.
#[derive(Debug, Clone)]
pub struct PlayerSession {
    name: String,
    /// Live transport handle, if any.
    pub connection: Option<ConnectionId>,
    /// Reachable over its connection; disconnected players are skipped when scoring.
    pub connected: bool,
    /// May drive the game over the socket.
    pub is_admin: bool,
    /// Joined after the lobby closed.
    pub joined_late: bool,
    /// Cumulative score; only ever increases during a game.
    pub score: u32,
    /// Consecutive scoring rounds.
    pub streak: u32,
    /// Longest streak this game.
    pub best_streak: u32,
    /// Rounds with a submitted guess.
    pub rounds_played: u32,
    /// Bets that paid off.
    pub bets_won: u32,
    /// Movie points over the whole game.
    pub movie_bonus_total: u32,
    /// Artist points over the whole game.
    pub artist_bonus_total: u32,
    /// Transient per-round data.
    pub round: RoundState,
}

impl PlayerSession {
    /// Fresh, connected player.
    pub fn new(name: String, connection: Option<ConnectionId>, joined_late: bool) -> Self {
        Self {
            name,
            connection,
            connected: true,
            is_admin: false,
            joined_late,
            score: 0,
            streak: 0,
            best_streak: 0,
            rounds_played: 0,
            bets_won: 0,
            movie_bonus_total: 0,
            artist_bonus_total: 0,
            round: RoundState::default(),
        }
    }

    /// Display name, fixed once joined.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Clear every per-round field, leaving cumulative stats untouched.
    pub fn reset_round(&mut self) {
        self.round = RoundState::default();
    }

    /// Break the streak, remembering its length for the reveal.
    pub(crate) fn break_streak(&mut self) {
        self.round.previous_streak = self.streak;
        self.streak = 0;
        self.round.streak_bonus = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_round_keeps_cumulative_fields() {
        let mut player = PlayerSession::new("Ana".into(), None, false);
        player.score = 42;
        player.streak = 3;
        player.best_streak = 4;
        player.rounds_played = 5;
        player.round.submitted = true;
        player.round.guess = Some(1984);
        player.round.bet = true;
        player.round.round_score = 20;

        player.reset_round();

        assert_eq!(player.round, RoundState::default());
        assert_eq!(player.score, 42);
        assert_eq!(player.streak, 3);
        assert_eq!(player.best_streak, 4);
        assert_eq!(player.rounds_played, 5);
    }

    #[test]
    fn break_streak_snapshots_previous_value() {
        let mut player = PlayerSession::new("Bo".into(), None, true);
        player.streak = 6;

        player.break_streak();

        assert_eq!(player.streak, 0);
        assert_eq!(player.round.previous_streak, 6);
        assert!(player.joined_late);
    }
}
