//! Tie-aware standard competition ranking over the roster.

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::player::PlayerSession;

/// Live leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub name: String,
    pub score: u32,
    pub streak: u32,
    /// `previous_rank - rank`; positive means the player climbed.
    pub rank_change: i64,
    pub connected: bool,
}

/// End-of-game leaderboard row with cumulative stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FinalLeaderboardEntry {
    pub rank: usize,
    pub name: String,
    pub score: u32,
    pub best_streak: u32,
    pub rounds_played: u32,
    pub bets_won: u32,
}

/// Sort by cumulative score (descending, ties broken by name) and assign competition ranks.
///
/// Equal scores share a rank; the next distinct score gets "players strictly above + 1".
pub fn rank<'a, I>(players: I) -> Vec<(usize, &'a PlayerSession)>
where
    I: IntoIterator<Item = &'a PlayerSession>,
{
    let mut sorted: Vec<&PlayerSession> = players.into_iter().collect();
    sorted.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
    });

    let mut ranked = Vec::with_capacity(sorted.len());
    let mut current_rank = 0;
    let mut previous_score = None;
    for (index, player) in sorted.into_iter().enumerate() {
        if previous_score != Some(player.score) {
            current_rank = index + 1;
            previous_score = Some(player.score);
        }
        ranked.push((current_rank, player));
    }
    ranked
}

pub fn rank_change(previous_rank: Option<usize>, current_rank: usize) -> i64 {
    previous_rank
        .map(|previous| previous as i64 - current_rank as i64)
        .unwrap_or_default()
}

/// Live leaderboard.
pub fn leaderboard<'a, I>(players: I) -> Vec<LeaderboardEntry>
where
    I: IntoIterator<Item = &'a PlayerSession>,
{
    rank(players)
        .into_iter()
        .map(|(rank, player)| LeaderboardEntry {
            rank,
            name: player.name().to_owned(),
            score: player.score,
            streak: player.streak,
            rank_change: rank_change(player.round.previous_rank, rank),
            connected: player.connected,
        })
        .collect()
}

/// Final leaderboard.
pub fn final_leaderboard<'a, I>(players: I) -> Vec<FinalLeaderboardEntry>
where
    I: IntoIterator<Item = &'a PlayerSession>,
{
    rank(players)
        .into_iter()
        .map(|(rank, player)| FinalLeaderboardEntry {
            rank,
            name: player.name().to_owned(),
            score: player.score,
            best_streak: player.best_streak,
            rounds_played: player.rounds_played,
            bets_won: player.bets_won,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str, score: u32) -> PlayerSession {
        let mut player = PlayerSession::new(name.into(), None, false);
        player.score = score;
        player
    }

    #[test]
    fn ties_share_rank_and_skip_next() {
        let players = vec![
            player("dee", 50),
            player("bo", 80),
            player("ana", 100),
            player("cy", 80),
        ];

        let ranks: Vec<(usize, u32)> = rank(&players)
            .into_iter()
            .map(|(rank, p)| (rank, p.score))
            .collect();

        assert_eq!(ranks, vec![(1, 100), (2, 80), (2, 80), (4, 50)]);
    }

    #[test]
    fn all_tied_players_rank_first() {
        let players = vec![player("a", 0), player("b", 0), player("c", 0)];
        assert!(rank(&players).iter().all(|(rank, _)| *rank == 1));
    }

    #[test]
    fn rank_change_uses_snapshot() {
        assert_eq!(rank_change(Some(4), 1), 3);
        assert_eq!(rank_change(Some(1), 2), -1);
        assert_eq!(rank_change(None, 3), 0);

        let mut climber = player("ana", 30);
        climber.round.previous_rank = Some(2);
        let board = leaderboard(&[climber, player("bo", 10)]);
        assert_eq!(board[0].rank_change, 1);
        assert_eq!(board[1].rank_change, 0);
    }

    #[test]
    fn final_entries_carry_cumulative_stats() {
        let mut ana = player("ana", 90);
        ana.best_streak = 4;
        ana.rounds_played = 6;
        ana.bets_won = 2;

        let board = final_leaderboard([&ana]);
        assert_eq!(
            board[0],
            FinalLeaderboardEntry {
                rank: 1,
                name: "ana".into(),
                score: 90,
                best_streak: 4,
                rounds_played: 6,
                bets_won: 2,
            }
        );
    }
}
