//! Per-round bonus mini-challenges (movie title or artist name).

use std::collections::HashSet;

use rand::seq::{IndexedRandom, SliceRandom};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::playlist::Song;

/// Extra artists offered next to the correct one.
const ARTIST_DISTRACTORS: usize = 3;

/// Which bonus question is asked this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeKind {
    /// Guess the film the song is known from.
    Movie,
    /// Guess the performing artist.
    Artist,
}

/// Correct answer, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CorrectGuess {
    /// Player display name.
    pub name: String,
    /// Seconds since the round opened.
    pub elapsed_secs: f64,
}

/// Incorrect answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct WrongGuess {
    /// Player display name.
    pub name: String,
    /// What they answered.
    pub guess: String,
}

/// What happened to a bonus guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessRecord {
    /// Matched; `rank` is the 1-based arrival position among correct guesses.
    Correct {
        /// Arrival position.
        rank: usize,
    },
    /// Did not match.
    Wrong,
}

/// Sub-state for one round's bonus question. Dropped when the round ends.
#[derive(Debug, Clone)]
pub struct BonusChallenge {
    kind: ChallengeKind,
    correct_answer: String,
    options: Vec<String>,
    correct_guesses: Vec<CorrectGuess>,
    wrong_guesses: Vec<WrongGuess>,
}

impl BonusChallenge {
    /// Movie challenge from the song's title and distractors, if it has at least two options.
    pub fn movie(song: &Song) -> Option<Self> {
        let title = song.movie.as_deref()?.trim();
        Self::build(ChallengeKind::Movie, title, song.movie_choices.iter().map(String::as_str))
    }

    /// Artist challenge from the song's artist plus a few others drawn from the catalog.
    pub fn artist(song: &Song, catalog: &[Song]) -> Option<Self> {
        let artist = song.artist.as_deref()?.trim();
        let mut seen = HashSet::from([artist.to_lowercase()]);
        let others: Vec<&str> = catalog
            .iter()
            .filter_map(|candidate| candidate.artist.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty() && seen.insert(name.to_lowercase()))
            .collect();

        let picked = others.choose_multiple(&mut rand::rng(), ARTIST_DISTRACTORS);
        Self::build(ChallengeKind::Artist, artist, picked.copied())
    }

    fn build<'a>(
        kind: ChallengeKind,
        correct: &str,
        candidates: impl Iterator<Item = &'a str>,
    ) -> Option<Self> {
        if correct.is_empty() {
            return None;
        }

        let mut seen = HashSet::new();
        let mut options: Vec<String> = candidates
            .map(str::trim)
            .filter(|option| !option.is_empty() && seen.insert(option.to_lowercase()))
            .map(str::to_owned)
            .collect();

        if !seen.contains(&correct.to_lowercase()) {
            options.push(correct.to_owned());
        }

        if options.len() < 2 {
            return None;
        }

        options.shuffle(&mut rand::rng());

        Some(Self {
            kind,
            correct_answer: correct.to_owned(),
            options,
            correct_guesses: Vec::new(),
            wrong_guesses: Vec::new(),
        })
    }

    /// Record a first guess from `name` and report whether it matched.
    ///
    /// Callers are responsible for rejecting repeat guesses before calling this.
    pub fn record_guess(&mut self, name: &str, guess: &str, elapsed_secs: f64) -> GuessRecord {
        if self.is_correct(guess) {
            self.correct_guesses.push(CorrectGuess {
                name: name.to_owned(),
                elapsed_secs,
            });
            GuessRecord::Correct {
                rank: self.correct_guesses.len(),
            }
        } else {
            self.wrong_guesses.push(WrongGuess {
                name: name.to_owned(),
                guess: guess.trim().to_owned(),
            });
            GuessRecord::Wrong
        }
    }

    /// Case-insensitive, trimmed comparison with the answer.
    pub fn is_correct(&self, guess: &str) -> bool {
        guess.trim().to_lowercase() == self.correct_answer.to_lowercase()
    }

    pub fn kind(&self) -> ChallengeKind {
        self.kind
    }

    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn correct_guesses(&self) -> &[CorrectGuess] {
        &self.correct_guesses
    }

    pub fn wrong_guesses(&self) -> &[WrongGuess] {
        &self.wrong_guesses
    }
}
