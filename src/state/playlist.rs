use std::collections::HashSet;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Catalog record for a playable song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Song {
    /// Release year to guess.
    pub year: i32,
    /// Playable reference handed to the media player; unique within a game.
    pub uri: String,
    /// Trivia shown on reveal.
    #[serde(default)]
    pub fun_fact: Option<String>,
    /// Performing artist, used for the artist challenge.
    #[serde(default)]
    pub artist: Option<String>,
    /// Film the song is known from, used for the movie challenge.
    #[serde(default)]
    pub movie: Option<String>,
    /// Movie-title distractors.
    #[serde(default)]
    pub movie_choices: Vec<String>,
}

/// Without-replacement random draw over a private copy of the catalog.
#[derive(Debug, Clone, Default)]
pub struct PlaylistManager {
    songs: Vec<Song>,
    played: HashSet<String>,
}

impl PlaylistManager {
    /// Copy the catalog; the caller's list is never touched.
    pub fn new(songs: &[Song]) -> Self {
        Self {
            songs: songs.to_vec(),
            played: HashSet::new(),
        }
    }

    /// Uniformly random song whose URI has not been played yet.
    pub fn get_next_song(&self) -> Option<&Song> {
        let available: Vec<&Song> = self
            .songs
            .iter()
            .filter(|song| !self.played.contains(&song.uri))
            .collect();

        available.choose(&mut rand::rng()).copied()
    }

    /// Record a URI as played. Marking twice has no further effect.
    pub fn mark_played(&mut self, uri: &str) {
        self.played.insert(uri.to_owned());
    }

    /// True once every song has been played.
    pub fn is_exhausted(&self) -> bool {
        self.played.len() >= self.songs.len()
    }

    /// Make the whole catalog available again.
    pub fn reset(&mut self) {
        self.played.clear();
    }

    /// Songs not yet played.
    pub fn remaining_count(&self) -> usize {
        self.songs
            .iter()
            .filter(|song| !self.played.contains(&song.uri))
            .count()
    }

    /// Catalog size.
    pub fn total_count(&self) -> usize {
        self.songs.len()
    }

    /// Read-only view of the catalog.
    pub fn songs(&self) -> &[Song] {
        &self.songs
    }
}

#[cfg(test)]
pub(crate) fn song(year: i32, uri: &str) -> Song {
    Song {
        year,
        uri: uri.into(),
        fun_fact: None,
        artist: None,
        movie: None,
        movie_choices: Vec::new(),
    }
}
