//! Player state contract consumed by the media adapter.
//!
//! The adapter never reaches for a global store. It is handed something that
//! implements [`PlayerStore`], reads fields through the accessors, writes
//! through the mutators and learns about changes by draining
//! [`PlayerStore::take_changes`].

mod memory;

use serde::{Deserialize, Serialize};

pub use memory::{MemoryStore, Song};

use crate::analysis::{AnalyserHandle, FrequencyBuffer};

/// How the playlist advances once a track finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    /// Play through the list once and stop at either end.
    #[default]
    Order,
    /// Wrap around at the ends of the list.
    ListLoop,
    /// Repeat the current track; the element's native loop flag does the work.
    Single,
    /// Pick a random track on every navigation.
    Shuffle,
}

/// Which neighbour to pick when a track has to be skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Prev,
    #[default]
    Next,
}

/// Store fields the adapter reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreField {
    CurrentSongId,
    IsPlaying,
    Volume,
    TimeToPlay,
    PlayMode,
}

impl StoreField {
    /// Every reactive field, in the order the adapter applies them on mount.
    pub const ALL: [StoreField; 5] = [
        StoreField::PlayMode,
        StoreField::Volume,
        StoreField::IsPlaying,
        StoreField::CurrentSongId,
        StoreField::TimeToPlay,
    ];
}

/// Application-wide player state as seen by the adapter.
///
/// Mutators only record a change (see [`take_changes`](Self::take_changes))
/// when the stored value actually differs from the previous one.
pub trait PlayerStore {
    fn current_song_id(&self) -> Option<&str>;
    fn is_playing(&self) -> bool;
    /// Deferred play intent: the user asked for playback before a URL was known.
    fn should_play(&self) -> bool;
    fn play_mode(&self) -> PlayMode;
    fn volume(&self) -> f64;
    fn current_time(&self) -> f64;
    fn total_time(&self) -> f64;
    fn buffered_time(&self) -> f64;
    /// Pending seek request in seconds.
    fn time_to_play(&self) -> Option<f64>;
    fn current_direction(&self) -> Direction;
    /// Number of tracks navigation can reach.
    fn playlist_len(&self) -> usize;

    fn set_buffered_time(&mut self, seconds: f64);
    fn set_total_time(&mut self, seconds: f64);
    fn set_current_time(&mut self, seconds: f64);
    fn set_analyser(&mut self, analyser: AnalyserHandle);
    fn set_data_array(&mut self, buffer: FrequencyBuffer);
    fn set_time_to_play(&mut self, seconds: Option<f64>);
    fn set_is_playing(&mut self, playing: bool);
    fn next_song(&mut self);
    fn prev_song(&mut self);
    /// Fire-and-forget lyrics fetch for the current song.
    fn get_lyrics(&mut self);

    /// Drains the fields changed since the last call, oldest first.
    fn take_changes(&mut self) -> Vec<StoreField>;

    /// Skips one track in the current navigation direction.
    fn navigate(&mut self) {
        match self.current_direction() {
            Direction::Prev => self.prev_song(),
            Direction::Next => self.next_song(),
        }
    }
}
