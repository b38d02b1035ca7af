use std::fmt;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{Direction, PlayMode, PlayerStore, StoreField};
use crate::analysis::{AnalyserHandle, FrequencyBuffer};

/// Playlist entry tracked by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: String,
}

impl Song {
    /// Returns an untitled song with `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            artist: String::new(),
        }
    }
}

/// Single-threaded, in-memory player state with a playlist.
///
/// Navigation is bounded: in [`PlayMode::Order`] moving past either end of
/// the list stops playback instead of wrapping, and an empty playlist makes
/// `next_song`/`prev_song` no-ops. In the wrapping modes the adapter stops
/// skipping once every track has failed in a row.
pub struct MemoryStore {
    playlist: Vec<Song>,
    current_song_id: Option<String>,
    is_playing: bool,
    should_play: bool,
    play_mode: PlayMode,
    volume: f64,
    current_time: f64,
    total_time: f64,
    buffered_time: f64,
    time_to_play: Option<f64>,
    current_direction: Direction,
    analyser: Option<AnalyserHandle>,
    data_array: Option<FrequencyBuffer>,
    lyrics_requests: Vec<String>,
    navigations: Vec<Direction>,
    changes: Vec<StoreField>,
    rng: StdRng,
}

impl MemoryStore {
    /// Returns an empty store with an entropy-seeded shuffle.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates a store whose shuffle order is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            playlist: Vec::new(),
            current_song_id: None,
            is_playing: false,
            should_play: false,
            play_mode: PlayMode::default(),
            volume: 1.0,
            current_time: 0.0,
            total_time: 0.0,
            buffered_time: 0.0,
            time_to_play: None,
            current_direction: Direction::default(),
            analyser: None,
            data_array: None,
            lyrics_requests: Vec::new(),
            navigations: Vec::new(),
            changes: Vec::new(),
            rng,
        }
    }

    /// Returns the tracks navigation moves through.
    pub fn playlist(&self) -> &[Song] {
        &self.playlist
    }

    /// Replaces the playlist without touching the selection.
    pub fn set_playlist(&mut self, songs: Vec<Song>) {
        self.playlist = songs;
    }

    /// Empties the playlist and deselects the current song.
    pub fn clear_playlist(&mut self) {
        self.playlist.clear();
        self.set_is_playing(false);
        self.should_play = false;
        self.select(None);
    }

    /// Selects `id` and records the intent to play it once its URL is known.
    pub fn play_song(&mut self, id: &str) {
        self.should_play = true;
        self.current_direction = Direction::Next;
        if self.current_song_id.as_deref() == Some(id) {
            self.set_is_playing(true);
        } else {
            self.select(Some(id.to_string()));
        }
    }

    /// Selects `id` without asking for playback.
    pub fn select_song(&mut self, id: &str) {
        self.should_play = false;
        self.select(Some(id.to_string()));
    }

    /// Flips both the play flag and the deferred play intent.
    pub fn toggle_playing(&mut self) {
        let playing = !self.is_playing;
        self.should_play = playing;
        self.set_is_playing(playing);
    }

    /// Sets the volume, clamped to `0.0..=1.0`.
    pub fn set_volume(&mut self, volume: f64) {
        let volume = volume.clamp(0.0, 1.0);
        if self.volume != volume {
            self.volume = volume;
            self.changes.push(StoreField::Volume);
        }
    }

    /// Sets how navigation and track ends behave.
    pub fn set_play_mode(&mut self, mode: PlayMode) {
        if self.play_mode != mode {
            self.play_mode = mode;
            self.changes.push(StoreField::PlayMode);
        }
    }

    /// Requests a seek; the adapter applies it and clears the request.
    pub fn seek(&mut self, seconds: f64) {
        self.set_time_to_play(Some(seconds.max(0.0)));
    }

    /// Returns the analyser published by the adapter.
    pub fn analyser(&self) -> Option<&AnalyserHandle> {
        self.analyser.as_ref()
    }

    /// Frequency buffer published by the analysis graph, if it exists yet.
    pub fn data_array(&self) -> Option<&FrequencyBuffer> {
        self.data_array.as_ref()
    }

    /// Song ids for which a lyrics fetch was requested, oldest first.
    pub fn lyrics_requests(&self) -> &[String] {
        &self.lyrics_requests
    }

    /// Every `next_song`/`prev_song` call, oldest first.
    pub fn navigations(&self) -> &[Direction] {
        &self.navigations
    }

    fn current_index(&self) -> Option<usize> {
        let id = self.current_song_id.as_deref()?;
        self.playlist.iter().position(|song| song.id == id)
    }

    fn select(&mut self, id: Option<String>) {
        if self.current_song_id == id {
            return;
        }
        self.current_song_id = id;
        self.current_time = 0.0;
        self.total_time = 0.0;
        self.changes.push(StoreField::CurrentSongId);
    }

    fn step(&mut self, direction: Direction) {
        self.current_direction = direction;
        self.navigations.push(direction);

        let len = self.playlist.len();
        if len == 0 {
            return;
        }

        let target = match (self.play_mode, self.current_index()) {
            (PlayMode::Shuffle, current) => {
                let mut index = self.rng.gen_range(0..len);
                if len > 1 && Some(index) == current {
                    index = (index + 1 + self.rng.gen_range(0..len - 1)) % len;
                }
                Some(index)
            }
            (_, None) => Some(match direction {
                Direction::Next => 0,
                Direction::Prev => len - 1,
            }),
            (mode, Some(index)) => match direction {
                Direction::Next if index + 1 < len => Some(index + 1),
                Direction::Prev if index > 0 => Some(index - 1),
                Direction::Next if mode != PlayMode::Order => Some(0),
                Direction::Prev if mode != PlayMode::Order => Some(len - 1),
                _ => None,
            },
        };

        let Some(target) = target else {
            tracing::debug!(?direction, "reached the end of the playlist");
            self.set_is_playing(false);
            return;
        };

        let id = self.playlist[target].id.clone();
        if self.current_song_id.as_deref() == Some(id.as_str()) {
            // Same track again: restart it rather than waiting for a song change.
            self.set_time_to_play(Some(0.0));
        } else {
            self.should_play = self.should_play || self.is_playing;
            self.select(Some(id));
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("playlist", &self.playlist.len())
            .field("current_song_id", &self.current_song_id)
            .field("is_playing", &self.is_playing)
            .field("should_play", &self.should_play)
            .field("play_mode", &self.play_mode)
            .field("volume", &self.volume)
            .field("current_time", &self.current_time)
            .field("time_to_play", &self.time_to_play)
            .field("current_direction", &self.current_direction)
            .field("analyser", &self.analyser.is_some())
            .finish()
    }
}

impl PlayerStore for MemoryStore {
    fn current_song_id(&self) -> Option<&str> {
        self.current_song_id.as_deref()
    }

    fn is_playing(&self) -> bool {
        self.is_playing
    }

    fn should_play(&self) -> bool {
        self.should_play
    }

    fn play_mode(&self) -> PlayMode {
        self.play_mode
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn current_time(&self) -> f64 {
        self.current_time
    }

    fn total_time(&self) -> f64 {
        self.total_time
    }

    fn buffered_time(&self) -> f64 {
        self.buffered_time
    }

    fn time_to_play(&self) -> Option<f64> {
        self.time_to_play
    }

    fn current_direction(&self) -> Direction {
        self.current_direction
    }

    fn playlist_len(&self) -> usize {
        self.playlist.len()
    }

    fn set_buffered_time(&mut self, seconds: f64) {
        self.buffered_time = seconds;
    }

    fn set_total_time(&mut self, seconds: f64) {
        self.total_time = seconds;
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.current_time = seconds;
    }

    fn set_analyser(&mut self, analyser: AnalyserHandle) {
        self.analyser = Some(analyser);
    }

    fn set_data_array(&mut self, buffer: FrequencyBuffer) {
        self.data_array = Some(buffer);
    }

    fn set_time_to_play(&mut self, seconds: Option<f64>) {
        if self.time_to_play != seconds {
            self.time_to_play = seconds;
            self.changes.push(StoreField::TimeToPlay);
        }
    }

    fn set_is_playing(&mut self, playing: bool) {
        if self.is_playing != playing {
            self.is_playing = playing;
            self.changes.push(StoreField::IsPlaying);
        }
    }

    fn next_song(&mut self) {
        self.step(Direction::Next);
    }

    fn prev_song(&mut self) {
        self.step(Direction::Prev);
    }

    fn get_lyrics(&mut self) {
        if let Some(id) = self.current_song_id.clone() {
            self.lyrics_requests.push(id);
        }
    }

    fn take_changes(&mut self) -> Vec<StoreField> {
        std::mem::take(&mut self.changes)
    }
}
