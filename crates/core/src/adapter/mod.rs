//! The media adapter: keeps one media element in step with the player store.
//!
//! Data flows both ways. Store changes become imperative writes on the
//! element (source, volume, seek, loop, play/pause) and element events become
//! store mutations (buffered/total/current time, navigation). Everything runs
//! on one thread; [`MediaAdapter::pump`] drains the element inbox and the
//! store change queue until both are quiet.
//!
//! Resolving a song id to a URL is the only asynchronous step. A song change
//! queues a [`ResolveTicket`]; the host awaits [`MediaAdapter::resolve`] (or
//! [`MediaAdapter::resolve_pending`]) to apply it. Every song change bumps a
//! generation counter and results carrying an older generation are dropped,
//! so a slow lookup can never overwrite the source of a newer selection.

use std::collections::VecDeque;

use crate::{
    analysis::{AnalyserHandle, AnalysisGraph, AudioGraphFactory, FrequencyBuffer},
    config::AppConfig,
    media::{EventInbox, MediaElement, MediaEvent, Subscription},
    resolver::{playable_url, SongResolver, SongUrl},
    store::{PlayMode, PlayerStore, StoreField},
    Result, TuneBridgeError,
};

/// Reaction rounds after which [`MediaAdapter::pump`] gives up.
pub const MAX_PUMP_ROUNDS: usize = 100;

/// Pending URL lookup for one song selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveTicket {
    generation: u64,
    song_id: String,
}

impl ResolveTicket {
    /// Returns the song id to look up.
    pub fn song_id(&self) -> &str {
        &self.song_id
    }

    /// Returns the song-change generation this lookup belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Binds a media element `M`, a player store `S`, a URL resolver `R` and an
/// audio graph factory `F` for the lifetime of one mounted player.
pub struct MediaAdapter<M, S, R, F> {
    media: M,
    store: S,
    resolver: R,
    graph: AnalysisGraph<F>,
    inbox: EventInbox,
    subscription: Option<Subscription>,
    generation: u64,
    pending: VecDeque<ResolveTicket>,
    failed_skips: usize,
}

impl<M, S, R, F> MediaAdapter<M, S, R, F>
where
    M: MediaElement,
    S: PlayerStore,
    R: SongResolver,
    F: AudioGraphFactory<M>,
{
    /// Configures the element, subscribes to its events and runs every store
    /// reaction once against the initial state.
    pub fn mount(mut media: M, store: S, resolver: R, factory: F, config: &AppConfig) -> Result<Self> {
        config.validate()?;

        media.set_preload(&config.media.preload);
        media.set_cross_origin(config.media.cross_origin.as_deref());
        media.set_volume(config.media.initial_volume);

        let inbox = EventInbox::new();
        let subscription = media.subscribe(inbox.clone())?;

        let mut adapter = Self {
            media,
            store,
            resolver,
            graph: AnalysisGraph::new(factory, config.analysis.clone()),
            inbox,
            subscription: Some(subscription),
            generation: 0,
            pending: VecDeque::new(),
            failed_skips: 0,
        };

        // Changes made before mount are covered by the initial pass below.
        adapter.store.take_changes();
        for field in StoreField::ALL {
            adapter.handle_change(field)?;
        }

        tracing::debug!("media adapter mounted");
        Ok(adapter)
    }

    /// Removes the element listeners and hands the collaborators back.
    pub fn unmount(mut self) -> (M, S, R) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
        tracing::debug!("media adapter unmounted");
        let Self {
            media,
            store,
            resolver,
            ..
        } = self;
        (media, store, resolver)
    }

    /// Handles queued element events and store changes until neither side
    /// produces anything new.
    ///
    /// A failing reaction does not stop the others drained in the same
    /// round; the first error is returned once the round is done.
    pub fn pump(&mut self) -> Result<()> {
        for _ in 0..MAX_PUMP_ROUNDS {
            let mut idle = true;

            while let Some(event) = self.inbox.pop() {
                idle = false;
                self.handle_event(event);
            }

            let mut failure = None;
            for field in self.store.take_changes() {
                idle = false;
                if let Err(err) = self.handle_change(field) {
                    failure.get_or_insert(err);
                }
            }
            if let Some(err) = failure {
                return Err(err);
            }

            if idle {
                return Ok(());
            }
        }

        Err(TuneBridgeError::msg(format!(
            "store and media element did not settle after {MAX_PUMP_ROUNDS} rounds"
        )))
    }

    /// Applies one element event to the store.
    pub fn handle_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::Progress => {
                if let Some(end) = self.media.buffered_end() {
                    self.store.set_buffered_time(end);
                }
            }
            MediaEvent::CanPlay => {
                self.failed_skips = 0;
                self.store.set_total_time(self.media.duration());
            }
            MediaEvent::CanPlayThrough => self.apply_play_intent(),
            MediaEvent::TimeUpdate => self.store.set_current_time(self.media.current_time()),
            MediaEvent::Ended => {
                // Single mode repeats through the element's loop flag.
                if self.store.play_mode() != PlayMode::Single {
                    self.store.next_song();
                }
            }
            MediaEvent::Error => {
                tracing::warn!(
                    song_id = self.store.current_song_id(),
                    direction = ?self.store.current_direction(),
                    "media element failed to play, skipping"
                );
                self.skip_unplayable();
            }
            MediaEvent::Stalled => {
                tracing::debug!(src = %self.media.src(), "media data unavailable")
            }
            MediaEvent::Play | MediaEvent::Playing | MediaEvent::Pause | MediaEvent::Seeked => {
                tracing::trace!(%event, current_time = self.media.current_time(), "media event")
            }
        }
    }

    /// Runs the reaction for one store field.
    pub fn handle_change(&mut self, field: StoreField) -> Result<()> {
        match field {
            StoreField::IsPlaying => self.on_is_playing()?,
            StoreField::CurrentSongId => self.on_song_changed(),
            StoreField::TimeToPlay => self.on_time_to_play(),
            StoreField::Volume => self.media.set_volume(self.store.volume()),
            StoreField::PlayMode => self
                .media
                .set_looping(self.store.play_mode() == PlayMode::Single),
        }
        Ok(())
    }

    fn on_is_playing(&mut self) -> Result<()> {
        if !self.graph.is_built() && self.store.is_playing() {
            // `is_playing` starts out false, so reaching true means a user
            // gesture has happened and an audio context may start.
            if let Err(err) = self.graph.ensure_built(&mut self.media, &mut self.store) {
                tracing::error!(%err, "failed to build the analysis graph");
                return Err(err);
            }
        }

        if self.store.current_song_id().is_none() {
            return Ok(());
        }
        self.apply_play_intent();
        Ok(())
    }

    fn on_song_changed(&mut self) {
        self.generation += 1;
        self.pending.clear();

        match self.store.current_song_id().map(str::to_owned) {
            None => {
                // Clearing the source raises an error event; only do it once.
                if !self.media.src().is_empty() {
                    self.media.set_src("");
                }
            }
            Some(song_id) => {
                tracing::debug!(%song_id, generation = self.generation, "resolving song url");
                self.pending.push_back(ResolveTicket {
                    generation: self.generation,
                    song_id,
                });
                self.store.get_lyrics();
            }
        }
    }

    fn on_time_to_play(&mut self) {
        if let Some(seconds) = self.store.time_to_play() {
            self.media.set_current_time(seconds);
            self.store.set_time_to_play(None);
        }
    }

    /// Moves past a track that cannot be played, or stops once every track
    /// of the playlist has failed since the last one that loaded.
    fn skip_unplayable(&mut self) {
        self.failed_skips += 1;
        let tracks = self.store.playlist_len();
        if tracks > 0 && self.failed_skips >= tracks {
            tracing::warn!(tracks, "no playable track left, stopping");
            self.failed_skips = 0;
            self.store.set_is_playing(false);
            return;
        }
        self.store.navigate();
    }

    fn apply_play_intent(&mut self) {
        if self.store.is_playing() {
            if let Err(err) = self.media.play() {
                tracing::warn!(%err, "media element refused to play");
            }
        } else if let Err(err) = self.media.pause() {
            tracing::warn!(%err, "media element refused to pause");
        }
    }

    /// Lookups queued by song changes that nobody has picked up yet.
    pub fn pending_resolutions(&self) -> impl Iterator<Item = &ResolveTicket> {
        self.pending.iter()
    }

    /// Hands all queued lookups to the caller, e.g. to run them out of order.
    pub fn take_pending(&mut self) -> Vec<ResolveTicket> {
        self.pending.drain(..).collect()
    }

    /// Whether `ticket` still belongs to the current song selection.
    pub fn is_current(&self, ticket: &ResolveTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Looks up `ticket` with the resolver and applies the outcome.
    ///
    /// Store changes caused by the outcome are left queued for
    /// [`pump`](Self::pump).
    pub async fn resolve(&mut self, ticket: ResolveTicket) {
        let outcome = self.resolver.resolve(&ticket.song_id).await;
        self.complete_resolution(ticket, outcome);
    }

    /// Resolves every queued lookup and pumps after each one.
    pub async fn resolve_pending(&mut self) -> Result<()> {
        while let Some(ticket) = self.pending.pop_front() {
            self.resolve(ticket).await;
            self.pump()?;
        }
        Ok(())
    }

    /// Applies a finished lookup unless a newer song change superseded it.
    ///
    /// A URL becomes the element source; no URL or a failed lookup marks the
    /// track unplayable and skips in the current direction.
    pub fn complete_resolution(&mut self, ticket: ResolveTicket, outcome: Result<Vec<SongUrl>>) {
        if !self.is_current(&ticket) {
            tracing::debug!(
                song_id = %ticket.song_id,
                generation = ticket.generation,
                current = self.generation,
                "discarding stale song url"
            );
            return;
        }

        let entries = match outcome {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(song_id = %ticket.song_id, %err, "song url lookup failed, skipping");
                self.skip_unplayable();
                return;
            }
        };

        match playable_url(&entries) {
            Some(url) => {
                self.store.set_buffered_time(0.0);
                self.media.set_src(url);
                // Flip the flag only now so a paused element never replays the
                // previous track's tail while the lookup is in flight.
                if self.store.should_play() && !self.store.is_playing() {
                    self.store.set_is_playing(true);
                }
            }
            None => {
                tracing::warn!(song_id = %ticket.song_id, "song has no playable url, skipping");
                self.skip_unplayable();
            }
        }
    }

    /// Pulls a fresh spectrum into the published buffer. Returns `false`
    /// before the analysis graph exists.
    pub fn refresh_spectrum(&self) -> bool {
        self.graph.refresh()
    }

    /// Returns whether the analysis graph has been constructed.
    pub fn is_graph_built(&self) -> bool {
        self.graph.is_built()
    }

    /// Returns the analyser once the graph exists.
    pub fn analyser(&self) -> Option<&AnalyserHandle> {
        self.graph.analyser()
    }

    /// Returns the published frequency buffer once the graph exists.
    pub fn frequency_buffer(&self) -> Option<&FrequencyBuffer> {
        self.graph.buffer()
    }

    /// Returns whether the element listeners are still registered.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Returns the bound media element.
    pub fn media(&self) -> &M {
        &self.media
    }

    /// Returns the bound media element for direct control.
    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    /// Returns the player store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the player store for mutation; call [`pump`](Self::pump)
    /// afterwards to run the reactions.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Returns the URL resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }
}

#[cfg(test)]
mod tests;
