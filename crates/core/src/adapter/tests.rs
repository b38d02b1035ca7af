use std::{cell::Cell, rc::Rc};

use futures_util::future::{self, LocalBoxFuture};

use super::*;
use crate::{
    analysis::SpectrumGraphFactory,
    config::AnalysisConfig,
    media::SimulatedMedia,
    resolver::StaticResolver,
    store::{Direction, MemoryStore, Song},
};

/// Wraps the spectrum factory to count constructions and inject failures.
struct CountingFactory {
    created: Rc<Cell<usize>>,
    fail_next: bool,
}

impl AudioGraphFactory<SimulatedMedia> for CountingFactory {
    fn create(
        &mut self,
        media: &mut SimulatedMedia,
        config: &AnalysisConfig,
    ) -> Result<AnalyserHandle> {
        if self.fail_next {
            self.fail_next = false;
            return Err(TuneBridgeError::AudioGraph(
                "the AudioContext was not allowed to start".into(),
            ));
        }
        self.created.set(self.created.get() + 1);
        SpectrumGraphFactory.create(media, config)
    }
}

type TestAdapter = MediaAdapter<SimulatedMedia, MemoryStore, StaticResolver, CountingFactory>;

fn catalog() -> StaticResolver {
    StaticResolver::new()
        .with("s1", Some("https://x/s1.mp3"))
        .with("s2", Some("https://x/s2.mp3"))
        .with("s3", Some("https://x/s3.mp3"))
        .with("dead", None)
        .with("dead2", None)
}

fn mount_with(ids: &[&str], fail_graph: bool) -> (TestAdapter, Rc<Cell<usize>>) {
    let mut store = MemoryStore::with_seed(11);
    store.set_playlist(ids.iter().map(|id| Song::new(*id)).collect());
    let created = Rc::new(Cell::new(0));
    let factory = CountingFactory {
        created: created.clone(),
        fail_next: fail_graph,
    };
    let adapter = MediaAdapter::mount(
        SimulatedMedia::new(48_000),
        store,
        catalog(),
        factory,
        &AppConfig::default(),
    )
    .unwrap();
    (adapter, created)
}

fn mount(ids: &[&str]) -> TestAdapter {
    mount_with(ids, false).0
}

/// Selects `id` for playback and applies its URL without going through the
/// resolver.
fn start(adapter: &mut TestAdapter, id: &str, url: &str) {
    adapter.store_mut().play_song(id);
    adapter.pump().unwrap();
    let ticket = adapter.take_pending().pop().expect("song change queues a lookup");
    adapter.complete_resolution(ticket, Ok(vec![SongUrl::playable(url)]));
    adapter.pump().unwrap();
}

#[test]
fn mount_configures_the_element_for_cross_origin_analysis() {
    let adapter = mount(&[]);
    let media = adapter.media();
    assert_eq!(media.preload(), "auto");
    assert_eq!(media.cross_origin(), Some("anonymous"));
    assert!(!media.is_looping());
    assert_eq!(media.listener_count(), 1);
    assert!(adapter.is_subscribed());
    assert!(!adapter.is_graph_built());
}

#[test]
fn resolved_url_becomes_the_source_and_starts_playback() {
    let mut adapter = mount(&["s1"]);
    adapter.store_mut().play_song("s1");
    adapter.pump().unwrap();
    adapter.store_mut().set_buffered_time(42.0);

    let ticket = adapter.take_pending().pop().unwrap();
    assert_eq!(ticket.song_id(), "s1");
    adapter.complete_resolution(ticket, Ok(vec![SongUrl::playable("https://x/s1.mp3")]));

    let store = adapter.store();
    assert_eq!(store.buffered_time(), 0.0);
    assert!(store.is_playing());
    assert_eq!(adapter.media().src(), "https://x/s1.mp3");
}

#[test]
fn resolved_url_does_not_start_playback_without_intent() {
    let mut adapter = mount(&["s1"]);
    adapter.store_mut().select_song("s1");
    adapter.pump().unwrap();

    let ticket = adapter.take_pending().pop().unwrap();
    adapter.complete_resolution(ticket, Ok(vec![SongUrl::playable("https://x/s1.mp3")]));
    adapter.pump().unwrap();

    assert!(!adapter.store().is_playing());
    assert_eq!(adapter.media().play_calls(), 0);
}

#[test]
fn song_change_requests_lyrics() {
    let mut adapter = mount(&["s1", "s2"]);
    adapter.store_mut().play_song("s1");
    adapter.pump().unwrap();
    adapter.store_mut().play_song("s2");
    adapter.pump().unwrap();

    assert_eq!(adapter.store().lyrics_requests(), ["s1", "s2"]);
}

#[test]
fn missing_url_skips_in_the_current_direction() {
    let mut adapter = mount(&["s1", "dead", "s3"]);
    start(&mut adapter, "s3", "https://x/s3.mp3");

    adapter.store_mut().prev_song();
    adapter.pump().unwrap();
    assert_eq!(adapter.store().current_song_id(), Some("dead"));
    let before = adapter.store().navigations().len();

    let ticket = adapter.take_pending().pop().unwrap();
    adapter.complete_resolution(ticket, Ok(vec![SongUrl::unplayable()]));

    let navigations = &adapter.store().navigations()[before..];
    assert_eq!(navigations, [Direction::Prev]);
    assert_eq!(adapter.store().current_song_id(), Some("s1"));
}

#[test]
fn failed_lookup_is_treated_as_unplayable() {
    let mut adapter = mount(&["s1", "s2"]);
    adapter.store_mut().play_song("s1");
    adapter.pump().unwrap();

    let ticket = adapter.take_pending().pop().unwrap();
    adapter.complete_resolution(ticket, Err(TuneBridgeError::resolve("s1", "timed out")));

    assert_eq!(adapter.store().navigations(), [Direction::Next]);
    assert_eq!(adapter.store().current_song_id(), Some("s2"));
    assert_eq!(adapter.media().src(), "");
}

#[test]
fn stale_lookups_are_discarded() {
    let mut adapter = mount(&["s1", "s2"]);
    adapter.store_mut().play_song("s1");
    adapter.pump().unwrap();
    let first = adapter.take_pending().pop().unwrap();

    adapter.store_mut().play_song("s2");
    adapter.pump().unwrap();
    let second = adapter.take_pending().pop().unwrap();
    assert!(!adapter.is_current(&first));

    adapter.complete_resolution(second, Ok(vec![SongUrl::playable("https://x/s2.mp3")]));
    adapter.complete_resolution(first, Ok(vec![SongUrl::playable("https://x/s1.mp3")]));

    assert_eq!(adapter.media().src(), "https://x/s2.mp3");
    assert!(adapter.store().navigations().is_empty());
}

#[test]
fn a_newer_song_change_drops_queued_lookups() {
    let mut adapter = mount(&["s1", "s2"]);
    adapter.store_mut().play_song("s1");
    adapter.pump().unwrap();
    adapter.store_mut().play_song("s2");
    adapter.pump().unwrap();

    let pending: Vec<_> = adapter.pending_resolutions().map(|t| t.song_id()).collect();
    assert_eq!(pending, ["s2"]);
}

#[test]
fn clearing_the_song_empties_the_source_once() {
    let mut adapter = mount(&["s1"]);
    start(&mut adapter, "s1", "https://x/s1.mp3");
    assert!(adapter.store().is_playing());

    adapter.store_mut().clear_playlist();
    adapter.pump().unwrap();

    assert_eq!(adapter.media().src(), "");
    // The error raised by clearing the source triggers one bounded skip.
    assert_eq!(adapter.store().navigations(), [Direction::Next]);

    adapter.handle_change(StoreField::CurrentSongId).unwrap();
    adapter.pump().unwrap();
    assert_eq!(adapter.media().src(), "");
    assert_eq!(adapter.store().navigations().len(), 1);
}

#[test]
fn error_event_moves_forward_when_heading_next() {
    let mut adapter = mount(&["s1", "s2"]);
    start(&mut adapter, "s1", "https://x/s1.mp3");

    adapter.media().emit(MediaEvent::Error);
    adapter.pump().unwrap();

    assert_eq!(adapter.store().navigations(), [Direction::Next]);
    assert_eq!(adapter.store().current_song_id(), Some("s2"));
}

#[test]
fn ended_advances_except_in_single_mode() {
    let mut adapter = mount(&["s1", "s2"]);
    start(&mut adapter, "s1", "https://x/s1.mp3");

    adapter.store_mut().set_play_mode(PlayMode::Single);
    adapter.pump().unwrap();
    assert!(adapter.media().is_looping());

    adapter.media().emit(MediaEvent::Ended);
    adapter.pump().unwrap();
    assert!(adapter.store().navigations().is_empty());

    adapter.store_mut().set_play_mode(PlayMode::ListLoop);
    adapter.pump().unwrap();
    assert!(!adapter.media().is_looping());

    adapter.media().emit(MediaEvent::Ended);
    adapter.pump().unwrap();
    assert_eq!(adapter.store().navigations(), [Direction::Next]);
    assert_eq!(adapter.store().current_song_id(), Some("s2"));
}

#[test]
fn element_events_update_the_store() {
    let mut adapter = mount(&["s1"]);
    start(&mut adapter, "s1", "https://x/s1.mp3");
    let plays_before = adapter.media().play_calls();

    adapter.media_mut().finish_loading(200.0);
    adapter.pump().unwrap();
    assert_eq!(adapter.store().buffered_time(), 200.0);
    assert_eq!(adapter.store().total_time(), 200.0);
    assert_eq!(adapter.media().play_calls(), plays_before + 1);

    adapter.media_mut().advance(1.5);
    adapter.pump().unwrap();
    assert!((adapter.store().current_time() - 1.5).abs() < 1e-9);
}

#[test]
fn canplaythrough_pauses_when_not_playing() {
    let mut adapter = mount(&["s1"]);
    adapter.store_mut().select_song("s1");
    adapter.pump().unwrap();
    let ticket = adapter.take_pending().pop().unwrap();
    adapter.complete_resolution(ticket, Ok(vec![SongUrl::playable("https://x/s1.mp3")]));

    adapter.media_mut().finish_loading(30.0);
    adapter.pump().unwrap();

    assert_eq!(adapter.media().play_calls(), 0);
    assert_eq!(adapter.media().pause_calls(), 1);
}

#[test]
fn graph_is_built_once_on_the_first_play() {
    let (mut adapter, created) = mount_with(&["s1"], false);
    assert_eq!(created.get(), 0);

    for _ in 0..3 {
        adapter.store_mut().set_is_playing(true);
        adapter.pump().unwrap();
        adapter.store_mut().set_is_playing(false);
        adapter.pump().unwrap();
    }

    assert_eq!(created.get(), 1);
    assert!(adapter.is_graph_built());
    assert!(adapter.media().has_tap());

    let published = adapter.store().data_array().unwrap();
    assert_eq!(published.len(), 256);
    assert!(published.same_buffer(adapter.frequency_buffer().unwrap()));
}

#[test]
fn graph_failure_surfaces_and_retries_on_the_next_play() {
    let (mut adapter, created) = mount_with(&["s1"], true);

    adapter.store_mut().set_is_playing(true);
    assert!(adapter.pump().is_err());
    assert!(!adapter.is_graph_built());

    adapter.store_mut().set_is_playing(false);
    adapter.pump().unwrap();
    adapter.store_mut().set_is_playing(true);
    adapter.pump().unwrap();

    assert_eq!(created.get(), 1);
    assert!(adapter.is_graph_built());
}

#[test]
fn graph_failure_still_runs_the_song_change() {
    let (mut adapter, _) = mount_with(&["s1"], true);
    adapter.store_mut().set_is_playing(true);
    adapter.store_mut().select_song("s1");

    assert!(adapter.pump().is_err());
    adapter.pump().unwrap();

    let pending: Vec<_> = adapter.pending_resolutions().map(|t| t.song_id()).collect();
    assert_eq!(pending, ["s1"]);
    assert_eq!(adapter.store().lyrics_requests(), ["s1"]);
}

#[test]
fn play_flag_without_a_song_leaves_the_element_alone() {
    let mut adapter = mount(&["s1"]);
    adapter.store_mut().set_is_playing(true);
    adapter.pump().unwrap();
    adapter.store_mut().set_is_playing(false);
    adapter.pump().unwrap();

    assert_eq!(adapter.media().play_calls(), 0);
    assert_eq!(adapter.media().pause_calls(), 0);
}

#[test]
fn clearing_the_play_flag_pauses_the_element() {
    let mut adapter = mount(&["s1"]);
    start(&mut adapter, "s1", "https://x/s1.mp3");
    assert!(!adapter.media().is_paused());
    let pauses = adapter.media().pause_calls();

    adapter.store_mut().set_is_playing(false);
    adapter.pump().unwrap();

    assert_eq!(adapter.media().pause_calls(), pauses + 1);
    assert!(adapter.media().is_paused());
}

#[test]
fn spectrum_follows_the_playing_tone() {
    let mut adapter = mount(&["s1"]);
    start(&mut adapter, "s1", "https://x/s1.mp3");
    adapter.media_mut().finish_loading(60.0);
    adapter.pump().unwrap();

    let buffer = adapter.frequency_buffer().unwrap().clone();
    adapter.media_mut().advance(0.5);
    assert!(adapter.refresh_spectrum());

    // The simulated element renders 440 Hz, bin width is 93.75 Hz.
    let (peak, value) = buffer.peak().unwrap();
    assert!((4..=6).contains(&peak), "peak landed in bin {peak}");
    assert!(value > 0);
}

#[test]
fn seek_request_is_applied_once_and_cleared() {
    let mut adapter = mount(&["s1"]);
    start(&mut adapter, "s1", "https://x/s1.mp3");

    adapter.store_mut().seek(12.5);
    adapter.pump().unwrap();
    assert_eq!(adapter.media().current_time(), 12.5);
    assert_eq!(adapter.store().time_to_play(), None);

    adapter.media_mut().set_current_time(0.0);
    adapter.pump().unwrap();
    assert_eq!(adapter.media().current_time(), 0.0);

    adapter.store_mut().seek(12.5);
    adapter.pump().unwrap();
    assert_eq!(adapter.media().current_time(), 12.5);
}

#[test]
fn volume_is_written_through() {
    let mut adapter = mount(&[]);
    for volume in [0.0, 0.35, 1.0] {
        adapter.store_mut().set_volume(volume);
        adapter.pump().unwrap();
        assert_eq!(adapter.media().volume(), volume);
    }
}

#[test]
fn rejected_play_is_not_fatal() {
    let mut adapter = mount(&["s1"]);
    adapter.media_mut().reject_play(true);
    start(&mut adapter, "s1", "https://x/s1.mp3");

    assert!(adapter.store().is_playing());
    assert!(adapter.media().is_paused());
}

#[test]
fn unmount_removes_listeners() {
    let adapter = mount(&[]);
    let (media, _store, _resolver) = adapter.unmount();
    assert_eq!(media.listener_count(), 0);
}

#[tokio::test]
async fn resolve_pending_skips_unplayable_tracks() {
    let mut adapter = mount(&["dead", "s2"]);
    adapter.store_mut().play_song("dead");
    adapter.pump().unwrap();

    adapter.resolve_pending().await.unwrap();

    let store = adapter.store();
    assert_eq!(store.current_song_id(), Some("s2"));
    assert!(store.is_playing());
    assert_eq!(store.lyrics_requests(), ["dead", "s2"]);
    assert_eq!(adapter.media().src(), "https://x/s2.mp3");
    assert!(adapter.is_graph_built());
    assert!(adapter.pending_resolutions().next().is_none());
}

struct FailingResolver;

impl SongResolver for FailingResolver {
    fn resolve<'a>(&'a self, song_id: &'a str) -> LocalBoxFuture<'a, Result<Vec<SongUrl>>> {
        Box::pin(future::ready(Err(TuneBridgeError::resolve(
            song_id,
            "connection refused",
        ))))
    }
}

#[tokio::test]
async fn resolver_errors_skip_without_retrying() {
    let mut store = MemoryStore::with_seed(5);
    store.set_playlist(vec![Song::new("a"), Song::new("b")]);
    let mut adapter = MediaAdapter::mount(
        SimulatedMedia::new(48_000),
        store,
        FailingResolver,
        SpectrumGraphFactory,
        &AppConfig::default(),
    )
    .unwrap();

    adapter.store_mut().play_song("a");
    adapter.pump().unwrap();
    adapter.resolve_pending().await.unwrap();

    // a fails and skips to b; once b fails too every track has been tried.
    assert_eq!(adapter.store().navigations(), [Direction::Next]);
    assert_eq!(adapter.store().current_song_id(), Some("b"));
    assert!(!adapter.store().is_playing());
    assert_eq!(adapter.media().src(), "");
}

#[tokio::test]
async fn wrapping_modes_stop_once_every_track_failed() {
    for mode in [PlayMode::ListLoop, PlayMode::Shuffle] {
        let mut adapter = mount(&["dead", "dead2"]);
        adapter.store_mut().set_play_mode(mode);
        adapter.store_mut().play_song("dead");
        adapter.pump().unwrap();

        adapter.resolve_pending().await.unwrap();

        let store = adapter.store();
        assert_eq!(store.navigations(), [Direction::Next], "{mode:?}");
        assert_eq!(store.current_song_id(), Some("dead2"), "{mode:?}");
        assert!(!store.is_playing());
        assert!(adapter.pending_resolutions().next().is_none());
        assert_eq!(adapter.media().src(), "");
    }
}

#[tokio::test]
async fn a_track_that_loads_resets_the_skip_budget() {
    let mut adapter = mount(&["s1", "dead", "s3"]);
    adapter.store_mut().set_play_mode(PlayMode::ListLoop);
    start(&mut adapter, "s1", "https://x/s1.mp3");

    adapter.media().emit(MediaEvent::Error);
    adapter.pump().unwrap();
    adapter.resolve_pending().await.unwrap();
    assert_eq!(adapter.store().current_song_id(), Some("s3"));

    adapter.media_mut().finish_loading(30.0);
    adapter.pump().unwrap();
    adapter.media().emit(MediaEvent::Error);
    adapter.pump().unwrap();

    assert_eq!(adapter.store().current_song_id(), Some("s1"));
    assert!(adapter.store().is_playing());
}
