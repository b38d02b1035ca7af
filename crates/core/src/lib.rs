//! Core library for the TuneBridge playback controller.
//!
//! A [`MediaAdapter`] keeps one media element in step with an application
//! player store: store changes drive the element, element events update the
//! store, and the first play builds a frequency analyser whose spectrum is
//! published for visualisers. The element, the store, the URL resolver and
//! the audio graph are all traits so the same adapter runs in the browser
//! (see `web`, `wasm32` only) and natively over [`SimulatedMedia`].

pub mod adapter;
pub mod analysis;
pub mod config;
pub mod error;
pub mod media;
pub mod resolver;
pub mod store;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use adapter::{MediaAdapter, ResolveTicket};
pub use analysis::{
    AnalyserHandle, AnalysisGraph, AudioGraphFactory, FrequencyAnalyser, FrequencyBuffer,
    SampleSource, SampleTap, SpectrumAnalyser, SpectrumGraphFactory,
};
pub use config::{AnalysisConfig, AppConfig, MediaConfig, ResolverConfig};
pub use error::{Result, TuneBridgeError};
pub use media::{EventInbox, MediaElement, MediaEvent, SimulatedMedia, Subscription};
pub use resolver::{playable_url, CatalogEntry, HttpResolver, SongResolver, SongUrl, StaticResolver};
pub use store::{Direction, MemoryStore, PlayMode, PlayerStore, Song, StoreField};
#[cfg(target_arch = "wasm32")]
pub use web::{WebAnalyser, WebAudioGraphFactory, WebMediaElement};
