//! Lazily built frequency-analysis graph.
//!
//! The graph taps the media element, runs its output through an analyser and
//! on to the speakers unchanged. Platforms refuse to start an audio context
//! before a user gesture, so the graph is only built once playback has been
//! requested, and never more than once.

mod spectrum;

use std::{
    cell::{Ref, RefCell},
    fmt,
    rc::Rc,
};

pub use spectrum::{SampleSource, SampleTap, SpectrumAnalyser, SpectrumGraphFactory};

use crate::{config::AnalysisConfig, store::PlayerStore, Result};

/// Source of byte-scaled frequency-domain snapshots.
pub trait FrequencyAnalyser {
    fn fft_size(&self) -> usize;

    fn frequency_bin_count(&self) -> usize {
        self.fft_size() / 2
    }

    /// Writes the current spectrum into `out`, one byte per bin. Extra bins
    /// are dropped when `out` is shorter than the bin count.
    fn get_byte_frequency_data(&self, out: &mut [u8]);
}

/// Shared analyser handle published to the store.
pub type AnalyserHandle = Rc<dyn FrequencyAnalyser>;

/// Platform capability that wires a media element into an analyser.
///
/// Implementations create the processing context, the analyser and a source
/// node bound to `media`, and connect source, analyser and output in that
/// order.
pub trait AudioGraphFactory<M: ?Sized> {
    fn create(&mut self, media: &mut M, config: &AnalysisConfig) -> Result<AnalyserHandle>;
}

/// Fixed-length spectrum buffer whose identity never changes.
///
/// Clones share storage. [`refresh`](Self::refresh) overwrites the contents in
/// place, so readers must re-read rather than hold on to an old copy.
#[derive(Clone)]
pub struct FrequencyBuffer {
    bins: Rc<RefCell<Vec<u8>>>,
}

impl FrequencyBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            bins: Rc::new(RefCell::new(vec![0; len])),
        }
    }

    pub fn len(&self) -> usize {
        self.bins.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pulls a fresh snapshot from `analyser` into the shared storage.
    pub fn refresh(&self, analyser: &dyn FrequencyAnalyser) {
        analyser.get_byte_frequency_data(&mut self.bins.borrow_mut());
    }

    pub fn bins(&self) -> Ref<'_, [u8]> {
        Ref::map(self.bins.borrow(), Vec::as_slice)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bins.borrow().clone()
    }

    /// Whether both handles point at the same storage.
    pub fn same_buffer(&self, other: &FrequencyBuffer) -> bool {
        Rc::ptr_eq(&self.bins, &other.bins)
    }

    /// Index and value of the loudest bin.
    pub fn peak(&self) -> Option<(usize, u8)> {
        self.bins
            .borrow()
            .iter()
            .copied()
            .enumerate()
            .max_by_key(|(_, value)| *value)
    }
}

impl fmt::Debug for FrequencyBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrequencyBuffer")
            .field("len", &self.len())
            .finish()
    }
}

struct BuiltGraph {
    analyser: AnalyserHandle,
    buffer: FrequencyBuffer,
}

/// Guarded-once owner of the analyser and its published buffer.
pub struct AnalysisGraph<F> {
    factory: F,
    config: AnalysisConfig,
    built: Option<BuiltGraph>,
}

impl<F> AnalysisGraph<F> {
    pub fn new(factory: F, config: AnalysisConfig) -> Self {
        Self {
            factory,
            config,
            built: None,
        }
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    pub fn analyser(&self) -> Option<&AnalyserHandle> {
        self.built.as_ref().map(|graph| &graph.analyser)
    }

    pub fn buffer(&self) -> Option<&FrequencyBuffer> {
        self.built.as_ref().map(|graph| &graph.buffer)
    }

    /// Refreshes the published buffer. Returns `false` before the graph exists.
    pub fn refresh(&self) -> bool {
        match &self.built {
            Some(graph) => {
                graph.buffer.refresh(graph.analyser.as_ref());
                true
            }
            None => false,
        }
    }

    /// Builds the graph on first call and publishes it to `store`.
    ///
    /// Returns `Ok(true)` when this call did the construction. A failed
    /// construction leaves the guard open so a later call can retry.
    pub fn ensure_built<M, S>(&mut self, media: &mut M, store: &mut S) -> Result<bool>
    where
        M: ?Sized,
        F: AudioGraphFactory<M>,
        S: PlayerStore + ?Sized,
    {
        if self.built.is_some() {
            return Ok(false);
        }

        let analyser = self.factory.create(media, &self.config)?;
        let buffer = FrequencyBuffer::new(analyser.frequency_bin_count());
        buffer.refresh(analyser.as_ref());

        tracing::debug!(
            fft_size = analyser.fft_size(),
            bins = buffer.len(),
            "analysis graph created"
        );

        store.set_analyser(analyser.clone());
        store.set_data_array(buffer.clone());
        self.built = Some(BuiltGraph { analyser, buffer });
        Ok(true)
    }
}

impl<F> fmt::Debug for AnalysisGraph<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisGraph")
            .field("config", &self.config)
            .field("built", &self.is_built())
            .finish()
    }
}
