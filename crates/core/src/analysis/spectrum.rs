use std::{
    cell::RefCell,
    collections::VecDeque,
    f32::consts::PI,
    fmt,
    rc::Rc,
    sync::Arc,
};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use super::{AnalyserHandle, AudioGraphFactory, FrequencyAnalyser};
use crate::{config::AnalysisConfig, Result, TuneBridgeError};

/// Rolling window of the most recent samples produced by a media source.
#[derive(Clone)]
pub struct SampleTap {
    samples: Rc<RefCell<VecDeque<f32>>>,
    capacity: usize,
}

impl SampleTap {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Rc::new(RefCell::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends samples, dropping the oldest ones beyond capacity.
    pub fn push(&self, block: &[f32]) {
        let mut samples = self.samples.borrow_mut();
        let skip = block.len().saturating_sub(self.capacity);
        samples.extend(&block[skip..]);
        let overflow = samples.len().saturating_sub(self.capacity);
        samples.drain(..overflow);
    }

    /// Copies the newest samples into `out`, right-aligned and zero-padded.
    fn copy_latest(&self, out: &mut [f32]) {
        let samples = self.samples.borrow();
        let available = samples.len().min(out.len());
        let pad = out.len() - available;
        out[..pad].fill(0.0);
        let start = samples.len() - available;
        for (slot, sample) in out[pad..].iter_mut().zip(samples.range(start..)) {
            *slot = *sample;
        }
    }
}

impl fmt::Debug for SampleTap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleTap")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Media element that can feed its decoded output into a [`SampleTap`].
pub trait SampleSource {
    /// Binds `tap` to the element. An element accepts a single tap for its
    /// whole lifetime; later calls fail with [`TuneBridgeError::AlreadyBound`].
    fn attach_tap(&mut self, tap: SampleTap) -> Result<()>;
}

/// Native analyser following the Web Audio byte-frequency algorithm:
/// Blackman window, magnitude scaled by `1/N`, exponential smoothing over
/// time, decibel conversion, then a linear map of `[min_db, max_db]` onto
/// `0..=255`.
pub struct SpectrumAnalyser {
    config: AnalysisConfig,
    tap: SampleTap,
    fft: RefCell<FftResources>,
    smoothed: RefCell<Vec<f32>>,
}

impl SpectrumAnalyser {
    pub fn new(config: &AnalysisConfig, tap: SampleTap) -> Result<Self> {
        let size = config.fft_size;
        if size < 2 || !size.is_power_of_two() {
            return Err(TuneBridgeError::InvalidInput(
                "fft size must be a power of two",
            ));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);
        let fft = FftResources {
            input: plan.make_input_vec(),
            spectrum: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            window: (0..size).map(|index| blackman_value(index, size)).collect(),
            plan,
        };

        Ok(Self {
            config: config.clone(),
            tap,
            fft: RefCell::new(fft),
            smoothed: RefCell::new(vec![0.0; size / 2]),
        })
    }

    /// Writes the smoothed spectrum in decibels into `out`.
    pub fn get_float_frequency_data(&self, out: &mut [f32]) -> Result<()> {
        self.analyse()?;
        let smoothed = self.smoothed.borrow();
        for (slot, magnitude) in out.iter_mut().zip(smoothed.iter()) {
            *slot = to_decibels(*magnitude);
        }
        Ok(())
    }

    fn analyse(&self) -> Result<()> {
        let mut fft = self.fft.borrow_mut();
        let fft = &mut *fft;
        self.tap.copy_latest(&mut fft.input);
        for (sample, weight) in fft.input.iter_mut().zip(&fft.window) {
            *sample *= weight;
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let scale = 1.0 / self.config.fft_size as f32;
        let tau = self.config.smoothing_time_constant;
        let mut smoothed = self.smoothed.borrow_mut();
        for (previous, bin) in smoothed.iter_mut().zip(&fft.spectrum) {
            let magnitude = bin.norm() * scale;
            *previous = tau * *previous + (1.0 - tau) * magnitude;
        }
        Ok(())
    }
}

impl FrequencyAnalyser for SpectrumAnalyser {
    fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    fn get_byte_frequency_data(&self, out: &mut [u8]) {
        if let Err(err) = self.analyse() {
            tracing::warn!(%err, "spectrum analysis failed");
            out.fill(0);
            return;
        }

        let min = self.config.min_decibels;
        let range = self.config.max_decibels - min;
        let smoothed = self.smoothed.borrow();
        for (slot, magnitude) in out.iter_mut().zip(smoothed.iter()) {
            let scaled = (255.0 / range) * (to_decibels(*magnitude) - min);
            *slot = scaled.clamp(0.0, 255.0) as u8;
        }
    }
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("config", &self.config)
            .field("tap", &self.tap)
            .finish()
    }
}

/// Builds [`SpectrumAnalyser`] graphs over any [`SampleSource`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SpectrumGraphFactory;

impl<M: SampleSource + ?Sized> AudioGraphFactory<M> for SpectrumGraphFactory {
    fn create(&mut self, media: &mut M, config: &AnalysisConfig) -> Result<AnalyserHandle> {
        let tap = SampleTap::new(config.fft_size);
        media.attach_tap(tap.clone())?;
        Ok(Rc::new(SpectrumAnalyser::new(config, tap)?))
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    window: Vec<f32>,
}

fn to_decibels(magnitude: f32) -> f32 {
    if magnitude <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * magnitude.log10()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    let phase = 2.0 * PI * index as f32 / len as f32;
    a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
}
