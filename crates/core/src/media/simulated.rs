use std::{cell::RefCell, f32::consts::PI, fmt, rc::Rc};

use super::{EventInbox, MediaElement, MediaEvent, Subscription};
use crate::{
    analysis::{SampleSource, SampleTap},
    Result, TuneBridgeError,
};

type Listeners = Rc<RefCell<Vec<(u64, EventInbox)>>>;

/// Headless media element.
///
/// It behaves like a browser `<audio>` element as far as the adapter can
/// observe: clearing the source raises `error`, loading is completed by the
/// host through [`finish_loading`](Self::finish_loading), and
/// [`advance`](Self::advance) moves the playhead, emits `timeupdate` and
/// `ended`, and renders a sine tone into an attached [`SampleTap`].
pub struct SimulatedMedia {
    src: String,
    volume: f64,
    current_time: f64,
    duration: f64,
    buffered_end: Option<f64>,
    looping: bool,
    paused: bool,
    loading: bool,
    preload: String,
    cross_origin: Option<String>,
    reject_play: bool,
    play_calls: usize,
    pause_calls: usize,
    sample_rate: u32,
    tone_hz: f32,
    phase: f32,
    tap: Option<SampleTap>,
    listeners: Listeners,
    next_listener: u64,
}

impl SimulatedMedia {
    /// Returns a paused element without a source that renders at `sample_rate`.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            src: String::new(),
            volume: 1.0,
            current_time: 0.0,
            duration: f64::NAN,
            buffered_end: None,
            looping: false,
            paused: true,
            loading: false,
            preload: String::new(),
            cross_origin: None,
            reject_play: false,
            play_calls: 0,
            pause_calls: 0,
            sample_rate,
            tone_hz: 440.0,
            phase: 0.0,
            tap: None,
            listeners: Rc::new(RefCell::new(Vec::new())),
            next_listener: 0,
        }
    }

    /// Frequency of the tone rendered while playing.
    pub fn with_tone(mut self, tone_hz: f32) -> Self {
        self.tone_hz = tone_hz;
        self
    }

    /// Makes every later `play()` call fail, as a browser does when the
    /// autoplay policy blocks playback.
    pub fn reject_play(&mut self, reject: bool) {
        self.reject_play = reject;
    }

    /// Returns whether playback is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether a source was set and has not finished loading yet.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Returns the preload hint set on mount.
    pub fn preload(&self) -> &str {
        &self.preload
    }

    /// Returns the CORS mode set on mount.
    pub fn cross_origin(&self) -> Option<&str> {
        self.cross_origin.as_deref()
    }

    /// Returns how many times `play()` was called.
    pub fn play_calls(&self) -> usize {
        self.play_calls
    }

    /// Returns how many times `pause()` was called.
    pub fn pause_calls(&self) -> usize {
        self.pause_calls
    }

    /// Returns the number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Returns whether an analyser tap is attached.
    pub fn has_tap(&self) -> bool {
        self.tap.is_some()
    }

    /// Delivers `event` to every subscribed inbox.
    pub fn emit(&self, event: MediaEvent) {
        for (_, inbox) in self.listeners.borrow().iter() {
            inbox.push(event);
        }
    }

    /// Completes loading of the current source with the given duration.
    pub fn finish_loading(&mut self, duration: f64) {
        if self.src.is_empty() {
            return;
        }
        self.loading = false;
        self.duration = duration;
        self.buffered_end = Some(duration);
        self.emit(MediaEvent::Progress);
        self.emit(MediaEvent::CanPlay);
        self.emit(MediaEvent::CanPlayThrough);
    }

    /// Aborts loading of the current source with a network or decode error.
    pub fn fail_loading(&mut self) {
        self.loading = false;
        self.emit(MediaEvent::Error);
    }

    /// Reports a buffering stall.
    pub fn stall(&self) {
        self.emit(MediaEvent::Stalled);
    }

    /// Moves the playhead forward by `seconds` of wall-clock time.
    pub fn advance(&mut self, seconds: f64) {
        if self.paused || self.loading || self.src.is_empty() || seconds <= 0.0 {
            return;
        }

        self.render(seconds);
        self.current_time += seconds;
        self.emit(MediaEvent::TimeUpdate);

        if self.duration.is_finite() && self.current_time >= self.duration {
            if self.looping && self.duration > 0.0 {
                self.current_time %= self.duration;
            } else {
                self.current_time = self.duration;
                self.paused = true;
                self.emit(MediaEvent::Pause);
                self.emit(MediaEvent::Ended);
            }
        }
    }

    fn render(&mut self, seconds: f64) {
        let Some(tap) = &self.tap else {
            return;
        };

        let count = ((seconds * self.sample_rate as f64).round() as usize).min(tap.capacity());
        let step = 2.0 * PI * self.tone_hz / self.sample_rate as f32;
        let mut block = Vec::with_capacity(count);
        for _ in 0..count {
            block.push(0.5 * self.phase.sin());
            self.phase = (self.phase + step) % (2.0 * PI);
        }
        tap.push(&block);
    }
}

impl MediaElement for SimulatedMedia {
    fn src(&self) -> String {
        self.src.clone()
    }

    fn set_src(&mut self, src: &str) {
        self.src = src.to_string();
        self.current_time = 0.0;
        self.duration = f64::NAN;
        self.buffered_end = None;
        if src.is_empty() {
            self.loading = false;
            self.paused = true;
            self.emit(MediaEvent::Error);
        } else {
            self.loading = true;
        }
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    fn current_time(&self) -> f64 {
        self.current_time
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.current_time = seconds;
        self.emit(MediaEvent::Seeked);
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn buffered_end(&self) -> Option<f64> {
        self.buffered_end
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn set_preload(&mut self, preload: &str) {
        self.preload = preload.to_string();
    }

    fn set_cross_origin(&mut self, cross_origin: Option<&str>) {
        self.cross_origin = cross_origin.map(str::to_owned);
    }

    fn play(&mut self) -> Result<()> {
        self.play_calls += 1;
        if self.reject_play {
            return Err(TuneBridgeError::msg("play() was rejected"));
        }
        if self.src.is_empty() {
            return Err(TuneBridgeError::msg("no supported source"));
        }
        if self.paused {
            self.paused = false;
            self.emit(MediaEvent::Play);
            if !self.loading {
                self.emit(MediaEvent::Playing);
            }
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.pause_calls += 1;
        if !self.paused {
            self.paused = true;
            self.emit(MediaEvent::Pause);
        }
        Ok(())
    }

    fn subscribe(&mut self, inbox: EventInbox) -> Result<Subscription> {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.borrow_mut().push((id, inbox));

        let listeners = Rc::downgrade(&self.listeners);
        Ok(Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().retain(|(listener, _)| *listener != id);
            }
        }))
    }
}

impl SampleSource for SimulatedMedia {
    fn attach_tap(&mut self, tap: SampleTap) -> Result<()> {
        if self.tap.is_some() {
            return Err(TuneBridgeError::AlreadyBound);
        }
        self.tap = Some(tap);
        Ok(())
    }
}

impl fmt::Debug for SimulatedMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedMedia")
            .field("src", &self.src)
            .field("volume", &self.volume)
            .field("current_time", &self.current_time)
            .field("duration", &self.duration)
            .field("looping", &self.looping)
            .field("paused", &self.paused)
            .field("loading", &self.loading)
            .field("listeners", &self.listener_count())
            .finish()
    }
}
