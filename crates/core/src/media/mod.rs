//! Media element contract and event plumbing.

mod simulated;

use std::{cell::RefCell, collections::VecDeque, fmt, rc::Rc};

pub use simulated::SimulatedMedia;

use crate::Result;

/// Lifecycle events raised by a media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEvent {
    Play,
    Playing,
    Pause,
    Progress,
    CanPlay,
    CanPlayThrough,
    TimeUpdate,
    Ended,
    Error,
    Stalled,
    Seeked,
}

impl MediaEvent {
    pub const ALL: [MediaEvent; 11] = [
        MediaEvent::Play,
        MediaEvent::Playing,
        MediaEvent::Pause,
        MediaEvent::Progress,
        MediaEvent::CanPlay,
        MediaEvent::CanPlayThrough,
        MediaEvent::TimeUpdate,
        MediaEvent::Ended,
        MediaEvent::Error,
        MediaEvent::Stalled,
        MediaEvent::Seeked,
    ];

    /// DOM event name.
    pub fn name(self) -> &'static str {
        match self {
            MediaEvent::Play => "play",
            MediaEvent::Playing => "playing",
            MediaEvent::Pause => "pause",
            MediaEvent::Progress => "progress",
            MediaEvent::CanPlay => "canplay",
            MediaEvent::CanPlayThrough => "canplaythrough",
            MediaEvent::TimeUpdate => "timeupdate",
            MediaEvent::Ended => "ended",
            MediaEvent::Error => "error",
            MediaEvent::Stalled => "stalled",
            MediaEvent::Seeked => "seeked",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.name() == name)
    }
}

impl fmt::Display for MediaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// FIFO of element events waiting to be handled. Clones share the queue.
#[derive(Clone, Default)]
pub struct EventInbox {
    queue: Rc<RefCell<VecDeque<MediaEvent>>>,
}

impl EventInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: MediaEvent) {
        self.queue.borrow_mut().push_back(event);
    }

    pub fn pop(&self) -> Option<MediaEvent> {
        self.queue.borrow_mut().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

impl fmt::Debug for EventInbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.queue.borrow().iter()).finish()
    }
}

/// Registered set of element listeners, removed when released or dropped.
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Removes the listeners now instead of at drop time.
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Imperative surface of a single playback element.
pub trait MediaElement {
    /// Current source attribute; empty when no source is set.
    fn src(&self) -> String;
    fn set_src(&mut self, src: &str);
    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64);
    fn duration(&self) -> f64;
    /// End of the first buffered range, if anything is buffered.
    fn buffered_end(&self) -> Option<f64>;
    fn is_looping(&self) -> bool;
    fn set_looping(&mut self, looping: bool);
    fn set_preload(&mut self, preload: &str);
    fn set_cross_origin(&mut self, cross_origin: Option<&str>);
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;

    /// Starts forwarding every [`MediaEvent`] into `inbox` until the returned
    /// subscription is released or dropped.
    fn subscribe(&mut self, inbox: EventInbox) -> Result<Subscription>;
}
