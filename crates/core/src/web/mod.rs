//! Browser backend: `<audio>` element and Web Audio analyser.

use std::rc::Rc;

use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{window, AnalyserNode, AudioContext, HtmlAudioElement, MediaElementAudioSourceNode};

use crate::{
    analysis::{AnalyserHandle, AudioGraphFactory, FrequencyAnalyser},
    config::AnalysisConfig,
    media::{EventInbox, MediaElement, MediaEvent, Subscription},
    Result, TuneBridgeError,
};

/// `<audio>` element driven by the adapter.
pub struct WebMediaElement {
    element: HtmlAudioElement,
    bound: bool,
}

impl WebMediaElement {
    /// Looks up the element with `id`, creating and appending a hidden one to
    /// the document body when it does not exist yet.
    pub fn get_or_create(id: &str) -> Result<Self> {
        let document = window()
            .and_then(|w| w.document())
            .ok_or_else(|| TuneBridgeError::msg("no document available"))?;

        if let Some(existing) = document.get_element_by_id(id) {
            let element = existing
                .dyn_into::<HtmlAudioElement>()
                .map_err(|_| TuneBridgeError::msg(format!("#{id} is not an audio element")))?;
            return Ok(Self::from_element(element));
        }

        let element: HtmlAudioElement = document
            .create_element("audio")?
            .dyn_into()
            .map_err(|_| TuneBridgeError::msg("created element is not an audio element"))?;
        element.set_id(id);
        document
            .body()
            .ok_or_else(|| TuneBridgeError::msg("document has no body"))?
            .append_child(&element)?;
        Ok(Self::from_element(element))
    }

    pub fn from_element(element: HtmlAudioElement) -> Self {
        Self {
            element,
            bound: false,
        }
    }

    pub fn element(&self) -> &HtmlAudioElement {
        &self.element
    }
}

impl MediaElement for WebMediaElement {
    fn src(&self) -> String {
        // The `src` property resolves "" against the page URL; the attribute
        // keeps what was actually assigned.
        self.element.get_attribute("src").unwrap_or_default()
    }

    fn set_src(&mut self, src: &str) {
        self.element.set_src(src);
    }

    fn volume(&self) -> f64 {
        self.element.volume()
    }

    fn set_volume(&mut self, volume: f64) {
        self.element.set_volume(volume);
    }

    fn current_time(&self) -> f64 {
        self.element.current_time()
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.element.set_current_time(seconds);
    }

    fn duration(&self) -> f64 {
        self.element.duration()
    }

    fn buffered_end(&self) -> Option<f64> {
        let ranges = self.element.buffered();
        if ranges.length() == 0 {
            return None;
        }
        ranges.end(0).ok()
    }

    fn is_looping(&self) -> bool {
        self.element.loop_()
    }

    fn set_looping(&mut self, looping: bool) {
        self.element.set_loop(looping);
    }

    fn set_preload(&mut self, preload: &str) {
        self.element.set_preload(preload);
    }

    fn set_cross_origin(&mut self, cross_origin: Option<&str>) {
        self.element.set_cross_origin(cross_origin);
    }

    fn play(&mut self) -> Result<()> {
        let promise = self.element.play()?;
        let on_reject = Closure::wrap(Box::new(move |err: JsValue| {
            tracing::warn!(?err, "play() was rejected");
        }) as Box<dyn FnMut(JsValue)>);
        let _ = promise.catch(&on_reject);
        on_reject.forget();
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.element.pause()?;
        Ok(())
    }

    fn subscribe(&mut self, inbox: EventInbox) -> Result<Subscription> {
        let mut listeners = Vec::with_capacity(MediaEvent::ALL.len());
        for event in MediaEvent::ALL {
            let inbox = inbox.clone();
            let callback = Closure::wrap(Box::new(move || inbox.push(event)) as Box<dyn FnMut()>);
            self.element
                .add_event_listener_with_callback(event.name(), callback.as_ref().unchecked_ref())?;
            listeners.push((event, callback));
        }

        let element = self.element.clone();
        Ok(Subscription::new(move || {
            for (event, callback) in listeners {
                let _ = element.remove_event_listener_with_callback(
                    event.name(),
                    callback.as_ref().unchecked_ref(),
                );
            }
        }))
    }
}

/// Web Audio nodes kept alive for the lifetime of the graph.
pub struct WebAnalyser {
    analyser: AnalyserNode,
    _source: MediaElementAudioSourceNode,
    _context: AudioContext,
}

impl FrequencyAnalyser for WebAnalyser {
    fn fft_size(&self) -> usize {
        self.analyser.fft_size() as usize
    }

    fn frequency_bin_count(&self) -> usize {
        self.analyser.frequency_bin_count() as usize
    }

    fn get_byte_frequency_data(&self, out: &mut [u8]) {
        self.analyser.get_byte_frequency_data(out);
    }
}

/// Builds `source -> analyser -> destination` over a [`WebMediaElement`].
#[derive(Debug, Default, Clone, Copy)]
pub struct WebAudioGraphFactory;

impl AudioGraphFactory<WebMediaElement> for WebAudioGraphFactory {
    fn create(&mut self, media: &mut WebMediaElement, config: &AnalysisConfig) -> Result<AnalyserHandle> {
        if media.bound {
            return Err(TuneBridgeError::AlreadyBound);
        }

        let context = AudioContext::new()
            .map_err(|err| TuneBridgeError::AudioGraph(format!("{err:?}")))?;
        let analyser = context.create_analyser()?;
        analyser.set_fft_size(config.fft_size as u32);
        analyser.set_min_decibels(config.min_decibels as f64);
        analyser.set_max_decibels(config.max_decibels as f64);
        analyser.set_smoothing_time_constant(config.smoothing_time_constant as f64);

        let source = context.create_media_element_source(&media.element)?;
        media.bound = true;
        source.connect_with_audio_node(&analyser)?;
        analyser.connect_with_audio_node(&context.destination())?;

        Ok(Rc::new(WebAnalyser {
            analyser,
            _source: source,
            _context: context,
        }))
    }
}
