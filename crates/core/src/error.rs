/// Result alias that carries the custom [`TuneBridgeError`] type.
pub type Result<T> = std::result::Result<T, TuneBridgeError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum TuneBridgeError {
    /// Free-form failure that does not fit a more specific variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A caller handed over a value the operation cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// The FFT planner rejected the buffers it was given.
    #[error("fft failed: {0}")]
    Fft(#[from] realfft::FftError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    /// The resolver could not produce an answer for a song id.
    #[error("resolving song `{song_id}` failed: {reason}")]
    Resolve { song_id: String, reason: String },
    /// Building the analysis graph failed, typically because the platform
    /// refused to start an audio context.
    #[error("audio graph: {0}")]
    AudioGraph(String),
    /// A source node is already bound to the media element.
    #[error("media element is already bound to an analysis source")]
    AlreadyBound,
    /// Exception raised by a browser API.
    #[cfg(target_arch = "wasm32")]
    #[error("javascript: {0}")]
    Js(String),
}

impl TuneBridgeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn resolve(song_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolve {
            song_id: song_id.into(),
            reason: reason.into(),
        }
    }
}

impl From<&str> for TuneBridgeError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for TuneBridgeError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for TuneBridgeError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        Self::Js(format!("{value:?}"))
    }
}
