//! Song id to playable URL resolution.

mod http;

use std::collections::HashMap;

use futures_util::future::{self, LocalBoxFuture};
use serde::{Deserialize, Serialize};

pub use http::HttpResolver;

use crate::{store::Song, Result};

/// One candidate returned by a resolver. A missing URL marks the song as
/// unplayable (region locked, paid, removed).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongUrl {
    #[serde(default)]
    pub url: Option<String>,
    /// Bitrate in bits per second, when the service reports one.
    #[serde(default, rename = "br")]
    pub bitrate: Option<u64>,
}

impl SongUrl {
    /// Returns a candidate carrying `url`.
    pub fn playable(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            bitrate: None,
        }
    }

    /// Returns a candidate without a URL.
    pub fn unplayable() -> Self {
        Self::default()
    }
}

/// URL of the first candidate, if it carries a non-empty one.
pub fn playable_url(entries: &[SongUrl]) -> Option<&str> {
    entries
        .first()
        .and_then(|entry| entry.url.as_deref())
        .filter(|url| !url.is_empty())
}

/// Asynchronous lookup of playable URLs for a song id.
pub trait SongResolver {
    /// Returns the candidates for `song_id`, best first.
    fn resolve<'a>(&'a self, song_id: &'a str) -> LocalBoxFuture<'a, Result<Vec<SongUrl>>>;
}

/// Catalogue entry used to seed a [`StaticResolver`] and a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl From<&CatalogEntry> for Song {
    fn from(entry: &CatalogEntry) -> Self {
        Song {
            id: entry.id.clone(),
            name: entry.name.clone(),
            artist: entry.artist.clone(),
        }
    }
}

/// Resolver backed by an in-memory map. Unknown ids resolve to no candidates.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    urls: HashMap<String, Option<String>>,
}

impl StaticResolver {
    /// Returns an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a resolver knowing every catalogue entry.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a CatalogEntry>) -> Self {
        let mut resolver = Self::new();
        for entry in entries {
            resolver.insert(entry.id.clone(), entry.url.clone());
        }
        resolver
    }

    /// Registers `song_id`; `None` marks it unplayable.
    pub fn insert(&mut self, song_id: impl Into<String>, url: Option<String>) {
        self.urls.insert(song_id.into(), url);
    }

    /// Returns the resolver with `song_id` registered.
    pub fn with(mut self, song_id: impl Into<String>, url: Option<&str>) -> Self {
        self.insert(song_id, url.map(str::to_owned));
        self
    }
}

impl SongResolver for StaticResolver {
    fn resolve<'a>(&'a self, song_id: &'a str) -> LocalBoxFuture<'a, Result<Vec<SongUrl>>> {
        let entries = match self.urls.get(song_id) {
            Some(Some(url)) => vec![SongUrl::playable(url.clone())],
            Some(None) => vec![SongUrl::unplayable()],
            None => Vec::new(),
        };
        Box::pin(future::ready(Ok(entries)))
    }
}
