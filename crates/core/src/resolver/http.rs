use futures_util::future::LocalBoxFuture;
use serde::Deserialize;

use super::{SongResolver, SongUrl};
use crate::{config::ResolverConfig, Result, TuneBridgeError};

#[derive(Debug, Deserialize)]
struct SongUrlResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    data: Vec<SongUrl>,
}

/// Resolver that asks a music API for song URLs.
///
/// Issues `GET {endpoint}?id={song_id}` and expects
/// `{"code": 200, "data": [{"url": ..., "br": ...}]}`. A `code` other than
/// 200 is reported as a resolve error.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpResolver {
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        #[cfg(not(target_arch = "wasm32"))]
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        #[cfg(target_arch = "wasm32")]
        let client = reqwest::Client::new();

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(&self, song_id: &str) -> Result<Vec<SongUrl>> {
        tracing::debug!(song_id, endpoint = %self.endpoint, "requesting song url");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id", song_id)])
            .send()
            .await?
            .error_for_status()?;
        let body: SongUrlResponse = response.json().await?;

        match body.code {
            Some(200) | None => Ok(body.data),
            Some(code) => Err(TuneBridgeError::resolve(
                song_id,
                format!("service answered with code {code}"),
            )),
        }
    }
}

impl SongResolver for HttpResolver {
    fn resolve<'a>(&'a self, song_id: &'a str) -> LocalBoxFuture<'a, Result<Vec<SongUrl>>> {
        Box::pin(self.fetch(song_id))
    }
}
