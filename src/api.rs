use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::time::{Duration, sleep};
use tracing::debug;

use crate::config::CoreConfig;
use crate::models::{EditionInfo, SurahRecord};
use crate::providers::{AudioProbe, QuranCatalogProvider, QuranContentProvider};

/// alquran.cloud wraps every payload as `{code, status, data}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AyahAudio {
    #[serde(default)]
    audio: Option<String>,
    #[serde(default)]
    audio_secondary: Vec<String>,
}

impl AyahAudio {
    fn best_url(self) -> Option<String> {
        self.audio
            .filter(|u| !u.is_empty())
            .or_else(|| self.audio_secondary.into_iter().find(|u| !u.is_empty()))
    }
}

/// Catalog + audio URL provider backed by the alquran.cloud REST API.
#[derive(Debug, Clone)]
pub struct AlQuranCloud {
    client: Client,
    base: String,
    max_retries: u32,
}

impl AlQuranCloud {
    pub fn new(client: Client, config: &CoreConfig) -> Self {
        Self {
            client,
            base: config.api_base.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        }
    }

    /// `Ok(None)` on HTTP 404; backs off and retries on HTTP 429.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let mut tries = 0u32;
        loop {
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .with_context(|| format!("send failed: {url}"))?;

            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS && tries < self.max_retries {
                let wait = Duration::from_millis(250 * (1 << tries.min(6)));
                debug!(url, ?wait, "rate limited, backing off");
                sleep(wait).await;
                tries += 1;
                continue;
            }
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }

            let resp = resp
                .error_for_status()
                .with_context(|| format!("HTTP {status} for {url}"))?;

            let envelope = resp
                .json::<Envelope<T>>()
                .await
                .with_context(|| format!("decode response from {url}"))?;
            return Ok(Some(envelope.data));
        }
    }

    pub async fn list_audio_editions(&self) -> Result<Vec<EditionInfo>> {
        let url = format!("{}/edition?format=audio", self.base);
        Ok(self.get_json(&url).await?.unwrap_or_default())
    }
}

#[async_trait]
impl QuranCatalogProvider for AlQuranCloud {
    async fn get_all_surahs(&self) -> Result<Vec<SurahRecord>> {
        let url = format!("{}/surah", self.base);
        self.get_json(&url)
            .await?
            .with_context(|| format!("surah catalog not found at {url}"))
    }
}

#[async_trait]
impl QuranContentProvider for AlQuranCloud {
    async fn get_ayah_audio_url(&self, global_number: u32, edition_id: &str) -> Result<Option<String>> {
        let url = format!("{}/ayah/{global_number}/{edition_id}", self.base);
        let ayah: Option<AyahAudio> = self.get_json(&url).await?;
        Ok(ayah.and_then(AyahAudio::best_url))
    }
}

/// Estimates duration from `Content-Length` for constant-bitrate MP3 streams.
#[derive(Debug, Clone)]
pub struct BitrateAudioProbe {
    client: Client,
    bitrate_kbps: u32,
}

impl BitrateAudioProbe {
    pub fn new(client: Client, config: &CoreConfig) -> Self {
        Self {
            client,
            bitrate_kbps: config.audio_bitrate_kbps,
        }
    }
}

/// Seconds of audio in `bytes` at `bitrate_kbps`.
pub fn estimate_duration(bytes: u64, bitrate_kbps: u32) -> Option<f64> {
    if bytes == 0 || bitrate_kbps == 0 {
        return None;
    }
    Some(bytes as f64 * 8.0 / (f64::from(bitrate_kbps) * 1000.0))
}

#[async_trait]
impl AudioProbe for BitrateAudioProbe {
    async fn get_duration(&self, url: &str) -> Result<Option<f64>> {
        let resp = self
            .client
            .head(url)
            .send()
            .await
            .with_context(|| format!("HEAD failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("HEAD {url}"))?;

        let length = resp
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        Ok(length.and_then(|bytes| estimate_duration(bytes, self.bitrate_kbps)))
    }
}
