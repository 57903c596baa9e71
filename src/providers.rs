//! Seams to the outside world: catalog, audio URLs and duration probing.
//!
//! Implementations report failures as `anyhow` errors; the core wraps them
//! into [`CoreError`](crate::error::CoreError) with the origin attached.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::SurahRecord;

/// Supplies the raw list of surahs with their ayah counts.
#[async_trait]
pub trait QuranCatalogProvider: Send + Sync {
    async fn get_all_surahs(&self) -> Result<Vec<SurahRecord>>;
}

/// Resolves the audio URL of one ayah in one edition.
#[async_trait]
pub trait QuranContentProvider: Send + Sync {
    /// `Ok(None)` when the edition has no audio for that ayah.
    async fn get_ayah_audio_url(&self, global_number: u32, edition_id: &str) -> Result<Option<String>>;
}

/// Loads media metadata to find a clip's playback length.
#[async_trait]
pub trait AudioProbe: Send + Sync {
    /// Duration in seconds, `Ok(None)` if the media does not expose one.
    async fn get_duration(&self, url: &str) -> Result<Option<f64>>;
}
