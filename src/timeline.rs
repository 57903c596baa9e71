//! Turns a validated ayah range into offset-stamped audio segments.

use std::pin::pin;
use std::sync::Arc;

use futures_util::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audio_cache::AudioMetadataCache;
use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::events::{CoreEvent, EventBus};
use crate::models::{Timeline, TimelineEntry};
use crate::structure::QuranStructureRepository;
use crate::validator::{reject_malformed, validate_against};

/// Parameters of one [`TimelineBuilder::build`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRequest {
    pub surah_number: u32,
    pub start_ayah: u32,
    pub end_ayah: u32,
    pub edition_id: String,
    pub inter_ayah_delay_seconds: f64,
    /// Fail on the first ayah without audio instead of leaving it out.
    pub abort_on_missing_audio: bool,
}

impl TimelineRequest {
    pub fn new(surah_number: u32, start_ayah: u32, end_ayah: u32, edition_id: impl Into<String>) -> Self {
        Self {
            surah_number,
            start_ayah,
            end_ayah,
            edition_id: edition_id.into(),
            inter_ayah_delay_seconds: 0.0,
            abort_on_missing_audio: true,
        }
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.inter_ayah_delay_seconds = seconds;
        self
    }

    pub fn allow_gaps(mut self) -> Self {
        self.abort_on_missing_audio = false;
        self
    }
}

/// Composes structure, validation and the audio cache into a [`Timeline`].
#[derive(Clone)]
pub struct TimelineBuilder {
    structures: QuranStructureRepository,
    audio: AudioMetadataCache,
    events: EventBus,
    max_concurrent: usize,
}

impl TimelineBuilder {
    pub fn new(
        structures: QuranStructureRepository,
        audio: AudioMetadataCache,
        events: EventBus,
        config: &CoreConfig,
    ) -> Self {
        Self {
            structures,
            audio,
            events,
            max_concurrent: config.max_concurrent_resolutions.max(1),
        }
    }

    pub async fn build_timeline(
        &self,
        surah_number: u32,
        start_ayah: u32,
        end_ayah: u32,
        edition_id: &str,
        inter_ayah_delay_seconds: f64,
        abort_on_missing_audio: bool,
    ) -> Result<Timeline> {
        let request = TimelineRequest {
            surah_number,
            start_ayah,
            end_ayah,
            edition_id: edition_id.to_string(),
            inter_ayah_delay_seconds,
            abort_on_missing_audio,
        };
        self.build(&request).await
    }

    /// Entries follow the requested ayah order whatever order the audio
    /// lookups finish in. `entries[i + 1]` starts `inter_ayah_delay_seconds`
    /// after `entries[i]` ends.
    pub async fn build(&self, request: &TimelineRequest) -> Result<Timeline> {
        let delay = request.inter_ayah_delay_seconds;
        if !(delay.is_finite() && delay >= 0.0) {
            return Err(CoreError::Validation(format!(
                "inter-ayah delay must be a non-negative number of seconds, got {delay}"
            )));
        }
        let edition_id = request.edition_id.trim();
        if edition_id.is_empty() {
            return Err(CoreError::Validation("edition id is empty".to_string()));
        }

        if let Some(rejected) =
            reject_malformed(request.surah_number, request.start_ayah, request.end_ayah)
        {
            return Err(CoreError::Validation(
                rejected
                    .message
                    .unwrap_or_else(|| "invalid ayah range".to_string()),
            ));
        }

        let structure = self.structures.get_structure().await?;
        let validation = validate_against(
            &structure,
            request.surah_number,
            request.start_ayah,
            request.end_ayah,
        );
        let Some((start_ayah, end_ayah)) = validation.usable_range() else {
            return Err(CoreError::Validation(
                validation
                    .message
                    .unwrap_or_else(|| "invalid ayah range".to_string()),
            ));
        };
        if let Some(message) = validation.message.as_deref() {
            warn!(surah_number = request.surah_number, start_ayah, end_ayah, "{message}");
        }

        let numbers = structure.global_numbers_for(request.surah_number, &validation);
        let mut resolved = pin!(
            stream::iter(numbers.iter().copied())
                .map(|global_number| async move {
                    let outcome = self.audio.get_audio_info(global_number, edition_id, false).await;
                    (global_number, outcome)
                })
                .buffered(self.max_concurrent)
        );

        let mut entries: Vec<TimelineEntry> = Vec::with_capacity(numbers.len());
        let mut skipped = Vec::new();
        let mut cursor = 0.0;
        while let Some((global_number, outcome)) = resolved.next().await {
            let ayah_in_surah = structure
                .to_surah_ayah(global_number)
                .map_or(0, |address| address.ayah_in_surah);
            match outcome {
                Ok(info) => {
                    let end = cursor + info.duration_seconds;
                    entries.push(TimelineEntry {
                        global_number,
                        surah_number: request.surah_number,
                        ayah_in_surah,
                        start_offset_seconds: cursor,
                        end_offset_seconds: end,
                        audio_url: info.url.clone(),
                        duration_source: info.duration_source,
                    });
                    cursor = end + delay;
                }
                Err(err) if request.abort_on_missing_audio => {
                    return Err(CoreError::TimelineIncomplete {
                        surah_number: request.surah_number,
                        ayah_in_surah,
                        global_number,
                        edition_id: edition_id.to_string(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    warn!(
                        surah_number = request.surah_number,
                        ayah_in_surah,
                        global_number,
                        edition_id,
                        error = %err,
                        "ayah left out of timeline"
                    );
                    skipped.push(global_number);
                }
            }
        }

        let total_duration_seconds = entries.last().map_or(0.0, |e| e.end_offset_seconds);
        let timeline = Timeline {
            surah_number: request.surah_number,
            edition_id: edition_id.to_string(),
            start_ayah,
            end_ayah,
            entries,
            total_duration_seconds,
            skipped,
        };
        info!(
            surah_number = timeline.surah_number,
            start_ayah,
            end_ayah,
            edition_id,
            entries = timeline.entries.len(),
            skipped = timeline.skipped.len(),
            total_seconds = timeline.total_duration_seconds,
            "timeline built"
        );
        self.events
            .emit(CoreEvent::TimelineBuilt(Arc::new(timeline.clone())));
        Ok(timeline)
    }

    /// [`build`](Self::build) that gives up with `Cancelled` once `cancel`
    /// fires, e.g. when the user changes the selection mid-resolution.
    pub async fn build_cancellable(
        &self,
        request: &TimelineRequest,
        cancel: &CancellationToken,
    ) -> Result<Timeline> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CoreError::Cancelled),
            timeline = self.build(request) => timeline,
        }
    }
}
