//! Memoized audio URL + duration per (global ayah, edition).
//!
//! At most one resolution runs per key: later callers for a key that is
//! still resolving await the same shared future. Entries are never mutated;
//! a forced refetch replaces the entry wholesale.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use futures_util::future::{BoxFuture, Shared};
use futures_util::{FutureExt, StreamExt, stream};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{CoreConfig, DurationPolicy};
use crate::error::{CoreError, Result};
use crate::events::{CoreEvent, EventBus};
use crate::models::{AudioSegmentInfo, DurationSource, TOTAL_AYAHS};
use crate::providers::{AudioProbe, QuranContentProvider};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AudioKey {
    global_number: u32,
    edition_id: String,
}

impl AudioKey {
    fn new(global_number: u32, edition_id: &str) -> Self {
        Self {
            global_number,
            edition_id: edition_id.to_string(),
        }
    }
}

type PendingAudio = Shared<BoxFuture<'static, Result<Arc<AudioSegmentInfo>>>>;

enum Slot {
    Pending {
        /// Identifies the resolution that owns this slot.
        ticket: u64,
        future: PendingAudio,
        /// Entry being refetched; restored if the refetch fails.
        previous: Option<Arc<AudioSegmentInfo>>,
    },
    Ready(Arc<AudioSegmentInfo>),
}

struct Inner {
    content: Arc<dyn QuranContentProvider>,
    probe: Arc<dyn AudioProbe>,
    events: EventBus,
    duration_policy: DurationPolicy,
    entries: Mutex<HashMap<AudioKey, Slot>>,
    next_ticket: AtomicU64,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

/// Hit/miss counters since construction or the last [`AudioMetadataCache::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Outcome of a [`AudioMetadataCache::preload`] batch; failures are per ayah.
#[derive(Debug, Clone, Default)]
pub struct PreloadReport {
    pub resolved: Vec<u32>,
    pub failed: Vec<(u32, CoreError)>,
}

impl PreloadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Cloneable handle; clones share the same entries.
#[derive(Clone)]
pub struct AudioMetadataCache {
    inner: Arc<Inner>,
    max_concurrent: usize,
}

impl AudioMetadataCache {
    pub fn new(
        content: Arc<dyn QuranContentProvider>,
        probe: Arc<dyn AudioProbe>,
        events: EventBus,
        config: &CoreConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                content,
                probe,
                events,
                duration_policy: config.duration_policy,
                entries: Mutex::new(HashMap::new()),
                next_ticket: AtomicU64::new(1),
                hits: AtomicUsize::new(0),
                misses: AtomicUsize::new(0),
            }),
            max_concurrent: config.max_concurrent_resolutions.max(1),
        }
    }

    /// Fails with `Validation` for a global number outside 1..=6236 or a
    /// blank edition, without touching the providers.
    pub async fn get_audio_info(
        &self,
        global_number: u32,
        edition_id: &str,
        force_refetch: bool,
    ) -> Result<Arc<AudioSegmentInfo>> {
        if !(1..=TOTAL_AYAHS).contains(&global_number) {
            return Err(CoreError::Validation(format!(
                "global ayah number must be between 1 and {TOTAL_AYAHS}, got {global_number}"
            )));
        }
        if edition_id.trim().is_empty() {
            return Err(CoreError::Validation("edition id is empty".to_string()));
        }
        let key = AudioKey::new(global_number, edition_id);
        let pending = {
            let mut entries = self.inner.entries.lock();
            match entries.get(&key) {
                Some(Slot::Ready(info)) if !force_refetch => {
                    self.inner.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(global_number, edition_id, "audio cache hit");
                    return Ok(info.clone());
                }
                Some(Slot::Pending { future, .. }) => {
                    debug!(global_number, edition_id, "joining in-flight audio resolution");
                    future.clone()
                }
                existing => {
                    let previous = match existing {
                        Some(Slot::Ready(info)) => Some(info.clone()),
                        _ => None,
                    };
                    self.inner.misses.fetch_add(1, Ordering::Relaxed);
                    debug!(global_number, edition_id, force_refetch, "audio cache miss");
                    let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
                    let future = resolve(self.inner.clone(), key.clone(), ticket)
                        .boxed()
                        .shared();
                    entries.insert(
                        key,
                        Slot::Pending {
                            ticket,
                            future: future.clone(),
                            previous,
                        },
                    );
                    future
                }
            }
        };
        pending.await
    }

    /// Resolves every number, at most `max_concurrent_resolutions` at a time.
    /// One ayah failing never aborts the rest of the batch.
    pub async fn preload(&self, global_numbers: &[u32], edition_id: &str) -> PreloadReport {
        let outcomes: Vec<(u32, Result<Arc<AudioSegmentInfo>>)> = stream::iter(global_numbers.iter().copied())
            .map(|global_number| async move {
                (global_number, self.get_audio_info(global_number, edition_id, false).await)
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut report = PreloadReport::default();
        for (global_number, outcome) in outcomes {
            match outcome {
                Ok(_) => report.resolved.push(global_number),
                Err(err) => {
                    warn!(global_number, edition_id, error = %err, "preload item failed");
                    report.failed.push((global_number, err));
                }
            }
        }
        debug!(
            edition_id,
            resolved = report.resolved.len(),
            failed = report.failed.len(),
            "preload settled"
        );
        report
    }

    /// [`preload`](Self::preload) that stops waiting once `cancel` fires.
    ///
    /// Resolutions abandoned this way stay parked in their slots; pair the
    /// cancellation with [`clear`](Self::clear) on an edition change so they
    /// can never write into the cache.
    pub async fn preload_cancellable(
        &self,
        global_numbers: &[u32],
        edition_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PreloadReport> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CoreError::Cancelled),
            report = self.preload(global_numbers, edition_id) => Ok(report),
        }
    }

    /// Resolved entry for a key, without triggering a resolution.
    pub fn cached(&self, global_number: u32, edition_id: &str) -> Option<Arc<AudioSegmentInfo>> {
        match self.inner.entries.lock().get(&AudioKey::new(global_number, edition_id)) {
            Some(Slot::Ready(info)) => Some(info.clone()),
            _ => None,
        }
    }

    pub fn invalidate(&self, global_number: u32, edition_id: &str) {
        self.inner
            .entries
            .lock()
            .remove(&AudioKey::new(global_number, edition_id));
    }

    /// Drops every entry. Resolutions still in flight answer their waiters
    /// but no longer write into the cache.
    pub fn clear(&self) {
        self.inner.entries.lock().clear();
        self.inner.hits.store(0, Ordering::Relaxed);
        self.inner.misses.store(0, Ordering::Relaxed);
        debug!("audio metadata cache cleared");
    }

    /// Number of resolved entries.
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

async fn resolve(inner: Arc<Inner>, key: AudioKey, ticket: u64) -> Result<Arc<AudioSegmentInfo>> {
    let outcome = fetch(&inner, &key).await.map(Arc::new);

    let mut entries = inner.entries.lock();
    let owned = matches!(entries.get(&key), Some(Slot::Pending { ticket: t, .. }) if *t == ticket);
    if !owned {
        debug!(global_number = key.global_number, edition_id = %key.edition_id, "stale audio resolution discarded");
        return outcome;
    }

    match &outcome {
        Ok(info) => {
            entries.insert(key.clone(), Slot::Ready(info.clone()));
            drop(entries);
            inner.events.emit(CoreEvent::AudioReady {
                global_number: key.global_number,
                edition_id: key.edition_id,
                info: info.clone(),
            });
        }
        Err(err) => {
            if let Some(Slot::Pending { previous: Some(previous), .. }) = entries.remove(&key) {
                entries.insert(key.clone(), Slot::Ready(previous));
            }
            drop(entries);
            warn!(global_number = key.global_number, edition_id = %key.edition_id, error = %err, "audio resolution failed");
        }
    }
    outcome
}

async fn fetch(inner: &Inner, key: &AudioKey) -> Result<AudioSegmentInfo> {
    let url = inner
        .content
        .get_ayah_audio_url(key.global_number, &key.edition_id)
        .await
        .map_err(|err| {
            CoreError::data_unavailable(
                "audio-url",
                format!("ayah {} ({}): {err:#}", key.global_number, key.edition_id),
            )
        })?
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| CoreError::AudioUnavailable {
            global_number: key.global_number,
            edition_id: key.edition_id.clone(),
        })?;

    let probed = match inner.probe.get_duration(&url).await {
        Ok(Some(seconds)) if seconds.is_finite() && seconds > 0.0 => Ok(seconds),
        Ok(Some(seconds)) => Err(format!("probe reported unusable duration {seconds}")),
        Ok(None) => Err("probe reported no duration".to_string()),
        Err(err) => Err(format!("{err:#}")),
    };

    let (duration_seconds, duration_source) = match (probed, inner.duration_policy) {
        (Ok(seconds), _) => (seconds, DurationSource::Probed),
        (Err(reason), DurationPolicy::Fallback { seconds }) if seconds.is_finite() && seconds > 0.0 => {
            warn!(
                global_number = key.global_number,
                edition_id = %key.edition_id,
                %url,
                %reason,
                fallback_seconds = seconds,
                "duration unresolved; using fallback"
            );
            (seconds, DurationSource::Fallback)
        }
        (Err(reason), DurationPolicy::Fallback { seconds }) => {
            return Err(CoreError::DurationUnresolved {
                url,
                reason: format!("{reason}; fallback of {seconds}s is not a usable duration"),
            });
        }
        (Err(reason), DurationPolicy::Fail) => {
            return Err(CoreError::DurationUnresolved { url, reason });
        }
    };

    Ok(AudioSegmentInfo {
        global_number: key.global_number,
        edition_id: key.edition_id.clone(),
        url,
        duration_seconds,
        duration_source,
    })
}
