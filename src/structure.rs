//! Lazily-built, process-lifetime cache of the surah structure.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::events::{CoreEvent, EventBus};
use crate::models::{QuranStructure, SURAH_COUNT, SurahDescriptor, SurahRecord, TOTAL_AYAHS};
use crate::providers::QuranCatalogProvider;

type PendingBuild = Shared<BoxFuture<'static, Result<Arc<QuranStructure>>>>;

enum Slot {
    Empty,
    Building(PendingBuild),
    Ready(Arc<QuranStructure>),
}

struct Inner {
    catalog: Arc<dyn QuranCatalogProvider>,
    events: EventBus,
    slot: Mutex<Slot>,
    /// Bumped on reset so a build started before it cannot repopulate the cache.
    generation: AtomicU64,
}

/// Builds the [`QuranStructure`] once and hands out the cached copy afterwards.
///
/// Concurrent first callers share a single catalog fetch. A failed build is
/// not cached; the next call tries again.
#[derive(Clone)]
pub struct QuranStructureRepository {
    inner: Arc<Inner>,
}

impl QuranStructureRepository {
    pub fn new(catalog: Arc<dyn QuranCatalogProvider>, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                events,
                slot: Mutex::new(Slot::Empty),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub async fn get_structure(&self) -> Result<Arc<QuranStructure>> {
        let pending = {
            let mut slot = self.inner.slot.lock();
            match &*slot {
                Slot::Ready(structure) => return Ok(structure.clone()),
                Slot::Building(pending) => {
                    debug!("joining in-flight structure build");
                    pending.clone()
                }
                Slot::Empty => {
                    let generation = self.inner.generation.load(Ordering::SeqCst);
                    let pending = build(self.inner.clone(), generation).boxed().shared();
                    *slot = Slot::Building(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Cached structure, if a build already succeeded.
    pub fn cached(&self) -> Option<Arc<QuranStructure>> {
        match &*self.inner.slot.lock() {
            Slot::Ready(structure) => Some(structure.clone()),
            _ => None,
        }
    }

    /// Drops the cached structure, e.g. after a catalog or locale change.
    pub fn reset(&self) {
        let mut slot = self.inner.slot.lock();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        *slot = Slot::Empty;
        debug!("structure cache reset");
    }
}

async fn build(inner: Arc<Inner>, generation: u64) -> Result<Arc<QuranStructure>> {
    let outcome = match inner.catalog.get_all_surahs().await {
        Ok(records) => QuranStructure::from_records(records).map(Arc::new),
        Err(err) => Err(CoreError::data_unavailable("catalog", format!("{err:#}"))),
    };

    let mut slot = inner.slot.lock();
    if inner.generation.load(Ordering::SeqCst) != generation {
        debug!("structure build finished after reset; result not cached");
        return outcome;
    }
    match &outcome {
        Ok(structure) => {
            *slot = Slot::Ready(structure.clone());
            drop(slot);
            info!(total_ayahs = structure.total_ayahs(), "quran structure ready");
            inner.events.emit(CoreEvent::StructureReady {
                total_ayahs: structure.total_ayahs(),
            });
        }
        Err(err) => {
            *slot = Slot::Empty;
            warn!(error = %err, "quran structure build failed");
        }
    }
    outcome
}

impl QuranStructure {
    /// Checks a raw catalog and stamps cumulative offsets onto it.
    ///
    /// Records may arrive in any order but must cover surahs 1..=114 exactly
    /// once with positive ayah counts summing to 6236.
    pub fn from_records(mut records: Vec<SurahRecord>) -> Result<Self> {
        if records.len() != SURAH_COUNT as usize {
            return Err(CoreError::data_unavailable(
                "catalog",
                format!("expected {SURAH_COUNT} surahs, got {}", records.len()),
            ));
        }
        records.sort_by_key(|r| r.number);

        let mut surahs = Vec::with_capacity(records.len());
        let mut next_start = 1u32;
        for (record, expected) in records.into_iter().zip(1u32..) {
            if record.number != expected {
                return Err(CoreError::data_unavailable(
                    "catalog",
                    format!("surah numbering broken at {expected} (found {})", record.number),
                ));
            }
            if record.number_of_ayahs == 0 {
                return Err(CoreError::data_unavailable(
                    "catalog",
                    format!("surah {expected} has no ayahs"),
                ));
            }
            surahs.push(SurahDescriptor {
                number: record.number,
                name: record.name,
                english_name: record.english_name,
                ayah_count: record.number_of_ayahs,
                cumulative_start: next_start,
            });
            next_start = next_start
                .checked_add(record.number_of_ayahs)
                .filter(|next| *next <= TOTAL_AYAHS + 1)
                .ok_or_else(|| {
                    CoreError::data_unavailable(
                        "catalog",
                        format!("ayah counts overrun {TOTAL_AYAHS} at surah {expected}"),
                    )
                })?;
        }

        let total_ayahs = next_start - 1;
        if total_ayahs != TOTAL_AYAHS {
            return Err(CoreError::data_unavailable(
                "catalog",
                format!("ayah counts sum to {total_ayahs}, expected {TOTAL_AYAHS}"),
            ));
        }
        Ok(Self { total_ayahs, surahs })
    }
}
