//! Mock collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;

use ayah_timeline::catalog::BundledCatalog;
use ayah_timeline::models::SurahRecord;
use ayah_timeline::providers::{AudioProbe, QuranCatalogProvider, QuranContentProvider};
use ayah_timeline::{
    AudioMetadataCache, CoreConfig, EventBus, QuranStructureRepository, TimelineBuilder,
};

/// Catalog that counts fetches, optionally failing the first `fail_first` calls.
pub struct MockCatalog {
    pub calls: AtomicUsize,
    fail_first: usize,
    delay: Duration,
    records: Vec<SurahRecord>,
    /// Served instead of `records` for the first `malformed_first` calls.
    malformed: Vec<SurahRecord>,
    malformed_first: usize,
}

impl MockCatalog {
    pub fn working() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first: 0,
            delay: Duration::from_millis(20),
            records: BundledCatalog::records(),
            malformed: Vec::new(),
            malformed_first: 0,
        }
    }

    pub fn failing_first(n: usize) -> Self {
        Self { fail_first: n, ..Self::working() }
    }

    pub fn with_records(records: Vec<SurahRecord>) -> Self {
        Self { records, ..Self::working() }
    }

    pub fn malformed_first(n: usize, malformed: Vec<SurahRecord>) -> Self {
        Self { malformed, malformed_first: n, ..Self::working() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuranCatalogProvider for MockCatalog {
    async fn get_all_surahs(&self) -> Result<Vec<SurahRecord>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if call < self.fail_first {
            bail!("catalog offline (call {call})");
        }
        if call < self.malformed_first {
            return Ok(self.malformed.clone());
        }
        Ok(self.records.clone())
    }
}

/// Content provider serving `https://cdn.test/<edition>/<global>.mp3`.
#[derive(Default)]
pub struct MockContent {
    pub calls: AtomicUsize,
    /// Ayahs with no audio URL.
    missing: HashSet<u32>,
    /// Ayahs whose lookup errors out.
    broken: HashSet<u32>,
    /// Per-ayah latency, to shuffle completion order.
    delays_ms: HashMap<u32, u64>,
}

impl MockContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn missing(mut self, global_number: u32) -> Self {
        self.missing.insert(global_number);
        self
    }

    pub fn broken(mut self, global_number: u32) -> Self {
        self.broken.insert(global_number);
        self
    }

    pub fn delay(mut self, global_number: u32, ms: u64) -> Self {
        self.delays_ms.insert(global_number, ms);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn url_for(global_number: u32, edition_id: &str) -> String {
    format!("https://cdn.test/{edition_id}/{global_number}.mp3")
}

#[async_trait]
impl QuranContentProvider for MockContent {
    async fn get_ayah_audio_url(&self, global_number: u32, edition_id: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ms = self.delays_ms.get(&global_number).copied().unwrap_or(10);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        if self.broken.contains(&global_number) {
            bail!("upstream 500 for {global_number}");
        }
        if self.missing.contains(&global_number) {
            return Ok(None);
        }
        Ok(Some(url_for(global_number, edition_id)))
    }
}

/// Probe answering from a url → seconds table; unknown urls report no duration.
#[derive(Default)]
pub struct MockProbe {
    pub calls: AtomicUsize,
    durations: HashMap<String, f64>,
    failing: bool,
    /// Calls at or past this index fail.
    fail_from: Option<usize>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, global_number: u32, edition_id: &str, seconds: f64) -> Self {
        self.durations.insert(url_for(global_number, edition_id), seconds);
        self
    }

    pub fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    pub fn fail_from_call(mut self, call: usize) -> Self {
        self.fail_from = Some(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioProbe for MockProbe {
    async fn get_duration(&self, url: &str) -> Result<Option<f64>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.failing || self.fail_from.is_some_and(|from| call >= from) {
            bail!("media element error");
        }
        Ok(self.durations.get(url).copied())
    }
}

/// Fully wired core over mocks.
pub struct Harness {
    pub catalog: Arc<MockCatalog>,
    pub content: Arc<MockContent>,
    pub probe: Arc<MockProbe>,
    pub events: EventBus,
    pub structures: QuranStructureRepository,
    pub audio: AudioMetadataCache,
    pub builder: TimelineBuilder,
}

impl Harness {
    pub fn new(content: MockContent, probe: MockProbe) -> Self {
        Self::with_config(content, probe, &CoreConfig::default())
    }

    pub fn with_config(content: MockContent, probe: MockProbe, config: &CoreConfig) -> Self {
        let catalog = Arc::new(MockCatalog::working());
        let content = Arc::new(content);
        let probe = Arc::new(probe);
        let events = EventBus::new(config.event_capacity);
        let structures = QuranStructureRepository::new(catalog.clone(), events.clone());
        let audio = AudioMetadataCache::new(content.clone(), probe.clone(), events.clone(), config);
        let builder = TimelineBuilder::new(structures.clone(), audio.clone(), events.clone(), config);
        Self { catalog, content, probe, events, structures, audio, builder }
    }
}

/// Al-Ikhlas (112) spans global ayahs 6222..=6225.
pub const IKHLAS: [u32; 4] = [6222, 6223, 6224, 6225];

/// Probe with Al-Ikhlas durations `[3, 2, 4, 3]` for `ar.alafasy`.
pub fn ikhlas_probe() -> MockProbe {
    MockProbe::new()
        .duration(6222, "ar.alafasy", 3.0)
        .duration(6223, "ar.alafasy", 2.0)
        .duration(6224, "ar.alafasy", 4.0)
        .duration(6225, "ar.alafasy", 3.0)
}
