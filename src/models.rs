use serde::{Deserialize, Serialize};

/// Number of surahs in the mushaf.
pub const SURAH_COUNT: u32 = 114;

/// Number of ayahs across all surahs (global numbering is 1..=TOTAL_AYAHS).
pub const TOTAL_AYAHS: u32 = 6236;

/// One surah as supplied by a catalog provider (alquran.cloud `/surah` shape).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurahRecord {
    pub number: u32,
    pub name: String,
    pub english_name: String,
    pub number_of_ayahs: u32,
}

/// An audio edition (reciter) as listed by the content API.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditionInfo {
    pub identifier: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub english_name: String,
}

/// A surah annotated with the global number of its first ayah.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurahDescriptor {
    pub number: u32,
    pub name: String,
    pub english_name: String,
    pub ayah_count: u32,
    pub cumulative_start: u32,
}

impl SurahDescriptor {
    /// Global number of the last ayah of this surah.
    pub fn cumulative_end(&self) -> u32 {
        self.cumulative_start + self.ayah_count - 1
    }
}

/// Ordered surah list with cumulative offsets. Immutable once built.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuranStructure {
    pub(crate) total_ayahs: u32,
    pub(crate) surahs: Vec<SurahDescriptor>,
}

impl QuranStructure {
    pub fn total_ayahs(&self) -> u32 {
        self.total_ayahs
    }

    /// Surahs ordered by number (index 0 is surah 1).
    pub fn surahs(&self) -> &[SurahDescriptor] {
        &self.surahs
    }

    pub fn surah(&self, number: u32) -> Option<&SurahDescriptor> {
        if number == 0 {
            return None;
        }
        self.surahs.get(number as usize - 1)
    }

    pub fn ayah_count(&self, surah_number: u32) -> Option<u32> {
        self.surah(surah_number).map(|s| s.ayah_count)
    }

    pub fn cumulative_start(&self, surah_number: u32) -> Option<u32> {
        self.surah(surah_number).map(|s| s.cumulative_start)
    }
}

/// A fully-resolved ayah position. Derived, never persisted.
#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct AyahAddress {
    pub surah_number: u32,
    pub ayah_in_surah: u32,
    pub global_number: u32,
}

/// Outcome of checking a (surah, start, end) request against the real ayah count.
///
/// `ayah_count_in_surah == 0` marks an outright rejection: there is no
/// correction the caller can fall back to.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RangeValidationResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub corrected_start: u32,
    pub corrected_end: u32,
    pub ayah_count_in_surah: u32,
}

impl RangeValidationResult {
    /// The range to actually use, or `None` when the request was rejected.
    pub fn usable_range(&self) -> Option<(u32, u32)> {
        (self.ayah_count_in_surah > 0).then_some((self.corrected_start, self.corrected_end))
    }
}

/// Where an [`AudioSegmentInfo`] duration came from.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DurationSource {
    Probed,
    /// Probe failed; the configured fallback duration was substituted.
    Fallback,
}

/// Resolved audio for one ayah in one edition.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioSegmentInfo {
    pub global_number: u32,
    pub edition_id: String,
    pub url: String,
    pub duration_seconds: f64,
    pub duration_source: DurationSource,
}

/// One ayah placed on a timeline.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub global_number: u32,
    pub surah_number: u32,
    pub ayah_in_surah: u32,
    pub start_offset_seconds: f64,
    pub end_offset_seconds: f64,
    pub audio_url: String,
    pub duration_source: DurationSource,
}

impl TimelineEntry {
    pub fn duration_seconds(&self) -> f64 {
        self.end_offset_seconds - self.start_offset_seconds
    }
}

/// Ordered, offset-stamped ayah segments for one request. Built fresh per call.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub surah_number: u32,
    pub edition_id: String,
    pub start_ayah: u32,
    pub end_ayah: u32,
    pub entries: Vec<TimelineEntry>,
    pub total_duration_seconds: f64,
    /// Global numbers left out because their audio could not be resolved.
    pub skipped: Vec<u32>,
}

impl Timeline {
    /// Entry playing at `seconds`, or `None` during an inter-ayah gap or past the end.
    pub fn entry_at(&self, seconds: f64) -> Option<&TimelineEntry> {
        let idx = self
            .entries
            .partition_point(|e| e.end_offset_seconds <= seconds);
        self.entries
            .get(idx)
            .filter(|e| e.start_offset_seconds <= seconds)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
