//! Quran ayah addressing and recitation timelines.
//!
//! Turns a passage selection (surah, ayah range, reciter edition) into an
//! ordered list of audio segments with cumulative start/end offsets, ready
//! to drive caption sync or an export pipeline.
//!
//! - [`structure`]: surah list with cumulative global offsets, built once
//! - [`validator`]: range checks and corrections against real ayah counts
//! - [`address`]: (surah, ayah) ⇄ global ayah number (1..=6236)
//! - [`audio_cache`]: per-(ayah, edition) audio URL + duration, deduplicated
//! - [`timeline`]: assembles the above into a [`Timeline`]
//!
//! The network lives behind [`providers`]; [`api`] implements them against
//! alquran.cloud and [`catalog`] ships an offline surah table.

pub mod address;
pub mod api;
pub mod audio_cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod lookup;
pub mod models;
pub mod playlist;
pub mod providers;
pub mod structure;
pub mod timeline;
pub mod validator;

pub use address::AyahAddressTranslator;
pub use audio_cache::{AudioMetadataCache, CacheStats, PreloadReport};
pub use config::{CoreConfig, DurationPolicy};
pub use error::{CoreError, Result};
pub use events::{CoreEvent, EventBus};
pub use models::{
    AudioSegmentInfo, AyahAddress, DurationSource, QuranStructure, RangeValidationResult,
    SurahDescriptor, Timeline, TimelineEntry,
};
pub use structure::QuranStructureRepository;
pub use timeline::{TimelineBuilder, TimelineRequest};
pub use validator::AyahRangeValidator;
