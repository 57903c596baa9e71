//! Error taxonomy for structure, audio and timeline operations.
//!
//! Range problems that can be corrected are *not* errors: they come back as a
//! [`RangeValidationResult`](crate::models::RangeValidationResult). Everything
//! here is either a hard data/network failure or an uncorrectable request.

use thiserror::Error;

/// Errors raised by the core.
///
/// `Clone` because a single in-flight resolution hands its result to every
/// waiter sharing it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Malformed surah/ayah input or request parameters.
    #[error("validation error: {0}")]
    Validation(String),

    /// Catalog or audio source unreachable or malformed.
    #[error("data unavailable ({origin}): {message}")]
    DataUnavailable {
        /// Which collaborator failed, e.g. `catalog` or `audio-url`.
        origin: &'static str,
        /// Error chain as reported by the collaborator.
        message: String,
    },

    /// The content provider returned no audio URL for this ayah/edition.
    #[error("no audio for ayah {global_number} in edition {edition_id}")]
    AudioUnavailable {
        /// Global ayah number (1..=6236).
        global_number: u32,
        /// Edition/reciter identifier.
        edition_id: String,
    },

    /// Duration probe failed and the policy forbids a fallback.
    #[error("could not resolve duration of {url}: {reason}")]
    DurationUnresolved {
        /// Audio URL that was probed.
        url: String,
        /// Probe failure.
        reason: String,
    },

    /// An ayah in the requested range has no usable audio.
    #[error(
        "timeline incomplete: ayah {surah_number}:{ayah_in_surah} (#{global_number}, {edition_id}): {reason}"
    )]
    TimelineIncomplete {
        /// Surah of the offending ayah.
        surah_number: u32,
        /// Ayah number within the surah.
        ayah_in_surah: u32,
        /// Global ayah number.
        global_number: u32,
        /// Edition/reciter identifier.
        edition_id: String,
        /// Underlying failure.
        reason: String,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    pub(crate) fn data_unavailable(origin: &'static str, message: impl Into<String>) -> Self {
        Self::DataUnavailable {
            origin,
            message: message.into(),
        }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
