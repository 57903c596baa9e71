use tracing::debug;

use crate::error::Result;
use crate::models::{QuranStructure, RangeValidationResult, SURAH_COUNT};
use crate::structure::QuranStructureRepository;

/// Checks (surah, start, end) requests against the real ayah counts.
#[derive(Clone)]
pub struct AyahRangeValidator {
    structures: QuranStructureRepository,
}

impl AyahRangeValidator {
    pub fn new(structures: QuranStructureRepository) -> Self {
        Self { structures }
    }

    /// Malformed input is rejected before the structure is consulted, so a
    /// bad surah number never triggers a catalog fetch. Fails only when the
    /// structure itself cannot be loaded.
    pub async fn validate_range(
        &self,
        surah_number: u32,
        start_ayah: u32,
        end_ayah: u32,
    ) -> Result<RangeValidationResult> {
        if let Some(rejected) = reject_malformed(surah_number, start_ayah, end_ayah) {
            return Ok(rejected);
        }
        let structure = self.structures.get_structure().await?;
        Ok(validate_against(&structure, surah_number, start_ayah, end_ayah))
    }
}

pub(crate) fn reject_malformed(surah_number: u32, start_ayah: u32, end_ayah: u32) -> Option<RangeValidationResult> {
    let message = if !(1..=SURAH_COUNT).contains(&surah_number) {
        format!("surah number must be between 1 and {SURAH_COUNT}, got {surah_number}")
    } else if start_ayah == 0 || end_ayah == 0 {
        format!("ayah numbers must be positive, got {start_ayah}-{end_ayah}")
    } else {
        return None;
    };
    Some(RangeValidationResult {
        is_valid: false,
        message: Some(message),
        corrected_start: start_ayah,
        corrected_end: end_ayah,
        ayah_count_in_surah: 0,
    })
}

/// Validation against an already-loaded structure snapshot.
pub fn validate_against(
    structure: &QuranStructure,
    surah_number: u32,
    start_ayah: u32,
    end_ayah: u32,
) -> RangeValidationResult {
    if let Some(rejected) = reject_malformed(surah_number, start_ayah, end_ayah) {
        return rejected;
    }
    let Some(count) = structure.ayah_count(surah_number) else {
        return RangeValidationResult {
            is_valid: false,
            message: Some(format!("surah {surah_number} missing from catalog")),
            corrected_start: start_ayah,
            corrected_end: end_ayah,
            ayah_count_in_surah: 0,
        };
    };

    let result = if start_ayah > count {
        RangeValidationResult {
            is_valid: false,
            message: Some(format!(
                "surah {surah_number} has {count} ayahs; start {start_ayah} is past the end, using the whole surah"
            )),
            corrected_start: 1,
            corrected_end: count,
            ayah_count_in_surah: count,
        }
    } else if end_ayah > count {
        RangeValidationResult {
            is_valid: false,
            message: Some(format!(
                "surah {surah_number} has {count} ayahs; end {end_ayah} clamped to {count}"
            )),
            corrected_start: start_ayah.min(count),
            corrected_end: count,
            ayah_count_in_surah: count,
        }
    } else if end_ayah < start_ayah {
        // Reversed ranges collapse to the start ayah.
        RangeValidationResult {
            is_valid: true,
            message: Some(format!(
                "end {end_ayah} before start {start_ayah}; using ayah {start_ayah} only"
            )),
            corrected_start: start_ayah,
            corrected_end: start_ayah,
            ayah_count_in_surah: count,
        }
    } else {
        RangeValidationResult {
            is_valid: true,
            message: None,
            corrected_start: start_ayah,
            corrected_end: end_ayah,
            ayah_count_in_surah: count,
        }
    };
    debug!(surah_number, start_ayah, end_ayah, valid = result.is_valid, "range validated");
    result
}
