//! Conversion between (surah, ayah) pairs and global ayah numbers.

use tracing::warn;

use crate::error::Result;
use crate::models::{AyahAddress, QuranStructure, RangeValidationResult};
use crate::structure::QuranStructureRepository;
use crate::validator::validate_against;

impl QuranStructure {
    pub fn to_global(&self, surah_number: u32, ayah_in_surah: u32) -> Option<u32> {
        let surah = self.surah(surah_number)?;
        if ayah_in_surah == 0 || ayah_in_surah > surah.ayah_count {
            return None;
        }
        Some(surah.cumulative_start + ayah_in_surah - 1)
    }

    pub fn to_surah_ayah(&self, global_number: u32) -> Option<AyahAddress> {
        if global_number == 0 || global_number > self.total_ayahs {
            return None;
        }
        // First surah whose last ayah reaches the target.
        let idx = self
            .surahs
            .partition_point(|s| s.cumulative_end() < global_number);
        let surah = self.surahs.get(idx)?;
        Some(AyahAddress {
            surah_number: surah.number,
            ayah_in_surah: global_number - surah.cumulative_start + 1,
            global_number,
        })
    }

    pub fn address(&self, surah_number: u32, ayah_in_surah: u32) -> Option<AyahAddress> {
        self.to_global(surah_number, ayah_in_surah)
            .map(|global_number| AyahAddress {
                surah_number,
                ayah_in_surah,
                global_number,
            })
    }

    /// Contiguous global numbers covered by a validation outcome; empty when
    /// the request was rejected outright.
    pub fn global_numbers_for(&self, surah_number: u32, validation: &RangeValidationResult) -> Vec<u32> {
        let Some((start, end)) = validation.usable_range() else {
            return Vec::new();
        };
        match (self.to_global(surah_number, start), self.to_global(surah_number, end)) {
            (Some(first), Some(last)) => (first..=last).collect(),
            _ => Vec::new(),
        }
    }
}

/// Async front for address translation backed by the structure repository.
#[derive(Clone)]
pub struct AyahAddressTranslator {
    structures: QuranStructureRepository,
}

impl AyahAddressTranslator {
    pub fn new(structures: QuranStructureRepository) -> Self {
        Self { structures }
    }

    pub async fn to_global(&self, surah_number: u32, ayah_in_surah: u32) -> Result<Option<u32>> {
        let structure = self.structures.get_structure().await?;
        Ok(structure.to_global(surah_number, ayah_in_surah))
    }

    pub async fn to_surah_ayah(&self, global_number: u32) -> Result<Option<AyahAddress>> {
        let structure = self.structures.get_structure().await?;
        Ok(structure.to_surah_ayah(global_number))
    }

    /// Validates the range first and expands the (possibly corrected) range.
    /// A rejected range yields an empty list rather than an error.
    pub async fn list_global_numbers_for_range(
        &self,
        surah_number: u32,
        start_ayah: u32,
        end_ayah: u32,
    ) -> Result<Vec<u32>> {
        let structure = self.structures.get_structure().await?;
        let validation = validate_against(&structure, surah_number, start_ayah, end_ayah);
        let numbers = structure.global_numbers_for(surah_number, &validation);
        if numbers.is_empty() {
            warn!(
                surah_number,
                start_ayah,
                end_ayah,
                reason = validation.message.as_deref().unwrap_or("unknown"),
                "range expanded to no ayahs"
            );
        }
        Ok(numbers)
    }
}
