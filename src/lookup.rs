use anyhow::{Context, Result, bail};
use unicode_normalization::UnicodeNormalization;

use crate::models::{EditionInfo, QuranStructure, SurahDescriptor};

/// Accent-, case- and punctuation-insensitive key ("Al-Ikhlāṣ" → "alikhlas").
pub fn norm_key(s: &str) -> String {
    s.nfkd().filter(|c| c.is_ascii()).collect::<String>()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Resolves "112", "al-ikhlas" or "Al Ikhlas" against the loaded structure.
pub fn resolve_surah<'a>(structure: &'a QuranStructure, spec: &str) -> Option<&'a SurahDescriptor> {
    if let Ok(n) = spec.trim().parse::<u32>() { return structure.surah(n); }
    let key = norm_key(spec);
    if key.is_empty() { return None; }
    structure.surahs().iter().find(|s| norm_key(&s.english_name) == key
        || norm_key(&s.name) == key)
}

/// Exact identifier first ("ar.alafasy"), then a fuzzy match on the names.
pub fn resolve_edition<'a>(editions: &'a [EditionInfo], spec: &str) -> Option<&'a EditionInfo> {
    if let Some(e) = editions.iter().find(|e| e.identifier == spec) { return Some(e); }
    let key = norm_key(spec);
    if key.is_empty() { return None; }
    editions.iter().find(|e| {
        let n = norm_key(&e.english_name);
        norm_key(&e.identifier) == key || (!n.is_empty() && (n.contains(&key) || key.contains(&n)))
    })
}

/// Parses "255-260" or "7" into an inclusive (start, end) pair.
///
/// Reversed ranges are passed through untouched; range policy belongs to
/// the validator.
pub fn parse_ayah_range(spec: &str) -> Result<(u32, u32)> {
    let spec = spec.trim();
    if spec.is_empty() { bail!("empty ayah range"); }
    match spec.split_once('-') {
        Some((a, b)) => {
            let a = a.trim().parse().with_context(|| format!("bad range start: {spec}"))?;
            let b = b.trim().parse().with_context(|| format!("bad range end: {spec}"))?;
            Ok((a, b))
        }
        None => {
            let n = spec.parse().with_context(|| format!("bad ayah number: {spec}"))?;
            Ok((n, n))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BundledCatalog;

    fn structure() -> QuranStructure {
        QuranStructure::from_records(BundledCatalog::records()).unwrap()
    }

    #[test]
    fn resolves_surah_by_number_and_name() {
        let s = structure();
        assert_eq!(resolve_surah(&s, "112").map(|d| d.number), Some(112));
        assert_eq!(resolve_surah(&s, "al-ikhlas").map(|d| d.number), Some(112));
        assert_eq!(resolve_surah(&s, "Al Ikhlas").map(|d| d.number), Some(112));
        assert_eq!(resolve_surah(&s, "Āli ʿImrān").map(|d| d.number), Some(3));
        assert!(resolve_surah(&s, "nope").is_none());
        assert!(resolve_surah(&s, "0").is_none());
    }

    #[test]
    fn resolves_edition_by_id_or_name() {
        let eds = vec![
            EditionInfo {
                identifier: "ar.alafasy".into(),
                language: "ar".into(),
                name: "مشاري العفاسي".into(),
                english_name: "Alafasy".into(),
            },
            EditionInfo {
                identifier: "ar.husary".into(),
                language: "ar".into(),
                name: "محمود خليل الحصري".into(),
                english_name: "Husary".into(),
            },
        ];
        assert_eq!(resolve_edition(&eds, "ar.husary").map(|e| e.identifier.as_str()), Some("ar.husary"));
        assert_eq!(resolve_edition(&eds, "alafasy").map(|e| e.identifier.as_str()), Some("ar.alafasy"));
        assert!(resolve_edition(&eds, "minshawi").is_none());
    }

    #[test]
    fn parses_ranges() {
        assert_eq!(parse_ayah_range("255-260").unwrap(), (255, 260));
        assert_eq!(parse_ayah_range(" 7 ").unwrap(), (7, 7));
        assert_eq!(parse_ayah_range("10-5").unwrap(), (10, 5));
        assert!(parse_ayah_range("a-5").is_err());
        assert!(parse_ayah_range("").is_err());
    }
}
