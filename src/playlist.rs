use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::models::Timeline;

/// Extended M3U for a timeline: one `#EXTINF` + URL per entry, in timeline order.
///
/// Inter-ayah delays are not representable in M3U without silence files and
/// are left to the player.
pub fn render_m3u(timeline: &Timeline) -> String {
    let mut out = String::from("#EXTM3U\n");
    let _ = writeln!(
        out,
        "#PLAYLIST:Surah {} ({}-{}) · {}",
        timeline.surah_number, timeline.start_ayah, timeline.end_ayah, timeline.edition_id
    );
    for e in &timeline.entries {
        let _ = writeln!(out, "#EXTINF:{},{}:{}", e.duration_seconds().round() as u64, e.surah_number, e.ayah_in_surah);
        let _ = writeln!(out, "{}", e.audio_url);
    }
    out
}

pub fn write_m3u(timeline: &Timeline, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    std::fs::write(path, render_m3u(timeline)).with_context(|| format!("write {}", path.display()))
}
