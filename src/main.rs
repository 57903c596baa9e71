use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tracing_subscriber::EnvFilter;

// ✨ colors
use owo_colors::OwoColorize;

use ayah_timeline::api::{AlQuranCloud, BitrateAudioProbe};
use ayah_timeline::catalog::BundledCatalog;
use ayah_timeline::providers::QuranCatalogProvider;
use ayah_timeline::{
    lookup, playlist, AudioMetadataCache, AyahRangeValidator, CoreConfig, CoreEvent,
    DurationPolicy, DurationSource, EventBus, QuranStructure, QuranStructureRepository,
    TimelineBuilder, TimelineRequest,
};

#[derive(Parser)]
#[command(
    name = "ayah-timeline",
    version,
    about = "Validate Quran ayah ranges and build timed recitation timelines",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// JSON config file (see CoreConfig)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the bundled surah table instead of fetching the catalog
    #[arg(long, global = true, default_value_t = false)]
    offline: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List surahs (with global offsets) or audio editions
    Ls {
        #[arg(value_enum)] what: ListWhat,
    },
    /// Check an ayah range and show the corrected range
    Validate {
        #[arg(long)] surah: String,
        /// "255-260" or "7"
        #[arg(long)] ayahs: String,
    },
    /// Convert between surah:ayah and global ayah numbers
    Locate {
        #[arg(long, conflicts_with = "global", requires = "ayah")] surah: Option<String>,
        #[arg(long)] ayah: Option<u32>,
        #[arg(long)] global: Option<u32>,
    },
    /// Resolve audio and print the timed segments of a passage
    Timeline {
        #[arg(long)] surah: String,
        #[arg(long)] ayahs: String,
        #[arg(long, default_value = "ar.alafasy")] edition: String,
        /// Silence between ayahs, in seconds
        #[arg(long, default_value_t = 0.0)] delay: f64,
        /// Leave out ayahs without audio instead of failing
        #[arg(long, default_value_t = false)] allow_gaps: bool,
        /// Fail when a duration cannot be probed instead of using a fallback
        #[arg(long, default_value_t = false)] strict_durations: bool,
        #[arg(long, default_value_t = false)] json: bool,
        /// Also write an extended M3U playlist
        #[arg(long)] playlist: Option<PathBuf>,
    },
    /// Warm the audio metadata cache for a passage
    Preload {
        #[arg(long)] surah: String,
        #[arg(long)] ayahs: String,
        #[arg(long, default_value = "ar.alafasy")] edition: String,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, ValueEnum)]
enum ListWhat { Surahs, Editions }

struct App {
    cloud: AlQuranCloud,
    events: EventBus,
    structures: QuranStructureRepository,
    audio: AudioMetadataCache,
    builder: TimelineBuilder,
}

impl App {
    fn new(config: &CoreConfig, offline: bool) -> Self {
        let client = Client::new();
        let cloud = AlQuranCloud::new(client.clone(), config);
        let catalog: Arc<dyn QuranCatalogProvider> = if offline {
            Arc::new(BundledCatalog)
        } else {
            Arc::new(cloud.clone())
        };
        let events = EventBus::new(config.event_capacity);
        let structures = QuranStructureRepository::new(catalog, events.clone());
        let audio = AudioMetadataCache::new(
            Arc::new(cloud.clone()),
            Arc::new(BitrateAudioProbe::new(client, config)),
            events.clone(),
            config,
        );
        let builder = TimelineBuilder::new(structures.clone(), audio.clone(), events.clone(), config);
        Self { cloud, events, structures, audio, builder }
    }

    async fn structure(&self) -> Result<Arc<QuranStructure>> {
        Ok(self.structures.get_structure().await?)
    }

    async fn surah_number(&self, spec: &str) -> Result<u32> {
        let structure = self.structure().await?;
        let surah = lookup::resolve_surah(&structure, spec)
            .with_context(|| format!("{} {}", "Unknown surah:".red().bold(), spec.bold()))?;
        Ok(surah.number)
    }
}

// ---------- small UI helpers ----------
fn label(s: &str) -> String { s.dimmed().to_string() }

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Mirrors AudioReady events into the spinner message.
fn follow_audio(events: &EventBus, pb: &ProgressBar) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe();
    let pb = pb.clone();
    tokio::spawn(async move {
        let mut resolved = 0usize;
        loop {
            match rx.recv().await {
                Ok(CoreEvent::AudioReady { global_number, .. }) => {
                    resolved += 1;
                    pb.set_message(format!("resolved {resolved} (#{global_number})"));
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn fmt_secs(s: f64) -> String { format!("{s:>8.2}s") }

// ---------- main ----------
#[tokio::main]
async fn main() -> Result<()> {
    // Respect NO_COLOR if the user wants plain output (owo-colors honors OWO_COLORS=0)
    if std::env::var_os("NO_COLOR").is_some() {
        unsafe {
            std::env::set_var("OWO_COLORS", "0");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match cli.config.as_deref() {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    if let Cmd::Timeline { strict_durations: true, .. } = &cli.cmd {
        config.duration_policy = DurationPolicy::Fail;
    }
    let app = App::new(&config, cli.offline);

    match cli.cmd {
        Cmd::Ls { what } => match what {
            ListWhat::Surahs => {
                let structure = app.structure().await?;
                println!("{}", "Surahs".bold().cyan());
                for s in structure.surahs() {
                    let id_text = format!("{:>3}", s.number);
                    let range_text = format!("[#{}-#{}]", s.cumulative_start, s.cumulative_end());
                    println!(
                        "{}  {}  {} {}",
                        id_text.magenta().bold(),
                        s.english_name.bold(),
                        format!("{} ayahs", s.ayah_count).dimmed(),
                        range_text.dimmed(),
                    );
                }
                println!("{} {}", label("Total:"), structure.total_ayahs().to_string().bold());
            }
            ListWhat::Editions => {
                let editions = app.cloud.list_audio_editions().await?;
                println!("{}", "Audio editions".bold().magenta());
                for e in editions {
                    println!(
                        "{}  {}  {}",
                        format!("{:<24}", e.identifier).magenta().bold(),
                        e.english_name.bold(),
                        format!("({})", e.language).dimmed(),
                    );
                }
            }
        },

        Cmd::Validate { surah, ayahs } => {
            let number = app.surah_number(&surah).await?;
            let (start, end) = lookup::parse_ayah_range(&ayahs)?;
            let validator = AyahRangeValidator::new(app.structures.clone());
            let r = validator.validate_range(number, start, end).await?;
            let verdict = if r.is_valid { "✔ valid".green().bold().to_string() } else { "✘ invalid".red().bold().to_string() };
            println!("{} {}", verdict, format!("{number}:{start}-{end}").bold());
            if let Some(msg) = &r.message {
                println!("   {} {}", label("Note:"), msg.yellow());
            }
            match r.usable_range() {
                Some((s, e)) => println!(
                    "   {} {}  {} {}",
                    label("Use:"),
                    format!("{number}:{s}-{e}").bold().cyan(),
                    label("Surah ayahs:"),
                    r.ayah_count_in_surah.to_string().bold()
                ),
                None => println!("   {} {}", label("Use:"), "nothing (no usable correction)".red()),
            }
        }

        Cmd::Locate { surah, ayah, global } => {
            let structure = app.structure().await?;
            if let Some(g) = global {
                match structure.to_surah_ayah(g) {
                    Some(a) => println!("#{} → {}", g.to_string().bold(), format!("{}:{}", a.surah_number, a.ayah_in_surah).bold().cyan()),
                    None => anyhow::bail!("global ayah {g} is outside 1..={}", structure.total_ayahs()),
                }
            } else if let (Some(spec), Some(a)) = (surah, ayah) {
                let s = lookup::resolve_surah(&structure, &spec)
                    .with_context(|| format!("{} {}", "Unknown surah:".red().bold(), spec.bold()))?;
                match structure.to_global(s.number, a) {
                    Some(g) => println!("{} → #{}", format!("{}:{}", s.number, a).bold().cyan(), g.to_string().bold()),
                    None => anyhow::bail!("surah {} has {} ayahs, no ayah {a}", s.number, s.ayah_count),
                }
            } else {
                anyhow::bail!("pass --global N, or --surah S --ayah A");
            }
        }

        Cmd::Timeline { surah, ayahs, edition, delay, allow_gaps, strict_durations: _, json, playlist: playlist_path } => {
            let number = app.surah_number(&surah).await?;
            let (start, end) = lookup::parse_ayah_range(&ayahs)?;
            let mut request = TimelineRequest::new(number, start, end, edition).with_delay(delay);
            if allow_gaps { request = request.allow_gaps(); }

            let pb = spinner("resolving audio…");
            let follower = follow_audio(&app.events, &pb);
            let built = app.builder.build(&request).await;
            follower.abort();
            pb.finish_and_clear();
            let timeline = built?;

            if json {
                println!("{}", serde_json::to_string_pretty(&timeline)?);
            } else {
                println!(
                    "{} {} {}",
                    "⏱".bright_black(),
                    format!("Surah {} · {}-{}", timeline.surah_number, timeline.start_ayah, timeline.end_ayah).bold().cyan(),
                    format!("({})", timeline.edition_id).dimmed()
                );
                for e in &timeline.entries {
                    let marker = match e.duration_source {
                        DurationSource::Probed => "".to_string(),
                        DurationSource::Fallback => "  (estimated)".yellow().to_string(),
                    };
                    println!(
                        "   {}  {} → {}  {}{}",
                        format!("{:>3}:{:<3}", e.surah_number, e.ayah_in_surah).magenta().bold(),
                        fmt_secs(e.start_offset_seconds),
                        fmt_secs(e.end_offset_seconds),
                        e.audio_url.dimmed(),
                        marker
                    );
                }
                if !timeline.skipped.is_empty() {
                    println!("   {} {:?}", label("Skipped:").yellow(), timeline.skipped);
                }
                println!("   {} {}", label("Total:"), fmt_secs(timeline.total_duration_seconds).trim().bold());
            }

            if let Some(path) = playlist_path {
                playlist::write_m3u(&timeline, &path)?;
                println!("{} {} {}", "📝".yellow(), "Playlist".bold(), path.display().to_string().bold().blue());
            }
        }

        Cmd::Preload { surah, ayahs, edition } => {
            let number = app.surah_number(&surah).await?;
            let (start, end) = lookup::parse_ayah_range(&ayahs)?;
            let translator = ayah_timeline::AyahAddressTranslator::new(app.structures.clone());
            let numbers = translator.list_global_numbers_for_range(number, start, end).await?;

            let pb = spinner(&format!("preloading {} ayahs…", numbers.len()));
            let follower = follow_audio(&app.events, &pb);
            let report = app.audio.preload(&numbers, &edition).await;
            follower.abort();
            pb.finish_and_clear();

            println!(
                "{} {} {}",
                "✔".green().bold(),
                format!("{} resolved", report.resolved.len()).bold(),
                format!("({} cached)", app.audio.len()).dimmed()
            );
            for (g, err) in &report.failed {
                println!("   {} #{} {}", "✘".red().bold(), g, err.to_string().red());
            }
        }
    }

    Ok(())
}
