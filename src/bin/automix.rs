use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use automix_core::clip::{Clip, ClipCategory};
use automix_core::dsp::renderer::{RenderOptions, SceneRenderer};
use automix_core::emotion::detect_emotion;
use automix_core::features::{self, AnalysisConfig, ClipFeatures};
use automix_core::io::{IngestConfig, load_clip};
use automix_core::scene::{SceneMode, SceneOverrides, SceneSettings};
use automix_core::suggest::{self, SuggestConfig};

#[derive(Parser, Debug)]
#[command(name = "automix", version, about = "Adaptive audio mix assistant")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Measure every WAV clip in a directory and write the feature table.
    Analyze(AnalyzeArgs),
    /// Build stems and the final mix for a scene.
    Mix(MixArgs),
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Directory of input clips.
    #[arg(long, default_value = "data")]
    data: PathBuf,

    /// Output feature table (JSON).
    #[arg(long, default_value = "audio_features.json")]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct MixArgs {
    /// Scene mode: cinematic, trailer, podcast, interview, custom.
    #[arg(long, default_value = "cinematic")]
    mode: String,

    /// Feature table written by `analyze`.
    #[arg(long, default_value = "audio_features.json")]
    features: PathBuf,

    /// Directory the clips in the feature table live in.
    #[arg(long, default_value = "data")]
    data: PathBuf,

    /// Output directory for stems, final mix and suggestions.
    #[arg(long, default_value = "outputs")]
    outdir: PathBuf,

    /// Force environment reverb on or off.
    #[arg(long, value_enum)]
    reverb: Option<Toggle>,

    /// Force speech-aware music ducking on or off.
    #[arg(long, value_enum)]
    ducking: Option<Toggle>,

    /// JSON settings file replacing the mode preset.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Render in memory only; write nothing.
    #[arg(long)]
    preview: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        matches!(self, Toggle::On)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Analyze(args) => cmd_analyze(args),
        Command::Mix(args) => cmd_mix(args),
    }
}

fn cmd_analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    let rows = features::analyze_dir(&args.data, &AnalysisConfig::default())
        .with_context(|| format!("analyse clips in '{}'", args.data.display()))?;
    features::save_features(&args.out, &rows)
        .with_context(|| format!("write feature table '{}'", args.out.display()))?;
    eprintln!("saved features for {} files to {}", rows.len(), args.out.display());
    Ok(())
}

fn read_settings(path: &Path) -> anyhow::Result<SceneSettings> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("open settings '{}'", path.display()))?;
    SceneSettings::from_json(&text).with_context(|| format!("parse settings '{}'", path.display()))
}

/// Load every row of one category. Clips that fail to decode are kept
/// without audio so the mixer reports and skips them.
fn load_clips(rows: &[ClipFeatures], category: ClipCategory, data: &Path) -> Vec<Clip> {
    let config = IngestConfig::default();
    rows.iter()
        .map(|row| {
            load_clip(data, &row.filename, category, row.metadata, &config).unwrap_or_else(|e| {
                tracing::warn!(filename = %row.filename, error = %e, "could not decode clip");
                Clip {
                    filename: row.filename.clone(),
                    category,
                    buffer: None,
                    metadata: row.metadata,
                }
            })
        })
        .collect()
}

fn cmd_mix(args: MixArgs) -> anyhow::Result<()> {
    let mode = SceneMode::from_name(&args.mode);
    let overrides = SceneOverrides {
        reverb: args.reverb.map(Toggle::enabled),
        ducking: args.ducking.map(Toggle::enabled),
        preview: args.preview,
    };
    let settings = match &args.settings {
        Some(path) => read_settings(path)?,
        None => mode.settings(),
    };
    let options = RenderOptions::from_scene(mode, settings, &overrides, &args.outdir);

    let rows = features::load_features(&args.features)
        .with_context(|| format!("load feature table '{}'", args.features.display()))?;
    let groups = features::categorize(&rows);

    let emotion = detect_emotion(rows.iter().map(|r| r.filename.as_str()));
    tracing::info!(
        %mode,
        %emotion,
        ducking = options.ducking,
        preview = options.preview,
        "mixing scene"
    );

    let suggestions = suggest::suggest_mixes(
        &groups.dialogue,
        &groups.music,
        &groups.sfx,
        &SuggestConfig::default(),
    );
    eprintln!("mixing suggestions:");
    for line in &suggestions {
        eprintln!("  {line}");
    }
    if !options.preview {
        suggest::save_suggestions(&args.outdir, &suggestions)
            .with_context(|| format!("write suggestions to '{}'", args.outdir.display()))?;
    }

    let dialogue = load_clips(&groups.dialogue, ClipCategory::Dialogue, &args.data);
    let music = load_clips(&groups.music, ClipCategory::Music, &args.data);
    let sfx = load_clips(&groups.sfx, ClipCategory::Sfx, &args.data);

    let output = SceneRenderer::default()
        .render(&dialogue, &music, &sfx, &options)
        .with_context(|| format!("render scene into '{}'", args.outdir.display()))?;

    match &output.exported {
        Some(files) => eprintln!(
            "final mix ({} ms) saved to {}",
            output.final_mix.len_ms(),
            files.final_mix.display()
        ),
        None => eprintln!(
            "preview: final mix is {} ms, nothing written",
            output.final_mix.len_ms()
        ),
    }
    Ok(())
}
