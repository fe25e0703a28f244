//! Scene renderer — builds the three stems and lays them into the final mix.
//!
//! Stems are padded to a common length, faded and gain-staged, the music is
//! optionally ducked under the dialogue, and the layered content is framed by
//! an intro and outro bed cut from the music stem.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clip::{Clip, ClipCategory};
use crate::error::{MixError, MixResult};
use crate::io::write_wav;
use crate::scene::{SceneMode, SceneOverrides, SceneSettings};

use super::buffer::AudioBuffer;
use super::ducking::{DuckingConfig, duck_music_during_dialogue};
use super::mixer::{Mixer, MixerConfig, StemOptions, StemWarning};

/// Fixed pan positions per stem.
pub const DIALOGUE_PAN: f64 = 0.0;
pub const MUSIC_PAN: f64 = -0.3;
pub const SFX_PAN: f64 = 0.2;

/// Output file stems, without extension.
pub const DIALOGUE_FILE: &str = "dialogue_mix";
pub const MUSIC_FILE: &str = "music_mix";
pub const SFX_FILE: &str = "sfx_mix";
pub const FINAL_FILE: &str = "auto_mix";

/// How a render should run.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub settings: SceneSettings,
    pub ducking: bool,
    /// Keep everything in memory; write no files.
    pub preview: bool,
    pub output_dir: PathBuf,
}

impl RenderOptions {
    /// Resolve the overrides against a mode and its base settings.
    pub fn from_scene(
        mode: SceneMode,
        settings: SceneSettings,
        overrides: &SceneOverrides,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            settings: settings.with_overrides(overrides),
            ducking: overrides.ducking_for(mode),
            preview: overrides.preview,
            output_dir: output_dir.into(),
        }
    }
}

/// The three processed, padded, gain-staged stems.
#[derive(Debug, Clone, PartialEq)]
pub struct Stems {
    pub dialogue: AudioBuffer,
    pub music: AudioBuffer,
    pub sfx: AudioBuffer,
}

/// Files written by a non-preview render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedFiles {
    pub dialogue: PathBuf,
    pub music: PathBuf,
    pub sfx: PathBuf,
    pub final_mix: PathBuf,
}

/// Everything a render produces.
#[derive(Debug, Clone)]
pub struct MixOutput {
    pub stems: Stems,
    pub final_mix: AudioBuffer,
    /// Clips left out of their stems, across all categories.
    pub warnings: Vec<StemWarning>,
    /// `None` in preview mode.
    pub exported: Option<ExportedFiles>,
}

/// Renders scenes with a fixed mixer and ducking configuration.
#[derive(Debug, Clone, Default)]
pub struct SceneRenderer {
    pub mixer: MixerConfig,
    pub ducking: DuckingConfig,
}

impl SceneRenderer {
    pub fn new(mixer: MixerConfig, ducking: DuckingConfig) -> Self {
        SceneRenderer { mixer, ducking }
    }

    /// Run the full pipeline and export unless `options.preview` is set.
    #[tracing::instrument(
        skip_all,
        fields(ducking = options.ducking, preview = options.preview)
    )]
    pub fn render(
        &self,
        dialogue: &[Clip],
        music: &[Clip],
        sfx: &[Clip],
        options: &RenderOptions,
    ) -> MixResult<MixOutput> {
        let mut output = self.mix(dialogue, music, sfx, &options.settings, options.ducking);

        if options.preview {
            info!("preview mode: skipping export");
            return Ok(output);
        }

        let exported = export(&output.stems, &output.final_mix, &options.output_dir)?;
        info!(path = %exported.final_mix.display(), "final mix exported");
        output.exported = Some(exported);
        Ok(output)
    }

    /// Build stems and the final mix in memory.
    pub fn mix(
        &self,
        dialogue: &[Clip],
        music: &[Clip],
        sfx: &[Clip],
        settings: &SceneSettings,
        ducking: bool,
    ) -> MixOutput {
        let sample_rate = dialogue
            .iter()
            .chain(music)
            .chain(sfx)
            .find_map(|c| c.buffer.as_ref().map(AudioBuffer::sample_rate))
            .unwrap_or(self.mixer.fallback_sample_rate);
        let mixer = Mixer::new(MixerConfig {
            fallback_sample_rate: sample_rate,
            ..self.mixer
        });

        let build = |clips: &[Clip], category, options: StemOptions| {
            let stem = mixer.combine_and_normalize(clips, category, &options);
            (stem.buffer.conform(sample_rate, 2), stem.warnings)
        };
        let (dialogue, mut warnings) = build(
            dialogue,
            ClipCategory::Dialogue,
            StemOptions {
                pan: DIALOGUE_PAN,
                eq: false,
                reverb_enabled: settings.reverb_enabled,
            },
        );
        let (music, w) = build(
            music,
            ClipCategory::Music,
            StemOptions {
                pan: MUSIC_PAN,
                eq: false,
                reverb_enabled: settings.reverb_enabled,
            },
        );
        warnings.extend(w);
        let (sfx, w) = build(
            sfx,
            ClipCategory::Sfx,
            StemOptions {
                pan: SFX_PAN,
                eq: true,
                reverb_enabled: settings.reverb_enabled,
            },
        );
        warnings.extend(w);

        let frames = dialogue.frames().max(music.frames()).max(sfx.frames());
        let stage = |b: &AudioBuffer, gain_db: f64| {
            b.pad_to_frames(frames)
                .fade_in(settings.fade_duration_ms)
                .fade_out(settings.fade_duration_ms)
                .gain_db(gain_db)
        };
        let dialogue = stage(&dialogue, settings.gain.dialogue);
        let mut music = stage(&music, settings.gain.music);
        let sfx = stage(&sfx, settings.gain.sfx);

        if ducking {
            music = duck_music_during_dialogue(&music, &dialogue, &self.ducking);
        }

        let content = music.overlay(&dialogue, 0).overlay(&sfx, 0);
        let final_mix = frame_with_bed(&content, &music, settings);
        info!(
            content_ms = content.len_ms(),
            final_ms = final_mix.len_ms(),
            "rendered scene"
        );

        MixOutput {
            stems: Stems { dialogue, music, sfx },
            final_mix,
            warnings,
            exported: None,
        }
    }
}

/// Place `content` after an intro cut from the head of `music` and before
/// an outro cut from its tail.
///
/// The total length is always `content + intro + outro`. Intro and outro
/// slices are clamped to the music length; the outro is placed so that it
/// ends with the mix.
fn frame_with_bed(
    content: &AudioBuffer,
    music: &AudioBuffer,
    settings: &SceneSettings,
) -> AudioBuffer {
    let intro_frames = content.ms_to_frames(settings.music_intro_ms);
    let outro_frames = content.ms_to_frames(settings.music_outro_ms);
    let total = content.frames() + intro_frames + outro_frames;

    let intro = music
        .head_ms(settings.music_intro_ms)
        .fade_in(settings.music_intro_ms);
    let outro = music
        .tail_ms(settings.music_outro_ms)
        .fade_out(settings.music_outro_ms);

    AudioBuffer::silent_frames(total, content.sample_rate(), content.channels())
        .overlay_at_frame(&intro, 0)
        .overlay_at_frame(content, intro_frames)
        .overlay_at_frame(&outro, total - outro.frames())
}

/// Write the stems and final mix into `dir` under their fixed names.
pub fn export(stems: &Stems, final_mix: &AudioBuffer, dir: &Path) -> MixResult<ExportedFiles> {
    std::fs::create_dir_all(dir).map_err(|e| MixError::io(dir, e))?;
    let path = |name: &str| dir.join(format!("{name}.wav"));

    let files = ExportedFiles {
        dialogue: path(DIALOGUE_FILE),
        music: path(MUSIC_FILE),
        sfx: path(SFX_FILE),
        final_mix: path(FINAL_FILE),
    };
    write_wav(&files.dialogue, &stems.dialogue)?;
    write_wav(&files.music, &stems.music)?;
    write_wav(&files.sfx, &stems.sfx)?;
    write_wav(&files.final_mix, final_mix)?;
    Ok(files)
}
