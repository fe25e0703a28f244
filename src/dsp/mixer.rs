//! Stem mixer — turns a list of clips into one processed stem.
//!
//! Each usable clip is tail-trimmed, peak-normalised and panned, optionally
//! band-limited and given environment reverb, and the results are summed
//! from time zero.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clip::{Clip, ClipCategory};

use super::buffer::AudioBuffer;
use super::filter::{EqConfig, band_pass};
use super::reverb::{ReverbConfig, apply_reverb};
use super::silence::{SilenceParams, trim_silence_tail};

/// Per-stem processing switches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StemOptions {
    /// Pan position in `[-1.0, 1.0]`.
    pub pan: f64,
    /// Apply the band-limiting EQ.
    pub eq: bool,
    /// Allow environment reverb (only ever applied to sfx).
    pub reverb_enabled: bool,
}

impl Default for StemOptions {
    fn default() -> Self {
        Self {
            pan: 0.0,
            eq: false,
            reverb_enabled: true,
        }
    }
}

/// Fixed processing parameters shared by every stem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixerConfig {
    /// Clips shorter than this are skipped.
    pub min_clip_ms: u64,
    /// Peak level after normalisation, in dB below full scale.
    pub normalize_headroom_db: f64,
    /// Length of the silent stand-in for an empty stem.
    pub placeholder_ms: u64,
    /// Sample rate for the stand-in when no clip gives one.
    pub fallback_sample_rate: u32,
    pub silence: SilenceParams,
    pub eq: EqConfig,
    pub reverb: ReverbConfig,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            min_clip_ms: 100,
            normalize_headroom_db: 0.1,
            placeholder_ms: 1,
            fallback_sample_rate: 44100,
            silence: SilenceParams::default(),
            eq: EqConfig::default(),
            reverb: ReverbConfig::default(),
        }
    }
}

/// Why a clip was left out of its stem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StemWarning {
    MissingBuffer { filename: String },
    TooShort { filename: String, duration_ms: f64 },
}

/// One category's combined, processed output.
#[derive(Debug, Clone)]
pub struct Stem {
    pub category: ClipCategory,
    pub buffer: AudioBuffer,
    /// Number of clips that made it into the stem.
    pub clip_count: usize,
    pub warnings: Vec<StemWarning>,
}

impl Stem {
    /// True when the stem is only the silent stand-in.
    pub fn is_placeholder(&self) -> bool {
        self.clip_count == 0
    }
}

/// Builds stems from clips.
#[derive(Debug, Clone, Default)]
pub struct Mixer {
    pub config: MixerConfig,
}

impl Mixer {
    pub fn new(config: MixerConfig) -> Self {
        Mixer { config }
    }

    /// Process and sum `clips` into a single stem.
    ///
    /// Missing or too-short clips are skipped with a warning. With no
    /// surviving clip the stem is `placeholder_ms` of stereo silence; with
    /// exactly one, that clip's processed buffer is returned as is.
    pub fn combine_and_normalize(
        &self,
        clips: &[Clip],
        category: ClipCategory,
        options: &StemOptions,
    ) -> Stem {
        let mut warnings = Vec::new();
        let mut processed = Vec::with_capacity(clips.len());

        for clip in clips {
            let Some(buffer) = clip.buffer.as_ref() else {
                warn!(
                    filename = %clip.filename,
                    stem = %category,
                    "skipping clip with no audio"
                );
                warnings.push(StemWarning::MissingBuffer {
                    filename: clip.filename.clone(),
                });
                continue;
            };
            let duration_ms = buffer.duration_ms();
            if duration_ms < self.config.min_clip_ms as f64 {
                warn!(
                    filename = %clip.filename,
                    stem = %category,
                    duration_ms,
                    "skipping clip that is too short"
                );
                warnings.push(StemWarning::TooShort {
                    filename: clip.filename.clone(),
                    duration_ms,
                });
                continue;
            }
            processed.push(self.process_clip(clip, buffer, category, options));
        }

        let clip_count = processed.len();
        let buffer = if clip_count == 1 {
            processed.swap_remove(0)
        } else {
            processed
                .into_iter()
                .reduce(|acc, b| acc.overlay(&b, 0))
                .unwrap_or_else(|| self.placeholder(clips))
        };

        debug!(stem = %category, clip_count, len_ms = buffer.len_ms(), "built stem");
        Stem {
            category,
            buffer,
            clip_count,
            warnings,
        }
    }

    fn placeholder(&self, clips: &[Clip]) -> AudioBuffer {
        let sample_rate = clips
            .iter()
            .find_map(|c| c.buffer.as_ref().map(AudioBuffer::sample_rate))
            .unwrap_or(self.config.fallback_sample_rate);
        AudioBuffer::silent(self.config.placeholder_ms, sample_rate, 2)
    }

    fn process_clip(
        &self,
        clip: &Clip,
        buffer: &AudioBuffer,
        category: ClipCategory,
        options: &StemOptions,
    ) -> AudioBuffer {
        let trimmed = trim_silence_tail(buffer, &self.config.silence);
        let mut out = trimmed
            .normalize(self.config.normalize_headroom_db)
            .pan(options.pan);

        if options.eq {
            out = band_pass(&out, &self.config.eq);
        }

        if options.reverb_enabled && category == ClipCategory::Sfx {
            if let Some(size) = clip.environment().reverb_size() {
                debug!(filename = %clip.filename, ?size, "applying environment reverb");
                out = apply_reverb(&out, size, &self.config.reverb);
            }
        }
        out
    }
}
