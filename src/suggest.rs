//! Pre-render mix suggestions drawn from the feature table.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MixError, MixResult};
use crate::features::ClipFeatures;

pub const REPORT_FILE: &str = "suggestions.txt";
const REPORT_TITLE: &str = "Adaptive Audio Mix Assistant - Suggestions";

/// Thresholds for the suggestion checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuggestConfig {
    /// Dialogue mean rms may sit this far below music (16-bit units).
    pub quiet_margin_rms: f64,
    /// Mean spectral centroids closer than this clash (Hz).
    pub clash_hz: f64,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            quiet_margin_rms: 500.0,
            clash_hz: 800.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suggestion {
    MissingDialogueOrMusic,
    DialogueTooQuiet,
    SpectralClash,
    Complete,
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Suggestion::MissingDialogueOrMusic => "Need at least one dialogue and one music clip.",
            Suggestion::DialogueTooQuiet => "Dialogue is too quiet vs music.",
            Suggestion::SpectralClash => "SFX may spectrally clash with dialogue.",
            Suggestion::Complete => "Mix check complete.",
        })
    }
}

fn mean(rows: &[ClipFeatures], field: impl Fn(&ClipFeatures) -> f64) -> f64 {
    rows.iter().map(field).sum::<f64>() / rows.len() as f64
}

/// Check the categorised feature rows.
///
/// Without both dialogue and music only the missing-input advisory is
/// returned. Otherwise the list always ends with [`Suggestion::Complete`].
pub fn suggest_mixes(
    dialogue: &[ClipFeatures],
    music: &[ClipFeatures],
    sfx: &[ClipFeatures],
    config: &SuggestConfig,
) -> Vec<Suggestion> {
    if dialogue.is_empty() || music.is_empty() {
        return vec![Suggestion::MissingDialogueOrMusic];
    }

    let mut out = Vec::new();
    let dialogue_rms = mean(dialogue, |r| r.metadata.rms);
    let music_rms = mean(music, |r| r.metadata.rms);
    if dialogue_rms < music_rms - config.quiet_margin_rms {
        out.push(Suggestion::DialogueTooQuiet);
    }

    if !sfx.is_empty() {
        let dialogue_centroid = mean(dialogue, |r| r.metadata.spectral_centroid);
        let sfx_centroid = mean(sfx, |r| r.metadata.spectral_centroid);
        if (sfx_centroid - dialogue_centroid).abs() < config.clash_hz {
            out.push(Suggestion::SpectralClash);
        }
    }

    out.push(Suggestion::Complete);
    out
}

/// Render the report text: a title line, a blank line, one suggestion per line.
pub fn format_report(suggestions: &[Suggestion]) -> String {
    let mut text = format!("{REPORT_TITLE}\n\n");
    for s in suggestions {
        text.push_str(&s.to_string());
        text.push('\n');
    }
    text
}

/// Write the report to `dir/suggestions.txt`, creating `dir` if needed.
pub fn save_suggestions(dir: &Path, suggestions: &[Suggestion]) -> MixResult<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| MixError::io(dir, e))?;
    let path = dir.join(REPORT_FILE);
    std::fs::write(&path, format_report(suggestions)).map_err(|e| MixError::io(&path, e))?;
    info!(path = %path.display(), "suggestions saved");
    Ok(path)
}
