//! Ducking — pull one signal down wherever a reference signal is active.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::buffer::AudioBuffer;
use super::silence::{SilenceParams, TimeRange, detect_nonsilent};

/// Configuration for speech-aware ducking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DuckingConfig {
    /// Attenuation applied inside active ranges, in dB (positive = quieter).
    pub reduction_db: f64,
    pub threshold_dbfs: f64,
    pub min_silence_len_ms: u64,
}

impl Default for DuckingConfig {
    fn default() -> Self {
        Self {
            reduction_db: 6.0,
            threshold_dbfs: -40.0,
            min_silence_len_ms: 300,
        }
    }
}

impl DuckingConfig {
    fn silence_params(&self) -> SilenceParams {
        SilenceParams {
            threshold_dbfs: self.threshold_dbfs,
            min_silence_len_ms: self.min_silence_len_ms,
            ..SilenceParams::default()
        }
    }
}

/// Attenuate `music` wherever `dialogue` is non-silent.
///
/// Output length always equals the input music length.
pub fn duck_music_during_dialogue(
    music: &AudioBuffer,
    dialogue: &AudioBuffer,
    config: &DuckingConfig,
) -> AudioBuffer {
    let ranges = detect_nonsilent(dialogue, &config.silence_params());
    let ducked = duck_ranges(music, &ranges, config.reduction_db);
    info!(regions = ranges.len(), "applied music ducking during dialogue");
    ducked
}

/// Fold the attenuation over each range in turn.
///
/// Ranges are first sorted and coalesced so no frame is attenuated twice;
/// frames outside every range pass through untouched.
pub fn duck_ranges(buffer: &AudioBuffer, ranges: &[TimeRange], reduction_db: f64) -> AudioBuffer {
    coalesce(ranges).iter().fold(buffer.clone(), |acc, r| {
        let start = acc.ms_to_frames(r.start_ms);
        let end = acc.ms_to_frames(r.end_ms);
        acc.gain_db_in_frames(start, end, -reduction_db)
    })
}

/// Sort by start and merge any ranges that overlap or touch.
pub fn coalesce(ranges: &[TimeRange]) -> Vec<TimeRange> {
    let mut sorted: Vec<TimeRange> = ranges.iter().copied().filter(|r| r.len_ms() > 0).collect();
    sorted.sort_by_key(|r| r.start_ms);

    let mut out: Vec<TimeRange> = Vec::with_capacity(sorted.len());
    for r in sorted {
        match out.last_mut() {
            Some(last) if r.start_ms <= last.end_ms => last.end_ms = last.end_ms.max(r.end_ms),
            _ => out.push(r),
        }
    }
    out
}
