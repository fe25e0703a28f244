//! Silence analysis — tail trimming and non-silent region detection.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::buffer::{AudioBuffer, db_to_ratio, ratio_to_db};

/// Thresholds and granularities for silence analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceParams {
    /// Level (dBFS, RMS) at or below which audio counts as silent.
    pub threshold_dbfs: f64,
    /// Chunk size for the reverse tail scan.
    pub chunk_ms: u64,
    /// Shortest trailing silence worth trimming.
    pub min_tail_ms: u64,
    /// Fade-out applied at the new tail after a trim.
    pub tail_fade_ms: u64,
    /// Window length for non-silent detection; shorter quiet gaps are
    /// absorbed into the surrounding material.
    pub min_silence_len_ms: u64,
}

impl Default for SilenceParams {
    fn default() -> Self {
        Self {
            threshold_dbfs: -40.0,
            chunk_ms: 100,
            min_tail_ms: 1500,
            tail_fade_ms: 500,
            min_silence_len_ms: 300,
        }
    }
}

/// A half-open `[start_ms, end_ms)` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TimeRange {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        TimeRange { start_ms, end_ms }
    }

    pub fn len_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Trim a contiguous quiet tail.
///
/// Walks backwards from the end in `chunk_ms` chunks while each chunk's
/// level is below the threshold; the first loud chunk stops the scan. A
/// partial chunk at the very start is evaluated on its real length. If the
/// silent run reaches `min_tail_ms`, it is cut and the new tail faded out;
/// otherwise the buffer is returned unchanged.
///
/// The fade can push a quiet last chunk under the threshold, so the cut is
/// repeated until the result has no trimmable tail. Trimming the output
/// again is a no-op.
pub fn trim_silence_tail(buffer: &AudioBuffer, params: &SilenceParams) -> AudioBuffer {
    let mut out = buffer.clone();
    while let Some(trimmed) = trim_once(&out, params) {
        out = trimmed;
    }
    out
}

/// One reverse scan and cut. `None` when nothing is trimmed; otherwise the
/// result is strictly shorter than `buffer`.
fn trim_once(buffer: &AudioBuffer, params: &SilenceParams) -> Option<AudioBuffer> {
    let chunk = buffer.ms_to_frames(params.chunk_ms).max(1);
    let frames = buffer.frames();

    let mut end = frames;
    while end > 0 {
        let start = end.saturating_sub(chunk);
        let level = ratio_to_db(buffer.rms_frames(start, end));
        if level < params.threshold_dbfs {
            end = start;
        } else {
            break;
        }
    }

    let silent_frames = frames - end;
    if silent_frames == 0 || silent_frames < buffer.ms_to_frames(params.min_tail_ms) {
        return None;
    }

    let silent_ms = silent_frames as f64 * 1000.0 / buffer.sample_rate() as f64;
    info!(silent_ms = silent_ms.round() as u64, "trimmed silence from tail");
    Some(buffer.slice_frames(0, end).fade_out(params.tail_fade_ms))
}

/// Running sums of squared samples per frame, for O(1) window RMS.
struct EnergyIndex {
    prefix: Vec<f64>,
    channels: usize,
}

impl EnergyIndex {
    fn new(buffer: &AudioBuffer) -> Self {
        let channels = buffer.channels() as usize;
        let mut prefix = Vec::with_capacity(buffer.frames() + 1);
        let mut acc = 0.0_f64;
        prefix.push(acc);
        for frame in buffer.samples().chunks_exact(channels) {
            acc += frame.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>();
            prefix.push(acc);
        }
        EnergyIndex { prefix, channels }
    }

    fn rms(&self, start: usize, end: usize) -> f64 {
        let end = end.min(self.prefix.len() - 1);
        let start = start.min(end);
        if start == end {
            return 0.0;
        }
        // Clamp rounding drift below zero.
        let energy = (self.prefix[end] - self.prefix[start]).max(0.0);
        (energy / ((end - start) * self.channels) as f64).sqrt()
    }
}

/// Silent stretches of at least `min_silence_len_ms`, chronological and
/// non-overlapping.
///
/// Every 1 ms offset starts a window of `min_silence_len_ms`; a window is
/// silent when its RMS is at or below the threshold. Windows that touch or
/// overlap fuse into one silent run.
pub fn detect_silence(buffer: &AudioBuffer, params: &SilenceParams) -> Vec<TimeRange> {
    let len_ms = buffer.frames() as u64 * 1000 / buffer.sample_rate() as u64;
    let window = params.min_silence_len_ms.max(1);
    let threshold = db_to_ratio(params.threshold_dbfs);

    if len_ms < window {
        return if buffer.rms() <= threshold && len_ms > 0 {
            vec![TimeRange::new(0, len_ms)]
        } else {
            Vec::new()
        };
    }

    let index = EnergyIndex::new(buffer);
    let sr = buffer.sample_rate();
    let frames_at = |ms: u64| super::buffer::ms_to_frames(ms, sr);

    let mut ranges = Vec::new();
    let mut run: Option<(u64, u64)> = None; // (range start, last silent window start)
    for start in 0..=(len_ms - window) {
        if index.rms(frames_at(start), frames_at(start + window)) > threshold {
            continue;
        }
        run = match run {
            None => Some((start, start)),
            Some((first, prev)) if start > prev + window => {
                ranges.push(TimeRange::new(first, prev + window));
                Some((start, start))
            }
            Some((first, _)) => Some((first, start)),
        };
    }
    if let Some((first, prev)) = run {
        ranges.push(TimeRange::new(first, prev + window));
    }
    ranges
}

/// Chronological, non-overlapping ranges where the buffer is not silent.
///
/// The complement of [`detect_silence`] over the buffer's length. A buffer
/// that is silent throughout yields no ranges.
pub fn detect_nonsilent(buffer: &AudioBuffer, params: &SilenceParams) -> Vec<TimeRange> {
    let len_ms = buffer.frames() as u64 * 1000 / buffer.sample_rate() as u64;
    let silent = detect_silence(buffer, params);

    let ranges = complement(&silent, len_ms);
    debug!(count = ranges.len(), len_ms, "detected non-silent ranges");
    ranges
}

fn complement(silent: &[TimeRange], len_ms: u64) -> Vec<TimeRange> {
    let mut out = Vec::with_capacity(silent.len() + 1);
    let mut cursor = 0;
    for r in silent {
        if r.start_ms > cursor {
            out.push(TimeRange::new(cursor, r.start_ms));
        }
        cursor = cursor.max(r.end_ms);
    }
    if cursor < len_ms {
        out.push(TimeRange::new(cursor, len_ms));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::buffer::ms_to_frames;

    const SR: u32 = 8000;

    fn tone(ms: u64, amp: f32) -> AudioBuffer {
        let data: Vec<f32> = (0..ms_to_frames(ms, SR))
            .map(|i| if (i / 4) % 2 == 0 { amp } else { -amp })
            .collect();
        AudioBuffer::mono(&data, SR)
    }

    fn silence(ms: u64) -> AudioBuffer {
        AudioBuffer::silent(ms, SR, 1)
    }

    #[test]
    fn long_tail_is_trimmed_and_faded() {
        let b = tone(1000, 0.5).concat(&silence(2000));
        let out = trim_silence_tail(&b, &SilenceParams::default());
        assert_eq!(out.len_ms(), 1000);
        assert_eq!(*out.samples().last().unwrap(), 0.0);
        // fade covers only the last 500 ms
        assert_eq!(out.samples()[ms_to_frames(400, SR)].abs(), 0.5);
    }

    #[test]
    fn short_tail_is_kept() {
        let b = tone(1000, 0.5).concat(&silence(1400));
        let out = trim_silence_tail(&b, &SilenceParams::default());
        assert_eq!(out, b);
    }

    #[test]
    fn silence_must_be_contiguous_from_the_tail() {
        // loud blip 100 ms before the end breaks the silent run
        let b = tone(500, 0.5)
            .concat(&silence(2000))
            .concat(&tone(100, 0.5))
            .concat(&silence(100));
        let out = trim_silence_tail(&b, &SilenceParams::default());
        assert_eq!(out, b);
    }

    #[test]
    fn partial_chunk_is_evaluated() {
        // 2050 ms of silence: 20 full chunks plus a 50 ms partial at the start
        let b = silence(2050);
        let out = trim_silence_tail(&b, &SilenceParams::default());
        assert!(out.is_empty());
    }

    #[test]
    fn trimming_is_idempotent() {
        let params = SilenceParams::default();
        let b = tone(1230, 0.05).concat(&silence(1780));
        let once = trim_silence_tail(&b, &params);
        let twice = trim_silence_tail(&once, &params);
        assert_eq!(once, twice);
        assert!(once.frames() < b.frames());
    }

    #[test]
    fn faded_quiet_blip_does_not_survive_a_second_pass() {
        let params = SilenceParams::default();
        // the tail fade drops the blip under the threshold, exposing the
        // silence in front of it
        let b = silence(2000).concat(&tone(100, 0.05)).concat(&silence(2000));
        let once = trim_silence_tail(&b, &params);
        assert!(once.is_empty());
        assert_eq!(trim_silence_tail(&once, &params), once);

        let b = tone(1000, 0.5)
            .concat(&silence(2000))
            .concat(&tone(100, 0.05))
            .concat(&silence(2000));
        let once = trim_silence_tail(&b, &params);
        assert_eq!(once.len_ms(), 1000);
        assert_eq!(trim_silence_tail(&once, &params), once);
    }

    #[test]
    fn silent_buffer_has_no_nonsilent_ranges() {
        let params = SilenceParams::default();
        assert!(detect_nonsilent(&silence(3000), &params).is_empty());
        assert!(detect_nonsilent(&silence(100), &params).is_empty());
    }

    #[test]
    fn loud_buffer_is_one_range() {
        let r = detect_nonsilent(&tone(1000, 0.5), &SilenceParams::default());
        assert_eq!(r, vec![TimeRange::new(0, 1000)]);
    }

    #[test]
    fn speech_bursts_are_found_in_order() {
        let b = silence(500)
            .concat(&tone(700, 0.5))
            .concat(&silence(800))
            .concat(&tone(400, 0.5))
            .concat(&silence(600));
        let r = detect_nonsilent(&b, &SilenceParams::default());
        assert_eq!(
            r,
            vec![TimeRange::new(500, 1200), TimeRange::new(2000, 2400)]
        );
    }

    #[test]
    fn short_gaps_are_merged() {
        // 200 ms gap is shorter than the 300 ms window
        let b = tone(500, 0.5)
            .concat(&silence(200))
            .concat(&tone(500, 0.5));
        let r = detect_nonsilent(&b, &SilenceParams::default());
        assert_eq!(r, vec![TimeRange::new(0, 1200)]);
    }

    #[test]
    fn ranges_never_overlap() {
        let b = tone(100, 0.5)
            .concat(&silence(350))
            .concat(&tone(100, 0.5))
            .concat(&silence(301))
            .concat(&tone(100, 0.5));
        let r = detect_nonsilent(&b, &SilenceParams::default());
        assert!(r.windows(2).all(|w| w[0].end_ms < w[1].start_ms));
        assert!(r.iter().all(|x| x.len_ms() > 0));
        assert_eq!(r.len(), 3);
    }

    #[test]
    fn quiet_material_counts_as_silence() {
        // -46 dBFS is below the -40 dBFS threshold
        let b = tone(1000, 0.005);
        assert!(detect_nonsilent(&b, &SilenceParams::default()).is_empty());
    }
}
