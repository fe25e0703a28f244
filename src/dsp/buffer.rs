//! AudioBuffer — finite interleaved PCM with the edit primitives the mix
//! pipeline is composed from.
//!
//! Every operation returns a new buffer; nothing mutates a caller's buffer
//! in place. Time arguments are milliseconds and are converted to frames
//! with `floor(ms * sample_rate / 1000)`.

use tracing::warn;

use super::envelope::Fade;

/// `ratio_to_db(2.0)`: the gain a fully panned signal gains on its loud side
/// before the 3 dB centre correction.
const MAX_PAN_BOOST_DB: f64 = 6.020_599_913_279_624;

/// Convert dB to a linear amplitude ratio.
#[inline]
pub fn db_to_ratio(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert a linear amplitude ratio to dB. Non-positive ratios map to -inf.
#[inline]
pub fn ratio_to_db(ratio: f64) -> f64 {
    if ratio <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * ratio.log10()
    }
}

/// An owned block of interleaved f32 samples.
///
/// Samples are nominally in `[-1.0, 1.0]`; values above full scale are
/// tolerated mid-pipeline and clamped only when quantised for export.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Wrap interleaved samples. A trailing partial frame is dropped.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        AudioBuffer {
            samples,
            sample_rate: sample_rate.max(1),
            channels,
        }
    }

    /// Mono buffer from a plain sample slice.
    pub fn mono(samples: &[f32], sample_rate: u32) -> Self {
        Self::new(samples.to_vec(), sample_rate, 1)
    }

    /// Digital silence lasting `ms` milliseconds.
    pub fn silent(ms: u64, sample_rate: u32, channels: u16) -> Self {
        let frames = ms_to_frames(ms, sample_rate);
        Self::silent_frames(frames, sample_rate, channels)
    }

    pub fn silent_frames(frames: usize, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Exact duration in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.frames() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Duration in whole milliseconds (rounded).
    pub fn len_ms(&self) -> u64 {
        self.duration_ms().round() as u64
    }

    /// Frame count for `ms` at this buffer's sample rate.
    pub fn ms_to_frames(&self, ms: u64) -> usize {
        ms_to_frames(ms, self.sample_rate)
    }

    /// The samples of frame `index`.
    pub fn frame(&self, index: usize) -> &[f32] {
        let ch = self.channels as usize;
        &self.samples[index * ch..(index + 1) * ch]
    }

    // ── Slicing and joining ──────────────────────────────────

    /// Frames `[start, end)`, clamped to the buffer.
    pub fn slice_frames(&self, start: usize, end: usize) -> Self {
        let total = self.frames();
        let end = end.min(total);
        let start = start.min(end);
        let ch = self.channels as usize;
        Self::new(
            self.samples[start * ch..end * ch].to_vec(),
            self.sample_rate,
            self.channels,
        )
    }

    /// Milliseconds `[start_ms, end_ms)`, clamped to the buffer.
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> Self {
        self.slice_frames(self.ms_to_frames(start_ms), self.ms_to_frames(end_ms))
    }

    /// The first `ms` milliseconds (or the whole buffer if shorter).
    pub fn head_ms(&self, ms: u64) -> Self {
        self.slice_frames(0, self.ms_to_frames(ms))
    }

    /// The last `ms` milliseconds (or the whole buffer if shorter).
    pub fn tail_ms(&self, ms: u64) -> Self {
        let total = self.frames();
        let n = self.ms_to_frames(ms).min(total);
        self.slice_frames(total - n, total)
    }

    /// Append `other` after `self`, conforming it to this buffer's format.
    pub fn concat(&self, other: &AudioBuffer) -> Self {
        let channels = self.channels.max(other.channels);
        let mut out = self.to_channels(channels);
        let other = other.conform(self.sample_rate, channels);
        out.samples.extend_from_slice(&other.samples);
        out
    }

    /// Right-pad with silence up to `frames` frames. Longer buffers are
    /// returned unchanged.
    pub fn pad_to_frames(&self, frames: usize) -> Self {
        let mut out = self.clone();
        let want = frames * self.channels as usize;
        if out.samples.len() < want {
            out.samples.resize(want, 0.0);
        }
        out
    }

    // ── Gain ─────────────────────────────────────────────────

    /// Apply a uniform gain offset in dB.
    pub fn gain_db(&self, db: f64) -> Self {
        let g = db_to_ratio(db) as f32;
        let mut out = self.clone();
        out.samples.iter_mut().for_each(|s| *s *= g);
        out
    }

    /// Apply a gain offset in dB to frames `[start, end)` only; the rest of
    /// the buffer and its length are untouched.
    pub fn gain_db_in_frames(&self, start: usize, end: usize, db: f64) -> Self {
        let total = self.frames();
        let end = end.min(total);
        let start = start.min(end);
        let ch = self.channels as usize;
        let g = db_to_ratio(db) as f32;
        let mut out = self.clone();
        out.samples[start * ch..end * ch]
            .iter_mut()
            .for_each(|s| *s *= g);
        out
    }

    /// Stereo pan in `[-1.0, 1.0]` (negative favours left).
    ///
    /// The loud side is boosted by up to 3 dB and the quiet side reduced so
    /// that the two linear gains sum to 2 before the centre correction.
    /// Always returns a stereo buffer.
    pub fn pan(&self, pan: f64) -> Self {
        let pan = if (-1.0..=1.0).contains(&pan) {
            pan
        } else {
            warn!(pan, "pan value out of range, clamping");
            pan.clamp(-1.0, 1.0)
        };

        let boost_db = pan.abs() * MAX_PAN_BOOST_DB;
        let reduce_db = ratio_to_db(db_to_ratio(MAX_PAN_BOOST_DB) - db_to_ratio(boost_db));
        let boost_db = boost_db / 2.0;
        let (left_db, right_db) = if pan < 0.0 {
            (boost_db, reduce_db)
        } else {
            (reduce_db, boost_db)
        };
        let left = db_to_ratio(left_db) as f32;
        let right = db_to_ratio(right_db) as f32;

        let mut out = self.to_channels(2);
        for frame in out.samples.chunks_exact_mut(2) {
            frame[0] *= left;
            frame[1] *= right;
        }
        out
    }

    // ── Envelopes ────────────────────────────────────────────

    /// Linear fade-in over the first `ms` milliseconds.
    pub fn fade_in(&self, ms: u64) -> Self {
        let mut out = self.clone();
        Fade::fade_in(self.ms_to_frames(ms)).apply(&mut out.samples, self.channels as usize);
        out
    }

    /// Linear fade-out over the last `ms` milliseconds.
    pub fn fade_out(&self, ms: u64) -> Self {
        let mut out = self.clone();
        Fade::fade_out(self.ms_to_frames(ms)).apply(&mut out.samples, self.channels as usize);
        out
    }

    // ── Layering ─────────────────────────────────────────────

    /// Additively layer `other` starting `position_ms` into this buffer.
    ///
    /// The result is as long as whichever ends later, so a late overlay
    /// extends the buffer rather than being cut off.
    pub fn overlay(&self, other: &AudioBuffer, position_ms: u64) -> Self {
        self.overlay_at_frame(other, self.ms_to_frames(position_ms))
    }

    /// Frame-addressed form of [`AudioBuffer::overlay`].
    pub fn overlay_at_frame(&self, other: &AudioBuffer, position: usize) -> Self {
        let channels = self.channels.max(other.channels);
        let mut out = self.to_channels(channels);
        let other = other.conform(self.sample_rate, channels);

        let ch = channels as usize;
        let end = position + other.frames();
        if out.frames() < end {
            out.samples.resize(end * ch, 0.0);
        }
        let dst = &mut out.samples[position * ch..end * ch];
        for (d, s) in dst.iter_mut().zip(other.samples.iter()) {
            *d += *s;
        }
        out
    }

    // ── Level measurement ────────────────────────────────────

    /// RMS over all samples (0 for an empty buffer).
    pub fn rms(&self) -> f64 {
        rms_of(&self.samples)
    }

    /// RMS level relative to full scale. Digital silence is -inf.
    pub fn dbfs(&self) -> f64 {
        ratio_to_db(self.rms())
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()))
    }

    /// Peak level relative to full scale.
    pub fn max_dbfs(&self) -> f64 {
        ratio_to_db(self.peak() as f64)
    }

    /// RMS of frames `[start, end)`, clamped.
    pub fn rms_frames(&self, start: usize, end: usize) -> f64 {
        let total = self.frames();
        let end = end.min(total);
        let start = start.min(end);
        let ch = self.channels as usize;
        rms_of(&self.samples[start * ch..end * ch])
    }

    /// Peak-normalise so the loudest sample sits `headroom_db` below full
    /// scale. Silent buffers are returned unchanged.
    pub fn normalize(&self, headroom_db: f64) -> Self {
        let peak = self.peak() as f64;
        if peak == 0.0 {
            return self.clone();
        }
        let target = db_to_ratio(-headroom_db);
        self.gain_db(ratio_to_db(target / peak))
    }

    // ── Format conversion ────────────────────────────────────

    /// Convert between mono and stereo. Mono → stereo duplicates the
    /// channel; anything → mono averages the channels.
    pub fn to_channels(&self, channels: u16) -> Self {
        let channels = channels.max(1);
        if channels == self.channels {
            return self.clone();
        }
        let src_ch = self.channels as usize;
        let mut samples = Vec::with_capacity(self.frames() * channels as usize);
        for frame in self.samples.chunks_exact(src_ch) {
            if channels == 1 {
                samples.push(frame.iter().sum::<f32>() / src_ch as f32);
            } else if src_ch == 1 {
                samples.extend(std::iter::repeat_n(frame[0], channels as usize));
            } else {
                for c in 0..channels as usize {
                    samples.push(frame[c.min(src_ch - 1)]);
                }
            }
        }
        Self::new(samples, self.sample_rate, channels)
    }

    /// Resample with linear interpolation between neighbouring frames.
    pub fn resample(&self, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        if sample_rate == self.sample_rate || self.is_empty() {
            return Self::new(self.samples.clone(), sample_rate, self.channels);
        }

        let ch = self.channels as usize;
        let src_frames = self.frames();
        let out_frames =
            (src_frames as u64 * sample_rate as u64 / self.sample_rate as u64) as usize;
        let step = self.sample_rate as f64 / sample_rate as f64;

        let mut samples = Vec::with_capacity(out_frames * ch);
        for i in 0..out_frames {
            let position = i as f64 * step;
            let idx = position as usize;
            let frac = (position - idx as f64) as f32;
            let next = (idx + 1).min(src_frames - 1);
            for c in 0..ch {
                let a = self.samples[idx * ch + c];
                let b = self.samples[next * ch + c];
                samples.push(a * (1.0 - frac) + b * frac);
            }
        }
        Self::new(samples, sample_rate, self.channels)
    }

    /// Convert to the given sample rate and channel count.
    pub fn conform(&self, sample_rate: u32, channels: u16) -> Self {
        if self.sample_rate == sample_rate && self.channels == channels {
            return self.clone();
        }
        self.resample(sample_rate).to_channels(channels)
    }
}

/// Frames spanned by `ms` milliseconds at `sample_rate`.
#[inline]
pub fn ms_to_frames(ms: u64, sample_rate: u32) -> usize {
    (ms * sample_rate as u64 / 1000) as usize
}

fn rms_of(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt()
}
