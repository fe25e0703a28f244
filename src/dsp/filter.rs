//! Biquad filters and the band-limiting EQ applied to effect stems.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::buffer::AudioBuffer;

/// Filter type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    Lowpass,
    Highpass,
}

/// A biquad IIR filter (2nd order).
///
/// Implements the standard Direct Form II Transposed structure.
/// Coefficient formulas from the Audio EQ Cookbook (Robert Bristow-Johnson).
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    pub filter_type: FilterType,
    pub frequency: f64,
    pub q: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    // State (Direct Form II Transposed)
    z1: f64,
    z2: f64,

    sample_rate: f64,
}

impl BiquadFilter {
    /// Butterworth-Q filter at `frequency` Hz.
    pub fn new(filter_type: FilterType, frequency: f64, sample_rate: f64) -> Self {
        let mut f = BiquadFilter {
            filter_type,
            frequency,
            q: std::f64::consts::FRAC_1_SQRT_2,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
        };
        f.update_coefficients();
        f
    }

    /// Recompute filter coefficients from current parameters.
    ///
    /// The cutoff is kept just below Nyquist so a low sample rate cannot
    /// produce an unstable filter.
    pub fn update_coefficients(&mut self) {
        let nyquist = self.sample_rate / 2.0;
        let freq = self.frequency.clamp(1.0, nyquist * 0.99);
        let w0 = 2.0 * PI * freq / self.sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * self.q);

        let (b0, b1, b2) = match self.filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterType::Highpass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -(1.0 + cos_w0), b0)
            }
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    /// Process a single sample through the filter.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    /// Reset filter state.
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    /// Filter a whole buffer, running an independent copy of this filter
    /// over each channel.
    pub fn apply(&self, buffer: &AudioBuffer) -> AudioBuffer {
        let ch = buffer.channels() as usize;
        let mut states: Vec<BiquadFilter> = (0..ch)
            .map(|_| {
                let mut f = self.clone();
                f.reset();
                f
            })
            .collect();

        let mut out = Vec::with_capacity(buffer.samples().len());
        for frame in buffer.samples().chunks_exact(ch) {
            for (s, f) in frame.iter().zip(states.iter_mut()) {
                out.push(f.process(*s as f64) as f32);
            }
        }
        AudioBuffer::new(out, buffer.sample_rate(), buffer.channels())
    }
}

/// Band-limiting EQ: a low-pass cascaded into a high-pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqConfig {
    pub low_pass_hz: f64,
    pub high_pass_hz: f64,
}

impl Default for EqConfig {
    fn default() -> Self {
        Self {
            low_pass_hz: 8000.0,
            high_pass_hz: 300.0,
        }
    }
}

/// Low-pass at `eq.low_pass_hz`, then high-pass at `eq.high_pass_hz`.
pub fn band_pass(buffer: &AudioBuffer, eq: &EqConfig) -> AudioBuffer {
    let sr = buffer.sample_rate() as f64;
    let low = BiquadFilter::new(FilterType::Lowpass, eq.low_pass_hz, sr).apply(buffer);
    BiquadFilter::new(FilterType::Highpass, eq.high_pass_hz, sr).apply(&low)
}
