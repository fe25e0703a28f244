//! Reverb effect — multi-tap echo built from delayed, attenuated copies.
//!
//! The source is dropped by a base attenuation to form the echo, and each
//! successive tap is pushed further back in time and down in level before
//! being layered onto the accumulating result.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::buffer::AudioBuffer;

/// Space size, which sets the spacing between taps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReverbSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl FromStr for ReverbSize {
    type Err = std::convert::Infallible;

    /// Unrecognised labels fall back to [`ReverbSize::Medium`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "small" => ReverbSize::Small,
            "large" => ReverbSize::Large,
            _ => ReverbSize::Medium,
        })
    }
}

/// Tap delay quanta per size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayTable {
    pub small_ms: u64,
    pub medium_ms: u64,
    pub large_ms: u64,
}

impl Default for DelayTable {
    fn default() -> Self {
        Self {
            small_ms: 60,
            medium_ms: 150,
            large_ms: 300,
        }
    }
}

/// Configuration for the echo taps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbConfig {
    /// Attenuation of the echo relative to the source, in dB.
    pub base_attenuation_db: f64,
    /// Extra attenuation per tap index, in dB.
    pub tap_step_db: f64,
    /// Number of taps.
    pub taps: u32,
    pub delays: DelayTable,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            base_attenuation_db: 8.0,
            tap_step_db: 2.0,
            taps: 3,
            delays: DelayTable::default(),
        }
    }
}

impl ReverbConfig {
    /// Delay quantum for a size.
    pub fn delay_ms(&self, size: ReverbSize) -> u64 {
        match size {
            ReverbSize::Small => self.delays.small_ms,
            ReverbSize::Medium => self.delays.medium_ms,
            ReverbSize::Large => self.delays.large_ms,
        }
    }

    /// `(offset_ms, gain_db)` for every tap, earliest first.
    pub fn taps(&self, size: ReverbSize) -> Vec<(u64, f64)> {
        let delay = self.delay_ms(size);
        (1..=self.taps)
            .map(|i| {
                let gain = -self.base_attenuation_db - self.tap_step_db * i as f64;
                (delay * i as u64, gain)
            })
            .collect()
    }
}

/// Layer the configured echo taps onto `buffer`.
///
/// The result grows to hold the last tap, so its length is the input
/// length plus `taps * delay_ms(size)`.
pub fn apply_reverb(buffer: &AudioBuffer, size: ReverbSize, config: &ReverbConfig) -> AudioBuffer {
    config
        .taps(size)
        .into_iter()
        .fold(buffer.clone(), |acc, (offset_ms, gain_db)| {
            acc.overlay(&buffer.gain_db(gain_db), offset_ms)
        })
}
