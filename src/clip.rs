//! Clips — the categorised input units of a mix.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dsp::buffer::AudioBuffer;
use crate::dsp::reverb::ReverbSize;

/// Which stem a clip belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipCategory {
    Dialogue,
    Music,
    Sfx,
}

impl ClipCategory {
    pub fn label(self) -> &'static str {
        match self {
            ClipCategory::Dialogue => "dialogue",
            ClipCategory::Music => "music",
            ClipCategory::Sfx => "sfx",
        }
    }

    /// Categorise by filename: `dialogue`, then `music`, then `sfx`/`fx`.
    /// Anything else is not part of the mix.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let name = filename.to_lowercase();
        if name.contains("dialogue") {
            Some(ClipCategory::Dialogue)
        } else if name.contains("music") {
            Some(ClipCategory::Music)
        } else if name.contains("sfx") || name.contains("fx") {
            Some(ClipCategory::Sfx)
        } else {
            None
        }
    }
}

impl fmt::Display for ClipCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Acoustic space hinted at by a clip's filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Cave,
    Room,
    Outdoor,
    None,
}

impl Environment {
    /// Keyword lookup, case-insensitive. `cave` wins over `room`, which
    /// wins over `outdoor`/`open`.
    pub fn from_filename(filename: &str) -> Self {
        let name = filename.to_lowercase();
        if name.contains("cave") {
            Environment::Cave
        } else if name.contains("room") {
            Environment::Room
        } else if name.contains("outdoor") || name.contains("open") {
            Environment::Outdoor
        } else {
            Environment::None
        }
    }

    /// Reverb size for this space, if it gets any.
    pub fn reverb_size(self) -> Option<ReverbSize> {
        match self {
            Environment::Cave => Some(ReverbSize::Large),
            Environment::Room => Some(ReverbSize::Small),
            Environment::Outdoor => Some(ReverbSize::Medium),
            Environment::None => None,
        }
    }
}

/// Per-clip analysis values supplied by the feature extractor.
///
/// `rms` is in 16-bit integer amplitude units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipMetadata {
    pub duration_sec: f64,
    pub rms: f64,
    pub sample_rate: u32,
    pub spectral_centroid: f64,
    pub zero_crossing_rate: f64,
    pub tempo_bpm: f64,
}

/// A loaded input clip. Its buffer is never modified by the engine.
#[derive(Debug, Clone)]
pub struct Clip {
    pub filename: String,
    pub category: ClipCategory,
    /// `None` when the audio could not be loaded.
    pub buffer: Option<AudioBuffer>,
    pub metadata: ClipMetadata,
}

impl Clip {
    pub fn new(filename: impl Into<String>, category: ClipCategory, buffer: AudioBuffer) -> Self {
        Clip {
            filename: filename.into(),
            category,
            buffer: Some(buffer),
            metadata: ClipMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ClipMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn environment(&self) -> Environment {
        Environment::from_filename(&self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_filename_keywords() {
        assert_eq!(ClipCategory::from_filename("Dialogue_01.wav"), Some(ClipCategory::Dialogue));
        assert_eq!(ClipCategory::from_filename("music_theme.wav"), Some(ClipCategory::Music));
        assert_eq!(ClipCategory::from_filename("sfx_door.wav"), Some(ClipCategory::Sfx));
        assert_eq!(ClipCategory::from_filename("fx_boom.wav"), Some(ClipCategory::Sfx));
        assert_eq!(ClipCategory::from_filename("notes.wav"), None);
        // dialogue takes precedence
        assert_eq!(
            ClipCategory::from_filename("dialogue_over_music.wav"),
            Some(ClipCategory::Dialogue)
        );
    }

    #[test]
    fn environments_map_to_reverb_sizes() {
        let size = |name: &str| Environment::from_filename(name).reverb_size();
        assert_eq!(size("cave_drip.wav"), Some(ReverbSize::Large));
        assert_eq!(size("room_step.wav"), Some(ReverbSize::Small));
        assert_eq!(size("OUTDOOR_wind.wav"), Some(ReverbSize::Medium));
        assert_eq!(size("open_field.wav"), Some(ReverbSize::Medium));
        assert_eq!(Environment::from_filename("drip.wav"), Environment::None);
        assert_eq!(size("drip.wav"), None);
    }

    #[test]
    fn cave_wins_over_room() {
        assert_eq!(Environment::from_filename("cave_room.wav"), Environment::Cave);
    }
}
