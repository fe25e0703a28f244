//! Scene modes — named presets for gain staging, fades, reverb and the
//! music intro/outro bed.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::MixResult;

/// Per-stem gain offsets in dB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainStaging {
    pub dialogue: f64,
    pub music: f64,
    pub sfx: f64,
}

/// Parameters for one render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneSettings {
    pub gain: GainStaging,
    pub fade_duration_ms: u64,
    pub reverb_enabled: bool,
    pub music_intro_ms: u64,
    pub music_outro_ms: u64,
}

impl Default for SceneSettings {
    fn default() -> Self {
        SceneMode::Custom.settings()
    }
}

impl SceneSettings {
    /// Parse settings from JSON. Missing fields are an error; a settings
    /// file replaces the preset wholesale.
    pub fn from_json(json: &str) -> MixResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> MixResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Apply field overrides on top of these settings.
    pub fn with_overrides(mut self, overrides: &SceneOverrides) -> Self {
        if let Some(reverb) = overrides.reverb {
            self.reverb_enabled = reverb;
        }
        self
    }
}

/// Named presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneMode {
    #[default]
    Cinematic,
    Trailer,
    Podcast,
    Interview,
    Custom,
}

impl SceneMode {
    pub const ALL: [SceneMode; 5] = [
        SceneMode::Cinematic,
        SceneMode::Trailer,
        SceneMode::Podcast,
        SceneMode::Interview,
        SceneMode::Custom,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SceneMode::Cinematic => "cinematic",
            SceneMode::Trailer => "trailer",
            SceneMode::Podcast => "podcast",
            SceneMode::Interview => "interview",
            SceneMode::Custom => "custom",
        }
    }

    /// Look up a mode by name, case-insensitively. Unknown names fall back
    /// to [`SceneMode::Custom`].
    pub fn from_name(name: &str) -> Self {
        let wanted = name.trim().to_lowercase();
        match Self::ALL.into_iter().find(|m| m.label() == wanted) {
            Some(mode) => mode,
            None => {
                warn!(mode = name, "unknown scene mode, using custom");
                SceneMode::Custom
            }
        }
    }

    /// The preset settings for this mode.
    pub fn settings(self) -> SceneSettings {
        let (dialogue, music, sfx, fade, reverb, intro, outro) = match self {
            SceneMode::Cinematic => (3.0, -5.0, -3.0, 1500, true, 2000, 3000),
            SceneMode::Trailer => (5.0, 0.0, -1.0, 1200, true, 1500, 2500),
            SceneMode::Podcast => (6.0, -6.0, -6.0, 800, false, 1000, 1000),
            SceneMode::Interview => (5.0, -10.0, -10.0, 500, false, 0, 0),
            SceneMode::Custom => (4.0, -3.0, -2.0, 1000, true, 2000, 3000),
        };
        SceneSettings {
            gain: GainStaging { dialogue, music, sfx },
            fade_duration_ms: fade,
            reverb_enabled: reverb,
            music_intro_ms: intro,
            music_outro_ms: outro,
        }
    }

    /// Speech-heavy modes duck music by default.
    pub fn default_ducking(self) -> bool {
        matches!(self, SceneMode::Podcast | SceneMode::Interview)
    }
}

impl fmt::Display for SceneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Field-level overrides from the configuration surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneOverrides {
    pub reverb: Option<bool>,
    pub ducking: Option<bool>,
    /// Render in memory only; export nothing.
    #[serde(default)]
    pub preview: bool,
}

impl SceneOverrides {
    /// Explicit ducking choice if given, else the mode's default.
    pub fn ducking_for(&self, mode: SceneMode) -> bool {
        self.ducking.unwrap_or_else(|| mode.default_ducking())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cinematic_preset_values() {
        let s = SceneMode::Cinematic.settings();
        assert_eq!(
            s,
            SceneSettings {
                gain: GainStaging { dialogue: 3.0, music: -5.0, sfx: -3.0 },
                fade_duration_ms: 1500,
                reverb_enabled: true,
                music_intro_ms: 2000,
                music_outro_ms: 3000,
            }
        );
    }

    #[test]
    fn interview_has_no_bed() {
        let s = SceneMode::Interview.settings();
        assert_eq!(s.music_intro_ms, 0);
        assert_eq!(s.music_outro_ms, 0);
        assert!(!s.reverb_enabled);
    }

    #[test]
    fn names_are_case_insensitive_with_custom_fallback() {
        assert_eq!(SceneMode::from_name("Podcast"), SceneMode::Podcast);
        assert_eq!(SceneMode::from_name(" TRAILER "), SceneMode::Trailer);
        assert_eq!(SceneMode::from_name("documentary"), SceneMode::Custom);
        assert_eq!(SceneSettings::default(), SceneMode::Custom.settings());
    }

    #[test]
    fn ducking_defaults_follow_mode() {
        let none = SceneOverrides::default();
        assert!(none.ducking_for(SceneMode::Podcast));
        assert!(none.ducking_for(SceneMode::Interview));
        assert!(!none.ducking_for(SceneMode::Cinematic));

        let forced = SceneOverrides { ducking: Some(true), ..Default::default() };
        assert!(forced.ducking_for(SceneMode::Trailer));
        let off = SceneOverrides { ducking: Some(false), ..Default::default() };
        assert!(!off.ducking_for(SceneMode::Podcast));
    }

    #[test]
    fn reverb_override_wins() {
        let s = SceneMode::Podcast
            .settings()
            .with_overrides(&SceneOverrides { reverb: Some(true), ..Default::default() });
        assert!(s.reverb_enabled);
        let s = SceneMode::Cinematic.settings().with_overrides(&SceneOverrides::default());
        assert!(s.reverb_enabled);
    }

    #[test]
    fn settings_json_round_trip() {
        let s = SceneMode::Trailer.settings();
        let json = s.to_json().unwrap();
        assert!(json.contains("\"fade_duration_ms\": 1200"));
        assert_eq!(SceneSettings::from_json(&json).unwrap(), s);
    }

    #[test]
    fn incomplete_settings_json_is_rejected() {
        assert!(SceneSettings::from_json(r#"{"fade_duration_ms": 10}"#).is_err());
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SceneMode::Podcast).unwrap(), "\"podcast\"");
    }
}
