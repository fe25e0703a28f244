pub mod clip;
pub mod dsp;
pub mod emotion;
pub mod error;
pub mod features;
pub mod io;
pub mod scene;
pub mod suggest;

use crate::clip::{Clip, ClipCategory};
use crate::dsp::renderer::SceneRenderer;
use crate::error::MixResult;
use crate::io::{IngestConfig, decode_wav_bytes, ingest, wav_bytes};
use crate::scene::SceneMode;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the automix_core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: the preset settings for a scene mode, as a JS object.
/// Unknown names resolve to the custom preset.
#[wasm_bindgen]
pub fn scene_preset(mode: &str) -> Result<JsValue, JsValue> {
    let settings = SceneMode::from_name(mode).settings();
    serde_wasm_bindgen::to_value(&settings).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// Mix one WAV clip per category into final-mix WAV bytes, entirely in
/// memory. An empty slice means "no clip" for that category.
pub fn mix_wav(
    dialogue: &[u8],
    music: &[u8],
    sfx: &[u8],
    mode: SceneMode,
    ducking: bool,
) -> MixResult<Vec<u8>> {
    let config = IngestConfig::default();
    let load = |bytes: &[u8], category: ClipCategory| -> MixResult<Vec<Clip>> {
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        let buffer = ingest(&decode_wav_bytes(bytes)?, &config);
        Ok(vec![Clip::new(category.label(), category, buffer)])
    };
    let dialogue = load(dialogue, ClipCategory::Dialogue)?;
    let music = load(music, ClipCategory::Music)?;
    let sfx = load(sfx, ClipCategory::Sfx)?;

    let out = SceneRenderer::default().mix(&dialogue, &music, &sfx, &mode.settings(), ducking);
    wav_bytes(&out.final_mix)
}

/// WASM-exposed: [`mix_wav`] with the mode given by name.
#[wasm_bindgen]
pub fn mix_wav_bytes(
    dialogue: &[u8],
    music: &[u8],
    sfx: &[u8],
    mode: &str,
    ducking: bool,
) -> Result<Vec<u8>, JsValue> {
    mix_wav(dialogue, music, sfx, SceneMode::from_name(mode), ducking)
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::buffer::AudioBuffer;

    #[test]
    fn version_is_exposed() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn mix_wav_renders_interview_scene() {
        let tone: Vec<f32> = (0..44100)
            .map(|i| if (i / 50) % 2 == 0 { 0.4 } else { -0.4 })
            .collect();
        let dialogue = wav_bytes(&AudioBuffer::mono(&tone, 44100)).unwrap();
        let music = wav_bytes(&AudioBuffer::mono(&tone[..22050], 44100)).unwrap();

        let bytes = mix_wav(&dialogue, &music, &[], SceneMode::Interview, true).unwrap();
        let mix = decode_wav_bytes(&bytes).unwrap();
        assert_eq!(mix.channels(), 2);
        assert_eq!(mix.sample_rate(), 44100);
        assert_eq!(mix.len_ms(), 1000);
    }

    #[test]
    fn mix_wav_rejects_garbage() {
        assert!(mix_wav(b"nope", &[], &[], SceneMode::Podcast, false).is_err());
    }
}
