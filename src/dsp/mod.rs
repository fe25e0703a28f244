//! DSP core — buffer primitives and the processing stages of a scene mix.
//!
//! WAV decoding and encoding live in [`crate::io`]; only the renderer's
//! export step writes files.

pub mod buffer;
pub mod ducking;
pub mod envelope;
pub mod filter;
pub mod mixer;
pub mod renderer;
pub mod reverb;
pub mod silence;
