//! WAV decode/encode at the engine boundary, and clip ingestion.
//!
//! Everything that touches the filesystem or a codec lives here; the DSP
//! modules only ever see [`AudioBuffer`]s.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clip::{Clip, ClipCategory, ClipMetadata};
use crate::dsp::buffer::AudioBuffer;
use crate::error::{MixError, MixResult};

/// Format every ingested clip is converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Length of the silent stand-in for a clip whose file is missing.
    pub missing_clip_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            missing_clip_ms: 1000,
        }
    }
}

/// Decode a WAV stream into f32 samples in `[-1.0, 1.0]`.
pub fn decode_wav<R: Read>(reader: R) -> MixResult<AudioBuffer> {
    let reader = hound::WavReader::new(reader)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(MixError::decode("wav declares zero channels"));
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => {
            if spec.bits_per_sample != 32 {
                return Err(MixError::decode(format!(
                    "unsupported float width: {} bits",
                    spec.bits_per_sample
                )));
            }
            reader.into_samples::<f32>().collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            if !(1..=32).contains(&bits) {
                return Err(MixError::decode(format!("unsupported int width: {bits} bits")));
            }
            let scale = 1.0 / (1_u64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(AudioBuffer::new(samples, spec.sample_rate, spec.channels))
}

/// Decode a WAV file.
pub fn read_wav(path: impl AsRef<Path>) -> MixResult<AudioBuffer> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| MixError::io(path, e))?;
    decode_wav(BufReader::new(file))
}

/// Decode WAV bytes held in memory.
pub fn decode_wav_bytes(bytes: &[u8]) -> MixResult<AudioBuffer> {
    decode_wav(Cursor::new(bytes))
}

/// Encode as 16-bit PCM at the buffer's own rate and channel count.
/// Samples are clamped to full scale.
pub fn encode_wav<W: Write + Seek>(writer: W, buffer: &AudioBuffer) -> MixResult<()> {
    let spec = hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut wav = hound::WavWriter::new(writer, spec)?;
    for &s in buffer.samples() {
        let quantized = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        wav.write_sample(quantized)?;
    }
    wav.finalize()?;
    Ok(())
}

/// Write a WAV file, replacing any existing file.
pub fn write_wav(path: impl AsRef<Path>, buffer: &AudioBuffer) -> MixResult<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| MixError::io(path, e))?;
    encode_wav(BufWriter::new(file), buffer)?;
    debug!(path = %path.display(), len_ms = buffer.len_ms(), "wrote wav");
    Ok(())
}

/// Encode to an in-memory WAV file.
pub fn wav_bytes(buffer: &AudioBuffer) -> MixResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    encode_wav(&mut cursor, buffer)?;
    Ok(cursor.into_inner())
}

/// Bring a decoded buffer to the ingest format.
pub fn ingest(buffer: &AudioBuffer, config: &IngestConfig) -> AudioBuffer {
    buffer.conform(config.sample_rate, config.channels)
}

/// Load one clip from `data_dir`.
///
/// A missing file is replaced by `missing_clip_ms` of silence with a
/// warning. Decode failures are returned to the caller.
pub fn load_clip(
    data_dir: &Path,
    filename: &str,
    category: ClipCategory,
    metadata: ClipMetadata,
    config: &IngestConfig,
) -> MixResult<Clip> {
    let path = data_dir.join(filename);
    let buffer = if path.exists() {
        ingest(&read_wav(&path)?, config)
    } else {
        warn!(filename, "missing clip file, substituting silence");
        AudioBuffer::silent(config.missing_clip_ms, config.sample_rate, config.channels)
    };
    Ok(Clip::new(filename, category, buffer).with_metadata(metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, sample_rate: u32, channels: u16) -> AudioBuffer {
        let data: Vec<f32> = (0..frames * channels as usize)
            .map(|i| ((i % 200) as f32 / 100.0) - 1.0)
            .collect();
        AudioBuffer::new(data, sample_rate, channels)
    }

    #[test]
    fn wav_bytes_decode_back() {
        let b = ramp(400, 22050, 2);
        let bytes = wav_bytes(&b).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");

        let back = decode_wav_bytes(&bytes).unwrap();
        assert_eq!(back.sample_rate(), 22050);
        assert_eq!(back.channels(), 2);
        assert_eq!(back.frames(), 400);
        for (a, b) in back.samples().iter().zip(b.samples()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn encode_clamps_overs() {
        let b = AudioBuffer::mono(&[2.0, -3.0], 8000);
        let back = decode_wav_bytes(&wav_bytes(&b).unwrap()).unwrap();
        assert!((back.samples()[0] - 1.0).abs() < 1e-3);
        assert!((back.samples()[1] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn float_wavs_decode() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut w = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0.25_f32, -0.5, 0.75] {
                w.write_sample(s).unwrap();
            }
            w.finalize().unwrap();
        }
        let b = decode_wav_bytes(cursor.get_ref()).unwrap();
        assert_eq!(b.samples(), &[0.25, -0.5, 0.75]);
    }

    #[test]
    fn garbage_is_a_wav_error() {
        let err = decode_wav_bytes(b"definitely not a wav").unwrap_err();
        assert!(matches!(err, MixError::Wav(_)));
    }

    #[test]
    fn ingest_normalises_format() {
        let b = ramp(22050, 22050, 2);
        let out = ingest(&b, &IngestConfig::default());
        assert_eq!(out.sample_rate(), 44100);
        assert_eq!(out.channels(), 1);
        assert_eq!(out.len_ms(), 1000);
    }

    #[test]
    fn load_clip_reads_and_substitutes() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path().join("dialogue_a.wav"), &ramp(4410, 44100, 1)).unwrap();

        let cfg = IngestConfig::default();
        let load = |name: &str| {
            load_clip(dir.path(), name, ClipCategory::Dialogue, ClipMetadata::default(), &cfg)
        };
        let clip = load("dialogue_a.wav").unwrap();
        assert_eq!(clip.buffer.as_ref().unwrap().len_ms(), 100);

        let gone = load("dialogue_b.wav").unwrap();
        let buf = gone.buffer.unwrap();
        assert_eq!(buf.len_ms(), 1000);
        assert_eq!(buf.peak(), 0.0);
    }

    #[test]
    fn corrupt_clip_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("music_bad.wav"), b"junk").unwrap();
        let res = load_clip(
            dir.path(),
            "music_bad.wav",
            ClipCategory::Music,
            ClipMetadata::default(),
            &IngestConfig::default(),
        );
        assert!(res.is_err());
    }
}
