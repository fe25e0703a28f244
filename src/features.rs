//! Per-clip feature extraction and the JSON feature table.
//!
//! Level is measured on the raw samples; the spectral features run on a
//! mono mixdown through a Hann-windowed STFT.

use std::f32::consts::PI;
use std::path::Path;

use rustfft::{FftPlanner, num_complex::Complex};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clip::{ClipCategory, ClipMetadata};
use crate::dsp::buffer::AudioBuffer;
use crate::error::{MixError, MixResult};
use crate::io::read_wav;

/// Full-scale amplitude of a 16-bit sample; `rms` is reported in these units.
const I16_SCALE: f64 = 32768.0;

/// STFT and tempo-search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub n_fft: usize,
    pub hop: usize,
    pub min_bpm: f64,
    pub max_bpm: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop: 512,
            min_bpm: 60.0,
            max_bpm: 200.0,
        }
    }
}

/// One row of the feature table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipFeatures {
    pub filename: String,
    #[serde(flatten)]
    pub metadata: ClipMetadata,
}

impl ClipFeatures {
    pub fn category(&self) -> Option<ClipCategory> {
        ClipCategory::from_filename(&self.filename)
    }
}

/// Feature rows split by category. Rows matching no category are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Categorized {
    pub dialogue: Vec<ClipFeatures>,
    pub music: Vec<ClipFeatures>,
    pub sfx: Vec<ClipFeatures>,
}

/// Measure one decoded buffer.
pub fn analyze(buffer: &AudioBuffer, config: &AnalysisConfig) -> ClipMetadata {
    let mono = buffer.to_channels(1);
    let samples = mono.samples();
    let spectrogram = magnitude_spectrogram(samples, config);
    let frame_rate = buffer.sample_rate() as f64 / config.hop as f64;

    ClipMetadata {
        duration_sec: buffer.duration_ms() / 1000.0,
        rms: buffer.rms() * I16_SCALE,
        sample_rate: buffer.sample_rate(),
        spectral_centroid: spectral_centroid(&spectrogram, buffer.sample_rate(), config.n_fft),
        zero_crossing_rate: zero_crossing_rate(samples, config),
        tempo_bpm: estimate_tempo(&onset_envelope(&spectrogram), frame_rate, config),
    }
}

/// Decode `path` and measure it.
pub fn extract_features(path: &Path, config: &AnalysisConfig) -> MixResult<ClipFeatures> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| MixError::invalid_argument(format!("not a file path: {}", path.display())))?;
    let buffer = read_wav(path)?;
    Ok(ClipFeatures {
        filename,
        metadata: analyze(&buffer, config),
    })
}

/// Measure every `.wav` file in `dir`, in filename order.
///
/// Files that fail to decode are skipped with a warning.
pub fn analyze_dir(dir: &Path, config: &AnalysisConfig) -> MixResult<Vec<ClipFeatures>> {
    let entries = std::fs::read_dir(dir).map_err(|e| MixError::io(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| MixError::io(dir, e))?.path();
        let is_wav = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if is_wav && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut rows = Vec::with_capacity(paths.len());
    for path in &paths {
        match extract_features(path, config) {
            Ok(row) => rows.push(row),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable clip"),
        }
    }
    info!(count = rows.len(), dir = %dir.display(), "analysed clips");
    Ok(rows)
}

/// Write the feature table as a JSON array.
pub fn save_features(path: &Path, rows: &[ClipFeatures]) -> MixResult<()> {
    let json = serde_json::to_string_pretty(rows)?;
    std::fs::write(path, json).map_err(|e| MixError::io(path, e))
}

/// Read a feature table. Rows that do not parse are skipped with a warning.
pub fn load_features(path: &Path) -> MixResult<Vec<ClipFeatures>> {
    let text = std::fs::read_to_string(path).map_err(|e| MixError::io(path, e))?;
    parse_features(&text)
}

pub fn parse_features(json: &str) -> MixResult<Vec<ClipFeatures>> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let rows = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let filename = value
                .get("filename")
                .and_then(|f| f.as_str())
                .unwrap_or("<unnamed>")
                .to_owned();
            serde_json::from_value::<ClipFeatures>(value)
                .inspect_err(|e| {
                    warn!(index, filename = %filename, error = %e, "skipping feature row")
                })
                .ok()
        })
        .collect();
    Ok(rows)
}

/// Split rows by filename keyword.
pub fn categorize(rows: &[ClipFeatures]) -> Categorized {
    rows.iter().fold(Categorized::default(), |mut acc, row| {
        match row.category() {
            Some(ClipCategory::Dialogue) => acc.dialogue.push(row.clone()),
            Some(ClipCategory::Music) => acc.music.push(row.clone()),
            Some(ClipCategory::Sfx) => acc.sfx.push(row.clone()),
            None => {}
        }
        acc
    })
}

// ── Spectral analysis ────────────────────────────────────────

fn hann(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Frame start offsets. A signal shorter than one window still yields a
/// single zero-padded frame.
fn frame_starts(len: usize, size: usize, hop: usize) -> impl Iterator<Item = usize> {
    let count = match len {
        0 => 0,
        n if n <= size => 1,
        n => (n - size) / hop + 1,
    };
    (0..count).map(move |f| f * hop)
}

/// Magnitudes of the positive-frequency bins, one row per frame.
fn magnitude_spectrogram(samples: &[f32], config: &AnalysisConfig) -> Vec<Vec<f32>> {
    let n = config.n_fft.max(2);
    let window = hann(n);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(n);

    frame_starts(samples.len(), n, config.hop.max(1))
        .map(|start| {
            let mut buf: Vec<Complex<f32>> = (0..n)
                .map(|i| {
                    let s = samples.get(start + i).copied().unwrap_or(0.0);
                    Complex::new(s * window[i], 0.0)
                })
                .collect();
            fft.process(&mut buf);
            buf[..=n / 2].iter().map(|c| c.norm()).collect()
        })
        .collect()
}

/// Frame-averaged magnitude-weighted mean frequency. Silent frames count
/// as 0 Hz.
fn spectral_centroid(spectrogram: &[Vec<f32>], sample_rate: u32, n_fft: usize) -> f64 {
    if spectrogram.is_empty() {
        return 0.0;
    }
    let bin_hz = sample_rate as f64 / n_fft as f64;
    let total: f64 = spectrogram
        .iter()
        .map(|frame| {
            let (weighted, sum) = frame.iter().enumerate().fold((0.0, 0.0), |(w, s), (k, &m)| {
                (w + k as f64 * bin_hz * m as f64, s + m as f64)
            });
            if sum > 0.0 { weighted / sum } else { 0.0 }
        })
        .sum();
    total / spectrogram.len() as f64
}

/// Frame-averaged fraction of adjacent sample pairs that change sign.
fn zero_crossing_rate(samples: &[f32], config: &AnalysisConfig) -> f64 {
    let size = config.n_fft.max(2);
    let rates: Vec<f64> = frame_starts(samples.len(), size, config.hop.max(1))
        .map(|start| {
            let frame = &samples[start..(start + size).min(samples.len())];
            let crossings = frame
                .windows(2)
                .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
                .count();
            crossings as f64 / frame.len() as f64
        })
        .collect();
    if rates.is_empty() {
        0.0
    } else {
        rates.iter().sum::<f64>() / rates.len() as f64
    }
}

/// Half-wave rectified spectral flux, one value per frame transition.
fn onset_envelope(spectrogram: &[Vec<f32>]) -> Vec<f64> {
    spectrogram
        .windows(2)
        .map(|pair| {
            pair[1]
                .iter()
                .zip(&pair[0])
                .map(|(&cur, &prev)| (cur - prev).max(0.0) as f64)
                .sum()
        })
        .collect()
}

/// Strongest autocorrelation lag of the onset envelope within the BPM
/// window, converted to BPM. 0 when nothing periodic is found.
fn estimate_tempo(envelope: &[f64], frame_rate: f64, config: &AnalysisConfig) -> f64 {
    if envelope.is_empty() || config.min_bpm <= 0.0 || config.max_bpm <= config.min_bpm {
        return 0.0;
    }
    let min_lag = ((60.0 * frame_rate / config.max_bpm).ceil() as usize).max(1);
    let max_lag = (60.0 * frame_rate / config.min_bpm).floor() as usize;
    let max_lag = max_lag.min(envelope.len().saturating_sub(1));
    if min_lag > max_lag {
        return 0.0;
    }

    let mean = envelope.iter().sum::<f64>() / envelope.len() as f64;
    let centered: Vec<f64> = envelope.iter().map(|v| v - mean).collect();

    let mut best = (0_usize, 0.0_f64);
    for lag in min_lag..=max_lag {
        let score: f64 = centered
            .iter()
            .zip(&centered[lag..])
            .map(|(a, b)| a * b)
            .sum();
        if score > best.1 {
            best = (lag, score);
        }
    }
    match best.0 {
        0 => 0.0,
        lag => 60.0 * frame_rate / lag as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> AudioBuffer {
        let n = (sample_rate as f32 * seconds) as usize;
        let data: Vec<f32> = (0..n)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        AudioBuffer::mono(&data, sample_rate)
    }

    fn row(filename: &str) -> ClipFeatures {
        ClipFeatures {
            filename: filename.into(),
            metadata: ClipMetadata::default(),
        }
    }

    #[test]
    fn rms_is_in_sixteen_bit_units() {
        let b = AudioBuffer::mono(&vec![0.5; 4000], 8000);
        let m = analyze(&b, &AnalysisConfig::default());
        assert!((m.rms - 16384.0).abs() < 1e-6);
        assert!((m.duration_sec - 0.5).abs() < 1e-9);
        assert_eq!(m.sample_rate, 8000);
    }

    #[test]
    fn centroid_of_a_sine_is_its_frequency() {
        let m = analyze(&sine(1000.0, 16000, 1.0), &AnalysisConfig::default());
        assert!(
            (m.spectral_centroid - 1000.0).abs() < 20.0,
            "centroid was {}",
            m.spectral_centroid
        );
    }

    #[test]
    fn zcr_of_a_square_wave() {
        // sign flips every 4 samples
        let data: Vec<f32> = (0..16000)
            .map(|i| if (i / 4) % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        let m = analyze(&AudioBuffer::mono(&data, 16000), &AnalysisConfig::default());
        assert!((m.zero_crossing_rate - 0.25).abs() < 0.01);
    }

    #[test]
    fn click_train_tempo() {
        // 8192 Hz / 512 hop = 16 frames per second; 120 BPM is exactly 8 frames
        let sr = 8192;
        let mut data = vec![0.0_f32; sr as usize * 8];
        for beat in (0..data.len()).step_by(sr as usize / 2) {
            for (i, s) in data[beat..].iter_mut().take(32).enumerate() {
                *s = if i % 2 == 0 { 0.9 } else { -0.9 };
            }
        }
        let m = analyze(&AudioBuffer::mono(&data, sr), &AnalysisConfig::default());
        assert!((m.tempo_bpm - 120.0).abs() < 1e-6, "tempo was {}", m.tempo_bpm);
    }

    #[test]
    fn silence_has_no_features() {
        let m = analyze(&AudioBuffer::silent(500, 8000, 1), &AnalysisConfig::default());
        assert_eq!(m.rms, 0.0);
        assert_eq!(m.spectral_centroid, 0.0);
        assert_eq!(m.tempo_bpm, 0.0);
    }

    #[test]
    fn empty_buffer_is_all_zero() {
        let m = analyze(&AudioBuffer::silent(0, 8000, 1), &AnalysisConfig::default());
        assert_eq!(m, ClipMetadata { sample_rate: 8000, ..ClipMetadata::default() });
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let json = r#"[
            {"filename": "dialogue_a.wav", "duration_sec": 1.5, "rms": 1200.0, "sample_rate": 44100,
             "spectral_centroid": 1800.0, "zero_crossing_rate": 0.1, "tempo_bpm": 0.0},
            {"filename": "music_b.wav", "rms": "loud"},
            {"filename": "sfx_c.wav", "duration_sec": 0.4, "rms": 300, "sample_rate": 22050,
             "spectral_centroid": 4000, "zero_crossing_rate": 0.3, "tempo_bpm": 0}
        ]"#;
        let rows = parse_features(json).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].filename, "dialogue_a.wav");
        assert_eq!(rows[0].metadata.rms, 1200.0);
        assert_eq!(rows[1].metadata.sample_rate, 22050);
    }

    #[test]
    fn non_array_table_is_an_error() {
        assert!(matches!(parse_features("{}"), Err(MixError::Json(_))));
    }

    #[test]
    fn categorize_splits_by_keyword() {
        let rows = vec![
            row("dialogue_1.wav"),
            row("music_bed.wav"),
            row("fx_boom.wav"),
            row("ambience.wav"),
            row("dialogue_2.wav"),
        ];
        let c = categorize(&rows);
        assert_eq!(c.dialogue.len(), 2);
        assert_eq!(c.music, vec![row("music_bed.wav")]);
        assert_eq!(c.sfx, vec![row("fx_boom.wav")]);
    }

    #[test]
    fn analyze_dir_saves_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        crate::io::write_wav(dir.path().join("music_a.wav"), &sine(440.0, 8000, 0.5)).unwrap();
        crate::io::write_wav(dir.path().join("dialogue_b.WAV"), &sine(220.0, 8000, 0.25)).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not audio").unwrap();
        std::fs::write(dir.path().join("sfx_broken.wav"), "not audio").unwrap();

        let rows = analyze_dir(dir.path(), &AnalysisConfig::default()).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["dialogue_b.WAV", "music_a.wav"]);

        let table = dir.path().join("features.json");
        save_features(&table, &rows).unwrap();
        assert_eq!(load_features(&table).unwrap(), rows);
    }

    #[test]
    fn saved_floats_load_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![ClipFeatures {
            filename: "music_a.wav".into(),
            metadata: ClipMetadata {
                rms: 11584.880482400324,
                spectral_centroid: 1234.5678901234567,
                zero_crossing_rate: 0.1 + 0.2,
                tempo_bpm: 117.45383522727273,
                ..ClipMetadata::default()
            },
        }];
        let table = dir.path().join("features.json");
        save_features(&table, &rows).unwrap();
        let loaded = load_features(&table).unwrap();
        assert_eq!(loaded[0].metadata.rms.to_bits(), 11584.880482400324_f64.to_bits());
        assert_eq!(loaded, rows);
    }
}
