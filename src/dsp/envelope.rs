//! Fade envelopes — linear gain ramps applied to the head or tail of a buffer.

/// Which end of the buffer a fade shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeKind {
    /// Ramp up from silence at the start.
    In,
    /// Ramp down to silence at the end.
    Out,
}

/// A linear amplitude ramp spanning `frames` frames.
///
/// Fade-in gain at ramp position `i` is `i / n`; fade-out gain is
/// `(n - 1 - i) / n`, so a fade-out always lands on exactly zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    pub kind: FadeKind,
    pub frames: usize,
}

impl Fade {
    pub fn new(kind: FadeKind, frames: usize) -> Self {
        Fade { kind, frames }
    }

    pub fn fade_in(frames: usize) -> Self {
        Self::new(FadeKind::In, frames)
    }

    pub fn fade_out(frames: usize) -> Self {
        Self::new(FadeKind::Out, frames)
    }

    /// Gain at position `i` within the ramp (0-based). Positions past the
    /// ramp return unity gain.
    #[inline]
    pub fn gain_at(&self, i: usize) -> f32 {
        if i >= self.frames {
            return 1.0;
        }
        let n = self.frames as f64;
        let g = match self.kind {
            FadeKind::In => i as f64 / n,
            FadeKind::Out => (n - 1.0 - i as f64) / n,
        };
        g as f32
    }

    /// Apply the ramp in place to interleaved samples. The ramp is clamped
    /// to the number of frames available.
    pub fn apply(&self, samples: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let total = samples.len() / channels;
        let ramp = Fade::new(self.kind, self.frames.min(total));
        if ramp.frames == 0 {
            return;
        }

        let offset = match ramp.kind {
            FadeKind::In => 0,
            FadeKind::Out => total - ramp.frames,
        };
        for i in 0..ramp.frames {
            let g = ramp.gain_at(i);
            let base = (offset + i) * channels;
            for s in &mut samples[base..base + channels] {
                *s *= g;
            }
        }
    }
}
