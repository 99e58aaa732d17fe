//! Track Buffer
//!
//! An immutable, fully-decoded PCM buffer for one loaded file. Replaced
//! atomically on every `load`; never mutated in place.

/// A fully decoded (and, if needed, resampled) audio track.
///
/// Samples are stored interleaved: `[c0_0, c1_0, ..., cN_0, c0_1, ...]`.
#[derive(Debug, Clone)]
pub struct TrackBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    samples: Vec<f32>,
}

impl TrackBuffer {
    /// Build a track buffer from interleaved samples. `samples.len()` must
    /// be a multiple of `channels`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        debug_assert!(channels > 0);
        debug_assert_eq!(samples.len() % channels as usize, 0);
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.total_frames() as f64 / self.sample_rate as f64
    }

    /// Copy `n` frames starting at `position` into `out`, zero-padding any
    /// frames past the end of the track. Returns the number of real
    /// (non-padded) frames copied.
    pub fn copy_frames_into(&self, position: usize, n: usize, out: &mut [f32]) -> usize {
        let channels = self.channels as usize;
        debug_assert_eq!(out.len(), n * channels);

        let total = self.total_frames();
        let available = total.saturating_sub(position).min(n);

        let src_start = position * channels;
        let src_end = src_start + available * channels;
        out[..available * channels].copy_from_slice(&self.samples[src_start..src_end]);
        if available * channels < out.len() {
            out[available * channels..].fill(0.0);
        }

        available
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}
