//! FFT Spectrum Analyzer
//!
//! Computes a logarithmically-binned magnitude spectrum for visualization.
//!
//! Unlike a continuous ring-buffer analyzer, this is a *pull* design: the
//! caller (the analyzer pump, polling at a fixed rate) hands in a fresh
//! window of samples taken from the current playback position and gets a
//! spectrum snapshot back. There is no background accumulation state to
//! race against the audio callback.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// FFT window size (must be a power of 2).
/// 2048 samples at 48kHz = ~42ms window, ~23Hz resolution.
pub const FFT_SIZE: usize = 2048;

/// Number of logarithmically-spaced output bins.
pub const NUM_BINS: usize = 48;

/// Bottom of the logarithmic binning range (Hz).
const MIN_FREQ: f32 = 20.0;

fn hann_coeff(n: usize, size: usize) -> f32 {
    0.5 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / (size - 1) as f32).cos())
}

struct HannWindow {
    coeffs: [f32; FFT_SIZE],
}

impl HannWindow {
    fn new() -> Self {
        Self {
            coeffs: core::array::from_fn(|i| hann_coeff(i, FFT_SIZE)),
        }
    }
}

/// Computes one spectrum snapshot per call from a caller-supplied window.
///
/// Holds only the FFT plan, window coefficients, and scratch buffers - no
/// state that persists meaning between calls, so a single instance can be
/// reused across tracks and sample-rate changes freely.
pub struct SpectrumAnalyzer {
    window: HannWindow,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        Self {
            window: HannWindow::new(),
            fft,
            scratch: vec![Complex::new(0.0, 0.0); FFT_SIZE],
        }
    }

    /// Analyze an interleaved window of audio and return the normalized
    /// magnitude spectrum.
    ///
    /// `frames` holds up to `FFT_SIZE` frames of `channels`-channel
    /// interleaved audio; if fewer than `FFT_SIZE` frames are available
    /// (e.g. near end of track) the remainder is treated as silence.
    ///
    /// Returns all zeros if `sample_rate / 2 <= 20` Hz (no usable binning
    /// range) or if the window is entirely silent.
    pub fn analyze(&mut self, frames: &[f32], channels: usize, sample_rate: f32) -> [f32; NUM_BINS] {
        let nyquist = sample_rate / 2.0;
        if nyquist <= MIN_FREQ {
            return [0.0; NUM_BINS];
        }

        let channels = channels.max(1);
        let available_frames = frames.len() / channels;
        let mut all_zero = true;

        for i in 0..FFT_SIZE {
            let mono = if i < available_frames {
                let base = i * channels;
                let sum: f32 = frames[base..base + channels].iter().sum();
                sum / channels as f32
            } else {
                0.0
            };

            if mono != 0.0 {
                all_zero = false;
            }

            self.scratch[i] = Complex::new(mono * self.window.coeffs[i], 0.0);
        }

        if all_zero {
            return [0.0; NUM_BINS];
        }

        self.fft.process(&mut self.scratch);
        compute_log_bins(&self.scratch, sample_rate, nyquist)
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Map the FFT's linear bins into `NUM_BINS` logarithmically-spaced bands
/// from `MIN_FREQ` to Nyquist, aggregating each band by RMS magnitude and
/// converting to a normalized dB value.
///
/// Builds 49 log-spaced edges (20Hz..fs/2) producing 48 bins, assigns every
/// FFT bin in `[1, N/2-1]` (DC and Nyquist excluded) to the edge it falls
/// under, and RMS-aggregates within each bin.
fn compute_log_bins(fft_output: &[Complex<f32>], sample_rate: f32, nyquist: f32) -> [f32; NUM_BINS] {
    let bin_hz = sample_rate / FFT_SIZE as f32;
    let last_k = FFT_SIZE / 2 - 1; // exclude Nyquist bin itself

    let log_min = MIN_FREQ.ln();
    let log_max = nyquist.ln();
    let log_step = (log_max - log_min) / NUM_BINS as f32;

    let mut sum_sq = [0.0_f32; NUM_BINS];
    let mut count = [0usize; NUM_BINS];

    for k in 1..=last_k {
        let freq = k as f32 * bin_hz;
        if freq < MIN_FREQ || freq > nyquist {
            continue;
        }
        let log_pos = (freq.ln() - log_min) / log_step;
        let bin_idx = (log_pos as usize).min(NUM_BINS - 1);

        // Magnitude normalized by window length.
        let mag = fft_output[k].norm() / FFT_SIZE as f32;
        sum_sq[bin_idx] += mag * mag;
        count[bin_idx] += 1;
    }

    let mut out = [0.0_f32; NUM_BINS];
    for i in 0..NUM_BINS {
        let rms = if count[i] > 0 {
            (sum_sq[i] / count[i] as f32).sqrt()
        } else {
            0.0
        };
        let db = 20.0 * (rms + 1e-9).log10();
        out[i] = ((db + 90.0) / 90.0).clamp(0.0, 1.0);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_window(freq: f32, sample_rate: f32, amplitude: f32) -> Vec<f32> {
        (0..FFT_SIZE)
            .map(|i| {
                let t = i as f32 / sample_rate;
                amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_silence_is_all_zero() {
        let mut analyzer = SpectrumAnalyzer::new();
        let frames = vec![0.0_f32; FFT_SIZE];
        let spectrum = analyzer.analyze(&frames, 1, 48000.0);
        assert_eq!(spectrum, [0.0; NUM_BINS]);
    }

    #[test]
    fn test_degenerate_sample_rate_is_all_zero() {
        let mut analyzer = SpectrumAnalyzer::new();
        let frames = sine_window(10.0, 40.0, 1.0);
        // nyquist = 20Hz, not > MIN_FREQ, so must be all zero regardless of signal
        let spectrum = analyzer.analyze(&frames, 1, 40.0);
        assert_eq!(spectrum, [0.0; NUM_BINS]);
    }

    #[test]
    fn test_tone_produces_signal() {
        let mut analyzer = SpectrumAnalyzer::new();
        let frames = sine_window(1000.0, 48000.0, 0.8);
        let spectrum = analyzer.analyze(&frames, 1, 48000.0);
        assert!(spectrum.iter().any(|&v| v > 0.0));
        for v in spectrum {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_short_window_padded_with_silence() {
        let mut analyzer = SpectrumAnalyzer::new();
        let mut frames = sine_window(1000.0, 48000.0, 0.8);
        frames.truncate(FFT_SIZE / 4);
        let spectrum = analyzer.analyze(&frames, 1, 48000.0);
        assert!(spectrum.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn test_stereo_downmix_matches_mono() {
        let mut analyzer = SpectrumAnalyzer::new();
        let mono = sine_window(1000.0, 48000.0, 0.8);
        let stereo: Vec<f32> = mono.iter().flat_map(|&s| [s, s]).collect();

        let mono_spectrum = analyzer.analyze(&mono, 1, 48000.0);
        let stereo_spectrum = analyzer.analyze(&stereo, 2, 48000.0);

        for (a, b) in mono_spectrum.iter().zip(stereo_spectrum.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_bins_ascending_frequency_coverage() {
        // Sanity: low frequency content should not bleed entirely into the
        // top bin and vice versa.
        let mut analyzer = SpectrumAnalyzer::new();
        let low = sine_window(40.0, 48000.0, 0.9);
        let spectrum_low = analyzer.analyze(&low, 1, 48000.0);

        let high = sine_window(15000.0, 48000.0, 0.9);
        let spectrum_high = analyzer.analyze(&high, 1, 48000.0);

        let peak_low = spectrum_low
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        let peak_high = spectrum_high
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;

        assert!(peak_low < peak_high);
    }

    #[test]
    fn test_highest_fft_bin_is_aggregated() {
        // FFT bin `FFT_SIZE/2 - 1` (the highest one aggregated, per the
        // `[1, N/2-1]` range) must contribute; this catches an off-by-one
        // that excludes it from the loop entirely.
        let sample_rate = 48000.0_f32;
        let last_k = (FFT_SIZE / 2 - 1) as f32;
        let freq = last_k * sample_rate / FFT_SIZE as f32;

        let mut analyzer = SpectrumAnalyzer::new();
        let frames = sine_window(freq, sample_rate, 0.9);
        let spectrum = analyzer.analyze(&frames, 1, sample_rate);
        assert!(spectrum[NUM_BINS - 1] > 0.0);
    }

    #[test]
    fn test_hann_window_shape() {
        let w = HannWindow::new();
        assert!(w.coeffs[0] < 0.01);
        assert!(w.coeffs[FFT_SIZE - 1] < 0.01);
        assert!((w.coeffs[FFT_SIZE / 2] - 1.0).abs() < 0.01);
    }
}
