//! Hi-Fi DSP - Digital Signal Processing Module
//!
//! This crate provides the audio processing pipeline for the playback
//! engine, including:
//! - 10-band parametric equalizer using BiQuad filters
//! - FFT spectrum analyzer for real-time visualization
//! - Zero-allocation processing path
//!
//! # Architecture
//!
//! The DSP chain follows a strict "no allocation in audio callback" rule.
//! Filter coefficients are redesigned outside the callback; the callback
//! only ever runs the already-designed filters.

mod eq;
mod error;
mod fft;

pub use eq::{band_index, EqConfig, Equalizer, EQ_BAND_FREQS, EQ_BAND_IDS, EQ_Q, NUM_BANDS};
pub use error::DspError;
pub use fft::{SpectrumAnalyzer, FFT_SIZE, NUM_BINS};
