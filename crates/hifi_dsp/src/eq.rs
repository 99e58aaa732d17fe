//! 10-Band Parametric Equalizer
//!
//! Implements a cascade of BiQuad filters for audio equalization.
//! Based on the RBJ (Robert Bristow-Johnson) Audio EQ Cookbook. All ten
//! bands use the same fixed Q; only gain is adjustable per band.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};

use crate::error::DspError;

/// Number of EQ bands (fixed, closed set).
pub const NUM_BANDS: usize = 10;

/// Band identifiers, in ascending frequency order. Index into every
/// per-band array (gains, center frequencies, filter state) uses this order.
pub const EQ_BAND_IDS: [&str; NUM_BANDS] =
    ["31", "62", "125", "250", "500", "1k", "2k", "4k", "8k", "16k"];

/// Band center frequencies (Hz), matching `EQ_BAND_IDS` index for index.
pub const EQ_BAND_FREQS: [f32; NUM_BANDS] = [
    31.0, 62.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

/// Fixed Q for every band's peaking filter.
pub const EQ_Q: f32 = 1.41;

/// A band is skipped entirely once its center frequency reaches this
/// fraction of Nyquist - the peaking formula becomes numerically unstable
/// past that point.
const NYQUIST_SKIP_FRACTION: f32 = 0.95;

/// Look up a band's index by its identifier string (e.g. "1k").
pub fn band_index(id: &str) -> Option<usize> {
    EQ_BAND_IDS.iter().position(|&b| b == id)
}

/// Compute the peaking-EQ second-order section for one band, or `None` if
/// the band's center frequency is too close to Nyquist to filter safely.
///
/// Gain of 0 dB still produces a (trivial) SOS so that filter-state slots
/// stay stable across gain changes; callers decide whether to include a
/// band in the cascade based on gain, not on whether a SOS exists.
fn design_band(
    frequency: f32,
    gain_db: f32,
    sample_rate: f32,
) -> Result<Option<Coefficients<f32>>, DspError> {
    if sample_rate <= 0.0 {
        return Err(DspError::InvalidSampleRate(sample_rate));
    }

    let nyquist = sample_rate / 2.0;
    if frequency >= NYQUIST_SKIP_FRACTION * nyquist {
        return Ok(None);
    }

    // A = 10^(gain_db / 40), per the RBJ cookbook's peaking-EQ convention.
    let amplitude = 10.0_f32.powf(gain_db / 40.0);

    let coeffs = Coefficients::<f32>::from_params(
        Type::PeakingEQ(amplitude),
        sample_rate.hz(),
        frequency.hz(),
        EQ_Q,
    )
    .map_err(|_| DspError::InvalidCoefficients { frequency, sample_rate })?;

    Ok(Some(coeffs))
}

/// Gains (dB) and enabled flag for all ten bands.
#[derive(Debug, Clone, Copy)]
pub struct EqConfig {
    pub gains_db: [f32; NUM_BANDS],
    pub enabled: bool,
}

impl Default for EqConfig {
    fn default() -> Self {
        Self {
            gains_db: [0.0; NUM_BANDS],
            enabled: true,
        }
    }
}

impl EqConfig {
    /// Set one band's gain by index, clipped to [-15, 15] dB per the spec.
    pub fn set_band_gain(&mut self, band_index: usize, gain_db: f32) -> Result<(), DspError> {
        if band_index >= NUM_BANDS {
            return Err(DspError::InvalidBandIndex(band_index));
        }
        self.gains_db[band_index] = gain_db.clamp(-15.0, 15.0);
        Ok(())
    }
}

/// The main equalizer processor.
///
/// Holds per-channel filter state and the currently designed SOS for each
/// band. Designed for real-time use: `process_interleaved` performs no
/// allocation.
pub struct Equalizer {
    /// Per-channel, per-band filter state. Allocated for all ten bands even
    /// though only active bands (gain != 0, valid SOS) run each call - this
    /// keeps slots stable across gain changes.
    channel_filters: Vec<[DirectForm2Transposed<f32>; NUM_BANDS]>,
    /// Currently designed SOS per band; `None` if the band is too close to
    /// Nyquist at the current sample rate.
    sos: [Option<Coefficients<f32>>; NUM_BANDS],
    config: EqConfig,
    sample_rate: f32,
    channels: usize,
}

impl Equalizer {
    /// Create a new equalizer with a flat response for the given format.
    pub fn new(sample_rate: f32, channels: usize) -> Self {
        let config = EqConfig::default();
        let sos = design_all(&config, sample_rate).unwrap_or([None; NUM_BANDS]);
        let channels = channels.max(1);
        let channel_filters = (0..channels).map(|_| make_channel_filters(&sos)).collect();

        Self {
            channel_filters,
            sos,
            config,
            sample_rate,
            channels,
        }
    }

    /// Redesign all band SOS for a new sample rate and/or channel count and
    /// zero all filter state. Called on track reload, sample-rate change,
    /// and channel-count change.
    pub fn reconfigure(&mut self, sample_rate: f32, channels: usize) -> Result<(), DspError> {
        self.sos = design_all(&self.config, sample_rate)?;
        self.sample_rate = sample_rate;
        self.channels = channels.max(1);
        self.channel_filters = (0..self.channels)
            .map(|_| make_channel_filters(&self.sos))
            .collect();
        Ok(())
    }

    /// Apply a new EQ configuration: clip gains, redesign SOS, zero state.
    pub fn set_config(&mut self, config: EqConfig) -> Result<(), DspError> {
        let mut clipped = config;
        for gain in clipped.gains_db.iter_mut() {
            *gain = gain.clamp(-15.0, 15.0);
        }
        self.sos = design_all(&clipped, self.sample_rate)?;
        self.config = clipped;
        self.channel_filters = (0..self.channels)
            .map(|_| make_channel_filters(&self.sos))
            .collect();
        Ok(())
    }

    /// Current configuration.
    pub fn config(&self) -> &EqConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Process an interleaved multi-channel buffer in place.
    ///
    /// Buffer format: `[c0_0, c1_0, ..., cN_0, c0_1, c1_1, ..., cN_1, ...]`
    /// where N = `self.channels`.
    ///
    /// No allocations. O(n * active_bands).
    #[inline]
    pub fn process_interleaved(&mut self, buffer: &mut [f32]) {
        if !self.config.enabled {
            return;
        }

        let channels = self.channels;
        for frame in buffer.chunks_exact_mut(channels) {
            for (ch, sample) in frame.iter_mut().enumerate() {
                let filters = &mut self.channel_filters[ch];
                let mut value = *sample;
                for band in 0..NUM_BANDS {
                    if self.sos[band].is_some() && self.config.gains_db[band] != 0.0 {
                        value = filters[band].run(value);
                    }
                }
                *sample = value;
            }
        }
    }

    /// Reset all filter delay lines without changing configuration.
    pub fn reset(&mut self) {
        for filters in &mut self.channel_filters {
            for f in filters.iter_mut() {
                f.reset_state();
            }
        }
    }
}

fn design_all(
    config: &EqConfig,
    sample_rate: f32,
) -> Result<[Option<Coefficients<f32>>; NUM_BANDS], DspError> {
    let mut sos = [None; NUM_BANDS];
    for i in 0..NUM_BANDS {
        sos[i] = design_band(EQ_BAND_FREQS[i], config.gains_db[i], sample_rate)?;
    }
    Ok(sos)
}

fn make_channel_filters(
    sos: &[Option<Coefficients<f32>>; NUM_BANDS],
) -> [DirectForm2Transposed<f32>; NUM_BANDS] {
    // Flat-response stand-in for skipped bands; never run since
    // `process_interleaved` gates on `sos[band].is_some()`.
    let identity = Coefficients::<f32> {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };
    core::array::from_fn(|i| DirectForm2Transposed::<f32>::new(sos[i].unwrap_or(identity)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_ids_ascending_frequency() {
        for w in EQ_BAND_FREQS.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn test_band_index_lookup() {
        assert_eq!(band_index("1k"), Some(5));
        assert_eq!(band_index("16k"), Some(9));
        assert_eq!(band_index("nope"), None);
    }

    #[test]
    fn test_default_config_is_flat() {
        let config = EqConfig::default();
        assert_eq!(config.gains_db, [0.0; NUM_BANDS]);
        assert!(config.enabled);
    }

    #[test]
    fn test_gain_clamping() {
        let mut config = EqConfig::default();
        config.set_band_gain(0, 100.0).unwrap();
        assert_eq!(config.gains_db[0], 15.0);
        config.set_band_gain(0, -100.0).unwrap();
        assert_eq!(config.gains_db[0], -15.0);
    }

    #[test]
    fn test_invalid_band_index() {
        let mut config = EqConfig::default();
        assert!(config.set_band_gain(10, 0.0).is_err());
    }

    #[test]
    fn test_band_skipped_near_nyquist() {
        // 16kHz band at 32kHz sample rate: nyquist = 16kHz, 0.95*16kHz = 15.2kHz < 16kHz -> skipped
        let sos = design_band(16000.0, 6.0, 32000.0).unwrap();
        assert!(sos.is_none());
    }

    #[test]
    fn test_band_present_away_from_nyquist() {
        let sos = design_band(1000.0, 6.0, 48000.0).unwrap();
        assert!(sos.is_some());
    }

    #[test]
    fn test_disabled_passthrough() {
        let mut eq = Equalizer::new(48000.0, 2);
        eq.set_config(EqConfig {
            gains_db: [12.0; NUM_BANDS],
            enabled: false,
        })
        .unwrap();

        let mut buffer = vec![0.5, -0.5, 0.3, -0.3];
        let original = buffer.clone();
        eq.process_interleaved(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_zero_gain_bands_are_transparent() {
        let mut eq = Equalizer::new(48000.0, 1);
        // All gains 0dB: output should equal input exactly (no bands active).
        let mut buffer = vec![0.5, 0.25, -0.25, -0.5];
        let original = buffer.clone();
        eq.process_interleaved(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_boost_increases_amplitude() {
        let mut eq = Equalizer::new(48000.0, 1);
        let idx = band_index("1k").unwrap();
        let mut config = *eq.config();
        config.set_band_gain(idx, 12.0).unwrap();
        eq.set_config(config).unwrap();

        let sample_rate = 48000.0_f32;
        let freq = 1000.0_f32;
        let mut max_in = 0.0_f32;
        let mut max_out = 0.0_f32;
        for i in 0..2000 {
            let t = i as f32 / sample_rate;
            let sample = (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5;
            max_in = max_in.max(sample.abs());
            let mut buf = [sample];
            eq.process_interleaved(&mut buf);
            max_out = max_out.max(buf[0].abs());
        }
        assert!(max_out > max_in, "boosted 1kHz band should raise amplitude");
    }

    #[test]
    fn test_reconfigure_resets_state_and_channels() {
        let mut eq = Equalizer::new(44100.0, 2);
        let idx = band_index("250").unwrap();
        let mut config = *eq.config();
        config.set_band_gain(idx, 8.0).unwrap();
        eq.set_config(config).unwrap();

        for _ in 0..100 {
            let mut buf = [0.2, -0.2];
            eq.process_interleaved(&mut buf);
        }

        eq.reconfigure(48000.0, 1).unwrap();
        assert_eq!(eq.sample_rate(), 48000.0);
        assert_eq!(eq.channels(), 1);

        let mut buf = [0.0_f32];
        eq.process_interleaved(&mut buf);
        assert_eq!(buf[0], 0.0, "fresh state processing silence should stay silent");
    }

    #[test]
    fn test_multichannel_interleaved_no_panic() {
        let mut eq = Equalizer::new(48000.0, 3);
        let mut config = *eq.config();
        config.set_band_gain(2, 6.0).unwrap();
        eq.set_config(config).unwrap();

        let mut buffer: Vec<f32> = (0..30).map(|i| ((i % 5) as f32 - 2.0) / 4.0).collect();
        eq.process_interleaved(&mut buffer);
        for s in &buffer {
            assert!(s.is_finite());
        }
    }
}
