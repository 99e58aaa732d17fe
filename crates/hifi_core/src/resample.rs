//! Resampler
//!
//! Wraps `rubato`'s fixed-ratio FFT resampler to convert a whole interleaved
//! buffer from one sample rate to another in one call. Used by the Loader
//! on a cache miss; never called from the audio callback.

use rubato::{FftFixedInOut, Resampler};

const CHUNK_SIZE: usize = 1024;

/// Resample an entire interleaved buffer from `from_rate` to `to_rate`.
///
/// Processes the input in `rubato`-sized chunks, zero-padding the final
/// partial chunk, and returns the fully resampled interleaved buffer.
pub fn resample_interleaved(
    input: &[f32],
    channels: usize,
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<f32>, String> {
    if from_rate == to_rate {
        return Ok(input.to_vec());
    }
    if channels == 0 {
        return Err("channel count must be nonzero".to_string());
    }

    let mut resampler =
        FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, channels)
            .map_err(|e| format!("failed to create resampler: {e}"))?;

    let total_frames = input.len() / channels;
    let mut per_channel: Vec<Vec<f32>> = vec![Vec::with_capacity(total_frames); channels];
    for frame in 0..total_frames {
        for ch in 0..channels {
            per_channel[ch].push(input[frame * channels + ch]);
        }
    }

    let mut output: Vec<Vec<f32>> = vec![Vec::new(); channels];
    let mut pos = 0;

    while pos < total_frames {
        let needed = resampler.input_frames_next();
        let end = (pos + needed).min(total_frames);

        let mut chunk: Vec<Vec<f32>> = (0..channels).map(|_| vec![0.0_f32; needed]).collect();
        for ch in 0..channels {
            let available = end - pos;
            chunk[ch][..available].copy_from_slice(&per_channel[ch][pos..end]);
        }

        let chunk_refs: Vec<&[f32]> = chunk.iter().map(|c| c.as_slice()).collect();
        let processed = resampler
            .process(&chunk_refs, None)
            .map_err(|e| format!("resample error: {e}"))?;

        for ch in 0..channels {
            output[ch].extend_from_slice(&processed[ch]);
        }

        pos = end;
    }

    let output_frames = output.first().map(|c| c.len()).unwrap_or(0);
    let mut interleaved = Vec::with_capacity(output_frames * channels);
    for frame in 0..output_frames {
        for ch in &output {
            interleaved.push(ch[frame]);
        }
    }

    Ok(interleaved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_when_rates_match() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        let output = resample_interleaved(&input, 2, 44100, 44100).unwrap();
        assert_eq!(input, output);
    }

    #[test]
    fn test_upsample_produces_more_frames() {
        let sample_rate = 44100u32;
        let frames = sample_rate as usize; // 1 second
        let input: Vec<f32> = (0..frames)
            .flat_map(|i| {
                let t = i as f32 / sample_rate as f32;
                let s = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
                [s, s]
            })
            .collect();

        let output = resample_interleaved(&input, 2, 44100, 48000).unwrap();
        let out_frames = output.len() / 2;

        // Roughly 48000 frames expected (+/- a chunk's worth of slack).
        assert!((out_frames as i64 - 48000).abs() < 2048);
    }

    #[test]
    fn test_output_is_finite() {
        let input = vec![0.3_f32; 44100];
        let output = resample_interleaved(&input, 1, 44100, 96000).unwrap();
        assert!(output.iter().all(|s| s.is_finite()));
    }
}
