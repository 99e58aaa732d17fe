//! Audio Stream
//!
//! Builds the single cpal output stream and implements the real-time audio
//! callback contract: copy frames from the current track, run them through
//! the EQ, apply volume and a hard clip, and advance the playback position -
//! all under one short hold of the engine's lock. No I/O or allocation ever
//! happens inside the callback.

use std::sync::Arc;

use cpal::traits::DeviceTrait;
use cpal::{Device, Stream, StreamConfig as CpalStreamConfig};
use parking_lot::Mutex;

use crate::engine::EngineState;
use crate::error::{EngineError, EngineResult};

/// Build (but do not start) an output stream against `device`, driving
/// `state` from the real-time callback.
pub(crate) fn build_output_stream(
    device: &Device,
    sample_rate: u32,
    channels: u16,
    state: Arc<Mutex<EngineState>>,
) -> EngineResult<Stream> {
    let cpal_config = CpalStreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_output_stream(
            &cpal_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                run_callback(&state, data);
            },
            move |err| {
                tracing::error!(reason = %err, "audio output stream error");
            },
            None,
        )
        .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;

    Ok(stream)
}

/// The real-time callback body, split out for unit testing without cpal.
///
/// `data` is interleaved per `state.channels`; its length must be a whole
/// multiple of the channel count (cpal guarantees this).
pub(crate) fn run_callback(state: &Mutex<EngineState>, data: &mut [f32]) {
    let mut guard = state.lock();
    let channels = guard.channels.max(1) as usize;
    let n = data.len() / channels;

    let total_frames = guard.track.as_ref().map(|t| t.total_frames());

    match total_frames {
        Some(total) if guard.position + n <= total => {
            let position = guard.position;
            let copied = guard
                .track
                .as_ref()
                .expect("track checked present above")
                .copy_frames_into(position, n, data);

            guard.equalizer.process_interleaved(data);

            let volume = guard.volume;
            for sample in data.iter_mut() {
                *sample = (*sample * volume).clamp(-1.0, 1.0);
            }

            guard.position += copied;
        }
        _ => {
            data.fill(0.0);
            guard.eos_pending = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Transport;
    use crate::track::TrackBuffer;
    use hifi_dsp::Equalizer;

    fn state_with_track(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Mutex<EngineState> {
        Mutex::new(EngineState {
            track: Some(TrackBuffer::new(samples, sample_rate, channels)),
            transport: Transport::Stopped,
            position: 0,
            eos_pending: false,
            volume: 1.0,
            equalizer: Equalizer::new(sample_rate as f32, channels as usize),
            device_id: None,
            exclusive: false,
            target_sr_override: None,
            file_path: None,
            sample_rate,
            channels,
        })
    }

    #[test]
    fn test_callback_copies_and_advances_position() {
        let state = state_with_track(vec![0.5; 2000], 48000, 2);
        let mut out = vec![0.0; 200];
        run_callback(&state, &mut out);
        assert_eq!(state.lock().position, 100);
        assert!(out.iter().all(|s| (s.abs() - 0.5).abs() < 1e-5 || *s == 0.0));
    }

    #[test]
    fn test_callback_clips_to_valid_range() {
        let state = state_with_track(vec![10.0; 2000], 48000, 2);
        let mut out = vec![0.0; 200];
        run_callback(&state, &mut out);
        assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_callback_past_end_zero_fills_and_flags_eos() {
        let state = state_with_track(vec![0.5; 100], 48000, 2);
        state.lock().position = 40; // only 10 frames remain, need 100
        let mut out = vec![9.0; 200];
        run_callback(&state, &mut out);
        assert!(out.iter().all(|s| *s == 0.0));
        assert!(state.lock().eos_pending);
    }

    #[test]
    fn test_callback_no_track_zero_fills_and_flags_eos() {
        let state = Mutex::new(EngineState {
            track: None,
            transport: Transport::Empty,
            position: 0,
            eos_pending: false,
            volume: 1.0,
            equalizer: Equalizer::new(48000.0, 2),
            device_id: None,
            exclusive: false,
            target_sr_override: None,
            file_path: None,
            sample_rate: 48000,
            channels: 2,
        });
        let mut out = vec![1.0; 100];
        run_callback(&state, &mut out);
        assert!(out.iter().all(|s| *s == 0.0));
        assert!(state.lock().eos_pending);
    }

    #[test]
    fn test_callback_respects_volume() {
        let state = state_with_track(vec![0.5; 2000], 48000, 2);
        state.lock().volume = 0.0;
        let mut out = vec![9.0; 200];
        run_callback(&state, &mut out);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_build_output_stream_on_default_device() {
        use cpal::traits::HostTrait;
        let host = cpal::default_host();
        let device = host.default_output_device().expect("no output device");
        let state = Arc::new(state_with_track(vec![0.0; 2000], 48000, 2));
        let result = build_output_stream(&device, 48000, 2, state);
        assert!(result.is_ok());
    }
}
