//! Playback Engine and Control Surface
//!
//! Everything here is coordinated through one non-reentrant [`parking_lot::Mutex`]
//! guarding [`EngineState`]: the audio callback thread, the analyzer pump, and
//! every command handler all acquire it for only as long as it takes to read or
//! mutate a few fields. No I/O or allocation happens while it's held; internal
//! helpers that already hold the lock take a `&mut EngineState` directly rather
//! than re-locking.
//!
//! # Architecture
//!
//! ```text
//! Control handlers ──┐
//! Analyzer pump ──────┼──▶ Mutex<EngineState> ◀── Audio callback (cpal)
//! (HTTP/WS server) ──┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use cpal::traits::StreamTrait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use hifi_dsp::{EqConfig, Equalizer};

use crate::device;
use crate::error::{EngineError, EngineResult};
use crate::loader::{self, LoadOptions};
use crate::message::Event;
use crate::stream;
use crate::track::TrackBuffer;

/// Transport state, per the engine's state diagram: Empty, Stopped, Playing,
/// Paused, with transitions restricted to `load`, `play`, `pause`, `stop`,
/// and end-of-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transport {
    Empty,
    Stopped,
    Playing,
    Paused,
}

/// All state shared between the audio callback, the analyzer pump, and
/// command handlers. Lives behind one [`parking_lot::Mutex`].
pub(crate) struct EngineState {
    pub(crate) track: Option<TrackBuffer>,
    pub(crate) transport: Transport,
    /// Current playback position, in frames at `sample_rate`.
    pub(crate) position: usize,
    /// Set by the audio callback when it runs past the end of the track;
    /// cleared by the analyzer pump, which performs the actual transition
    /// to `Stopped` and publishes the terminal state.
    pub(crate) eos_pending: bool,
    pub(crate) volume: f32,
    pub(crate) equalizer: Equalizer,
    pub(crate) device_id: Option<usize>,
    pub(crate) exclusive: bool,
    pub(crate) target_sr_override: Option<u32>,
    pub(crate) file_path: Option<String>,
    /// Sample rate and channel count of the currently open output stream
    /// (and, while a track is loaded, of that track).
    pub(crate) sample_rate: u32,
    pub(crate) channels: u16,
}

impl EngineState {
    fn new() -> Self {
        Self {
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
        }
    }

    fn duration_seconds(&self) -> f64 {
        self.track.as_ref().map(|t| t.duration_seconds()).unwrap_or(0.0)
    }

    fn current_time_seconds(&self) -> f64 {
        self.position as f64 / self.sample_rate as f64
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            is_playing: self.transport == Transport::Playing,
            is_paused: self.transport == Transport::Paused,
            duration_seconds: self.duration_seconds(),
            current_time_seconds: self.current_time_seconds(),
            file_path: self.file_path.clone(),
            volume: self.volume,
            device_id: self.device_id,
            exclusive_mode: self.exclusive,
        }
    }
}

/// A point-in-time view of transport state, returned by `get_state` and
/// published on terminal transitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateSnapshot {
    pub is_playing: bool,
    pub is_paused: bool,
    pub duration_seconds: f64,
    pub current_time_seconds: f64,
    pub file_path: Option<String>,
    pub volume: f32,
    pub device_id: Option<usize>,
    pub exclusive_mode: bool,
}

/// The playback engine and its control surface. One instance owns the
/// output stream and the shared state it drives; cheaply cloneable via
/// `Arc` for use from multiple HTTP handlers.
pub struct Engine {
    state: Arc<Mutex<EngineState>>,
    stream: Mutex<Option<cpal::Stream>>,
    cache_dir: Option<PathBuf>,
    events: broadcast::Sender<Event>,
}

// cpal::Stream is not Send/Sync on every platform (it may hold a raw COM
// pointer on Windows), but it is only ever touched from the command-handler
// threads that already hold `stream`'s own lock, never aliased.
unsafe impl Send for Engine {}
unsafe impl Sync for Engine {}

impl Engine {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Arc::new(Mutex::new(EngineState::new())),
            stream: Mutex::new(None),
            cache_dir,
            events,
        }
    }

    /// Subscribe to playback and spectrum events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Enumerate output devices, grouped by exclusive-mode capability.
    pub fn list_devices(&self) -> EngineResult<crate::device::GroupedDevices> {
        device::enumerate_output_devices()
    }

    /// Load a file, replacing whatever track is currently loaded.
    pub fn load(&self, path: &str) -> EngineResult<()> {
        info!(command = "load", path, "dispatching command");

        self.stop_internal();

        let path_buf = PathBuf::from(path);
        let (device_id, exclusive, target_sr_override) = {
            let guard = self.state.lock();
            (guard.device_id, guard.exclusive, guard.target_sr_override)
        };

        let device_default_sr = if exclusive {
            device::resolve_output_device(device_id)
                .ok()
                .and_then(|d| device::device_default_samplerate(&d))
        } else {
            None
        };

        let options = LoadOptions {
            cache_dir: self.cache_dir.as_deref(),
            target_sr_override,
            exclusive,
            device_default_sr,
        };

        let track = match loader::load_track(&path_buf, &options) {
            Ok(track) => track,
            Err(e) => {
                warn!(command = "load", path, reason = %e, "load failed");
                let mut guard = self.state.lock();
                guard.track = None;
                guard.transport = Transport::Empty;
                guard.file_path = None;
                return Err(e);
            }
        };

        let sample_rate = track.sample_rate;
        let channels = track.channels;

        {
            let mut guard = self.state.lock();
            guard.equalizer.reconfigure(sample_rate as f32, channels as usize)?;
            guard.sample_rate = sample_rate;
            guard.channels = channels;
            guard.track = Some(track);
            guard.position = 0;
            guard.eos_pending = false;
            guard.transport = Transport::Stopped;
            guard.file_path = Some(path.to_string());
        }

        self.open_stream(device_id, sample_rate, channels)?;
        Ok(())
    }

    pub fn play(&self) -> EngineResult<()> {
        info!(command = "play", "dispatching command");
        {
            let mut guard = self.state.lock();
            if guard.track.is_none() {
                warn!(command = "play", "rejected: no track loaded");
                return Err(EngineError::NotLoaded);
            }
            guard.transport = Transport::Playing;
        }

        if let Some(stream) = self.stream.lock().as_ref() {
            stream.play().map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;
        }
        Ok(())
    }

    pub fn pause(&self) -> EngineResult<()> {
        info!(command = "pause", "dispatching command");
        let mut guard = self.state.lock();
        if guard.track.is_none() {
            warn!(command = "pause", "rejected: no track loaded");
            return Err(EngineError::NotLoaded);
        }
        guard.transport = Transport::Paused;
        drop(guard);

        if let Some(stream) = self.stream.lock().as_ref() {
            stream.pause().map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;
        }
        Ok(())
    }

    pub fn stop(&self) -> EngineResult<()> {
        info!(command = "stop", "dispatching command");
        self.stop_internal();
        Ok(())
    }

    fn stop_internal(&self) {
        let mut guard = self.state.lock();
        if guard.transport == Transport::Empty {
            return;
        }
        guard.transport = Transport::Stopped;
        guard.position = 0;
        guard.eos_pending = false;
        drop(guard);

        if let Some(stream) = self.stream.lock().as_ref() {
            let _ = stream.pause();
        }
    }

    pub fn seek(&self, position_seconds: f64) -> EngineResult<()> {
        info!(command = "seek", position_seconds, "dispatching command");
        let mut guard = self.state.lock();
        let Some(track) = guard.track.as_ref() else {
            warn!(command = "seek", "rejected: no track loaded");
            return Err(EngineError::NotLoaded);
        };
        if position_seconds < 0.0 || !position_seconds.is_finite() {
            return Err(EngineError::BadRequest(format!("invalid seek position: {position_seconds}")));
        }

        let total_frames = track.total_frames();
        let target_frame = (position_seconds * guard.sample_rate as f64) as usize;
        if target_frame >= total_frames {
            warn!(command = "seek", position_seconds, "rejected: out of range");
            return Err(EngineError::BadRequest(format!(
                "seek position {position_seconds}s out of range"
            )));
        }
        guard.position = target_frame;
        guard.eos_pending = false;
        Ok(())
    }

    pub fn set_volume(&self, volume: f32) -> EngineResult<()> {
        info!(command = "set_volume", volume, "dispatching command");
        if !volume.is_finite() {
            return Err(EngineError::BadRequest(format!("invalid volume: {volume}")));
        }
        self.state.lock().volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_eq(&self, config: EqConfig) -> EngineResult<()> {
        info!(command = "set_eq", enabled = config.enabled, "dispatching command");
        self.state.lock().equalizer.set_config(config)?;
        Ok(())
    }

    /// Switch output device and/or exclusive mode. Remembers whether
    /// playback was underway, reloads the current track (remapping
    /// position proportionally to any sample-rate change), and resumes.
    pub fn configure_output(&self, device_id: Option<usize>, exclusive: bool) -> EngineResult<()> {
        info!(command = "configure_output", ?device_id, exclusive, "dispatching command");

        if exclusive && !device::host_is_exclusive_capable() {
            warn!(command = "configure_output", "exclusive mode unavailable on this host, falling back to shared");
        }
        let effective_exclusive = exclusive && device::host_is_exclusive_capable();

        let was_playing = {
            let guard = self.state.lock();
            guard.transport == Transport::Playing
        };
        self.stop_internal();

        {
            let mut guard = self.state.lock();
            guard.device_id = device_id;
            guard.exclusive = effective_exclusive;
        }

        self.reload_current_track(device_id)?;

        if was_playing {
            self.play()?;
        }
        Ok(())
    }

    /// Change (or clear) the upsampling target and reload the current
    /// track if one is loaded.
    pub fn configure_upsampling(&self, target_samplerate: Option<u32>) -> EngineResult<()> {
        info!(command = "configure_upsampling", ?target_samplerate, "dispatching command");

        let was_playing = {
            let guard = self.state.lock();
            guard.transport == Transport::Playing
        };
        self.stop_internal();

        let device_id = {
            let mut guard = self.state.lock();
            guard.target_sr_override = target_samplerate;
            guard.device_id
        };

        self.reload_current_track(device_id)?;

        if was_playing {
            self.play()?;
        }
        Ok(())
    }

    pub fn state(&self) -> StateSnapshot {
        self.state.lock().snapshot()
    }

    /// Reload the currently-loaded file (if any) under current device/rate
    /// settings, remapping position proportionally to the sample-rate
    /// change. No-op if nothing is loaded.
    fn reload_current_track(&self, device_id: Option<usize>) -> EngineResult<()> {
        let (path, old_position, old_sr, exclusive, target_sr_override) = {
            let guard = self.state.lock();
            (
                guard.file_path.clone(),
                guard.position,
                guard.sample_rate,
                guard.exclusive,
                guard.target_sr_override,
            )
        };

        let Some(path) = path else { return Ok(()) };

        let device_default_sr = if exclusive {
            device::resolve_output_device(device_id)
                .ok()
                .and_then(|d| device::device_default_samplerate(&d))
        } else {
            None
        };

        let options = LoadOptions {
            cache_dir: self.cache_dir.as_deref(),
            target_sr_override,
            exclusive,
            device_default_sr,
        };

        let track = loader::load_track(&PathBuf::from(&path), &options)?;
        let new_sr = track.sample_rate;
        let channels = track.channels;
        let new_position = ((old_position as u64 * new_sr as u64) / old_sr.max(1) as u64) as usize;

        {
            let mut guard = self.state.lock();
            guard.equalizer.reconfigure(new_sr as f32, channels as usize)?;
            guard.sample_rate = new_sr;
            guard.channels = channels;
            guard.position = new_position.min(track.total_frames());
            guard.track = Some(track);
            guard.transport = Transport::Stopped;
        }

        self.open_stream(device_id, new_sr, channels)
    }

    fn open_stream(&self, device_id: Option<usize>, sample_rate: u32, channels: u16) -> EngineResult<()> {
        let device = device::resolve_output_device(device_id)?;
        let built = stream::build_output_stream(&device, sample_rate, channels, Arc::clone(&self.state))?;
        *self.stream.lock() = Some(built);
        Ok(())
    }

    /// Take a spectrum-analysis snapshot if the engine is currently
    /// playing: the last `window` frames up to the current position,
    /// mono-compatible (interleaved), plus the sample rate to analyze at.
    /// Also drains and reports a pending end-of-stream flag.
    pub(crate) fn snapshot_for_analysis(&self, window: usize) -> (Option<(Vec<f32>, u16, u32)>, bool) {
        let mut guard = self.state.lock();

        let eos = guard.eos_pending;
        if eos {
            guard.eos_pending = false;
            guard.transport = Transport::Stopped;
            guard.position = 0;
        }

        if guard.transport != Transport::Playing {
            return (None, eos);
        }

        let Some(track) = guard.track.as_ref() else {
            return (None, eos);
        };

        let channels = guard.channels;
        let sample_rate = guard.sample_rate;
        let mut buffer = vec![0.0_f32; window * channels.max(1) as usize];
        track.copy_frames_into(guard.position, window, &mut buffer);

        (Some((buffer, channels, sample_rate)), eos)
    }

    /// Publish an event to subscribers, discarding if nobody is listening.
    pub(crate) fn publish(&self, event: Event) {
        let _ = self.events.send(event);
    }

    /// Current terminal-state snapshot, used by the analyzer pump after
    /// observing an end-of-stream transition.
    pub(crate) fn current_snapshot(&self) -> StateSnapshot {
        self.state.lock().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_engine_starts_empty() {
        let engine = Engine::new(None);
        let snapshot = engine.state();
        assert!(!snapshot.is_playing);
        assert!(!snapshot.is_paused);
        assert_eq!(snapshot.file_path, None);
    }

    #[test]
    fn test_play_without_load_is_rejected() {
        let engine = Engine::new(None);
        assert!(matches!(engine.play(), Err(EngineError::NotLoaded)));
    }

    #[test]
    fn test_pause_without_load_is_rejected() {
        let engine = Engine::new(None);
        assert!(matches!(engine.pause(), Err(EngineError::NotLoaded)));
    }

    #[test]
    fn test_seek_without_load_is_rejected() {
        let engine = Engine::new(None);
        assert!(matches!(engine.seek(1.0), Err(EngineError::NotLoaded)));
    }

    #[test]
    fn test_seek_out_of_range_is_rejected_and_leaves_position_unchanged() {
        let engine = Engine::new(None);
        {
            let mut guard = engine.state.lock();
            guard.track = Some(TrackBuffer::new(vec![0.0; 48000 * 2], 48000, 2));
            guard.transport = Transport::Stopped;
            guard.position = 10;
        }

        // Track is exactly 1 second long; 1.0s and beyond is out of range.
        let result = engine.seek(1.0);
        assert!(matches!(result, Err(EngineError::BadRequest(_))));
        assert_eq!(engine.state.lock().position, 10);
    }

    #[test]
    fn test_seek_within_range_updates_position() {
        let engine = Engine::new(None);
        {
            let mut guard = engine.state.lock();
            guard.track = Some(TrackBuffer::new(vec![0.0; 48000 * 2], 48000, 2));
            guard.transport = Transport::Stopped;
        }

        engine.seek(0.5).unwrap();
        assert_eq!(engine.state.lock().position, 24000);
    }

    #[test]
    fn test_set_volume_clamps() {
        let engine = Engine::new(None);
        engine.set_volume(5.0).unwrap();
        assert_eq!(engine.state.lock().volume, 1.0);
        engine.set_volume(-5.0).unwrap();
        assert_eq!(engine.state.lock().volume, 0.0);
    }

    #[test]
    fn test_set_volume_rejects_nan() {
        let engine = Engine::new(None);
        assert!(engine.set_volume(f32::NAN).is_err());
    }

    #[test]
    fn test_stop_on_empty_engine_is_a_noop() {
        let engine = Engine::new(None);
        assert!(engine.stop().is_ok());
    }
}
