//! Hi-Fi Core - Playback Engine
//!
//! This crate provides the core of the Hi-Fi playback engine:
//! - File decode (via `symphonia`, with an external-decoder fallback)
//! - Resample-on-load with an on-disk cache (via `rubato` and `hound`)
//! - A single-stream `cpal` output path driven by one shared mutex
//! - Transport, EQ, and device control, with events published for a
//!   control-plane transport to forward to clients
//!
//! # Architecture
//!
//! ```text
//! Control handlers ──┐
//! Analyzer pump ──────┼──▶ Mutex<EngineState> ◀── Audio callback (cpal)
//! (HTTP/WS server) ──┘
//! ```

mod analyzer_pump;
mod cache;
mod decode;
mod device;
mod engine;
mod error;
mod loader;
mod message;
mod resample;
mod stream;
mod track;

pub use analyzer_pump::run as run_analyzer_pump;
pub use device::{GroupedDevices, OutputDevice};
pub use engine::{Engine, StateSnapshot};
pub use error::{EngineError, EngineResult};
pub use message::Event;
pub use track::TrackBuffer;

// Re-export the DSP types callers need to build `set_eq` requests.
pub use hifi_dsp::{band_index, EqConfig, EQ_BAND_FREQS, EQ_BAND_IDS, NUM_BANDS};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        let engine = Engine::new(None);
        let snapshot = engine.state();
        assert!(!snapshot.is_playing);
    }
}
