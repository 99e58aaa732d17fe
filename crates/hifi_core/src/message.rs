//! Event Types Published on the Engine's Broadcast Channel
//!
//! Events flow from the audio callback / analyzer pump to subscribed
//! WebSocket clients. Commands, by contrast, are ordinary method calls on
//! the Control Surface made directly by request handlers under the
//! engine's lock - there is no message-passing command channel.

use serde::{Deserialize, Serialize};

use crate::engine::StateSnapshot;

/// Events published on the engine's broadcast channel, per §6's event
/// channel contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// Spectrum snapshot, published at ~20Hz while Playing.
    #[serde(rename = "spectrum_data")]
    SpectrumData { data: Vec<f32> },

    /// Full state snapshot, published on terminal transport transitions
    /// (end-of-stream).
    #[serde(rename = "playback_state")]
    PlaybackState(StateSnapshot),
}
