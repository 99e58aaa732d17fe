//! Analyzer Pump
//!
//! A cooperative task that, while the engine is playing, samples the
//! current playback window at ~20Hz, runs it through the spectrum
//! analyzer, and publishes the result on the engine's event channel. Also
//! detects and publishes end-of-stream transitions the audio callback
//! flagged but couldn't announce itself.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use hifi_dsp::{SpectrumAnalyzer, FFT_SIZE};

use crate::engine::Engine;
use crate::message::Event;

const PUMP_INTERVAL: Duration = Duration::from_millis(50); // ~20Hz

/// Run the analyzer pump until `engine` is dropped (in practice: forever,
/// as a spawned task owning an `Arc<Engine>`).
pub async fn run(engine: Arc<Engine>) {
    let mut analyzer = SpectrumAnalyzer::new();
    let mut interval = tokio::time::interval(PUMP_INTERVAL);

    loop {
        interval.tick().await;

        let (snapshot, eos) = engine.snapshot_for_analysis(FFT_SIZE);

        if eos {
            debug!("end of stream observed, publishing terminal state");
            engine.publish(Event::PlaybackState(engine.current_snapshot()));
        }

        if let Some((frames, channels, sample_rate)) = snapshot {
            let bins = analyzer.analyze(&frames, channels as usize, sample_rate as f32);
            engine.publish(Event::SpectrumData { data: bins.to_vec() });
        }
    }
}
