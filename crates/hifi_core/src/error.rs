//! Engine Error Types

use thiserror::Error;

/// Errors that can occur in the playback engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no track loaded")]
    NotLoaded,

    #[error("failed to decode audio: {0}")]
    DecodeFailed(String),

    #[error("failed to resample audio: {0}")]
    ResampleFailed(String),

    #[error("no audio devices found")]
    NoDevicesFound,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("dsp error: {0}")]
    Dsp(#[from] hifi_dsp::DspError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::NoDevicesFound;
        assert!(err.to_string().contains("no audio devices"));

        let err = EngineError::DeviceNotFound("Test Device".into());
        assert!(err.to_string().contains("Test Device"));
    }

    #[test]
    fn test_error_from_dsp() {
        let dsp_err = hifi_dsp::DspError::InvalidBandIndex(10);
        let engine_err: EngineError = dsp_err.into();
        assert!(matches!(engine_err, EngineError::Dsp(_)));
    }
}
