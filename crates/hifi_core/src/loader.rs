//! Loader
//!
//! Turns a file path into a ready-to-play [`TrackBuffer`]: decode at native
//! rate, work out the target sample rate, consult the resample cache, and
//! resample on a miss. Never called from the audio callback - this is
//! strictly a `load` command-time operation.

use std::path::Path;

use tracing::{info, warn};

use crate::cache::{CacheKey, ResampleCache};
use crate::decode;
use crate::error::{EngineError, EngineResult};
use crate::resample;
use crate::track::TrackBuffer;

/// Parameters that influence how a file is prepared for playback.
pub struct LoadOptions<'a> {
    pub cache_dir: Option<&'a Path>,
    /// Explicit upsampling target, if the user configured one.
    pub target_sr_override: Option<u32>,
    /// Whether exclusive mode is active and the host API can honor it.
    pub exclusive: bool,
    /// The device's own default sample rate, known only when exclusive
    /// mode is in effect and the device has been resolved.
    pub device_default_sr: Option<u32>,
}

/// Decode, resample (on cache miss), and return a ready [`TrackBuffer`].
pub fn load_track(path: &Path, options: &LoadOptions) -> EngineResult<TrackBuffer> {
    let decoded = decode::decode_file(path).map_err(EngineError::DecodeFailed)?;
    let channels = decoded.channels;

    let target_sr = resolve_target_sample_rate(decoded.sample_rate, options);

    if target_sr == decoded.sample_rate {
        return Ok(TrackBuffer::new(decoded.samples, decoded.sample_rate, channels));
    }

    let cache = ResampleCache::new(options.cache_dir.map(|p| p.to_path_buf()));
    let cache_key = CacheKey::from_metadata(path, target_sr, channels)
        .map_err(|e| EngineError::Internal(e.to_string()))
        .ok();

    if let Some(ref key) = cache_key {
        if let Some(cached) = cache.read(key) {
            info!(path = %path.display(), target_sr, "resample cache hit");
            return Ok(TrackBuffer::new(cached, target_sr, channels));
        }
    }

    let resampled = resample::resample_interleaved(
        &decoded.samples,
        channels as usize,
        decoded.sample_rate,
        target_sr,
    )
    .map_err(EngineError::ResampleFailed)?;

    if let Some(ref key) = cache_key {
        if let Err(e) = cache.write(key, &resampled) {
            warn!(path = %path.display(), reason = %e, "failed to persist resample cache entry");
        }
    }

    Ok(TrackBuffer::new(resampled, target_sr, channels))
}

/// Decide the target sample rate per the loader's resolution order:
/// an explicit override (only if higher than native), else the device's
/// own rate in exclusive mode, else the file's native rate.
fn resolve_target_sample_rate(native_sr: u32, options: &LoadOptions) -> u32 {
    if let Some(override_sr) = options.target_sr_override {
        if override_sr > native_sr {
            return override_sr;
        }
    }

    if options.exclusive {
        if let Some(device_sr) = options.device_default_sr {
            return device_sr;
        }
    }

    native_sr
}
