//! Resample Cache
//!
//! Maps (file identity, target format) to a precomputed resampled PCM file
//! on disk, so repeated loads of the same file at the same target rate
//! skip the resampler entirely.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Cache key inputs, gathered once per load.
pub struct CacheKey {
    pub path: PathBuf,
    pub mtime_ns: u128,
    pub size: u64,
    pub target_sr: u32,
    pub channels: u16,
}

impl CacheKey {
    /// Build a cache key from a file's current metadata.
    ///
    /// `path` is canonicalized to an absolute path first, so `load("./a.wav")`
    /// and `load("/full/a.wav")` against the same file hash to the same key.
    pub fn from_metadata(path: &Path, target_sr: u32, channels: u16) -> std::io::Result<Self> {
        let path = fs::canonicalize(path)?;
        let metadata = fs::metadata(&path)?;
        let mtime_ns = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        Ok(Self {
            path,
            mtime_ns,
            size: metadata.len(),
            target_sr,
            channels,
        })
    }

    /// The 32-hex-char digest identifying this key.
    pub fn digest(&self) -> String {
        let key = format!(
            "{}|{}|{}|sr={}|fmt=f32le|ch={}",
            self.path.display(),
            self.mtime_ns,
            self.size,
            self.target_sr,
            self.channels
        );
        format!("{:x}", md5::compute(key.as_bytes()))
    }
}

/// A resolved cache location. `None` means caching is disabled (no cache
/// directory configured).
pub struct ResampleCache {
    cache_dir: Option<PathBuf>,
}

impl ResampleCache {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self { cache_dir }
    }

    fn entry_path(&self, key: &CacheKey) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| dir.join(format!("{}.wav", key.digest())))
    }

    /// Read a cache hit, if present, as interleaved float32 samples.
    pub fn read(&self, key: &CacheKey) -> Option<Vec<f32>> {
        let path = self.entry_path(key)?;
        if !path.exists() {
            return None;
        }

        let mut reader = hound::WavReader::open(&path).ok()?;
        let samples: Result<Vec<f32>, _> = reader.samples::<f32>().collect();
        samples.ok()
    }

    /// Persist resampled interleaved samples to the cache. Best-effort: a
    /// failure is logged by the caller and never fails the load.
    pub fn write(&self, key: &CacheKey, samples: &[f32]) -> std::io::Result<()> {
        let Some(path) = self.entry_path(key) else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let spec = hound::WavSpec {
            channels: key.channels,
            sample_rate: key.target_sr,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }

    pub fn is_enabled(&self) -> bool {
        self.cache_dir.is_some()
    }
}
