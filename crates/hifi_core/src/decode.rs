//! Decoder
//!
//! Decodes an audio file into interleaved float32 PCM at its native sample
//! rate and channel count, using `symphonia` as the primary decoder. If the
//! primary decoder doesn't recognize the format, an external decoder
//! (FFmpeg) is invoked to transcode to a canonical float32 WAV stream,
//! which is then re-ingested through the same `symphonia` WAV path - one
//! robust loader handles everything downstream of that point.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::process::{Command, Stdio};

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Fully decoded audio, interleaved, at the source's native format.
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decode `path`, falling back to FFmpeg if the primary decoder doesn't
/// recognize the container/codec.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, String> {
    match decode_native(path) {
        Ok(audio) => Ok(audio),
        Err(primary_err) => {
            tracing::warn!(
                path = %path.display(),
                reason = %primary_err,
                "primary decoder failed, falling back to external decoder"
            );
            decode_via_ffmpeg_fallback(path)
                .map_err(|fallback_err| format!("{primary_err}; fallback also failed: {fallback_err}"))
        }
    }
}

fn decode_native(path: &Path) -> Result<DecodedAudio, String> {
    let file = File::open(path).map_err(|e| format!("failed to open '{}': {e}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    decode_from_stream(mss, hint)
}

fn decode_via_ffmpeg_fallback(path: &Path) -> Result<DecodedAudio, String> {
    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args(["-f", "wav", "-acodec", "pcm_f32le", "-"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| format!("failed to spawn ffmpeg: {e}"))?;

    if !output.status.success() {
        return Err(format!("ffmpeg exited with status {}", output.status));
    }

    let cursor = Cursor::new(output.stdout);
    let mss = MediaSourceStream::new(Box::new(ReadOnlySource::new(cursor)), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("wav");

    decode_from_stream(mss, hint)
}

fn decode_from_stream(mss: MediaSourceStream, hint: Hint) -> Result<DecodedAudio, String> {
    let format_opts = FormatOptions {
        enable_gapless: true,
        ..Default::default()
    };
    let metadata_opts = MetadataOptions::default();
    let decoder_opts = DecoderOptions::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| format!("format not recognized: {e}"))?;

    let mut format_reader: Box<dyn FormatReader> = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or("no supported audio track found")?;

    let track_id = track.id;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or("track has no channel layout")?;
    let sample_rate = track.codec_params.sample_rate.ok_or("track has no sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| format!("failed to create decoder: {e}"))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format_reader.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(format!("decode error: {e}")),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => append_interleaved(&decoded, channels as usize, &mut samples),
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(format!("decode error: {e}")),
        }
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

fn append_interleaved(buf: &AudioBufferRef, channels: usize, out: &mut Vec<f32>) {
    let frames = buf.frames();

    macro_rules! push_channels {
        ($buf:expr, |$s:ident| $conv:expr) => {
            for frame in 0..frames {
                for ch in 0..channels.min($buf.spec().channels.count()) {
                    let $s = $buf.chan(ch)[frame];
                    out.push($conv);
                }
            }
        };
    }

    match buf {
        AudioBufferRef::U8(b) => push_channels!(b, |s| (s as f32 - 128.0) / 128.0),
        AudioBufferRef::S16(b) => push_channels!(b, |s| s as f32 / 32768.0),
        AudioBufferRef::S24(b) => push_channels!(b, |s| s.0 as f32 / 8_388_608.0),
        AudioBufferRef::S32(b) => push_channels!(b, |s| s as f32 / 2_147_483_648.0),
        AudioBufferRef::F32(b) => push_channels!(b, |s| s),
        AudioBufferRef::F64(b) => push_channels!(b, |s| s as f32),
        _ => tracing::warn!("unsupported sample format in packet, treating as silence"),
    }
}
