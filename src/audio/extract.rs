use std::path::Path;
use std::process::{Command, Stdio};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ChapterizeError, Result};

use super::{DurationProvider, SampleBuffer, SampleProvider, Window};

/// Decode format for every window: signed 16-bit little-endian, 44.1 kHz stereo.
pub const SAMPLE_RATE: u32 = 44_100;
pub const CHANNELS: u16 = 2;

/// Run `<program> -version` and fail with `hint` if it cannot be started.
fn check_tool(program: &str, hint: &str) -> Result<()> {
    let status = Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| {
            ChapterizeError::AudioSource(format!("{program} not found. {hint} Error: {e}"))
        })?;

    if !status.success() {
        return Err(ChapterizeError::AudioSource(format!(
            "{program} -version exited with {status}"
        )));
    }

    debug!("{} is available", program);
    Ok(())
}

pub fn check_ffmpeg() -> Result<()> {
    check_tool("ffmpeg", "Install FFmpeg and make sure it is on PATH.")
}

pub fn check_ffprobe() -> Result<()> {
    check_tool("ffprobe", "It ships with FFmpeg.")
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Convert fractional seconds to milliseconds, rounding up so the final
/// partial millisecond is still covered by a window.
fn secs_to_ms(secs: f64) -> u64 {
    let micros = (secs * 1_000_000.0).round() as u64;
    micros.div_ceil(1000)
}

fn parse_probe_duration(json: &str) -> Result<u64> {
    let probe: ProbeOutput = serde_json::from_str(json)?;

    let duration_str = probe
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| {
            ChapterizeError::AudioSource("FFprobe reported no duration".to_string())
        })?;

    let duration_secs: f64 = duration_str.trim().parse().map_err(|e| {
        ChapterizeError::AudioSource(format!(
            "Failed to parse duration '{}': {e}",
            duration_str.trim()
        ))
    })?;

    if !duration_secs.is_finite() || duration_secs < 0.0 {
        return Err(ChapterizeError::AudioSource(format!(
            "Invalid duration: {duration_secs}"
        )));
    }

    Ok(secs_to_ms(duration_secs))
}

/// Get audio duration in milliseconds using FFprobe.
pub fn get_audio_duration(input: &Path) -> Result<u64> {
    if !input.exists() {
        return Err(ChapterizeError::FileNotFound(input.display().to_string()));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-show_entries",
            "format=duration",
            "-of",
            "json",
            "-i",
        ])
        .arg(input)
        .output()
        .map_err(|e| ChapterizeError::AudioSource(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ChapterizeError::AudioSource(format!(
            "FFprobe failed on {}: {stderr}",
            input.display()
        )));
    }

    parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
}

/// Format milliseconds as seconds with exactly three decimals.
fn format_secs(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// Decode little-endian 16-bit PCM, dropping a trailing partial frame.
fn decode_s16le(bytes: &[u8], channels: u16) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(ChapterizeError::AudioSource(format!(
            "Decoder returned {} bytes, not a whole number of 16-bit samples",
            bytes.len()
        )));
    }

    let mut samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();

    let remainder = samples.len() % channels.max(1) as usize;
    if remainder != 0 {
        warn!("Dropping {} samples of a partial frame", remainder);
        samples.truncate(samples.len() - remainder);
    }

    Ok(samples)
}

/// Recording access through the `ffprobe` and `ffmpeg` executables.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegSource;

impl FfmpegSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DurationProvider for FfmpegSource {
    async fn duration_ms(&self, input: &Path) -> Result<u64> {
        get_audio_duration(input)
    }
}

#[async_trait]
impl SampleProvider for FfmpegSource {
    async fn samples(&self, input: &Path, window: &Window) -> Result<SampleBuffer> {
        let start = format_secs(window.start_ms);
        let length = format_secs(window.length_ms);

        debug!(
            "Decoding window {}: start={}s, length={}s",
            window.index, start, length
        );

        let output = tokio::process::Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-ss"])
            .arg(&start)
            .arg("-t")
            .arg(&length)
            .arg("-i")
            .arg(input)
            .args(["-vn", "-f", "s16le", "-acodec", "pcm_s16le", "-ar"])
            .arg(SAMPLE_RATE.to_string())
            .arg("-ac")
            .arg(CHANNELS.to_string())
            .arg("-")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ChapterizeError::AudioSource(format!("Failed to run FFmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ChapterizeError::AudioSource(format!(
                "FFmpeg failed to decode window {} at {}s: {}",
                window.index,
                start,
                stderr.trim()
            )));
        }

        let samples = decode_s16le(&output.stdout, CHANNELS)?;
        Ok(SampleBuffer::new(samples, SAMPLE_RATE, CHANNELS))
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
