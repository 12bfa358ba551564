use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use async_trait::async_trait;
use hound::{SampleFormat, WavReader};
use tracing::debug;

use crate::error::{ChapterizeError, Result};

use super::{DurationProvider, SampleBuffer, SampleProvider, Window};

/// Recording access for uncompressed WAV files, without an external decoder.
///
/// Each call reopens the file, so one source can serve concurrent windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavSource;

impl WavSource {
    pub fn new() -> Self {
        Self
    }
}

fn open(input: &Path) -> Result<WavReader<BufReader<File>>> {
    if !input.exists() {
        return Err(ChapterizeError::FileNotFound(input.display().to_string()));
    }
    Ok(WavReader::open(input)?)
}

fn read_i16(reader: &mut WavReader<BufReader<File>>, count: usize) -> Result<Vec<i16>> {
    let spec = reader.spec();

    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => reader
            .samples::<i16>()
            .take(count)
            .map(|s| s.map(|v| v << 8))
            .collect::<std::result::Result<Vec<_>, _>>()?,
        (SampleFormat::Int, bits) if bits <= 16 => reader
            .samples::<i16>()
            .take(count)
            .collect::<std::result::Result<Vec<_>, _>>()?,
        (SampleFormat::Int, bits) => {
            let shift = bits - 16;
            reader
                .samples::<i32>()
                .take(count)
                .map(|s| s.map(|v| (v >> shift) as i16))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .take(count)
            .map(|s| s.map(|v| (v * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    Ok(samples)
}

#[async_trait]
impl DurationProvider for WavSource {
    async fn duration_ms(&self, input: &Path) -> Result<u64> {
        let reader = open(input)?;
        let rate = reader.spec().sample_rate as u64;
        if rate == 0 {
            return Err(ChapterizeError::AudioSource(format!(
                "{} declares a sample rate of 0",
                input.display()
            )));
        }
        Ok((reader.duration() as u64 * 1000).div_ceil(rate))
    }
}

#[async_trait]
impl SampleProvider for WavSource {
    async fn samples(&self, input: &Path, window: &Window) -> Result<SampleBuffer> {
        let mut reader = open(input)?;
        let spec = reader.spec();
        let rate = spec.sample_rate as u64;
        let total_frames = reader.duration() as u64;

        let start_frame = (window.start_ms * rate / 1000).min(total_frames);
        let end_frame = (window.end_ms() * rate / 1000).min(total_frames);
        let count = (end_frame - start_frame) as usize * spec.channels as usize;

        debug!(
            "Reading window {}: frames {}..{} of {}",
            window.index, start_frame, end_frame, total_frames
        );

        // start_frame is bounded by duration(), which is itself a u32.
        reader.seek(start_frame as u32)?;
        let samples = read_i16(&mut reader, count)?;

        Ok(SampleBuffer::new(samples, spec.sample_rate, spec.channels))
    }

    fn name(&self) -> &'static str {
        "wav"
    }
}
