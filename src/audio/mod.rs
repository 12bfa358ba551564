pub mod extract;
pub mod silence;
pub mod wav;

pub use extract::{check_ffmpeg, check_ffprobe, get_audio_duration, FfmpegSource};
pub use silence::{
    amplitude_to_dbfs, detect_silence, loudness_profile, rms, rms_dbfs, total_silence_ms,
    SilenceConfig,
};
pub use wav::WavSource;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// A recording to be scanned. Read-only for the lifetime of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub path: PathBuf,
    pub duration_ms: u64,
}

impl Recording {
    /// Query the duration of `path` and build a recording from it.
    pub async fn probe(path: &Path, provider: &dyn DurationProvider) -> Result<Self> {
        let duration_ms = provider.duration_ms(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            duration_ms,
        })
    }
}

/// A span of the recording timeline, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub index: usize,
    pub start_ms: u64,
    pub length_ms: u64,
}

impl Window {
    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.length_ms
    }
}

/// Decoded PCM for one window: interleaved signed 16-bit samples.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl SampleBuffer {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Length in whole milliseconds; a trailing partial millisecond is dropped.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }
}

/// A half-open span `[start_ms, end_ms)` of silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SilenceInterval {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl SilenceInterval {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Shift both endpoints by `offset_ms`, turning a window-local interval
    /// into a recording-global one.
    pub fn offset(&self, offset_ms: u64) -> Self {
        Self {
            start_ms: self.start_ms + offset_ms,
            end_ms: self.end_ms + offset_ms,
        }
    }
}

/// Reports the total length of a recording.
#[async_trait]
pub trait DurationProvider: Send + Sync {
    async fn duration_ms(&self, input: &Path) -> Result<u64>;
}

/// Decodes the samples of one window of a recording.
#[async_trait]
pub trait SampleProvider: Send + Sync {
    async fn samples(&self, input: &Path, window: &Window) -> Result<SampleBuffer>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_buffer_duration() {
        let buffer = SampleBuffer::new(vec![0; 44_100 * 2], 44_100, 2);
        assert_eq!(buffer.frames(), 44_100);
        assert_eq!(buffer.duration_ms(), 1000);

        let partial = SampleBuffer::new(vec![0; 1500], 1000, 1);
        assert_eq!(partial.duration_ms(), 1500);

        let ragged = SampleBuffer::new(vec![0; 44], 44_100, 1);
        assert_eq!(ragged.duration_ms(), 0);
        assert!(!ragged.is_empty());
    }

    #[test]
    fn test_interval_offset() {
        let local = SilenceInterval::new(1_000, 4_000);
        let global = local.offset(600_000);
        assert_eq!(global, SilenceInterval::new(601_000, 604_000));
        assert_eq!(global.duration_ms(), 3_000);
    }

    #[test]
    fn test_window_end() {
        let window = Window {
            index: 2,
            start_ms: 1_200_000,
            length_ms: 5_000,
        };
        assert_eq!(window.end_ms(), 1_205_000);
    }
}
