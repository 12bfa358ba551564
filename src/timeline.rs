use crate::audio::{
    detect_silence, total_silence_ms, Recording, SampleProvider, SilenceConfig, SilenceInterval,
    Window,
};
use crate::error::{ChapterizeError, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How far a decoded window may fall short of its requested length.
///
/// Only the final window may exceed it.
const SHORT_READ_TOLERANCE_MS: u64 = 1000;

/// Statistics from a windowed scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanStats {
    pub windows_processed: usize,
    pub total_ms: u64,
    pub silence_ms: u64,
    pub scan_time: Duration,
}

/// Split `[0, total_ms)` into consecutive windows of `window_ms`.
///
/// The last window is shortened to end exactly at `total_ms`.
pub fn plan_windows(total_ms: u64, window_ms: u64) -> Vec<Window> {
    if window_ms == 0 {
        return vec![];
    }

    let mut windows = Vec::with_capacity(total_ms.div_ceil(window_ms) as usize);
    let mut start = 0;

    while start < total_ms {
        let length_ms = window_ms.min(total_ms - start);
        windows.push(Window {
            index: windows.len(),
            start_ms: start,
            length_ms,
        });
        start += length_ms;
    }

    windows
}

/// Trim a window-local interval to the window's requested length.
fn clamp_to_window(interval: SilenceInterval, length_ms: u64) -> Option<SilenceInterval> {
    let end_ms = interval.end_ms.min(length_ms);
    (interval.start_ms < end_ms).then_some(SilenceInterval {
        start_ms: interval.start_ms,
        end_ms,
    })
}

/// Scans a recording window by window and stitches the per-window silences
/// into one timeline.
///
/// Silence that straddles a window edge is reported as two intervals, one
/// ending and one starting at the edge, each subject to the minimum length.
pub struct WindowedTimelineBuilder {
    source: Arc<dyn SampleProvider>,
    concurrency: usize,
    show_progress: bool,
    cancelled: Option<Arc<AtomicBool>>,
}

impl WindowedTimelineBuilder {
    pub fn new(source: Arc<dyn SampleProvider>) -> Self {
        Self {
            source,
            concurrency: 1,
            show_progress: false,
            cancelled: None,
        }
    }

    /// Number of windows decoded at once. Each holds one buffer in memory.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Enable or disable progress bar display.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Stop before the next window once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Scan the whole recording and return its silences in global time.
    pub async fn scan(
        &self,
        recording: &Recording,
        window_ms: u64,
        config: &SilenceConfig,
    ) -> Result<(Vec<SilenceInterval>, ScanStats)> {
        if window_ms == 0 {
            return Err(ChapterizeError::Config(
                "Window length must be greater than 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ChapterizeError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        let start_time = Instant::now();
        let windows = plan_windows(recording.duration_ms, window_ms);

        info!(
            "Scanning {} windows of {}ms with {} (concurrency: {})",
            windows.len(),
            window_ms,
            self.source.name(),
            self.concurrency
        );

        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(windows.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} windows ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let last_index = windows.len().saturating_sub(1);

        // `buffered` yields in submission order, so the fold sees windows
        // left to right regardless of which decode finishes first.
        let intervals = stream::iter(windows.iter().copied())
            .map(|window| {
                self.scan_window(
                    &recording.path,
                    window,
                    window.index == last_index,
                    config,
                    progress_bar.as_ref(),
                )
            })
            .buffered(self.concurrency)
            .try_fold(Vec::new(), |mut acc, global| async move {
                acc.extend(global);
                Ok::<_, ChapterizeError>(acc)
            })
            .await;

        if let Some(pb) = &progress_bar {
            match &intervals {
                Ok(_) => pb.finish_with_message("Scan complete"),
                Err(_) => pb.abandon(),
            }
        }

        let intervals = intervals?;

        let stats = ScanStats {
            windows_processed: windows.len(),
            total_ms: recording.duration_ms,
            silence_ms: total_silence_ms(&intervals),
            scan_time: start_time.elapsed(),
        };

        info!(
            "Found {} silences ({:.1}s total) in {:.2}s",
            intervals.len(),
            stats.silence_ms as f64 / 1000.0,
            stats.scan_time.as_secs_f64()
        );

        Ok((intervals, stats))
    }

    async fn scan_window(
        &self,
        input: &Path,
        window: Window,
        is_last: bool,
        config: &SilenceConfig,
        progress_bar: Option<&ProgressBar>,
    ) -> Result<Vec<SilenceInterval>> {
        if self.is_cancelled() {
            warn!("Scan cancelled before window {}", window.index);
            return Err(ChapterizeError::Cancelled);
        }

        let window_start = Instant::now();
        let buffer = self.source.samples(input, &window).await?;

        let decoded_ms = buffer.duration_ms();
        let short_read = decoded_ms + SHORT_READ_TOLERANCE_MS < window.length_ms;

        if buffer.is_empty() {
            if is_last && window.length_ms < SHORT_READ_TOLERANCE_MS {
                warn!(
                    "Final window {} at {}ms decoded no samples, ignoring its {}ms",
                    window.index, window.start_ms, window.length_ms
                );
                if let Some(pb) = progress_bar {
                    pb.inc(1);
                }
                return Ok(vec![]);
            }
            return Err(ChapterizeError::AudioSource(format!(
                "No samples decoded for window {} at {}ms",
                window.index, window.start_ms
            )));
        }

        if short_read && !is_last {
            return Err(ChapterizeError::AudioSource(format!(
                "Truncated read: window {} at {}ms decoded {}ms of {}ms",
                window.index, window.start_ms, decoded_ms, window.length_ms
            )));
        }
        if short_read {
            warn!(
                "Final window {} decoded {}ms of {}ms requested",
                window.index, decoded_ms, window.length_ms
            );
        }

        let local = detect_silence(&buffer, config);
        drop(buffer);

        let global: Vec<SilenceInterval> = local
            .into_iter()
            .filter_map(|interval| clamp_to_window(interval, window.length_ms))
            .filter(|interval| interval.duration_ms() >= config.min_silence_ms)
            .map(|interval| interval.offset(window.start_ms))
            .collect();

        debug!(
            "Processed window {} at offset {}ms: {} silences ({:?})",
            window.index,
            window.start_ms,
            global.len(),
            window_start.elapsed()
        );

        if let Some(pb) = progress_bar {
            pb.inc(1);
        }

        Ok(global)
    }
}
