//! Silence detection over a single decoded buffer.
//!
//! Loudness is measured on 1 ms frames as the RMS of every interleaved sample
//! in the frame, expressed in dBFS against the 16-bit full-scale amplitude.
//! Runs of frames at or below the threshold become silence intervals when
//! they last at least the configured minimum.

use super::{SampleBuffer, SilenceInterval};

/// Resolution of the loudness profile.
pub const FRAME_MS: u64 = 1;

/// Full-scale amplitude for signed 16-bit PCM.
const FULL_SCALE: f64 = 32768.0;

/// Parameters for silence detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceConfig {
    /// Frames at or below this loudness (dBFS) are silent.
    pub threshold_db: f64,

    /// Shortest run of silent frames that is reported.
    pub min_silence_ms: u64,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            threshold_db: -30.0,
            min_silence_ms: 3000,
        }
    }
}

/// Root mean square of a run of samples, in raw sample units.
pub fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt()
}

/// Convert an amplitude in 16-bit sample units to dBFS.
///
/// Zero maps to negative infinity, which is below every threshold.
pub fn amplitude_to_dbfs(amplitude: f64) -> f64 {
    20.0 * (amplitude / FULL_SCALE).log10()
}

pub fn rms_dbfs(samples: &[i16]) -> f64 {
    amplitude_to_dbfs(rms(samples))
}

/// Per-millisecond loudness of a buffer in dBFS.
pub fn loudness_profile(buffer: &SampleBuffer) -> Vec<f64> {
    let total_ms = buffer.duration_ms();
    if total_ms == 0 {
        return vec![];
    }

    let rate = buffer.sample_rate as u64;
    let channels = buffer.channels as usize;
    let frames = buffer.frames();

    (0..total_ms / FRAME_MS)
        .map(|i| {
            let ms = i * FRAME_MS;
            let start = (ms * rate / 1000) as usize;
            // Below 1 kHz a millisecond can hold no frame; borrow the next one.
            let end = (((ms + FRAME_MS) * rate / 1000) as usize)
                .max(start + 1)
                .min(frames);
            rms_dbfs(&buffer.samples[start * channels..end * channels])
        })
        .collect()
}

/// Detect silence intervals in a buffer.
///
/// Returned intervals are in milliseconds relative to the start of the
/// buffer, sorted and disjoint.
pub fn detect_silence(buffer: &SampleBuffer, config: &SilenceConfig) -> Vec<SilenceInterval> {
    let profile = loudness_profile(buffer);
    let silent = silent_frames(&profile, config.threshold_db);
    frames_to_intervals(&silent, config.min_silence_ms)
}

fn silent_frames(profile: &[f64], threshold_db: f64) -> Vec<bool> {
    profile.iter().map(|&db| db <= threshold_db).collect()
}

fn frames_to_intervals(silent: &[bool], min_silence_ms: u64) -> Vec<SilenceInterval> {
    let mut intervals = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, &is_silent) in silent.iter().enumerate() {
        match (is_silent, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                push_run(&mut intervals, start, i, min_silence_ms);
                run_start = None;
            }
            _ => {}
        }
    }

    if let Some(start) = run_start {
        push_run(&mut intervals, start, silent.len(), min_silence_ms);
    }

    intervals
}

fn push_run(intervals: &mut Vec<SilenceInterval>, start: usize, end: usize, min_ms: u64) {
    let start_ms = start as u64 * FRAME_MS;
    let end_ms = end as u64 * FRAME_MS;
    if end_ms - start_ms >= min_ms {
        intervals.push(SilenceInterval { start_ms, end_ms });
    }
}

/// Total length of a set of disjoint intervals.
pub fn total_silence_ms(intervals: &[SilenceInterval]) -> u64 {
    intervals.iter().map(|i| i.duration_ms()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOUD: i16 = 16_000;

    /// Mono 1 kHz buffer: one sample per millisecond.
    fn mono(segments: &[(i16, usize)]) -> SampleBuffer {
        let samples = segments
            .iter()
            .flat_map(|&(amp, ms)| std::iter::repeat(amp).take(ms))
            .collect();
        SampleBuffer::new(samples, 1000, 1)
    }

    fn config(threshold_db: f64, min_silence_ms: u64) -> SilenceConfig {
        SilenceConfig {
            threshold_db,
            min_silence_ms,
        }
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0; 100]), 0.0);
        assert_eq!(rms(&[1000, -1000, 1000, -1000]), 1000.0);
    }

    #[test]
    fn test_dbfs() {
        assert_eq!(amplitude_to_dbfs(FULL_SCALE), 0.0);
        assert!((amplitude_to_dbfs(FULL_SCALE / 2.0) + 6.0206).abs() < 0.001);
        assert_eq!(rms_dbfs(&[0; 10]), f64::NEG_INFINITY);
    }

    #[test]
    fn test_all_silent_buffer() {
        let buffer = mono(&[(0, 5000)]);
        let intervals = detect_silence(&buffer, &config(-30.0, 3000));
        assert_eq!(intervals, vec![SilenceInterval::new(0, 5000)]);
    }

    #[test]
    fn test_all_silent_buffer_too_short() {
        let buffer = mono(&[(0, 2000)]);
        assert!(detect_silence(&buffer, &config(-30.0, 3000)).is_empty());
    }

    #[test]
    fn test_all_loud_buffer() {
        let buffer = mono(&[(LOUD, 10_000)]);
        assert!(detect_silence(&buffer, &config(-30.0, 3000)).is_empty());
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = SampleBuffer::new(vec![], 44_100, 2);
        assert!(detect_silence(&buffer, &config(-30.0, 0)).is_empty());
        assert!(loudness_profile(&buffer).is_empty());
    }

    #[test]
    fn test_min_duration_is_inclusive() {
        let exact = mono(&[(LOUD, 1000), (0, 3000), (LOUD, 1000)]);
        assert_eq!(
            detect_silence(&exact, &config(-30.0, 3000)),
            vec![SilenceInterval::new(1000, 4000)]
        );

        let short = mono(&[(LOUD, 1000), (0, 2999), (LOUD, 1000)]);
        assert!(detect_silence(&short, &config(-30.0, 3000)).is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let amplitude = 1000;
        let threshold = amplitude_to_dbfs(amplitude as f64);
        let buffer = mono(&[(amplitude, 4000)]);

        assert_eq!(
            detect_silence(&buffer, &config(threshold, 3000)),
            vec![SilenceInterval::new(0, 4000)]
        );
        assert!(detect_silence(&buffer, &config(threshold - 0.01, 3000)).is_empty());
    }

    #[test]
    fn test_short_runs_are_discarded() {
        let buffer = mono(&[
            (0, 500),
            (LOUD, 1000),
            (0, 3500),
            (LOUD, 200),
            (0, 100),
            (LOUD, 700),
        ]);
        let intervals = detect_silence(&buffer, &config(-30.0, 1000));
        assert_eq!(intervals, vec![SilenceInterval::new(1500, 5000)]);
    }

    #[test]
    fn test_multiple_runs_sorted_and_disjoint() {
        let buffer = mono(&[(0, 1200), (LOUD, 300), (0, 2000), (LOUD, 1), (0, 1500)]);
        let intervals = detect_silence(&buffer, &config(-30.0, 1000));
        assert_eq!(
            intervals,
            vec![
                SilenceInterval::new(0, 1200),
                SilenceInterval::new(1500, 3500),
                SilenceInterval::new(3501, 5001),
            ]
        );
        for pair in intervals.windows(2) {
            assert!(pair[0].end_ms <= pair[1].start_ms);
        }
    }

    #[test]
    fn test_zero_minimum_keeps_every_run() {
        let buffer = mono(&[(0, 1), (LOUD, 1), (0, 2)]);
        let intervals = detect_silence(&buffer, &config(-30.0, 0));
        assert_eq!(
            intervals,
            vec![SilenceInterval::new(0, 1), SilenceInterval::new(2, 4)]
        );
    }

    #[test]
    fn test_stereo_frame_uses_both_channels() {
        // Left silent, right loud: the frame RMS stays well above -30 dBFS.
        let samples: Vec<i16> = (0..4000).flat_map(|_| [0, LOUD]).collect();
        let buffer = SampleBuffer::new(samples, 1000, 2);
        assert!(detect_silence(&buffer, &config(-30.0, 1000)).is_empty());
    }

    #[test]
    fn test_frame_boundaries_at_44100() {
        let rate = 44_100usize;
        let mut samples = vec![LOUD; rate];
        samples.extend(vec![0; rate / 2]);
        samples.extend(vec![LOUD; rate]);
        let buffer = SampleBuffer::new(samples, rate as u32, 1);

        let intervals = detect_silence(&buffer, &config(-30.0, 500));
        assert_eq!(intervals, vec![SilenceInterval::new(1000, 1500)]);
    }

    #[test]
    fn test_low_sample_rate_has_no_empty_frames() {
        let buffer = SampleBuffer::new(vec![LOUD; 800], 800, 1);
        let profile = loudness_profile(&buffer);
        assert_eq!(profile.len(), 1000);
        assert!(profile.iter().all(|db| db.is_finite()));
    }

    #[test]
    fn test_detection_is_idempotent() {
        let buffer = mono(&[(LOUD, 700), (0, 4000), (LOUD, 300), (0, 3100)]);
        let cfg = config(-30.0, 3000);
        assert_eq!(detect_silence(&buffer, &cfg), detect_silence(&buffer, &cfg));
    }

    #[test]
    fn test_total_silence_ms() {
        let intervals = vec![SilenceInterval::new(0, 3000), SilenceInterval::new(5000, 9000)];
        assert_eq!(total_silence_ms(&intervals), 7000);
    }
}
