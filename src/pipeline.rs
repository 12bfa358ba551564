use crate::audio::{
    check_ffmpeg, check_ffprobe, DurationProvider, FfmpegSource, Recording, SampleProvider,
    SilenceConfig, SilenceInterval, WavSource,
};
use crate::chapters::{emit_chapters, ChapterFormatter, ChapterRecord, FfmetadataFormatter};
use crate::config::{Backend, Config};
use crate::error::{ChapterizeError, Result};
use crate::timeline::WindowedTimelineBuilder;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Configuration for the chapter generation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Silence detection parameters.
    pub silence: SilenceConfig,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Number of windows decoded at once.
    pub concurrency: usize,
    /// Show progress bars.
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            silence: SilenceConfig {
                threshold_db: config.silence_thresh,
                min_silence_ms: config.min_silence_len,
            },
            window_ms: config.window_ms(),
            concurrency: config.concurrency,
            show_progress: true,
        }
    }
}

/// Statistics from a chapter generation run.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Total time taken for the entire pipeline.
    pub total_time: Duration,
    /// Time spent decoding and scanning windows.
    pub scan_time: Duration,
    /// Number of windows scanned.
    pub windows_processed: usize,
    /// Length of the recording.
    pub audio_duration: Duration,
    /// Sum of all detected silences.
    pub silence_duration: Duration,
    /// Backend that supplied the samples.
    pub backend: String,
}

/// Result of the chapter generation pipeline.
#[derive(Debug)]
pub struct PipelineResult {
    /// Path to the written metadata file.
    pub output_path: PathBuf,
    /// Silence timeline the chapters were derived from.
    pub silences: Vec<SilenceInterval>,
    /// Generated chapters.
    pub chapters: Vec<ChapterRecord>,
    /// Pipeline statistics.
    pub stats: PipelineStats,
}

/// Generate chapter metadata for an audio file.
///
/// This is the main entry point. It:
/// 1. Queries the recording's duration
/// 2. Scans it window by window for silences
/// 3. Maps silences to chapters
/// 4. Writes the FFMETADATA file
pub async fn generate_chapters(
    input: &Path,
    output: &Path,
    config: &Config,
    pipeline_config: PipelineConfig,
    cancelled: Arc<AtomicBool>,
) -> Result<PipelineResult> {
    match config.backend {
        Backend::Ffmpeg => {
            check_ffmpeg().map_err(|_| {
                ChapterizeError::AudioSource(
                    "FFmpeg not found. Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux)".to_string()
                )
            })?;
            check_ffprobe()?;

            let source = Arc::new(FfmpegSource::new());
            generate_chapters_with_source(input, output, source, pipeline_config, cancelled).await
        }
        Backend::Wav => {
            let source = Arc::new(WavSource::new());
            generate_chapters_with_source(input, output, source, pipeline_config, cancelled).await
        }
    }
}

/// Generate chapter metadata using an explicit recording source.
pub async fn generate_chapters_with_source<S>(
    input: &Path,
    output: &Path,
    source: Arc<S>,
    pipeline_config: PipelineConfig,
    cancelled: Arc<AtomicBool>,
) -> Result<PipelineResult>
where
    S: DurationProvider + SampleProvider + 'static,
{
    let start_time = Instant::now();

    if cancelled.load(Ordering::Relaxed) {
        return Err(ChapterizeError::Cancelled);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 1: Duration
    // ═══════════════════════════════════════════════════════════════════════
    info!("Stage 1/3: Probing {:?}", input);

    let recording = Recording::probe(input, source.as_ref()).await?;
    info!("Total audio length: {}ms", recording.duration_ms);

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 2: Windowed silence scan
    // ═══════════════════════════════════════════════════════════════════════
    info!(
        "Stage 2/3: Scanning for silences (threshold {} dBFS, minimum {}ms)",
        pipeline_config.silence.threshold_db, pipeline_config.silence.min_silence_ms
    );

    let backend = source.name().to_string();
    let builder = WindowedTimelineBuilder::new(source)
        .with_concurrency(pipeline_config.concurrency)
        .with_progress(pipeline_config.show_progress)
        .with_cancel(cancelled.clone());

    let (silences, scan_stats) = match builder
        .scan(&recording, pipeline_config.window_ms, &pipeline_config.silence)
        .await
    {
        Ok(result) => result,
        Err(ChapterizeError::Cancelled) => {
            warn!("Pipeline cancelled, no metadata written");
            return Err(ChapterizeError::Cancelled);
        }
        Err(e) => return Err(e),
    };

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 3: Chapter metadata
    // ═══════════════════════════════════════════════════════════════════════
    info!("Stage 3/3: Writing {} chapters", silences.len());

    let chapters = emit_chapters(&silences);
    let content = FfmetadataFormatter.format(&chapters);
    write_output(output, &content)?;

    info!("Wrote {} chapters to {:?}", chapters.len(), output);

    let stats = PipelineStats {
        total_time: start_time.elapsed(),
        scan_time: scan_stats.scan_time,
        windows_processed: scan_stats.windows_processed,
        audio_duration: Duration::from_millis(scan_stats.total_ms),
        silence_duration: Duration::from_millis(scan_stats.silence_ms),
        backend,
    };

    Ok(PipelineResult {
        output_path: output.to_path_buf(),
        silences,
        chapters,
        stats,
    })
}

/// Write `contents` to `output` through a temporary file in the same
/// directory, so readers never see a partially written file.
fn write_output(output: &Path, contents: &str) -> Result<()> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    file.persist(output).map_err(|e| ChapterizeError::Io(e.error))?;
    Ok(())
}

/// Print a summary of the pipeline results.
pub fn print_summary(result: &PipelineResult) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                      Chapter Generation Complete               ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Output:     {}", result.output_path.display());
    println!("  Chapters:   {}", result.chapters.len());
    println!("  Backend:    {}", result.stats.backend);
    println!(
        "  Duration:   {:.1}s audio",
        result.stats.audio_duration.as_secs_f64()
    );
    println!(
        "  Silence:    {:.1}s",
        result.stats.silence_duration.as_secs_f64()
    );
    println!();
    println!("  Timing:");
    println!(
        "    Scan:        {:.2}s ({} windows)",
        result.stats.scan_time.as_secs_f64(),
        result.stats.windows_processed
    );
    println!(
        "    Total:       {:.2}s",
        result.stats.total_time.as_secs_f64()
    );
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
