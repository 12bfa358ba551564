use anyhow::{Context, Result};
use chapterize::config::{Backend, Config};
use chapterize::{generate_chapters, print_summary, ChapterizeError, PipelineConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "chapterize")]
#[command(version, about = "Generate chapter metadata from silences in an audio file")]
#[command(long_about = "Scan an audiobook or podcast for long pauses and write an FFMETADATA file with one chapter per pause.")]
struct Cli {
    /// Input audio file
    input: PathBuf,

    /// Output metadata file [default: metadata.txt]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Minimum silence length in milliseconds [default: 3000]
    #[arg(long)]
    min_silence_len: Option<u64>,

    /// Silence threshold in dBFS [default: -30]
    #[arg(long, allow_negative_numbers = true)]
    silence_thresh: Option<f64>,

    /// Window size in seconds [default: 600]
    #[arg(long)]
    chunk_size: Option<u64>,

    /// Sample backend: ffmpeg, wav [default: ffmpeg]
    #[arg(short, long)]
    backend: Option<String>,

    /// Number of windows decoded concurrently [default: 1]
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Layer command-line flags over the loaded configuration.
fn apply_cli(mut config: Config, cli: &Cli) -> Result<Config> {
    if let Some(ref output) = cli.output {
        config.output = output.clone();
    }
    if let Some(len) = cli.min_silence_len {
        config.min_silence_len = len;
    }
    if let Some(thresh) = cli.silence_thresh {
        config.silence_thresh = thresh;
    }
    if let Some(size) = cli.chunk_size {
        config.chunk_size = size;
    }
    if let Some(ref backend) = cli.backend {
        config.backend = backend
            .parse::<Backend>()
            .map_err(|e: String| anyhow::anyhow!(e))?;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    let config = Config::load().context("Failed to load configuration")?;
    let config = apply_cli(config, &cli)?;
    config
        .validate()
        .context("Configuration validation failed")?;

    info!("Generating chapters for audio file: {}", cli.input.display());
    info!("Output:      {}", config.output.display());
    info!("Backend:     {}", config.backend);
    info!("Threshold:   {} dBFS", config.silence_thresh);
    info!("Min silence: {}ms", config.min_silence_len);
    info!("Window:      {}s", config.chunk_size);

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupt received, stopping after the current window");
            cancelled.store(true, Ordering::Relaxed);
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    let mut pipeline_config = PipelineConfig::from_config(&config);
    pipeline_config.show_progress = !cli.no_progress;

    let output = config.output.clone();
    match generate_chapters(&cli.input, &output, &config, pipeline_config, cancelled).await {
        Ok(result) => {
            print_summary(&result);
            Ok(())
        }
        Err(ChapterizeError::Cancelled) => {
            anyhow::bail!("Cancelled; {} was not written", output.display())
        }
        Err(e) => Err(e).context("Chapter generation failed"),
    }
}
