use crate::error::{ChapterizeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lowest threshold accepted, well below the 16-bit noise floor.
const MIN_THRESHOLD_DB: f64 = -200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Ffmpeg,
    Wav,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Ffmpeg => write!(f, "ffmpeg"),
            Backend::Wav => write!(f, "wav"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ffmpeg" => Ok(Backend::Ffmpeg),
            "wav" => Ok(Backend::Wav),
            _ => Err(format!("Unknown backend: {}. Use 'ffmpeg' or 'wav'", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metadata file written at the end of a run.
    pub output: PathBuf,
    /// Shortest pause, in milliseconds, that becomes a chapter mark.
    pub min_silence_len: u64,
    /// Loudness at or below this many dBFS counts as silence.
    pub silence_thresh: f64,
    /// Window length in seconds.
    pub chunk_size: u64,
    pub backend: Backend,
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: PathBuf::from("metadata.txt"),
            min_silence_len: 3000,
            silence_thresh: -30.0,
            chunk_size: 600,
            backend: Backend::default(),
            concurrency: 1,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents).map_err(|e| {
                    ChapterizeError::Config(format!(
                        "Failed to parse {}: {e}",
                        config_path.display()
                    ))
                })?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(output) = std::env::var("CHAPTERIZE_OUTPUT") {
            self.output = PathBuf::from(output);
        }
        if let Ok(len) = std::env::var("CHAPTERIZE_MIN_SILENCE_LEN") {
            if let Ok(l) = len.parse() {
                self.min_silence_len = l;
            }
        }
        if let Ok(thresh) = std::env::var("CHAPTERIZE_SILENCE_THRESH") {
            if let Ok(t) = thresh.parse() {
                self.silence_thresh = t;
            }
        }
        if let Ok(size) = std::env::var("CHAPTERIZE_CHUNK_SIZE") {
            if let Ok(s) = size.parse() {
                self.chunk_size = s;
            }
        }
        if let Ok(backend) = std::env::var("CHAPTERIZE_BACKEND") {
            if let Ok(b) = backend.parse() {
                self.backend = b;
            }
        }
        if let Ok(concurrency) = std::env::var("CHAPTERIZE_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.concurrency = c;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChapterizeError::Config(
                "Chunk size must be greater than 0 seconds".to_string(),
            ));
        }

        if self.chunk_size.checked_mul(1000).is_none() {
            return Err(ChapterizeError::Config(format!(
                "Chunk size of {}s is too large",
                self.chunk_size
            )));
        }

        if !self.silence_thresh.is_finite()
            || self.silence_thresh > 0.0
            || self.silence_thresh < MIN_THRESHOLD_DB
        {
            return Err(ChapterizeError::Config(format!(
                "Silence threshold must be between {MIN_THRESHOLD_DB} and 0 dBFS, got {}",
                self.silence_thresh
            )));
        }

        if self.concurrency == 0 {
            return Err(ChapterizeError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        if self.output.as_os_str().is_empty() {
            return Err(ChapterizeError::Config(
                "Output path must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.chunk_size.saturating_mul(1000)
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("chapterize").join("config.toml"))
    }
}
