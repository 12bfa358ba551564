pub mod audio;
pub mod chapters;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod timeline;

pub use config::Config;
pub use error::{ChapterizeError, Result};
pub use pipeline::{
    generate_chapters, generate_chapters_with_source, print_summary, PipelineConfig,
    PipelineResult, PipelineStats,
};
pub use timeline::{plan_windows, ScanStats, WindowedTimelineBuilder};
