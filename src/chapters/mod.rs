pub mod ffmetadata;

pub use ffmetadata::FfmetadataFormatter;

use crate::audio::SilenceInterval;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRecord {
    /// 1-based position in the chapter list.
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub title: String,
}

pub trait ChapterFormatter {
    fn format(&self, chapters: &[ChapterRecord]) -> String;
}

/// Placeholder label for the chapter at `index`.
pub fn chapter_title(index: usize) -> String {
    format!("Tag {index}")
}

/// Turn an ordered silence timeline into chapter records, one per interval.
pub fn emit_chapters(intervals: &[SilenceInterval]) -> Vec<ChapterRecord> {
    intervals
        .iter()
        .enumerate()
        .map(|(i, interval)| ChapterRecord {
            index: i + 1,
            start_ms: interval.start_ms,
            end_ms: interval.end_ms,
            title: chapter_title(i + 1),
        })
        .collect()
}
