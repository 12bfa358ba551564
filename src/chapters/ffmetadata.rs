//! ffmpeg's FFMETADATA1 text format, one `[CHAPTER]` block per chapter.
use super::{ChapterFormatter, ChapterRecord};

pub const HEADER: &str = ";FFMETADATA1";

/// All timestamps are written in milliseconds.
pub const TIMEBASE: &str = "1/1000";

pub struct FfmetadataFormatter;

impl ChapterFormatter for FfmetadataFormatter {
    fn format(&self, chapters: &[ChapterRecord]) -> String {
        let mut output = format!("{HEADER}\n");
        for chapter in chapters {
            output.push_str(&format!(
                "[CHAPTER]\nTIMEBASE={}\nSTART={}\nEND={}\ntitle={}\n",
                TIMEBASE,
                chapter.start_ms,
                chapter.end_ms,
                escape_value(&chapter.title)
            ));
        }
        output
    }
}

/// Escape the characters FFMETADATA treats specially in values.
fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '=' | ';' | '#' | '\\' | '\n') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
