//! Plain-text chapter metadata, one chapter per line:
//!
//! ```text
//! # Automatically created using timestamper
//! # Source: https://play.google.com/books/listen?id=AQAAAEBsuD74QM
//! # @title|My Book
//! Chapter 1|0|312.5
//! Chapter 2|312.5|
//! ```
//!
//! The separator between name and times is configurable, start and end are
//! always joined by `|`.

use std::fmt::Write as _;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::{
    chapters::{ChapterRecord, Chapters, MetadataHeader, Timestamp},
    config::{Config, TIME_DELIMITER},
    error::{Result, TimestamperError},
};

pub const SOURCE_MARKER: &str = "# Automatically created using timestamper";
pub const SOURCE_PREFIX: &str = "# Source: ";
pub const HEADER_PREFIX: &str = "# @";

/// Fields are trimmed when read back, so padding is refused like a line break.
fn check_field(field: &'static str, value: &str, forbidden: &[char]) -> Result<()> {
    if value.contains(|c: char| c == '\n' || c == '\r' || forbidden.contains(&c))
        || value.trim() != value
    {
        return Err(TimestamperError::UnencodableField {
            field,
            value: value.to_owned(),
        });
    }
    Ok(())
}

/// Renders the metadata file contents.
pub fn render_metadata(
    chapters: &Chapters,
    header: &MetadataHeader,
    source: Option<&str>,
    config: &Config,
) -> Result<String> {
    let sep = config.separator;
    let mut output = String::new();

    let _ = writeln!(output, "{SOURCE_MARKER}");
    if let Some(source) = source.filter(|s| !s.is_empty()) {
        check_field("source", source, &[])?;
        let _ = writeln!(output, "{SOURCE_PREFIX}{source}");
    }

    for (key, value) in header.iter() {
        check_field("header key", key, &[sep])?;
        check_field("header value", value, &[sep])?;
        let _ = writeln!(output, "{HEADER_PREFIX}{key}{sep}{value}");
    }

    for chapter in chapters {
        check_field("chapter name", &chapter.name, &[sep, TIME_DELIMITER])?;
        if chapter.name.starts_with('#') {
            return Err(TimestamperError::UnencodableField {
                field: "chapter name",
                value: chapter.name.clone(),
            });
        }
        let start = chapter.start.to_string();
        let end = chapter.end.to_string();
        check_field("start", &start, &[sep, TIME_DELIMITER])?;
        check_field("end", &end, &[sep, TIME_DELIMITER])?;

        let _ = writeln!(output, "{}{sep}{start}{TIME_DELIMITER}{end}", chapter.name);
    }

    Ok(output)
}

/// Writes the metadata file next to its final location first, then moves it
/// into place so an interrupted run never leaves a truncated file behind.
pub fn save_metadata(
    path: impl AsRef<Path>,
    chapters: &Chapters,
    header: &MetadataHeader,
    source: Option<&str>,
    config: &Config,
) -> Result<()> {
    let path = path.as_ref();
    let contents = render_metadata(chapters, header, source, config)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.persist(path).map_err(|e| e.error)?;

    log::info!(
        "Saved {} chapters to {}",
        chapters.num_chapters(),
        path.display()
    );
    Ok(())
}

/// Splits a chapter line into name, start and end.
fn split_chapter_line(line: &str, separator: char) -> Option<[&str; 3]> {
    let mut fields: Vec<&str> = line.split(separator).collect();
    if separator != TIME_DELIMITER {
        let times = fields.pop()?;
        fields.extend(times.split(TIME_DELIMITER));
    }
    match fields.as_slice() {
        [name, start, end] => Some([*name, *start, *end]),
        _ => None,
    }
}

/// Parses metadata text. Malformed header lines are logged and skipped, a
/// malformed chapter line fails the whole read.
pub fn parse_metadata(text: &str, config: &Config) -> Result<(Chapters, MetadataHeader)> {
    let sep = config.separator;
    let mut chapters = Chapters::default();
    let mut header = MetadataHeader::new();

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;

        if let Some(entry) = line.strip_prefix(HEADER_PREFIX) {
            let parts: Vec<&str> = entry.split(sep).collect();
            match parts.as_slice() {
                [key, value] => header.insert(key.trim(), value.trim()),
                _ => {
                    let e = TimestamperError::MalformedHeaderLine {
                        line_number,
                        line: line.to_owned(),
                    };
                    log::warn!("{e}");
                }
            }
            continue;
        }

        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let [name, start, end] =
            split_chapter_line(line, sep).ok_or_else(|| TimestamperError::MalformedChapterLine {
                line_number,
                line: line.to_owned(),
                separator: sep,
            })?;

        chapters.push(ChapterRecord {
            name: name.trim().to_owned(),
            start: Timestamp::from(start),
            end: Timestamp::from(end),
        });
    }

    Ok((chapters, header))
}

/// Reads a metadata file from disk.
pub fn load_metadata(path: impl AsRef<Path>, config: &Config) -> Result<(Chapters, MetadataHeader)> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TimestamperError::SourceNotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => TimestamperError::PermissionDenied(path.to_path_buf()),
        _ => TimestamperError::Io(e),
    })?;

    let (chapters, header) = parse_metadata(&text, config)?;
    log::debug!(
        "Loaded {} chapters and {} header entries from {}",
        chapters.num_chapters(),
        header.len(),
        path.display()
    );
    Ok((chapters, header))
}
