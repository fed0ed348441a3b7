use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while extracting, persisting and exporting chapters.
#[derive(Debug, Error)]
pub enum TimestamperError {
    #[error("\"{0}\" is not a millisecond integer")]
    InvalidDuration(String),

    /// Only ever logged, a bad header line never aborts a read.
    #[error("Ignored malformed header line {line_number}: {line}")]
    MalformedHeaderLine { line_number: usize, line: String },

    #[error(
        "Line {line_number} \"{line}\" does not contain the chapter-name/time separator \"{separator}\" (only) once"
    )]
    MalformedChapterLine {
        line_number: usize,
        line: String,
        separator: char,
    },

    #[error("{} does not exist", .0.display())]
    SourceNotFound(PathBuf),

    #[error("No permission to read {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("No chapters found, maybe the markup has changed?")]
    NoChaptersExtracted,

    #[error("Could not parse script payload at offset {offset}: {message}")]
    ScriptSyntax { offset: usize, message: String },

    #[error("{field} \"{value}\" contains the separator or a line break")]
    UnencodableField { field: &'static str, value: String },

    #[error("This does not look right: {0}")]
    InvalidLink(String),

    #[error("Could not get page {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("Output folder \"{}\" does not exist", .0.display())]
    OutputFolderMissing(PathBuf),

    #[error("Chapter \"{0}\" has no start time")]
    InvalidChapter(String),

    #[error("ffmpeg did not terminate normally ({status}), command was '{command}': {stderr}")]
    TranscodeFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TimestamperError>;
