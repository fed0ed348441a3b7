use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use crate::{
    chapters::Timestamp,
    error::{Result, TimestamperError},
};

/// Overrides the ffmpeg binary looked up on `PATH`.
pub const FFMPEG_ENV: &str = "TIMESTAMPER_FFMPEG";

/// Everything needed to cut one chapter out of the source recording.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscodeRequest {
    pub input: PathBuf,
    pub start: Timestamp,
    pub end: Timestamp,
    pub output: PathBuf,
    pub title: String,
    pub track: usize,
    pub overwrite: bool,
    pub write_metadata: bool,
}

pub trait Transcoder {
    fn run_transcode(&self, request: &TranscodeRequest) -> Result<()>;
}

/// Command line arguments for ffmpeg, without the binary itself.
pub fn ffmpeg_args(request: &TranscodeRequest) -> Result<Vec<OsString>> {
    if request.start.is_open() {
        return Err(TimestamperError::InvalidChapter(request.title.clone()));
    }

    let overwrite = if request.overwrite { "-y" } else { "-n" };
    let mut args: Vec<OsString> = vec![
        OsString::from(overwrite),
        OsString::from("-ss"),
        OsString::from(request.start.to_string()),
        OsString::from("-i"),
        request.input.clone().into_os_string(),
    ];

    if !request.end.is_open() {
        args.push(OsString::from("-to"));
        args.push(OsString::from(request.end.to_string()));
        args.push(OsString::from("-copyts"));
    }

    if request.write_metadata {
        args.push(OsString::from("-metadata"));
        args.push(OsString::from(format!("title={}", request.title)));
        args.push(OsString::from("-metadata"));
        args.push(OsString::from(format!("track={}", request.track)));
    }

    args.push(request.output.clone().into_os_string());
    Ok(args)
}

pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        let binary = std::env::var_os(FFMPEG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        Self { binary }
    }
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command_line(&self, args: &[OsString]) -> String {
        std::iter::once(self.binary.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Transcoder for FfmpegTranscoder {
    fn run_transcode(&self, request: &TranscodeRequest) -> Result<()> {
        let args = ffmpeg_args(request)?;
        let command_line = self.command_line(&args);
        log::debug!("{command_line}");

        let output = Command::new(&self.binary).args(&args).output()?;
        let status = output.status;
        if !status.success() {
            log::debug!("stdout\n{}", String::from_utf8_lossy(&output.stdout));
            return Err(TimestamperError::TranscodeFailed {
                command: command_line,
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(())
    }
}
