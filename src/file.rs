use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::Config,
    error::{Result, TimestamperError},
};

/// Makes sure `folder` exists. Only the last path component is ever created.
pub fn ensure_output_folder(folder: impl AsRef<Path>) -> Result<PathBuf> {
    let folder = std::path::absolute(folder.as_ref())?;

    if folder.is_dir() {
        return Ok(folder);
    }

    match folder.parent() {
        Some(parent) if parent.is_dir() => {
            fs::create_dir(&folder)?;
            log::info!("Created output folder {}", folder.display());
            Ok(folder)
        }
        _ => Err(TimestamperError::OutputFolderMissing(folder)),
    }
}

/// Drops banned characters and surrounding whitespace.
pub fn sanitize_name(name: &str, config: &Config) -> String {
    name.chars()
        .filter(|c| !config.is_banned(*c))
        .collect::<String>()
        .trim()
        .to_owned()
}

/// `"07. Chapter name.mp3"`, the index is padded to the width of `total`.
pub fn track_file_name(index: usize, total: usize, title: &str, format: &str) -> String {
    let width = total.to_string().len();
    format!("{index:0width$}. {title}.{format}")
}
