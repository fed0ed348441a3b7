//! Decides where chapters come from and cuts them out of the audio file one
//! after another.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    chapters::{Chapters, MetadataHeader},
    config::Config,
    error::{Result, TimestamperError},
    file::{ensure_output_folder, sanitize_name, track_file_name},
    metadata::{load_metadata, save_metadata},
    page::{PageFetcher, book_id, chapters_from_page, google_link},
    transcode::{TranscodeRequest, Transcoder},
};

#[derive(Clone, Debug, PartialEq)]
pub enum ChapterSource {
    GoogleId(String),
    GoogleLink(String),
    MetadataFile(PathBuf),
}

#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// File extension, ffmpeg derives the codec from it.
    pub format: String,
    /// Stop after this many exported files, 0 exports everything.
    pub export_only: usize,
    pub override_output: bool,
    pub dont_skip_existing: bool,
    pub no_metadata: bool,
    /// Ignore a previously saved metadata file and scrape again.
    pub no_resume: bool,
    /// Resolve chapters without creating folders or saving metadata.
    pub list_only: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: "mp3".to_owned(),
            export_only: 0,
            override_output: false,
            dont_skip_existing: false,
            no_metadata: false,
            no_resume: false,
            list_only: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedChapters {
    pub chapters: Chapters,
    pub header: MetadataHeader,
    pub export_folder: PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExportSummary {
    pub exported: usize,
    pub skipped: usize,
    pub interrupted: bool,
}

/// Loads or scrapes the chapter list. Scraped chapters are saved as
/// `<id>.txt` in the export folder so later runs can resume from them,
/// unless `list_only` is set.
pub fn resolve_chapters(
    source: &ChapterSource,
    output_folder: &Path,
    options: &ExportOptions,
    config: &Config,
    fetcher: &dyn PageFetcher,
) -> Result<ResolvedChapters> {
    let output_folder = if options.list_only {
        std::path::absolute(output_folder)?
    } else {
        ensure_output_folder(output_folder)?
    };

    let resolved = match source {
        ChapterSource::MetadataFile(path) => {
            let (chapters, header) = load_metadata(path, config)?;
            ResolvedChapters {
                chapters,
                header,
                export_folder: output_folder,
            }
        }
        ChapterSource::GoogleId(id) => {
            resolve_from_google(&google_link(id), &output_folder, options, config, fetcher)?
        }
        ChapterSource::GoogleLink(link) => {
            resolve_from_google(link, &output_folder, options, config, fetcher)?
        }
    };

    if resolved.chapters.is_empty() {
        return Err(TimestamperError::NoChaptersExtracted);
    }
    Ok(resolved)
}

fn resolve_from_google(
    link: &str,
    output_folder: &Path,
    options: &ExportOptions,
    config: &Config,
    fetcher: &dyn PageFetcher,
) -> Result<ResolvedChapters> {
    let id = book_id(link)?;
    let file_name = format!("{id}.txt");

    let saved = if options.no_resume {
        None
    } else {
        find_saved_metadata(output_folder, &file_name)?
    };
    if let Some(path) = saved {
        log::info!("Using local metadata: {}", path.display());
        match load_metadata(&path, config) {
            Ok((chapters, header)) => {
                let export_folder = path
                    .parent()
                    .map_or_else(|| output_folder.to_path_buf(), Path::to_path_buf);
                return Ok(ResolvedChapters {
                    chapters,
                    header,
                    export_folder,
                });
            }
            Err(e @ TimestamperError::PermissionDenied(_)) => {
                log::warn!("{e}, fetching the page again");
            }
            Err(e) => return Err(e),
        }
    }

    let page = fetcher.fetch_page(link)?;
    let (chapters, header) = chapters_from_page(&page, config)?;

    let mut export_folder = match header.get("title").map(|t| sanitize_name(t, config)) {
        Some(folder_name) if !folder_name.is_empty() => output_folder.join(folder_name),
        _ => output_folder.to_path_buf(),
    };
    if options.list_only {
        log::debug!("Listing only, {file_name} is not saved");
    } else {
        export_folder = ensure_output_folder(&export_folder)?;
        save_metadata(
            export_folder.join(&file_name),
            &chapters,
            &header,
            Some(link),
            config,
        )?;
    }

    Ok(ResolvedChapters {
        chapters,
        header,
        export_folder,
    })
}

/// A saved `<id>.txt` sits either in the output folder itself or in the
/// title folder an earlier scrape created inside it.
fn find_saved_metadata(output_folder: &Path, file_name: &str) -> Result<Option<PathBuf>> {
    let direct = output_folder.join(file_name);
    if direct.is_file() {
        return Ok(Some(direct));
    }
    if !output_folder.is_dir() {
        return Ok(None);
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(output_folder)? {
        let candidate = entry?.path().join(file_name);
        if candidate.is_file() {
            found.push(candidate);
        }
    }
    found.sort();
    if found.len() > 1 {
        log::warn!("{} saved copies of {file_name}, using the first", found.len());
    }
    Ok(found.into_iter().next())
}

/// Exports every chapter into `export_folder`. Files that already exist are
/// treated as done unless `dont_skip_existing` is set. `interrupt` is checked
/// before each chapter.
pub fn export_chapters(
    chapters: &Chapters,
    audio_file: &Path,
    export_folder: &Path,
    options: &ExportOptions,
    config: &Config,
    transcoder: &dyn Transcoder,
    interrupt: &AtomicBool,
) -> Result<ExportSummary> {
    if !audio_file.is_file() {
        return Err(TimestamperError::SourceNotFound(audio_file.to_path_buf()));
    }
    if chapters.is_empty() {
        return Err(TimestamperError::NoChaptersExtracted);
    }
    if let Some(chapter) = chapters.iter().find(|c| c.start.is_open()) {
        return Err(TimestamperError::InvalidChapter(chapter.name.clone()));
    }

    let total = chapters.num_chapters();
    log::info!("{total} tracks to export to {}.", export_folder.display());
    if options.export_only > 0 {
        log::info!("We are only exporting {}.", options.export_only);
    }

    let mut summary = ExportSummary::default();
    for (index, chapter) in chapters.iter().enumerate() {
        let track = index + 1;
        if interrupt.load(Ordering::SeqCst) {
            log::warn!("Interrupted, aborted processing.");
            summary.interrupted = true;
            break;
        }

        let title = sanitize_name(&chapter.name, config);
        let file_name = track_file_name(track, total, &title, &options.format);
        let output = export_folder.join(&file_name);

        if !options.dont_skip_existing && output.exists() {
            log::info!("Skipped \"{file_name}\" ({track}/{total})");
            summary.skipped += 1;
            continue;
        }

        let request = TranscodeRequest {
            input: audio_file.to_path_buf(),
            start: chapter.start.clone(),
            end: chapter.end.clone(),
            output,
            title,
            track,
            overwrite: options.override_output,
            write_metadata: !options.no_metadata,
        };
        if let Err(e) = transcoder.run_transcode(&request) {
            // ffmpeg receives the same Ctrl-C and fails, that is not an error
            if interrupt.load(Ordering::SeqCst) {
                log::warn!("Interrupted while exporting \"{file_name}\", aborted processing.");
                summary.interrupted = true;
                break;
            }
            return Err(e);
        }

        log::info!("Exported \"{file_name}\" ({track}/{total})");
        summary.exported += 1;
        if options.export_only > 0 && summary.exported == options.export_only {
            break;
        }
    }

    log::info!(
        "Exported {} tracks to {}.",
        summary.exported,
        export_folder.display()
    );
    if summary.skipped > 0 {
        log::info!("Skipped {} files that already existed.", summary.skipped);
    }
    Ok(summary)
}
