use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use timestamper::{
    Config,
    export::{ChapterSource, ExportOptions, export_chapters, resolve_chapters},
    page::HttpPageFetcher,
    transcode::FfmpegTranscoder,
};

/// Automatically download chapter-timestamps from Google Books and separate an
/// input-file by those timestamps. Title- and track-attributes will be set.
///
/// This will not download any copyrighted material, you have to provide the
/// audio file yourself.
#[derive(Parser, Debug)]
#[command(name = "timestamper", version)]
#[command(group(ArgGroup::new("source").required(true).args(["google_id", "google_link", "metadata_file"])))]
struct Cli {
    /// The audio file that tracks will be exported from
    #[arg(value_name = "AUDIOFILE")]
    audio_file: PathBuf,

    /// The id of the audiobook to download the track data for (e.g. AQAAAEBsuD74QM)
    #[arg(short = 'g', long, visible_alias = "gi", value_name = "GOOGLE-BOOKS-ID")]
    google_id: Option<String>,

    /// The link of the audiobook to download the track data for
    #[arg(short = 'l', long, visible_alias = "gl", value_name = "GOOGLE-LINK")]
    google_link: Option<String>,

    /// File that contains the metadata for the tracks
    #[arg(short = 'm', long, visible_alias = "mf", value_name = "METADATA_FILE")]
    metadata_file: Option<PathBuf>,

    /// Folder the tracks are written to, created if it does not exist
    #[arg(short, long, value_name = "OUTPUT_FOLDER")]
    output_folder: Option<PathBuf>,

    /// Used as file extension, ffmpeg derives the audio codec from it
    #[arg(short, long, default_value = "mp3")]
    format: String,

    /// Separates chapter/part names from the timestamps in the metadata file
    #[arg(short = 's', long, visible_alias = "cs", default_value_t = '|')]
    chapter_separator: char,

    /// Characters that may not show up in generated file names
    #[arg(short, long, visible_alias = "bc", num_args = 1.., default_values_t = ['/'])]
    banned_characters: Vec<char>,

    /// Limit the number of files exported per run (0 exports all)
    #[arg(short, long, default_value_t = 0)]
    export_only: usize,

    /// Do not prepend part names to chapter names
    #[arg(short = 'p', long, visible_alias = "dpp")]
    dont_prepend_partnames: bool,

    /// Override existing output files
    #[arg(short = 'y', long, visible_alias = "of")]
    override_output: bool,

    /// Do not skip existing output files, combine with --override-output to replace them
    #[arg(short = 'k', long, visible_alias = "ds")]
    dont_skip_existing: bool,

    /// Print debug messages
    #[arg(short, long)]
    debug: bool,

    /// Do not write title and track metadata to exported files
    #[arg(short = 'n', long, visible_alias = "nm")]
    no_metadata: bool,

    /// Ignore local metadata (only with --google-id or --google-link)
    #[arg(short = 'r', long, visible_alias = "nr")]
    no_resume: bool,

    /// Print the chapter list as JSON instead of exporting, nothing is saved
    #[arg(long)]
    list: bool,
}

impl Cli {
    fn source(&self) -> Option<ChapterSource> {
        if let Some(id) = &self.google_id {
            Some(ChapterSource::GoogleId(id.clone()))
        } else if let Some(link) = &self.google_link {
            Some(ChapterSource::GoogleLink(link.clone()))
        } else {
            self.metadata_file.clone().map(ChapterSource::MetadataFile)
        }
    }

    fn config(&self) -> Config {
        Config {
            separator: self.chapter_separator,
            banned_characters: self.banned_characters.clone(),
            prepend_part_names: !self.dont_prepend_partnames,
        }
    }

    fn export_options(&self) -> ExportOptions {
        ExportOptions {
            format: self.format.clone(),
            export_only: self.export_only,
            override_output: self.override_output,
            dont_skip_existing: self.dont_skip_existing,
            no_metadata: self.no_metadata,
            no_resume: self.no_resume,
            list_only: self.list,
        }
    }
}

fn init_logger(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .format_target(false)
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if !cli.list && !cli.audio_file.is_file() {
        anyhow::bail!("AUDIO_FILE: {} doesn't exist.", cli.audio_file.display());
    }

    let source = cli
        .source()
        .context("one of --google-id, --google-link or --metadata-file is required")?;
    let config = cli.config();
    let options = cli.export_options();
    let output_folder = match &cli.output_folder {
        Some(folder) => folder.clone(),
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };

    let fetcher = HttpPageFetcher::new()?;
    let resolved = resolve_chapters(&source, &output_folder, &options, &config, &fetcher)
        .context("Error in reading the metadata or parsing the google page")?;

    if cli.list {
        let listing = serde_json::json!({
            "header": resolved.header,
            "chapters": resolved.chapters,
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }
    log::debug!("\n{}", resolved.chapters.to_listing());

    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = Arc::clone(&interrupt);
        ctrlc::set_handler(move || interrupt.store(true, Ordering::SeqCst))
            .context("Failed to install the Ctrl-C handler")?;
    }

    let transcoder = FfmpegTranscoder::default();
    export_chapters(
        &resolved.chapters,
        &cli.audio_file,
        &resolved.export_folder,
        &options,
        &config,
        &transcoder,
        &interrupt,
    )?;

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.debug);

    if let Err(e) = run(cli) {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
