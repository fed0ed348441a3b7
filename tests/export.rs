//! End-to-end runs of chapter resolution and export with a fake page
//! fetcher and a transcoder that only records what it was asked to do.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::TempDir;
use timestamper::{
    ChapterRecord, Chapters, Config, Timestamp, TimestamperError,
    export::{ChapterSource, ExportOptions, export_chapters, resolve_chapters},
    metadata::{load_metadata, save_metadata},
    page::PageFetcher,
    transcode::{TranscodeRequest, Transcoder},
};

const BOOK_ID: &str = "AQAAAEBsuD74QM";

const PAGE: &str = r#"<html><head><title id="main-title">My/Book - Google Play</title></head>
<script>var _OC_contentInfo = [[[["Intro"],["Part 1","10000"],["Ch1","10000",1],["Ch2","25000",1],["Part 2","40000"],["Ch3","40000",1]]]];</script></html>"#;

struct FakeFetcher {
    page: &'static str,
    calls: Cell<usize>,
}

impl FakeFetcher {
    fn new(page: &'static str) -> Self {
        Self {
            page,
            calls: Cell::new(0),
        }
    }
}

impl PageFetcher for FakeFetcher {
    fn fetch_page(&self, url: &str) -> timestamper::Result<String> {
        assert!(url.ends_with(BOOK_ID), "unexpected url {url}");
        self.calls.set(self.calls.get() + 1);
        Ok(self.page.to_owned())
    }
}

#[derive(Default)]
struct RecordingTranscoder {
    requests: RefCell<Vec<TranscodeRequest>>,
    fail_on_track: Option<usize>,
}

impl Transcoder for RecordingTranscoder {
    fn run_transcode(&self, request: &TranscodeRequest) -> timestamper::Result<()> {
        if self.fail_on_track == Some(request.track) {
            return Err(TimestamperError::TranscodeFailed {
                command: "ffmpeg".into(),
                status: "exit status: 1".into(),
                stderr: "boom".into(),
            });
        }
        fs::write(&request.output, b"audio")?;
        self.requests.borrow_mut().push(request.clone());
        Ok(())
    }
}

fn audio_file(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("book.m4a");
    fs::write(&path, b"not really audio").unwrap();
    path
}

fn sample_chapters() -> Chapters {
    vec![
        ChapterRecord::new("Intro", 0.0, 10.0),
        ChapterRecord::new("Part 1: Ch1", 10.0, 25.0),
        ChapterRecord::new("Part 1: Ch2", 25.0, Timestamp::Open),
    ]
    .into()
}

#[test]
fn scraped_chapters_are_saved_into_title_folder() {
    let dir = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(PAGE);
    let config = Config::default();

    let resolved = resolve_chapters(
        &ChapterSource::GoogleId(BOOK_ID.into()),
        dir.path(),
        &ExportOptions::default(),
        &config,
        &fetcher,
    )
    .unwrap();

    let expected_folder = std::path::absolute(dir.path().join("MyBook")).unwrap();
    assert_eq!(resolved.export_folder, expected_folder);
    assert_eq!(resolved.header.get("title"), Some("My/Book"));
    assert_eq!(
        resolved.chapters.tokens(),
        vec![
            ("Intro".into(), "0".into(), "10".into()),
            ("Part 1: Ch1".into(), "10".into(), "25".into()),
            ("Part 1: Ch2".into(), "25".into(), "40".into()),
            ("Part 2: Ch3".into(), "40".into(), "".into()),
        ]
    );

    let saved = expected_folder.join(format!("{BOOK_ID}.txt"));
    let text = fs::read_to_string(&saved).unwrap();
    assert!(text.starts_with("# Automatically created using timestamper\n"));
    assert!(text.contains(&format!("# Source: https://play.google.com/books/listen?id={BOOK_ID}\n")));

    let (chapters, header) = load_metadata(&saved, &config).unwrap();
    assert_eq!(chapters.tokens(), resolved.chapters.tokens());
    assert_eq!(header, resolved.header);
}

#[test]
fn local_metadata_is_resumed_unless_disabled() {
    let dir = TempDir::new().unwrap();
    let config = Config::default();
    let link = format!("https://play.google.com/books/listen?id={BOOK_ID}");
    save_metadata(
        dir.path().join(format!("{BOOK_ID}.txt")),
        &sample_chapters(),
        &Default::default(),
        Some(link.as_str()),
        &config,
    )
    .unwrap();

    let fetcher = FakeFetcher::new(PAGE);
    let resolved = resolve_chapters(
        &ChapterSource::GoogleLink(link.clone()),
        dir.path(),
        &ExportOptions::default(),
        &config,
        &fetcher,
    )
    .unwrap();
    assert_eq!(fetcher.calls.get(), 0);
    assert_eq!(resolved.chapters.tokens(), sample_chapters().tokens());

    let options = ExportOptions {
        no_resume: true,
        ..ExportOptions::default()
    };
    let resolved = resolve_chapters(
        &ChapterSource::GoogleLink(link),
        dir.path(),
        &options,
        &config,
        &fetcher,
    )
    .unwrap();
    assert_eq!(fetcher.calls.get(), 1);
    assert_eq!(resolved.chapters.num_chapters(), 4);
}

#[test]
fn second_run_resumes_from_title_folder() {
    let dir = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(PAGE);
    let config = Config::default();
    let source = ChapterSource::GoogleId(BOOK_ID.into());

    let first = resolve_chapters(&source, dir.path(), &ExportOptions::default(), &config, &fetcher).unwrap();
    let second = resolve_chapters(&source, dir.path(), &ExportOptions::default(), &config, &fetcher).unwrap();

    assert_eq!(fetcher.calls.get(), 1);
    assert_eq!(second.export_folder, first.export_folder);
    assert_eq!(second.chapters.tokens(), first.chapters.tokens());
    assert_eq!(second.header, first.header);
}

#[test]
fn listing_saves_nothing() {
    let dir = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(PAGE);
    let options = ExportOptions {
        list_only: true,
        ..ExportOptions::default()
    };

    let resolved = resolve_chapters(
        &ChapterSource::GoogleId(BOOK_ID.into()),
        dir.path(),
        &options,
        &Config::default(),
        &fetcher,
    )
    .unwrap();

    assert_eq!(resolved.chapters.num_chapters(), 4);
    assert!(!resolved.export_folder.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[cfg(unix)]
#[test]
fn unreadable_saved_metadata_is_fetched_again() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let config = Config::default();
    let saved = dir.path().join(format!("{BOOK_ID}.txt"));
    save_metadata(&saved, &sample_chapters(), &Default::default(), None, &config).unwrap();
    fs::set_permissions(&saved, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&saved).is_ok() {
        // permission bits are not enforced for this user (root)
        return;
    }

    let fetcher = FakeFetcher::new(PAGE);
    let resolved = resolve_chapters(
        &ChapterSource::GoogleId(BOOK_ID.into()),
        dir.path(),
        &ExportOptions::default(),
        &config,
        &fetcher,
    )
    .unwrap();

    assert_eq!(fetcher.calls.get(), 1);
    assert_eq!(resolved.chapters.num_chapters(), 4);
}

#[test]
fn malformed_local_metadata_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chapters.txt");
    fs::write(&path, "# @title|Book\nIntro|0|10\nbroken line\n").unwrap();

    let result = resolve_chapters(
        &ChapterSource::MetadataFile(path),
        dir.path(),
        &ExportOptions::default(),
        &Config::default(),
        &FakeFetcher::new(PAGE),
    );
    assert!(matches!(
        result,
        Err(TimestamperError::MalformedChapterLine { line_number: 3, .. })
    ));
}

#[test]
fn empty_metadata_file_has_nothing_to_export() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chapters.txt");
    fs::write(&path, "# Automatically created using timestamper\n").unwrap();

    let result = resolve_chapters(
        &ChapterSource::MetadataFile(path),
        dir.path(),
        &ExportOptions::default(),
        &Config::default(),
        &FakeFetcher::new(PAGE),
    );
    assert!(matches!(result, Err(TimestamperError::NoChaptersExtracted)));
}

#[test]
fn invalid_link_is_rejected_before_fetching() {
    let dir = TempDir::new().unwrap();
    let fetcher = FakeFetcher::new(PAGE);
    let result = resolve_chapters(
        &ChapterSource::GoogleLink("https://play.google.com/books/listen".into()),
        dir.path(),
        &ExportOptions::default(),
        &Config::default(),
        &fetcher,
    );
    assert!(matches!(result, Err(TimestamperError::InvalidLink(_))));
    assert_eq!(fetcher.calls.get(), 0);
}

#[test]
fn exports_every_chapter_in_order() {
    let dir = TempDir::new().unwrap();
    let audio = audio_file(dir.path());
    let transcoder = RecordingTranscoder::default();

    let summary = export_chapters(
        &sample_chapters(),
        &audio,
        dir.path(),
        &ExportOptions::default(),
        &Config::default(),
        &transcoder,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(summary.exported, 3);
    assert_eq!(summary.skipped, 0);
    assert!(!summary.interrupted);

    let requests = transcoder.requests.borrow();
    let names: Vec<_> = requests
        .iter()
        .map(|r| r.output.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["1. Intro.mp3", "2. Part 1: Ch1.mp3", "3. Part 1: Ch2.mp3"]);
    assert_eq!(requests[1].start, Timestamp::Seconds(10.0));
    assert_eq!(requests[1].end, Timestamp::Seconds(25.0));
    assert!(requests[2].end.is_open());
    assert!(requests.iter().all(|r| r.write_metadata && !r.overwrite));
    assert_eq!(requests[2].track, 3);
}

#[test]
fn existing_outputs_are_skipped_and_limit_is_honoured() {
    let dir = TempDir::new().unwrap();
    let audio = audio_file(dir.path());
    fs::write(dir.path().join("1. Intro.mp3"), b"done").unwrap();

    let transcoder = RecordingTranscoder::default();
    let options = ExportOptions {
        export_only: 1,
        ..ExportOptions::default()
    };
    let summary = export_chapters(
        &sample_chapters(),
        &audio,
        dir.path(),
        &options,
        &Config::default(),
        &transcoder,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(
        summary,
        timestamper::export::ExportSummary {
            exported: 1,
            skipped: 1,
            interrupted: false,
        }
    );
    assert_eq!(transcoder.requests.borrow()[0].title, "Part 1: Ch1");
}

#[test]
fn dont_skip_existing_exports_again() {
    let dir = TempDir::new().unwrap();
    let audio = audio_file(dir.path());
    fs::write(dir.path().join("1. Intro.mp3"), b"done").unwrap();

    let transcoder = RecordingTranscoder::default();
    let options = ExportOptions {
        dont_skip_existing: true,
        override_output: true,
        no_metadata: true,
        ..ExportOptions::default()
    };
    let summary = export_chapters(
        &sample_chapters(),
        &audio,
        dir.path(),
        &options,
        &Config::default(),
        &transcoder,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(summary.exported, 3);
    assert_eq!(summary.skipped, 0);
    let requests = transcoder.requests.borrow();
    assert!(requests.iter().all(|r| r.overwrite && !r.write_metadata));
}

#[test]
fn interrupt_stops_before_next_chapter() {
    let dir = TempDir::new().unwrap();
    let audio = audio_file(dir.path());
    let interrupt = AtomicBool::new(false);
    interrupt.store(true, Ordering::SeqCst);

    let transcoder = RecordingTranscoder::default();
    let summary = export_chapters(
        &sample_chapters(),
        &audio,
        dir.path(),
        &ExportOptions::default(),
        &Config::default(),
        &transcoder,
        &interrupt,
    )
    .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.exported, 0);
    assert!(transcoder.requests.borrow().is_empty());
}

#[test]
fn transcoder_failure_aborts_export() {
    let dir = TempDir::new().unwrap();
    let audio = audio_file(dir.path());
    let transcoder = RecordingTranscoder {
        fail_on_track: Some(2),
        ..RecordingTranscoder::default()
    };

    let result = export_chapters(
        &sample_chapters(),
        &audio,
        dir.path(),
        &ExportOptions::default(),
        &Config::default(),
        &transcoder,
        &AtomicBool::new(false),
    );

    assert!(matches!(result, Err(TimestamperError::TranscodeFailed { .. })));
    assert_eq!(transcoder.requests.borrow().len(), 1);
    assert!(!dir.path().join("2. Part 1: Ch1.mp3").exists());
}

#[test]
fn chapter_without_start_aborts_before_any_export() {
    let dir = TempDir::new().unwrap();
    let audio = audio_file(dir.path());
    let path = dir.path().join("chapters.txt");
    fs::write(&path, "Good|0|5\nA||5\n").unwrap();
    let (chapters, _) = load_metadata(&path, &Config::default()).unwrap();

    let transcoder = RecordingTranscoder::default();
    let result = export_chapters(
        &chapters,
        &audio,
        dir.path(),
        &ExportOptions::default(),
        &Config::default(),
        &transcoder,
        &AtomicBool::new(false),
    );

    assert!(matches!(result, Err(TimestamperError::InvalidChapter(name)) if name == "A"));
    assert!(transcoder.requests.borrow().is_empty());
    assert!(!dir.path().join("1. Good.mp3").exists());
}

#[test]
fn missing_audio_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let result = export_chapters(
        &sample_chapters(),
        &dir.path().join("missing.m4a"),
        dir.path(),
        &ExportOptions::default(),
        &Config::default(),
        &RecordingTranscoder::default(),
        &AtomicBool::new(false),
    );
    assert!(matches!(result, Err(TimestamperError::SourceNotFound(_))));
}
