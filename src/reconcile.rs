//! Folds the boundary markers of a content-info payload into an ordered,
//! non-overlapping chapter list.

use crate::{
    chapters::{ChapterRecord, Chapters, Timestamp},
    config::Config,
    duration::parse_milli,
    error::{Result, TimestamperError},
    script::{ScriptNode, chapter_nodes},
};

/// One array of the payload, classified by how many values it carries.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundaryEntry {
    /// Name for the chapter that follows, closes nothing.
    Name(String),
    /// Start of a part at a millisecond timestamp.
    Part { name: String, timestamp: String },
    /// Start of a chapter inside the current part.
    Chapter { name: String, timestamp: String },
}

impl BoundaryEntry {
    /// Three-value arrays carry the chapter name and timestamp first, the
    /// trailing value is not used.
    pub fn from_values(values: Vec<String>) -> Option<Self> {
        let mut values = values.into_iter();
        match values.len() {
            1 => Some(BoundaryEntry::Name(values.next()?)),
            2 => Some(BoundaryEntry::Part {
                name: values.next()?,
                timestamp: values.next()?,
            }),
            3 => Some(BoundaryEntry::Chapter {
                name: values.next()?,
                timestamp: values.next()?,
            }),
            _ => None,
        }
    }
}

/// Turns the chapter arrays of a parsed payload into boundary entries.
pub fn entries_from_script(root: &ScriptNode) -> Result<Vec<BoundaryEntry>> {
    let nodes = chapter_nodes(root).ok_or(TimestamperError::NoChaptersExtracted)?;

    let entries = nodes
        .iter()
        .filter_map(|node| {
            let values: Vec<String> = node
                .children()
                .iter()
                .map(|child| child.leaf_text().trim().to_owned())
                .collect();
            let count = values.len();
            let entry = BoundaryEntry::from_values(values);
            if entry.is_none() {
                log::debug!("Skipping payload entry with {count} values");
            }
            entry
        })
        .collect();

    Ok(entries)
}

struct Reconciler<'a> {
    config: &'a Config,
    current_part: Option<String>,
    pending_name: String,
    /// Start of the pending chapter, also the last recorded boundary.
    pending_start: Timestamp,
    chapters: Chapters,
}

impl<'a> Reconciler<'a> {
    fn new(config: &'a Config) -> Self {
        Self {
            config,
            current_part: None,
            pending_name: String::new(),
            pending_start: Timestamp::Seconds(0.0),
            chapters: Chapters::default(),
        }
    }

    fn apply(&mut self, entry: BoundaryEntry) {
        match entry {
            BoundaryEntry::Name(name) => self.pending_name = name,
            BoundaryEntry::Part { name, timestamp } => {
                let boundary = to_timestamp(&timestamp);
                self.current_part = Some(name.clone()).filter(|n| !n.is_empty());
                if self.advance(&boundary) {
                    self.pending_name = name;
                    self.pending_start = boundary;
                }
            }
            BoundaryEntry::Chapter { name, timestamp } => {
                let boundary = to_timestamp(&timestamp);
                self.advance(&boundary);
                self.pending_name = match &self.current_part {
                    Some(part) if self.config.prepend_part_names => format!("{part}: {name}"),
                    _ => name,
                };
                self.pending_start = boundary;
            }
        }
    }

    /// Closes the pending chapter at `boundary` unless it repeats the last
    /// recorded one. Returns whether a chapter was closed.
    fn advance(&mut self, boundary: &Timestamp) -> bool {
        if boundary.same_instant(&self.pending_start) {
            log::debug!("Merging repeated boundary at {boundary}");
            return false;
        }
        self.chapters.push(ChapterRecord {
            name: std::mem::take(&mut self.pending_name),
            start: self.pending_start.clone(),
            end: boundary.clone(),
        });
        true
    }

    fn finish(mut self) -> Chapters {
        self.chapters.push(ChapterRecord {
            name: self.pending_name,
            start: self.pending_start,
            end: Timestamp::Open,
        });
        self.chapters
    }
}

fn to_timestamp(token: &str) -> Timestamp {
    match parse_milli(token) {
        Ok(seconds) => Timestamp::Seconds(seconds),
        Err(e) => {
            log::warn!("{e}, keeping it as is");
            Timestamp::Raw(token.to_owned())
        }
    }
}

/// Folds `entries` into chapters. The last chapter always has an open end.
pub fn reconcile<I>(entries: I, config: &Config) -> Chapters
where
    I: IntoIterator<Item = BoundaryEntry>,
{
    let mut reconciler = Reconciler::new(config);
    for entry in entries {
        reconciler.apply(entry);
    }
    reconciler.finish()
}
