use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt::{self, Display, Write};

/// A chapter boundary as it travels between the reconciler, the metadata
/// file and the transcoder.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(into = "String")]
pub enum Timestamp {
    Seconds(f64),
    /// Token kept verbatim, either read back from a metadata file or a
    /// duration that could not be parsed.
    Raw(String),
    /// Until the end of the source.
    Open,
}

impl Timestamp {
    pub fn is_open(&self) -> bool {
        matches!(self, Timestamp::Open)
    }

    /// Only numeric timestamps can be equal, raw tokens never match anything.
    pub fn same_instant(&self, other: &Timestamp) -> bool {
        match (self, other) {
            (Timestamp::Seconds(a), Timestamp::Seconds(b)) => a == b,
            _ => false,
        }
    }

    pub fn seconds(&self) -> Option<f64> {
        match self {
            Timestamp::Seconds(v) => Some(*v),
            Timestamp::Raw(token) => token.trim().parse::<f64>().ok(),
            Timestamp::Open => None,
        }
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Seconds(v) => write!(f, "{v}"),
            Timestamp::Raw(token) => f.write_str(token),
            Timestamp::Open => Ok(()),
        }
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.to_string()
    }
}

impl From<String> for Timestamp {
    fn from(value: String) -> Self {
        Timestamp::from(value.as_str())
    }
}

impl From<&str> for Timestamp {
    fn from(value: &str) -> Self {
        let token = value.trim();
        if token.is_empty() {
            Timestamp::Open
        } else {
            Timestamp::Raw(token.to_owned())
        }
    }
}

impl From<f64> for Timestamp {
    fn from(value: f64) -> Self {
        Timestamp::Seconds(value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChapterRecord {
    pub name: String,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl ChapterRecord {
    pub fn new(name: impl Into<String>, start: impl Into<Timestamp>, end: impl Into<Timestamp>) -> Self {
        Self {
            name: name.into(),
            start: start.into(),
            end: end.into(),
        }
    }

    /// The record as the three text tokens written to a metadata file.
    pub fn tokens(&self) -> (String, String, String) {
        (self.name.clone(), self.start.to_string(), self.end.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Chapters {
    chapters: Vec<ChapterRecord>,
}

impl From<Vec<ChapterRecord>> for Chapters {
    fn from(chapters: Vec<ChapterRecord>) -> Self {
        Self { chapters }
    }
}

impl From<Chapters> for Vec<ChapterRecord> {
    fn from(value: Chapters) -> Self {
        value.chapters
    }
}

impl FromIterator<ChapterRecord> for Chapters {
    fn from_iter<T: IntoIterator<Item = ChapterRecord>>(iter: T) -> Self {
        Self {
            chapters: iter.into_iter().collect(),
        }
    }
}

impl Chapters {
    pub fn num_chapters(&self) -> usize {
        self.chapters.len()
    }
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
    pub fn push(&mut self, chapter: ChapterRecord) {
        self.chapters.push(chapter);
    }
    pub fn iter(&self) -> impl Iterator<Item = &ChapterRecord> {
        self.chapters.iter()
    }
    pub fn as_slice(&self) -> &[ChapterRecord] {
        &self.chapters
    }

    /// Token view of every record, handy for comparing lists regardless of
    /// whether the timestamps were parsed or read back as text.
    pub fn tokens(&self) -> Vec<(String, String, String)> {
        self.chapters.iter().map(ChapterRecord::tokens).collect()
    }

    pub fn to_listing(&self) -> String {
        let mut output = String::new();

        for chapter in self {
            let end = if chapter.end.is_open() {
                "end".to_string()
            } else {
                chapter.end.to_string()
            };
            let _ = writeln!(
                &mut output,
                "Start: {:<12} End: {:<12} Title: {}",
                chapter.start.to_string(),
                end,
                chapter.name
            );
        }

        output
    }
}

impl<'a> IntoIterator for &'a Chapters {
    type Item = &'a ChapterRecord;
    type IntoIter = std::slice::Iter<'a, ChapterRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.chapters.iter()
    }
}

impl IntoIterator for Chapters {
    type Item = ChapterRecord;
    type IntoIter = std::vec::IntoIter<ChapterRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.chapters.into_iter()
    }
}

/// Key/value pairs written above the chapter lines, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetadataHeader {
    entries: Vec<(String, String)>,
}

impl MetadataHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value in place when the key is already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataHeader {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut header = MetadataHeader::new();
        for (k, v) in iter {
            header.insert(k, v);
        }
        header
    }
}

impl Serialize for MetadataHeader {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
