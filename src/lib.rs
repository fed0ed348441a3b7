/*

Chapter timestamps for audiobooks, scraped from a Google Play Books listen
page or read from a local metadata file, then cut out of one recording
with ffmpeg.

# Automatically created using timestamper
# Source: https://play.google.com/books/listen?id=AQAAAEBsuD74QM
# @title|My Book
Intro|0|10
Part 1: Chapter 1|10|
*/

pub mod chapters;
pub mod config;
pub mod duration;
pub mod error;
pub mod export;
pub mod file;
pub mod metadata;
pub mod page;
pub mod reconcile;
pub mod script;
pub mod transcode;

pub use chapters::{ChapterRecord, Chapters, MetadataHeader, Timestamp};
pub use config::Config;
pub use error::{Result, TimestamperError};
