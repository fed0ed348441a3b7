//! Google Play Books listen pages: links, fetching and scraping.

use std::time::Duration;

use regex::{Captures, Regex};
use reqwest::blocking::Client;
use url::Url;

use crate::{
    chapters::{Chapters, MetadataHeader},
    config::Config,
    error::{Result, TimestamperError},
    reconcile::{entries_from_script, reconcile},
    script::extract_content_info,
};

pub const GOOGLE_LINK: &str = "https://play.google.com/books/listen";
const TITLE_PATTERN: &str = r#"<title id="main-title">(.*) - Google Play</title>"#;

const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
const HTTP_REQUEST_TIMEOUT_SECS: u64 = 60;

pub fn google_link(id: &str) -> String {
    format!("{GOOGLE_LINK}?id={id}")
}

/// The `id` query parameter of a listen link, e.g. `AQAAAEBsuD74QM`.
pub fn book_id(link: &str) -> Result<String> {
    let parsed = Url::parse(link).map_err(|_| TimestamperError::InvalidLink(link.to_owned()))?;
    parsed
        .query_pairs()
        .find(|(key, value)| key == "id" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| TimestamperError::InvalidLink(link.to_owned()))
}

pub trait PageFetcher {
    fn fetch_page(&self, url: &str) -> Result<String>;
}

pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("timestamper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TimestamperError::FetchFailed {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpPageFetcher {
    fn fetch_page(&self, url: &str) -> Result<String> {
        let failed = |reason: String| TimestamperError::FetchFailed {
            url: url.to_owned(),
            reason,
        };

        log::info!("Fetching {url}");
        let response = self.client.get(url).send().map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!(
                "HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown error")
            )));
        }

        response.text().map_err(|e| failed(e.to_string()))
    }
}

/// Book title from the page's `<title>` element.
pub fn extract_title(page: &str) -> Option<String> {
    let re = Regex::new(TITLE_PATTERN).ok()?;
    let caps = re.captures(page)?;
    Some(unescape_html(&caps[1]).trim().to_owned())
}

/// Resolves character references such as `&amp;` and `&#39;`. Unknown
/// entities are left untouched.
pub fn unescape_html(text: &str) -> String {
    let Ok(re) = Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);") else {
        return text.to_owned();
    };

    re.replace_all(text, |caps: &Captures| {
        let entity = &caps[1];
        let decoded = if let Some(hex) = entity
            .strip_prefix("#x")
            .or_else(|| entity.strip_prefix("#X"))
        {
            u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
        } else if let Some(dec) = entity.strip_prefix('#') {
            dec.parse::<u32>().ok().and_then(char::from_u32)
        } else {
            match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => None,
            }
        };
        decoded.map_or_else(|| caps[0].to_owned(), String::from)
    })
    .into_owned()
}

/// Scrapes chapters and the book title from a listen page.
pub fn chapters_from_page(page: &str, config: &Config) -> Result<(Chapters, MetadataHeader)> {
    let root = extract_content_info(page)?;
    let entries = entries_from_script(&root)?;
    if entries.is_empty() {
        return Err(TimestamperError::NoChaptersExtracted);
    }
    log::debug!("Found {} boundary entries", entries.len());

    let chapters = reconcile(entries, config);

    let mut header = MetadataHeader::new();
    if let Some(title) = extract_title(page) {
        header.insert("title", title);
    }

    Ok((chapters, header))
}
