//! Record validation and normalization
//!
//! A pure decision over an assembled record: required fields and the
//! minimum content length are checked first, then the accepted record is
//! normalized (whitespace collapsed, markup remnants cleaned) and stamped
//! with its word count and scrape timestamp. Rejections are expected,
//! non-exceptional outcomes; logging them is the controller's job.

use crate::record::StoryRecord;
use chrono::Utc;
use std::fmt;

/// Outcome of validating an assembled record
#[derive(Debug)]
pub enum Verdict {
    /// Record passed all checks; carries the normalized record
    Accepted(Box<StoryRecord>),

    /// Record failed a check and must not reach the sink
    Rejected(RejectReason),
}

/// Why a record was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// A required field is empty; names the field
    MissingField(&'static str),

    /// Assembled content is below the configured minimum
    ContentTooShort { length: usize, minimum: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing-field: {}", field),
            Self::ContentTooShort { length, minimum } => {
                write!(f, "content-too-short: {} chars (minimum {})", length, minimum)
            }
        }
    }
}

/// Validates an assembled record against the configured minimum content
/// length, normalizing it on acceptance.
pub fn validate(record: StoryRecord, min_content_length: usize) -> Verdict {
    if record.title.trim().is_empty() {
        return Verdict::Rejected(RejectReason::MissingField("title"));
    }
    if record.url.trim().is_empty() {
        return Verdict::Rejected(RejectReason::MissingField("url"));
    }
    if record.content.trim().is_empty() {
        return Verdict::Rejected(RejectReason::MissingField("content"));
    }

    let length = record.content.chars().count();
    if length < min_content_length {
        return Verdict::Rejected(RejectReason::ContentTooShort {
            length,
            minimum: min_content_length,
        });
    }

    Verdict::Accepted(Box::new(normalize(record)))
}

/// Normalizes an accepted record: single-line fields get their whitespace
/// collapsed, content is cleaned line by line, and the word count and
/// scrape timestamp are stamped.
fn normalize(mut record: StoryRecord) -> StoryRecord {
    record.title = collapse_whitespace(&record.title);
    record.author = collapse_whitespace(&record.author);
    record.category = collapse_whitespace(&record.category);
    record.tags = record
        .tags
        .iter()
        .map(|tag| collapse_whitespace(tag))
        .filter(|tag| !tag.is_empty())
        .collect();

    record.content = clean_content(&record.content);
    record.content_length = record.content.chars().count();
    record.word_count = record.content.split_whitespace().count();
    record.scraped_at = Utc::now();

    record
}

/// Collapses runs of whitespace into single spaces and trims
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleans content line by line: trim, collapse internal runs, drop blanks.
/// Paragraph breaks between pages and fragments survive as single newlines.
fn clean_content(content: &str) -> String {
    content
        .lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
