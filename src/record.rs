//! Record types for assembled stories
//!
//! A [`StoryRecord`] is the unit handed to the sink: one logical story,
//! reassembled from however many pages it was split across on the site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fully assembled story, one JSONL line per record in the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    /// Story title (from the first page)
    pub title: String,

    /// Canonical URL: the first-page URL of the story
    pub url: String,

    /// Category the story was listed under
    pub category: String,

    /// Tag list from the breadcrumb block
    pub tags: Vec<String>,

    /// Publish date as shown on the page (site-local format)
    pub publish_date: String,

    /// Author name, "Anonymous" when the page does not name one
    pub author: String,

    /// Site rating, 0.0 when absent
    pub rating: f64,

    /// View counter, 0 when absent
    pub views: u64,

    /// Full story text, pages concatenated in ascending page-number order
    pub content: String,

    /// Length of `content` in characters
    pub content_length: usize,

    /// Whitespace-separated word count, computed at validation time
    pub word_count: usize,

    /// When this record was assembled and accepted
    pub scraped_at: DateTime<Utc>,
}

/// Metadata captured from the first page of a story.
///
/// Every field is optional: extraction is best-effort and a page with
/// degraded markup yields whatever could be found. Fields are merged
/// first-wins across retried deliveries of page 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryMetadata {
    pub title: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub publish_date: Option<String>,
    pub author: Option<String>,
    pub rating: Option<f64>,
    pub views: Option<u64>,
}

impl StoryMetadata {
    /// Merges `other` into `self`, keeping already-populated fields.
    ///
    /// A retry of page 1 may return degraded markup; fields captured by an
    /// earlier delivery are never overwritten by a later one.
    pub fn merge(&mut self, other: StoryMetadata) {
        if self.title.is_none() {
            self.title = other.title;
        }
        if self.category.is_none() {
            self.category = other.category;
        }
        if self.tags.is_empty() {
            self.tags = other.tags;
        }
        if self.publish_date.is_none() {
            self.publish_date = other.publish_date;
        }
        if self.author.is_none() {
            self.author = other.author;
        }
        if self.rating.is_none() {
            self.rating = other.rating;
        }
        if self.views.is_none() {
            self.views = other.views;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_metadata() -> StoryMetadata {
        StoryMetadata {
            title: Some("First title".to_string()),
            category: Some("Drama".to_string()),
            tags: vec!["one".to_string(), "two".to_string()],
            publish_date: Some("1 мая 2023".to_string()),
            author: Some("Ivan".to_string()),
            rating: Some(4.5),
            views: Some(100),
        }
    }

    #[test]
    fn test_merge_keeps_populated_fields() {
        let mut first = full_metadata();
        let degraded = StoryMetadata {
            title: Some("Degraded title".to_string()),
            author: Some("Someone else".to_string()),
            ..Default::default()
        };

        first.merge(degraded);

        assert_eq!(first.title.as_deref(), Some("First title"));
        assert_eq!(first.author.as_deref(), Some("Ivan"));
        assert_eq!(first.rating, Some(4.5));
    }

    #[test]
    fn test_merge_fills_missing_fields() {
        let mut partial = StoryMetadata {
            title: Some("Kept".to_string()),
            ..Default::default()
        };

        partial.merge(full_metadata());

        assert_eq!(partial.title.as_deref(), Some("Kept"));
        assert_eq!(partial.category.as_deref(), Some("Drama"));
        assert_eq!(partial.tags.len(), 2);
        assert_eq!(partial.views, Some(100));
    }

    #[test]
    fn test_merge_into_empty() {
        let mut empty = StoryMetadata::default();
        empty.merge(full_metadata());
        assert_eq!(empty, full_metadata());
    }
}
