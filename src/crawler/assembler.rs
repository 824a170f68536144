//! Story assembler: per-story accumulation state machine
//!
//! Stories span multiple pages that are fetched concurrently and may be
//! retried, so their pages can arrive in any order and more than once. The
//! assembler keys accumulation state by logical story identity (not by URL),
//! merges page content and metadata as deliveries arrive, and finalizes a
//! story exactly once: the page that carries no next-page link transitions
//! the story from OPEN to FINALIZED, composes the record, and drops the
//! accumulation state.

use crate::record::{StoryMetadata, StoryRecord};
use crate::url::{PageSequence, StoryId};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Fallback category when the breadcrumb block is missing
const DEFAULT_CATEGORY: &str = "Erotic";
const DEFAULT_AUTHOR: &str = "Anonymous";

/// Accumulation state for one OPEN story
#[derive(Debug)]
struct Accumulator {
    canonical_url: String,
    pages: BTreeMap<PageSequence, String>,
    metadata: Option<StoryMetadata>,
}

/// Tracks every story the crawl has claimed, accumulated, or finalized.
///
/// State per identity: OPEN (accepting pages) -> FINALIZED (terminal).
/// A story that never finalizes stays OPEN until crawl end and is reported
/// as incomplete.
#[derive(Debug, Default)]
pub struct StoryAssembler {
    claimed: HashSet<StoryId>,
    open: HashMap<StoryId, Accumulator>,
    finalized: HashSet<StoryId>,
}

impl StoryAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a story identity for fetching.
    ///
    /// Returns true exactly once per identity; a category that lists the
    /// same story twice (or two categories listing it) claim it only once.
    pub fn claim(&mut self, id: &StoryId) -> bool {
        self.claimed.insert(id.clone())
    }

    /// True if the identity has been claimed
    pub fn is_claimed(&self, id: &StoryId) -> bool {
        self.claimed.contains(id)
    }

    /// Records one delivered page of a story.
    ///
    /// Pages are keyed by their full suffix position, so a range-suffix
    /// continuation like `_1-2.html` lands in its own slot after the plain
    /// page 1 instead of replacing it. Re-delivery of the same position
    /// overwrites the stored content (idempotent under retries). Metadata
    /// from page 1 merges first-wins so a degraded retry never clobbers
    /// fields captured earlier. When `has_next_page` is false this is the
    /// last page: the story finalizes and the composed record is returned.
    /// A finalize for an already-FINALIZED identity is ignored and logged,
    /// never re-emitted.
    ///
    /// # Arguments
    ///
    /// * `id` - Logical identity shared by all pages of the story
    /// * `sequence` - The page's position within the story
    /// * `content` - Extracted text of this page
    /// * `metadata` - Metadata candidates (first page only)
    /// * `canonical_url` - URL the page was fetched from
    /// * `has_next_page` - Whether the page linked to a further page
    pub fn add_page(
        &mut self,
        id: &StoryId,
        sequence: PageSequence,
        content: String,
        metadata: Option<StoryMetadata>,
        canonical_url: &str,
        has_next_page: bool,
    ) -> Option<StoryRecord> {
        if self.finalized.contains(id) {
            if has_next_page {
                tracing::debug!("Dropping page {} for finalized story {}", sequence, id);
            } else {
                tracing::warn!("Ignoring duplicate finalize for story {}", id);
            }
            return None;
        }

        let acc = self
            .open
            .entry(id.clone())
            .or_insert_with(|| Accumulator {
                canonical_url: canonical_url.to_string(),
                pages: BTreeMap::new(),
                metadata: None,
            });

        // The canonical URL is the first-page URL, whichever order pages land in
        if sequence.is_first() {
            acc.canonical_url = canonical_url.to_string();
        }

        acc.pages.insert(sequence, content);

        if let Some(incoming) = metadata {
            match &mut acc.metadata {
                Some(existing) => existing.merge(incoming),
                None => acc.metadata = Some(incoming),
            }
        }

        if has_next_page {
            return None;
        }

        // Last page: one-way transition to FINALIZED
        let acc = self.open.remove(id)?;
        self.finalized.insert(id.clone());

        let page_count = acc.pages.len();
        let record = compose_record(acc);
        tracing::info!(
            "Finalized story {} ({} pages, {} chars)",
            id,
            page_count,
            record.content_length
        );
        Some(record)
    }

    /// Number of stories still accepting pages
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Identities still OPEN; reported as incomplete at crawl end
    pub fn open_identities(&self) -> Vec<StoryId> {
        let mut ids: Vec<StoryId> = self.open.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of finalized stories
    pub fn finalized_count(&self) -> usize {
        self.finalized.len()
    }
}

/// Composes the record from accumulated pages, strictly in ascending
/// page-position order regardless of arrival order.
fn compose_record(acc: Accumulator) -> StoryRecord {
    let content = acc
        .pages
        .values()
        .filter(|page| !page.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n");
    let content_length = content.chars().count();

    let metadata = acc.metadata.unwrap_or_default();

    StoryRecord {
        title: metadata.title.unwrap_or_default(),
        url: acc.canonical_url,
        category: metadata
            .category
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        tags: metadata.tags,
        publish_date: metadata
            .publish_date
            .unwrap_or_else(|| Utc::now().to_rfc3339()),
        author: metadata.author.unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        rating: metadata.rating.unwrap_or(0.0),
        views: metadata.views.unwrap_or(0),
        content,
        content_length,
        word_count: 0, // stamped by the validator on accept
        scraped_at: Utc::now(),
    }
}
