//! Crawl frontier: discovered URLs and their visit state
//!
//! The frontier is the single URL-level deduplication point. `offer` claims
//! a URL exactly once; re-discovery of an already-seen URL is a no-op. All
//! mutation happens on the controller task, so no internal locking is
//! needed.

use crate::url::PageKind;
use std::collections::{HashMap, VecDeque};
use url::Url;

/// Visit state of a claimed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    /// Claimed, waiting to be dispatched
    Queued,

    /// Dispatched, fetch not yet resolved
    InFlight,

    /// Fetch resolved (processed, abandoned, or skipped)
    Done,
}

/// A URL ready for dispatch
#[derive(Debug, Clone)]
pub struct QueuedUrl {
    pub url: Url,
    pub kind: PageKind,
}

/// Discovered-and-claimed URLs plus their traversal state
#[derive(Debug, Default)]
pub struct Frontier {
    states: HashMap<String, VisitState>,
    queue: VecDeque<QueuedUrl>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a URL for fetching.
    ///
    /// Returns true and enqueues the URL if it was previously unseen;
    /// returns false with no side effect if it was already claimed.
    pub fn offer(&mut self, url: Url, kind: PageKind) -> bool {
        let key = url.as_str().to_string();
        if self.states.contains_key(&key) {
            return false;
        }
        self.states.insert(key, VisitState::Queued);
        self.queue.push_back(QueuedUrl { url, kind });
        true
    }

    /// Takes the next queued URL and marks it in-flight
    pub fn next(&mut self) -> Option<QueuedUrl> {
        let queued = self.queue.pop_front()?;
        self.states
            .insert(queued.url.as_str().to_string(), VisitState::InFlight);
        Some(queued)
    }

    /// Returns a taken URL to the head of the queue (host pacing deferred it)
    pub fn requeue_front(&mut self, queued: QueuedUrl) {
        self.states
            .insert(queued.url.as_str().to_string(), VisitState::Queued);
        self.queue.push_front(queued);
    }

    /// Marks a dispatched URL as resolved
    pub fn mark_done(&mut self, url: &Url) {
        self.states
            .insert(url.as_str().to_string(), VisitState::Done);
    }

    /// True once no claimed URL remains queued or in flight.
    ///
    /// This is URL-level completion only. A story whose fetched pages never
    /// produced a last page stays OPEN in the assembler and is reported
    /// through `StoryAssembler::open_count`; the controller's run loop
    /// checks both before it stops.
    pub fn completed(&self) -> bool {
        self.states.values().all(|s| *s == VisitState::Done)
    }

    /// Number of URLs waiting for dispatch
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// True if the given URL has been claimed (in any state)
    pub fn contains(&self, url: &Url) -> bool {
        self.states.contains_key(url.as_str())
    }

    /// Total number of claimed URLs
    pub fn seen_count(&self) -> usize {
        self.states.len()
    }
}
