//! Crawl controller - main crawl orchestration logic
//!
//! The controller drives the traversal as one coordination loop: it claims
//! URLs from the frontier, spawns fetches into a bounded in-flight pool, and
//! consumes fetch-completion events from an mpsc channel. All frontier and
//! assembler mutation happens on this task; fetch tasks only perform the
//! network request and send their result back. This keeps the state machine
//! single-writer and makes every transition observable in one place.

use crate::config::Config;
use crate::crawler::assembler::StoryAssembler;
use crate::crawler::extractor::{extract, ExtractedPage, StoryPageContent};
use crate::crawler::fetcher::{build_http_client, fetch_url, FetchResult};
use crate::crawler::frontier::Frontier;
use crate::crawler::validator::{validate, Verdict};
use crate::record::StoryRecord;
use crate::sink::RecordSink;
use crate::url::{Classifier, PageKind};
use crate::SkazError;
use reqwest::Client;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use url::Url;

/// A dispatched fetch: the URL, its classification, and the attempt number
#[derive(Debug, Clone)]
struct FetchJob {
    url: Url,
    kind: PageKind,
    attempt: u32,
}

/// Completion event sent back by a fetch task
struct FetchEvent {
    job: FetchJob,
    result: FetchResult,
}

/// What the dispatcher found when looking for work
enum Dispatch {
    /// A job whose host is ready now
    Job(FetchJob),

    /// Work exists but its host is paced until the given instant
    NotBefore(Instant),

    /// Nothing left to dispatch
    Empty,
}

/// Summary counters for one crawl run
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Pages fetched successfully
    pub pages_fetched: u64,

    /// Records accepted and handed to the sink
    pub accepted: u64,

    /// Records rejected by the validator
    pub rejected: u64,

    /// Accepted records lost to sink failures (after one retry)
    pub sink_dropped: u64,

    /// URLs abandoned after exhausting the retry budget
    pub abandoned_urls: u64,

    /// Stories still OPEN at crawl end (never finalized)
    pub incomplete_stories: u64,
}

/// Main crawl controller
pub struct Controller {
    config: Arc<Config>,
    classifier: Classifier,
    client: Client,
    frontier: Frontier,
    assembler: StoryAssembler,
    sink: Box<dyn RecordSink>,
    stop_rx: watch::Receiver<bool>,

    retries: VecDeque<FetchJob>,
    host_not_before: HashMap<String, Instant>,
    in_flight: usize,

    pages_fetched: u64,
    accepted: u64,
    rejected: u64,
    sink_dropped: u64,
    abandoned_urls: u64,
}

impl Controller {
    /// Creates a controller for one crawl run.
    ///
    /// All crawl state (frontier, assembler, counters) is owned by this
    /// instance; multiple independent runs can coexist in one process.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated run configuration
    /// * `sink` - Destination for accepted records
    /// * `stop_rx` - Watch channel for the graceful-drain stop signal
    ///
    /// # Returns
    ///
    /// * `Ok(Controller)` - Ready to run
    /// * `Err(SkazError)` - Root URL unusable or HTTP client construction failed
    pub fn new(
        config: Config,
        sink: Box<dyn RecordSink>,
        stop_rx: watch::Receiver<bool>,
    ) -> Result<Self, SkazError> {
        let classifier = Classifier::new(&config.site.root_url)?;
        let client = build_http_client(&config.user_agent, &config.crawler)?;

        Ok(Self {
            config: Arc::new(config),
            classifier,
            client,
            frontier: Frontier::new(),
            assembler: StoryAssembler::new(),
            sink,
            stop_rx,
            retries: VecDeque::new(),
            host_not_before: HashMap::new(),
            in_flight: 0,
            pages_fetched: 0,
            accepted: 0,
            rejected: 0,
            sink_dropped: 0,
            abandoned_urls: 0,
        })
    }

    /// Runs the crawl to completion.
    ///
    /// Terminates when the frontier is exhausted and no fetch is in flight,
    /// or when the stop signal fires and in-flight fetches have drained.
    /// The only fatal error is failure to obtain the root page; everything
    /// else degrades to logged, counted outcomes.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - Summary counters for the run
    /// * `Err(SkazError)` - The root page could not be fetched
    pub async fn run(&mut self) -> Result<CrawlReport, SkazError> {
        let root = self.classifier.root().clone();
        tracing::info!("Starting crawl at {}", root);

        let width = self.config.crawler.max_concurrent_fetches as usize;
        let (tx, mut rx) = mpsc::channel::<FetchEvent>(width.max(1) * 2);
        let start_time = std::time::Instant::now();

        self.frontier.offer(root, PageKind::CategoryRoot);

        let mut stop_watch_open = true;
        loop {
            let stopping = *self.stop_rx.borrow();

            let mut paced_until = None;
            if !stopping {
                while self.in_flight < width {
                    match self.next_dispatchable() {
                        Dispatch::Job(job) => self.spawn_fetch(job, &tx),
                        Dispatch::NotBefore(at) => {
                            paced_until = Some(at);
                            break;
                        }
                        Dispatch::Empty => break,
                    }
                }
            }

            if self.in_flight == 0 {
                match paced_until {
                    // All remaining work is paced; wait out the delay
                    Some(at) if !stopping => {
                        tokio::time::sleep_until(at).await;
                        continue;
                    }
                    _ => break,
                }
            }

            let event = tokio::select! {
                event = rx.recv() => event,
                changed = self.stop_rx.changed(), if stop_watch_open => {
                    match changed {
                        Ok(()) => tracing::info!("Stop requested, draining in-flight fetches"),
                        // Sender gone; no further stop can arrive
                        Err(_) => stop_watch_open = false,
                    }
                    continue;
                }
            };

            // The controller holds a sender, so the channel cannot close
            // while fetches are in flight.
            let Some(event) = event else { break };
            self.in_flight -= 1;
            self.handle_event(event)?;
        }

        self.sink.flush()?;
        self.finish(start_time.elapsed())
    }

    /// Builds the final report and logs the run summary
    fn finish(&mut self, elapsed: Duration) -> Result<CrawlReport, SkazError> {
        let open = self.assembler.open_identities();
        for id in &open {
            tracing::warn!("Story {} incomplete at crawl end, dropped", id);
        }

        let report = CrawlReport {
            pages_fetched: self.pages_fetched,
            accepted: self.accepted,
            rejected: self.rejected,
            sink_dropped: self.sink_dropped,
            abandoned_urls: self.abandoned_urls,
            incomplete_stories: open.len() as u64,
        };

        tracing::info!(
            "Crawl finished in {:?}: {} pages fetched, {} stories accepted, {} rejected, {} incomplete, {} URLs abandoned",
            elapsed,
            report.pages_fetched,
            report.accepted,
            report.rejected,
            report.incomplete_stories,
            report.abandoned_urls
        );

        Ok(report)
    }

    /// Finds the next job whose host is ready, honoring retry order,
    /// the accepted ceiling, and per-host pacing.
    fn next_dispatchable(&mut self) -> Dispatch {
        let now = Instant::now();

        if let Some(at) = self
            .retries
            .front()
            .and_then(|job| self.host_ready(&job.url, now))
        {
            return Dispatch::NotBefore(at);
        }
        if let Some(job) = self.retries.pop_front() {
            self.note_dispatch(&job.url, now);
            return Dispatch::Job(job);
        }

        loop {
            let Some(queued) = self.frontier.next() else {
                return Dispatch::Empty;
            };

            // Past the ceiling only story pages still dispatch, so claimed
            // in-flight stories can finish; category traversal is over.
            if self.ceiling_reached() && queued.kind != PageKind::StoryPage {
                tracing::debug!("Skipping {} (accepted ceiling reached)", queued.url);
                self.frontier.mark_done(&queued.url);
                continue;
            }

            match self.host_ready(&queued.url, now) {
                None => {
                    self.note_dispatch(&queued.url, now);
                    return Dispatch::Job(FetchJob {
                        url: queued.url,
                        kind: queued.kind,
                        attempt: 1,
                    });
                }
                Some(at) => {
                    self.frontier.requeue_front(queued);
                    return Dispatch::NotBefore(at);
                }
            }
        }
    }

    /// Returns the not-before instant for the URL's host, or None if ready
    fn host_ready(&self, url: &Url, now: Instant) -> Option<Instant> {
        let host = url.host_str()?;
        self.host_not_before
            .get(host)
            .filter(|at| **at > now)
            .copied()
    }

    /// Records a dispatch to the URL's host for pacing
    fn note_dispatch(&mut self, url: &Url, now: Instant) {
        if let Some(host) = url.host_str() {
            let delay = Duration::from_millis(self.config.crawler.per_host_delay_ms);
            self.host_not_before.insert(host.to_string(), now + delay);
        }
    }

    /// Spawns the fetch task for a job
    fn spawn_fetch(&mut self, job: FetchJob, tx: &mpsc::Sender<FetchEvent>) {
        tracing::debug!(
            "Dispatching {} ({}, attempt {})",
            job.url,
            job.kind,
            job.attempt
        );

        // Story pages carry the age-gate acknowledgement form
        let form = (job.kind == PageKind::StoryPage && !self.config.site.age_gate_form.is_empty())
            .then(|| self.config.site.age_gate_form.clone());

        let client = self.client.clone();
        let tx = tx.clone();
        self.in_flight += 1;

        tokio::spawn(async move {
            let result = fetch_url(&client, &job.url, form.as_ref()).await;
            // Receiver gone means the run ended; nothing to do with the result
            let _ = tx.send(FetchEvent { job, result }).await;
        });
    }

    /// Applies one fetch-completion event to the crawl state
    fn handle_event(&mut self, event: FetchEvent) -> Result<(), SkazError> {
        let FetchEvent { job, result } = event;

        match result {
            FetchResult::Success { status_code, body } => {
                self.pages_fetched += 1;
                self.frontier.mark_done(&job.url);
                tracing::debug!("Fetched {} (HTTP {})", job.url, status_code);

                self.route_page(&job, &body);

                if self.pages_fetched % 10 == 0 {
                    tracing::info!(
                        "Progress: {} pages fetched, {} queued, {} stories open, {} accepted",
                        self.pages_fetched,
                        self.frontier.queued_len(),
                        self.assembler.open_count(),
                        self.accepted
                    );
                }
                Ok(())
            }

            result if result.is_retryable()
                && job.attempt < self.config.crawler.max_fetch_retries =>
            {
                tracing::warn!(
                    "Fetch failed for {} (attempt {}/{}): {}",
                    job.url,
                    job.attempt,
                    self.config.crawler.max_fetch_retries,
                    result
                );
                self.retries.push_back(FetchJob {
                    attempt: job.attempt + 1,
                    ..job
                });
                Ok(())
            }

            result => {
                self.frontier.mark_done(&job.url);
                self.abandoned_urls += 1;
                tracing::warn!("Abandoning {} after {} attempts: {}", job.url, job.attempt, result);

                // Failure to obtain the root page is the one fatal condition
                if job.kind == PageKind::CategoryRoot {
                    return Err(SkazError::RootUnavailable {
                        url: job.url.to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Routes an extracted page by its classification
    fn route_page(&mut self, job: &FetchJob, body: &str) {
        match extract(job.kind, body, &job.url, &self.classifier) {
            ExtractedPage::CategoryRoot { category_links } => {
                tracing::info!("Root page lists {} categories", category_links.len());
                for link in category_links {
                    self.frontier.offer(link, PageKind::CategoryPage);
                }
            }

            ExtractedPage::CategoryPage {
                story_links,
                pagination_links,
            } => {
                for link in story_links {
                    if self.ceiling_reached() {
                        break;
                    }
                    let Some(page) = self.classifier.story_page(&link) else {
                        continue;
                    };
                    // Story-level dedup: a story listed by two categories
                    // (or twice in one) is claimed exactly once
                    if self.assembler.claim(&page.id) {
                        tracing::info!("Found new story: {} ({})", page.id, link);
                        self.frontier.offer(link, PageKind::StoryPage);
                    }
                }

                if !self.ceiling_reached() {
                    for link in pagination_links {
                        if self.frontier.offer(link.clone(), PageKind::CategoryPage) {
                            tracing::debug!("Following category pagination: {}", link);
                        }
                    }
                }
            }

            ExtractedPage::StoryPage(content) => self.handle_story_page(job, content),

            ExtractedPage::Ignored => {
                tracing::debug!("Ignoring unclassifiable page: {}", job.url);
            }
        }
    }

    /// Feeds one story page to the assembler and handles a finalize
    fn handle_story_page(&mut self, job: &FetchJob, content: StoryPageContent) {
        let Some(page) = self.classifier.story_page(&job.url) else {
            tracing::debug!("Story fetch without identity: {}", job.url);
            return;
        };

        let has_next = content.next_page.is_some();
        if let Some(next) = content.next_page.clone() {
            if self.frontier.offer(next.clone(), PageKind::StoryPage) {
                tracing::debug!("Following story pagination: {}", next);
            }
        }

        let page_content = content.content();
        let finalized = self.assembler.add_page(
            &page.id,
            page.sequence,
            page_content,
            content.metadata,
            job.url.as_str(),
            has_next,
        );

        if let Some(record) = finalized {
            match validate(record, self.config.crawler.min_content_length) {
                Verdict::Accepted(record) => self.accept_record(&page.id.to_string(), *record),
                Verdict::Rejected(reason) => {
                    self.rejected += 1;
                    tracing::info!("Rejected story {}: {}", page.id, reason);
                }
            }
        }
    }

    /// Hands an accepted record to the sink; one retry, then drop-and-log
    fn accept_record(&mut self, story: &str, record: StoryRecord) {
        let appended = self.sink.append(&record).or_else(|first| {
            tracing::warn!("Sink append failed for {}, retrying once: {}", story, first);
            self.sink.append(&record)
        });

        match appended {
            Ok(()) => {
                self.accepted += 1;
                tracing::info!(
                    "Accepted story #{}: {} ({} chars, {} words)",
                    self.accepted,
                    record.title,
                    record.content_length,
                    record.word_count
                );
            }
            Err(e) => {
                self.sink_dropped += 1;
                tracing::error!("Dropping record for {} after sink retry failed: {}", story, e);
            }
        }
    }

    fn ceiling_reached(&self) -> bool {
        self.accepted >= self.config.crawler.max_stories
    }
}
