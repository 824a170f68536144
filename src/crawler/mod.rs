//! Crawl engine: frontier, fetching, extraction, assembly, validation,
//! and the controller loop that ties them together.

pub mod assembler;
pub mod controller;
pub mod extractor;
pub mod fetcher;
pub mod frontier;
pub mod validator;

pub use assembler::StoryAssembler;
pub use controller::{Controller, CrawlReport};
pub use extractor::{ExtractedPage, StoryPageContent};
pub use fetcher::FetchResult;
pub use frontier::Frontier;
pub use validator::{RejectReason, Verdict};

use crate::config::Config;
use crate::sink::JsonlSink;
use crate::Result;
use std::path::Path;
use tokio::sync::watch;

/// Runs one crawl against the configured site, appending accepted records
/// to the configured JSONL file. The stop receiver requests a graceful
/// shutdown: dispatch halts and in-flight fetches drain.
pub async fn run_crawl(config: Config, stop_rx: watch::Receiver<bool>) -> Result<CrawlReport> {
    let sink = JsonlSink::create(Path::new(&config.output.records_path))?;
    let mut controller = Controller::new(config, Box::new(sink), stop_rx)?;
    controller.run().await
}
