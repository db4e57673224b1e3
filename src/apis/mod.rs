//! Portal adapters and the pagination driver they share.
//!
//! Each adapter only knows how to fetch one page for a cursor and, optionally,
//! how to expand a page's items with follow-up detail requests. The driver owns
//! the `Init -> Fetching(cursor) -> Done | Failed` loop, the caller's limit and
//! deadline, and the rule that a cursor is never requested twice.

pub mod ca_hcd;
pub mod mhvillage;
pub mod rivcoview;

use crate::app::ports::Transport;
use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::resolver::CountyResolver;
use crate::types::{RawItem, SourceKind};
use async_trait::async_trait;
use metrics::counter;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use ca_hcd::CaHcdAdapter;
pub use mhvillage::MhVillageAdapter;
pub use rivcoview::RivCoViewAdapter;

/// Caller-side bounds for one adapter run.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    /// `None` fetches every available page.
    pub limit: Option<usize>,
    /// Pagination stops issuing requests once this passes.
    pub deadline: Option<Instant>,
}

impl FetchRequest {
    /// Zero or negative limits mean "no cap".
    pub fn with_limit(limit: i64) -> Self {
        Self {
            limit: usize::try_from(limit).ok().filter(|l| *l > 0),
            deadline: None,
        }
    }

    pub fn until(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterState<C> {
    Init,
    Fetching(C),
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The portal signalled the end (short page, empty page, or end marker).
    Exhausted,
    LimitReached,
    DeadlineReached,
    /// A page or detail request failed; see `FetchOutcome::error`.
    Aborted,
}

/// One page of raw items and the cursor for the following page, if any.
#[derive(Debug)]
pub struct Page<C> {
    pub items: Vec<RawItem>,
    pub next: Option<C>,
}

/// Items accumulated by a run. A failed run still carries every item gathered before the failure.
#[derive(Debug)]
pub struct FetchOutcome {
    pub items: Vec<RawItem>,
    pub pages: usize,
    pub stop: StopReason,
    pub error: Option<ScraperError>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// A portal that can be walked page by page.
#[async_trait]
pub trait PagedSource: Send + Sync {
    type Cursor: Clone + Ord + Debug + Send + Sync;

    fn kind(&self) -> SourceKind;

    fn first_cursor(&self) -> Self::Cursor;

    async fn fetch_page(&self, cursor: &Self::Cursor) -> Result<Page<Self::Cursor>>;

    /// Follow-up requests for a page's items. Output order must match input order.
    async fn expand(&self, items: Vec<RawItem>) -> Result<Vec<RawItem>> {
        Ok(items)
    }
}

/// Object-safe face of an adapter used by the pipeline.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> FetchOutcome;
}

#[async_trait]
impl<T: PagedSource> SourceAdapter for T {
    async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        paginate(self, request).await
    }
}

fn deadline_passed(request: &FetchRequest) -> bool {
    request.deadline.is_some_and(|d| Instant::now() >= d)
}

/// Drives `source` until the portal runs dry, the limit or deadline is hit, or a request fails.
pub async fn paginate<S: PagedSource + ?Sized>(source: &S, request: &FetchRequest) -> FetchOutcome {
    let kind = source.kind();
    let mut items: Vec<RawItem> = Vec::new();
    let mut pages = 0usize;
    let mut last_cursor: Option<S::Cursor> = None;
    let mut stop = StopReason::Exhausted;
    let mut error = None;
    let mut state = AdapterState::Init;

    loop {
        state = match state {
            AdapterState::Init => AdapterState::Fetching(source.first_cursor()),
            AdapterState::Fetching(cursor) => {
                if request.limit.is_some_and(|limit| items.len() >= limit) {
                    stop = StopReason::LimitReached;
                    AdapterState::Done
                } else if deadline_passed(request) {
                    stop = StopReason::DeadlineReached;
                    AdapterState::Done
                } else if last_cursor.as_ref().is_some_and(|prev| cursor <= *prev) {
                    warn!(source = %kind, ?cursor, "Cursor did not advance, stopping");
                    AdapterState::Done
                } else {
                    debug!(source = %kind, ?cursor, "Fetching page");
                    let fetched = match request.deadline {
                        Some(deadline) => {
                            match tokio::time::timeout_at(deadline, fetch_and_expand(source, &cursor, request.limit, items.len())).await {
                                Ok(r) => Some(r),
                                Err(_) => None,
                            }
                        }
                        None => Some(fetch_and_expand(source, &cursor, request.limit, items.len()).await),
                    };
                    match fetched {
                        None => {
                            info!(source = %kind, ?cursor, "Deadline reached mid-request, keeping accumulated items");
                            stop = StopReason::DeadlineReached;
                            AdapterState::Done
                        }
                        Some(Ok((page_items, next))) => {
                            pages += 1;
                            counter!("park_scraper_pages_total", "source" => kind.as_str()).increment(1);
                            debug!(source = %kind, ?cursor, count = page_items.len(), "Page fetched");
                            items.extend(page_items);
                            last_cursor = Some(cursor);
                            match next {
                                Some(next) => AdapterState::Fetching(next),
                                None => AdapterState::Done,
                            }
                        }
                        Some(Err(e)) => {
                            warn!(source = %kind, ?cursor, error = %e, "Page failed, aborting run");
                            error = Some(e);
                            stop = StopReason::Aborted;
                            AdapterState::Failed
                        }
                    }
                }
            }
            AdapterState::Done | AdapterState::Failed => break,
        };
    }

    if stop == StopReason::Exhausted && request.limit.is_some_and(|limit| items.len() >= limit) {
        stop = StopReason::LimitReached;
    }
    info!(source = %kind, pages, items = items.len(), ?stop, "Fetch finished");
    FetchOutcome {
        items,
        pages,
        stop,
        error,
    }
}

/// Fetches one page, trims it to the remaining budget, then expands what is left.
async fn fetch_and_expand<S: PagedSource + ?Sized>(
    source: &S,
    cursor: &S::Cursor,
    limit: Option<usize>,
    already: usize,
) -> Result<(Vec<RawItem>, Option<S::Cursor>)> {
    let page = source.fetch_page(cursor).await?;
    let mut page_items = page.items;
    if let Some(limit) = limit {
        page_items.truncate(limit.saturating_sub(already));
    }
    let expanded = if page_items.is_empty() {
        page_items
    } else {
        source.expand(page_items).await?
    };
    Ok((expanded, page.next))
}

/// Who to fetch, as given on the command line.
#[derive(Debug, Clone)]
pub struct SourceQuery {
    pub county: String,
    pub county_code: Option<u32>,
    pub state: String,
}

impl Default for SourceQuery {
    fn default() -> Self {
        Self {
            county: "Riverside".to_string(),
            county_code: None,
            state: "CA".to_string(),
        }
    }
}

/// Builds the adapter for `kind`. County resolution happens here, before any request.
pub fn create_adapter(
    kind: SourceKind,
    query: &SourceQuery,
    config: &Config,
    resolver: &CountyResolver,
    transport: Arc<dyn Transport>,
) -> Result<Box<dyn SourceAdapter>> {
    let user_agent = config.transport.user_agent.clone();
    let adapter: Box<dyn SourceAdapter> = match kind {
        SourceKind::CaHcd => {
            let code = resolver.resolve(&query.county, query.county_code)?;
            Box::new(CaHcdAdapter::new(transport, code, &config.registry, user_agent))
        }
        SourceKind::MhVillage => Box::new(MhVillageAdapter::new(
            transport,
            &query.county,
            &query.state,
            &config.directory,
            user_agent,
        )),
        SourceKind::RivCoView => Box::new(RivCoViewAdapter::new(
            transport,
            &query.county,
            &config.assessor,
            user_agent,
        )),
    };
    Ok(adapter)
}

/// Strips a trailing "County" so "Riverside County" and "Riverside" query alike.
pub(crate) fn county_search_text(county: &str) -> String {
    const SUFFIX: &str = " county";
    let trimmed = county.trim();
    let split = trimmed.len().saturating_sub(SUFFIX.len());
    match trimmed.get(split..) {
        Some(tail) if tail.eq_ignore_ascii_case(SUFFIX) => trimmed[..split].trim_end().to_string(),
        _ => trimmed.to_string(),
    }
}

/// Keeps JSON objects and drops anything else a portal slipped into a result list.
pub(crate) fn object_items(values: &[serde_json::Value]) -> Vec<RawItem> {
    values
        .iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-memory portal with `total` items served `page_size` at a time.
    struct NumberedSource {
        total: usize,
        page_size: usize,
        fail_at: Option<usize>,
        requests: AtomicUsize,
    }

    impl NumberedSource {
        fn new(total: usize, page_size: usize) -> Self {
            Self {
                total,
                page_size,
                fail_at: None,
                requests: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PagedSource for NumberedSource {
        type Cursor = usize;

        fn kind(&self) -> SourceKind {
            SourceKind::CaHcd
        }

        fn first_cursor(&self) -> usize {
            0
        }

        async fn fetch_page(&self, offset: &usize) -> Result<Page<usize>> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(*offset) {
                return Err(ScraperError::parse("page", "truncated body"));
            }
            let end = (*offset + self.page_size).min(self.total);
            let items: Vec<RawItem> = (*offset..end)
                .map(|i| json!({ "n": i }).as_object().cloned().unwrap())
                .collect();
            let next = (items.len() == self.page_size).then_some(offset + self.page_size);
            Ok(Page { items, next })
        }
    }

    fn numbers(outcome: &FetchOutcome) -> Vec<u64> {
        outcome.items.iter().map(|i| i["n"].as_u64().unwrap()).collect()
    }

    #[tokio::test]
    async fn no_limit_fetches_every_page() {
        let source = NumberedSource::new(25, 10);
        let outcome = source.fetch(&FetchRequest::with_limit(0)).await;
        assert_eq!(outcome.items.len(), 25);
        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.stop, StopReason::Exhausted);
        assert_eq!(numbers(&outcome), (0..25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn negative_limit_means_uncapped() {
        let source = NumberedSource::new(12, 5);
        let outcome = source.fetch(&FetchRequest::with_limit(-3)).await;
        assert_eq!(outcome.items.len(), 12);
    }

    #[tokio::test]
    async fn limit_caps_items_and_requests() {
        let source = NumberedSource::new(100, 10);
        let outcome = source.fetch(&FetchRequest::with_limit(15)).await;
        assert_eq!(outcome.items.len(), 15);
        assert_eq!(outcome.stop, StopReason::LimitReached);
        assert_eq!(source.requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exact_page_boundary_needs_one_probe() {
        let source = NumberedSource::new(20, 10);
        let outcome = source.fetch(&FetchRequest::default()).await;
        assert_eq!(outcome.items.len(), 20);
        assert_eq!(source.requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_portal_is_success() {
        let source = NumberedSource::new(0, 10);
        let outcome = source.fetch(&FetchRequest::default()).await;
        assert!(outcome.is_complete());
        assert!(outcome.items.is_empty());
        assert_eq!(outcome.pages, 1);
    }

    #[tokio::test]
    async fn failure_keeps_earlier_pages() {
        let mut source = NumberedSource::new(50, 10);
        source.fail_at = Some(20);
        let outcome = source.fetch(&FetchRequest::default()).await;
        assert_eq!(outcome.stop, StopReason::Aborted);
        assert_eq!(outcome.items.len(), 20);
        assert!(matches!(outcome.error, Some(ScraperError::Parse { .. })));
    }

    #[tokio::test]
    async fn passed_deadline_issues_no_requests() {
        let source = NumberedSource::new(50, 10);
        let request = FetchRequest::default().until(Instant::now() - Duration::from_millis(1));
        let outcome = source.fetch(&request).await;
        assert_eq!(outcome.stop, StopReason::DeadlineReached);
        assert!(outcome.items.is_empty());
        assert_eq!(source.requests.load(Ordering::SeqCst), 0);
    }

    struct StuckSource;

    #[async_trait]
    impl PagedSource for StuckSource {
        type Cursor = u32;

        fn kind(&self) -> SourceKind {
            SourceKind::MhVillage
        }

        fn first_cursor(&self) -> u32 {
            1
        }

        async fn fetch_page(&self, cursor: &u32) -> Result<Page<u32>> {
            let item = json!({ "page": cursor }).as_object().cloned().unwrap();
            Ok(Page {
                items: vec![item],
                next: Some(*cursor),
            })
        }
    }

    #[tokio::test]
    async fn repeated_cursor_is_never_requested_twice() {
        let outcome = StuckSource.fetch(&FetchRequest::default()).await;
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.pages, 1);
        assert!(outcome.is_complete());
    }

    #[test]
    fn county_search_text_drops_suffix() {
        assert_eq!(county_search_text(" Riverside County "), "Riverside");
        assert_eq!(county_search_text("San Diego"), "San Diego");
    }
}
