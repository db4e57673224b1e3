// Run orchestration: resolve -> fetch -> normalize -> enrich -> write

pub mod processing;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::apis::{create_adapter, FetchRequest, SourceQuery, StopReason};
use crate::app::ports::Transport;
use crate::config::Config;
use crate::error::{Result, ScraperError};
use crate::infra::http_client::ReqwestTransport;
use crate::infra::record_sink::{write_records, OutputSpec};
use crate::resolver::CountyResolver;
use crate::types::{RawItem, Record, SourceKind, SourceRecord};
use processing::enrich::{DefaultEnricher, Enricher, EnrichmentContext};
use processing::normalize::NormalizationRegistry;

/// Everything one CLI invocation asks for.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source: SourceKind,
    pub query: SourceQuery,
    /// Zero or negative fetches every page.
    pub limit: i64,
    pub out: PathBuf,
    pub deadline: Option<Duration>,
    /// Write whatever was accumulated when an adapter aborts.
    pub keep_partial: bool,
    pub enrich: bool,
}

impl RunOptions {
    pub fn new(source: SourceKind, out: impl Into<PathBuf>) -> Self {
        Self {
            source,
            query: SourceQuery::default(),
            limit: 200,
            out: out.into(),
            deadline: None,
            keep_partial: false,
            enrich: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub source: SourceKind,
    /// Schema version shared by every record of the run.
    pub schema_version: u32,
    pub records: usize,
    pub pages: usize,
    pub stop: StopReason,
    pub output: PathBuf,
}

/// A failed run. `written` is set when partial records were still saved.
#[derive(Debug)]
pub struct RunFailure {
    pub source: SourceKind,
    pub error: ScraperError,
    pub written: Option<usize>,
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed for {}: {}", self.error.stage(), self.source, self.error)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub struct Pipeline {
    config: Config,
    transport: Arc<dyn Transport>,
    registry: NormalizationRegistry,
    enricher: Box<dyn Enricher>,
}

impl Pipeline {
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            registry: NormalizationRegistry::new(),
            enricher: Box::new(DefaultEnricher::new()),
        }
    }

    /// Pipeline over the real network transport.
    pub fn from_config(config: Config) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.transport)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    #[instrument(skip(self, options), fields(source = %options.source, out = %options.out.display()))]
    pub async fn run(&self, options: &RunOptions) -> std::result::Result<RunSummary, RunFailure> {
        let fail = |error: ScraperError| RunFailure {
            source: options.source,
            error,
            written: None,
        };

        // Output format is checked before any request goes out.
        let spec = OutputSpec::from_path(&options.out).map_err(fail)?;

        let resolver = CountyResolver::with_overrides(&self.config.counties);
        let adapter = create_adapter(
            options.source,
            &options.query,
            &self.config,
            &resolver,
            self.transport.clone(),
        )
        .map_err(fail)?;

        let mut request = FetchRequest::with_limit(options.limit);
        if let Some(deadline) = options.deadline {
            request = request.until(Instant::now() + deadline);
        }

        let started = Instant::now();
        let outcome = adapter.fetch(&request).await;
        histogram!("park_scraper_fetch_duration_seconds", "source" => options.source.as_str())
            .record(started.elapsed().as_secs_f64());

        let pages = outcome.pages;
        let stop = outcome.stop;
        let fetch_error = outcome.error;
        let tagged = self.process(options.source, &outcome.items, options.enrich).map_err(fail)?;
        let schema_version = tagged
            .first()
            .map_or_else(|| options.source.schema_version(), |r| r.schema_version);
        let records: Vec<Record> = tagged.into_iter().map(|r| r.record).collect();

        if let Some(error) = fetch_error {
            if options.keep_partial && !records.is_empty() {
                warn!(records = records.len(), error = %error, "Run aborted, writing partial records");
                write_records(&records, &spec).map_err(fail)?;
                return Err(RunFailure {
                    source: options.source,
                    error,
                    written: Some(records.len()),
                });
            }
            return Err(fail(error));
        }

        write_records(&records, &spec).map_err(fail)?;
        counter!("park_scraper_records_total", "source" => options.source.as_str())
            .increment(records.len() as u64);
        info!(records = records.len(), pages, ?stop, schema_version, "Run complete");

        Ok(RunSummary {
            source: options.source,
            schema_version,
            records: records.len(),
            pages,
            stop,
            output: spec.path,
        })
    }

    /// Normalizes (and optionally enriches) raw items, keeping their order and
    /// the source tag each record was normalized under.
    pub fn process(&self, kind: SourceKind, items: &[RawItem], enrich: bool) -> Result<Vec<SourceRecord>> {
        let mut normalized = self.registry.normalize_all(kind, items)?;
        if enrich {
            for (source_record, raw) in normalized.iter_mut().zip(items) {
                let context = EnrichmentContext::from_raw(raw, kind);
                self.enricher.enrich(&mut source_record.record, &context);
            }
        }
        Ok(normalized)
    }
}
