use async_trait::async_trait;
use park_scraper::app::ports::{HttpRequest, HttpResponse, Transport};
use park_scraper::config::Config;
use park_scraper::types::SourceKind;
use park_scraper::{Pipeline, RunOptions, ScraperError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

/// Replies to every request with the same body and counts calls.
struct CountingTransport {
    body: String,
    calls: AtomicUsize,
}

impl CountingTransport {
    fn new(body: Value) -> Arc<Self> {
        Arc::new(Self {
            body: body.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn fetch(&self, request: &HttpRequest) -> park_scraper::Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HttpResponse {
            url: request.url.clone(),
            status: 200,
            body: self.body.clone().into_bytes(),
        })
    }
}

fn empty_registry_page() -> Value {
    json!({ "actions": [{ "state": "SUCCESS", "returnValue": { "queryResults": [] } }] })
}

#[tokio::test]
async fn txt_output_is_rejected_with_zero_network_calls() {
    let transport = CountingTransport::new(empty_registry_page());
    let pipeline = Pipeline::new(Config::default(), transport.clone());

    for source in [SourceKind::CaHcd, SourceKind::MhVillage, SourceKind::RivCoView] {
        let failure = pipeline
            .run(&RunOptions::new(source, "out/parks.txt"))
            .await
            .unwrap_err();
        assert!(matches!(failure.error, ScraperError::UnsupportedFormat(_)));
        assert_eq!(failure.error.stage(), "write");
    }
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn empty_registry_writes_empty_json_array() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("parks.json");
    let transport = CountingTransport::new(empty_registry_page());
    let pipeline = Pipeline::new(Config::default(), transport.clone());

    let summary = pipeline.run(&RunOptions::new(SourceKind::CaHcd, &out)).await.unwrap();

    assert_eq!(summary.records, 0);
    assert_eq!(transport.calls(), 1);
    let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written, json!([]));
}

#[tokio::test]
async fn empty_assessor_search_writes_empty_csv() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("parcels.csv");
    let transport = CountingTransport::new(json!({ "page": 0, "total": 0, "rows": [] }));
    let pipeline = Pipeline::new(Config::default(), transport);

    let summary = pipeline.run(&RunOptions::new(SourceKind::RivCoView, &out)).await.unwrap();

    assert_eq!(summary.records, 0);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "");
}

#[tokio::test]
async fn county_code_override_beats_unknown_name() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("parks.json");
    let transport = CountingTransport::new(empty_registry_page());
    let pipeline = Pipeline::new(Config::default(), transport.clone());

    let mut options = RunOptions::new(SourceKind::CaHcd, &out);
    options.query.county = "Not A County".to_string();
    options.query.county_code = Some(33);

    assert!(pipeline.run(&options).await.is_ok());
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn limit_caps_written_records() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("parks.json");
    let rows: Vec<Value> = (0..10)
        .map(|i| json!({ "PARK_NAME__c": format!("PARK {i}"), "TOTAL_NUMBER_LOTS__c": i }))
        .collect();
    let transport = CountingTransport::new(json!({
        "actions": [{ "state": "SUCCESS", "returnValue": { "queryResults": rows } }]
    }));
    let pipeline = Pipeline::new(Config::default(), transport);

    let mut options = RunOptions::new(SourceKind::CaHcd, &out);
    options.limit = 4;
    let summary = pipeline.run(&options).await.unwrap();

    assert_eq!(summary.records, 4);
    let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written[3]["Park Name"], "PARK 3");
    assert_eq!(written[3]["Total Lots"], 3);
}
