use crate::apis::{county_search_text, object_items, Page, PagedSource};
use crate::app::ports::{HttpRequest, Transport};
use crate::config::AssessorConfig;
use crate::constants::{
    same_origin_post_headers, RIVCOVIEW_DATA_URL, RIVCOVIEW_DETAIL_FIELD, RIVCOVIEW_ORIGIN,
    RIVCOVIEW_QTYPE, RIVCOVIEW_SEARCH_FIELD,
};
use crate::error::{Result, ScraperError};
use crate::types::{RawItem, SourceKind};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Riverside County assessor portal. Search rows carry the parcel number (`apn`);
/// sales and assessment history only come back from a per-parcel detail query.
pub struct RivCoViewAdapter {
    transport: Arc<dyn Transport>,
    search_value: String,
    page_size: usize,
    concurrency: usize,
    user_agent: String,
}

impl RivCoViewAdapter {
    pub fn new(
        transport: Arc<dyn Transport>,
        county: &str,
        config: &AssessorConfig,
        user_agent: String,
    ) -> Self {
        Self {
            transport,
            search_value: county_search_text(county),
            page_size: config.page_size.max(1),
            concurrency: config.effective_concurrency(),
            user_agent,
        }
    }

    fn request(&self, form: Vec<(String, String)>) -> HttpRequest {
        let referer = format!("{RIVCOVIEW_ORIGIN}/");
        let mut headers = same_origin_post_headers(&self.user_agent, RIVCOVIEW_ORIGIN, &referer);
        headers.push(("x-requested-with".to_string(), "XMLHttpRequest".to_string()));
        headers.push(("cookie".to_string(), "surveym_link=1".to_string()));
        HttpRequest::post_form(RIVCOVIEW_DATA_URL, form).with_headers(headers)
    }

    fn search_request(&self, page: u32) -> HttpRequest {
        self.request(vec![
            ("qtype".to_string(), RIVCOVIEW_QTYPE.to_string()),
            ("field".to_string(), RIVCOVIEW_SEARCH_FIELD.to_string()),
            ("value".to_string(), self.search_value.clone()),
            ("page".to_string(), page.to_string()),
            ("rows".to_string(), self.page_size.to_string()),
        ])
    }

    fn detail_request(&self, apn: &str) -> HttpRequest {
        self.request(vec![
            ("qtype".to_string(), RIVCOVIEW_QTYPE.to_string()),
            ("field".to_string(), RIVCOVIEW_DETAIL_FIELD.to_string()),
            ("value".to_string(), apn.to_string()),
        ])
    }

    async fn fetch_detail(&self, row: RawItem) -> Result<RawItem> {
        let Some(apn) = apn_of(&row) else {
            return Ok(row);
        };
        let body = self.transport.fetch(&self.detail_request(&apn)).await?.json()?;
        debug!(%apn, "Parcel detail fetched");
        Ok(merge_detail(row, &body))
    }
}

fn apn_of(row: &RawItem) -> Option<String> {
    match row.get("apn")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// Lays the detail fields over the search row; detail values win. A detail that
/// comes back as a list contributes each of its objects in order.
pub fn merge_detail(mut row: RawItem, detail: &Value) -> RawItem {
    let situs_city = row.get("situs_city").cloned();
    let parts: Vec<&serde_json::Map<String, Value>> = match detail {
        Value::Object(map) => vec![map],
        Value::Array(list) => list.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    };
    for part in parts {
        for (key, value) in part {
            row.insert(key.clone(), value.clone());
        }
    }
    if is_blank(row.get("city")) {
        if let Some(city) = situs_city.filter(|c| !is_blank(Some(c))) {
            row.insert("city".to_string(), city);
        }
    }
    row
}

/// jqGrid reports `total` as the number of pages, sometimes as a string.
fn total_pages(body: &Value) -> Option<u32> {
    let total = body.get("total")?;
    total
        .as_u64()
        .or_else(|| total.as_str().and_then(|s| s.trim().parse().ok()))
        .and_then(|t| u32::try_from(t).ok())
}

#[async_trait]
impl PagedSource for RivCoViewAdapter {
    /// One-based jqGrid page.
    type Cursor = u32;

    fn kind(&self) -> SourceKind {
        SourceKind::RivCoView
    }

    fn first_cursor(&self) -> u32 {
        1
    }

    #[instrument(skip(self), fields(value = %self.search_value))]
    async fn fetch_page(&self, page: &u32) -> Result<Page<u32>> {
        let body = self.transport.fetch(&self.search_request(*page)).await?.json()?;
        let rows = match body.get("rows") {
            Some(Value::Array(rows)) => object_items(rows),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(ScraperError::parse(
                    "RivCoView search rows",
                    format!("expected array, got {other}"),
                ))
            }
        };
        let returned = rows.len();
        let items: Vec<RawItem> = rows.into_iter().filter(|r| apn_of(r).is_some()).collect();
        let pages = total_pages(&body);
        debug!(page, returned, kept = items.len(), ?pages, "RivCoView search page parsed");

        let exhausted = returned == 0
            || returned < self.page_size
            || pages.is_some_and(|total| *page >= total);
        Ok(Page {
            items,
            next: (!exhausted).then_some(page + 1),
        })
    }

    /// Detail lookups run on a bounded pool; `buffered` yields results in input order.
    async fn expand(&self, items: Vec<RawItem>) -> Result<Vec<RawItem>> {
        stream::iter(items)
            .map(|row| self.fetch_detail(row))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}
