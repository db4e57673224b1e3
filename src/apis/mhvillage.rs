use crate::apis::{object_items, Page, PagedSource};
use crate::app::ports::{HttpRequest, Transport};
use crate::config::DirectoryConfig;
use crate::constants::{
    browser_headers, MHVILLAGE_API_BASE, MHVILLAGE_DETAIL_INCLUDES, MHVILLAGE_SEARCH_INCLUDES,
};
use crate::error::{Result, ScraperError};
use crate::types::{RawItem, SourceKind};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// MHVillage community directory. Search pages list park keys; each key is then
/// expanded through the park detail endpoint.
pub struct MhVillageAdapter {
    transport: Arc<dyn Transport>,
    county: String,
    state: String,
    page_size: usize,
    max_offset: usize,
    fetch_details: bool,
    user_agent: String,
}

impl MhVillageAdapter {
    pub fn new(
        transport: Arc<dyn Transport>,
        county: &str,
        state: &str,
        config: &DirectoryConfig,
        user_agent: String,
    ) -> Self {
        Self {
            transport,
            county: crate::apis::county_search_text(county),
            state: state.trim().to_string(),
            page_size: config.page_size.max(1),
            max_offset: config.max_offset,
            fetch_details: config.fetch_details,
            user_agent,
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        let referer = format!(
            "https://www.mhvillage.com/parks/{}/{}-county",
            self.state.to_lowercase(),
            self.county.to_lowercase().replace(' ', "-")
        );
        let mut headers = browser_headers(&self.user_agent);
        headers.extend([
            ("referer".to_string(), referer),
            ("accept".to_string(), "application/json, text/plain, */*".to_string()),
            ("content-type".to_string(), "application/vnd.milli+json".to_string()),
        ]);
        headers
    }

    pub(crate) fn search_url(&self, offset: usize) -> Result<String> {
        let mut params: Vec<(&str, String)> = vec![
            ("county", self.county.clone()),
            ("state", self.state.clone()),
            ("offset", offset.to_string()),
            ("limit", self.page_size.to_string()),
            ("order[]", "best-match:asc".to_string()),
            ("radius", "0".to_string()),
        ];
        params.extend(MHVILLAGE_SEARCH_INCLUDES.iter().map(|i| ("include[]", i.to_string())));
        build_url("park-searches.json", &params)
    }

    pub(crate) fn detail_url(&self, key: &str) -> Result<String> {
        let mut params: Vec<(&str, String)> = vec![("order[]", "best-match:asc".to_string())];
        params.extend(MHVILLAGE_DETAIL_INCLUDES.iter().map(|i| ("include[]", i.to_string())));
        build_url(&format!("parks/{key}.json"), &params)
    }

    async fn fetch_detail(&self, key: &str) -> Result<RawItem> {
        let request = HttpRequest::get(self.detail_url(key)?).with_headers(self.headers());
        let body = self.transport.fetch(&request).await?.json()?;
        match body.get("payload") {
            Some(Value::Object(payload)) => Ok(payload.clone()),
            _ => Err(ScraperError::parse(
                format!("MHVillage park {key}"),
                "detail response has no 'payload' object",
            )),
        }
    }
}

fn build_url(path: &str, params: &[(&str, String)]) -> Result<String> {
    let base = format!("{MHVILLAGE_API_BASE}/{path}");
    Url::parse_with_params(&base, params)
        .map(String::from)
        .map_err(|e| ScraperError::Config(format!("invalid MHVillage URL '{base}': {e}")))
}

/// Park keys arrive as numbers or strings depending on the endpoint version.
fn park_key(item: &RawItem) -> Option<String> {
    match item.get("key")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

#[async_trait]
impl PagedSource for MhVillageAdapter {
    /// Zero-based page number.
    type Cursor = usize;

    fn kind(&self) -> SourceKind {
        SourceKind::MhVillage
    }

    fn first_cursor(&self) -> usize {
        0
    }

    #[instrument(skip(self), fields(county = %self.county, state = %self.state))]
    async fn fetch_page(&self, page: &usize) -> Result<Page<usize>> {
        let offset = page * self.page_size;
        let request = HttpRequest::get(self.search_url(offset)?).with_headers(self.headers());
        let body = self.transport.fetch(&request).await?.json()?;

        let items = match body.get("payload") {
            Some(Value::Array(rows)) => object_items(rows),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(ScraperError::parse(
                    "MHVillage search payload",
                    format!("expected array, got {other}"),
                ))
            }
        };
        let total = body
            .get("total")
            .and_then(|t| t.as_u64().or_else(|| t.as_str().and_then(|s| s.parse().ok())))
            .unwrap_or(0) as usize;
        debug!(offset, count = items.len(), total, "MHVillage search page parsed");

        let next_offset = offset + self.page_size;
        let exhausted = items.is_empty()
            || items.len() < self.page_size
            || (total > 0 && next_offset >= total)
            || next_offset > self.max_offset;
        Ok(Page {
            items,
            next: (!exhausted).then_some(page + 1),
        })
    }

    /// Sequential detail lookups, one per listed park, in page order.
    async fn expand(&self, items: Vec<RawItem>) -> Result<Vec<RawItem>> {
        if !self.fetch_details {
            return Ok(items);
        }
        let mut detailed = Vec::with_capacity(items.len());
        for item in items {
            match park_key(&item) {
                Some(key) => detailed.push(self.fetch_detail(&key).await?),
                None => debug!("Listing without a park key, skipping detail lookup"),
            }
        }
        Ok(detailed)
    }
}
