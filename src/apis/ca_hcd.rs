use crate::apis::{object_items, Page, PagedSource};
use crate::app::ports::{HttpRequest, Transport};
use crate::config::RegistryConfig;
use crate::constants::{
    same_origin_post_headers, CA_HCD_APP_MARKUP, CA_HCD_AURA_URL, CA_HCD_CONTROLLER, CA_HCD_FWUID,
    CA_HCD_ORIGIN, CA_HCD_PAGE_URI, CA_HCD_REFERER,
};
use crate::error::{Result, ScraperError};
use crate::types::{RawItem, SourceKind};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

/// CA HCD mobile home park registry, queried through the Salesforce Aura endpoint
/// behind the public park search page.
pub struct CaHcdAdapter {
    transport: Arc<dyn Transport>,
    county_code: u32,
    page_size: usize,
    user_agent: String,
}

impl CaHcdAdapter {
    pub fn new(
        transport: Arc<dyn Transport>,
        county_code: u32,
        config: &RegistryConfig,
        user_agent: String,
    ) -> Self {
        Self {
            transport,
            county_code,
            page_size: config.page_size.max(1),
            user_agent,
        }
    }

    fn search_request(&self, offset: usize) -> HttpRequest {
        let search_params = json!({
            "parkstatus": "All",
            "county": self.county_code.to_string(),
            "city": "All Cities",
            "offset": offset,
            "pageSize": self.page_size,
        });
        let message = json!({
            "actions": [{
                "id": "148;a",
                "descriptor": "aura://ApexActionController/ACTION$execute",
                "callingDescriptor": "UNKNOWN",
                "params": {
                    "namespace": "",
                    "classname": CA_HCD_CONTROLLER,
                    "method": "getSearchResults",
                    "params": { "searchParams": search_params.to_string() },
                    "cacheable": false,
                    "isContinuation": false,
                },
            }]
        });
        let context = json!({
            "mode": "PROD",
            "fwuid": CA_HCD_FWUID,
            "app": "siteforce:communityApp",
            "loaded": { "APPLICATION@markup://siteforce:communityApp": CA_HCD_APP_MARKUP },
            "dn": [],
            "globals": {},
            "uad": true,
        });
        let form = vec![
            ("message".to_string(), message.to_string()),
            ("aura.context".to_string(), context.to_string()),
            ("aura.pageURI".to_string(), CA_HCD_PAGE_URI.to_string()),
            ("aura.token".to_string(), "null".to_string()),
        ];
        let mut headers = same_origin_post_headers(&self.user_agent, CA_HCD_ORIGIN, CA_HCD_REFERER);
        if let Some(accept) = headers.iter_mut().find(|(k, _)| k == "accept") {
            accept.1 = "*/*".to_string();
        }
        HttpRequest::post_form(CA_HCD_AURA_URL, form).with_headers(headers)
    }
}

/// Finds `queryResults` in an Aura response. The list sits under
/// `actions[].returnValue`, sometimes wrapped in a second `returnValue`.
pub fn extract_query_results(body: &Value) -> Result<Vec<RawItem>> {
    let actions = body
        .get("actions")
        .and_then(Value::as_array)
        .ok_or_else(|| ScraperError::parse("CA HCD response", "missing 'actions' array"))?;

    for action in actions {
        if action.get("state").and_then(Value::as_str) == Some("ERROR") {
            let detail = action
                .get("error")
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown Apex error".to_string());
            return Err(ScraperError::parse("CA HCD action", detail));
        }
        let Some(outer) = action.get("returnValue").filter(|v| v.is_object()) else {
            continue;
        };
        let inner = outer
            .get("returnValue")
            .filter(|v| v.is_object())
            .unwrap_or(outer);
        match inner.get("queryResults") {
            Some(Value::Array(rows)) => return Ok(object_items(rows)),
            Some(Value::Null) => return Ok(Vec::new()),
            Some(other) => {
                return Err(ScraperError::parse(
                    "CA HCD queryResults",
                    format!("expected array, got {other}"),
                ))
            }
            None => continue,
        }
    }
    Ok(Vec::new())
}

#[async_trait]
impl PagedSource for CaHcdAdapter {
    type Cursor = usize;

    fn kind(&self) -> SourceKind {
        SourceKind::CaHcd
    }

    fn first_cursor(&self) -> usize {
        0
    }

    #[instrument(skip(self), fields(county_code = self.county_code))]
    async fn fetch_page(&self, offset: &usize) -> Result<Page<usize>> {
        let response = self.transport.fetch(&self.search_request(*offset)).await?;
        let items = extract_query_results(&response.json()?)?;
        debug!(count = items.len(), "CA HCD page parsed");

        // A page larger than requested means the portal ignored paging and sent everything.
        let next = (items.len() == self.page_size).then_some(offset + self.page_size);
        Ok(Page { items, next })
    }
}
