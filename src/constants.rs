/// Source names as accepted on the command line.
pub const CA_HCD_SOURCE: &str = "ca_hcd";
pub const MHVILLAGE_SOURCE: &str = "mhvillage";
pub const RIVCOVIEW_SOURCE: &str = "rivcoview";

pub fn get_supported_sources() -> Vec<&'static str> {
    vec![CA_HCD_SOURCE, MHVILLAGE_SOURCE, RIVCOVIEW_SOURCE]
}

// CA HCD (Salesforce community site)
pub const CA_HCD_AURA_URL: &str =
    "https://cahcd.my.site.com/s/sfsites/aura?r=4&aura.ApexAction.execute=1";
pub const CA_HCD_ORIGIN: &str = "https://cahcd.my.site.com";
pub const CA_HCD_REFERER: &str = "https://cahcd.my.site.com/s/mobilehomeparksearch";
pub const CA_HCD_PAGE_URI: &str = "/s/mobilehomeparksearch";
pub const CA_HCD_CONTROLLER: &str = "MobileHomeParksSearchController";
pub const CA_HCD_FWUID: &str =
    "eE5UbjZPdVlRT3M0d0xtOXc5MzVOQWg5TGxiTHU3MEQ5RnBMM0VzVXc1cmcxMi42MjkxNDU2LjE2Nzc3MjE2";
pub const CA_HCD_APP_MARKUP: &str = "1305_7pTC6grCTP7M16KdvDQ-Xw";

// MHVillage
pub const MHVILLAGE_API_BASE: &str = "https://www.mhvillage.com/api/v1";
pub const MHVILLAGE_SEARCH_INCLUDES: &[&str] =
    &["photos", "address", "homes-count", "state-association"];
pub const MHVILLAGE_DETAIL_INCLUDES: &[&str] = &[
    "appointment-availability",
    "photos",
    "address",
    "logo",
    "brochure",
    "homes-count",
    "site-count",
    "details",
    "phone",
    "alternate-phone",
    "state-association",
    "favorite-count",
    "lead-delivery-methods",
];

// RivCoView (Riverside County Assessor)
pub const RIVCOVIEW_DATA_URL: &str = "https://rivcoview.rivcoacr.org/data/ajaxcalls/db/getData.php";
pub const RIVCOVIEW_ORIGIN: &str = "https://rivcoview.rivcoacr.org";
pub const RIVCOVIEW_SEARCH_FIELD: &str = "mv_Location:street_address";
pub const RIVCOVIEW_DETAIL_FIELD: &str = "mv_Location:PIN";
pub const RIVCOVIEW_QTYPE: &str = "assessment_info";

/// Hard cap on the assessor detail worker pool.
pub const MAX_DETAIL_CONCURRENCY: usize = 5;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36 Edg/139.0.0.0";
pub const BROWSER_SEC_CH_UA: &str =
    "\"Not;A=Brand\";v=\"99\", \"Microsoft Edge\";v=\"139\", \"Chromium\";v=\"139\"";

/// Chromium sends client hints before accept headers; the portals' bot filters
/// look at this order, so adapters build header lists starting from here.
pub fn browser_headers(user_agent: &str) -> Vec<(String, String)> {
    vec![
        ("sec-ch-ua-platform".into(), "\"Windows\"".into()),
        ("sec-ch-ua".into(), BROWSER_SEC_CH_UA.into()),
        ("sec-ch-ua-mobile".into(), "?0".into()),
        ("user-agent".into(), user_agent.into()),
        ("accept-language".into(), "en-US,en;q=0.9".into()),
        ("cache-control".into(), "no-cache".into()),
        ("pragma".into(), "no-cache".into()),
    ]
}

/// Same-origin XHR headers shared by the two form-posting portals.
pub fn same_origin_post_headers(user_agent: &str, origin: &str, referer: &str) -> Vec<(String, String)> {
    let mut headers = browser_headers(user_agent);
    headers.extend([
        ("accept".to_string(), "application/json, text/javascript, */*; q=0.01".to_string()),
        (
            "content-type".to_string(),
            "application/x-www-form-urlencoded; charset=UTF-8".to_string(),
        ),
        ("origin".to_string(), origin.to_string()),
        ("referer".to_string(), referer.to_string()),
        ("priority".to_string(), "u=1, i".to_string()),
        ("sec-fetch-dest".to_string(), "empty".to_string()),
        ("sec-fetch-mode".to_string(), "cors".to_string()),
        ("sec-fetch-site".to_string(), "same-origin".to_string()),
    ]);
    headers
}
