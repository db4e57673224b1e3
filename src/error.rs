use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("could not parse {context}: {message}")]
    Parse { context: String, message: String },

    #[error("unknown county '{0}' (pass --county-code to override)")]
    UnknownCounty(String),

    #[error("unsupported output extension '{0}', use .json or .csv")]
    UnsupportedFormat(String),

    #[error("enrichment of {field} failed: {message}")]
    Enrichment { field: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ScraperError {
    pub fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        ScraperError::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Timeouts, dropped connections, 5xx and 429 are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ScraperError::Network { .. } => true,
            ScraperError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Pipeline stage name used in the one-line user diagnostic.
    pub fn stage(&self) -> &'static str {
        match self {
            ScraperError::Network { .. } | ScraperError::Status { .. } => "fetch",
            ScraperError::Parse { .. } => "parse",
            ScraperError::UnknownCounty(_) => "resolve",
            ScraperError::Enrichment { .. } => "enrich",
            ScraperError::UnsupportedFormat(_)
            | ScraperError::Io(_)
            | ScraperError::Json(_)
            | ScraperError::Csv(_) => "write",
            ScraperError::Config(_) | ScraperError::Toml(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_transient() {
        let throttled = ScraperError::Status { url: "u".into(), status: 429 };
        let unavailable = ScraperError::Status { url: "u".into(), status: 503 };
        let forbidden = ScraperError::Status { url: "u".into(), status: 403 };
        assert!(throttled.is_transient());
        assert!(unavailable.is_transient());
        assert!(!forbidden.is_transient());
        assert!(!ScraperError::parse("page", "eof").is_transient());
    }

    #[test]
    fn stage_names_follow_error_kind() {
        assert_eq!(ScraperError::UnknownCounty("x".into()).stage(), "resolve");
        assert_eq!(ScraperError::UnsupportedFormat(".txt".into()).stage(), "write");
        assert_eq!(ScraperError::parse("body", "empty").stage(), "parse");
    }
}
