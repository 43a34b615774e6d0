use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("webdriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    #[error("failed to start browser session: {0}")]
    NewSession(#[from] fantoccini::error::NewSessionError),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{operation} timed out after {ms}ms")]
    Timeout { operation: String, ms: u64 },

    #[error("processing {url} exceeded the {secs}s session budget")]
    SessionTimeout { url: String, secs: u64 },

    #[error("browser session lost: {reason}")]
    SessionLost { reason: String },

    #[error("script evaluation failed: {reason}")]
    Script { reason: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifact I/O failed for {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ScraperError {
    /// Returns `true` if retrying the same target may succeed.
    ///
    /// Browser, navigation, and timeout failures are transient. Decode and
    /// artifact I/O failures would repeat identically.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            ScraperError::Deserialize { .. } | ScraperError::Io { .. }
        )
    }

    /// Returns `true` if the page session can no longer be trusted and the
    /// next attempt must open a fresh one.
    #[must_use]
    pub fn requires_new_session(&self) -> bool {
        matches!(
            self,
            ScraperError::WebDriver(_)
                | ScraperError::NewSession(_)
                | ScraperError::SessionTimeout { .. }
                | ScraperError::SessionLost { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_error() -> ScraperError {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        ScraperError::Deserialize {
            context: "state blob".to_string(),
            source,
        }
    }

    #[test]
    fn navigation_and_timeouts_are_retriable() {
        assert!(ScraperError::Navigation {
            url: "https://shop.example.com".to_string(),
            reason: "net::ERR_CONNECTION_RESET".to_string(),
        }
        .is_retriable());
        assert!(ScraperError::Timeout {
            operation: "goto".to_string(),
            ms: 60_000,
        }
        .is_retriable());
        assert!(ScraperError::SessionTimeout {
            url: "https://shop.example.com".to_string(),
            secs: 300,
        }
        .is_retriable());
    }

    #[test]
    fn decode_and_io_are_not_retriable() {
        assert!(!decode_error().is_retriable());
        assert!(!ScraperError::Io {
            context: "failed-targets.json".to_string(),
            source: std::io::Error::other("disk full"),
        }
        .is_retriable());
    }

    #[test]
    fn only_session_class_errors_force_a_new_page() {
        assert!(ScraperError::SessionLost {
            reason: "chrome not reachable".to_string(),
        }
        .requires_new_session());
        assert!(!ScraperError::Navigation {
            url: "https://shop.example.com".to_string(),
            reason: "dns".to_string(),
        }
        .requires_new_session());
        assert!(!decode_error().requires_new_session());
    }
}
