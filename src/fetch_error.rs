#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Navigation to {url} did not finish within {secs}s")]
    NavigationTimeout { url: String, secs: u64 },
    #[error("No element matching {selector} appeared within {secs}s")]
    SettleTimeout { selector: String, secs: u64 },
    #[error("No element matching {0} on page")]
    SelectorNotFound(String),
    #[error("Page session not navigated")]
    NotNavigated,
}
