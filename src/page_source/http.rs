use std::time::Duration;

use tracing::{debug, instrument};

use super::{PageSession, PageSource};
use crate::fetch_error::FetchError;

/// Plain HTTP GET; the served HTML is the final DOM
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl PageSource for HttpSource {
    type Session = HttpSession;

    async fn open(&self) -> Result<HttpSession, FetchError> {
        Ok(HttpSession {
            client: self.client.clone(),
            body: None,
        })
    }
}

pub struct HttpSession {
    client: reqwest::Client,
    body: Option<String>,
}

impl HttpSession {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!("Sending HTTP request");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        debug!("Received HTTP response with status: {}", status);

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await?;
        debug!("Retrieved HTML content, size: {} bytes", html.len());
        Ok(html)
    }
}

impl PageSession for HttpSession {
    async fn clear(&mut self) -> Result<(), FetchError> {
        self.body = None;
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        self.body = None;
        self.body = Some(self.fetch(url).await?);
        Ok(())
    }

    async fn content(&mut self) -> Result<String, FetchError> {
        self.body.clone().ok_or(FetchError::NotNavigated)
    }

    fn is_dynamic(&self) -> bool {
        false
    }

    async fn close(self) {}
}
