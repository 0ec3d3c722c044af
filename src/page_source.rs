//! Where rendered pages come from
//!
//! A [`PageSource`] hands out [`PageSession`]s. For the browser source one
//! session is one tab, so parallel workers each get their own tab on a
//! single browser process.

pub mod browser;
pub mod http;

use std::future::Future;
use std::str::FromStr;

pub use browser::{BrowserOptions, BrowserSession, BrowserSource};
pub use http::{HttpSession, HttpSource};

use crate::fetch_error::FetchError;

pub trait PageSource: Send + Sync {
    type Session: PageSession;

    fn open(&self) -> impl Future<Output = Result<Self::Session, FetchError>> + Send;
}

pub trait PageSession: Send {
    fn navigate(&mut self, url: &str) -> impl Future<Output = Result<(), FetchError>> + Send;

    /// Reset to an empty document before the next navigation
    fn clear(&mut self) -> impl Future<Output = Result<(), FetchError>> + Send {
        async { Ok(()) }
    }

    /// Current DOM serialised as HTML
    fn content(&mut self) -> impl Future<Output = Result<String, FetchError>> + Send;

    /// Whether the DOM can keep changing after `navigate` returns
    fn is_dynamic(&self) -> bool {
        true
    }

    fn close(self) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererKind {
    Browser,
    Http,
}

impl FromStr for RendererKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "browser" | "chrome" | "chromium" => Ok(Self::Browser),
            "http" => Ok(Self::Http),
            other => Err(format!("unknown page renderer '{other}'")),
        }
    }
}

/// Source picked at runtime from configuration
#[derive(Clone)]
pub enum AnySource {
    Browser(BrowserSource),
    Http(HttpSource),
}

pub enum AnySession {
    Browser(BrowserSession),
    Http(HttpSession),
}

impl AnySource {
    pub async fn from_kind(kind: RendererKind, options: BrowserOptions) -> Result<Self, FetchError> {
        match kind {
            RendererKind::Browser => Ok(Self::Browser(BrowserSource::launch(options).await?)),
            RendererKind::Http => Ok(Self::Http(HttpSource::new()?)),
        }
    }

    pub async fn shutdown(self) {
        if let Self::Browser(source) = self {
            source.shutdown().await;
        }
    }
}

impl PageSource for AnySource {
    type Session = AnySession;

    async fn open(&self) -> Result<AnySession, FetchError> {
        match self {
            Self::Browser(source) => Ok(AnySession::Browser(source.open().await?)),
            Self::Http(source) => Ok(AnySession::Http(source.open().await?)),
        }
    }
}

impl PageSession for AnySession {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        match self {
            Self::Browser(session) => session.navigate(url).await,
            Self::Http(session) => session.navigate(url).await,
        }
    }

    async fn clear(&mut self) -> Result<(), FetchError> {
        match self {
            Self::Browser(session) => session.clear().await,
            Self::Http(session) => session.clear().await,
        }
    }

    async fn content(&mut self) -> Result<String, FetchError> {
        match self {
            Self::Browser(session) => session.content().await,
            Self::Http(session) => session.content().await,
        }
    }

    fn is_dynamic(&self) -> bool {
        match self {
            Self::Browser(session) => session.is_dynamic(),
            Self::Http(session) => session.is_dynamic(),
        }
    }

    async fn close(self) {
        match self {
            Self::Browser(session) => session.close().await,
            Self::Http(session) => session.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_kind_from_str() {
        assert_eq!("browser".parse::<RendererKind>(), Ok(RendererKind::Browser));
        assert_eq!("Chromium".parse::<RendererKind>(), Ok(RendererKind::Browser));
        assert_eq!(" http ".parse::<RendererKind>(), Ok(RendererKind::Http));
        assert!("firefox".parse::<RendererKind>().is_err());
    }
}
