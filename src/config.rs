use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::extractor::{ExtractorSettings, SettleOptions, DEFAULT_SELECTOR};
use crate::page_source::{BrowserOptions, RendererKind};
use crate::url_template::{TemplateError, UrlTemplate, DEFAULT_URL_TEMPLATE};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PAGE_RENDERER: {0}")]
    Renderer(String),
    #[error("Invalid IRRADIANCE_URL_TEMPLATE: {0}")]
    Template(#[from] TemplateError),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub url_template: String,
    pub irradiance_selector: String,
    pub renderer: RendererKind,
    pub chrome_executable: Option<PathBuf>,
    pub browser_sandbox: bool,
    pub extractor_concurrency: usize,
    pub settle_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            url_template: env::var("IRRADIANCE_URL_TEMPLATE")
                .unwrap_or_else(|_| DEFAULT_URL_TEMPLATE.to_string()),
            irradiance_selector: env::var("IRRADIANCE_SELECTOR")
                .unwrap_or_else(|_| DEFAULT_SELECTOR.to_string()),
            renderer: env::var("PAGE_RENDERER")
                .unwrap_or_else(|_| "browser".to_string())
                .parse()
                .map_err(ConfigError::Renderer)?,
            chrome_executable: env::var("CHROME_EXECUTABLE").ok().map(PathBuf::from),
            browser_sandbox: env::var("BROWSER_SANDBOX")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            extractor_concurrency: env::var("EXTRACTOR_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            settle_timeout_secs: env::var("SETTLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            poll_interval_ms: env::var("POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "250".to_string())
                .parse()
                .unwrap_or(250),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            executable: self.chrome_executable.clone(),
            sandbox: self.browser_sandbox,
            request_timeout: Duration::from_secs(self.settle_timeout_secs),
        }
    }

    pub fn extractor_settings(&self) -> Result<ExtractorSettings, ConfigError> {
        Ok(ExtractorSettings {
            url_template: UrlTemplate::parse(self.url_template.clone())?,
            selector: self.irradiance_selector.clone(),
            settle: SettleOptions {
                timeout: Duration::from_secs(self.settle_timeout_secs),
                poll_interval: Duration::from_millis(self.poll_interval_ms),
            },
            concurrency: self.extractor_concurrency,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            irradiance_selector: DEFAULT_SELECTOR.to_string(),
            renderer: RendererKind::Browser,
            chrome_executable: None,
            browser_sandbox: true,
            extractor_concurrency: 4,
            settle_timeout_secs: 30,
            poll_interval_ms: 250,
        }
    }
}
