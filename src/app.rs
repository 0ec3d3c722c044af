use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::config::Config;
use crate::extractor::Extractor;
use crate::page_source::AnySource;
use crate::services::ExtractionService;

/// Running dashboard server
///
/// Holds the server task and the page source so the browser can be shut
/// down once the server stops.
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
    source: AnySource,
}

impl Application {
    /// Build and initialize the application
    ///
    /// Launches the page source (one headless browser for the whole process
    /// when the browser renderer is configured), wires the extraction service
    /// into the router and spawns the HTTP server.
    pub async fn build(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");

        let settings = config.extractor_settings()?;
        info!(
            "Page renderer: {:?}, concurrency: {} workers",
            config.renderer, settings.concurrency
        );
        let source = AnySource::from_kind(config.renderer, config.browser_options()).await?;
        let extractor = Extractor::new(source.clone(), settings)?;
        let extraction_service = ExtractionService::new(extractor);

        let app_state = AppState { extraction_service };
        let app = create_router(app_state).layer(TraceLayer::new_for_http());

        let addr = config.server_addr();
        info!("Starting HTTP server on {}", addr);

        let server_handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await
        });

        info!("Application initialized successfully");

        Ok(Self {
            server_handle,
            source,
        })
    }

    /// Run until the server stops, then close the browser
    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        let result = self.server_handle.await;
        self.source.shutdown().await;
        result??;
        Ok(())
    }
}
