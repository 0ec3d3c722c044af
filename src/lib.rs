pub mod api;
pub mod app;
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod export;
pub mod extractor;
pub mod fetch_error;
pub mod jobs;
pub mod models;
pub mod page_source;
pub mod progress;
pub mod services;
pub mod url_template;
pub mod utils;
