//! Shared utility functions for the irradiance extractor

use std::sync::LazyLock;

use regex::Regex;

static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-?\d[\d,]*(?:\.\d+)?").expect("number pattern is valid")
});

/// Format an hour of day as the label used in URLs and tables.
///
/// # Examples
///
/// ```
/// use irradiance_extractor::utils::hour_label;
///
/// assert_eq!(hour_label(6), "06:00");
/// assert_eq!(hour_label(18), "18:00");
/// ```
pub fn hour_label(hour: u32) -> String {
    format!("{hour:02}:00")
}

/// Parse the hour back out of an `HH:00` label.
pub fn hour_from_label(label: &str) -> Option<u32> {
    let (hour, _) = label.split_once(':')?;
    hour.parse::<u32>().ok().filter(|h| *h < 24)
}

/// Extract the first number from scraped irradiance text
///
/// The page shows values like `"512.3 W/m²"` or `"1,024 W/m²"`. Only the chart
/// needs a number; the table keeps the verbatim text.
///
/// # Examples
///
/// ```
/// use irradiance_extractor::utils::parse_irradiance_value;
///
/// assert_eq!(parse_irradiance_value("512.3 W/m²"), Some(512.3));
/// assert_eq!(parse_irradiance_value("0"), Some(0.0));
/// assert_eq!(parse_irradiance_value("n/a"), None);
/// ```
pub fn parse_irradiance_value(text: &str) -> Option<f64> {
    let matched = NUMBER_PATTERN.find(text)?;
    matched.as_str().replace(',', "").parse::<f64>().ok()
}
