use chrono::NaiveDate;

use crate::models::Coordinate;
use crate::utils::hour_label;

/// suncalc.org keeps its whole state in the URL fragment:
/// `#/lat,lon,zoom/date/time/objectheight/layer`
pub const DEFAULT_URL_TEMPLATE: &str =
    "https://suncalc.org/#/{lat},{lon},17/{date}/{time}/324.0/2";

const REQUIRED_PLACEHOLDERS: [&str; 2] = ["{date}", "{time}"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("URL template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),
}

/// URL pattern with `{lat}`, `{lon}`, `{date}` (YYYY.MM.DD) and `{time}` (HH:00)
#[derive(Debug, Clone, PartialEq)]
pub struct UrlTemplate {
    template: String,
}

impl UrlTemplate {
    pub fn parse(template: impl Into<String>) -> Result<Self, TemplateError> {
        let template = template.into();
        for placeholder in REQUIRED_PLACEHOLDERS {
            if !template.contains(placeholder) {
                return Err(TemplateError::MissingPlaceholder(placeholder));
            }
        }
        Ok(Self { template })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn render(&self, coordinate: Coordinate, date: NaiveDate, hour: u32) -> String {
        self.template
            .replace("{lat}", &coordinate.latitude.to_string())
            .replace("{lon}", &coordinate.longitude.to_string())
            .replace("{date}", &date.format("%Y.%m.%d").to_string())
            .replace("{time}", &hour_label(hour))
    }
}

impl Default for UrlTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_URL_TEMPLATE.to_string(),
        }
    }
}
