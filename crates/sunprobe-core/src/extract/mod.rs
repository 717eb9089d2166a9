// ── Response extraction ──
//
// Turns one portal response into a flat `RawExtractionRecord`. The
// response shape is decided once, up front, from the content type (or by
// sniffing the body when the header is missing or generic). Individual
// variants never fail: anything they cannot parse simply yields nothing.

mod html;
mod json;
mod table;
mod text;

use scraper::Html;
use serde_json::Value;
use sunprobe_api::PortalResponse;
use tracing::debug;

pub use text::{parse_localized, readings, visible_text, Reading};

use crate::config::ExtractionProfile;
use crate::model::{ExtractionMethod, RawExtractionRecord};

/// The shape of a response body, decided once per response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    Json(Value),
    Html(String),
    Text(String),
}

impl ResponseShape {
    /// Classify a body by content type, falling back to sniffing.
    ///
    /// A JSON content type whose body does not parse is treated as text.
    pub fn from_parts(content_type: Option<&str>, body: &str) -> Self {
        let content_type = content_type.map(str::to_ascii_lowercase);
        match content_type.as_deref() {
            Some(ct) if ct.contains("json") => serde_json::from_str(body)
                .map_or_else(|_| Self::Text(body.to_owned()), Self::Json),
            Some(ct) if ct.contains("html") || ct.contains("xml") => Self::Html(body.to_owned()),
            _ => Self::sniff(body),
        }
    }

    pub fn from_response(response: &PortalResponse) -> Self {
        Self::from_parts(response.content_type.as_deref(), &response.body)
    }

    fn sniff(body: &str) -> Self {
        let trimmed = body.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str(trimmed) {
                return Self::Json(value);
            }
        }
        if trimmed.starts_with('<') {
            Self::Html(body.to_owned())
        } else {
            Self::Text(body.to_owned())
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Html(_) => "html",
            Self::Text(_) => "text",
        }
    }
}

/// Extract every candidate value from a response.
///
/// HTML runs all variants in order (JSON body, embedded script data,
/// tables, free text); later variants add keys but never replace earlier
/// ones. JSON responses only run the JSON walk.
pub fn extract(
    shape: &ResponseShape,
    endpoint: &str,
    profile: &ExtractionProfile,
) -> RawExtractionRecord {
    let mut record = RawExtractionRecord::new(endpoint);

    match shape {
        ResponseShape::Json(value) => {
            json::walk(value, "json", profile, ExtractionMethod::Json, &mut record);
        }
        ResponseShape::Html(body) => {
            if let Ok(value) = serde_json::from_str::<Value>(body.trim()) {
                json::walk(&value, "json", profile, ExtractionMethod::Json, &mut record);
            }
            extract_structured_html(body, profile, &mut record);
            text::extract_text(body, &mut record);
        }
        ResponseShape::Text(body) => text::extract_text(body, &mut record),
    }

    debug!(
        endpoint,
        shape = shape.kind(),
        values = record.len(),
        "extraction finished"
    );
    record
}

// The parsed document is not `Send`; keep it inside this synchronous scope.
fn extract_structured_html(body: &str, profile: &ExtractionProfile, record: &mut RawExtractionRecord) {
    let document = Html::parse_document(body);
    html::extract_scripts(&document, profile, record);
    html::extract_data_attributes(&document, profile, record);
    table::extract_tables(&document, record);
}
