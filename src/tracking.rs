//! UTM / click-tracking normalization.
//!
//! Front-ends send attribution in several shapes: a `tracking` object with a
//! nested `utm` map, a bare `tracking` string, or loose `utm`/`src` fields on
//! the body. Everything collapses into one [`TrackingRecord`], stored as JSON
//! on the lead and read back when reporting a conversion.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    /// UTM parameters, passed through opaquely.
    #[serde(default)]
    pub utm: Map<String, Value>,
    #[serde(default)]
    pub src: Option<String>,
}

impl TrackingRecord {
    /// Non-empty string value of a UTM key.
    pub fn utm_value(&self, key: &str) -> Option<&str> {
        self.utm
            .get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

pub fn normalize(
    tracking: Option<&Value>,
    body_utm: Option<&Value>,
    body_src: Option<&str>,
    referer: Option<&str>,
) -> TrackingRecord {
    match tracking {
        Some(Value::Object(fields)) => TrackingRecord {
            utm: object_or_empty(fields.get("utm")),
            src: first_non_empty([fields.get("src").and_then(Value::as_str), body_src, referer]),
        },
        Some(Value::String(src)) => TrackingRecord {
            utm: Map::new(),
            src: first_non_empty([Some(src.as_str())]),
        },
        _ => TrackingRecord {
            utm: object_or_empty(body_utm),
            src: first_non_empty([body_src, referer]),
        },
    }
}

fn object_or_empty(value: Option<&Value>) -> Map<String, Value> {
    value
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn first_non_empty<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Attribution fields accepted by the conversion-tracking receiver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackingParameters {
    pub src: Option<String>,
    pub sck: Option<String>,
    pub utm_source: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_content: Option<String>,
    pub utm_term: Option<String>,
}

impl TrackingParameters {
    /// Recovers the whitelisted parameters from a lead's stored tracking blob.
    ///
    /// Stored blobs come from both the payment flow (`{utm, src}`) and the
    /// funnel (arbitrary object), so every field is optional and malformed
    /// JSON yields empty parameters.
    pub fn from_stored(raw: Option<&str>) -> Self {
        let stored: Value = raw
            .filter(|r| !r.trim().is_empty())
            .and_then(|r| serde_json::from_str(r).ok())
            .unwrap_or(Value::Null);
        let utm = stored.get("utm").cloned().unwrap_or(Value::Null);

        let text = |value: &Value, key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            src: text(&stored, "src").or_else(|| text(&utm, "src")),
            sck: text(&stored, "sck").or_else(|| text(&utm, "sck")),
            utm_source: text(&utm, "utm_source").or_else(|| text(&utm, "source")),
            utm_campaign: text(&utm, "utm_campaign"),
            utm_medium: text(&utm, "utm_medium"),
            utm_content: text(&utm, "utm_content"),
            utm_term: text(&utm, "utm_term"),
        }
    }
}
