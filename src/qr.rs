//! Canonical displayable reference for a PIX QR value.
//!
//! Gateways return the QR image as a hosted URL, a bare base64 PNG, a
//! `base64,`-prefixed fragment or an already complete data URI. The checkout
//! page only needs something it can put in `<img src>`.

use url::Url;

const DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QrMode {
    #[default]
    Standard,
    /// Bare `host/path` values get an `https://` scheme and are URL-encoded.
    RepairUrls,
}

pub fn normalize(raw: &str) -> String {
    normalize_with(raw, QrMode::Standard)
}

pub fn normalize_with(raw: &str, mode: QrMode) -> String {
    if raw.is_empty() || raw.starts_with("data:image") || raw.starts_with("http") {
        return raw.to_string();
    }
    if raw.starts_with("base64,") {
        return format!("data:image/png;{}", raw);
    }
    if looks_like_base64(raw) {
        return format!("{}{}", DATA_URI_PREFIX, raw.trim());
    }
    match mode {
        QrMode::Standard => raw.to_string(),
        QrMode::RepairUrls => repair_url(raw),
    }
}

/// Long value made only of base64 alphabet characters and whitespace.
pub fn looks_like_base64(value: &str) -> bool {
    value.len() > 100
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=') || c.is_whitespace())
}

fn repair_url(raw: &str) -> String {
    if !raw.contains('/') {
        return raw.to_string();
    }
    let with_scheme = format!("https://{}", raw);
    match Url::parse(&with_scheme) {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::debug!("QR value '{}' is not a repairable URL: {}", raw, e);
            with_scheme
        }
    }
}
