use crate::gateways::{first_string, unwrap_data};
use serde::Serialize;
use serde_json::Value;

/// Gateway postback, reduced to what the status updater needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PostbackEvent {
    pub transaction_id: Option<String>,
    /// Upper-cased, empty when the body carries none
    pub status: String,
    pub event: String,
    pub paid: bool,
}

impl PostbackEvent {
    /// Parses a postback body.
    ///
    /// # Arguments
    ///
    /// * `body` - Raw JSON sent by the gateway
    /// * `paid_events` - Event names that mean "settled" for this gateway
    pub fn from_body(body: &Value, paid_events: &[&str]) -> Self {
        let tx = unwrap_data(body);

        let status = first_string(tx, &["/status"])
            .or_else(|| first_string(body, &["/status"]))
            .unwrap_or_default()
            .to_uppercase();
        let event = first_string(body, &["/event", "/type"]).unwrap_or_default();
        let transaction_id = first_string(tx, &["/transactionId", "/transaction_id", "/id"])
            .or_else(|| first_string(body, &["/transactionId", "/transaction_id", "/id"]));

        let paid = status == "PAID"
            || paid_events
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&event));

        Self {
            transaction_id,
            status,
            event,
            paid,
        }
    }
}

/// Response sent back to the gateway
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
}
