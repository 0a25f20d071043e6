use crate::errors::AppError;
use crate::gateways::PaymentGateway;
use crate::handlers::{AppState, JsonBody};
use crate::services::PaidOrder;
use crate::webhook_models::{PostbackEvent, WebhookResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Gateway postback handler, mounted at `/{gateway}/webhook`.
///
/// Marks every lead and receipt of a paid transaction as paid and reports the
/// conversion. Anything that is not a payment confirmation is acknowledged and
/// ignored. Replays are harmless: the updates are plain assignments.
pub async fn gateway_webhook(
    State(state): State<Arc<AppState>>,
    Path(gateway_name): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    let gateway = state
        .gateways
        .by_name(&gateway_name)
        .ok_or_else(|| AppError::NotFound(format!("Unknown gateway '{}'", gateway_name)))?;

    let event = gateway.parse_postback(&body);
    tracing::info!(
        "[{} WEBHOOK] id={:?} status={} event={}",
        gateway.kind(),
        event.transaction_id,
        event.status,
        event.event
    );
    tracing::debug!("[{} WEBHOOK] payload: {}", gateway.kind(), body);

    match process_postback(&state, gateway.as_ref(), &event).await? {
        ProcessResult::Paid => {}
        ProcessResult::Ignored => {
            tracing::debug!("[{} WEBHOOK] Ignored non-paid postback", gateway.kind());
        }
    }

    Ok((StatusCode::OK, Json(WebhookResponse { success: true })))
}

#[derive(Debug, PartialEq, Eq)]
pub enum ProcessResult {
    Paid,
    Ignored,
}

/// Applies a parsed postback.
///
/// Database errors propagate so the gateway retries; a failed conversion
/// report is only logged.
pub async fn process_postback(
    state: &AppState,
    gateway: &dyn PaymentGateway,
    event: &PostbackEvent,
) -> Result<ProcessResult, AppError> {
    let transaction_id = match (&event.transaction_id, event.paid) {
        (Some(id), true) => id.as_str(),
        _ => return Ok(ProcessResult::Ignored),
    };

    let lead = match state.store.as_ref() {
        Some(store) => {
            let updated = store.mark_transaction_paid(transaction_id).await?;
            tracing::info!(
                "[{} WEBHOOK] ✓ {} marked paid ({} leads, {} receipts)",
                gateway.kind(),
                transaction_id,
                updated.leads,
                updated.receipts
            );

            store
                .latest_lead_for_transaction(transaction_id)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("[{} WEBHOOK] Failed to load lead: {}", gateway.kind(), e);
                    None
                })
        }
        None => {
            tracing::warn!("[{} WEBHOOK] No database configured, status not stored", gateway.kind());
            None
        }
    };

    if let Some(conversions) = state.conversions.as_ref() {
        let order = PaidOrder::from_lead(
            transaction_id,
            gateway.platform(),
            lead.as_ref(),
            &state.config.default_title,
            Utc::now(),
        );
        if let Err(e) = conversions.send_paid_order(&order).await {
            tracing::error!("[UTMIFY] Failed to report {}: {}", transaction_id, e);
        }
    }

    Ok(ProcessResult::Paid)
}

/// Constant-time string comparison
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
