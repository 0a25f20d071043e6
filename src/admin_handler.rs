use crate::errors::{AppError, ResultExt};
use crate::handlers::{header_str, AppState};
use crate::models::{AdminQuery, ExportRow, ReceiptListResponse};
use crate::webhook_handler::constant_time_compare;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

const LIST_DEFAULT_LIMIT: i64 = 50;
const LIST_MAX_LIMIT: i64 = 200;
const EXPORT_DEFAULT_LIMIT: i64 = 500;
const EXPORT_MAX_LIMIT: i64 = 5000;

const EXPORT_COLUMNS: [&str; 10] = [
    "id",
    "created_at",
    "transaction_id",
    "customer_name",
    "customer_cpf",
    "customer_email",
    "customer_phone",
    "status",
    "file_url",
    "source",
];

/// GET /comprovantes/list
pub async fn list_receipts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AdminQuery>,
) -> Result<Json<ReceiptListResponse>, AppError> {
    let store = state.require_store()?;
    authorize(&state, &headers, &query)?;

    let limit = clamp_limit(query.limit.as_deref(), LIST_DEFAULT_LIMIT, LIST_MAX_LIMIT);
    let data = store
        .list_receipts(limit)
        .await
        .context("[COMPROVANTES LIST] query failed")?;

    Ok(Json(ReceiptListResponse {
        success: true,
        data,
    }))
}

/// GET /comprovantes/export
///
/// CSV of receipts and leads, newest first.
pub async fn export_receipts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AdminQuery>,
) -> Result<Response, AppError> {
    let store = state.require_store()?;
    authorize(&state, &headers, &query)?;

    let limit = clamp_limit(query.limit.as_deref(), EXPORT_DEFAULT_LIMIT, EXPORT_MAX_LIMIT);
    let rows = store
        .export_rows(limit)
        .await
        .context("[COMPROVANTES EXPORT] query failed")?;
    let csv = render_csv(&rows)?;

    tracing::info!("[COMPROVANTES EXPORT] Exported {} rows", rows.len());
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=comprovantes.csv",
            ),
        ],
        csv,
    )
        .into_response())
}

/// Admin token from `x-admin-token` or `?token=`. Open when none is configured.
fn authorize(state: &AppState, headers: &HeaderMap, query: &AdminQuery) -> Result<(), AppError> {
    let Some(ref expected) = state.config.admin_token else {
        return Ok(());
    };

    let token = header_str(headers, "x-admin-token")
        .or(query.token.as_deref())
        .unwrap_or_default();

    if !constant_time_compare(token, expected) {
        return Err(AppError::Unauthorized("Invalid admin token".to_string()));
    }
    Ok(())
}

fn clamp_limit(raw: Option<&str>, default: i64, max: i64) -> i64 {
    raw.and_then(|l| l.trim().parse::<i64>().ok())
        .filter(|l| *l > 0)
        .unwrap_or(default)
        .min(max)
}

/// Header line always present; values containing `"`, `,` or a newline are
/// quoted with inner quotes doubled.
pub fn render_csv(rows: &[ExportRow]) -> Result<String, AppError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(vec![]);

    let to_internal = |e: csv::Error| AppError::InternalFailure(format!("CSV encoding failed: {}", e));

    writer.write_record(EXPORT_COLUMNS).map_err(to_internal)?;
    for row in rows {
        writer.serialize(row).map_err(to_internal)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::InternalFailure(format!("CSV flush failed: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::InternalFailure(format!("CSV is not UTF-8: {}", e)))
}
