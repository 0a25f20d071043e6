use crate::errors::{AppError, ResultExt};
use crate::handlers::{client_ip, user_agent, AppState};
use crate::models::{NewReceipt, UploadResponse};
use axum::{
    extract::{multipart::MultipartError, ConnectInfo, Multipart, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{SecondsFormat, Utc};
use regex::Regex;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

const FILE_FIELD: &str = "comprovante";

/// Uploaded file before it reaches blob storage.
struct ReceiptFile {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// POST /comprovantes/upload (multipart)
///
/// Stores the file in blob storage, then records the receipt.
pub async fn upload_receipt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let blob_store = state
        .blob_store
        .as_ref()
        .ok_or_else(|| AppError::ConfigurationMissing("Blob storage not configured".to_string()))?;
    let store = state.require_store()?;

    let mut receipt = NewReceipt::default();
    let mut file: Option<ReceiptFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == FILE_FIELD {
            let file_name = field
                .file_name()
                .filter(|n| !n.is_empty())
                .unwrap_or(FILE_FIELD)
                .to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(multipart_error)?;
            if bytes.len() > MAX_FILE_SIZE {
                return Err(AppError::ValidationFailed(format!(
                    "File exceeds the {} MB limit",
                    MAX_FILE_SIZE / (1024 * 1024)
                )));
            }
            file = Some(ReceiptFile {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "transaction_id" => receipt.transaction_id = value,
            "customer_name" => receipt.customer_name = value,
            "customer_cpf" => receipt.customer_cpf = value,
            "customer_email" => receipt.customer_email = value,
            "customer_phone" => receipt.customer_phone = value,
            other => tracing::debug!("[UPLOAD] Ignoring field '{}'", other),
        }
    }

    let file = file.ok_or_else(|| {
        AppError::ValidationFailed("Receipt file is required".to_string())
    })?;

    let path = blob_path(&file.file_name);
    let size = file.bytes.len();
    let stored = blob_store
        .put(&path, file.bytes, &file.content_type)
        .await
        .context("[UPLOAD] blob put failed")?;

    receipt.file_url = stored.url.clone();
    receipt.file_name = stored.file_name().to_string();
    receipt.size_bytes = i32::try_from(size).unwrap_or(i32::MAX);
    receipt.mimetype = file.content_type;
    receipt.user_agent = user_agent(&headers);
    receipt.ip = client_ip(&headers, connect_info.as_ref());

    store
        .insert_receipt(&receipt)
        .await
        .context("[UPLOAD] failed to record receipt")?;

    tracing::info!(
        "[UPLOAD] ✓ Receipt stored for transaction '{}'",
        receipt.transaction_id
    );
    Ok(Json(UploadResponse {
        success: true,
        url: stored.url,
    }))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::ValidationFailed("File too large".to_string())
    } else {
        AppError::ValidationFailed(format!("Invalid multipart body: {}", e.body_text()))
    }
}

/// Replaces anything outside `[a-zA-Z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE
        .get_or_init(|| Regex::new(r"[^a-zA-Z0-9._-]").expect("file name pattern is valid"))
        .replace_all(name, "_")
        .into_owned()
}

/// `comprovantes/{timestamp}_{safe name}`, timestamp with `:` and `.` as `-`.
fn blob_path(file_name: &str) -> String {
    let timestamp = Utc::now()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("comprovantes/{}_{}", timestamp, sanitize_file_name(file_name))
}
