use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;

// ============ Database Models ============

/// A funnel submission or one step of a payment attempt.
///
/// Rows are append-only; the webhook is the only writer that mutates them
/// (`status`).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lead {
    pub id: i32,
    pub created_at: Option<DateTime<Utc>>,
    /// `funnel`, `payment_request` or `payment_response`.
    pub source: Option<String>,
    /// Digits only.
    pub cpf: Option<String>,
    pub nome: Option<String>,
    pub email: Option<String>,
    /// Digits only.
    pub phone: Option<String>,
    pub amount_cents: Option<i32>,
    pub title: Option<String>,
    /// Empty until a gateway call succeeds.
    pub transaction_id: Option<String>,
    /// `LEAD`, `PENDING`, `PAID` or whatever the gateway reports.
    pub status: Option<String>,
    /// JSON-encoded tracking record.
    pub tracking: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadSource {
    Funnel,
    PaymentRequest,
    PaymentResponse,
}

impl LeadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::Funnel => "funnel",
            LeadSource::PaymentRequest => "payment_request",
            LeadSource::PaymentResponse => "payment_response",
        }
    }
}

/// Insert shape for [`Lead`]. Empty strings are stored as such, not NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewLead {
    pub source: String,
    pub cpf: String,
    pub nome: String,
    pub email: String,
    pub phone: String,
    pub amount_cents: Option<i32>,
    pub title: String,
    pub transaction_id: String,
    pub status: String,
    pub tracking: String,
    pub user_agent: String,
    pub ip: String,
}

/// Uploaded proof of payment (`comprovantes` table).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_cpf: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub size_bytes: Option<i32>,
    pub mimetype: Option<String>,
    /// `paid` once the gateway confirms the transaction.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewReceipt {
    pub transaction_id: String,
    pub customer_name: String,
    pub customer_cpf: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub file_url: String,
    pub file_name: String,
    pub size_bytes: i32,
    pub mimetype: String,
    pub user_agent: String,
    pub ip: String,
}

/// One CSV line of the admin export: receipts and leads projected onto the
/// same columns. Field order is the column order.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExportRow {
    pub id: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_cpf: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub status: Option<String>,
    /// Always empty for leads.
    pub file_url: Option<String>,
    /// `comprovante` or `lead`.
    pub source: String,
}

// ============ API Request/Response Models ============

/// Body of `POST /payment`.
///
/// Front-ends disagree on types (a CPF may arrive as a number), so identity
/// fields accept any scalar.
#[derive(Debug, Default, Deserialize)]
pub struct PaymentRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub nome: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "object_or_none")]
    pub customer: Option<CustomerInput>,
    #[serde(default)]
    pub tracking: Option<Value>,
    #[serde(default)]
    pub utm: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub src: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_agent: Option<String>,
}

/// Nested customer object some front-ends send instead of flat fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cellphone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tax_id: Option<String>,
}

/// Body of `POST /leads/save`.
#[derive(Debug, Default, Deserialize)]
pub struct LeadSaveRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub nome: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(default, alias = "nomeMae", deserialize_with = "lenient_string")]
    pub nome_mae: Option<String>,
    #[serde(default)]
    pub tracking: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient_cents")]
    pub amount_cents: Option<i32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub transaction_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub success: bool,
    pub transaction_id: String,
    pub pix_code: String,
    /// Cents.
    pub amount: i64,
    pub status: String,
    pub qr_code: String,
    /// Same value as `qr_code`, kept for older front-ends.
    pub pix_qr_code: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: String,
    pub transaction: Value,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub id: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    pub token: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QrQuery {
    pub u: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ReceiptListResponse {
    pub success: bool,
    pub data: Vec<Receipt>,
}

/// Strips everything but ASCII digits.
pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Accepts a string, number or bool; `null` and other shapes become `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Integer cents from a number or numeric string, fractions rounded.
/// Anything unparseable or outside the `INTEGER` column range is dropped.
fn lenient_cents<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number
        .filter(|n| n.is_finite())
        .map(f64::round)
        .filter(|n| (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(n))
        .map(|n| n as i32))
}

/// Non-object values are ignored rather than rejected.
fn object_or_none<'de, D>(deserializer: D) -> Result<Option<CustomerInput>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
