//! PIX gateway adapters.
//!
//! Each gateway speaks its own dialect (field names, auth scheme, response
//! shape). The [`PaymentGateway`] trait hides those differences: handlers hand
//! over one [`PixChargeRequest`] and get back one [`PaymentResult`].

pub mod blackcat;
pub mod freepay;
pub mod sealpay;

use crate::config::Config;
use crate::gateway_client::GatewayHttpClient;
use crate::qr::{self, QrMode};
use crate::tracking::TrackingRecord;
use crate::webhook_models::PostbackEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub use blackcat::BlackcatGateway;
pub use freepay::FreePayGateway;
pub use sealpay::SealPayGateway;

/// Failures of a single gateway interaction.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Required credentials are absent. Detected before any network call.
    #[error("{0}")]
    NotConfigured(String),
    /// The request never produced an HTTP response (DNS, TLS, timeout...).
    #[error("gateway request failed: {0}")]
    Transport(String),
    /// The gateway answered with a non-2xx status.
    #[error("gateway returned {status}: {message}")]
    UpstreamRejected {
        status: u16,
        message: String,
        body: Value,
    },
    /// A 2xx answer without a transaction id or PIX payload.
    #[error("gateway did not return expected data")]
    IncompleteResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    Blackcat,
    FreePay,
    SealPay,
}

impl GatewayKind {
    pub const ALL: [GatewayKind; 3] = [
        GatewayKind::Blackcat,
        GatewayKind::FreePay,
        GatewayKind::SealPay,
    ];

    /// Route/config name.
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::Blackcat => "blackcat",
            GatewayKind::FreePay => "freepay",
            GatewayKind::SealPay => "sealpay",
        }
    }

    /// Name reported as `platform` to conversion tracking.
    pub fn display_name(&self) -> &'static str {
        match self {
            GatewayKind::Blackcat => "Blackcat",
            GatewayKind::FreePay => "FreePay",
            GatewayKind::SealPay => "SealPay",
        }
    }
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GatewayKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown payment gateway '{}'; expected blackcat, freepay or sealpay",
                    s
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Cpf,
    Cnpj,
}

impl DocumentType {
    /// CNPJs have 14 digits, CPFs 11; anything longer than 11 is a company.
    pub fn detect(digits: &str) -> Self {
        if digits.len() > 11 {
            DocumentType::Cnpj
        } else {
            DocumentType::Cpf
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Cpf => "cpf",
            DocumentType::Cnpj => "cnpj",
        }
    }
}

/// Payer identity as sent to a gateway. Phone and document are digits only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChargeCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub document: String,
}

impl ChargeCustomer {
    pub fn document_type(&self) -> DocumentType {
        DocumentType::detect(&self.document)
    }
}

/// Gateway-independent description of one PIX charge.
#[derive(Debug, Clone)]
pub struct PixChargeRequest {
    pub customer: ChargeCustomer,
    pub amount_cents: i64,
    pub title: String,
    pub tracking: TrackingRecord,
}

/// Fields pulled out of a gateway response before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTransaction {
    pub transaction_id: Option<String>,
    pub pix_code: Option<String>,
    pub qr_value: Option<String>,
    pub amount_cents: Option<i64>,
    pub status: Option<String>,
}

impl ParsedTransaction {
    /// Validates the parse and normalizes the QR image.
    pub fn into_result(
        self,
        requested_cents: i64,
        qr_mode: QrMode,
    ) -> Result<PaymentResult, GatewayError> {
        let (Some(transaction_id), Some(pix_code)) = (self.transaction_id, self.pix_code) else {
            return Err(GatewayError::IncompleteResponse);
        };

        let qr_image = qr::normalize_with(self.qr_value.as_deref().unwrap_or_default(), qr_mode);

        Ok(PaymentResult {
            transaction_id,
            pix_code,
            qr_image,
            amount_cents: self.amount_cents.unwrap_or(requested_cents),
            status: self.status.unwrap_or_else(|| "PENDING".to_string()),
        })
    }
}

/// Canonical outcome of a charge creation, identical for every gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentResult {
    pub transaction_id: String,
    pub pix_code: String,
    pub qr_image: String,
    pub amount_cents: i64,
    pub status: String,
}

/// Result of a status poll.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionStatus {
    pub status: String,
    pub transaction: Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn kind(&self) -> GatewayKind;

    /// Credentials check, run before any validation, DB write or network call.
    fn ensure_configured(&self) -> Result<(), GatewayError>;

    /// Gateway-specific JSON body for a charge.
    fn build_payload(&self, request: &PixChargeRequest) -> Result<Value, GatewayError>;

    /// Pulls the transaction fields out of a successful response body.
    fn parse_response(&self, body: &Value) -> ParsedTransaction;

    /// Performs the authenticated create call and returns the raw body.
    async fn send_charge(&self, payload: &Value) -> Result<Value, GatewayError>;

    async fn fetch_status(&self, transaction_id: &str) -> Result<TransactionStatus, GatewayError>;

    fn platform(&self) -> &'static str {
        self.kind().display_name()
    }

    fn qr_mode(&self) -> QrMode {
        QrMode::Standard
    }

    /// Event names that announce a settled payment.
    fn paid_events(&self) -> &'static [&'static str] {
        &["transaction.paid"]
    }

    fn parse_postback(&self, body: &Value) -> PostbackEvent {
        PostbackEvent::from_body(body, self.paid_events())
    }

    async fn create_transaction(
        &self,
        request: &PixChargeRequest,
    ) -> Result<PaymentResult, GatewayError> {
        self.ensure_configured()?;
        let payload = self.build_payload(request)?;

        tracing::info!(
            "[{}] Creating PIX charge of {} cents",
            self.kind(),
            request.amount_cents
        );
        let body = self.send_charge(&payload).await?;

        let result = self
            .parse_response(&body)
            .into_result(request.amount_cents, self.qr_mode())?;
        tracing::info!(
            "[{}] ✓ PIX charge created: {} ({})",
            self.kind(),
            result.transaction_id,
            result.status
        );
        Ok(result)
    }
}

/// All compiled gateways, plus the one selected for checkout.
#[derive(Clone)]
pub struct GatewayRegistry {
    active: GatewayKind,
    blackcat: Arc<BlackcatGateway>,
    freepay: Arc<FreePayGateway>,
    sealpay: Arc<SealPayGateway>,
}

impl GatewayRegistry {
    pub fn from_config(config: &Config, http: GatewayHttpClient) -> Self {
        Self {
            active: config.payment_gateway,
            blackcat: Arc::new(BlackcatGateway::new(config.blackcat.clone(), http.clone())),
            freepay: Arc::new(FreePayGateway::new(config.freepay.clone(), http.clone())),
            sealpay: Arc::new(SealPayGateway::new(config.sealpay.clone(), http)),
        }
    }

    pub fn get(&self, kind: GatewayKind) -> Arc<dyn PaymentGateway> {
        match kind {
            GatewayKind::Blackcat => self.blackcat.clone(),
            GatewayKind::FreePay => self.freepay.clone(),
            GatewayKind::SealPay => self.sealpay.clone(),
        }
    }

    pub fn active(&self) -> Arc<dyn PaymentGateway> {
        self.get(self.active)
    }

    /// Looks a gateway up by its route name (`/{name}/webhook`).
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn PaymentGateway>> {
        name.parse::<GatewayKind>().ok().map(|kind| self.get(kind))
    }
}

// ============ JSON field helpers shared by the adapters ============

const NULL: &Value = &Value::Null;

/// Gateways wrap the transaction in `data`, sometimes as a one-element array.
pub(crate) fn unwrap_data(body: &Value) -> &Value {
    match body.get("data") {
        Some(Value::Array(items)) => items.first().unwrap_or(NULL),
        Some(data) if is_truthy(data) => data,
        _ => body,
    }
}

/// Non-empty string or number rendered as a string.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer from a number or numeric string.
pub(crate) fn scalar_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n| *n != 0)
}

/// First usable string among JSON pointers, in priority order.
pub(crate) fn first_string(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .find_map(|p| value.pointer(p).and_then(scalar_string))
}

pub(crate) fn first_i64(value: &Value, pointers: &[&str]) -> Option<i64> {
    pointers
        .iter()
        .find_map(|p| value.pointer(p).and_then(scalar_i64))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}
