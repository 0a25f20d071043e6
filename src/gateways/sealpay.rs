use super::{
    first_i64, first_string, GatewayError, GatewayKind, ParsedTransaction, PaymentGateway,
    PixChargeRequest, TransactionStatus,
};
use crate::config::SealPayConfig;
use crate::gateway_client::{endpoint, GatewayHttpClient};
use async_trait::async_trait;
use serde_json::{json, Value};

const LABEL: &str = "SEALPAY";

/// SealPay: API key travels in the JSON body, postback is set on the dashboard.
pub struct SealPayGateway {
    config: SealPayConfig,
    http: GatewayHttpClient,
}

impl SealPayGateway {
    pub fn new(config: SealPayConfig, http: GatewayHttpClient) -> Self {
        Self { config, http }
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::NotConfigured("SealPay credentials not configured".to_string()))
    }
}

/// SealPay wraps the transaction in `transaction`, or not at all.
fn transaction_of(body: &Value) -> &Value {
    match body.get("transaction") {
        Some(tx) if tx.is_object() => tx,
        _ => body,
    }
}

#[async_trait]
impl PaymentGateway for SealPayGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::SealPay
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        self.api_key().map(|_| ())
    }

    fn build_payload(&self, request: &PixChargeRequest) -> Result<Value, GatewayError> {
        let customer = &request.customer;
        Ok(json!({
            "api_key": self.api_key()?,
            "amount": request.amount_cents,
            "payment_method": "pix",
            "description": request.title,
            "customer": {
                "name": customer.name,
                "email": customer.email,
                "phone": customer.phone,
                "document": customer.document,
                "document_type": customer.document_type().as_str(),
            },
            "utm": request.tracking.utm,
            "src": request.tracking.src,
        }))
    }

    fn parse_response(&self, body: &Value) -> ParsedTransaction {
        let tx = transaction_of(body);
        ParsedTransaction {
            transaction_id: first_string(tx, &["/txid", "/transaction_id", "/id"]),
            pix_code: first_string(tx, &["/pix_copia_e_cola", "/pix/emv", "/emv"]),
            qr_value: first_string(tx, &["/qrcode_image", "/qrcode", "/pix/qrcode"]),
            amount_cents: first_i64(tx, &["/value", "/amount"]),
            status: first_string(tx, &["/status"]),
        }
    }

    async fn send_charge(&self, payload: &Value) -> Result<Value, GatewayError> {
        let url = endpoint(&self.config.base_url, &["api", "v1", "transactions"])?;
        self.http.execute(LABEL, self.http.post(url).json(payload)).await
    }

    async fn fetch_status(&self, transaction_id: &str) -> Result<TransactionStatus, GatewayError> {
        let url = endpoint(&self.config.base_url, &["api", "v1", "transactions", "status"])?;
        let payload = json!({ "api_key": self.api_key()?, "txid": transaction_id });
        let body = self.http.execute(LABEL, self.http.post(url).json(&payload)).await?;

        let tx = transaction_of(&body).clone();
        let status = first_string(&tx, &["/status"]).unwrap_or_else(|| "PENDING".to_string());
        Ok(TransactionStatus {
            status,
            transaction: tx,
        })
    }
}
