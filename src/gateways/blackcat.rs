use super::{
    first_i64, first_string, unwrap_data, GatewayError, GatewayKind, ParsedTransaction,
    PaymentGateway, PixChargeRequest, TransactionStatus,
};
use crate::config::BlackcatConfig;
use crate::gateway_client::{endpoint, GatewayHttpClient};
use crate::qr::QrMode;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const LABEL: &str = "BLACKCAT";

/// Blackcat Pagamentos: `X-API-Key` auth, postback URL per charge.
pub struct BlackcatGateway {
    config: BlackcatConfig,
    http: GatewayHttpClient,
}

impl BlackcatGateway {
    pub fn new(config: BlackcatConfig, http: GatewayHttpClient) -> Self {
        Self { config, http }
    }

    fn api_key(&self) -> Result<&str, GatewayError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::NotConfigured("Blackcat credentials not configured".to_string()))
    }

    fn postback_url(&self) -> Result<&str, GatewayError> {
        self.config
            .postback_url
            .as_deref()
            .ok_or_else(|| GatewayError::NotConfigured("BLACKCAT_POSTBACK_URL not configured".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for BlackcatGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Blackcat
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        self.api_key()?;
        self.postback_url()?;
        Ok(())
    }

    fn qr_mode(&self) -> QrMode {
        QrMode::RepairUrls
    }

    fn build_payload(&self, request: &PixChargeRequest) -> Result<Value, GatewayError> {
        let customer = &request.customer;
        let metadata = json!({
            "source": "popseal",
            "cpf": customer.document,
            "email": customer.email,
        });

        let mut payload = json!({
            "amount": request.amount_cents,
            "currency": "BRL",
            "paymentMethod": "pix",
            "items": [{
                "title": request.title,
                "unitPrice": request.amount_cents,
                "quantity": 1,
                "tangible": false,
            }],
            "customer": {
                "name": customer.name,
                "email": customer.email,
                "phone": customer.phone,
                "document": {
                    "type": customer.document_type().as_str(),
                    "number": customer.document,
                },
            },
            "pix": { "expiresInDays": 1 },
            "postbackUrl": self.postback_url()?,
            "externalRef": "taxa_adesao",
            // Blackcat expects metadata as an encoded string
            "metadata": metadata.to_string(),
        });

        if let Value::Object(ref mut fields) = payload {
            insert_utm_fields(fields, request);
        }
        Ok(payload)
    }

    fn parse_response(&self, body: &Value) -> ParsedTransaction {
        let tx = unwrap_data(body);
        ParsedTransaction {
            transaction_id: first_string(tx, &["/transactionId", "/id", "/transaction_id", "/txid"]),
            pix_code: first_string(
                tx,
                &["/paymentData/copyPaste", "/paymentData/qrCode", "/pix_code", "/qr_code"],
            ),
            qr_value: first_string(
                tx,
                &[
                    "/paymentData/qrCodeBase64",
                    "/paymentData/qrCode",
                    "/pix_qr_code",
                    "/qr_code_image",
                    "/qr_code",
                ],
            ),
            amount_cents: first_i64(tx, &["/amount"]),
            status: first_string(tx, &["/status"]),
        }
    }

    async fn send_charge(&self, payload: &Value) -> Result<Value, GatewayError> {
        let url = endpoint(&self.config.base_url, &["sales", "create-sale"])?;
        let request = self
            .http
            .post(url)
            .header("X-API-Key", self.api_key()?)
            .json(payload);
        self.http.execute(LABEL, request).await
    }

    async fn fetch_status(&self, transaction_id: &str) -> Result<TransactionStatus, GatewayError> {
        let url = endpoint(&self.config.base_url, &["sales", transaction_id, "status"])?;
        let request = self.http.get(url).header("X-API-Key", self.api_key()?);
        let body = self.http.execute(LABEL, request).await?;

        let tx = unwrap_data(&body);
        let status = first_string(tx, &["/status"])
            .or_else(|| first_string(&body, &["/status", "/payment_status"]))
            .unwrap_or_else(|| "PENDING".to_string());
        let transaction = if tx.is_null() { body.clone() } else { tx.clone() };

        Ok(TransactionStatus { status, transaction })
    }
}

/// Top-level `utm_*` keys, present only when a value exists.
fn insert_utm_fields(fields: &mut Map<String, Value>, request: &PixChargeRequest) {
    let tracking = &request.tracking;
    let source = tracking
        .utm_value("utm_source")
        .or_else(|| tracking.utm_value("source"))
        .or(tracking.src.as_deref().filter(|s| !s.is_empty()));

    let values = [
        ("utm_source", source),
        ("utm_medium", tracking.utm_value("utm_medium")),
        ("utm_campaign", tracking.utm_value("utm_campaign")),
        ("utm_content", tracking.utm_value("utm_content")),
        ("utm_term", tracking.utm_value("utm_term")),
    ];
    for (key, value) in values {
        if let Some(value) = value {
            fields.insert(key.to_string(), Value::String(value.to_string()));
        }
    }
}
