use super::{
    first_i64, first_string, unwrap_data, GatewayError, GatewayKind, ParsedTransaction,
    PaymentGateway, PixChargeRequest, TransactionStatus,
};
use crate::config::FreePayConfig;
use crate::gateway_client::{endpoint, GatewayHttpClient};
use async_trait::async_trait;
use serde_json::{json, Value};

const LABEL: &str = "FREEPAY";

/// FreePay Brasil: HTTP Basic auth with the public/secret key pair.
pub struct FreePayGateway {
    config: FreePayConfig,
    http: GatewayHttpClient,
}

impl FreePayGateway {
    pub fn new(config: FreePayConfig, http: GatewayHttpClient) -> Self {
        Self { config, http }
    }

    fn credentials(&self) -> Result<(&str, &str), GatewayError> {
        match (self.config.public_key.as_deref(), self.config.secret_key.as_deref()) {
            (Some(public), Some(secret)) => Ok((public, secret)),
            _ => Err(GatewayError::NotConfigured(
                "FreePay credentials not configured".to_string(),
            )),
        }
    }

    fn postback_url(&self) -> Result<&str, GatewayError> {
        self.config
            .postback_url
            .as_deref()
            .ok_or_else(|| GatewayError::NotConfigured("FREEPAY_POSTBACK_URL not configured".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for FreePayGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::FreePay
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        self.credentials()?;
        self.postback_url()?;
        Ok(())
    }

    fn paid_events(&self) -> &'static [&'static str] {
        &["payment.paid", "transaction.paid"]
    }

    fn build_payload(&self, request: &PixChargeRequest) -> Result<Value, GatewayError> {
        let customer = &request.customer;
        Ok(json!({
            "amount": request.amount_cents,
            "payment_method": "pix",
            "description": request.title,
            "external_reference": "taxa_adesao",
            "customer": {
                "name": customer.name,
                "email": customer.email,
                "phone": customer.phone,
                "document": customer.document,
                "document_type": customer.document_type().as_str(),
            },
            "items": [{
                "title": request.title,
                "unit_price": request.amount_cents,
                "quantity": 1,
            }],
            "postback_url": self.postback_url()?,
            "metadata": {
                "utm": request.tracking.utm,
                "src": request.tracking.src,
            },
        }))
    }

    fn parse_response(&self, body: &Value) -> ParsedTransaction {
        let tx = unwrap_data(body);
        ParsedTransaction {
            transaction_id: first_string(tx, &["/id", "/payment_id"]),
            pix_code: first_string(tx, &["/pix/qr_code", "/pix/copy_paste", "/pix_code"]),
            qr_value: first_string(
                tx,
                &["/pix/qr_code_url", "/pix/qr_code_base64", "/pix/image"],
            ),
            amount_cents: first_i64(tx, &["/amount"]),
            status: first_string(tx, &["/status"]),
        }
    }

    async fn send_charge(&self, payload: &Value) -> Result<Value, GatewayError> {
        let (public, secret) = self.credentials()?;
        let url = endpoint(&self.config.base_url, &["v1", "payments"])?;
        let request = self
            .http
            .post(url)
            .basic_auth(public, Some(secret))
            .json(payload);
        self.http.execute(LABEL, request).await
    }

    async fn fetch_status(&self, transaction_id: &str) -> Result<TransactionStatus, GatewayError> {
        let (public, secret) = self.credentials()?;
        let url = endpoint(&self.config.base_url, &["v1", "payments", transaction_id])?;
        let request = self.http.get(url).basic_auth(public, Some(secret));
        let body = self.http.execute(LABEL, request).await?;

        let tx = unwrap_data(&body).clone();
        let status = first_string(&tx, &["/status"]).unwrap_or_else(|| "PENDING".to_string());
        Ok(TransactionStatus {
            status,
            transaction: tx,
        })
    }
}
