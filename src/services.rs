use crate::config::UtmifyConfig;
use crate::errors::AppError;
use crate::models::Lead;
use crate::tracking::TrackingParameters;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

/// `YYYY-MM-DD HH:MM:SS` in UTC, the only format UTMify accepts.
const UTMIFY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const PRODUCT_ID: &str = "taxa_adesao";

/// Reports paid orders to UTMify for ad attribution.
pub struct UtmifyService {
    client: Client,
    base_url: String,
    api_token: String,
}

impl UtmifyService {
    /// Returns `None` when no API token is configured.
    pub fn from_config(config: &UtmifyConfig, client: Client) -> Option<Self> {
        let api_token = config.api_token.clone()?;
        Some(Self {
            client,
            base_url: config.base_url.clone(),
            api_token,
        })
    }

    /// Sends one paid-order report.
    pub async fn send_paid_order(&self, order: &PaidOrder) -> Result<(), AppError> {
        tracing::info!("[UTMIFY] Reporting paid order {}", order.order_id);
        tracing::debug!("[UTMIFY] payload: {}", order.to_json());

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-token", &self.api_token)
            .json(order)
            .send()
            .await
            .map_err(|e| AppError::InternalFailure(format!("UTMify request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::InternalFailure(format!(
                "UTMify returned status {}: {}",
                status, error_text
            )));
        }

        tracing::info!("[UTMIFY] ✓ Order {} reported", order.order_id);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidOrder {
    pub order_id: String,
    pub platform: String,
    pub payment_method: String,
    pub status: String,
    pub created_at: String,
    pub approved_date: String,
    pub refunded_at: Option<String>,
    pub customer: OrderCustomer,
    pub products: Vec<OrderProduct>,
    pub tracking_parameters: TrackingParameters,
    pub commission: Commission,
    pub is_test: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderCustomer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub document: Option<String>,
    pub country: String,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderProduct {
    pub id: String,
    pub name: String,
    pub plan_id: Option<String>,
    pub plan_name: Option<String>,
    pub quantity: u32,
    pub price_in_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Commission {
    pub total_price_in_cents: i64,
    pub gateway_fee_in_cents: i64,
    pub user_commission_in_cents: i64,
}

impl PaidOrder {
    /// Builds the report from the latest lead of the transaction, if any.
    ///
    /// # Arguments
    ///
    /// * `order_id` - Gateway transaction id
    /// * `platform` - Gateway display name
    /// * `lead` - Latest lead for the transaction; `None` yields empty customer data
    /// * `default_title` - Product name when the lead has none
    /// * `approved_at` - Moment the paid postback arrived
    pub fn from_lead(
        order_id: &str,
        platform: &str,
        lead: Option<&Lead>,
        default_title: &str,
        approved_at: DateTime<Utc>,
    ) -> Self {
        let text = |field: Option<&Option<String>>| {
            field
                .and_then(|v| v.as_deref())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let price_in_cents = lead
            .and_then(|l| l.amount_cents)
            .map(i64::from)
            .unwrap_or(0);
        let created_at = lead.and_then(|l| l.created_at).unwrap_or(approved_at);

        Self {
            order_id: order_id.to_string(),
            platform: platform.to_string(),
            payment_method: "pix".to_string(),
            status: "paid".to_string(),
            created_at: created_at.format(UTMIFY_DATE_FORMAT).to_string(),
            approved_date: approved_at.format(UTMIFY_DATE_FORMAT).to_string(),
            refunded_at: None,
            customer: OrderCustomer {
                name: text(lead.map(|l| &l.nome)).unwrap_or_default(),
                email: text(lead.map(|l| &l.email)).unwrap_or_default(),
                phone: text(lead.map(|l| &l.phone)),
                document: text(lead.map(|l| &l.cpf)),
                country: "BR".to_string(),
                ip: None,
            },
            products: vec![OrderProduct {
                id: PRODUCT_ID.to_string(),
                name: text(lead.map(|l| &l.title)).unwrap_or_else(|| default_title.to_string()),
                plan_id: None,
                plan_name: None,
                quantity: 1,
                price_in_cents,
            }],
            tracking_parameters: TrackingParameters::from_stored(
                lead.and_then(|l| l.tracking.as_deref()),
            ),
            commission: Commission {
                total_price_in_cents: price_in_cents,
                gateway_fee_in_cents: 0,
                user_commission_in_cents: price_in_cents,
            },
            is_test: false,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
