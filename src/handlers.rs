use crate::amount;
use crate::blob_storage::{BlobStore, HttpBlobStore};
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::gateway_client::{build_http_client, GatewayHttpClient};
use crate::gateways::{ChargeCustomer, GatewayError, GatewayRegistry, PixChargeRequest};
use crate::lead_recorder::LeadRecorder;
use crate::models::*;
use crate::services::UtmifyService;
use crate::storage::Store;
use crate::tracking;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, FromRequest, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Lead/receipt persistence. `None` when no database is configured.
    pub store: Option<Arc<dyn Store>>,
    /// The compiled gateways and the one active for checkout.
    pub gateways: GatewayRegistry,
    pub leads: LeadRecorder,
    /// Receipt file storage. `None` without a blob token.
    pub blob_store: Option<Arc<dyn BlobStore>>,
    /// Conversion reporting. `None` without a UTMify token.
    pub conversions: Option<Arc<UtmifyService>>,
    /// Shared outbound client (QR proxy, blob, UTMify).
    pub http: reqwest::Client,
}

impl AppState {
    pub fn from_config(config: Config, store: Option<Arc<dyn Store>>) -> anyhow::Result<Self> {
        let http = build_http_client(Duration::from_secs(config.http_timeout_secs))?;
        let gateways =
            GatewayRegistry::from_config(&config, GatewayHttpClient::from_client(http.clone()));
        let blob_store = HttpBlobStore::from_config(&config.blob, http.clone())
            .map(|blob| Arc::new(blob) as Arc<dyn BlobStore>);
        let conversions = UtmifyService::from_config(&config.utmify, http.clone()).map(Arc::new);

        Ok(Self {
            leads: LeadRecorder::new(store.clone()),
            config,
            store,
            gateways,
            blob_store,
            conversions,
            http,
        })
    }

    /// The store, or a 500 for endpoints that cannot work without one.
    pub fn require_store(&self) -> Result<&Arc<dyn Store>, AppError> {
        self.store
            .as_ref()
            .ok_or_else(|| AppError::ConfigurationMissing("Database not configured".to_string()))
    }
}

/// JSON request body, parsed whatever the `Content-Type`.
///
/// Landing pages and gateways post JSON as `text/plain` or with no content
/// type at all. An empty body reads as `{}`; anything unparseable is a 400 in
/// the usual error envelope.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::ValidationFailed(e.body_text()))?;
        parse_json_body(&bytes).map(JsonBody)
    }
}

pub(crate) fn parse_json_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    let raw = if bytes.iter().all(u8::is_ascii_whitespace) {
        &b"{}"[..]
    } else {
        bytes
    };
    serde_json::from_slice(raw).map_err(|e| {
        tracing::debug!("Rejected request body: {}", e);
        AppError::ValidationFailed("Invalid JSON body".to_string())
    })
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "pix-checkout-api",
            "version": env!("CARGO_PKG_VERSION"),
            "gateway": state.config.payment_gateway.as_str(),
            "database": state.store.is_some(),
        })),
    )
}

/// POST /payment
///
/// Creates a PIX charge with the active gateway.
///
/// Order matters: credentials are checked first, then the payer and the
/// amount, and only then is anything written or sent upstream. The lead is
/// recorded before and after the gateway call; neither write can fail the
/// request.
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    JsonBody(body): JsonBody<PaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let gateway = state.gateways.active();
    gateway.ensure_configured()?;

    let customer_input = body.customer.as_ref();
    let pick = |flat: &Option<String>, nested: Option<&Option<String>>| {
        flat.clone()
            .or_else(|| nested.cloned().flatten())
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };
    let nome = pick(&body.nome, customer_input.map(|c| &c.name));
    let email = pick(&body.email, customer_input.map(|c| &c.email));
    let cpf = pick(&body.cpf, customer_input.map(|c| &c.tax_id));
    let phone = pick(&body.phone, customer_input.map(|c| &c.cellphone));

    tracing::info!("[PAYMENT] Request received for {} <{}>", nome, email);

    if nome.is_empty() || email.is_empty() {
        return Err(AppError::ValidationFailed(
            "Name and email are required".to_string(),
        ));
    }

    let amount_cents = amount::normalize_to_cents(body.amount.as_ref(), &state.config.fixed_amount);
    if !amount::is_valid_amount(amount_cents) {
        let message = if amount_cents < amount::MIN_AMOUNT_CENTS {
            format!("Invalid amount (minimum {} cents)", amount::MIN_AMOUNT_CENTS)
        } else {
            format!("Invalid amount (maximum {} cents)", amount::MAX_AMOUNT_CENTS)
        };
        return Err(AppError::ValidationFailed(message));
    }

    let title = [&body.description, &body.title]
        .into_iter()
        .flatten()
        .find(|t| !t.is_empty())
        .cloned()
        .unwrap_or_else(|| state.config.default_title.clone());

    // Nested customer fields win over flat ones for what goes upstream
    let nested = |field: fn(&CustomerInput) -> &Option<String>| {
        customer_input
            .and_then(|c| field(c).as_deref())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let customer = ChargeCustomer {
        name: nested(|c| &c.name).unwrap_or_else(|| nome.clone()),
        email: nested(|c| &c.email).unwrap_or_else(|| email.clone()),
        phone: digits_only(&nested(|c| &c.cellphone).unwrap_or_else(|| phone.clone())),
        document: digits_only(&nested(|c| &c.tax_id).unwrap_or_else(|| cpf.clone())),
    };

    let tracking = tracking::normalize(
        body.tracking.as_ref(),
        body.utm.as_ref(),
        body.src.as_deref(),
        header_str(&headers, header::REFERER.as_str()),
    );
    let tracking_json = tracking.to_json_string();
    let user_agent = body
        .user_agent
        .clone()
        .filter(|ua| !ua.is_empty())
        .unwrap_or_else(|| user_agent(&headers));
    let ip = client_ip(&headers, connect_info.as_ref());

    let lead_base = NewLead {
        cpf,
        nome,
        email,
        phone,
        title: title.clone(),
        tracking: tracking_json,
        user_agent,
        ip,
        ..Default::default()
    };

    state
        .leads
        .record(NewLead {
            source: LeadSource::PaymentRequest.as_str().to_string(),
            amount_cents: i32::try_from(amount_cents).ok(),
            ..lead_base.clone()
        })
        .await;

    let request = PixChargeRequest {
        customer,
        amount_cents,
        title,
        tracking,
    };
    let result = gateway
        .create_transaction(&request)
        .await
        .context(format!("[PAYMENT] {} charge failed", gateway.kind()))?;

    state
        .leads
        .record(NewLead {
            source: LeadSource::PaymentResponse.as_str().to_string(),
            amount_cents: i32::try_from(result.amount_cents).ok(),
            transaction_id: result.transaction_id.clone(),
            status: result.status.clone(),
            ..lead_base
        })
        .await;

    Ok(Json(PaymentResponse {
        success: true,
        transaction_id: result.transaction_id,
        pix_code: result.pix_code,
        amount: result.amount_cents,
        status: result.status,
        qr_code: result.qr_image.clone(),
        pix_qr_code: result.qr_image,
    }))
}

/// GET /payment/status?id=...
///
/// Polls the active gateway. An upstream rejection is relayed with its status
/// and body instead of the generic error envelope.
pub async fn payment_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Response, AppError> {
    let gateway = state.gateways.active();
    gateway.ensure_configured()?;

    let id = query
        .id
        .or(query.transaction_id)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::ValidationFailed("id is required".to_string()))?;

    match gateway.fetch_status(&id).await {
        Ok(status) => Ok(Json(StatusResponse {
            success: true,
            status: status.status,
            transaction: status.transaction,
        })
        .into_response()),
        Err(GatewayError::UpstreamRejected { status, body, .. }) => {
            tracing::warn!("[STATUS] {} answered {} for {}", gateway.kind(), status, id);
            Ok((
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "success": false,
                    "message": "Could not fetch transaction status",
                    "response": { "status": status, "data": body },
                })),
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /leads/save
///
/// Stores a funnel lead. Unlike the payment flow, a failed write is an error
/// here since persisting is the whole point of the call.
pub async fn save_lead(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    JsonBody(body): JsonBody<LeadSaveRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let store = state.require_store()?;

    let trimmed = |v: &Option<String>| v.as_deref().unwrap_or_default().trim().to_string();
    let cpf = digits_only(body.cpf.as_deref().unwrap_or_default());
    let nome = trimmed(&body.nome);
    let email = trimmed(&body.email);
    let phone = digits_only(body.phone.as_deref().unwrap_or_default());

    if cpf.is_empty() && nome.is_empty() && email.is_empty() && phone.is_empty() {
        return Err(AppError::ValidationFailed("Insufficient data".to_string()));
    }

    let mut tracking: Map<String, Value> = match body.tracking {
        Some(Value::Object(fields)) => fields,
        _ => Map::new(),
    };
    tracking.insert("nome_mae".to_string(), Value::String(trimmed(&body.nome_mae)));

    let non_empty = |v: Option<String>, default: &str| {
        v.filter(|s| !s.is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    let lead = NewLead {
        source: non_empty(body.source, LeadSource::Funnel.as_str()),
        cpf,
        nome,
        email,
        phone,
        amount_cents: body.amount_cents.filter(|c| *c != 0),
        title: non_empty(body.title, "Lead Funil"),
        transaction_id: body.transaction_id.unwrap_or_default(),
        status: non_empty(body.status, "LEAD"),
        tracking: Value::Object(tracking).to_string(),
        user_agent: non_empty(body.user_agent, &user_agent(&headers)),
        ip: client_ip(&headers, connect_info.as_ref()),
    };

    store
        .insert_lead(&lead)
        .await
        .context("[LEADS] Failed to save funnel lead")?;

    tracing::info!("[LEADS] ✓ Funnel lead saved ({})", lead.source);
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /qr?u=<url>
///
/// Fetches a remote QR image so the checkout page can render it same-origin.
pub async fn qr_proxy(State(state): State<Arc<AppState>>, Query(query): Query<QrQuery>) -> Response {
    let Some(raw) = query.u.filter(|u| !u.is_empty()) else {
        return qr_error(StatusCode::BAD_REQUEST, "Missing url");
    };
    let Some(target) = parse_qr_target(&raw) else {
        return qr_error(StatusCode::BAD_REQUEST, "Invalid url");
    };

    let response = match state.http.get(target).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("[QR] Error fetching QR: {}", e);
            return qr_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
        }
    };

    if !response.status().is_success() {
        return qr_error(response.status(), "Failed to fetch QR");
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/png")
        .to_string();

    match response.bytes().await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "public, max-age=300".to_string()),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("[QR] Error reading QR body: {}", e);
            qr_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// First whitespace-delimited token, if it is an absolute http(s) URL.
pub fn parse_qr_target(raw: &str) -> Option<Url> {
    let candidate = raw.split_whitespace().next()?;
    let lower = candidate.to_ascii_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return None;
    }
    Url::parse(candidate).ok()
}

fn qr_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

pub(crate) fn user_agent(headers: &HeaderMap) -> String {
    header_str(headers, header::USER_AGENT.as_str())
        .unwrap_or_default()
        .to_string()
}

/// `X-Forwarded-For` as sent by the edge proxy, else the socket peer.
pub(crate) fn client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    header_str(headers, "x-forwarded-for")
        .map(str::to_string)
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_default()
}
