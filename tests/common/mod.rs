//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use pix_checkout_api::app::build_router;
use pix_checkout_api::config::Config;
use pix_checkout_api::errors::AppError;
use pix_checkout_api::handlers::AppState;
use pix_checkout_api::models::{ExportRow, Lead, NewLead, NewReceipt, Receipt};
use pix_checkout_api::storage::{PaidUpdate, Store};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// In-memory [`Store`] mirroring the Postgres semantics the handlers rely on.
#[derive(Default)]
pub struct MemoryStore {
    leads: Mutex<Vec<Lead>>,
    receipts: Mutex<Vec<Receipt>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// A store whose every operation fails, like a database that went away.
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.unavailable.store(true, Ordering::SeqCst);
        store
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::InternalFailure("store unavailable".to_string()));
        }
        Ok(())
    }

    pub fn leads(&self) -> Vec<Lead> {
        self.leads.lock().unwrap().clone()
    }

    pub fn receipts(&self) -> Vec<Receipt> {
        self.receipts.lock().unwrap().clone()
    }

    /// Seeds a pending payment-response lead plus a receipt for `transaction_id`.
    pub fn seed_pending_transaction(&self, transaction_id: &str) {
        let mut leads = self.leads.lock().unwrap();
        let id = leads.len() as i32 + 1;
        leads.push(Lead {
            id,
            created_at: Some(Utc::now() - Duration::minutes(5)),
            source: Some("payment_response".into()),
            cpf: Some("12345678901".into()),
            nome: Some("Ana Souza".into()),
            email: Some("ana@example.com".into()),
            phone: Some("11999998888".into()),
            amount_cents: Some(6473),
            title: Some("Taxa de Adesão".into()),
            transaction_id: Some(transaction_id.into()),
            status: Some("PENDING".into()),
            tracking: Some(r#"{"utm":{"utm_source":"google"},"src":"ads"}"#.into()),
            user_agent: None,
            ip: None,
        });
        drop(leads);

        let mut receipts = self.receipts.lock().unwrap();
        let id = receipts.len() as i32 + 1;
        receipts.push(Receipt {
            id,
            created_at: Some(Utc::now()),
            transaction_id: Some(transaction_id.into()),
            customer_name: Some("Ana Souza".into()),
            customer_cpf: Some("12345678901".into()),
            customer_email: Some("ana@example.com".into()),
            customer_phone: None,
            file_url: Some("https://blob.example.com/comprovantes/a.png".into()),
            file_name: Some("a.png".into()),
            size_bytes: Some(10),
            mimetype: Some("image/png".into()),
            status: None,
        });
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_lead(&self, lead: &NewLead) -> Result<(), AppError> {
        self.check()?;
        let mut leads = self.leads.lock().unwrap();
        let id = leads.len() as i32 + 1;
        leads.push(Lead {
            id,
            created_at: Some(Utc::now()),
            source: Some(lead.source.clone()),
            cpf: Some(lead.cpf.clone()),
            nome: Some(lead.nome.clone()),
            email: Some(lead.email.clone()),
            phone: Some(lead.phone.clone()),
            amount_cents: lead.amount_cents,
            title: Some(lead.title.clone()),
            transaction_id: Some(lead.transaction_id.clone()),
            status: Some(lead.status.clone()),
            tracking: Some(lead.tracking.clone()),
            user_agent: Some(lead.user_agent.clone()),
            ip: Some(lead.ip.clone()),
        });
        Ok(())
    }

    async fn latest_lead_for_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Lead>, AppError> {
        self.check()?;
        Ok(self
            .leads
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.transaction_id.as_deref() == Some(transaction_id))
            .max_by_key(|l| (l.created_at, l.id))
            .cloned())
    }

    async fn mark_transaction_paid(&self, transaction_id: &str) -> Result<PaidUpdate, AppError> {
        self.check()?;
        let mut update = PaidUpdate::default();
        for lead in self.leads.lock().unwrap().iter_mut() {
            if lead.transaction_id.as_deref() == Some(transaction_id) {
                lead.status = Some("PAID".into());
                update.leads += 1;
            }
        }
        for receipt in self.receipts.lock().unwrap().iter_mut() {
            if receipt.transaction_id.as_deref() == Some(transaction_id) {
                receipt.status = Some("paid".into());
                update.receipts += 1;
            }
        }
        Ok(update)
    }

    async fn insert_receipt(&self, receipt: &NewReceipt) -> Result<(), AppError> {
        self.check()?;
        let mut receipts = self.receipts.lock().unwrap();
        let id = receipts.len() as i32 + 1;
        receipts.push(Receipt {
            id,
            created_at: Some(Utc::now()),
            transaction_id: Some(receipt.transaction_id.clone()),
            customer_name: Some(receipt.customer_name.clone()),
            customer_cpf: Some(receipt.customer_cpf.clone()),
            customer_email: Some(receipt.customer_email.clone()),
            customer_phone: Some(receipt.customer_phone.clone()),
            file_url: Some(receipt.file_url.clone()),
            file_name: Some(receipt.file_name.clone()),
            size_bytes: Some(receipt.size_bytes),
            mimetype: Some(receipt.mimetype.clone()),
            status: None,
        });
        Ok(())
    }

    async fn list_receipts(&self, limit: i64) -> Result<Vec<Receipt>, AppError> {
        self.check()?;
        let mut receipts = self.receipts();
        receipts.sort_by_key(|r| std::cmp::Reverse((r.created_at, r.id)));
        receipts.truncate(limit as usize);
        Ok(receipts)
    }

    async fn export_rows(&self, limit: i64) -> Result<Vec<ExportRow>, AppError> {
        self.check()?;
        let mut rows: Vec<ExportRow> = self
            .receipts()
            .into_iter()
            .map(|r| ExportRow {
                id: r.id,
                created_at: r.created_at,
                transaction_id: r.transaction_id,
                customer_name: r.customer_name,
                customer_cpf: r.customer_cpf,
                customer_email: r.customer_email,
                customer_phone: r.customer_phone,
                status: r.status,
                file_url: r.file_url,
                source: "comprovante".into(),
            })
            .chain(self.leads().into_iter().map(|l| ExportRow {
                id: l.id,
                created_at: l.created_at,
                transaction_id: l.transaction_id,
                customer_name: l.nome,
                customer_cpf: l.cpf,
                customer_email: l.email,
                customer_phone: l.phone,
                status: l.status,
                file_url: None,
                source: "lead".into(),
            }))
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

/// Config with Blackcat fully configured against `gateway_uri`.
pub fn test_config(gateway_uri: &str) -> Config {
    let mut config = Config::default();
    config.blackcat.api_key = Some("bc_test_key".to_string());
    config.blackcat.base_url = format!("{}/api", gateway_uri);
    config.blackcat.postback_url = Some("https://checkout.example.com/blackcat/webhook".to_string());
    config.http_timeout_secs = 5;
    config
}

/// Router with the given config and optional memory store, no rate limiting.
pub fn build_app(config: Config, store: Option<Arc<MemoryStore>>) -> Router {
    let store = store.map(|s| s as Arc<dyn Store>);
    let state = AppState::from_config(config, store).expect("state builds");
    build_router(Arc::new(state), None).expect("router builds")
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// POST with an arbitrary body and, optionally, no content type at all.
pub fn raw_request(uri: &str, body: &str, content_type: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
