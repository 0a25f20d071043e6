use crate::errors::AppError;
use crate::models::{ExportRow, Lead, NewLead, NewReceipt, Receipt};
use async_trait::async_trait;
use sqlx::PgPool;

/// Rows touched by a paid-status update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaidUpdate {
    pub leads: u64,
    pub receipts: u64,
}

/// Persistence for leads and receipts.
///
/// Handlers only see this trait so tests can swap Postgres for memory.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_lead(&self, lead: &NewLead) -> Result<(), AppError>;

    /// Most recently created lead carrying `transaction_id`.
    async fn latest_lead_for_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Lead>, AppError>;

    /// Sets leads to `PAID` and receipts to `paid` for a transaction.
    async fn mark_transaction_paid(&self, transaction_id: &str) -> Result<PaidUpdate, AppError>;

    async fn insert_receipt(&self, receipt: &NewReceipt) -> Result<(), AppError>;

    /// Newest first.
    async fn list_receipts(&self, limit: i64) -> Result<Vec<Receipt>, AppError>;

    /// Receipts and leads interleaved, newest first.
    async fn export_rows(&self, limit: i64) -> Result<Vec<ExportRow>, AppError>;
}

/// Postgres-backed [`Store`].
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_lead(&self, lead: &NewLead) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO leads (
                source, cpf, nome, email, phone, amount_cents, title,
                transaction_id, status, tracking, user_agent, ip
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&lead.source)
        .bind(&lead.cpf)
        .bind(&lead.nome)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(lead.amount_cents)
        .bind(&lead.title)
        .bind(&lead.transaction_id)
        .bind(&lead.status)
        .bind(&lead.tracking)
        .bind(&lead.user_agent)
        .bind(&lead.ip)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Stored {} lead (tx='{}')", lead.source, lead.transaction_id);
        Ok(())
    }

    async fn latest_lead_for_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Lead>, AppError> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            SELECT id, created_at, source, cpf, nome, email, phone, amount_cents, title,
                   transaction_id, status, tracking, user_agent, ip
            FROM leads
            WHERE transaction_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lead)
    }

    async fn mark_transaction_paid(&self, transaction_id: &str) -> Result<PaidUpdate, AppError> {
        let leads = sqlx::query("UPDATE leads SET status = 'PAID' WHERE transaction_id = $1")
            .bind(transaction_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let receipts =
            sqlx::query("UPDATE comprovantes SET status = 'paid' WHERE transaction_id = $1")
                .bind(transaction_id)
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(PaidUpdate { leads, receipts })
    }

    async fn insert_receipt(&self, receipt: &NewReceipt) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO comprovantes (
                transaction_id, customer_name, customer_cpf, customer_email, customer_phone,
                file_url, file_name, size_bytes, mimetype, user_agent, ip
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&receipt.transaction_id)
        .bind(&receipt.customer_name)
        .bind(&receipt.customer_cpf)
        .bind(&receipt.customer_email)
        .bind(&receipt.customer_phone)
        .bind(&receipt.file_url)
        .bind(&receipt.file_name)
        .bind(receipt.size_bytes)
        .bind(&receipt.mimetype)
        .bind(&receipt.user_agent)
        .bind(&receipt.ip)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_receipts(&self, limit: i64) -> Result<Vec<Receipt>, AppError> {
        let receipts = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT id, created_at, transaction_id, customer_name, customer_cpf, customer_email,
                   customer_phone, file_url, file_name, size_bytes, mimetype, status
            FROM comprovantes
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(receipts)
    }

    async fn export_rows(&self, limit: i64) -> Result<Vec<ExportRow>, AppError> {
        let rows = sqlx::query_as::<_, ExportRow>(
            r#"
            SELECT id, created_at, transaction_id, customer_name, customer_cpf, customer_email,
                   customer_phone, status, file_url, 'comprovante' AS source
            FROM comprovantes
            UNION ALL
            SELECT id, created_at, transaction_id, nome AS customer_name, cpf AS customer_cpf,
                   email AS customer_email, phone AS customer_phone, status,
                   NULL::TEXT AS file_url, 'lead' AS source
            FROM leads
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
