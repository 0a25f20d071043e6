use crate::models::NewLead;
use crate::storage::Store;
use std::sync::Arc;

/// Best-effort lead persistence for the payment flow.
///
/// A lost lead must never cost a sale, so failures are logged and swallowed.
#[derive(Clone)]
pub struct LeadRecorder {
    store: Option<Arc<dyn Store>>,
}

impl LeadRecorder {
    pub fn new(store: Option<Arc<dyn Store>>) -> Self {
        Self { store }
    }

    pub async fn record(&self, lead: NewLead) {
        let Some(store) = self.store.as_ref() else {
            tracing::debug!("[LEADS] No database configured, skipping {} lead", lead.source);
            return;
        };

        if let Err(e) = store.insert_lead(&lead).await {
            tracing::error!("[LEADS] Failed to save {} lead: {}", lead.source, e);
        }
    }
}
