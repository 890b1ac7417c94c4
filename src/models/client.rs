use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A candidate new client minted during reconciliation. Never written to the
/// database until the commit executor runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingClient {
    pub display_name: String,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub gstin: Option<String>,
    pub pan: Option<String>,
    pub tan: Option<String>,
    pub phone: Option<String>,
    pub work_phone: Option<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub customer_type: String,
    pub currency: Option<String>,
    pub payment_terms: Option<String>,
    pub custom_term_days: Option<i32>,
    pub tds_deducting: bool,
}

impl PendingClient {
    /// In-batch deduplication token: GSTIN, else email, else the lowercased
    /// display name. Two rows for the same new customer in one file collapse
    /// onto this key.
    pub fn batch_token(&self) -> String {
        if let Some(gstin) = self.gstin.as_deref().filter(|g| !g.is_empty()) {
            return gstin.to_string();
        }
        if let Some(email) = self.email.as_deref().filter(|e| !e.is_empty()) {
            return email.to_string();
        }
        self.display_name.to_lowercase()
    }

    /// True when no identity field (name, email, GSTIN) is present.
    pub fn is_anonymous(&self) -> bool {
        self.display_name.is_empty()
            && self.email.as_deref().map_or(true, str::is_empty)
            && self.gstin.as_deref().map_or(true, str::is_empty)
    }
}

/// Read-only snapshot of a stored client, used for identity matching only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExistingClient {
    pub id: i64,
    pub display_name: String,
    pub email: Option<String>,
    pub gstin: Option<String>,
    pub tds_deducting: bool,
}
