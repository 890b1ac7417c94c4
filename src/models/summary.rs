use serde::{Deserialize, Serialize};

use crate::models::client::PendingClient;
use crate::models::invoice::PendingInvoice;

/// Output of one invoice reconciliation pass: counts plus the fully resolved
/// batch, ready for commit. Built once per import attempt, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub unique_invoices: usize,
    pub new_customers: usize,
    pub reused_customers: usize,
    /// Distinct invoice keys already present in the stored snapshot.
    pub duplicates_skipped: usize,
    /// Rows missing the invoice number or date, counted and dropped.
    pub rows_skipped: usize,
    pub invoices_to_import: Vec<PendingInvoice>,
    pub new_clients: Vec<PendingClient>,
    /// Stored client ids whose TDS flag must be set at commit because an
    /// invoice in this batch carries a TDS deduction.
    pub tds_client_updates: Vec<i64>,
}

/// A matched stored client refreshed from an import row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientUpdate {
    pub id: i64,
    pub client: PendingClient,
}

/// Output of the standalone client import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientImportSummary {
    pub total_rows: usize,
    /// Rows with no display name, email, or GSTIN; counted, never silently
    /// dropped.
    pub rows_skipped: usize,
    /// Rows that collapsed onto a client already seen earlier in the file.
    pub duplicate_rows: usize,
    pub new_clients: Vec<PendingClient>,
    pub clients_to_update: Vec<ClientUpdate>,
}

/// What one commit transaction actually wrote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitReport {
    pub clients_created: usize,
    pub clients_updated: usize,
    pub invoices_created: usize,
    pub line_items_created: usize,
}
