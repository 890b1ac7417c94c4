pub mod commit;
pub mod export;
pub mod reconcile;

use sqlx::PgPool;
use tracing::info;

use crate::db::queries;
use crate::error::ImportError;
use crate::models::{ClientImportSummary, CommitReport, ImportSummary};
use crate::parser;

/// Import service: one uploaded file is parsed, reconciled against a fresh
/// snapshot of the owner's stored records, and optionally committed. All
/// awaits are sequential; nothing is shared across concurrent imports.
pub struct ImportService {
    pool: PgPool,
}

impl ImportService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Parse and reconcile without committing, so the caller can show the
    /// summary and let the user discard it.
    pub async fn preview_invoices(
        &self,
        owner_id: i64,
        filename: &str,
        bytes: &[u8],
    ) -> Result<ImportSummary, ImportError> {
        let rows = parser::parse_file(filename, bytes)?;
        info!("Parsed {} rows from {}", rows.len(), filename);
        let existing_invoices = queries::list_existing_invoices(&self.pool, owner_id)
            .await
            .map_err(ImportError::Read)?;
        let existing_clients = queries::list_existing_clients(&self.pool, owner_id)
            .await
            .map_err(ImportError::Read)?;
        Ok(reconcile::reconcile_invoices(
            &rows,
            &existing_invoices,
            &existing_clients,
        ))
    }

    /// Full import: reconcile against a fresh snapshot, then commit in one
    /// transaction. Re-running after a failure is safe; already-stored
    /// invoice keys reconcile to duplicates.
    pub async fn import_invoices(
        &self,
        owner_id: i64,
        filename: &str,
        bytes: &[u8],
    ) -> Result<(ImportSummary, CommitReport), ImportError> {
        let summary = self.preview_invoices(owner_id, filename, bytes).await?;
        let report = commit::commit_invoices(&self.pool, owner_id, &summary).await?;
        Ok((summary, report))
    }

    pub async fn preview_clients(
        &self,
        owner_id: i64,
        filename: &str,
        bytes: &[u8],
    ) -> Result<ClientImportSummary, ImportError> {
        let rows = parser::parse_file(filename, bytes)?;
        info!("Parsed {} rows from {}", rows.len(), filename);
        let existing_clients = queries::list_existing_clients(&self.pool, owner_id)
            .await
            .map_err(ImportError::Read)?;
        Ok(reconcile::reconcile_clients(&rows, &existing_clients))
    }

    pub async fn import_clients(
        &self,
        owner_id: i64,
        filename: &str,
        bytes: &[u8],
    ) -> Result<(ClientImportSummary, CommitReport), ImportError> {
        let summary = self.preview_clients(owner_id, filename, bytes).await?;
        let report = commit::commit_clients(&self.pool, owner_id, &summary).await?;
        Ok((summary, report))
    }

    /// Round-trip CSV export of all the owner's invoices.
    pub async fn export_invoices(&self, owner_id: i64) -> Result<String, ImportError> {
        let invoices = queries::list_invoices_for_export(&self.pool, owner_id)
            .await
            .map_err(ImportError::Read)?;
        let ids: Vec<i64> = invoices.iter().map(|inv| inv.id).collect();
        let items = queries::list_items_for_export(&self.pool, &ids)
            .await
            .map_err(ImportError::Read)?;
        export::write_invoices_csv(&invoices, &items)
    }
}
