use std::collections::HashMap;

use sqlx::PgPool;
use tracing::info;

use crate::db::queries;
use crate::error::ImportError;
use crate::models::{ClientImportSummary, ClientRef, CommitReport, ImportSummary};

/// Write a reconciled invoice batch as one database transaction.
///
/// New clients go in first so their ids are available when invoices are
/// linked; tax amounts and totals are recomputed from the invoice's rates,
/// never taken from the input file. Any failure rolls the whole transaction
/// back; the caller may simply re-trigger the import, which is safe because
/// duplicate invoice keys are skipped during reconciliation.
pub async fn commit_invoices(
    pool: &PgPool,
    owner_id: i64,
    summary: &ImportSummary,
) -> Result<CommitReport, ImportError> {
    let mut tx = pool.begin().await?;
    let mut report = CommitReport::default();

    let mut ids_by_token: HashMap<String, i64> = HashMap::new();
    for client in &summary.new_clients {
        let id = queries::insert_client(&mut tx, owner_id, client).await?;
        ids_by_token.insert(client.batch_token(), id);
        report.clients_created += 1;
    }

    for &client_id in &summary.tds_client_updates {
        queries::set_client_tds(&mut tx, client_id).await?;
        report.clients_updated += 1;
    }

    for invoice in &summary.invoices_to_import {
        let client_id = match &invoice.client {
            Some(ClientRef::Existing(id)) => *id,
            Some(ClientRef::New(token)) => *ids_by_token
                .get(token)
                .ok_or(ImportError::MissingField("client"))?,
            None => return Err(ImportError::MissingField("client")),
        };
        let totals = invoice.tax.compute(&invoice.subtotal);
        let invoice_id =
            queries::insert_invoice(&mut tx, owner_id, client_id, invoice, &totals).await?;
        queries::insert_line_items(&mut tx, invoice_id, &invoice.line_items).await?;
        report.invoices_created += 1;
        report.line_items_created += invoice.line_items.len();
    }

    tx.commit().await?;
    info!(
        "Committed import for owner {}: {} clients created, {} updated, {} invoices, {} line items",
        owner_id,
        report.clients_created,
        report.clients_updated,
        report.invoices_created,
        report.line_items_created
    );
    Ok(report)
}

/// Write a reconciled client batch as one database transaction. Matched
/// existing clients are refreshed in place.
pub async fn commit_clients(
    pool: &PgPool,
    owner_id: i64,
    summary: &ClientImportSummary,
) -> Result<CommitReport, ImportError> {
    let mut tx = pool.begin().await?;
    let mut report = CommitReport::default();

    for client in &summary.new_clients {
        queries::insert_client(&mut tx, owner_id, client).await?;
        report.clients_created += 1;
    }
    for update in &summary.clients_to_update {
        queries::update_client(&mut tx, update.id, &update.client).await?;
        report.clients_updated += 1;
    }

    tx.commit().await?;
    info!(
        "Committed client import for owner {}: {} created, {} updated",
        owner_id, report.clients_created, report.clients_updated
    );
    Ok(report)
}
