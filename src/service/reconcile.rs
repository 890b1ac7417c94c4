use std::collections::{BTreeSet, HashSet};

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use indexmap::IndexMap;
use tracing::info;

use crate::models::columns::{self, ColumnMap, CLIENT_ALIAS_SPECS, INVOICE_ALIAS_SPECS};
use crate::models::{
    invoice_key, ClientImportSummary, ClientRef, ClientUpdate, ExistingClient, ExistingInvoice,
    ImportSummary, PendingClient, PendingInvoice, PendingLineItem, TaxProfile, TaxType,
};
use crate::parser::{excel_serial_to_date, CellValue, RowRecord};

/// Aggregate parsed rows into a deduplicated, identity-resolved import batch.
///
/// Single pass over the rows groups them by `(invoice_number, invoice_date)`
/// and filters out keys already present in the stored snapshot; a second pass
/// over the aggregated invoices resolves each one to an existing client or
/// mints a new one. Snapshots are read-only throughout.
pub fn reconcile_invoices(
    rows: &[RowRecord],
    existing_invoices: &[ExistingInvoice],
    existing_clients: &[ExistingClient],
) -> ImportSummary {
    let cols = ColumnMap::resolve(INVOICE_ALIAS_SPECS, rows);

    let existing_keys: HashSet<String> = existing_invoices
        .iter()
        .map(|inv| invoice_key(&inv.invoice_number, &inv.invoice_date))
        .collect();

    let mut pending: IndexMap<String, PendingInvoice> = IndexMap::new();
    let mut duplicate_keys: HashSet<String> = HashSet::new();
    let mut rows_skipped = 0usize;

    for row in rows {
        let Some(number) = cols.text(row, columns::INVOICE_NUMBER) else {
            rows_skipped += 1;
            continue;
        };
        let Some(date) = cols.cell(row, columns::INVOICE_DATE).and_then(normalize_date) else {
            rows_skipped += 1;
            continue;
        };

        let key = invoice_key(&number, &date);
        if existing_keys.contains(&key) {
            // Idempotence: re-importing the same file is a no-op.
            duplicate_keys.insert(key);
            continue;
        }

        let invoice = pending
            .entry(key)
            .or_insert_with(|| invoice_header_from_row(&cols, row, number, date));
        invoice.push_line_item(line_item_from_row(&cols, row));
    }

    // Identity resolution, in aggregation order.
    let mut batch_clients: IndexMap<String, PendingClient> = IndexMap::new();
    let mut tds_updates: BTreeSet<i64> = BTreeSet::new();
    let mut new_customers = 0usize;
    let mut reused_customers = 0usize;

    for invoice in pending.values_mut() {
        let resolved = find_client_match(
            existing_clients,
            &batch_clients,
            invoice.customer_gstin.as_deref(),
            invoice.customer_email.as_deref(),
            &invoice.customer_name,
        );
        match resolved {
            Some(ClientRef::Existing(id)) => {
                reused_customers += 1;
                if invoice.tds {
                    let already_flagged = existing_clients
                        .iter()
                        .any(|c| c.id == id && c.tds_deducting);
                    if !already_flagged {
                        tds_updates.insert(id);
                    }
                }
                invoice.client = Some(ClientRef::Existing(id));
            }
            Some(ClientRef::New(token)) => {
                reused_customers += 1;
                if invoice.tds {
                    if let Some(client) = batch_clients.get_mut(&token) {
                        client.tds_deducting = true;
                    }
                }
                invoice.client = Some(ClientRef::New(token));
            }
            None => {
                let client = client_from_invoice(invoice);
                let token = client.batch_token();
                // A token can recur without a tier match (e.g. rows with no
                // customer fields at all); that is a reuse, not a new mint.
                if let Some(minted) = batch_clients.get_mut(&token) {
                    reused_customers += 1;
                    if invoice.tds {
                        minted.tds_deducting = true;
                    }
                } else {
                    batch_clients.insert(token.clone(), client);
                    new_customers += 1;
                }
                invoice.client = Some(ClientRef::New(token));
            }
        }
    }

    let summary = ImportSummary {
        total_rows: rows.len(),
        unique_invoices: pending.len(),
        new_customers,
        reused_customers,
        duplicates_skipped: duplicate_keys.len(),
        rows_skipped,
        invoices_to_import: pending.into_values().collect(),
        new_clients: batch_clients.into_values().collect(),
        tds_client_updates: tds_updates.into_iter().collect(),
    };
    info!(
        "Reconciled {} rows: {} invoices, {} new customers, {} reused, {} duplicates skipped, {} rows skipped",
        summary.total_rows,
        summary.unique_invoices,
        summary.new_customers,
        summary.reused_customers,
        summary.duplicates_skipped,
        summary.rows_skipped
    );
    summary
}

/// Standalone client import: the same three-tier matching applied directly to
/// rows, with the parallel in-file dedup set. Matched stored clients become
/// updates, never errors.
pub fn reconcile_clients(
    rows: &[RowRecord],
    existing_clients: &[ExistingClient],
) -> ClientImportSummary {
    let cols = ColumnMap::resolve(CLIENT_ALIAS_SPECS, rows);

    let mut batch: IndexMap<String, PendingClient> = IndexMap::new();
    let mut updates: Vec<ClientUpdate> = Vec::new();
    let mut updated_ids: HashSet<i64> = HashSet::new();
    let mut rows_skipped = 0usize;
    let mut duplicate_rows = 0usize;

    for row in rows {
        let client = client_from_row(&cols, row);
        if client.is_anonymous() {
            rows_skipped += 1;
            continue;
        }
        let resolved = find_client_match(
            existing_clients,
            &batch,
            client.gstin.as_deref(),
            client.email.as_deref(),
            &client.display_name,
        );
        match resolved {
            Some(ClientRef::Existing(id)) => {
                if updated_ids.insert(id) {
                    updates.push(ClientUpdate { id, client });
                } else {
                    duplicate_rows += 1;
                }
            }
            Some(ClientRef::New(_)) => {
                duplicate_rows += 1;
            }
            None => {
                batch.insert(client.batch_token(), client);
            }
        }
    }

    let summary = ClientImportSummary {
        total_rows: rows.len(),
        rows_skipped,
        duplicate_rows,
        new_clients: batch.into_values().collect(),
        clients_to_update: updates,
    };
    info!(
        "Reconciled {} client rows: {} new, {} to update, {} duplicates, {} skipped",
        summary.total_rows,
        summary.new_clients.len(),
        summary.clients_to_update.len(),
        summary.duplicate_rows,
        summary.rows_skipped
    );
    summary
}

/// Three-tier identity resolution: GSTIN, then email, then case-insensitive
/// display name. Each tier checks the stored snapshot first, then clients
/// already minted in this batch. First match wins.
fn find_client_match(
    existing: &[ExistingClient],
    batch: &IndexMap<String, PendingClient>,
    gstin: Option<&str>,
    email: Option<&str>,
    name: &str,
) -> Option<ClientRef> {
    if let Some(g) = gstin.map(str::trim).filter(|g| !g.is_empty()) {
        if let Some(c) = existing
            .iter()
            .find(|c| c.gstin.as_deref().map(str::trim) == Some(g))
        {
            return Some(ClientRef::Existing(c.id));
        }
        if let Some((token, _)) = batch
            .iter()
            .find(|(_, c)| c.gstin.as_deref().map(str::trim) == Some(g))
        {
            return Some(ClientRef::New(token.clone()));
        }
    }
    if let Some(e) = email.map(str::trim).filter(|e| !e.is_empty()) {
        if let Some(c) = existing
            .iter()
            .find(|c| c.email.as_deref().map(str::trim) == Some(e))
        {
            return Some(ClientRef::Existing(c.id));
        }
        if let Some((token, _)) = batch
            .iter()
            .find(|(_, c)| c.email.as_deref().map(str::trim) == Some(e))
        {
            return Some(ClientRef::New(token.clone()));
        }
    }
    let name = name.trim();
    if !name.is_empty() {
        if let Some(c) = existing
            .iter()
            .find(|c| c.display_name.trim().eq_ignore_ascii_case(name))
        {
            return Some(ClientRef::Existing(c.id));
        }
        if let Some((token, _)) = batch
            .iter()
            .find(|(_, c)| c.display_name.eq_ignore_ascii_case(name))
        {
            return Some(ClientRef::New(token.clone()));
        }
    }
    None
}

/// Normalize a date cell to ISO `YYYY-MM-DD`. Spreadsheet serials convert via
/// the 1899-12-30 epoch; ISO strings pass through; other strings go through a
/// multi-format fallback (day-first before month-first). A value that does
/// not normalize is kept as its trimmed string form rather than rejected.
pub fn normalize_date(cell: &CellValue) -> Option<String> {
    const FALLBACK_FORMATS: &[&str] = &["%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d/%m/%y"];

    match cell {
        CellValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        CellValue::Number(serial) => Some(match excel_serial_to_date(*serial) {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => serial.to_string(),
        }),
        CellValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() {
                return Some(s.to_string());
            }
            for fmt in FALLBACK_FORMATS {
                if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                    return Some(d.format("%Y-%m-%d").to_string());
                }
            }
            Some(s.to_string())
        }
    }
}

/// Header fields come from the first row of each invoice group. Due Date
/// falls back to the row's own Invoice Date when absent.
fn invoice_header_from_row(
    cols: &ColumnMap,
    row: &RowRecord,
    number: String,
    date: String,
) -> PendingInvoice {
    let due_date = cols
        .cell(row, columns::DUE_DATE)
        .and_then(normalize_date)
        .unwrap_or_else(|| date.clone());

    let defaults = TaxProfile::default();
    let tax = TaxProfile {
        tax_type: TaxType::from_label(cols.text(row, columns::TAX_TYPE).as_deref()),
        cgst_rate: cols
            .decimal(row, columns::CGST_RATE)
            .unwrap_or(defaults.cgst_rate),
        sgst_rate: cols
            .decimal(row, columns::SGST_RATE)
            .unwrap_or(defaults.sgst_rate),
        igst_rate: cols
            .decimal(row, columns::IGST_RATE)
            .unwrap_or(defaults.igst_rate),
    };

    PendingInvoice {
        invoice_number: number,
        invoice_date: date,
        due_date,
        order_number: cols.text(row, columns::ORDER_NUMBER),
        subject: cols.text(row, columns::SUBJECT),
        status: cols
            .text(row, columns::STATUS)
            .unwrap_or_else(|| "draft".to_string()),
        notes: cols.text(row, columns::NOTES),
        terms: cols.text(row, columns::TERMS),
        tax,
        tds: cols.flag(row, columns::TDS),
        tds_amount: cols
            .decimal(row, columns::TDS_AMOUNT)
            .unwrap_or_else(|| BigDecimal::from(0)),
        customer_name: cols.text(row, columns::CUSTOMER_NAME).unwrap_or_default(),
        customer_email: cols.text(row, columns::CUSTOMER_EMAIL),
        customer_gstin: cols.text(row, columns::CUSTOMER_GSTIN),
        customer_pan: cols.text(row, columns::CUSTOMER_PAN),
        customer_phone: cols.text(row, columns::CUSTOMER_PHONE),
        customer_address: cols.text(row, columns::CUSTOMER_ADDRESS),
        customer_type: cols
            .text(row, columns::CUSTOMER_TYPE)
            .unwrap_or_else(|| "business".to_string()),
        line_items: Vec::new(),
        subtotal: BigDecimal::from(0),
        client: None,
    }
}

/// Every row contributes exactly one line item.
fn line_item_from_row(cols: &ColumnMap, row: &RowRecord) -> PendingLineItem {
    PendingLineItem::new(
        cols.text(row, columns::ITEM_DESCRIPTION)
            .unwrap_or_else(|| "Service".to_string()),
        cols.text(row, columns::ITEM_SAC),
        cols.decimal(row, columns::ITEM_QUANTITY)
            .unwrap_or_else(|| BigDecimal::from(1)),
        cols.decimal(row, columns::ITEM_RATE)
            .unwrap_or_else(|| BigDecimal::from(0)),
    )
}

fn client_from_invoice(invoice: &PendingInvoice) -> PendingClient {
    PendingClient {
        display_name: invoice.customer_name.clone(),
        email: invoice.customer_email.clone(),
        gstin: invoice.customer_gstin.clone(),
        pan: invoice.customer_pan.clone(),
        phone: invoice.customer_phone.clone(),
        address: invoice.customer_address.clone(),
        customer_type: invoice.customer_type.clone(),
        tds_deducting: invoice.tds,
        ..PendingClient::default()
    }
}

fn client_from_row(cols: &ColumnMap, row: &RowRecord) -> PendingClient {
    PendingClient {
        display_name: cols.text(row, columns::DISPLAY_NAME).unwrap_or_default(),
        company_name: cols.text(row, columns::COMPANY_NAME),
        email: cols.text(row, columns::EMAIL),
        gstin: cols.text(row, columns::GSTIN),
        pan: cols.text(row, columns::PAN),
        tan: cols.text(row, columns::TAN),
        phone: cols.text(row, columns::PHONE),
        work_phone: cols.text(row, columns::WORK_PHONE),
        mobile: cols.text(row, columns::MOBILE),
        address: cols.text(row, columns::ADDRESS),
        customer_type: "business".to_string(),
        currency: cols.text(row, columns::CURRENCY),
        payment_terms: cols.text(row, columns::PAYMENT_TERMS),
        custom_term_days: cols
            .text(row, columns::CUSTOM_TERM_DAYS)
            .and_then(|v| v.parse().ok()),
        tds_deducting: cols.flag(row, columns::TDS_DEDUCTING),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn row(pairs: &[(&str, &str)]) -> RowRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), CellValue::Text(v.to_string())))
            .collect()
    }

    fn invoice_row(number: &str, date: &str, customer: &str, rate: &str, qty: &str) -> RowRecord {
        row(&[
            ("Invoice Number", number),
            ("Invoice Date", date),
            ("Customer Name", customer),
            ("Item Rate", rate),
            ("Item Quantity", qty),
        ])
    }

    fn existing_client(id: i64, name: &str, email: Option<&str>, gstin: Option<&str>) -> ExistingClient {
        ExistingClient {
            id,
            display_name: name.to_string(),
            email: email.map(String::from),
            gstin: gstin.map(String::from),
            tds_deducting: false,
        }
    }

    #[test]
    fn test_line_item_aggregation() {
        let rows = vec![
            invoice_row("INV-1", "2024-04-01", "Acme", "100", "1"),
            invoice_row("INV-1", "2024-04-01", "Acme", "200", "1"),
            invoice_row("INV-1", "2024-04-01", "Acme", "50", "2"),
        ];
        let summary = reconcile_invoices(&rows, &[], &[]);
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.unique_invoices, 1);
        let invoice = &summary.invoices_to_import[0];
        assert_eq!(invoice.line_items.len(), 3);
        assert_eq!(invoice.subtotal, dec("400"));
    }

    #[test]
    fn test_idempotence_against_existing_snapshot() {
        let rows = vec![
            invoice_row("INV-1", "2024-04-01", "Acme", "100", "1"),
            invoice_row("INV-1", "2024-04-01", "Acme", "200", "1"),
            invoice_row("INV-2", "2024-04-02", "Acme", "50", "1"),
        ];
        let first = reconcile_invoices(&rows, &[], &[]);
        assert_eq!(first.unique_invoices, 2);
        assert_eq!(first.duplicates_skipped, 0);

        // Second import of the identical file against the grown snapshot.
        let snapshot: Vec<ExistingInvoice> = first
            .invoices_to_import
            .iter()
            .enumerate()
            .map(|(i, inv)| ExistingInvoice {
                id: i as i64 + 1,
                invoice_number: inv.invoice_number.clone(),
                invoice_date: inv.invoice_date.clone(),
            })
            .collect();
        let second = reconcile_invoices(&rows, &snapshot, &[]);
        assert_eq!(second.unique_invoices, 0);
        assert!(second.invoices_to_import.is_empty());
        assert_eq!(second.duplicates_skipped, first.unique_invoices);
        assert_eq!(second.new_customers, 0);
    }

    #[test]
    fn test_identity_priority_gstin_over_email() {
        let existing = vec![
            existing_client(1, "Client A", None, Some("29AAACA1111A1Z5")),
            existing_client(2, "Client B", Some("b@example.com"), None),
        ];
        let mut r = invoice_row("INV-1", "2024-04-01", "Someone Else", "100", "1");
        r.insert(
            "Customer GSTIN".to_string(),
            CellValue::Text("29AAACA1111A1Z5".to_string()),
        );
        r.insert(
            "Customer Email".to_string(),
            CellValue::Text("b@example.com".to_string()),
        );
        let summary = reconcile_invoices(&[r], &[], &existing);
        assert_eq!(
            summary.invoices_to_import[0].client,
            Some(ClientRef::Existing(1))
        );
        assert_eq!(summary.reused_customers, 1);
        assert_eq!(summary.new_customers, 0);
    }

    #[test]
    fn test_in_batch_new_client_collapse() {
        let mut r1 = invoice_row("INV-1", "2024-04-01", "Fresh Co", "100", "1");
        r1.insert(
            "Customer GSTIN".to_string(),
            CellValue::Text("27AAACF0000F1Z1".to_string()),
        );
        let mut r2 = invoice_row("INV-2", "2024-04-02", "Fresh Co", "200", "1");
        r2.insert(
            "Customer GSTIN".to_string(),
            CellValue::Text("27AAACF0000F1Z1".to_string()),
        );
        let summary = reconcile_invoices(&[r1, r2], &[], &[]);
        assert_eq!(summary.unique_invoices, 2);
        assert_eq!(summary.new_clients.len(), 1);
        assert_eq!(summary.new_customers, 1);
        assert_eq!(summary.reused_customers, 1);
    }

    #[test]
    fn test_anonymous_customers_mint_one_client() {
        // No customer columns at all: both invoices share the empty batch
        // token and must resolve to a single minted client.
        let rows = vec![
            row(&[("Invoice Number", "INV-1"), ("Invoice Date", "2024-04-01")]),
            row(&[("Invoice Number", "INV-2"), ("Invoice Date", "2024-04-02")]),
        ];
        let summary = reconcile_invoices(&rows, &[], &[]);
        assert_eq!(summary.new_clients.len(), 1);
        assert_eq!(summary.new_customers, 1);
        assert_eq!(summary.reused_customers, 1);
        assert_eq!(
            summary.invoices_to_import[0].client,
            summary.invoices_to_import[1].client
        );
    }

    #[test]
    fn test_stored_gstin_with_padding_still_matches() {
        let existing = vec![existing_client(
            5,
            "Fresh Co",
            Some(" a@fresh.in "),
            Some(" 27AAACF0000F1Z1 "),
        )];
        let mut r = invoice_row("INV-1", "2024-04-01", "Someone Else", "100", "1");
        r.insert(
            "Customer GSTIN".to_string(),
            CellValue::Text("27AAACF0000F1Z1".to_string()),
        );
        let summary = reconcile_invoices(&[r], &[], &existing);
        assert_eq!(
            summary.invoices_to_import[0].client,
            Some(ClientRef::Existing(5))
        );
        assert!(summary.new_clients.is_empty());
    }

    #[test]
    fn test_case_insensitive_name_match() {
        let existing = vec![existing_client(7, "Acme Corp", None, None)];
        let rows = vec![invoice_row("INV-1", "2024-04-01", "ACME CORP", "100", "1")];
        let summary = reconcile_invoices(&rows, &[], &existing);
        assert_eq!(
            summary.invoices_to_import[0].client,
            Some(ClientRef::Existing(7))
        );
    }

    #[test]
    fn test_skip_accounting_for_keyless_rows() {
        let rows = vec![
            row(&[("Item Rate", "100")]),
            invoice_row("INV-1", "2024-04-01", "Acme", "100", "1"),
        ];
        let summary = reconcile_invoices(&rows, &[], &[]);
        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(summary.unique_invoices, 1);
        assert_eq!(summary.duplicates_skipped, 0);
    }

    #[test]
    fn test_date_normalization_variants() {
        assert_eq!(
            normalize_date(&CellValue::Number(45000.0)).as_deref(),
            Some("2023-03-15")
        );
        assert_eq!(
            normalize_date(&CellValue::Text("2024-04-01".to_string())).as_deref(),
            Some("2024-04-01")
        );
        assert_eq!(
            normalize_date(&CellValue::Text("01/04/2024".to_string())).as_deref(),
            Some("2024-04-01")
        );
        // Unparseable values keep their trimmed string form.
        assert_eq!(
            normalize_date(&CellValue::Text("  Q1 FY24  ".to_string())).as_deref(),
            Some("Q1 FY24")
        );
        assert_eq!(normalize_date(&CellValue::Text("   ".to_string())), None);
    }

    #[test]
    fn test_due_date_falls_back_to_invoice_date() {
        let rows = vec![invoice_row("INV-1", "2024-04-01", "Acme", "100", "1")];
        let summary = reconcile_invoices(&rows, &[], &[]);
        assert_eq!(summary.invoices_to_import[0].due_date, "2024-04-01");
    }

    #[test]
    fn test_line_item_defaults() {
        let rows = vec![row(&[
            ("Invoice Number", "INV-1"),
            ("Invoice Date", "2024-04-01"),
        ])];
        let summary = reconcile_invoices(&rows, &[], &[]);
        let item = &summary.invoices_to_import[0].line_items[0];
        assert_eq!(item.description, "Service");
        assert_eq!(item.quantity, dec("1"));
        assert_eq!(item.rate, dec("0"));
        assert_eq!(item.amount, dec("0"));
    }

    #[test]
    fn test_tds_annotates_matched_existing_client() {
        let mut unflagged = existing_client(3, "Acme", None, None);
        unflagged.tds_deducting = false;
        let mut flagged = existing_client(4, "Beta", None, None);
        flagged.tds_deducting = true;

        let mut r1 = invoice_row("INV-1", "2024-04-01", "Acme", "100", "1");
        r1.insert("TDS".to_string(), CellValue::Text("Yes".to_string()));
        let mut r2 = invoice_row("INV-2", "2024-04-01", "Beta", "100", "1");
        r2.insert("TDS".to_string(), CellValue::Text("Yes".to_string()));

        let summary = reconcile_invoices(&[r1, r2], &[], &[unflagged, flagged]);
        assert_eq!(summary.tds_client_updates, vec![3]);
    }

    #[test]
    fn test_client_import_skips_and_counts_anonymous_rows() {
        let rows = vec![
            row(&[("Phone", "12345")]),
            row(&[("Display Name", "Acme")]),
        ];
        let summary = reconcile_clients(&rows, &[]);
        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(summary.new_clients.len(), 1);
    }

    #[test]
    fn test_client_import_updates_matched_existing() {
        let existing = vec![existing_client(9, "Acme", Some("a@acme.in"), None)];
        let rows = vec![row(&[
            ("Display Name", "Acme Renamed"),
            ("Email", "a@acme.in"),
        ])];
        let summary = reconcile_clients(&rows, &existing);
        assert!(summary.new_clients.is_empty());
        assert_eq!(summary.clients_to_update.len(), 1);
        assert_eq!(summary.clients_to_update[0].id, 9);
        assert_eq!(summary.clients_to_update[0].client.display_name, "Acme Renamed");
    }

    #[test]
    fn test_client_import_collapses_in_file_duplicates() {
        let rows = vec![
            row(&[("Display Name", "Acme"), ("GSTIN", "27AAACF0000F1Z1")]),
            row(&[("Display Name", "ACME"), ("GSTIN", "27AAACF0000F1Z1")]),
        ];
        let summary = reconcile_clients(&rows, &[]);
        assert_eq!(summary.new_clients.len(), 1);
        assert_eq!(summary.duplicate_rows, 1);
    }
}
