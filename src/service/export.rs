use std::collections::HashMap;

use crate::error::ImportError;
use crate::models::{InvoiceExportRecord, ItemExportRecord};

/// The import column set, mirrored exactly so exports re-import cleanly.
const EXPORT_HEADERS: &[&str] = &[
    "Invoice Number",
    "Invoice Date",
    "Due Date",
    "Order Number",
    "Subject",
    "Status",
    "Notes",
    "Terms",
    "Tax Type",
    "TDS",
    "TDS Amount",
    "CGST Rate",
    "SGST Rate",
    "IGST Rate",
    "Customer Name",
    "Customer Email",
    "Customer GSTIN",
    "Customer PAN",
    "Customer Phone",
    "Customer Address",
    "Customer Type",
    "Item Description",
    "Item SAC",
    "Item Quantity",
    "Item Rate",
];

fn opt(val: &Option<String>) -> String {
    val.clone().unwrap_or_default()
}

/// Render invoices as round-trip-compatible CSV: one row per line item,
/// invoice and customer header fields repeated on every row, taxes expressed
/// as percentage rates rather than absolute amounts.
pub fn write_invoices_csv(
    invoices: &[InvoiceExportRecord],
    items: &[ItemExportRecord],
) -> Result<String, ImportError> {
    let mut items_by_invoice: HashMap<i64, Vec<&ItemExportRecord>> = HashMap::new();
    for item in items {
        items_by_invoice.entry(item.invoice_id).or_default().push(item);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADERS)?;

    for invoice in invoices {
        let invoice_items = items_by_invoice.get(&invoice.id);
        for item in invoice_items.into_iter().flatten() {
            writer.write_record(&[
                invoice.invoice_number.clone(),
                invoice.invoice_date.clone(),
                invoice.due_date.clone(),
                opt(&invoice.order_number),
                opt(&invoice.subject),
                invoice.status.clone(),
                opt(&invoice.notes),
                opt(&invoice.terms),
                invoice.tax_type.clone(),
                if invoice.tds { "Yes" } else { "No" }.to_string(),
                invoice.tds_amount.to_string(),
                invoice.cgst_rate.to_string(),
                invoice.sgst_rate.to_string(),
                invoice.igst_rate.to_string(),
                invoice.customer_name.clone(),
                opt(&invoice.customer_email),
                opt(&invoice.customer_gstin),
                opt(&invoice.customer_pan),
                opt(&invoice.customer_phone),
                opt(&invoice.customer_address),
                invoice.customer_type.clone(),
                item.description.clone(),
                opt(&item.sac_code),
                item.quantity.to_string(),
                item.rate.to_string(),
            ])?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ImportError::Parse(format!("csv buffer error: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ImportError::Parse(format!("csv not utf-8: {e}")))
}
