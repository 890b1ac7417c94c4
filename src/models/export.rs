use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One stored invoice joined to its client, as read back for CSV export.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InvoiceExportRecord {
    pub id: i64,
    pub invoice_number: String,
    pub invoice_date: String,
    pub due_date: String,
    pub order_number: Option<String>,
    pub subject: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub tax_type: String,
    pub tds: bool,
    pub tds_amount: BigDecimal,
    pub cgst_rate: BigDecimal,
    pub sgst_rate: BigDecimal,
    pub igst_rate: BigDecimal,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_gstin: Option<String>,
    pub customer_pan: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub customer_type: String,
}

/// One stored line item, tied back to its invoice for export grouping.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ItemExportRecord {
    pub invoice_id: i64,
    pub description: String,
    pub sac_code: Option<String>,
    pub quantity: BigDecimal,
    pub rate: BigDecimal,
}
