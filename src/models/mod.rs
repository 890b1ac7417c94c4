pub mod client;
pub mod columns;
pub mod export;
pub mod invoice;
pub mod summary;

pub use client::{ExistingClient, PendingClient};
pub use columns::{AliasSpec, ColumnMap, CLIENT_ALIAS_SPECS, INVOICE_ALIAS_SPECS};
pub use export::{InvoiceExportRecord, ItemExportRecord};
pub use invoice::{
    invoice_key, ClientRef, ExistingInvoice, PendingInvoice, PendingLineItem, TaxProfile,
    TaxTotals, TaxType,
};
pub use summary::{ClientImportSummary, ClientUpdate, CommitReport, ImportSummary};
