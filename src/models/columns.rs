use std::collections::HashMap;

use bigdecimal::BigDecimal;
use std::str::FromStr;

use crate::parser::{CellValue, RowRecord};

/// Canonical field names used by the reconciliation engine.
pub const INVOICE_NUMBER: &str = "invoice_number";
pub const INVOICE_DATE: &str = "invoice_date";
pub const DUE_DATE: &str = "due_date";
pub const ORDER_NUMBER: &str = "order_number";
pub const SUBJECT: &str = "subject";
pub const STATUS: &str = "status";
pub const NOTES: &str = "notes";
pub const TERMS: &str = "terms";
pub const TAX_TYPE: &str = "tax_type";
pub const TDS: &str = "tds";
pub const TDS_AMOUNT: &str = "tds_amount";
pub const CGST_RATE: &str = "cgst_rate";
pub const SGST_RATE: &str = "sgst_rate";
pub const IGST_RATE: &str = "igst_rate";
pub const CUSTOMER_NAME: &str = "customer_name";
pub const CUSTOMER_EMAIL: &str = "customer_email";
pub const CUSTOMER_GSTIN: &str = "customer_gstin";
pub const CUSTOMER_PAN: &str = "customer_pan";
pub const CUSTOMER_PHONE: &str = "customer_phone";
pub const CUSTOMER_ADDRESS: &str = "customer_address";
pub const CUSTOMER_TYPE: &str = "customer_type";
pub const ITEM_DESCRIPTION: &str = "item_description";
pub const ITEM_SAC: &str = "item_sac";
pub const ITEM_QUANTITY: &str = "item_quantity";
pub const ITEM_RATE: &str = "item_rate";

pub const DISPLAY_NAME: &str = "display_name";
pub const COMPANY_NAME: &str = "company_name";
pub const EMAIL: &str = "email";
pub const PHONE: &str = "phone";
pub const WORK_PHONE: &str = "work_phone";
pub const MOBILE: &str = "mobile";
pub const GSTIN: &str = "gstin";
pub const PAN: &str = "pan";
pub const TAN: &str = "tan";
pub const ADDRESS: &str = "address";
pub const CURRENCY: &str = "currency";
pub const PAYMENT_TERMS: &str = "payment_terms";
pub const CUSTOM_TERM_DAYS: &str = "custom_term_days";
pub const TDS_DEDUCTING: &str = "tds_deducting";

/// One canonical field and the header spellings accepted for it.
/// Aliases are stored lowercase; headers are matched trim + case-insensitive.
#[derive(Debug)]
pub struct AliasSpec {
    pub field: &'static str,
    pub aliases: &'static [&'static str],
}

pub const INVOICE_ALIAS_SPECS: &[AliasSpec] = &[
    AliasSpec {
        field: INVOICE_NUMBER,
        aliases: &["invoice number", "invoice no", "invoice #"],
    },
    AliasSpec {
        field: INVOICE_DATE,
        aliases: &["invoice date"],
    },
    AliasSpec {
        field: DUE_DATE,
        aliases: &["due date"],
    },
    AliasSpec {
        field: ORDER_NUMBER,
        aliases: &["order number", "po number", "order/po number"],
    },
    AliasSpec {
        field: SUBJECT,
        aliases: &["subject"],
    },
    AliasSpec {
        field: STATUS,
        aliases: &["status", "invoice status"],
    },
    AliasSpec {
        field: NOTES,
        aliases: &["notes"],
    },
    AliasSpec {
        field: TERMS,
        aliases: &["terms", "terms & conditions"],
    },
    AliasSpec {
        field: TAX_TYPE,
        aliases: &["tax type"],
    },
    AliasSpec {
        field: TDS,
        aliases: &["tds"],
    },
    AliasSpec {
        field: TDS_AMOUNT,
        aliases: &["tds amount"],
    },
    AliasSpec {
        field: CGST_RATE,
        aliases: &["cgst rate", "cgst rate (%)", "cgst"],
    },
    AliasSpec {
        field: SGST_RATE,
        aliases: &["sgst rate", "sgst rate (%)", "sgst"],
    },
    AliasSpec {
        field: IGST_RATE,
        aliases: &["igst rate", "igst rate (%)", "igst"],
    },
    AliasSpec {
        field: CUSTOMER_NAME,
        aliases: &["customer name", "client name", "display name"],
    },
    AliasSpec {
        field: CUSTOMER_EMAIL,
        aliases: &["customer email", "email"],
    },
    AliasSpec {
        field: CUSTOMER_GSTIN,
        aliases: &["customer gstin", "gstin"],
    },
    AliasSpec {
        field: CUSTOMER_PAN,
        aliases: &["customer pan", "pan"],
    },
    AliasSpec {
        field: CUSTOMER_PHONE,
        aliases: &["customer phone", "phone"],
    },
    AliasSpec {
        field: CUSTOMER_ADDRESS,
        aliases: &["customer address", "address"],
    },
    AliasSpec {
        field: CUSTOMER_TYPE,
        aliases: &["customer type"],
    },
    AliasSpec {
        field: ITEM_DESCRIPTION,
        aliases: &["item description", "description"],
    },
    AliasSpec {
        field: ITEM_SAC,
        aliases: &["item sac", "sac", "sac code"],
    },
    AliasSpec {
        field: ITEM_QUANTITY,
        aliases: &["item quantity", "quantity", "qty"],
    },
    AliasSpec {
        field: ITEM_RATE,
        aliases: &["item rate", "rate"],
    },
];

pub const CLIENT_ALIAS_SPECS: &[AliasSpec] = &[
    AliasSpec {
        field: DISPLAY_NAME,
        aliases: &["display name", "customer name", "name"],
    },
    AliasSpec {
        field: COMPANY_NAME,
        aliases: &["company name", "company"],
    },
    AliasSpec {
        field: EMAIL,
        aliases: &["email", "email address"],
    },
    AliasSpec {
        field: PHONE,
        aliases: &["phone", "phone number"],
    },
    AliasSpec {
        field: WORK_PHONE,
        aliases: &["work phone"],
    },
    AliasSpec {
        field: MOBILE,
        aliases: &["mobile", "mobile phone"],
    },
    AliasSpec {
        field: GSTIN,
        aliases: &["gstin"],
    },
    AliasSpec {
        field: PAN,
        aliases: &["pan"],
    },
    AliasSpec {
        field: TAN,
        aliases: &["tan"],
    },
    AliasSpec {
        field: ADDRESS,
        aliases: &["address", "billing address"],
    },
    AliasSpec {
        field: CURRENCY,
        aliases: &["currency"],
    },
    AliasSpec {
        field: PAYMENT_TERMS,
        aliases: &["payment terms"],
    },
    AliasSpec {
        field: CUSTOM_TERM_DAYS,
        aliases: &["custom term days"],
    },
    AliasSpec {
        field: TDS_DEDUCTING,
        aliases: &["tds deducting", "tds"],
    },
];

/// Per-file mapping from canonical field to the header string that actually
/// appears in the uploaded file. Resolved once per import.
#[derive(Debug, Default)]
pub struct ColumnMap {
    resolved: HashMap<&'static str, String>,
}

impl ColumnMap {
    /// Resolve the alias table against every header seen in the parsed rows.
    /// Headers are compared after trimming and lowercasing, so the
    /// "Invoice Number" / "Invoice number" spelling variants all land on the
    /// same canonical field. First header wins per field.
    pub fn resolve(specs: &[AliasSpec], rows: &[RowRecord]) -> Self {
        let mut resolved: HashMap<&'static str, String> = HashMap::new();
        for row in rows {
            for header in row.keys() {
                let normalized = header.trim().to_lowercase();
                for spec in specs {
                    if resolved.contains_key(spec.field) {
                        continue;
                    }
                    if spec.aliases.contains(&normalized.as_str()) {
                        resolved.insert(spec.field, header.clone());
                    }
                }
            }
        }
        Self { resolved }
    }

    pub fn cell<'a>(&self, row: &'a RowRecord, field: &'static str) -> Option<&'a CellValue> {
        row.get(self.resolved.get(field)?)
    }

    /// Cell as trimmed text; None when the cell is missing or blank.
    /// Whole numbers render without a decimal tail so "INV-1001" typed as a
    /// numeric cell keys the same as its text form.
    pub fn text(&self, row: &RowRecord, field: &'static str) -> Option<String> {
        let rendered = match self.cell(row, field)? {
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(f) => render_number(*f),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        };
        if rendered.is_empty() {
            None
        } else {
            Some(rendered)
        }
    }

    pub fn decimal(&self, row: &RowRecord, field: &'static str) -> Option<BigDecimal> {
        match self.cell(row, field)? {
            CellValue::Text(s) => BigDecimal::from_str(s.trim().replace(',', "").as_str()).ok(),
            CellValue::Number(f) => BigDecimal::from_str(&f.to_string()).ok(),
            CellValue::Date(_) => None,
        }
    }

    pub fn flag(&self, row: &RowRecord, field: &'static str) -> bool {
        match self.text(row, field) {
            Some(v) => matches!(v.to_lowercase().as_str(), "yes" | "y" | "true" | "1"),
            None => false,
        }
    }
}

fn render_number(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::CellValue;

    fn row(pairs: &[(&str, CellValue)]) -> RowRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_resolve_accepts_case_variants() {
        let rows = vec![row(&[
            ("Invoice number", CellValue::Text("INV-1".into())),
            ("INVOICE DATE", CellValue::Text("2024-04-01".into())),
        ])];
        let cols = ColumnMap::resolve(INVOICE_ALIAS_SPECS, &rows);
        assert_eq!(cols.text(&rows[0], INVOICE_NUMBER).as_deref(), Some("INV-1"));
        assert_eq!(
            cols.text(&rows[0], INVOICE_DATE).as_deref(),
            Some("2024-04-01")
        );
    }

    #[test]
    fn test_resolve_po_number_synonym() {
        let rows = vec![row(&[("PO Number", CellValue::Text("PO-77".into()))])];
        let cols = ColumnMap::resolve(INVOICE_ALIAS_SPECS, &rows);
        assert_eq!(cols.text(&rows[0], ORDER_NUMBER).as_deref(), Some("PO-77"));
    }

    #[test]
    fn test_numeric_invoice_number_renders_without_decimal_tail() {
        let rows = vec![row(&[("Invoice Number", CellValue::Number(1001.0))])];
        let cols = ColumnMap::resolve(INVOICE_ALIAS_SPECS, &rows);
        assert_eq!(cols.text(&rows[0], INVOICE_NUMBER).as_deref(), Some("1001"));
    }

    #[test]
    fn test_decimal_strips_thousands_separators() {
        let rows = vec![row(&[("Item Rate", CellValue::Text("1,250.50".into()))])];
        let cols = ColumnMap::resolve(INVOICE_ALIAS_SPECS, &rows);
        assert_eq!(
            cols.decimal(&rows[0], ITEM_RATE),
            BigDecimal::from_str("1250.50").ok()
        );
    }

    #[test]
    fn test_flag_parsing() {
        let rows = vec![
            row(&[("TDS", CellValue::Text("Yes".into()))]),
            row(&[("TDS", CellValue::Text("no".into()))]),
        ];
        let cols = ColumnMap::resolve(INVOICE_ALIAS_SPECS, &rows);
        assert!(cols.flag(&rows[0], TDS));
        assert!(!cols.flag(&rows[1], TDS));
    }
}
