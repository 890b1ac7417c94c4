use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// GST levy split: intrastate sales pay CGST+SGST, interstate sales pay IGST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxType {
    Intrastate,
    Interstate,
}

impl TaxType {
    /// Unrecognized labels fall back to intrastate, matching the 9/9 default
    /// rates.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            Some(l) if l.eq_ignore_ascii_case("interstate") => TaxType::Interstate,
            _ => TaxType::Intrastate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaxType::Intrastate => "intrastate",
            TaxType::Interstate => "interstate",
        }
    }
}

/// Tax configuration read once from the header row of each invoice group.
/// These are rates, never trusted totals; amounts are recomputed at commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxProfile {
    pub tax_type: TaxType,
    pub cgst_rate: BigDecimal,
    pub sgst_rate: BigDecimal,
    pub igst_rate: BigDecimal,
}

impl Default for TaxProfile {
    fn default() -> Self {
        Self {
            tax_type: TaxType::Intrastate,
            cgst_rate: BigDecimal::from(9),
            sgst_rate: BigDecimal::from(9),
            igst_rate: BigDecimal::from(18),
        }
    }
}

/// Recomputed tax amounts for one invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxTotals {
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
    pub igst: BigDecimal,
    pub total: BigDecimal,
}

impl TaxProfile {
    /// Compute actual tax amounts from the subtotal: `subtotal * rate / 100`,
    /// CGST+SGST for intrastate, IGST alone for interstate.
    pub fn compute(&self, subtotal: &BigDecimal) -> TaxTotals {
        let hundred = BigDecimal::from(100);
        let zero = BigDecimal::from(0);
        let (cgst, sgst, igst) = match self.tax_type {
            TaxType::Intrastate => (
                (subtotal * &self.cgst_rate / &hundred).with_scale(2),
                (subtotal * &self.sgst_rate / &hundred).with_scale(2),
                zero.clone(),
            ),
            TaxType::Interstate => (
                zero.clone(),
                zero.clone(),
                (subtotal * &self.igst_rate / &hundred).with_scale(2),
            ),
        };
        let total = subtotal + &cgst + &sgst + &igst;
        TaxTotals {
            cgst,
            sgst,
            igst,
            total,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingLineItem {
    pub description: String,
    pub sac_code: Option<String>,
    pub quantity: BigDecimal,
    pub rate: BigDecimal,
    pub amount: BigDecimal,
}

impl PendingLineItem {
    pub fn new(
        description: String,
        sac_code: Option<String>,
        quantity: BigDecimal,
        rate: BigDecimal,
    ) -> Self {
        let amount = &quantity * &rate;
        Self {
            description,
            sac_code,
            quantity,
            rate,
            amount,
        }
    }
}

/// Which client an aggregated invoice resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientRef {
    /// Matched a stored client.
    Existing(i64),
    /// Resolves to a client minted in this batch, keyed by its batch token.
    New(String),
}

/// In-memory invoice aggregate keyed by `(invoice_number, invoice_date)`.
/// Owned exclusively by the reconciliation pass that builds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingInvoice {
    pub invoice_number: String,
    /// Normalized to ISO when the source value parses as a date; otherwise
    /// the trimmed string form is kept.
    pub invoice_date: String,
    pub due_date: String,
    pub order_number: Option<String>,
    pub subject: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub tax: TaxProfile,
    pub tds: bool,
    pub tds_amount: BigDecimal,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_gstin: Option<String>,
    pub customer_pan: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub customer_type: String,
    pub line_items: Vec<PendingLineItem>,
    pub subtotal: BigDecimal,
    /// Filled in during identity resolution; absent only mid-reconciliation.
    pub client: Option<ClientRef>,
}

impl PendingInvoice {
    pub fn push_line_item(&mut self, item: PendingLineItem) {
        self.subtotal += &item.amount;
        self.line_items.push(item);
    }
}

/// Exact-match idempotence key against the stored-invoice snapshot.
pub fn invoice_key(invoice_number: &str, invoice_date: &str) -> String {
    format!("{}_{}", invoice_number.trim(), invoice_date.trim())
}

/// Read-only snapshot of a stored invoice, used for the duplicate check only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExistingInvoice {
    pub id: i64,
    pub invoice_number: String,
    pub invoice_date: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_interstate_recomputes_igst_only() {
        let tax = TaxProfile {
            tax_type: TaxType::Interstate,
            igst_rate: dec("18"),
            ..TaxProfile::default()
        };
        let totals = tax.compute(&dec("1000"));
        assert_eq!(totals.igst, dec("180"));
        assert_eq!(totals.cgst, dec("0"));
        assert_eq!(totals.sgst, dec("0"));
        assert_eq!(totals.total, dec("1180"));
    }

    #[test]
    fn test_intrastate_splits_cgst_sgst() {
        let totals = TaxProfile::default().compute(&dec("200"));
        assert_eq!(totals.cgst, dec("18"));
        assert_eq!(totals.sgst, dec("18"));
        assert_eq!(totals.igst, dec("0"));
        assert_eq!(totals.total, dec("236"));
    }

    #[test]
    fn test_tax_type_label_fallback() {
        assert_eq!(TaxType::from_label(Some("Interstate")), TaxType::Interstate);
        assert_eq!(TaxType::from_label(Some("intrastate")), TaxType::Intrastate);
        assert_eq!(TaxType::from_label(Some("???")), TaxType::Intrastate);
        assert_eq!(TaxType::from_label(None), TaxType::Intrastate);
    }

    #[test]
    fn test_line_item_amount_is_quantity_times_rate() {
        let item = PendingLineItem::new("Service".into(), None, dec("2"), dec("50"));
        assert_eq!(item.amount, dec("100"));
    }

    #[test]
    fn test_invoice_key_trims() {
        assert_eq!(invoice_key(" INV-1 ", "2024-04-01"), "INV-1_2024-04-01");
    }
}
