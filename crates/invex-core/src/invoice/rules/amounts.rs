//! Amount extraction and parsing for rupee invoices.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{
    ADDITIONAL_CHARGES, CESS_AMOUNT, CGST_AMOUNT, IGST_AMOUNT, SGST_AMOUNT, TAXABLE_VALUE,
    TOTAL_INVOICE_VALUE, TOTAL_QUANTITY,
};
use super::{first_capture, RuleExtractor};
use crate::models::invoice::InvoiceField;

/// Labeled amount extractor for one invoice-level numeric field.
///
/// Values are returned verbatim; coercion happens in the normalizer.
pub struct AmountExtractor {
    field: InvoiceField,
}

impl AmountExtractor {
    pub fn new(field: InvoiceField) -> Self {
        Self { field }
    }

    fn patterns(&self) -> &'static [regex::Regex] {
        match self.field {
            InvoiceField::TotalInvoiceValue => TOTAL_INVOICE_VALUE.as_slice(),
            InvoiceField::TaxableValue => TAXABLE_VALUE.as_slice(),
            InvoiceField::CgstAmount => std::slice::from_ref(&*CGST_AMOUNT),
            InvoiceField::SgstAmount => std::slice::from_ref(&*SGST_AMOUNT),
            InvoiceField::IgstAmount => std::slice::from_ref(&*IGST_AMOUNT),
            InvoiceField::CessAmount => std::slice::from_ref(&*CESS_AMOUNT),
            InvoiceField::TotalQuantity => std::slice::from_ref(&*TOTAL_QUANTITY),
            InvoiceField::AdditionalCharges => std::slice::from_ref(&*ADDITIONAL_CHARGES),
            _ => &[],
        }
    }
}

impl RuleExtractor for AmountExtractor {
    type Output = String;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        first_capture(self.patterns(), text)
    }
}

/// Parse an amount such as `₹ 1,23,456.50`, `Rs. 99` or `(12.00)`.
///
/// Currency markers, thousands separators and whitespace are dropped.
/// Parentheses denote a negative amount.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let mut cleaned = s.trim().to_string();
    for marker in ["₹", "INR", "Rs.", "Rs", "$", "/-"] {
        cleaned = cleaned.replace(marker, "");
    }
    let cleaned: String = cleaned
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '\u{00a0}')
        .collect();

    let (negative, body) = match cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner.to_string()),
        None => (false, cleaned),
    };

    if body.is_empty() || !body.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let value = Decimal::from_str(&body).ok()?;
    Some(if negative { -value } else { value })
}
