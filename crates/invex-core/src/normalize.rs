//! Coercion of raw field mappings into canonical records.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::invoice::rules::{normalize_date, parse_amount};
use crate::models::config::ExtractionConfig;
use crate::models::invoice::{
    Amount, Coerced, ExtractionMethod, InvoiceField, InvoiceRecord, LineItemField, LineItemRecord, Party,
    RawExtraction,
};

/// A value that could not be coerced and was kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationWarning {
    /// Column label, with the line number for line-item fields.
    pub field: String,
    pub value: String,
    pub reason: String,
}

/// Output of one normalization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedInvoice {
    pub invoice: InvoiceRecord,
    pub line_items: Vec<LineItemRecord>,
    pub warnings: Vec<NormalizationWarning>,
}

/// Turns a [`RawExtraction`] into an [`InvoiceRecord`] and its line items.
#[derive(Debug, Clone)]
pub struct Normalizer {
    default_document_type: String,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            default_document_type: config.default_document_type.clone(),
        }
    }

    /// Normalize `raw` for the document identified by `serial_number`.
    pub fn normalize(&self, raw: &RawExtraction, serial_number: &str, method: ExtractionMethod) -> NormalizedInvoice {
        let mut run = Run::default();

        let text = |field: InvoiceField| raw.get(field).map(str::to_string);
        let gstin = |field: InvoiceField| raw.get(field).map(clean_gstin);

        let invoice = InvoiceRecord {
            serial_number: serial_number.to_string(),
            document_type: text(InvoiceField::DocumentType).unwrap_or_else(|| self.default_document_type.clone()),
            invoice_number: text(InvoiceField::InvoiceNumber),
            invoice_date: raw
                .get(InvoiceField::InvoiceDate)
                .map(|v| run.date(InvoiceField::InvoiceDate.label(), v)),
            supplier: Party {
                name: text(InvoiceField::SupplierName),
                gstin: gstin(InvoiceField::SupplierGstin),
                address: text(InvoiceField::SupplierAddress),
            },
            buyer: Party {
                name: text(InvoiceField::BuyerName),
                gstin: gstin(InvoiceField::BuyerGstin),
                address: text(InvoiceField::BuyerAddress),
            },
            consignee: Party {
                name: text(InvoiceField::ConsigneeName),
                gstin: gstin(InvoiceField::ConsigneeGstin),
                address: text(InvoiceField::ConsigneeAddress),
            },
            po_number: text(InvoiceField::PoNumber),
            so_number: text(InvoiceField::SoNumber),
            str_number: text(InvoiceField::StrNumber),
            box_count: text(InvoiceField::BoxCount),
            total_quantity: run.optional_amount(raw, InvoiceField::TotalQuantity),
            taxable_value: run.optional_amount(raw, InvoiceField::TaxableValue),
            cgst_amount: run.optional_amount(raw, InvoiceField::CgstAmount),
            sgst_amount: run.optional_amount(raw, InvoiceField::SgstAmount),
            igst_amount: run.optional_amount(raw, InvoiceField::IgstAmount),
            cess_amount: run.optional_amount(raw, InvoiceField::CessAmount),
            additional_charges: run.optional_amount(raw, InvoiceField::AdditionalCharges),
            total_invoice_value: run.optional_amount(raw, InvoiceField::TotalInvoiceValue),
            reverse_charge: raw
                .get(InvoiceField::ReverseCharge)
                .map(yes_no)
                .unwrap_or_else(|| "No".to_string()),
            irn_no: text(InvoiceField::IrnNo),
            eway_bill_no: text(InvoiceField::EwayBillNo),
            amount_in_words: text(InvoiceField::AmountInWords),
            remarks: method.remark(),
        };

        let line_items = raw
            .line_items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let position = idx as u32 + 1;
                let text = |field: LineItemField| item.get(&field).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
                let label = |field: LineItemField| format!("{} (line {})", field.label(), position);

                let line_number = match item.get(&LineItemField::LineNumber) {
                    Some(v) => v.trim().trim_end_matches('.').parse::<u32>().unwrap_or_else(|_| {
                        run.warn(label(LineItemField::LineNumber), v, "not a line number; using position");
                        position
                    }),
                    None => position,
                };

                let mut amount = |field: LineItemField| match item.get(&field) {
                    Some(v) => run.amount(label(field), v),
                    None => Amount::default(),
                };

                LineItemRecord {
                    invoice_serial_number: invoice.serial_number.clone(),
                    invoice_number: invoice.invoice_number.clone(),
                    line_number,
                    po_identifier: text(LineItemField::PoIdentifier),
                    sku_code: text(LineItemField::SkuCode),
                    description: text(LineItemField::Description),
                    hsn_code: text(LineItemField::HsnCode),
                    quantity: amount(LineItemField::Quantity),
                    uom: text(LineItemField::Uom).map(|u| u.to_uppercase()),
                    unit_price: amount(LineItemField::UnitPrice),
                    discount: amount(LineItemField::Discount),
                    tax_rate: text(LineItemField::TaxRate),
                    cgst_rate: text(LineItemField::CgstRate),
                    sgst_rate: text(LineItemField::SgstRate),
                    igst_rate: text(LineItemField::IgstRate),
                    cgst_amount: amount(LineItemField::CgstAmount),
                    sgst_amount: amount(LineItemField::SgstAmount),
                    igst_amount: amount(LineItemField::IgstAmount),
                    line_total: amount(LineItemField::LineTotal),
                }
            })
            .collect::<Vec<_>>();

        if !run.warnings.is_empty() {
            debug!(serial = serial_number, warnings = run.warnings.len(), "normalization kept raw values");
        }

        NormalizedInvoice {
            invoice,
            line_items,
            warnings: run.warnings,
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Warning accumulator for one normalization run.
#[derive(Default)]
struct Run {
    warnings: Vec<NormalizationWarning>,
}

impl Run {
    fn warn(&mut self, field: String, value: &str, reason: &str) {
        self.warnings.push(NormalizationWarning {
            field,
            value: value.to_string(),
            reason: reason.to_string(),
        });
    }

    fn amount(&mut self, field: String, value: &str) -> Amount {
        match parse_amount(value) {
            Some(v) => Coerced::Value(v),
            None => {
                self.warn(field, value, "not a number");
                Coerced::Raw(value.to_string())
            }
        }
    }

    fn optional_amount(&mut self, raw: &RawExtraction, field: InvoiceField) -> Option<Amount> {
        raw.get(field).map(|v| self.amount(field.label().to_string(), v))
    }

    fn date(&mut self, field: &str, value: &str) -> Coerced<chrono::NaiveDate> {
        match normalize_date(value) {
            Some(d) => Coerced::Value(d),
            None => {
                self.warn(field.to_string(), value, "unrecognized date format");
                Coerced::Raw(value.to_string())
            }
        }
    }
}

fn clean_gstin(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase()
}

fn yes_no(value: &str) -> String {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" => "Yes".to_string(),
        "n" | "no" | "false" | "" => "No".to_string(),
        _ => value.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::llm::Provider;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn dec(s: &str) -> Amount {
        Coerced::Value(Decimal::from_str(s).unwrap())
    }

    fn item(pairs: &[(LineItemField, &str)]) -> BTreeMap<LineItemField, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_normalize_scenario_total() {
        let mut raw = RawExtraction::default();
        raw.set(InvoiceField::InvoiceNumber, "INV-2024-001");
        raw.set(InvoiceField::TotalInvoiceValue, "1,234.56");

        let out = Normalizer::new().normalize(&raw, "abc", ExtractionMethod::Rules);

        assert_eq!(out.invoice.invoice_number.as_deref(), Some("INV-2024-001"));
        assert_eq!(out.invoice.total_invoice_value, Some(dec("1234.56")));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_defaults_and_absent_fields() {
        let out = Normalizer::new().normalize(&RawExtraction::default(), "s1", ExtractionMethod::Rules);

        assert_eq!(out.invoice.document_type, "Tax Invoice");
        assert_eq!(out.invoice.reverse_charge, "No");
        assert_eq!(out.invoice.invoice_date, None);
        assert_eq!(out.invoice.total_invoice_value, None);
        assert_eq!(out.invoice.remarks, "Extracted with rule-based fallback");
        assert!(out.line_items.is_empty());
    }

    #[test]
    fn test_dates_normalized() {
        let mut raw = RawExtraction::default();
        raw.set(InvoiceField::InvoiceDate, "12Jan24");
        let out = Normalizer::new().normalize(&raw, "s", ExtractionMethod::Rules);
        assert_eq!(
            out.invoice.invoice_date,
            Some(Coerced::Value(NaiveDate::from_ymd_opt(2024, 1, 12).unwrap()))
        );
    }

    #[test]
    fn test_uncoercible_values_kept_with_warning() {
        let mut raw = RawExtraction::default();
        raw.set(InvoiceField::InvoiceDate, "sometime in May");
        raw.set(InvoiceField::CgstAmount, "see annexure");

        let out = Normalizer::new().normalize(&raw, "s", ExtractionMethod::Rules);

        assert_eq!(out.invoice.invoice_date, Some(Coerced::Raw("sometime in May".into())));
        assert_eq!(out.invoice.cgst_amount, Some(Coerced::Raw("see annexure".into())));
        assert_eq!(out.warnings.len(), 2);
        assert_eq!(out.warnings[0].field, "Invoice/Document Date");
        assert_eq!(out.warnings[1].value, "see annexure");
    }

    #[test]
    fn test_line_items_carry_invoice_keys() {
        let mut raw = RawExtraction::default();
        raw.set(InvoiceField::InvoiceNumber, "INV-9");
        raw.line_items.push(item(&[
            (LineItemField::Description, "Bolt"),
            (LineItemField::Quantity, "10"),
            (LineItemField::Uom, "pcs"),
            (LineItemField::LineTotal, "₹ 250.00"),
        ]));
        raw.line_items.push(item(&[
            (LineItemField::LineNumber, "7"),
            (LineItemField::Quantity, "two"),
        ]));

        let out = Normalizer::new().normalize(&raw, "serial-1", ExtractionMethod::Llm(Provider::Google));

        assert_eq!(out.line_items.len(), 2);
        for line in &out.line_items {
            assert_eq!(line.invoice_serial_number, "serial-1");
            assert_eq!(line.invoice_number.as_deref(), Some("INV-9"));
        }

        let first = &out.line_items[0];
        assert_eq!(first.line_number, 1);
        assert_eq!(first.uom.as_deref(), Some("PCS"));
        assert_eq!(first.quantity, dec("10"));
        assert_eq!(first.line_total, dec("250.00"));
        assert_eq!(first.unit_price, Amount::default());
        assert_eq!(first.discount, dec("0"));

        let second = &out.line_items[1];
        assert_eq!(second.line_number, 7);
        assert_eq!(second.quantity, Coerced::Raw("two".into()));
        assert_eq!(out.warnings[0].field, "Quantity (line 2)");
        assert_eq!(out.invoice.remarks, "Extracted with Google LLM");
    }

    #[test]
    fn test_gstin_and_reverse_charge_cleanup() {
        let mut raw = RawExtraction::default();
        raw.set(InvoiceField::SupplierGstin, "27aapfu 0939f1zv");
        raw.set(InvoiceField::ReverseCharge, "Y");

        let out = Normalizer::new().normalize(&raw, "s", ExtractionMethod::Rules);
        assert_eq!(out.invoice.supplier.gstin.as_deref(), Some("27AAPFU0939F1ZV"));
        assert_eq!(out.invoice.reverse_charge, "Yes");
    }
}
