//! Invoice data models: raw field mappings and canonical CSV records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Invoice-level fields an extractor may produce.
///
/// Labels double as prompt keys and CSV column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InvoiceField {
    DocumentType,
    InvoiceNumber,
    InvoiceDate,
    SupplierName,
    SupplierGstin,
    SupplierAddress,
    BuyerName,
    BuyerGstin,
    BuyerAddress,
    ConsigneeName,
    ConsigneeGstin,
    ConsigneeAddress,
    PoNumber,
    SoNumber,
    StrNumber,
    BoxCount,
    TotalQuantity,
    TaxableValue,
    CgstAmount,
    SgstAmount,
    IgstAmount,
    CessAmount,
    AdditionalCharges,
    TotalInvoiceValue,
    ReverseCharge,
    IrnNo,
    EwayBillNo,
    AmountInWords,
}

impl InvoiceField {
    /// Every invoice field, in CSV column order.
    pub const ALL: [InvoiceField; 28] = [
        InvoiceField::DocumentType,
        InvoiceField::InvoiceNumber,
        InvoiceField::InvoiceDate,
        InvoiceField::SupplierName,
        InvoiceField::SupplierGstin,
        InvoiceField::SupplierAddress,
        InvoiceField::BuyerName,
        InvoiceField::BuyerGstin,
        InvoiceField::BuyerAddress,
        InvoiceField::ConsigneeName,
        InvoiceField::ConsigneeGstin,
        InvoiceField::ConsigneeAddress,
        InvoiceField::PoNumber,
        InvoiceField::SoNumber,
        InvoiceField::StrNumber,
        InvoiceField::BoxCount,
        InvoiceField::TotalQuantity,
        InvoiceField::TaxableValue,
        InvoiceField::CgstAmount,
        InvoiceField::SgstAmount,
        InvoiceField::IgstAmount,
        InvoiceField::CessAmount,
        InvoiceField::AdditionalCharges,
        InvoiceField::TotalInvoiceValue,
        InvoiceField::ReverseCharge,
        InvoiceField::IrnNo,
        InvoiceField::EwayBillNo,
        InvoiceField::AmountInWords,
    ];

    pub fn label(self) -> &'static str {
        match self {
            InvoiceField::DocumentType => "Document Type",
            InvoiceField::InvoiceNumber => "Invoice/Document Number",
            InvoiceField::InvoiceDate => "Invoice/Document Date",
            InvoiceField::SupplierName => "Supplier Name",
            InvoiceField::SupplierGstin => "Supplier GSTIN",
            InvoiceField::SupplierAddress => "Supplier Address",
            InvoiceField::BuyerName => "Buyer Name",
            InvoiceField::BuyerGstin => "Buyer GSTIN",
            InvoiceField::BuyerAddress => "Buyer Address",
            InvoiceField::ConsigneeName => "Consignee Name",
            InvoiceField::ConsigneeGstin => "Consignee GSTIN",
            InvoiceField::ConsigneeAddress => "Consignee Address",
            InvoiceField::PoNumber => "PO Number",
            InvoiceField::SoNumber => "SO Number",
            InvoiceField::StrNumber => "STR Number",
            InvoiceField::BoxCount => "Box Count",
            InvoiceField::TotalQuantity => "Total Quantity",
            InvoiceField::TaxableValue => "Subtotal/Taxable Value",
            InvoiceField::CgstAmount => "CGST Amount",
            InvoiceField::SgstAmount => "SGST Amount",
            InvoiceField::IgstAmount => "IGST Amount",
            InvoiceField::CessAmount => "CESS Amount",
            InvoiceField::AdditionalCharges => "Additional Charges / Round Off",
            InvoiceField::TotalInvoiceValue => "Total Invoice Value",
            InvoiceField::ReverseCharge => "Reverse Charge",
            InvoiceField::IrnNo => "IRN No",
            InvoiceField::EwayBillNo => "E-Way Bill No",
            InvoiceField::AmountInWords => "Amount in Words",
        }
    }

    /// Resolve a label produced by a model, tolerating the short aliases
    /// the prompt historically used.
    pub fn from_label(label: &str) -> Option<Self> {
        let key = label.trim();
        if let Some(field) = Self::ALL.iter().find(|f| f.label().eq_ignore_ascii_case(key)) {
            return Some(*field);
        }

        match key.to_ascii_lowercase().as_str() {
            "invoice number" | "invoice no" | "document number" => Some(InvoiceField::InvoiceNumber),
            "invoice date" | "document date" => Some(InvoiceField::InvoiceDate),
            "taxable value" | "subtotal" => Some(InvoiceField::TaxableValue),
            "e-way bill number" | "eway bill no" => Some(InvoiceField::EwayBillNo),
            "irn" => Some(InvoiceField::IrnNo),
            _ => None,
        }
    }

    /// Whether the normalizer coerces this field to a decimal number.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            InvoiceField::TotalQuantity
                | InvoiceField::TaxableValue
                | InvoiceField::CgstAmount
                | InvoiceField::SgstAmount
                | InvoiceField::IgstAmount
                | InvoiceField::CessAmount
                | InvoiceField::AdditionalCharges
                | InvoiceField::TotalInvoiceValue
        )
    }
}

/// Line-item fields an extractor may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LineItemField {
    LineNumber,
    PoIdentifier,
    SkuCode,
    Description,
    HsnCode,
    Quantity,
    Uom,
    UnitPrice,
    Discount,
    TaxRate,
    CgstRate,
    SgstRate,
    IgstRate,
    CgstAmount,
    SgstAmount,
    IgstAmount,
    LineTotal,
}

impl LineItemField {
    pub const ALL: [LineItemField; 17] = [
        LineItemField::LineNumber,
        LineItemField::PoIdentifier,
        LineItemField::SkuCode,
        LineItemField::Description,
        LineItemField::HsnCode,
        LineItemField::Quantity,
        LineItemField::Uom,
        LineItemField::UnitPrice,
        LineItemField::Discount,
        LineItemField::TaxRate,
        LineItemField::CgstRate,
        LineItemField::SgstRate,
        LineItemField::IgstRate,
        LineItemField::CgstAmount,
        LineItemField::SgstAmount,
        LineItemField::IgstAmount,
        LineItemField::LineTotal,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LineItemField::LineNumber => "Line #",
            LineItemField::PoIdentifier => "PO Identifier",
            LineItemField::SkuCode => "Item/SKU Code",
            LineItemField::Description => "Item Description",
            LineItemField::HsnCode => "HSN Code",
            LineItemField::Quantity => "Quantity",
            LineItemField::Uom => "UOM",
            LineItemField::UnitPrice => "Unit Price",
            LineItemField::Discount => "Discount",
            LineItemField::TaxRate => "Tax Rate",
            LineItemField::CgstRate => "CGST Rate",
            LineItemField::SgstRate => "SGST Rate",
            LineItemField::IgstRate => "IGST Rate",
            LineItemField::CgstAmount => "CGST Amount",
            LineItemField::SgstAmount => "SGST Amount",
            LineItemField::IgstAmount => "IGST Amount",
            LineItemField::LineTotal => "Line Total Value",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let key = label.trim();
        if let Some(field) = Self::ALL.iter().find(|f| f.label().eq_ignore_ascii_case(key)) {
            return Some(*field);
        }

        match key.to_ascii_lowercase().as_str() {
            "line number" | "line no" | "s.no" | "sr no" => Some(LineItemField::LineNumber),
            "unit of measurement" | "unit" => Some(LineItemField::Uom),
            "sku" | "item code" | "sku code" => Some(LineItemField::SkuCode),
            "description" => Some(LineItemField::Description),
            "hsn" | "hsn/sac" => Some(LineItemField::HsnCode),
            "line total" | "amount" | "total" => Some(LineItemField::LineTotal),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            LineItemField::Quantity
                | LineItemField::UnitPrice
                | LineItemField::Discount
                | LineItemField::CgstAmount
                | LineItemField::SgstAmount
                | LineItemField::IgstAmount
                | LineItemField::LineTotal
        )
    }
}

/// Field mapping produced by a field extractor before normalization.
///
/// Values are raw strings exactly as the extractor found them; a key is
/// absent when nothing was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExtraction {
    pub invoice: BTreeMap<InvoiceField, String>,
    pub line_items: Vec<BTreeMap<LineItemField, String>>,
}

impl RawExtraction {
    /// Number of populated fields across header and line items.
    pub fn field_count(&self) -> usize {
        self.invoice.len() + self.line_items.iter().map(BTreeMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }

    pub fn get(&self, field: InvoiceField) -> Option<&str> {
        self.invoice.get(&field).map(String::as_str)
    }

    /// Insert a header value unless it is blank.
    pub fn set(&mut self, field: InvoiceField, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.invoice.insert(field, trimmed.to_string());
        }
    }
}

/// Which extractor produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// LLM extraction with the named provider.
    Llm(crate::invoice::llm::Provider),
    /// Regex fallback.
    Rules,
}

impl ExtractionMethod {
    /// Human-readable note stored in the "Additional Remarks" column.
    pub fn remark(self) -> String {
        match self {
            ExtractionMethod::Llm(provider) => format!("Extracted with {} LLM", provider.display_name()),
            ExtractionMethod::Rules => "Extracted with rule-based fallback".to_string(),
        }
    }
}

/// A value that was either coerced to its target type or kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coerced<T> {
    Value(T),
    Raw(String),
}

impl<T> Coerced<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Coerced::Value(v) => Some(v),
            Coerced::Raw(_) => None,
        }
    }
}

impl fmt::Display for Coerced<Decimal> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coerced::Value(v) => write!(f, "{}", v),
            Coerced::Raw(s) => f.write_str(s),
        }
    }
}

impl fmt::Display for Coerced<NaiveDate> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coerced::Value(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Coerced::Raw(s) => f.write_str(s),
        }
    }
}

/// Output format for every normalized date.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Decimal or verbatim amount.
pub type Amount = Coerced<Decimal>;

impl Default for Amount {
    fn default() -> Self {
        Coerced::Value(Decimal::ZERO)
    }
}

/// Name, GSTIN and address of one party on the invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub name: Option<String>,
    pub gstin: Option<String>,
    pub address: Option<String>,
}

/// Canonical invoice header. One per parsed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Document id shared with every line item.
    pub serial_number: String,
    pub document_type: String,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<Coerced<NaiveDate>>,
    pub supplier: Party,
    pub buyer: Party,
    pub consignee: Party,
    pub po_number: Option<String>,
    pub so_number: Option<String>,
    pub str_number: Option<String>,
    pub box_count: Option<String>,
    pub total_quantity: Option<Amount>,
    pub taxable_value: Option<Amount>,
    pub cgst_amount: Option<Amount>,
    pub sgst_amount: Option<Amount>,
    pub igst_amount: Option<Amount>,
    pub cess_amount: Option<Amount>,
    pub additional_charges: Option<Amount>,
    pub total_invoice_value: Option<Amount>,
    pub reverse_charge: String,
    pub irn_no: Option<String>,
    pub eway_bill_no: Option<String>,
    pub amount_in_words: Option<String>,
    pub remarks: String,
}

/// Canonical line item, flattened with the join keys of its invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRecord {
    pub invoice_serial_number: String,
    pub invoice_number: Option<String>,
    pub line_number: u32,
    pub po_identifier: Option<String>,
    pub sku_code: Option<String>,
    pub description: Option<String>,
    pub hsn_code: Option<String>,
    pub quantity: Amount,
    pub uom: Option<String>,
    pub unit_price: Amount,
    pub discount: Amount,
    pub tax_rate: Option<String>,
    pub cgst_rate: Option<String>,
    pub sgst_rate: Option<String>,
    pub igst_rate: Option<String>,
    pub cgst_amount: Amount,
    pub sgst_amount: Amount,
    pub igst_amount: Amount,
    pub line_total: Amount,
}

/// Column headers of the invoice-level CSV.
pub const INVOICE_COLUMNS: [&str; 30] = [
    "Serial Number",
    "Document Type",
    "Invoice/Document Number",
    "Invoice/Document Date",
    "Supplier Name",
    "Supplier GSTIN",
    "Supplier Address",
    "Buyer Name",
    "Buyer GSTIN",
    "Buyer Address",
    "Consignee Name",
    "Consignee GSTIN",
    "Consignee Address",
    "PO Number",
    "SO Number",
    "STR Number",
    "Box Count",
    "Total Quantity",
    "Subtotal/Taxable Value",
    "CGST Amount",
    "SGST Amount",
    "IGST Amount",
    "CESS Amount",
    "Additional Charges / Round Off",
    "Total Invoice Value",
    "Reverse Charge",
    "IRN No",
    "E-Way Bill No",
    "Amount in Words",
    "Additional Remarks",
];

/// Column headers of the item-level CSV.
pub const LINE_ITEM_COLUMNS: [&str; 19] = [
    "Invoice Serial Number",
    "Invoice Number",
    "Line #",
    "PO Identifier",
    "Item/SKU Code",
    "Item Description",
    "HSN Code",
    "Quantity",
    "UOM",
    "Unit Price",
    "Discount",
    "Tax Rate",
    "CGST Rate",
    "SGST Rate",
    "IGST Rate",
    "CGST Amount",
    "SGST Amount",
    "IGST Amount",
    "Line Total Value",
];

fn cell<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

impl InvoiceRecord {
    /// Render the record as a CSV row matching [`INVOICE_COLUMNS`].
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.serial_number.clone(),
            self.document_type.clone(),
            cell(&self.invoice_number),
            cell(&self.invoice_date),
            cell(&self.supplier.name),
            cell(&self.supplier.gstin),
            cell(&self.supplier.address),
            cell(&self.buyer.name),
            cell(&self.buyer.gstin),
            cell(&self.buyer.address),
            cell(&self.consignee.name),
            cell(&self.consignee.gstin),
            cell(&self.consignee.address),
            cell(&self.po_number),
            cell(&self.so_number),
            cell(&self.str_number),
            cell(&self.box_count),
            cell(&self.total_quantity),
            cell(&self.taxable_value),
            cell(&self.cgst_amount),
            cell(&self.sgst_amount),
            cell(&self.igst_amount),
            cell(&self.cess_amount),
            cell(&self.additional_charges),
            cell(&self.total_invoice_value),
            self.reverse_charge.clone(),
            cell(&self.irn_no),
            cell(&self.eway_bill_no),
            cell(&self.amount_in_words),
            self.remarks.clone(),
        ]
    }
}

impl LineItemRecord {
    /// Render the record as a CSV row matching [`LINE_ITEM_COLUMNS`].
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.invoice_serial_number.clone(),
            cell(&self.invoice_number),
            self.line_number.to_string(),
            cell(&self.po_identifier),
            cell(&self.sku_code),
            cell(&self.description),
            cell(&self.hsn_code),
            self.quantity.to_string(),
            cell(&self.uom),
            self.unit_price.to_string(),
            self.discount.to_string(),
            cell(&self.tax_rate),
            cell(&self.cgst_rate),
            cell(&self.sgst_rate),
            cell(&self.igst_rate),
            self.cgst_amount.to_string(),
            self.sgst_amount.to_string(),
            self.igst_amount.to_string(),
            self.line_total.to_string(),
        ]
    }
}
