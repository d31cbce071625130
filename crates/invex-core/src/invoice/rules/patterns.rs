//! Common regex patterns for GST invoice extraction.
//!
//! Ordered lists are tried front to back; the first match wins.

use lazy_static::lazy_static;
use regex::Regex;

/// GSTIN body: state code, PAN, entity number, `Z`, check character.
pub const GSTIN_BODY: &str = r"[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][0-9A-Z]Z[0-9A-Z]";

/// A number with optional thousands separators and decimals.
const NUMBER: &str = r"(-?\d[\d,]*(?:\.\d+)?)";

/// Optional currency marker in front of an amount.
const CURRENCY: &str = r"(?:₹|Rs\.?|INR)?";

/// Date shapes accepted after a date label.
const DATE_TOKEN: &str = r"(\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4}|\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[-\s]?[A-Za-z]{3,9}[-\s,]*\d{2,4}|[A-Za-z]{3,9}\s+\d{1,2},?\s+\d{4})";

fn labeled_amount(label: &str) -> Regex {
    Regex::new(&format!(r"(?i){label}\s*[:\-]?\s*{CURRENCY}\s*{NUMBER}")).unwrap()
}

fn labeled_gstin(label: &str) -> Regex {
    Regex::new(&format!(
        r"(?i:{label})\s*(?i:GSTIN|GST\s*No)\.?\s*(?i:No\.?)?\s*[:\-]?\s*({GSTIN_BODY})"
    ))
    .unwrap()
}

lazy_static! {
    // Document type
    pub static ref DOCUMENT_TYPE: Regex = Regex::new(
        r"(?i)\b(tax\s+invoice|delivery\s+challan|stock\s+transfer|bill\s+of\s+supply|credit\s+note|debit\s+note)\b"
    ).unwrap();

    // Invoice number
    pub static ref INVOICE_NUMBER: Vec<Regex> = vec![
        Regex::new(r"(?i)Invoice\s*No\b\.?\s*[:#\-]?\s*([A-Za-z0-9][A-Za-z0-9/\-_]*)").unwrap(),
        Regex::new(r"(?i)Invoice\s*Number\s*[:#\-]?\s*([A-Za-z0-9][A-Za-z0-9/\-_]*)").unwrap(),
        Regex::new(r"(?i)Document\s*No\b\.?\s*[:#\-]?\s*([A-Za-z0-9][A-Za-z0-9/\-_]*)").unwrap(),
        Regex::new(r"(?i)Bill\s*No\b\.?\s*[:#\-]?\s*([A-Za-z0-9][A-Za-z0-9/\-_]*)").unwrap(),
    ];

    // Invoice date
    pub static ref INVOICE_DATE: Vec<Regex> = vec![
        Regex::new(&format!(r"(?i)Invoice\s*Date\s*[:\-]?\s*{DATE_TOKEN}")).unwrap(),
        Regex::new(&format!(r"(?i)Document\s*Date\s*[:\-]?\s*{DATE_TOKEN}")).unwrap(),
    ];

    /// Unqualified dates, only used when no invoice date label is present.
    pub static ref GENERIC_DATE: Vec<Regex> = vec![
        Regex::new(&format!(r"(?i)\bDated?\s*[:\-]?\s*{DATE_TOKEN}")).unwrap(),
        Regex::new(r"\b(\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4})\b").unwrap(),
    ];

    // GSTIN
    pub static ref GSTIN: Regex = Regex::new(&format!(r"\b({GSTIN_BODY})\b")).unwrap();

    pub static ref SUPPLIER_GSTIN: Regex = labeled_gstin(r"Supplier|Seller|From");
    pub static ref BUYER_GSTIN: Regex = labeled_gstin(r"Buyer|Customer|Bill(?:ed)?\s*To|Receiver");
    pub static ref CONSIGNEE_GSTIN: Regex = labeled_gstin(r"Consignee|Ship(?:ped)?\s*To");

    // Party sections
    pub static ref SUPPLIER_SECTION: Regex = Regex::new(
        r"(?i)\b(?:Supplier|Seller|Sold\s*By|Details\s*of\s*Supplier)\b"
    ).unwrap();

    pub static ref BUYER_SECTION: Regex = Regex::new(
        r"(?i)\b(?:Buyer|Bill(?:ed)?\s*To|Customer|Details\s*of\s*Receiver)\b"
    ).unwrap();

    pub static ref CONSIGNEE_SECTION: Regex = Regex::new(
        r"(?i)\b(?:Consignee|Ship(?:ped)?\s*To|Details\s*of\s*Consignee)\b"
    ).unwrap();

    /// Lines that end a party block.
    pub static ref PARTY_STOP: Regex = Regex::new(
        r"(?i)\b(?:GSTIN|GST\s*No|PAN|State\s*Code|Phone|Mobile|Email|Tel|Invoice\s*(?:No|Date)|Date|Place\s*of\s*Supply)\b"
    ).unwrap();

    pub static ref LEGAL_NAME: Regex = Regex::new(
        r"(?i)(?:Legal|Trade)?\s*Name\s*:\s*([^\n]+)"
    ).unwrap();

    pub static ref ADDRESS_LINE: Regex = Regex::new(
        r"(?i)Address\s*(?:1|2|Line)?\s*:\s*([^\n]+)"
    ).unwrap();

    // Order references
    pub static ref PO_NUMBER: Regex = Regex::new(
        r"(?i)\bP\.?\s?O\.?\s*(?:Number|No\b|#)\.?\s*[:\-]?\s*([A-Za-z0-9][A-Za-z0-9/\-_]*)"
    ).unwrap();

    pub static ref SO_NUMBER: Regex = Regex::new(
        r"(?i)\bS\.?\s?O\.?\s*(?:Number|No\b|#)\.?\s*[:\-]?\s*([A-Za-z0-9][A-Za-z0-9/\-_]*)"
    ).unwrap();

    pub static ref STR_NUMBER: Regex = Regex::new(
        r"(?i)\bSTR\s*(?:Number|No\b|#)\.?\s*[:\-]?\s*([A-Za-z0-9][A-Za-z0-9/\-_]*)"
    ).unwrap();

    pub static ref BOX_COUNT: Regex = Regex::new(
        r"(?i)\b(?:No\.?\s*of\s*Boxes|Box(?:es)?\s*Count|Total\s*Boxes)\s*[:\-]?\s*(\d+)"
    ).unwrap();

    // Totals
    pub static ref TOTAL_INVOICE_VALUE: Vec<Regex> = vec![
        labeled_amount(r"Total\s*Invoice\s*Value\s*(?:\(?\s*in\s*INR\s*\)?)?"),
        labeled_amount(r"Grand\s*Total"),
        labeled_amount(r"Total\s*Amount"),
        labeled_amount(r"Total\s*Value"),
        labeled_amount(r"(?m:^)[ \t]*Total\b"),
    ];

    pub static ref TAXABLE_VALUE: Vec<Regex> = vec![
        labeled_amount(r"Total\s*Taxable\s*Value"),
        labeled_amount(r"Taxable\s*(?:Value|Amount)"),
        labeled_amount(r"Sub\s*-?\s*Total"),
    ];

    pub static ref CGST_AMOUNT: Regex = labeled_amount(r"\bCGST(?:\s*Amount)?(?:\s*@?\s*\d+(?:\.\d+)?\s*%)?");
    pub static ref SGST_AMOUNT: Regex = labeled_amount(r"\b(?:SGST|UTGST)(?:\s*Amount)?(?:\s*@?\s*\d+(?:\.\d+)?\s*%)?");
    pub static ref IGST_AMOUNT: Regex = labeled_amount(r"\bIGST(?:\s*Amount)?(?:\s*@?\s*\d+(?:\.\d+)?\s*%)?");
    pub static ref CESS_AMOUNT: Regex = labeled_amount(r"\bCESS(?:\s*Amount)?(?:\s*@?\s*\d+(?:\.\d+)?\s*%)?");

    pub static ref TOTAL_QUANTITY: Regex = Regex::new(
        r"(?i)Total\s*(?:Qty|Quantity)\.?\s*[:\-]?\s*(\d[\d,]*(?:\.\d+)?)"
    ).unwrap();

    pub static ref ADDITIONAL_CHARGES: Regex = labeled_amount(r"(?:Round(?:ing)?\s*Off|Freight|Other\s*Charges)");

    // References
    pub static ref IRN: Vec<Regex> = vec![
        Regex::new(r"(?i)\bIRN\s*(?:No\.?)?\s*[:\-]?\s*([0-9a-f]{64})\b").unwrap(),
        Regex::new(r"\b([0-9a-f]{64})\b").unwrap(),
    ];

    pub static ref EWAY_BILL: Regex = Regex::new(
        r"(?i)\bE\s*-?\s*Way\s*Bill\s*(?:Number|No\b)?\.?\s*[:\-]?\s*(\d{12}|[A-Za-z0-9]{6,})"
    ).unwrap();

    pub static ref AMOUNT_IN_WORDS: Vec<Regex> = vec![
        Regex::new(r"(?i)Amount\s*(?:Chargeable\s*)?\(?in\s*Words\)?\s*[:\-]?\s*([^\n]+)").unwrap(),
        Regex::new(r"(?i)\b((?:Rupees|INR)\s+[A-Za-z][A-Za-z\s\-]*?\s+Only)\b").unwrap(),
    ];

    pub static ref REVERSE_CHARGE: Regex = Regex::new(
        r"(?i)Reverse\s*Charge\s*(?:\(\s*Y\s*/\s*N\s*\))?\s*[:\-]?\s*(Yes|No|Y|N)\b"
    ).unwrap();

    // Line-item table
    pub static ref TABLE_HEADER_KEYWORD: Regex = Regex::new(
        r"(?i)\b(S\.?\s*No|Sr\.?\s*No|Sl\.?\s*No|Item\s*Code|HSN(?:/SAC)?|Description|Particulars|Qty|Quantity|Rate|Amount|UOM)\b"
    ).unwrap();

    pub static ref TABLE_END: Regex = Regex::new(
        r"(?i)^\s*(?:Sub\s*-?\s*Total|Grand\s*Total|Total\b|Taxable\s*Value|Amount\s*in\s*Words)"
    ).unwrap();

    pub static ref CELL_SEPARATOR: Regex = Regex::new(r"\s*\|\s*|\t+|\s{2,}").unwrap();

    pub static ref UOM: Regex = Regex::new(r"(?i)^(PCS|EA|NOS|KG|GM|MT|LT)$").unwrap();

    pub static ref QTY_UOM: Regex = Regex::new(
        r"(?i)\b(\d+(?:\.\d+)?)\s*(PCS|EA|NOS|KG|GM|MT|LT)\b"
    ).unwrap();

    pub static ref TAX_RATE: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s*%").unwrap();

    pub static ref HSN_CODE: Regex = Regex::new(r"(?:^|\s)(\d{4}|\d{6}|\d{8})(?:\s|$)").unwrap();

    pub static ref TRAILING_AMOUNT: Regex = Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*$").unwrap();

    pub static ref SKU_CODE: Regex = Regex::new(r"^[A-Z0-9][A-Z0-9_\-/]{3,}$").unwrap();
}
