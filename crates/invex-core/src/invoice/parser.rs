//! Rule-based field extractor used when no LLM is available.

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::error::LlmError;
use crate::models::config::ExtractionConfig;
use crate::models::invoice::{ExtractionMethod, InvoiceField, RawExtraction};

use super::llm::Credentials;
use super::rules::{
    extract_line_items, first_capture,
    gstin::GstinRole,
    patterns::*,
    AmountExtractor, DateExtractor, GstinExtractor, RuleExtractor,
};
use super::FieldExtractor;

const NUMERIC_FIELDS: [InvoiceField; 8] = [
    InvoiceField::TaxableValue,
    InvoiceField::CgstAmount,
    InvoiceField::SgstAmount,
    InvoiceField::IgstAmount,
    InvoiceField::CessAmount,
    InvoiceField::TotalQuantity,
    InvoiceField::AdditionalCharges,
    InvoiceField::TotalInvoiceValue,
];

/// Ordered-pattern extractor for GST invoices. Never fails; fields with no
/// matching pattern are simply absent.
pub struct RegexFieldExtractor {
    /// Whether to validate GSTIN checksums.
    validate_gstin: bool,
}

impl RegexFieldExtractor {
    pub fn new() -> Self {
        Self { validate_gstin: false }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new().with_gstin_validation(config.validate_gstin)
    }

    /// Set GSTIN checksum validation.
    pub fn with_gstin_validation(mut self, validate: bool) -> Self {
        self.validate_gstin = validate;
        self
    }

    /// Extract every field the patterns can find in `text`.
    pub fn parse(&self, text: &str) -> RawExtraction {
        let mut raw = RawExtraction::default();

        if let Some(caps) = DOCUMENT_TYPE.captures(text) {
            raw.set(InvoiceField::DocumentType, canonical_document_type(&caps[1]));
        }

        if let Some(m) = first_capture(&INVOICE_NUMBER, text) {
            raw.set(InvoiceField::InvoiceNumber, m);
        }

        if let Some(m) = DateExtractor::new().extract(text) {
            raw.set(InvoiceField::InvoiceDate, m);
        }

        self.extract_parties(text, &mut raw);

        let references = [
            (InvoiceField::PoNumber, &*PO_NUMBER),
            (InvoiceField::SoNumber, &*SO_NUMBER),
            (InvoiceField::StrNumber, &*STR_NUMBER),
            (InvoiceField::BoxCount, &*BOX_COUNT),
            (InvoiceField::EwayBillNo, &*EWAY_BILL),
        ];
        for (field, pattern) in references {
            if let Some(m) = first_capture(std::slice::from_ref(pattern), text) {
                raw.set(field, m);
            }
        }

        for field in NUMERIC_FIELDS {
            if let Some(m) = AmountExtractor::new(field).extract(text) {
                raw.set(field, m);
            }
        }

        if let Some(m) = first_capture(&IRN, text) {
            raw.set(InvoiceField::IrnNo, m);
        }

        if let Some(m) = first_capture(&AMOUNT_IN_WORDS, text) {
            raw.set(InvoiceField::AmountInWords, m);
        }

        if let Some(caps) = REVERSE_CHARGE.captures(text) {
            let yes = caps[1].to_ascii_lowercase().starts_with('y');
            raw.set(InvoiceField::ReverseCharge, if yes { "Yes" } else { "No" });
        }

        raw.line_items = extract_line_items(text);

        debug!(
            header_fields = raw.invoice.len(),
            line_items = raw.line_items.len(),
            "rule-based extraction finished"
        );

        raw
    }

    fn extract_parties(&self, text: &str, raw: &mut RawExtraction) {
        let sections: [(GstinRole, &Regex, [InvoiceField; 3]); 3] = [
            (
                GstinRole::Supplier,
                &*SUPPLIER_SECTION,
                [InvoiceField::SupplierName, InvoiceField::SupplierAddress, InvoiceField::SupplierGstin],
            ),
            (
                GstinRole::Buyer,
                &*BUYER_SECTION,
                [InvoiceField::BuyerName, InvoiceField::BuyerAddress, InvoiceField::BuyerGstin],
            ),
            (
                GstinRole::Consignee,
                &*CONSIGNEE_SECTION,
                [InvoiceField::ConsigneeName, InvoiceField::ConsigneeAddress, InvoiceField::ConsigneeGstin],
            ),
        ];

        for (idx, (_, section, [name_field, address_field, _])) in sections.iter().enumerate() {
            let others: Vec<&Regex> = sections
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != idx)
                .map(|(_, (_, regex, _))| *regex)
                .collect();

            if let Some(block) = party_block(text, section, &others) {
                raw.set(*name_field, block.name);
                if let Some(address) = block.address {
                    raw.set(*address_field, address);
                }
            }
        }

        // Labeled GSTINs first, then unclaimed ones in order of appearance.
        let extractor = GstinExtractor::new().with_validation(self.validate_gstin);
        let mut claimed: Vec<String> = Vec::new();
        let mut pending = Vec::new();

        for (role, _, [_, _, gstin_field]) in &sections {
            match extractor.extract_labeled(text, *role) {
                Some(gstin) => {
                    claimed.push(gstin.clone());
                    raw.set(*gstin_field, gstin);
                }
                None => pending.push(*gstin_field),
            }
        }

        let mut unclaimed = extractor
            .extract_all(text)
            .into_iter()
            .filter(|g| !claimed.contains(g));

        for field in pending {
            match unclaimed.next() {
                Some(gstin) => raw.set(field, gstin),
                None => break,
            }
        }
    }
}

impl Default for RegexFieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FieldExtractor for RegexFieldExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Rules
    }

    async fn extract_fields(&self, text: &str, _credentials: Option<&Credentials>) -> Result<RawExtraction, LlmError> {
        Ok(self.parse(text))
    }
}

struct PartyBlock {
    name: String,
    address: Option<String>,
}

/// Read the name and address lines that follow a party heading such as
/// `Bill To:`. The block ends at a blank line, a GSTIN/contact line or the
/// heading of another party.
fn party_block(text: &str, section: &Regex, others: &[&Regex]) -> Option<PartyBlock> {
    for heading in section.find_iter(text) {
        let mut lines = text[heading.end()..].lines();
        let same_line = lines
            .next()
            .unwrap_or("")
            .trim_start_matches(|c: char| c == ':' || c == '-' || c.is_whitespace())
            .trim();

        // "Supplier GSTIN: ..." is a label, not a block heading
        if ends_block(same_line) {
            continue;
        }

        let mut block: Vec<&str> = Vec::new();
        if !same_line.is_empty() {
            block.push(same_line);
        }

        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                if block.is_empty() {
                    continue;
                }
                break;
            }
            if ends_block(line) || others.iter().any(|r| r.is_match(line)) {
                break;
            }
            block.push(line);
            if block.len() >= 4 {
                break;
            }
        }

        if block.is_empty() {
            continue;
        }

        let labeled_name = block
            .iter()
            .enumerate()
            .find_map(|(idx, line)| LEGAL_NAME.captures(line).map(|caps| (idx, caps[1].trim().to_string())));
        let (name_idx, name) = labeled_name.unwrap_or((0, block[0].to_string()));

        let address = block
            .iter()
            .find_map(|line| ADDRESS_LINE.captures(line).map(|caps| caps[1].trim().to_string()))
            .or_else(|| {
                let rest: Vec<&str> = block
                    .iter()
                    .enumerate()
                    .filter(|(idx, line)| *idx != name_idx && !LEGAL_NAME.is_match(line))
                    .map(|(_, line)| *line)
                    .collect();
                (!rest.is_empty()).then(|| rest.join(", "))
            });

        let name = name.trim_start_matches(|c: char| c == ':' || c.is_whitespace()).to_string();
        if name.is_empty() {
            continue;
        }

        return Some(PartyBlock { name, address });
    }

    None
}

fn ends_block(line: &str) -> bool {
    PARTY_STOP.is_match(line) || GSTIN.is_match(line)
}

fn canonical_document_type(matched: &str) -> String {
    matched
        .split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            if lower == "of" {
                return lower;
            }
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
