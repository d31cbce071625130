//! GSTIN (Indian GST Identification Number) extraction and validation.

use super::patterns::{BUYER_GSTIN, CONSIGNEE_GSTIN, GSTIN, SUPPLIER_GSTIN};
use super::RuleExtractor;

const CHARSET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Which party a labeled GSTIN belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GstinRole {
    Supplier,
    Buyer,
    Consignee,
}

/// GSTIN field extractor.
pub struct GstinExtractor {
    validate: bool,
}

impl GstinExtractor {
    /// Create a new GSTIN extractor. Checksums are not verified by default
    /// because OCR noise often breaks the check character.
    pub fn new() -> Self {
        Self { validate: false }
    }

    /// Set whether to validate GSTIN checksums.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    fn accept(&self, gstin: &str) -> bool {
        !self.validate || validate_gstin(gstin)
    }

    /// Find the GSTIN printed next to a party label, e.g. `Buyer GSTIN: ...`.
    pub fn extract_labeled(&self, text: &str, role: GstinRole) -> Option<String> {
        let pattern = match role {
            GstinRole::Supplier => &*SUPPLIER_GSTIN,
            GstinRole::Buyer => &*BUYER_GSTIN,
            GstinRole::Consignee => &*CONSIGNEE_GSTIN,
        };

        pattern.captures_iter(text).find_map(|caps| {
            let gstin = caps.get(1)?.as_str();
            self.accept(gstin).then(|| gstin.to_string())
        })
    }

    /// All distinct GSTINs in order of appearance.
    pub fn extract_all(&self, text: &str) -> Vec<String> {
        let mut results: Vec<String> = Vec::new();

        for caps in GSTIN.captures_iter(text) {
            let Some(full_match) = caps.get(1) else { continue };
            let gstin = full_match.as_str();

            if results.iter().any(|r| r == gstin) || !self.accept(gstin) {
                continue;
            }
            results.push(gstin.to_string());
        }

        results
    }
}

impl Default for GstinExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleExtractor for GstinExtractor {
    type Output = String;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }
}

/// Validate a GSTIN using its mod-36 check character.
///
/// Format: 2-digit state code, 10-character PAN, entity number, `Z`,
/// check character. Odd positions are weighted 1, even positions 2, and
/// each product contributes its base-36 quotient plus remainder.
pub fn validate_gstin(gstin: &str) -> bool {
    let gstin = gstin.trim().to_ascii_uppercase();
    let bytes = gstin.as_bytes();

    if bytes.len() != 15 || !GSTIN.is_match(&gstin) {
        return false;
    }

    let mut sum = 0u32;
    for (idx, byte) in bytes.iter().take(14).enumerate() {
        let Some(value) = CHARSET.iter().position(|c| c == byte) else {
            return false;
        };
        let factor = if idx % 2 == 0 { 1 } else { 2 };
        let product = value as u32 * factor;
        sum += product / 36 + product % 36;
    }

    let check = (36 - sum % 36) % 36;
    CHARSET[check as usize] == bytes[14]
}
