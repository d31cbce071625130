//! Date extraction and normalization.
//!
//! Numeric dates are read day-first, as printed on Indian invoices.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use super::patterns::{GENERIC_DATE, INVOICE_DATE};
use super::{first_capture, RuleExtractor};

lazy_static! {
    static ref NUMERIC_DMY: Regex = Regex::new(r"^(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})$").unwrap();
    static ref NUMERIC_YMD: Regex = Regex::new(r"^(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})$").unwrap();
    static ref DAY_MONTH_YEAR: Regex =
        Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?[\s\-]*([A-Za-z]{3,9})\.?[\s\-,]*(\d{4}|\d{2})$").unwrap();
    static ref MONTH_DAY_YEAR: Regex = Regex::new(r"^([A-Za-z]{3,9})\.?\s+(\d{1,2}),?\s+(\d{4})$").unwrap();
}

/// Labels of dates that are not the invoice date.
const OTHER_DATE_LABELS: [&str; 6] = ["due", "order", "po", "delivery", "challan", "expiry"];

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Labeled invoice date extractor. Returns the date text as printed.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleExtractor for DateExtractor {
    type Output = String;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        first_capture(&INVOICE_DATE, text).or_else(|| {
            GENERIC_DATE.iter().find_map(|pattern| {
                pattern.captures_iter(text).find_map(|caps| {
                    let group = caps.get(1)?;
                    (!labeled_as_other_date(text, group.start())).then(|| group.as_str().to_string())
                })
            })
        })
    }
}

/// Whether the line holding the date at `start` names a due, order or
/// similar date.
fn labeled_as_other_date(text: &str, start: usize) -> bool {
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    text[line_start..start]
        .split(|c: char| !c.is_ascii_alphabetic())
        .any(|word| OTHER_DATE_LABELS.iter().any(|label| word.eq_ignore_ascii_case(label)))
}

/// Parse a date in any of the accepted invoice formats.
///
/// Accepted: `DD/MM/YYYY`, `DD-MM-YY`, `DD.MM.YYYY`, `YYYY-MM-DD`,
/// `DD-Mon-YYYY`, `DDMonYY`, `DD Month YYYY`, `Mon DD, YYYY`.
pub fn normalize_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Some(caps) = NUMERIC_YMD.captures(s) {
        return NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?);
    }

    if let Some(caps) = NUMERIC_DMY.captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(parse_year(&caps[3])?, month, day);
    }

    if let Some(caps) = DAY_MONTH_YEAR.captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_to_number(&caps[2])?;
        return NaiveDate::from_ymd_opt(parse_year(&caps[3])?, month, day);
    }

    if let Some(caps) = MONTH_DAY_YEAR.captures(s) {
        let month = month_to_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month, day);
    }

    None
}

fn parse_year(s: &str) -> Option<i32> {
    let year: i32 = s.parse().ok()?;
    if s.len() == 2 {
        // Two-digit year: 00-50 -> 2000s, 51-99 -> 1900s
        Some(if year <= 50 { 2000 + year } else { 1900 + year })
    } else {
        Some(year)
    }
}

/// Month number for a full or abbreviated English month name.
fn month_to_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    if name.len() < 3 {
        return None;
    }

    MONTHS
        .iter()
        .position(|full| full.starts_with(&name))
        .map(|idx| idx as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_numeric_day_first() {
        assert_eq!(normalize_date("05/03/2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(normalize_date("05-03-2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(normalize_date("5.3.2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(normalize_date("31/12/24"), Some(ymd(2024, 12, 31)));
    }

    #[test]
    fn test_iso() {
        assert_eq!(normalize_date("2024-03-05"), Some(ymd(2024, 3, 5)));
    }

    #[test]
    fn test_month_names() {
        assert_eq!(normalize_date("05-Mar-2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(normalize_date("12Jan24"), Some(ymd(2024, 1, 12)));
        assert_eq!(normalize_date("1 September 2023"), Some(ymd(2023, 9, 1)));
        assert_eq!(normalize_date("3rd Sept 2023"), Some(ymd(2023, 9, 3)));
        assert_eq!(normalize_date("Mar 5, 2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(normalize_date("December 25 2023"), Some(ymd(2023, 12, 25)));
    }

    #[test]
    fn test_invalid_dates() {
        assert_eq!(normalize_date("31/02/2024"), None);
        assert_eq!(normalize_date("13/13/2024"), None);
        assert_eq!(normalize_date("05-Foo-2024"), None);
        assert_eq!(normalize_date("next tuesday"), None);
        assert_eq!(normalize_date(""), None);
    }

    #[test]
    fn test_extract_labeled_date() {
        let text = "Order Date: 01/01/2024\nInvoice Date: 15-Jan-2024\n";
        let found = DateExtractor::new().extract(text).unwrap();
        assert_eq!(found, "15-Jan-2024");
    }

    #[test]
    fn test_extract_unlabeled_date() {
        let text = "INVOICE\nRef 4471\n02.02.2024\n";
        let found = DateExtractor::new().extract(text).unwrap();
        assert_eq!(found, "02.02.2024");
    }

    #[test]
    fn test_due_date_is_not_the_invoice_date() {
        let text = "Due Date: 29/01/2024\nDated: 15/01/2024\n";
        assert_eq!(DateExtractor::new().extract(text).unwrap(), "15/01/2024");
    }

    #[test]
    fn test_only_qualified_dates_yield_nothing() {
        let text = "PO Date: 02/01/2024\nDue Date: 29/01/2024\n";
        assert_eq!(DateExtractor::new().extract(text), None);
    }

    #[test]
    fn test_invoice_date_label_beats_earlier_generic_date() {
        let text = "Dated 01/01/2024\nInvoice Date: 15/01/2024";
        assert_eq!(DateExtractor::new().extract(text).unwrap(), "15/01/2024");
    }
}
