//! Two-file CSV output: one invoice-level row and one row per line item.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::DocumentError;
use crate::models::config::OutputConfig;
use crate::models::invoice::{INVOICE_COLUMNS, InvoiceRecord, LINE_ITEM_COLUMNS, LineItemRecord};
use crate::normalize::NormalizedInvoice;

/// Paths of the files written for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOutput {
    pub invoice_path: PathBuf,
    pub line_items_path: PathBuf,
}

/// Writes `invoice_level_<serial>.csv` and `item_level_<serial>.csv`.
#[derive(Debug, Clone)]
pub struct CsvWriter {
    out_dir: PathBuf,
}

impl CsvWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into() }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(&config.dir)
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Target paths for a serial number.
    pub fn paths_for(&self, serial_number: &str) -> CsvOutput {
        CsvOutput {
            invoice_path: self.out_dir.join(format!("invoice_level_{}.csv", serial_number)),
            line_items_path: self.out_dir.join(format!("item_level_{}.csv", serial_number)),
        }
    }

    /// Write both files. Neither is visible at its final path until both
    /// have been fully written.
    pub fn write(&self, normalized: &NormalizedInvoice) -> Result<CsvOutput, DocumentError> {
        std::fs::create_dir_all(&self.out_dir)?;

        let invoice_csv = render_invoice_csv(&normalized.invoice)?;
        let items_csv = render_line_items_csv(&normalized.line_items)?;

        let invoice_tmp = self.staged(&invoice_csv)?;
        let items_tmp = self.staged(&items_csv)?;

        let output = self.paths_for(&normalized.invoice.serial_number);
        let previous_invoice = std::fs::read(&output.invoice_path).ok();
        invoice_tmp
            .persist(&output.invoice_path)
            .map_err(|e| DocumentError::WriteFailure(e.to_string()))?;
        if let Err(e) = items_tmp.persist(&output.line_items_path) {
            roll_back(&output.invoice_path, previous_invoice.as_deref());
            return Err(DocumentError::WriteFailure(e.to_string()));
        }

        info!(
            "Wrote {} and {}",
            output.invoice_path.display(),
            output.line_items_path.display()
        );
        Ok(output)
    }

    fn staged(&self, data: &[u8]) -> Result<NamedTempFile, DocumentError> {
        let mut tmp = NamedTempFile::new_in(&self.out_dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        debug!("Staged {} bytes at {}", data.len(), tmp.path().display());
        Ok(tmp)
    }
}

/// Put back the invoice file that was there before, or remove the one just written.
fn roll_back(invoice_path: &Path, previous: Option<&[u8]>) {
    let result = match previous {
        Some(bytes) => std::fs::write(invoice_path, bytes),
        None => std::fs::remove_file(invoice_path),
    };
    if let Err(e) = result {
        warn!("Failed to roll back {}: {}", invoice_path.display(), e);
    }
}

/// Render the invoice-level CSV: header plus one row.
pub fn render_invoice_csv(invoice: &InvoiceRecord) -> Result<Vec<u8>, DocumentError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(INVOICE_COLUMNS)?;
    wtr.write_record(invoice.to_row())?;
    wtr.into_inner().map_err(|e| DocumentError::WriteFailure(e.to_string()))
}

/// Render the item-level CSV: header plus one row per line item.
pub fn render_line_items_csv(items: &[LineItemRecord]) -> Result<Vec<u8>, DocumentError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(LINE_ITEM_COLUMNS)?;
    for item in items {
        wtr.write_record(item.to_row())?;
    }
    wtr.into_inner().map_err(|e| DocumentError::WriteFailure(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::{Amount, Coerced, Party};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Amount {
        Coerced::Value(Decimal::from_str(s).unwrap())
    }

    fn sample() -> NormalizedInvoice {
        let invoice = InvoiceRecord {
            serial_number: "0123456789abcdef".into(),
            document_type: "Tax Invoice".into(),
            invoice_number: Some("INV-2024-001".into()),
            invoice_date: Some(Coerced::Value(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())),
            supplier: Party {
                name: Some("Acme Traders, Pvt Ltd".into()),
                gstin: Some("27AAPFU0939F1ZV".into()),
                address: Some("12 \"Main\" Road\nPune".into()),
            },
            buyer: Party::default(),
            consignee: Party::default(),
            po_number: None,
            so_number: None,
            str_number: None,
            box_count: Some("3".into()),
            total_quantity: Some(dec("10")),
            taxable_value: Some(dec("1046.24")),
            cgst_amount: Some(dec("94.16")),
            sgst_amount: Some(dec("94.16")),
            igst_amount: None,
            cess_amount: None,
            additional_charges: Some(Coerced::Raw("see note".into())),
            total_invoice_value: Some(dec("1234.56")),
            reverse_charge: "No".into(),
            irn_no: None,
            eway_bill_no: None,
            amount_in_words: Some("Rupees One Thousand Two Hundred Thirty Four Only".into()),
            remarks: "Extracted with rule-based fallback".into(),
        };
        let item = LineItemRecord {
            invoice_serial_number: invoice.serial_number.clone(),
            invoice_number: invoice.invoice_number.clone(),
            line_number: 1,
            po_identifier: None,
            sku_code: Some("SKU-1".into()),
            description: Some("Steel bolt, M8".into()),
            hsn_code: Some("7318".into()),
            quantity: dec("10"),
            uom: Some("PCS".into()),
            unit_price: dec("104.624"),
            discount: Amount::default(),
            tax_rate: Some("18%".into()),
            cgst_rate: Some("9%".into()),
            sgst_rate: Some("9%".into()),
            igst_rate: None,
            cgst_amount: dec("94.16"),
            sgst_amount: dec("94.16"),
            igst_amount: Amount::default(),
            line_total: dec("1234.56"),
        };
        NormalizedInvoice {
            invoice,
            line_items: vec![item],
            warnings: Vec::new(),
        }
    }

    fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut rdr = csv::Reader::from_path(path).unwrap();
        let headers = rdr.headers().unwrap().iter().map(str::to_string).collect();
        let rows = rdr
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect();
        (headers, rows)
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let normalized = sample();

        let output = CsvWriter::new(dir.path()).write(&normalized).unwrap();

        assert_eq!(output.invoice_path, dir.path().join("invoice_level_0123456789abcdef.csv"));
        assert_eq!(output.line_items_path, dir.path().join("item_level_0123456789abcdef.csv"));

        let (headers, rows) = read_rows(&output.invoice_path);
        assert_eq!(headers, INVOICE_COLUMNS.to_vec());
        assert_eq!(rows, vec![normalized.invoice.to_row()]);
        assert_eq!(rows[0][3], "2024-03-15");
        assert_eq!(rows[0][6], "12 \"Main\" Road\nPune");
        assert_eq!(rows[0][23], "see note");
        assert_eq!(rows[0][24], "1234.56");
        assert_eq!(rows[0][10], "");

        let (headers, rows) = read_rows(&output.line_items_path);
        assert_eq!(headers, LINE_ITEM_COLUMNS.to_vec());
        assert_eq!(rows, vec![normalized.line_items[0].to_row()]);
        assert_eq!(rows[0][5], "Steel bolt, M8");
        assert_eq!(rows[0][10], "0");
    }

    #[test]
    fn test_no_line_items_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut normalized = sample();
        normalized.line_items.clear();

        let output = CsvWriter::new(dir.path().join("nested")).write(&normalized).unwrap();

        let (_, rows) = read_rows(&output.line_items_path);
        assert!(rows.is_empty());
        let (headers, rows) = read_rows(&output.invoice_path);
        assert_eq!(headers.len(), 30);
        assert_eq!(headers.last().map(String::as_str), Some("Additional Remarks"));
        assert_eq!(rows[0].len(), 30);
        assert_eq!(rows[0][29], "Extracted with rule-based fallback");
    }

    #[test]
    fn test_failed_item_file_removes_new_invoice_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CsvWriter::new(dir.path());
        let target = writer.paths_for("0123456789abcdef");
        std::fs::create_dir(&target.line_items_path).unwrap();

        let result = writer.write(&sample());

        assert!(matches!(result, Err(DocumentError::WriteFailure(_))));
        assert!(!target.invoice_path.exists());
    }

    #[test]
    fn test_failed_item_file_keeps_previous_invoice_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CsvWriter::new(dir.path());
        let target = writer.paths_for("0123456789abcdef");
        std::fs::write(&target.invoice_path, "previous run\n").unwrap();
        std::fs::create_dir(&target.line_items_path).unwrap();

        let result = writer.write(&sample());

        assert!(matches!(result, Err(DocumentError::WriteFailure(_))));
        assert_eq!(std::fs::read_to_string(&target.invoice_path).unwrap(), "previous run\n");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        CsvWriter::new(dir.path()).write(&sample()).unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["invoice_level_0123456789abcdef.csv", "item_level_0123456789abcdef.csv"]
        );
    }

    #[test]
    fn test_unwritable_directory_is_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let err = CsvWriter::new(blocker.join("out")).write(&sample()).unwrap_err();
        assert!(matches!(err, DocumentError::WriteFailure(_)));
    }
}
