//! Line-item table detection in plain text.
//!
//! Best effort: the header line must name at least two known columns and
//! rows run until a totals line. Rows that split into as many cells as the
//! header are mapped by column; other rows go through per-cell heuristics.
//! Tables whose columns are separated by single spaces and whose rows carry
//! neither a quantity with unit nor a trailing amount are not recognized.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use super::patterns::{
    CELL_SEPARATOR, HSN_CODE, QTY_UOM, SKU_CODE, TABLE_END, TABLE_HEADER_KEYWORD, TAX_RATE,
    TRAILING_AMOUNT, UOM,
};
use crate::models::invoice::LineItemField;

type Row = BTreeMap<LineItemField, String>;

/// Extract line items from the first table found in `text`.
pub fn extract_line_items(text: &str) -> Vec<Row> {
    let lines: Vec<&str> = text.lines().collect();

    let Some(header_idx) = lines.iter().position(|l| is_header(l)) else {
        debug!("no line-item table header found");
        return Vec::new();
    };

    let header_cells = split_cells(lines[header_idx]);
    let columns: Vec<Option<LineItemField>> = header_cells.iter().map(|c| column_for_header(c)).collect();
    debug!(line = header_idx, ?columns, "line-item table header");

    let mut items = Vec::new();

    for line in &lines[header_idx + 1..] {
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        if TABLE_END.is_match(line) {
            break;
        }

        // Repeated header on a continuation page
        if is_header(line) {
            continue;
        }

        if !line.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }

        let cells = split_cells(line);
        let row = if columns.len() >= 2 && cells.len() == columns.len() {
            map_by_column(&columns, &cells)
        } else {
            parse_row_heuristic(line)
        };

        if row.contains_key(&LineItemField::Quantity) || row.contains_key(&LineItemField::LineTotal) {
            items.push(row);
        }
    }

    items
}

fn is_header(line: &str) -> bool {
    let distinct: HashSet<String> = TABLE_HEADER_KEYWORD
        .find_iter(line)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    distinct.len() >= 2
}

fn split_cells(line: &str) -> Vec<String> {
    CELL_SEPARATOR
        .split(line.trim().trim_matches('|'))
        .map(|c| c.trim().to_string())
        .collect()
}

/// Map a header cell to the line-item field it labels.
fn column_for_header(cell: &str) -> Option<LineItemField> {
    let c = cell.to_lowercase();
    let has = |needle: &str| c.contains(needle);

    if has("cgst") {
        Some(if has("%") || has("rate") { LineItemField::CgstRate } else { LineItemField::CgstAmount })
    } else if has("sgst") {
        Some(if has("%") || has("rate") { LineItemField::SgstRate } else { LineItemField::SgstAmount })
    } else if has("igst") {
        Some(if has("%") || has("rate") { LineItemField::IgstRate } else { LineItemField::IgstAmount })
    } else if has("hsn") || has("sac") {
        Some(LineItemField::HsnCode)
    } else if has("s.no") || has("sr") || has("sl") || c == "#" || c == "no" || c == "no." {
        Some(LineItemField::LineNumber)
    } else if has("code") || has("sku") {
        Some(LineItemField::SkuCode)
    } else if has("po") && (has("ref") || has("no") || has("id")) {
        Some(LineItemField::PoIdentifier)
    } else if has("desc") || has("particular") || has("item") || has("product") || has("goods") {
        Some(LineItemField::Description)
    } else if has("qty") || has("quantity") {
        Some(LineItemField::Quantity)
    } else if has("uom") || c == "unit" || c == "per" {
        Some(LineItemField::Uom)
    } else if has("disc") {
        Some(LineItemField::Discount)
    } else if has("tax") || has("gst") || has("%") {
        Some(LineItemField::TaxRate)
    } else if has("rate") || has("price") {
        Some(LineItemField::UnitPrice)
    } else if has("amount") || has("total") || has("value") {
        Some(LineItemField::LineTotal)
    } else {
        None
    }
}

fn map_by_column(columns: &[Option<LineItemField>], cells: &[String]) -> Row {
    let mut row = Row::new();

    for (column, cell) in columns.iter().zip(cells) {
        let (Some(field), false) = (column, cell.is_empty()) else {
            continue;
        };
        row.entry(*field).or_insert_with(|| cell.clone());
    }

    // "10 PCS" in a quantity column
    if let Some(caps) = row.get(&LineItemField::Quantity).and_then(|q| QTY_UOM.captures(q)) {
        let (qty, uom) = (caps[1].to_string(), caps[2].to_uppercase());
        row.insert(LineItemField::Quantity, qty);
        row.entry(LineItemField::Uom).or_insert(uom);
    }

    row
}

/// Per-cell heuristics for rows that do not line up with the header.
fn parse_row_heuristic(line: &str) -> Row {
    let mut row = Row::new();
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut skip = HashSet::new();

    if let Some(first) = tokens.first() {
        if tokens.len() > 2 && first.len() <= 3 && first.chars().all(|c| c.is_ascii_digit()) {
            row.insert(LineItemField::LineNumber, first.to_string());
            skip.insert(0);
        }
    }

    let sku_idx = usize::from(skip.contains(&0));
    if let Some(token) = tokens.get(sku_idx) {
        let has_digit = token.chars().any(|c| c.is_ascii_digit());
        let has_alpha = token.chars().any(|c| c.is_ascii_alphabetic());
        if SKU_CODE.is_match(token) && has_digit && has_alpha {
            row.insert(LineItemField::SkuCode, token.to_string());
            skip.insert(sku_idx);
        }
    }

    if let Some(caps) = HSN_CODE.captures(line) {
        row.insert(LineItemField::HsnCode, caps[1].to_string());
    }

    if let Some(caps) = QTY_UOM.captures(line) {
        row.insert(LineItemField::Quantity, caps[1].to_string());
        row.insert(LineItemField::Uom, caps[2].to_uppercase());
    }

    if let Some(caps) = TAX_RATE.captures(line) {
        row.insert(LineItemField::TaxRate, format!("{}%", &caps[1]));
    }

    if let Some(caps) = TRAILING_AMOUNT.captures(line) {
        row.insert(LineItemField::LineTotal, caps[1].to_string());
    }

    let description: Vec<&str> = tokens
        .iter()
        .enumerate()
        .filter(|(idx, token)| {
            !skip.contains(idx)
                && token.chars().any(|c| c.is_alphabetic())
                && !UOM.is_match(token)
                && !token.contains('%')
        })
        .map(|(_, token)| *token)
        .collect();

    if !description.is_empty() {
        row.insert(LineItemField::Description, description.join(" "));
    }

    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(pairs: &[(LineItemField, &str)]) -> Row {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_pipe_table_maps_by_column() {
        let text = "\
TAX INVOICE
S.No | Item Code | Description | HSN | Qty | Rate | Amount
1 | SKU-001 | Steel Bolt M8 | 7318 | 10 | 25.00 | 250.00
2 | SKU-002 | Washer | 7318 | 5 PCS | 2.00 | 10.00
Total | | | | 15 | | 260.00
";
        let items = extract_line_items(text);

        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            row(&[
                (LineItemField::LineNumber, "1"),
                (LineItemField::SkuCode, "SKU-001"),
                (LineItemField::Description, "Steel Bolt M8"),
                (LineItemField::HsnCode, "7318"),
                (LineItemField::Quantity, "10"),
                (LineItemField::UnitPrice, "25.00"),
                (LineItemField::LineTotal, "250.00"),
            ])
        );
        assert_eq!(items[1][&LineItemField::Quantity], "5");
        assert_eq!(items[1][&LineItemField::Uom], "PCS");
    }

    #[test]
    fn test_irregular_rows_use_heuristics() {
        let text = "\
Sr No   Description        Qty    Amount
1 ABC-123 Copper wire 5 KG 18% 1,200.00
Grand Total 1,200.00
";
        let items = extract_line_items(text);

        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0],
            row(&[
                (LineItemField::LineNumber, "1"),
                (LineItemField::SkuCode, "ABC-123"),
                (LineItemField::Description, "Copper wire"),
                (LineItemField::Quantity, "5"),
                (LineItemField::Uom, "KG"),
                (LineItemField::TaxRate, "18%"),
                (LineItemField::LineTotal, "1,200.00"),
            ])
        );
    }

    #[test]
    fn test_rows_stop_at_totals() {
        let text = "\
Description  Qty  Amount
Widget  2  40.00
Total  2  40.00
Freight  1  99.00
";
        let items = extract_line_items(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0][&LineItemField::Description], "Widget");
    }

    #[test]
    fn test_no_header_no_items() {
        assert!(extract_line_items("Invoice No: 1\nTotal: 5.00").is_empty());
    }

    #[test]
    fn test_header_keywords() {
        assert!(is_header("S.No  Description  Qty  Amount"));
        assert!(!is_header("Amount in words: Rupees Ten Only"));
        assert_eq!(column_for_header("HSN/SAC"), Some(LineItemField::HsnCode));
        assert_eq!(column_for_header("Unit Price"), Some(LineItemField::UnitPrice));
        assert_eq!(column_for_header("CGST %"), Some(LineItemField::CgstRate));
        assert_eq!(column_for_header("CGST Amt"), Some(LineItemField::CgstAmount));
        assert_eq!(column_for_header("Remarks"), None);
    }
}
