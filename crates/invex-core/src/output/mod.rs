//! Output writers.

mod csv;

pub use self::csv::{CsvOutput, CsvWriter, render_invoice_csv, render_line_items_csv};
