//! Data types shared by the extraction stages and the spreadsheet writer.
//!
//! Both extraction branches end in the same [`Sheet`]: the structured-table
//! branch promotes its first row to the header, the OCR branch uses the fixed
//! [`TRANSACTION_HEADERS`]. The writer never needs to know which branch ran.

use serde::Serialize;
use std::fmt;

/// One line of a statement table: an ordered list of cell texts.
pub type Row = Vec<String>;

/// Header row written above OCR-recovered transactions.
pub const TRANSACTION_HEADERS: [&str; 4] = ["Date", "Narration", "Amount", "Balance"];

/// Debit/credit marker attached to an amount on the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryType {
    #[serde(rename = "Dr")]
    Debit,
    #[serde(rename = "Cr")]
    Credit,
}

impl EntryType {
    /// Parse the `Dr` / `Cr` marker as printed on the statement.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "Dr" => Some(EntryType::Debit),
            "Cr" => Some(EntryType::Credit),
            _ => None,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Debit => f.write_str("Dr"),
            EntryType::Credit => f.write_str("Cr"),
        }
    }
}

/// A transaction recovered from one OCR text line.
///
/// Amounts are kept exactly as printed (thousands separators included);
/// no numeric interpretation happens anywhere in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    /// `DD-MM-YYYY`, as printed.
    pub date: String,
    /// Free-text description, whitespace-trimmed.
    pub narration: String,
    pub amount: String,
    pub amount_type: EntryType,
    /// Balance after the transaction.
    pub balance: String,
    /// Parsed for validation only; not written to the spreadsheet.
    pub balance_type: EntryType,
}

impl TransactionRecord {
    /// The four spreadsheet cells: `[date, narration, "amount (Dr|Cr)", balance]`.
    pub fn to_row(&self) -> Row {
        vec![
            self.date.clone(),
            self.narration.clone(),
            format!("{} ({})", self.amount, self.amount_type),
            self.balance.clone(),
        ]
    }
}

/// Which extraction branch produced a [`Sheet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    /// Table recovered from the PDF's embedded text layout.
    Structured,
    /// Transactions recovered from OCR text.
    Ocr,
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionSource::Structured => f.write_str("structured"),
            ExtractionSource::Ocr => f.write_str("ocr"),
        }
    }
}

/// Normalised single-sheet content: optional header followed by data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sheet {
    pub header: Option<Row>,
    pub rows: Vec<Row>,
}

impl Sheet {
    /// Promote the first extracted table row to the header.
    ///
    /// Returns `None` unless there is at least one data row after the header.
    /// The first row is treated as the header whether or not the source
    /// actually printed one. Shorter rows, header included, are padded with
    /// empty cells to the widest row.
    pub fn from_table_rows(mut rows: Vec<Row>) -> Option<Self> {
        if rows.len() < 2 {
            return None;
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }
        let data = rows.split_off(1);
        let header = rows.pop();
        Some(Self { header, rows: data })
    }

    /// Build a sheet of transactions under [`TRANSACTION_HEADERS`].
    pub fn from_transactions(records: &[TransactionRecord]) -> Self {
        Self {
            header: Some(TRANSACTION_HEADERS.iter().map(|h| h.to_string()).collect()),
            rows: records.iter().map(TransactionRecord::to_row).collect(),
        }
    }

    /// Header (if any) followed by the data rows, in output order.
    pub fn all_rows(&self) -> impl Iterator<Item = &Row> {
        self.header.iter().chain(self.rows.iter())
    }

    /// Width of the widest row, header included.
    pub fn column_count(&self) -> usize {
        self.all_rows().map(Vec::len).max().unwrap_or(0)
    }
}
