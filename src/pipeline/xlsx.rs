//! Spreadsheet output: a [`Sheet`] → single-worksheet XLSX workbook.
//!
//! Both extraction branches are written here. Every column is sized to its
//! longest non-empty cell (in characters) plus [`COLUMN_PADDING`]; a column
//! with no text at all gets just the padding.

use crate::error::ConvertError;
use crate::model::Sheet;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tracing::debug;

/// Extra character units added to every column width.
pub const COLUMN_PADDING: f64 = 5.0;

/// MIME type of the generated workbook.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Display width of each column, header included.
pub fn column_widths(sheet: &Sheet) -> Vec<f64> {
    let mut widths = vec![0usize; sheet.column_count()];
    for row in sheet.all_rows() {
        for (col, cell) in row.iter().enumerate() {
            if !cell.is_empty() {
                widths[col] = widths[col].max(cell.chars().count());
            }
        }
    }
    widths
        .into_iter()
        .map(|w| w as f64 + COLUMN_PADDING)
        .collect()
}

/// Serialise the sheet to XLSX bytes.
pub fn to_xlsx_bytes(sheet: &Sheet) -> Result<Vec<u8>, ConvertError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    let mut row_idx: u32 = 0;
    if let Some(header) = &sheet.header {
        for (col, cell) in header.iter().enumerate() {
            if !cell.is_empty() {
                worksheet.write_string_with_format(row_idx, column(col)?, cell, &bold)?;
            }
        }
        row_idx += 1;
    }

    for row in &sheet.rows {
        for (col, cell) in row.iter().enumerate() {
            if !cell.is_empty() {
                worksheet.write_string(row_idx, column(col)?, cell)?;
            }
        }
        row_idx += 1;
    }

    for (col, width) in column_widths(sheet).into_iter().enumerate() {
        worksheet.set_column_width(column(col)?, width)?;
    }

    let bytes = workbook.save_to_buffer()?;
    debug!(
        "Wrote {} rows × {} columns → {} bytes XLSX",
        row_idx,
        sheet.column_count(),
        bytes.len()
    );
    Ok(bytes)
}

fn column(idx: usize) -> Result<u16, ConvertError> {
    u16::try_from(idx).map_err(|_| ConvertError::Spreadsheet(XlsxError::RowColumnLimitError))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntryType, TransactionRecord};
    use calamine::{Data, Reader, Xlsx};
    use std::io::{Cursor, Read};

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn read_back(bytes: Vec<u8>) -> Vec<Vec<String>> {
        let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        let names = workbook.sheet_names();
        assert_eq!(names.len(), 1);
        let range = workbook.worksheet_range(&names[0]).unwrap();
        range
            .rows()
            .map(|r| {
                r.iter()
                    .map(|c| match c {
                        Data::Empty => String::new(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn widths_follow_longest_cell() {
        let sheet = Sheet {
            header: Some(row(&["Date", "Amt"])),
            rows: vec![row(&["01-01-2024", "100.00"])],
        };
        assert_eq!(column_widths(&sheet), vec![15.0, 11.0]);
    }

    #[test]
    fn empty_column_gets_padding_only() {
        let sheet = Sheet {
            header: Some(row(&["A", "", "C"])),
            rows: vec![row(&["x", "", "zz"]), row(&["yyy"])],
        };
        assert_eq!(column_widths(&sheet), vec![8.0, 5.0, 7.0]);
    }

    #[test]
    fn widths_count_characters_not_bytes() {
        let sheet = Sheet {
            header: None,
            rows: vec![row(&["₹1,000.00"])],
        };
        assert_eq!(column_widths(&sheet), vec![14.0]);
    }

    #[test]
    fn table_sheet_reads_back() {
        let sheet = Sheet::from_table_rows(vec![
            row(&["Date", "Amt"]),
            row(&["01-01-2024", "100.00"]),
        ])
        .unwrap();
        let cells = read_back(to_xlsx_bytes(&sheet).unwrap());
        assert_eq!(cells, vec![row(&["Date", "Amt"]), row(&["01-01-2024", "100.00"])]);
    }

    #[test]
    fn transaction_sheet_reads_back() {
        let sheet = Sheet::from_transactions(&[TransactionRecord {
            date: "01-01-2024".into(),
            narration: "SALARY CREDIT".into(),
            amount: "50,000.00".into(),
            amount_type: EntryType::Credit,
            balance: "1,20,000.00".into(),
            balance_type: EntryType::Credit,
        }]);
        let cells = read_back(to_xlsx_bytes(&sheet).unwrap());
        assert_eq!(
            cells,
            vec![
                row(&["Date", "Narration", "Amount", "Balance"]),
                row(&["01-01-2024", "SALARY CREDIT", "50,000.00 (Cr)", "1,20,000.00"]),
            ]
        );
    }

    /// `(first column, last column, width)` of each `<col>` entry in the
    /// saved worksheet.
    fn saved_column_widths(bytes: Vec<u8>) -> Vec<(u32, u32, f64)> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();

        let col = regex::Regex::new(r#"<col min="(\d+)" max="(\d+)" width="([\d.]+)""#).unwrap();
        col.captures_iter(&xml)
            .map(|c| (c[1].parse().unwrap(), c[2].parse().unwrap(), c[3].parse().unwrap()))
            .collect()
    }

    #[test]
    fn saved_workbook_carries_column_widths() {
        let sheet = Sheet::from_table_rows(vec![
            row(&["Date", "Narration", ""]),
            row(&["01-01-2024", "NEFT ACME PAYROLL", ""]),
        ])
        .unwrap();
        let widths = saved_column_widths(to_xlsx_bytes(&sheet).unwrap());

        // Excel stores widths with a small per-character padding on top of
        // the character count, so compare whole character units.
        let whole: Vec<(u32, u32, f64)> = widths.into_iter().map(|(a, b, w)| (a, b, w.floor())).collect();
        assert_eq!(whole, vec![(1, 1, 15.0), (2, 2, 22.0), (3, 3, 5.0)]);
    }
}
