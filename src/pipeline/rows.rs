//! Statement line parsing: OCR text → transaction records.
//!
//! Line splitting and field validation are separate steps. The text is first
//! cut into candidate lines; each candidate is then offered to the configured
//! [`StatementLayout`]s in order and the first one that matches wins. Lines
//! no layout matches are dropped without partial recovery.

use crate::error::ConvertError;
use crate::model::{EntryType, TransactionRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Capture groups every layout pattern must define.
pub const REQUIRED_GROUPS: [&str; 6] = [
    "date",
    "narration",
    "amount",
    "amount_type",
    "balance",
    "balance_type",
];

/// `DD-MM-YYYY <narration> <amount>(Dr|Cr) <balance>(Dr|Cr)`
static DR_CR_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<date>\d{2}-\d{2}-\d{4})\s+(?P<narration>.+?)\s+(?P<amount>[\d,]+\.\d{2})\((?P<amount_type>Dr|Cr)\)\s+(?P<balance>[\d,]+\.\d{2})\((?P<balance_type>Dr|Cr)\)",
    )
    .unwrap()
});

/// A named line pattern recognising one statement layout.
///
/// Patterns are matched from the start of the line; trailing text after the
/// balance marker is ignored.
#[derive(Debug, Clone)]
pub struct StatementLayout {
    name: String,
    pattern: Regex,
}

impl StatementLayout {
    /// Compile a custom layout.
    ///
    /// The pattern must define the named groups in [`REQUIRED_GROUPS`]; the
    /// two `*_type` groups must capture `Dr` or `Cr`. A leading `^` is added
    /// when missing.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, ConvertError> {
        let name = name.into();
        let anchored = if pattern.starts_with('^') {
            pattern.to_string()
        } else {
            format!("^(?:{})", pattern)
        };
        let regex = Regex::new(&anchored).map_err(|e| ConvertError::InvalidLayout {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        let groups: Vec<&str> = regex.capture_names().flatten().collect();
        if let Some(missing) = REQUIRED_GROUPS.iter().find(|g| !groups.contains(*g)) {
            return Err(ConvertError::InvalidLayout {
                name,
                reason: format!("missing capture group '{}'", missing),
            });
        }

        Ok(Self {
            name,
            pattern: regex,
        })
    }

    /// The common Indian retail-bank layout with `(Dr)`/`(Cr)` suffixes.
    pub fn dr_cr() -> Self {
        Self {
            name: "dr-cr".to_string(),
            pattern: DR_CR_LINE.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validate one candidate line against this layout.
    pub fn parse_line(&self, line: &str) -> Option<TransactionRecord> {
        let caps = self.pattern.captures(line)?;
        let field = |name: &str| caps.name(name).map(|m| m.as_str());

        Some(TransactionRecord {
            date: field("date")?.to_string(),
            narration: field("narration")?.trim().to_string(),
            amount: field("amount")?.to_string(),
            amount_type: EntryType::from_marker(field("amount_type")?)?,
            balance: field("balance")?.to_string(),
            balance_type: EntryType::from_marker(field("balance_type")?)?,
        })
    }
}

/// Characters that end a line of OCR text.
///
/// Covers `\n`, `\r`, vertical tab, form feed (tesseract's page separator),
/// the file/group/record separators, NEL, and the Unicode line and paragraph
/// separators.
pub fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\u{0b}'
            | '\u{0c}'
            | '\u{1c}'
            | '\u{1d}'
            | '\u{1e}'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// Split text into lines. `\r\n` counts as a single break and a trailing
/// break does not produce an empty final line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[start..idx]);
        let mut end = idx + c.len_utf8();
        if c == '\r' {
            if let Some(&(_, '\n')) = chars.peek() {
                chars.next();
                end += 1;
            }
        }
        start = end;
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Recover transactions from OCR text, in source line order.
pub fn parse_rows(text: &str, layouts: &[StatementLayout]) -> Vec<TransactionRecord> {
    let lines = split_lines(text);
    let records: Vec<TransactionRecord> = lines
        .iter()
        .filter_map(|line| layouts.iter().find_map(|layout| layout.parse_line(line)))
        .collect();

    debug!(
        "Row parser: {} of {} lines matched a statement layout",
        records.len(),
        lines.len()
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dr_cr_line_parses() {
        let rows = parse_rows(
            "01-01-2024 SALARY CREDIT   50,000.00(Cr) 1,20,000.00(Cr)",
            &[StatementLayout::dr_cr()],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].to_row(),
            vec!["01-01-2024", "SALARY CREDIT", "50,000.00 (Cr)", "1,20,000.00"]
        );
        assert_eq!(rows[0].balance_type, EntryType::Credit);
    }

    #[test]
    fn narration_is_trimmed_and_may_contain_anything() {
        let layout = StatementLayout::dr_cr();
        let rec = layout
            .parse_line("15-03-2024   UPI/ATM-WDL #42 (self)   500.00(Dr)  9,500.00(Cr) page 1")
            .unwrap();
        assert_eq!(rec.narration, "UPI/ATM-WDL #42 (self)");
        assert_eq!(rec.amount, "500.00");
        assert_eq!(rec.amount_type, EntryType::Debit);
        assert_eq!(rec.balance, "9,500.00");
    }

    #[test]
    fn non_matching_lines_are_dropped() {
        let text = "Statement of account\n\
                    Date Narration Amount Balance\n\
                    01-01-2024 SALARY 50,000.00 (Cr) 1,20,000.00(Cr)\n\
                    1-01-2024 SHORT DATE 10.00(Dr) 10.00(Cr)\n\
                    02-01-2024 RENT 5,000.00(DR) 1,15,000.00(Cr)\n\
                    03-01-2024 FEE 5.0(Dr) 1,14,995.00(Cr)\n\
                    04-01-2024 10.00(Dr) 5.00(Cr)\n";
        assert!(parse_rows(text, &[StatementLayout::dr_cr()]).is_empty());
    }

    #[test]
    fn rows_keep_source_order_across_page_breaks() {
        let text = "05-01-2024 B 1.00(Dr) 2.00(Cr)\n\u{c}\
                    04-01-2024 A 3.00(Cr) 4.00(Cr)\r\n\
                    06-01-2024 C 5.00(Dr) 6.00(Dr)";
        let dates: Vec<String> = parse_rows(text, &[StatementLayout::dr_cr()])
            .into_iter()
            .map(|r| r.date)
            .collect();
        assert_eq!(dates, vec!["05-01-2024", "04-01-2024", "06-01-2024"]);
    }

    #[test]
    fn split_lines_semantics() {
        assert_eq!(split_lines("a\r\nb\rc\nd\u{c}"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_lines("a\n\nb"), vec!["a", "", "b"]);
        assert_eq!(split_lines("x\u{2028}y"), vec!["x", "y"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn custom_layout_requires_groups() {
        let err = StatementLayout::new("bad", r"(?P<date>\d+)").unwrap_err();
        assert!(matches!(err, ConvertError::InvalidLayout { .. }));

        let err = StatementLayout::new("broken", r"(?P<date>").unwrap_err();
        assert!(matches!(err, ConvertError::InvalidLayout { .. }));
    }

    #[test]
    fn custom_layout_is_tried_after_default() {
        let slash = StatementLayout::new(
            "slash-date",
            r"(?P<date>\d{2}/\d{2}/\d{4})\s+(?P<narration>.+?)\s+(?P<amount>[\d,]+\.\d{2})\s+(?P<amount_type>Dr|Cr)\s+(?P<balance>[\d,]+\.\d{2})\s+(?P<balance_type>Dr|Cr)",
        )
        .unwrap();
        assert_eq!(slash.name(), "slash-date");

        let layouts = vec![StatementLayout::dr_cr(), slash];
        let text = "01/02/2024 NEFT IN 700.00 Cr 800.00 Cr\n\
                    02-02-2024 NEFT OUT 100.00(Dr) 700.00(Cr)";
        let rows = parse_rows(text, &layouts);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "01/02/2024");
        assert_eq!(rows[0].to_row()[2], "700.00 (Cr)");
        assert_eq!(rows[1].narration, "NEFT OUT");
    }
}
