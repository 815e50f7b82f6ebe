//! A1 notation parsing
//!
//! Only closed rectangular ranges (`B2`, `A1:C10`, `'Q1 Sales'!A1:D4`) are
//! parsed into grid coordinates. Open ranges such as `A:C` or `3:7` and named
//! ranges yield `None`; callers fall back to passing the locator through
//! unchanged.

use serde::{Deserialize, Serialize};

/// Zero-based, end-exclusive grid coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    /// First row (inclusive)
    pub start_row_index: u64,
    /// Last row (exclusive)
    pub end_row_index: u64,
    /// First column (inclusive)
    pub start_column_index: u64,
    /// Last column (exclusive)
    pub end_column_index: u64,
}

impl GridRange {
    /// Number of rows covered
    pub fn rows(&self) -> u64 {
        self.end_row_index.saturating_sub(self.start_row_index)
    }

    /// Number of columns covered
    pub fn columns(&self) -> u64 {
        self.end_column_index.saturating_sub(self.start_column_index)
    }

    /// Number of cells covered, saturating at `u64::MAX`
    pub fn cells(&self) -> u64 {
        self.rows().saturating_mul(self.columns())
    }
}

/// Parse a closed A1 range, ignoring any sheet-name prefix
pub fn parse_range(locator: &str) -> Option<GridRange> {
    let range = match locator.rfind('!') {
        Some(pos) => &locator[pos + 1..],
        None => locator,
    };
    let range = range.trim();
    if range.is_empty() {
        return None;
    }

    let (start, end) = match range.split_once(':') {
        Some((a, b)) => (parse_cell(a)?, parse_cell(b)?),
        None => {
            let cell = parse_cell(range)?;
            (cell, cell)
        }
    };

    let (r1, r2) = (start.0.min(end.0), start.0.max(end.0));
    let (c1, c2) = (start.1.min(end.1), start.1.max(end.1));
    Some(GridRange {
        start_row_index: r1,
        end_row_index: r2 + 1,
        start_column_index: c1,
        end_column_index: c2 + 1,
    })
}

/// Parse one cell reference such as `$B$12` into zero-based (row, column)
fn parse_cell(cell: &str) -> Option<(u64, u64)> {
    let cell = cell.trim().replace('$', "");
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut column: u64 = 0;
    for c in letters.chars() {
        let v = (c.to_ascii_uppercase() as u8 - b'A') as u64 + 1;
        column = column.checked_mul(26)?.checked_add(v)?;
    }
    let row: u64 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, column - 1))
}
