//! A1 addressing for the tabular store.
//!
//! Rows are 1-based, exactly as they are shown in a spreadsheet. Columns are
//! 0-based indices (`0` is column `A`) because the attendance protocol derives
//! them from positions inside the header row.

use crate::error::StoreError;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref RANGE_REGEX: Regex =
        Regex::new(r"^(?:'((?:[^']|'')+)'|([A-Za-z0-9_]+))!(.+)$").unwrap();
    static ref CELL_REGEX: Regex = Regex::new(r"^([A-Z]+)([0-9]+)$").unwrap();
    static ref RECT_REGEX: Regex = Regex::new(r"^([A-Z]+)([0-9]+):([A-Z]+)([0-9]+)$").unwrap();
    static ref BAND_REGEX: Regex = Regex::new(r"^([A-Z]+)([0-9]+):([A-Z]+)$").unwrap();
    static ref ROWS_REGEX: Regex = Regex::new(r"^([0-9]+):([0-9]+)$").unwrap();
    static ref COLS_REGEX: Regex = Regex::new(r"^([A-Z]+):([A-Z]+)$").unwrap();
}

/// Convert a 0-based column index to its letter label (0 → A, 26 → AA).
///
/// # Examples
/// ```
/// use attendance::sheet::column_label;
///
/// assert_eq!(column_label(0), "A");
/// assert_eq!(column_label(25), "Z");
/// assert_eq!(column_label(26), "AA");
/// assert_eq!(column_label(701), "ZZ");
/// ```
pub fn column_label(index: usize) -> String {
    let mut n = index + 1;
    let mut label = String::new();
    while n > 0 {
        n -= 1;
        label.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    label
}

/// Inverse of [`column_label`]. Returns `None` for anything that is not a
/// non-empty run of uppercase ASCII letters.
pub fn column_index(label: &str) -> Option<usize> {
    if label.is_empty() || !label.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }
    let one_based = label
        .bytes()
        .try_fold(0usize, |acc, b| {
            acc.checked_mul(26)?.checked_add((b - b'A') as usize + 1)
        })?;
    Some(one_based - 1)
}

/// Quote a sheet name for use in an A1 range when it needs it.
pub fn quote_sheet_name(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// A single cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: u32,
    pub col: usize,
}

impl CellRef {
    pub fn new(row: u32, col: usize) -> Self {
        CellRef { row, col }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_label(self.col), self.row)
    }
}

impl FromStr for CellRef {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = CELL_REGEX
            .captures(s)
            .ok_or_else(|| StoreError::InvalidRange(s.to_string()))?;
        let col = column_index(&caps[1]).ok_or_else(|| StoreError::InvalidRange(s.to_string()))?;
        let row = parse_row(&caps[2], s)?;
        Ok(CellRef { row, col })
    }
}

/// A rectangular (possibly open-ended) region of one sheet.
///
/// An open `last_row` extends to the end of populated data; an open
/// `last_col` extends to the end of each populated row. Constructors clamp
/// row 0 to row 1 and order reversed corners, so `first <= last` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Range {
    sheet: String,
    first_row: u32,
    first_col: usize,
    last_row: Option<u32>,
    last_col: Option<usize>,
}

impl A1Range {
    /// One cell, e.g. `Sheet!E3`.
    pub fn cell(sheet: &str, at: CellRef) -> Self {
        Self::rect(sheet, at, at)
    }

    /// A bounded rectangle, e.g. `Sheet!A1:E1`.
    pub fn rect(sheet: &str, from: CellRef, to: CellRef) -> Self {
        let (top, bottom) = (from.row.min(to.row).max(1), from.row.max(to.row).max(1));
        A1Range {
            sheet: sheet.to_string(),
            first_row: top,
            first_col: from.col.min(to.col),
            last_row: Some(bottom),
            last_col: Some(from.col.max(to.col)),
        }
    }

    /// Every populated column of one row, e.g. `Sheet!1:1`.
    pub fn row(sheet: &str, row: u32) -> Self {
        let row = row.max(1);
        A1Range {
            sheet: sheet.to_string(),
            first_row: row,
            first_col: 0,
            last_row: Some(row),
            last_col: None,
        }
    }

    /// A fixed column band from `first_row` down to the last populated row,
    /// e.g. `Sheet!A2:D`.
    pub fn band(sheet: &str, first_row: u32, first_col: usize, last_col: usize) -> Self {
        A1Range {
            sheet: sheet.to_string(),
            first_row: first_row.max(1),
            first_col: first_col.min(last_col),
            last_row: None,
            last_col: Some(first_col.max(last_col)),
        }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn first_row(&self) -> u32 {
        self.first_row
    }

    pub fn first_col(&self) -> usize {
        self.first_col
    }

    pub fn last_row(&self) -> Option<u32> {
        self.last_row
    }

    pub fn last_col(&self) -> Option<usize> {
        self.last_col
    }
}

impl fmt::Display for A1Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!", quote_sheet_name(&self.sheet))?;
        let start = CellRef::new(self.first_row, self.first_col);
        match (self.last_row, self.last_col) {
            (Some(row), Some(col)) if row == self.first_row && col == self.first_col => {
                write!(f, "{}", start)
            }
            (Some(row), Some(col)) => write!(f, "{}:{}", start, CellRef::new(row, col)),
            (Some(row), None) => write!(f, "{}:{}", self.first_row, row),
            (None, Some(col)) => write!(f, "{}:{}", start, column_label(col)),
            // constructors never leave both ends open
            (None, None) => write!(f, "{}", start),
        }
    }
}

impl FromStr for A1Range {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::InvalidRange(s.to_string());
        let caps = RANGE_REGEX.captures(s).ok_or_else(invalid)?;
        let sheet = match (caps.get(1), caps.get(2)) {
            (Some(quoted), _) => quoted.as_str().replace("''", "'"),
            (None, Some(bare)) => bare.as_str().to_string(),
            (None, None) => return Err(invalid()),
        };
        let body = &caps[3];

        if let Ok(cell) = body.parse::<CellRef>() {
            return Ok(A1Range::cell(&sheet, cell));
        }
        if let Some(c) = RECT_REGEX.captures(body) {
            let from = CellRef::new(parse_row(&c[2], s)?, column_index(&c[1]).ok_or_else(invalid)?);
            let to = CellRef::new(parse_row(&c[4], s)?, column_index(&c[3]).ok_or_else(invalid)?);
            if to.row < from.row || to.col < from.col {
                return Err(invalid());
            }
            return Ok(A1Range::rect(&sheet, from, to));
        }
        if let Some(c) = BAND_REGEX.captures(body) {
            let first_col = column_index(&c[1]).ok_or_else(invalid)?;
            let last_col = column_index(&c[3]).ok_or_else(invalid)?;
            if last_col < first_col {
                return Err(invalid());
            }
            return Ok(A1Range::band(&sheet, parse_row(&c[2], s)?, first_col, last_col));
        }
        if let Some(c) = ROWS_REGEX.captures(body) {
            let first_row = parse_row(&c[1], s)?;
            let last_row = parse_row(&c[2], s)?;
            if last_row < first_row {
                return Err(invalid());
            }
            let mut range = A1Range::row(&sheet, first_row);
            range.last_row = Some(last_row);
            return Ok(range);
        }
        if let Some(c) = COLS_REGEX.captures(body) {
            let first_col = column_index(&c[1]).ok_or_else(invalid)?;
            let last_col = column_index(&c[2]).ok_or_else(invalid)?;
            if last_col < first_col {
                return Err(invalid());
            }
            return Ok(A1Range::band(&sheet, 1, first_col, last_col));
        }
        Err(invalid())
    }
}

fn parse_row(digits: &str, whole: &str) -> Result<u32, StoreError> {
    match digits.parse::<u32>() {
        Ok(row) if row > 0 => Ok(row),
        _ => Err(StoreError::InvalidRange(whole.to_string())),
    }
}
