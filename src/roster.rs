use serde::Serialize;
use std::sync::Arc;

use crate::error::StoreError;
use crate::sheet::A1Range;
use crate::store::TabularStore;

/// Fixed labels at the start of every class sheet header row.
pub const FIXED_HEADERS: [&str; 4] = ["RollNumber", "Name", "Email", "Section"];

/// First row holding student data (row 1 is the header).
pub const FIRST_STUDENT_ROW: u32 = 2;

/// One student's identity and contact record in a class sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    pub roll_number: String,
    pub student_name: String,
    pub guardian_contact: String,
    pub section: String,
    /// 1-based row in the class sheet.
    #[serde(skip)]
    pub sheet_row: u32,
}

impl RosterRow {
    /// Build a row from the raw `A:D` cells read at `sheet_row`. Short rows are
    /// padded with empty strings.
    pub fn from_cells(cells: &[String], sheet_row: u32) -> Self {
        let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();
        RosterRow {
            roll_number: cell(0),
            student_name: cell(1),
            guardian_contact: cell(2),
            section: cell(3),
            sheet_row,
        }
    }

    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.roll_number.clone(),
            self.student_name.clone(),
            self.guardian_contact.clone(),
            self.section.clone(),
        ]
    }
}

/// The four-column roster band of a class sheet: `A2:D`.
pub fn roster_range(class_sheet: &str) -> A1Range {
    A1Range::band(class_sheet, FIRST_STUDENT_ROW, 0, FIXED_HEADERS.len() - 1)
}

/// Reads roster rows. Never caches; every call goes to the store.
#[derive(Clone)]
pub struct RosterReader {
    store: Arc<dyn TabularStore>,
}

impl RosterReader {
    pub fn new(store: Arc<dyn TabularStore>) -> Self {
        RosterReader { store }
    }

    /// Fetch every roster row of a class sheet
    ///
    /// # Arguments
    /// * `class_sheet` - Name of the class sheet
    ///
    /// # Returns
    /// * `Result<Vec<RosterRow>, StoreError>` - Rows in sheet order, blank rows included
    pub async fn get_roster(&self, class_sheet: &str) -> Result<Vec<RosterRow>, StoreError> {
        let rows = self.store.read_range(&roster_range(class_sheet)).await?;
        Ok(rows
            .iter()
            .enumerate()
            .map(|(offset, cells)| RosterRow::from_cells(cells, FIRST_STUDENT_ROW + offset as u32))
            .collect())
    }
}
