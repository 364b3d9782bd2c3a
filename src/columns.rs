//! Date-column reconciliation for class sheets.
//!
//! The header row is `RollNumber | Name | Email | Section` followed by one
//! label per recorded attendance date, in the order the dates were first
//! seen. Labels are only ever appended, so a date's column index is stable
//! once assigned.
//!
//! Header creation is not safe against two writers racing on the same unseen
//! date; callers serialize submissions per class sheet.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::error::StoreError;
use crate::sheet::{A1Range, CellRef};
use crate::store::TabularStore;

/// Civil-time offset used to decide what "today" is: +05:30.
pub const ATTENDANCE_UTC_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Format the attendance date (`YYYY-MM-DD`) for an instant.
///
/// # Examples
/// ```
/// use attendance::columns::attendance_date;
/// use chrono::{TimeZone, Utc};
///
/// // 19:00 UTC is already the next day at +05:30
/// let late = Utc.with_ymd_and_hms(2024, 5, 31, 19, 0, 0).unwrap();
/// assert_eq!(attendance_date(late), "2024-06-01");
/// ```
pub fn attendance_date(now: DateTime<Utc>) -> String {
    let local = now + Duration::seconds(i64::from(ATTENDANCE_UTC_OFFSET_SECS));
    local.format("%Y-%m-%d").to_string()
}

/// Today's attendance date from the server clock.
pub fn today() -> String {
    attendance_date(Utc::now())
}

/// The header row after resolution and where the date lives in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateColumn {
    pub header_row: Vec<String>,
    pub column_index: usize,
    /// True when this call appended the label and wrote the header back.
    pub created: bool,
}

#[derive(Clone)]
pub struct DateColumnResolver {
    store: Arc<dyn TabularStore>,
}

impl DateColumnResolver {
    pub fn new(store: Arc<dyn TabularStore>) -> Self {
        DateColumnResolver { store }
    }

    /// Find the column holding `date` in the header row of `class_sheet`,
    /// appending a new header label when the date has not been seen yet.
    ///
    /// An existing label is returned without any write.
    pub async fn resolve_column(
        &self,
        class_sheet: &str,
        date: &str,
    ) -> Result<DateColumn, StoreError> {
        let mut header_row = self
            .store
            .read_range(&A1Range::row(class_sheet, 1))
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        if let Some(column_index) = header_row.iter().position(|label| label == date) {
            return Ok(DateColumn {
                header_row,
                column_index,
                created: false,
            });
        }

        header_row.push(date.to_string());
        let column_index = header_row.len() - 1;
        let range = A1Range::rect(
            class_sheet,
            CellRef::new(1, 0),
            CellRef::new(1, column_index),
        );
        self.store
            .write_range(&range, vec![header_row.clone()])
            .await?;
        log::info!("created column {} for {} in {}", range, date, class_sheet);

        Ok(DateColumn {
            header_row,
            column_index,
            created: true,
        })
    }
}
