//! Writing attendance marks into a class sheet.
//!
//! One call covers a single date. The order is fixed: resolve (or create) the
//! date column, re-read the roster, map every roll number to its row, write
//! all status cells in one batch, dispatch absence notices, then append the
//! audit rows. A missing roll number aborts before any status cell is written.
//! A failed audit append after a successful batch leaves the grid updated
//! without audit rows; nothing is rolled back.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::columns::DateColumnResolver;
use crate::error::{AttendanceError, Result};
use crate::mailer::{self, AbsenceNotice, Notifier};
use crate::roster::{RosterReader, RosterRow};
use crate::sheet::{A1Range, CellRef};
use crate::store::{RangeUpdate, TabularStore};

/// Default name of the append-only audit sheet.
pub const DEFAULT_AUDIT_SHEET: &str = "Activity Sheet";

/// One (roll number, status) pair of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub roll_number: String,
    pub status: String,
}

impl Submission {
    pub fn new(roll_number: &str, status: &str) -> Self {
        Submission {
            roll_number: roll_number.to_string(),
            status: status.to_string(),
        }
    }

    /// Only "absent" (any ASCII case) means anything beyond being stored.
    pub fn is_absent(&self) -> bool {
        self.status.eq_ignore_ascii_case("absent")
    }
}

/// One line of the audit sheet, columns A–F.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRow {
    pub date: String,
    pub recorded_by: String,
    pub roll_number: String,
    pub student_name: String,
    pub section: String,
    pub status: String,
}

impl AuditRow {
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.recorded_by.clone(),
            self.roll_number.clone(),
            self.student_name.clone(),
            self.section.clone(),
            self.status.clone(),
        ]
    }
}

/// What a successful `mark_attendance` did.
#[derive(Debug)]
pub struct MarkOutcome {
    pub date: String,
    pub column_index: usize,
    pub column_created: bool,
    pub cells_written: usize,
    pub audit_rows: usize,
    /// In-flight absence notices. Dropping these detaches them.
    pub notifications: Vec<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct AttendanceWriter {
    store: Arc<dyn TabularStore>,
    resolver: DateColumnResolver,
    roster: RosterReader,
    notifier: Arc<dyn Notifier>,
    audit_sheet: String,
}

impl AttendanceWriter {
    pub fn new(store: Arc<dyn TabularStore>, notifier: Arc<dyn Notifier>, audit_sheet: &str) -> Self {
        AttendanceWriter {
            resolver: DateColumnResolver::new(store.clone()),
            roster: RosterReader::new(store.clone()),
            store,
            notifier,
            audit_sheet: audit_sheet.to_string(),
        }
    }

    pub fn audit_range(&self) -> A1Range {
        A1Range::band(&self.audit_sheet, 2, 0, 5)
    }

    /// Record one batch of attendance marks for `date`
    ///
    /// # Arguments
    /// * `class_sheet` - Name of the class sheet to write into
    /// * `submissions` - Roll number and status pairs, written verbatim
    /// * `user` - The teacher recorded in the audit sheet
    /// * `date` - Column label, `YYYY-MM-DD`
    ///
    /// # Returns
    /// * `Result<MarkOutcome>` - What was written, plus in-flight notices
    ///
    /// # Errors
    /// * `MissingFields` if any argument is empty
    /// * `RollNumberNotFound` if a roll number is not in the roster (no status cell is written)
    /// * `Store` for any store failure, including an audit append after the grid was written
    pub async fn mark_attendance(
        &self,
        class_sheet: &str,
        submissions: &[Submission],
        user: &str,
        date: &str,
    ) -> Result<MarkOutcome> {
        let missing: Vec<&str> = [
            ("classSheet", class_sheet.is_empty()),
            ("attendance", submissions.is_empty()),
            ("user", user.is_empty()),
            ("date", date.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();
        if !missing.is_empty() {
            return Err(AttendanceError::MissingFields(missing.join(", ")));
        }

        let column = self.resolver.resolve_column(class_sheet, date).await?;

        let roster = self.roster.get_roster(class_sheet).await?;
        let students = index_by_roll(&roster);
        let targets = submissions
            .iter()
            .map(|submission| {
                students
                    .get(submission.roll_number.as_str())
                    .map(|student| (submission, *student))
                    .ok_or_else(|| AttendanceError::RollNumberNotFound(submission.roll_number.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let updates = targets
            .iter()
            .map(|(submission, student)| {
                RangeUpdate::new(
                    A1Range::cell(class_sheet, CellRef::new(student.sheet_row, column.column_index)),
                    vec![vec![submission.status.clone()]],
                )
            })
            .collect();
        let cells_written = self.store.batch_write(updates).await?;
        log::info!(
            "{} marked {} students in {} for {}",
            user,
            targets.len(),
            class_sheet,
            date
        );

        let notifications = targets
            .iter()
            .filter(|(submission, _)| submission.is_absent())
            .map(|(_, student)| {
                mailer::dispatch(
                    self.notifier.clone(),
                    AbsenceNotice::new(&student.guardian_contact, &student.student_name, date),
                )
            })
            .collect();

        let audit: Vec<Vec<String>> = targets
            .iter()
            .map(|(submission, student)| {
                AuditRow {
                    date: date.to_string(),
                    recorded_by: user.to_string(),
                    roll_number: student.roll_number.clone(),
                    student_name: student.student_name.clone(),
                    section: student.section.clone(),
                    status: submission.status.clone(),
                }
                .to_cells()
            })
            .collect();
        let audit_rows = audit.len();
        if let Err(e) = self.store.append_rows(&self.audit_range(), audit).await {
            log::error!(
                "attendance for {} on {} written but audit append failed: {}",
                class_sheet,
                date,
                e
            );
            return Err(e.into());
        }

        Ok(MarkOutcome {
            date: date.to_string(),
            column_index: column.column_index,
            column_created: column.created,
            cells_written,
            audit_rows,
            notifications,
        })
    }
}

/// First roster row wins when a roll number repeats. Blank roll numbers are
/// never addressable.
fn index_by_roll(roster: &[RosterRow]) -> HashMap<&str, &RosterRow> {
    let mut index = HashMap::new();
    for row in roster.iter().filter(|row| !row.roll_number.is_empty()) {
        index.entry(row.roll_number.as_str()).or_insert(row);
    }
    index
}
