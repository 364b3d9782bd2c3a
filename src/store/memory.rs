//! In-process grid store.
//!
//! Backs local development (optionally persisted to a gzip snapshot after
//! every mutation) and the test suites, which inspect the recorded
//! [`StoreOp`] log to count header writes, batch writes and appends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{RangeUpdate, TabularStore};
use crate::error::StoreError;
use crate::saving;
use crate::sheet::A1Range;

/// Named sheets, each a ragged grid of cell strings (row 1 at index 0).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    sheets: BTreeMap<String, Vec<Vec<String>>>,
}

impl Workbook {
    pub fn insert_sheet(&mut self, name: &str, rows: Vec<Vec<String>>) {
        self.sheets.insert(name.to_string(), rows);
    }

    pub fn sheet(&self, name: &str) -> Option<&Vec<Vec<String>>> {
        self.sheets.get(name)
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    fn grid(&self, name: &str) -> Result<&Vec<Vec<String>>, StoreError> {
        self.sheets
            .get(name)
            .ok_or_else(|| StoreError::UnknownSheet(name.to_string()))
    }

    fn grid_mut(&mut self, name: &str) -> Result<&mut Vec<Vec<String>>, StoreError> {
        self.sheets
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownSheet(name.to_string()))
    }
}

/// Which kind of store call an operation was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Read,
    Write,
    BatchWrite,
    Append,
}

/// A successfully applied store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Read { range: String },
    Write { range: String, cells: usize },
    BatchWrite { ranges: Vec<String>, cells: usize },
    Append { range: String, rows: usize },
}

impl StoreOp {
    pub fn kind(&self) -> OpKind {
        match self {
            StoreOp::Read { .. } => OpKind::Read,
            StoreOp::Write { .. } => OpKind::Write,
            StoreOp::BatchWrite { .. } => OpKind::BatchWrite,
            StoreOp::Append { .. } => OpKind::Append,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    workbook: RwLock<Workbook>,
    ops: Mutex<Vec<StoreOp>>,
    failing: Mutex<HashSet<OpKind>>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new(workbook: Workbook) -> Self {
        MemoryStore {
            workbook: RwLock::new(workbook),
            ..Default::default()
        }
    }

    /// Open a snapshot-backed store. A missing file starts an empty workbook.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let workbook = if path.exists() {
            saving::load_workbook(path)?
        } else {
            Workbook::default()
        };
        log::info!(
            "opened local workbook {} ({} sheets)",
            path.display(),
            workbook.sheet_names().count()
        );
        Ok(MemoryStore {
            workbook: RwLock::new(workbook),
            snapshot: Some(path.to_path_buf()),
            ..Default::default()
        })
    }

    /// Builder-style helper for seeding a sheet.
    pub fn with_sheet(self, name: &str, rows: Vec<Vec<&str>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(str::to_string).collect())
            .collect();
        write_lock(&self.workbook).insert_sheet(name, rows);
        self
    }

    pub fn snapshot(&self) -> Workbook {
        read_lock(&self.workbook).clone()
    }

    pub fn sheet(&self, name: &str) -> Option<Vec<Vec<String>>> {
        read_lock(&self.workbook).sheet(name).cloned()
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        lock(&self.ops).clone()
    }

    pub fn count(&self, kind: OpKind) -> usize {
        lock(&self.ops).iter().filter(|op| op.kind() == kind).count()
    }

    pub fn clear_ops(&self) {
        lock(&self.ops).clear();
    }

    /// Make every later call of `kind` fail with a 503 until [`Self::heal`].
    pub fn fail_on(&self, kind: OpKind) {
        lock(&self.failing).insert(kind);
    }

    pub fn heal(&self) {
        lock(&self.failing).clear();
    }

    fn check_failure(&self, kind: OpKind) -> Result<(), StoreError> {
        if lock(&self.failing).contains(&kind) {
            return Err(StoreError::Api {
                status: 503,
                body: format!("{kind:?} unavailable"),
            });
        }
        Ok(())
    }

    fn record(&self, op: StoreOp) {
        lock(&self.ops).push(op);
    }

    fn persist(&self, workbook: &Workbook) -> Result<(), StoreError> {
        match &self.snapshot {
            Some(path) => saving::save_workbook(workbook, path),
            None => Ok(()),
        }
    }

    /// Apply `change` to a staged copy, persist it, then swap it in. Any error
    /// leaves the live workbook as it was.
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut Workbook) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut workbook = write_lock(&self.workbook);
        let mut staged = workbook.clone();
        let result = change(&mut staged)?;
        self.persist(&staged)?;
        *workbook = staged;
        Ok(result)
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn read_range(&self, range: &A1Range) -> Result<Vec<Vec<String>>, StoreError> {
        self.check_failure(OpKind::Read)?;
        let values = {
            let workbook = read_lock(&self.workbook);
            read_grid(workbook.grid(range.sheet())?, range)
        };
        self.record(StoreOp::Read {
            range: range.to_string(),
        });
        Ok(values)
    }

    async fn write_range(
        &self,
        range: &A1Range,
        values: Vec<Vec<String>>,
    ) -> Result<(), StoreError> {
        self.check_failure(OpKind::Write)?;
        let cells =
            self.commit(|workbook| write_grid(workbook.grid_mut(range.sheet())?, range, &values))?;
        self.record(StoreOp::Write {
            range: range.to_string(),
            cells,
        });
        Ok(())
    }

    async fn batch_write(&self, updates: Vec<RangeUpdate>) -> Result<usize, StoreError> {
        self.check_failure(OpKind::BatchWrite)?;
        let cells = self.commit(|workbook| {
            let mut cells = 0;
            for update in &updates {
                let grid = workbook.grid_mut(update.range.sheet())?;
                cells += write_grid(grid, &update.range, &update.values)?;
            }
            Ok(cells)
        })?;
        self.record(StoreOp::BatchWrite {
            ranges: updates.iter().map(|u| u.range.to_string()).collect(),
            cells,
        });
        Ok(cells)
    }

    async fn append_rows(
        &self,
        range: &A1Range,
        rows: Vec<Vec<String>>,
    ) -> Result<(), StoreError> {
        self.check_failure(OpKind::Append)?;
        let count = rows.len();
        self.commit(|workbook| {
            let grid = workbook.grid_mut(range.sheet())?;
            let start = (range.first_row() as usize)
                .saturating_sub(1)
                .max(populated_rows(grid));
            for (offset, row) in rows.into_iter().enumerate() {
                for (col, value) in row.into_iter().enumerate() {
                    put(grid, start + offset, range.first_col() + col, value);
                }
            }
            Ok(())
        })?;
        self.record(StoreOp::Append {
            range: range.to_string(),
            rows: count,
        });
        Ok(())
    }
}

fn read_grid(grid: &[Vec<String>], range: &A1Range) -> Vec<Vec<String>> {
    let first_row = (range.first_row() as usize).saturating_sub(1);
    let end_row = range
        .last_row()
        .map_or(grid.len(), |last| (last as usize).min(grid.len()));

    let mut values: Vec<Vec<String>> = (first_row.min(end_row)..end_row)
        .map(|r| {
            let row = &grid[r];
            let start = range.first_col().min(row.len());
            let end = range
                .last_col()
                .map_or(row.len(), |last| (last + 1).min(row.len()));
            let mut cells = row[start..end.max(start)].to_vec();
            while cells.last().is_some_and(String::is_empty) {
                cells.pop();
            }
            cells
        })
        .collect();

    while values.last().is_some_and(Vec::is_empty) {
        values.pop();
    }
    values
}

fn check_fits(range: &A1Range, values: &[Vec<String>]) -> Result<(), StoreError> {
    let rows = values.len();
    let cols = values.iter().map(Vec::len).max().unwrap_or(0);
    let too_tall = range
        .last_row()
        .is_some_and(|last| rows > (last.saturating_sub(range.first_row()) + 1) as usize);
    let too_wide = range
        .last_col()
        .is_some_and(|last| cols > (last + 1).saturating_sub(range.first_col()));
    if too_tall || too_wide {
        return Err(StoreError::InvalidRange(format!(
            "{range} cannot hold {rows}x{cols} values"
        )));
    }
    Ok(())
}

fn write_grid(
    grid: &mut Vec<Vec<String>>,
    range: &A1Range,
    values: &[Vec<String>],
) -> Result<usize, StoreError> {
    check_fits(range, values)?;
    let mut cells = 0;
    for (offset, row) in values.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            put(
                grid,
                (range.first_row() as usize).saturating_sub(1) + offset,
                range.first_col() + col,
                value.clone(),
            );
            cells += 1;
        }
    }
    Ok(cells)
}

fn put(grid: &mut Vec<Vec<String>>, row: usize, col: usize, value: String) {
    if grid.len() <= row {
        grid.resize_with(row + 1, Vec::new);
    }
    let cells = &mut grid[row];
    if cells.len() <= col {
        cells.resize_with(col + 1, String::new);
    }
    cells[col] = value;
}

/// Number of rows up to and including the last row with any content.
fn populated_rows(grid: &[Vec<String>]) -> usize {
    grid.iter()
        .rposition(|row| row.iter().any(|cell| !cell.is_empty()))
        .map_or(0, |last| last + 1)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_lock(workbook: &RwLock<Workbook>) -> RwLockReadGuard<'_, Workbook> {
    workbook.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock(workbook: &RwLock<Workbook>) -> RwLockWriteGuard<'_, Workbook> {
    workbook.write().unwrap_or_else(PoisonError::into_inner)
}
