//! The tabular store boundary.
//!
//! Everything the attendance protocol knows about the spreadsheet goes
//! through [`TabularStore`]. The store is the only durable state; components
//! hold an `Arc<dyn TabularStore>` handed to them at construction.

use crate::error::StoreError;
use crate::sheet::A1Range;
use async_trait::async_trait;

pub mod memory;
#[cfg(feature = "web")]
pub mod sheets;

pub use memory::{MemoryStore, StoreOp, Workbook};
#[cfg(feature = "web")]
pub use sheets::SheetsClient;

/// One range and the values to place in it, as part of a batch write.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeUpdate {
    pub range: A1Range,
    pub values: Vec<Vec<String>>,
}

impl RangeUpdate {
    pub fn new(range: A1Range, values: Vec<Vec<String>>) -> Self {
        RangeUpdate { range, values }
    }
}

/// Generic read / write / batch-write / append access to a grid store.
///
/// Reads follow spreadsheet conventions: trailing empty cells of each row and
/// trailing empty rows are not returned.
#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn read_range(&self, range: &A1Range) -> Result<Vec<Vec<String>>, StoreError>;

    /// Overwrite the cells of `range`, starting at its top-left corner.
    async fn write_range(
        &self,
        range: &A1Range,
        values: Vec<Vec<String>>,
    ) -> Result<(), StoreError>;

    /// Apply several writes in one request. Returns the number of cells written.
    async fn batch_write(&self, updates: Vec<RangeUpdate>) -> Result<usize, StoreError>;

    /// Add rows after the last populated row of the table at `range`.
    async fn append_rows(
        &self,
        range: &A1Range,
        rows: Vec<Vec<String>>,
    ) -> Result<(), StoreError>;
}
