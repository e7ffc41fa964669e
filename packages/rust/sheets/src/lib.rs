//! Spreadsheet collaborator for Sheetwright.
//!
//! This crate provides:
//! - [`SheetsBackend`] / [`Worksheet`]: the interface the batch pipeline reads
//!   rows from and writes results into
//! - [`GoogleSheets`]: Google Sheets v4 REST implementation
//! - [`MemoryBackend`]: in-memory workbooks for tests and dry runs
//! - [`SourceRef`] and A1-notation helpers
//!
//! Rows and columns are 1-based everywhere, matching sheet row numbers.

pub mod a1;
mod google;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use sheetwright_shared::Result;

pub use a1::SourceRef;
pub use google::GoogleSheets;
pub use memory::{MemoryBackend, MemoryWorksheet};

/// Opens worksheets of a spreadsheet.
#[async_trait]
pub trait SheetsBackend: Send + Sync {
    /// Open worksheet number `index` (0-based, in tab order) of `source`.
    ///
    /// Fails with `NotFound` when the spreadsheet or worksheet does not exist
    /// and `UpstreamGateway` when the backend cannot be reached.
    async fn open_worksheet(&self, source: &SourceRef, index: usize) -> Result<Arc<dyn Worksheet>>;
}

/// One worksheet handle. Not safe for concurrent runs over the same sheet.
#[async_trait]
pub trait Worksheet: Send + Sync {
    /// Worksheet title.
    fn title(&self) -> &str;

    /// Stable identity used in audit records (`<key>/<title>`).
    fn source_id(&self) -> String;

    /// Every row of the worksheet; row 0 is the header.
    async fn all_values(&self) -> Result<Vec<Vec<String>>>;

    /// All values of column `col`, starting at row 1.
    async fn col_values(&self, col: u32) -> Result<Vec<String>>;

    /// Value of a single cell (empty string when unset).
    async fn read_cell(&self, row: u32, col: u32) -> Result<String>;

    /// Overwrite a single cell.
    async fn update_cell(&self, row: u32, col: u32, value: &str) -> Result<()>;
}
