//! In-memory workbooks.
//!
//! Used by tests and `--dry-run` style tooling. Cell writes are recorded so
//! callers can assert exactly which coordinates a run touched.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use sheetwright_shared::{Result, SheetwrightError};

use crate::a1::SourceRef;
use crate::{SheetsBackend, Worksheet};

/// A spreadsheet backend holding workbooks in memory, keyed by spreadsheet key.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    workbooks: Arc<Mutex<HashMap<String, Vec<Arc<MemoryWorksheet>>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workbook under `key` with worksheets in tab order.
    pub fn with_workbook(self, key: &str, worksheets: Vec<Arc<MemoryWorksheet>>) -> Self {
        lock(&self.workbooks).insert(key.to_string(), worksheets);
        self
    }
}

#[async_trait]
impl SheetsBackend for MemoryBackend {
    async fn open_worksheet(&self, source: &SourceRef, index: usize) -> Result<Arc<dyn Worksheet>> {
        let workbooks = lock(&self.workbooks);
        let sheets = workbooks.get(source.key()).ok_or_else(|| {
            SheetwrightError::not_found(format!("spreadsheet {source} does not exist"))
        })?;
        let sheet = sheets.get(index).cloned().ok_or_else(|| {
            SheetwrightError::not_found(format!(
                "worksheet {index} does not exist in spreadsheet {source}"
            ))
        })?;
        Ok(sheet as Arc<dyn Worksheet>)
    }
}

/// One in-memory worksheet.
pub struct MemoryWorksheet {
    key: String,
    title: String,
    grid: Mutex<Vec<Vec<String>>>,
    writes: Mutex<Vec<(u32, u32, String)>>,
    failing_rows: Mutex<HashSet<u32>>,
}

impl MemoryWorksheet {
    /// Build a worksheet from rows of cells; the first row is the header.
    pub fn new(key: &str, title: &str, rows: Vec<Vec<&str>>) -> Arc<Self> {
        let grid = rows
            .into_iter()
            .map(|row| row.into_iter().map(String::from).collect())
            .collect();
        Arc::new(Self {
            key: key.to_string(),
            title: title.to_string(),
            grid: Mutex::new(grid),
            writes: Mutex::new(Vec::new()),
            failing_rows: Mutex::new(HashSet::new()),
        })
    }

    /// Make every write to `row` fail.
    pub fn fail_writes_to_row(&self, row: u32) {
        lock(&self.failing_rows).insert(row);
    }

    /// Every successful write as `(row, col, value)`, in order.
    pub fn writes(&self) -> Vec<(u32, u32, String)> {
        lock(&self.writes).clone()
    }

    /// Current value of a cell (empty when unset).
    pub fn cell(&self, row: u32, col: u32) -> String {
        let grid = lock(&self.grid);
        cell_at(&grid, row, col)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn cell_at(grid: &[Vec<String>], row: u32, col: u32) -> String {
    if row == 0 || col == 0 {
        return String::new();
    }
    grid.get(row as usize - 1)
        .and_then(|r| r.get(col as usize - 1))
        .cloned()
        .unwrap_or_default()
}

#[async_trait]
impl Worksheet for MemoryWorksheet {
    fn title(&self) -> &str {
        &self.title
    }

    fn source_id(&self) -> String {
        format!("{}/{}", self.key, self.title)
    }

    async fn all_values(&self) -> Result<Vec<Vec<String>>> {
        Ok(lock(&self.grid).clone())
    }

    async fn col_values(&self, col: u32) -> Result<Vec<String>> {
        let grid = lock(&self.grid);
        let mut values: Vec<String> = (1..=grid.len() as u32)
            .map(|row| cell_at(&grid, row, col))
            .collect();
        // Trailing blanks are omitted, as the Sheets API does.
        while values.last().is_some_and(|v| v.is_empty()) {
            values.pop();
        }
        Ok(values)
    }

    async fn read_cell(&self, row: u32, col: u32) -> Result<String> {
        Ok(self.cell(row, col))
    }

    async fn update_cell(&self, row: u32, col: u32, value: &str) -> Result<()> {
        if row == 0 || col == 0 {
            return Err(SheetwrightError::bad_input(format!(
                "cell ({row}, {col}) is outside the sheet"
            )));
        }
        if lock(&self.failing_rows).contains(&row) {
            return Err(SheetwrightError::Rejected {
                status: 503,
                message: format!("write to row {row} refused"),
            });
        }

        let mut grid = lock(&self.grid);
        let (r, c) = (row as usize - 1, col as usize - 1);
        if grid.len() <= r {
            grid.resize(r + 1, Vec::new());
        }
        if grid[r].len() <= c {
            grid[r].resize(c + 1, String::new());
        }
        grid[r][c] = value.to_string();
        drop(grid);

        lock(&self.writes).push((row, col, value.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbook() -> (MemoryBackend, Arc<MemoryWorksheet>) {
        let sheet = MemoryWorksheet::new(
            "key",
            "Products",
            vec![
                vec!["product_name", "Result"],
                vec!["Pump", ""],
                vec!["Valve", "done already"],
            ],
        );
        let backend = MemoryBackend::new().with_workbook("key", vec![sheet.clone()]);
        (backend, sheet)
    }

    #[tokio::test]
    async fn opens_by_key_and_index() {
        let (backend, _) = workbook();
        let source: SourceRef = "key".parse().unwrap();
        let ws = backend.open_worksheet(&source, 0).await.unwrap();
        assert_eq!(ws.title(), "Products");
        assert_eq!(ws.source_id(), "key/Products");

        let err = backend.open_worksheet(&source, 1).await.err().unwrap();
        assert!(matches!(err, SheetwrightError::NotFound { .. }));

        let other: SourceRef = "other".parse().unwrap();
        assert!(backend.open_worksheet(&other, 0).await.is_err());
    }

    #[tokio::test]
    async fn column_values_drop_trailing_blanks() {
        let (_, sheet) = workbook();
        assert_eq!(
            sheet.col_values(2).await.unwrap(),
            vec!["Result".to_string(), String::new(), "done already".to_string()]
        );
        assert_eq!(sheet.col_values(1).await.unwrap().len(), 3);
        assert!(sheet.col_values(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_are_recorded_and_visible() {
        let (_, sheet) = workbook();
        sheet.update_cell(2, 2, "<p>pump</p>").await.unwrap();
        assert_eq!(sheet.read_cell(2, 2).await.unwrap(), "<p>pump</p>");
        assert_eq!(sheet.writes(), vec![(2, 2, "<p>pump</p>".to_string())]);

        sheet.update_cell(5, 4, "grown").await.unwrap();
        assert_eq!(sheet.cell(5, 4), "grown");
    }

    #[tokio::test]
    async fn failing_rows_reject_writes() {
        let (_, sheet) = workbook();
        sheet.fail_writes_to_row(3);
        assert!(sheet.update_cell(3, 2, "x").await.is_err());
        assert_eq!(sheet.cell(3, 2), "done already");
        assert!(sheet.writes().is_empty());
    }
}
