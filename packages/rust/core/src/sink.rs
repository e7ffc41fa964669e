//! Result sink plus the catalog and history collaborators.
//!
//! A successful generation is written into its row's result cell first; the
//! audit record is appended only after the write succeeded. History failures
//! are logged and never fail the row.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use sheetwright_sheets::Worksheet;
use sheetwright_shared::{
    GenerationOutput, HistoryRecord, ProductScope, RelatedProduct, Result, SheetwrightError,
};
use sheetwright_storage::Storage;

/// Run `fut` with a deadline, mapping expiry to a timeout error.
pub(crate) async fn with_deadline<T>(
    operation: &str,
    after: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(SheetwrightError::timeout(operation, after)),
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Append-only audit trail.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, record: &HistoryRecord) -> Result<()>;
}

/// Read-only product catalog used as prompt context.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Products related to `names` on `domain`, keyed by related product name.
    async fn related_products(
        &self,
        domain: &str,
        names: &[String],
    ) -> Result<BTreeMap<String, RelatedProduct>>;

    /// Product links on `domain`, keyed by product name.
    async fn product_links(
        &self,
        domain: &str,
        scope: ProductScope<'_>,
    ) -> Result<BTreeMap<String, String>>;
}

#[async_trait]
impl HistorySink for Storage {
    async fn record(&self, record: &HistoryRecord) -> Result<()> {
        self.insert_history(record).await
    }
}

#[async_trait]
impl ProductCatalog for Storage {
    async fn related_products(
        &self,
        domain: &str,
        names: &[String],
    ) -> Result<BTreeMap<String, RelatedProduct>> {
        Storage::related_products(self, domain, names).await
    }

    async fn product_links(
        &self,
        domain: &str,
        scope: ProductScope<'_>,
    ) -> Result<BTreeMap<String, String>> {
        Storage::product_links(self, domain, scope).await
    }
}

// ---------------------------------------------------------------------------
// ResultSink
// ---------------------------------------------------------------------------

/// Writes results of one run into one worksheet.
pub struct ResultSink {
    worksheet: Arc<dyn Worksheet>,
    result_col: u32,
    history: Arc<dyn HistorySink>,
    timeout: Duration,
}

impl ResultSink {
    pub fn new(
        worksheet: Arc<dyn Worksheet>,
        result_col: u32,
        history: Arc<dyn HistorySink>,
        timeout: Duration,
    ) -> Self {
        Self {
            worksheet,
            result_col,
            history,
            timeout,
        }
    }

    /// Source identity of `row`, as stored in history records.
    pub fn source_of(&self, row: u32) -> String {
        format!("{}!R{row}", self.worksheet.source_id())
    }

    /// Write `output` into `row`, then append `record`.
    ///
    /// Returns an error only when the cell write fails; in that case no
    /// history record is written.
    pub async fn deliver(
        &self,
        row: u32,
        output: &GenerationOutput,
        record: HistoryRecord,
    ) -> Result<()> {
        let rendered = output.render();
        with_deadline(
            "result write",
            self.timeout,
            self.worksheet.update_cell(row, self.result_col, &rendered),
        )
        .await?;
        debug!(row, col = self.result_col, len = rendered.len(), "result written");

        let history = with_deadline("history write", self.timeout, self.history.record(&record));
        if let Err(e) = history.await {
            warn!(row, record = %record.id, error = %e, "failed to persist history record");
        }
        Ok(())
    }
}
