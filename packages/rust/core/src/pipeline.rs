//! End-to-end runs: worksheet → eligible rows → generation → write-back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use sheetwright_sheets::{SheetsBackend, SourceRef, Worksheet};
use sheetwright_shared::{
    GenerationOutput, HistoryRecord, MAIN_DOMAIN, Origin, Result, RunConfig, SheetwrightError,
    TaskType,
};

use crate::dispatch::{AssistantRegistry, AssistantSpec};
use crate::generation::Generator;
use crate::scheduler::{BatchReport, BatchScheduler, RowObserver, RowOutcome};
use crate::selector::{self, RowFields, RowWindow, TaskRow};
use crate::sink::{HistorySink, ResultSink, with_deadline};

/// Result of one `process_one` run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub task_type: TaskType,
    /// Worksheet title.
    pub worksheet: String,
    /// Rows selected as eligible.
    pub selected: usize,
    pub batch: BatchReport,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.batch.succeeded()
    }

    pub fn failed(&self) -> usize {
        self.batch.failed()
    }
}

/// Result of one `process_many` entry.
#[derive(Debug)]
pub struct EntryReport {
    pub task_type: TaskType,
    pub worksheet_index: usize,
    pub result: Result<RunReport>,
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: RowObserver {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl RowObserver for SilentProgress {
    fn row_finished(&self, _outcome: &RowOutcome, _done: usize, _total: usize) {}
}

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _report: &RunReport) {}
}

/// SHA-256 over task type and serialized parameters, hex encoded.
fn fingerprint(task_type: TaskType, parameters: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(task_type.as_str().as_bytes());
    hasher.update(parameters.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn audit_record(
    task_type: TaskType,
    model: &str,
    fields: &RowFields,
    output: &GenerationOutput,
    source: String,
    origin: Origin,
) -> HistoryRecord {
    let parameters = fields.to_json().to_string();
    let domain = match fields.get("domain") {
        "" => MAIN_DOMAIN,
        domain => domain,
    };
    HistoryRecord {
        id: HistoryRecord::new_id(),
        task_type,
        model: model.to_string(),
        domain: domain.to_string(),
        fingerprint: fingerprint(task_type, &parameters),
        parameters,
        output: output.render(),
        source,
        origin,
        created_at: Utc::now(),
    }
}

/// Per-run state shared by every row task.
struct RowJob {
    generator: Arc<Generator>,
    sink: ResultSink,
    spec: AssistantSpec,
    model: String,
}

impl RowJob {
    async fn process(&self, task: TaskRow) -> Result<()> {
        let output = self
            .generator
            .generate(&self.model, &self.spec, &task.fields)
            .await?;
        let record = audit_record(
            self.spec.task_type,
            &self.model,
            &task.fields,
            &output,
            self.sink.source_of(task.row),
            Origin::Batch,
        );
        self.sink.deliver(task.row, &output, record).await
    }
}

/// Lookups before any row is touched fail the run; a slow backend there is
/// reported as unreachable.
fn gateway_on_timeout(err: SheetwrightError) -> SheetwrightError {
    match err {
        SheetwrightError::Timeout { .. } => SheetwrightError::UpstreamGateway(err.to_string()),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Entry point for batch runs. Cheap to clone; collaborators are shared.
#[derive(Clone)]
pub struct Runner {
    registry: Arc<AssistantRegistry>,
    sheets: Arc<dyn SheetsBackend>,
    generator: Arc<Generator>,
    history: Arc<dyn HistorySink>,
    config: RunConfig,
}

impl Runner {
    pub fn new(
        registry: Arc<AssistantRegistry>,
        sheets: Arc<dyn SheetsBackend>,
        generator: Arc<Generator>,
        history: Arc<dyn HistorySink>,
        config: RunConfig,
    ) -> Self {
        Self {
            registry,
            sheets,
            generator,
            history,
            config,
        }
    }

    /// Process one worksheet with one task type.
    ///
    /// Fatal problems (unknown task, bad source reference, missing worksheet
    /// or columns, unreachable backend) fail the call before any row is
    /// touched. Row failures are recorded in the report.
    #[instrument(skip_all, fields(task = task_key, worksheet = worksheet_index))]
    pub async fn process_one(
        &self,
        model: &str,
        source_ref: &str,
        task_key: &str,
        worksheet_index: usize,
        window: Option<RowWindow>,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport> {
        let start = Instant::now();
        let spec = self.registry.resolve(task_key)?.clone();
        let source: SourceRef = source_ref.parse()?;
        if model.trim().is_empty() {
            return Err(SheetwrightError::config("model identifier is empty"));
        }

        progress.phase("Opening worksheet");
        let lookup = self.config.lookup_timeout;
        let worksheet: Arc<dyn Worksheet> = with_deadline(
            "worksheet lookup",
            lookup,
            self.sheets.open_worksheet(&source, worksheet_index),
        )
        .await
        .map_err(gateway_on_timeout)?;
        let grid = with_deadline("worksheet read", lookup, worksheet.all_values())
            .await
            .map_err(gateway_on_timeout)?;

        let header = grid.first().ok_or_else(|| {
            SheetwrightError::bad_input(format!("worksheet '{}' is empty", worksheet.title()))
        })?;
        let binding = selector::bind_fields(header, &spec, &self.config.result_column)?;

        progress.phase("Selecting rows");
        let window = window.unwrap_or_else(|| RowWindow::from_row(self.config.first_row));
        let rows = selector::select_rows(&grid, &binding, window, self.config.completeness_threshold);
        let selected = rows.len();
        info!(
            worksheet = %worksheet.title(),
            rows = selected,
            from = window.from,
            to = ?window.to,
            "rows selected"
        );

        let job = Arc::new(RowJob {
            generator: self.generator.clone(),
            sink: ResultSink::new(worksheet.clone(), binding.result_col, self.history.clone(), lookup),
            spec,
            model: model.to_string(),
        });

        progress.phase("Generating");
        let scheduler = BatchScheduler::new(self.config.batch_size, self.config.cooldown);
        let batch = scheduler
            .run(
                rows,
                |task| {
                    let job = job.clone();
                    async move { job.process(task).await }
                },
                progress,
            )
            .await;

        let report = RunReport {
            task_type: job.spec.task_type,
            worksheet: worksheet.title().to_string(),
            selected,
            batch,
            elapsed: start.elapsed(),
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "run complete"
        );
        progress.done(&report);
        Ok(report)
    }

    /// Run one independent `process_one` per `(task key, worksheet index)`
    /// entry, concurrently, over the default row window.
    ///
    /// Every task key is validated before any worksheet is opened.
    #[instrument(skip_all, fields(entries = entries.len()))]
    pub async fn process_many(
        &self,
        model: &str,
        source_ref: &str,
        entries: &[(String, usize)],
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<Vec<EntryReport>> {
        let mut resolved = Vec::with_capacity(entries.len());
        for (key, index) in entries {
            resolved.push((self.registry.resolve(key)?.task_type, *index));
        }
        source_ref.parse::<SourceRef>()?;

        let mut handles = Vec::with_capacity(resolved.len());
        for (task_type, index) in resolved {
            let runner = self.clone();
            let model = model.to_string();
            let source_ref = source_ref.to_string();
            let progress = progress.clone();
            handles.push((
                task_type,
                index,
                tokio::spawn(async move {
                    runner
                        .process_one(
                            &model,
                            &source_ref,
                            task_type.as_str(),
                            index,
                            None,
                            progress.as_ref(),
                        )
                        .await
                }),
            ));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (task_type, worksheet_index, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(SheetwrightError::Generation(format!("run task aborted: {e}"))),
            };
            if let Err(e) = &result {
                warn!(task = %task_type, worksheet = worksheet_index, error = %e, "entry failed");
            }
            reports.push(EntryReport {
                task_type,
                worksheet_index,
                result,
            });
        }
        Ok(reports)
    }

    /// Generate once from explicit field values, outside any worksheet.
    ///
    /// Unknown field names are rejected. The result is recorded in history
    /// with origin `manual`.
    #[instrument(skip_all, fields(task = task_key))]
    pub async fn generate_manual(
        &self,
        model: &str,
        task_key: &str,
        values: &[(String, String)],
    ) -> Result<GenerationOutput> {
        let spec = self.registry.resolve(task_key)?;
        if let Some((unknown, _)) = values
            .iter()
            .find(|(name, _)| !spec.field_names().any(|f| f == name.trim()))
        {
            return Err(SheetwrightError::bad_input(format!(
                "task '{}' has no field '{unknown}' (expected one of: {})",
                spec.task_type,
                spec.field_names().collect::<Vec<_>>().join(", ")
            )));
        }

        let fields = RowFields::from_pairs(spec.field_names().map(|name| {
            let value = values
                .iter()
                .find(|(k, _)| k.trim() == name)
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            (name, value)
        }));

        let output = self.generator.generate(model, spec, &fields).await?;
        let record = audit_record(
            spec.task_type,
            model,
            &fields,
            &output,
            "manual".to_string(),
            Origin::Manual,
        );
        let history = with_deadline("history write", self.config.lookup_timeout, self.history.record(&record));
        if let Err(e) = history.await {
            warn!(record = %record.id, error = %e, "failed to persist history record");
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationSettings;
    use crate::scheduler::RowState;
    use crate::testing::{FakeCatalog, FakeHistory, FakeImages, FakeModel, reviews_json};
    use sheetwright_sheets::{MemoryBackend, MemoryWorksheet};
    use sheetwright_shared::ErrorKind;
    use tracing_test::traced_test;

    const KEY: &str = "1AbCdEfGhIjKlMnOpQrStUvWxYz";

    fn run_config(batch_size: usize) -> RunConfig {
        RunConfig {
            batch_size,
            cooldown: Duration::from_secs(15),
            completeness_threshold: 6,
            result_column: "Result".into(),
            first_row: 3,
            lookup_timeout: Duration::from_secs(15),
        }
    }

    struct Fixture {
        runner: Runner,
        sheet: Arc<MemoryWorksheet>,
        model: Arc<FakeModel>,
        history: Arc<FakeHistory>,
    }

    fn fixture(
        sheet: Arc<MemoryWorksheet>,
        model: FakeModel,
        history: FakeHistory,
        batch_size: usize,
    ) -> Fixture {
        let model = Arc::new(model);
        let history = Arc::new(history);
        let backend = MemoryBackend::new().with_workbook(KEY, vec![sheet.clone()]);
        let generator = Generator::new(
            model.clone(),
            Arc::new(FakeCatalog::with_valve()),
            Arc::new(FakeImages::default()),
            GenerationSettings::default(),
        );
        let runner = Runner::new(
            Arc::new(AssistantRegistry::builtin()),
            Arc::new(backend),
            Arc::new(generator),
            history.clone(),
            run_config(batch_size),
        );
        Fixture {
            runner,
            sheet,
            model,
            history,
        }
    }

    fn usage_sheet(results: [&'static str; 3]) -> Arc<MemoryWorksheet> {
        MemoryWorksheet::new(
            KEY,
            "Usage",
            vec![
                vec!["domain", "product_name", "usage", "Result"],
                vec!["main", "Pump", "wells", results[0]],
                vec!["main", "Valve", "pipelines", results[1]],
                vec!["main", "Hose", "gardens", results[2]],
            ],
        )
    }

    /// Replies with the row's usage value so each output is traceable.
    fn echo_model() -> FakeModel {
        FakeModel::new(|req| {
            let usage = ["wells", "pipelines", "gardens"]
                .into_iter()
                .find(|u| req.prompt.contains(u))
                .unwrap_or("none");
            Ok(format!("<p>{usage}</p>"))
        })
    }

    const FIFTY_CHARS: &str = "This result cell already holds fifty characters..";

    #[tokio::test(start_paused = true)]
    async fn completed_rows_are_skipped_and_results_land_on_their_rows() {
        assert_eq!(FIFTY_CHARS.chars().count(), 50);
        let f = fixture(
            usage_sheet(["", FIFTY_CHARS, ""]),
            echo_model(),
            FakeHistory::default(),
            2,
        );

        let report = f
            .runner
            .process_one(
                "gpt-test",
                KEY,
                "usage",
                0,
                Some(RowWindow::from_row(2)),
                &SilentProgress,
            )
            .await
            .unwrap();

        assert_eq!(report.selected, 2);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.batch.batches, 1);
        assert_eq!(f.sheet.cell(2, 4), "<p>wells</p>");
        assert_eq!(f.sheet.cell(3, 4), FIFTY_CHARS);
        assert_eq!(f.sheet.cell(4, 4), "<p>gardens</p>");
        let rows_written: Vec<u32> = f.sheet.writes().iter().map(|(r, _, _)| *r).collect();
        assert_eq!(rows_written.len(), 2);
        assert!(rows_written.contains(&2) && rows_written.contains(&4));

        let records = f.history.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.origin == Origin::Batch));
        assert!(records.iter().any(|r| r.source == format!("{KEY}/Usage!R4")));
        assert!(records.iter().all(|r| r.fingerprint.len() == 64));
    }

    #[tokio::test]
    async fn unknown_task_type_touches_nothing() {
        let f = fixture(
            usage_sheet(["", "", ""]),
            echo_model(),
            FakeHistory::default(),
            3,
        );

        let err = f
            .runner
            .process_one("gpt-test", KEY, "bogus", 0, None, &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, SheetwrightError::Config { .. }));
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(f.sheet.writes().is_empty());
        assert!(f.model.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn timed_out_row_fails_alone() {
        let model = echo_model().with_delay_fn(|req| {
            if req.prompt.contains("pipelines") {
                Duration::from_secs(400)
            } else {
                Duration::from_secs(1)
            }
        });
        let f = fixture(usage_sheet(["", "", ""]), model, FakeHistory::default(), 3);

        let report = f
            .runner
            .process_one("gpt-test", KEY, "usage", 0, Some(RowWindow::from_row(2)), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.succeeded(), 2);
        let failures: Vec<&RowOutcome> = report.batch.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].row, 3);
        assert!(failures[0].error.as_deref().unwrap().contains("timed out"));

        assert_eq!(f.sheet.cell(2, 4), "<p>wells</p>");
        assert_eq!(f.sheet.cell(3, 4), "");
        assert_eq!(f.sheet.cell(4, 4), "<p>gardens</p>");
        assert_eq!(f.history.records().len(), 2);

        logs_assert(|lines: &[&str]| {
            let failures: Vec<&&str> = lines.iter().filter(|l| l.contains("row failed")).collect();
            match failures.as_slice() {
                [line] if line.contains("ERROR") && line.contains("row=3") => Ok(()),
                other => Err(format!("expected one error for row 3, got {other:?}")),
            }
        });
        assert!(!logs_contain("row task aborted"));
    }

    #[tokio::test]
    async fn history_failure_keeps_row_succeeded() {
        let f = fixture(
            usage_sheet(["", "", ""]),
            echo_model(),
            FakeHistory::failing(),
            3,
        );

        let report = f
            .runner
            .process_one("gpt-test", KEY, "usage", 0, Some(RowWindow::from_row(2)), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.succeeded(), 3);
        assert!(report.batch.outcomes.iter().all(|o| o.state == RowState::Succeeded));
        assert_eq!(f.sheet.cell(2, 4), "<p>wells</p>");
    }

    #[tokio::test]
    async fn write_failure_fails_row_without_history() {
        let sheet = usage_sheet(["", "", ""]);
        sheet.fail_writes_to_row(3);
        let f = fixture(sheet, echo_model(), FakeHistory::default(), 3);

        let report = f
            .runner
            .process_one("gpt-test", KEY, "usage", 0, Some(RowWindow::from_row(2)), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.batch.failures().next().unwrap().row, 3);
        assert_eq!(f.history.records().len(), 2);
        assert!(f.history.records().iter().all(|r| !r.source.ends_with("!R3")));
    }

    #[tokio::test(start_paused = true)]
    async fn batches_respect_size_and_cooldown() {
        let mut rows = vec![vec!["domain", "product_name", "usage", "Result"]];
        rows.extend(std::iter::repeat_n(vec!["main", "P", "u", ""], 5));
        let sheet = MemoryWorksheet::new(KEY, "Usage", rows);
        let model = FakeModel::replying("<p>ok</p>").with_delay(Duration::from_secs(2));
        let f = fixture(sheet, model, FakeHistory::default(), 2);

        let report = f
            .runner
            .process_one("gpt-test", KEY, "usage", 0, Some(RowWindow::from_row(2)), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.succeeded(), 5);
        assert_eq!(report.batch.batches, 3);
        assert_eq!(f.model.max_in_flight(), 2);

        let starts = f.model.starts();
        let first = starts[0];
        let offsets: Vec<Duration> = starts.iter().map(|s| *s - first).collect();
        // 2 s generation + 15 s cooldown between groups.
        assert!(offsets[1] < Duration::from_secs(1));
        assert!(offsets[2] >= Duration::from_secs(17));
        assert!(offsets[4] >= Duration::from_secs(34));
    }

    #[tokio::test]
    async fn default_window_starts_at_configured_first_row() {
        let f = fixture(
            usage_sheet(["", "", ""]),
            echo_model(),
            FakeHistory::default(),
            3,
        );

        let report = f
            .runner
            .process_one("gpt-test", KEY, "usage", 0, None, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.selected, 2);
        assert_eq!(f.sheet.cell(2, 4), "");
    }

    #[tokio::test]
    async fn fatal_lookups_fail_before_generation() {
        let f = fixture(
            usage_sheet(["", "", ""]),
            echo_model(),
            FakeHistory::default(),
            3,
        );

        let err = f
            .runner
            .process_one("gpt-test", KEY, "usage", 4, None, &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = f
            .runner
            .process_one("gpt-test", "not a sheet link!", "usage", 0, None, &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInput);

        let err = f
            .runner
            .process_one("gpt-test", KEY, "work_results", 0, None, &SilentProgress)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInput);
        assert!(f.model.requests().is_empty());
    }

    #[tokio::test]
    async fn reviews_are_written_as_json() {
        let sheet = MemoryWorksheet::new(
            KEY,
            "Reviews",
            vec![
                vec!["product_name", "description", "usage", "seo_high_freq", "seo_medium_freq", "seo_low_freq", "Result"],
                vec!["Pump", "Submersible pump", "", "pump", "", "", ""],
            ],
        );
        let f = fixture(
            sheet,
            FakeModel::replying(&reviews_json(3, 5)),
            FakeHistory::default(),
            3,
        );

        let report = f
            .runner
            .process_one("gpt-test", KEY, "reviews", 0, Some(RowWindow::from_row(2)), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report.succeeded(), 1);

        let written: Vec<serde_json::Value> = serde_json::from_str(&f.sheet.cell(2, 7)).unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(written[0]["rating"], 5);
    }

    #[tokio::test]
    async fn process_many_validates_every_key_first() {
        let f = fixture(
            usage_sheet(["", "", ""]),
            echo_model(),
            FakeHistory::default(),
            3,
        );

        let entries = vec![("usage".to_string(), 0), ("bogus".to_string(), 1)];
        let err = f
            .runner
            .process_many("gpt-test", KEY, &entries, Arc::new(SilentProgress))
            .await
            .unwrap_err();
        assert!(matches!(err, SheetwrightError::Config { .. }));
        assert!(f.model.requests().is_empty());
    }

    #[tokio::test]
    async fn process_many_reports_each_entry() {
        let usage = usage_sheet(["", "", ""]);
        let features = MemoryWorksheet::new(
            KEY,
            "Features",
            vec![
                vec!["domain", "product_name", "features", "Result"],
                vec!["main", "Pump", "hint row", ""],
                vec!["main", "Pump", "Power: 1 kW", ""],
            ],
        );
        let model = Arc::new(FakeModel::replying("<ul><li>ok</li></ul>"));
        let history = Arc::new(FakeHistory::default());
        let backend =
            MemoryBackend::new().with_workbook(KEY, vec![usage.clone(), features.clone()]);
        let generator = Generator::new(
            model.clone(),
            Arc::new(FakeCatalog::default()),
            Arc::new(FakeImages::default()),
            GenerationSettings::default(),
        );
        let runner = Runner::new(
            Arc::new(AssistantRegistry::builtin()),
            Arc::new(backend),
            Arc::new(generator),
            history.clone(),
            run_config(3),
        );

        let entries = vec![
            ("usage".to_string(), 0),
            ("features".to_string(), 1),
            ("article".to_string(), 7),
        ];
        let reports = runner
            .process_many("gpt-test", KEY, &entries, Arc::new(SilentProgress))
            .await
            .unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].task_type, TaskType::Usage);
        // Default window starts at row 3.
        assert_eq!(reports[0].result.as_ref().unwrap().succeeded(), 2);
        assert_eq!(reports[1].result.as_ref().unwrap().succeeded(), 1);
        assert_eq!(features.cell(2, 4), "");
        assert_eq!(features.cell(3, 4), "<ul><li>ok</li></ul>");
        assert_eq!(
            reports[2].result.as_ref().unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(history.records().len(), 3);
    }

    #[tokio::test]
    async fn manual_generation_records_manual_origin() {
        let f = fixture(
            usage_sheet(["", "", ""]),
            FakeModel::replying("<p>manual</p>"),
            FakeHistory::default(),
            3,
        );

        let values = vec![
            ("usage".to_string(), "wells".to_string()),
            ("domain".to_string(), "https://pumps.example".to_string()),
        ];
        let output = f
            .runner
            .generate_manual("gpt-test", "usage", &values)
            .await
            .unwrap();
        assert_eq!(output, GenerationOutput::Text("<p>manual</p>".into()));

        let records = f.history.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].origin, Origin::Manual);
        assert_eq!(records[0].domain, "https://pumps.example");

        let bad = vec![("colour".to_string(), "red".to_string())];
        let err = f
            .runner
            .generate_manual("gpt-test", "usage", &bad)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }

    #[test]
    fn fingerprint_depends_on_task_and_parameters() {
        let a = fingerprint(TaskType::Usage, r#"{"usage":"x"}"#);
        assert_eq!(a, fingerprint(TaskType::Usage, r#"{"usage":"x"}"#));
        assert_ne!(a, fingerprint(TaskType::Features, r#"{"usage":"x"}"#));
        assert_ne!(a, fingerprint(TaskType::Usage, r#"{"usage":"y"}"#));
    }
}
