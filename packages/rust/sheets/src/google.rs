//! Google Sheets v4 REST client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use sheetwright_shared::{Result, SheetwrightError};

use crate::a1::{self, SourceRef};
use crate::{SheetsBackend, Worksheet};

/// User-Agent string for Sheets API requests.
const USER_AGENT: &str = concat!("Sheetwright/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Google Sheets backend authenticated with an OAuth bearer token.
#[derive(Clone)]
pub struct GoogleSheets {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    base_url: Url,
    token: String,
    timeout: Duration,
}

impl GoogleSheets {
    /// Create a client against `base_url` (normally `https://sheets.googleapis.com`).
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            SheetwrightError::config(format!("invalid sheets base URL '{base_url}': {e}"))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                SheetwrightError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                base_url,
                token: token.into(),
                timeout,
            }),
        })
    }
}

impl Inner {
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SheetwrightError::config("sheets base URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url> {
        self.endpoint(&["v4", "spreadsheets", spreadsheet_id, "values", range])
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| self.transport_error(e, operation))?;
        check_status(response, operation).await
    }

    /// Map a reqwest transport failure to the error taxonomy.
    fn transport_error(&self, e: reqwest::Error, operation: &str) -> SheetwrightError {
        if e.is_timeout() {
            SheetwrightError::timeout(operation, self.timeout)
        } else if e.is_connect() {
            SheetwrightError::UpstreamGateway(format!("{operation}: {e}"))
        } else {
            SheetwrightError::Network(format!("{operation}: {e}"))
        }
    }
}

async fn check_status(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(300).collect();
    let message = format!("{operation}: {snippet}");
    Err(match status {
        StatusCode::NOT_FOUND => SheetwrightError::not_found(message),
        StatusCode::BAD_REQUEST => SheetwrightError::bad_input(message),
        s if s.is_server_error() => SheetwrightError::UpstreamGateway(format!("{s} {message}")),
        s => SheetwrightError::Rejected {
            status: s.as_u16(),
            message,
        },
    })
}

#[async_trait]
impl SheetsBackend for GoogleSheets {
    #[instrument(skip_all, fields(sheet = %source, index = index))]
    async fn open_worksheet(&self, source: &SourceRef, index: usize) -> Result<Arc<dyn Worksheet>> {
        let mut url = self.inner.endpoint(&["v4", "spreadsheets", source.key()])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(title,index)");

        let response = self
            .inner
            .send(self.inner.client.get(url), "open spreadsheet")
            .await
            .map_err(|e| match e {
                // Any failure reaching the backend here aborts the run.
                SheetwrightError::Network(msg) | SheetwrightError::Timeout { operation: msg, .. } => {
                    SheetwrightError::UpstreamGateway(msg)
                }
                SheetwrightError::Rejected { status, message } => {
                    SheetwrightError::UpstreamGateway(format!("{status} {message}"))
                }
                other => other,
            })?;

        let meta: SpreadsheetMeta = response.json().await.map_err(|e| {
            SheetwrightError::UpstreamGateway(format!("invalid spreadsheet metadata: {e}"))
        })?;

        let title = meta
            .sheets
            .into_iter()
            .map(|entry| entry.properties)
            .find(|props| props.index == index)
            .map(|props| props.title)
            .ok_or_else(|| {
                SheetwrightError::not_found(format!(
                    "worksheet {index} does not exist in spreadsheet {source}"
                ))
            })?;

        info!(%title, "opened worksheet");

        Ok(Arc::new(GoogleWorksheet {
            inner: self.inner.clone(),
            spreadsheet_id: source.key().to_string(),
            title,
        }))
    }
}

// ---------------------------------------------------------------------------
// Worksheet
// ---------------------------------------------------------------------------

struct GoogleWorksheet {
    inner: Arc<Inner>,
    spreadsheet_id: String,
    title: String,
}

impl GoogleWorksheet {
    async fn get_values(&self, range: &str, major_dimension: &str) -> Result<Vec<Vec<String>>> {
        let mut url = self.inner.values_url(&self.spreadsheet_id, range)?;
        url.query_pairs_mut()
            .append_pair("majorDimension", major_dimension);

        debug!(range, "reading values");
        let response = self
            .inner
            .send(self.inner.client.get(url), "read values")
            .await?;

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| SheetwrightError::Network(format!("invalid values response: {e}")))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }
}

#[async_trait]
impl Worksheet for GoogleWorksheet {
    fn title(&self) -> &str {
        &self.title
    }

    fn source_id(&self) -> String {
        format!("{}/{}", self.spreadsheet_id, self.title)
    }

    async fn all_values(&self) -> Result<Vec<Vec<String>>> {
        self.get_values(&a1::quote_title(&self.title), "ROWS").await
    }

    async fn col_values(&self, col: u32) -> Result<Vec<String>> {
        let columns = self
            .get_values(&a1::column_range(&self.title, col), "COLUMNS")
            .await?;
        Ok(columns.into_iter().next().unwrap_or_default())
    }

    async fn read_cell(&self, row: u32, col: u32) -> Result<String> {
        let rows = self
            .get_values(&a1::cell_range(&self.title, row, col), "ROWS")
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| r.into_iter().next())
            .unwrap_or_default())
    }

    async fn update_cell(&self, row: u32, col: u32, value: &str) -> Result<()> {
        let range = a1::cell_range(&self.title, row, col);
        let mut url = self.inner.values_url(&self.spreadsheet_id, &range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let body = serde_json::json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [[value]],
        });

        debug!(%range, len = value.len(), "writing cell");
        self.inner
            .send(self.inner.client.put(url).json(&body), "update cell")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source() -> SourceRef {
        "sheet-key".parse().unwrap()
    }

    async fn mount_meta(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sheets": [
                    {"properties": {"title": "Descriptions", "index": 0}},
                    {"properties": {"title": "Usage", "index": 1}}
                ]
            })))
            .mount(server)
            .await;
    }

    fn client(server: &MockServer) -> GoogleSheets {
        GoogleSheets::new(&server.uri(), "token", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn opens_worksheet_by_index() {
        let server = MockServer::start().await;
        mount_meta(&server).await;

        let ws = client(&server).open_worksheet(&source(), 1).await.unwrap();
        assert_eq!(ws.title(), "Usage");
        assert_eq!(ws.source_id(), "sheet-key/Usage");
    }

    #[tokio::test]
    async fn missing_worksheet_is_not_found() {
        let server = MockServer::start().await;
        mount_meta(&server).await;

        let err = client(&server)
            .open_worksheet(&source(), 7)
            .await
            .err()
            .expect("worksheet 7 should not exist");
        assert!(matches!(err, SheetwrightError::NotFound { .. }));
    }

    #[tokio::test]
    async fn missing_spreadsheet_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Requested entity was not found."))
            .mount(&server)
            .await;

        let err = client(&server).open_worksheet(&source(), 0).await.err().unwrap();
        assert!(matches!(err, SheetwrightError::NotFound { .. }));
    }

    #[tokio::test]
    async fn server_error_on_open_is_upstream_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).open_worksheet(&source(), 0).await.err().unwrap();
        assert!(matches!(err, SheetwrightError::UpstreamGateway(_)));
    }

    #[tokio::test]
    async fn reads_rows_and_columns() {
        let server = MockServer::start().await;
        mount_meta(&server).await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/v4/spreadsheets/sheet-key/values/.+"))
            .and(query_param("majorDimension", "ROWS"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "range": "'Descriptions'!A1:C3",
                "majorDimension": "ROWS",
                "values": [["name", "Result"], ["Pump", 42], ["Valve"]]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/v4/spreadsheets/sheet-key/values/.+"))
            .and(query_param("majorDimension", "COLUMNS"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [["Result", "42"]]
            })))
            .mount(&server)
            .await;

        let ws = client(&server).open_worksheet(&source(), 0).await.unwrap();

        let rows = ws.all_values().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["Pump".to_string(), "42".to_string()]);
        assert_eq!(rows[2], vec!["Valve".to_string()]);

        let col = ws.col_values(2).await.unwrap();
        assert_eq!(col, vec!["Result".to_string(), "42".to_string()]);
    }

    #[tokio::test]
    async fn update_cell_puts_raw_value() {
        let server = MockServer::start().await;
        mount_meta(&server).await;

        Mock::given(method("PUT"))
            .and(path_regex(r"^/v4/spreadsheets/sheet-key/values/.+C5$"))
            .and(query_param("valueInputOption", "RAW"))
            .and(body_partial_json(serde_json::json!({"values": [["<p>done</p>"]]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let ws = client(&server).open_worksheet(&source(), 0).await.unwrap();
        ws.update_cell(5, 3, "<p>done</p>").await.unwrap();
    }

    #[tokio::test]
    async fn rejected_write_keeps_status() {
        let server = MockServer::start().await;
        mount_meta(&server).await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let ws = client(&server).open_worksheet(&source(), 0).await.unwrap();
        let err = ws.update_cell(2, 1, "x").await.unwrap_err();
        assert!(matches!(err, SheetwrightError::Rejected { status: 403, .. }));
    }
}
