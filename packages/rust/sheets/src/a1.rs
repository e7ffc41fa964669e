//! A1-notation helpers and spreadsheet reference parsing.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use sheetwright_shared::SheetwrightError;

static URL_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/spreadsheets/d/([A-Za-z0-9_-]+)").expect("valid regex"));

static BARE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));

// ---------------------------------------------------------------------------
// SourceRef
// ---------------------------------------------------------------------------

/// A reference to one spreadsheet: a sharing URL or its bare key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    key: String,
}

impl SourceRef {
    /// The spreadsheet key (the `<key>` in `/spreadsheets/d/<key>`).
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl FromStr for SourceRef {
    type Err = SheetwrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Ok(url) = Url::parse(s) {
            return URL_KEY
                .captures(url.path())
                .map(|caps| Self {
                    key: caps[1].to_string(),
                })
                .ok_or_else(|| {
                    SheetwrightError::bad_input(format!(
                        "no spreadsheet key found in link '{s}'"
                    ))
                });
        }

        if BARE_KEY.is_match(s) {
            return Ok(Self { key: s.to_string() });
        }

        Err(SheetwrightError::bad_input(format!(
            "'{s}' is neither a spreadsheet link nor a spreadsheet key"
        )))
    }
}

// ---------------------------------------------------------------------------
// A1 notation
// ---------------------------------------------------------------------------

/// Column letters for a 1-based column index (`1 → A`, `27 → AA`).
pub fn column_letters(col: u32) -> String {
    let mut n = col;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Quote a worksheet title for use in a range (`O'Brien` → `'O''Brien'`).
pub fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// A1 range for a single cell, e.g. `'Sheet 1'!C12`.
pub fn cell_range(title: &str, row: u32, col: u32) -> String {
    format!("{}!{}{row}", quote_title(title), column_letters(col))
}

/// A1 range for a whole column, e.g. `'Sheet 1'!C:C`.
pub fn column_range(title: &str, col: u32) -> String {
    let letters = column_letters(col);
    format!("{}!{letters}:{letters}", quote_title(title))
}
