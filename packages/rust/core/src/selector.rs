//! Row selection: which worksheet rows still need a result.
//!
//! Sheet rows are 1-based and row 1 is the header, so grid index `i` is sheet
//! row `i + 1` and the first data row is row 2.

use sheetwright_shared::{Result, SheetwrightError};

use crate::dispatch::AssistantSpec;

/// First sheet row that can hold data.
pub const FIRST_DATA_ROW: u32 = 2;

/// Input values of one row, in the task's field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFields {
    values: Vec<(&'static str, String)>,
}

impl RowFields {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (&'static str, String)>) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }

    /// Value of `name`, trimmed; empty when the field is absent.
    pub fn get(&self, name: &str) -> &str {
        self.values
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim())
            .unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Whether every value is empty.
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|(_, v)| v.trim().is_empty())
    }

    /// Fields as a JSON object, for audit records.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                .collect(),
        )
    }
}

/// One row selected for generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    /// Absolute 1-based sheet row number.
    pub row: u32,
    pub fields: RowFields,
}

/// Half-open window `[from, to)` of sheet row numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWindow {
    pub from: u32,
    /// Exclusive end; `None` runs to the last row.
    pub to: Option<u32>,
}

impl RowWindow {
    pub fn new(from: u32, to: Option<u32>) -> Result<Self> {
        if let Some(to) = to {
            if to <= from {
                return Err(SheetwrightError::bad_input(format!(
                    "row window [{from}, {to}) is empty"
                )));
            }
        }
        Ok(Self { from, to })
    }

    /// Window starting at `from` with no end.
    pub fn from_row(from: u32) -> Self {
        Self { from, to: None }
    }

    fn contains(&self, row: u32) -> bool {
        row >= self.from.max(FIRST_DATA_ROW) && self.to.is_none_or(|to| row < to)
    }
}

// ---------------------------------------------------------------------------
// Field binding
// ---------------------------------------------------------------------------

/// Worksheet columns (1-based) the task's fields and result are bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub columns: Vec<(&'static str, u32)>,
    pub result_col: u32,
}

fn normalize_header(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Bind `spec`'s fields and the result column to header positions.
///
/// Fields are matched by header name. A header that names none of the fields
/// is the legacy layout and binds positionally (fields in order over the
/// non-result columns) provided it has enough columns. Once any field matches
/// by name, unmatched optional fields stay unbound (and read as empty) and an
/// unmatched required field is an error.
pub fn bind_fields(header: &[String], spec: &AssistantSpec, result_column: &str) -> Result<FieldBinding> {
    let normalized: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
    let find = |name: &str| {
        let wanted = normalize_header(name);
        normalized
            .iter()
            .position(|h| *h == wanted)
            .map(|i| i as u32 + 1)
    };

    let result_col = find(result_column).ok_or_else(|| {
        SheetwrightError::bad_input(format!(
            "result column '{result_column}' not found in header"
        ))
    })?;

    let by_name: Vec<Option<u32>> = spec.field_names().map(|name| find(name)).collect();

    if by_name.iter().all(Option::is_none) {
        let input_cols: Vec<u32> = (1..=header.len() as u32)
            .filter(|col| *col != result_col)
            .collect();
        if input_cols.len() < spec.fields.len() {
            return Err(SheetwrightError::bad_input(format!(
                "worksheet names none of the task fields and has {} input columns, {} fields required",
                input_cols.len(),
                spec.fields.len()
            )));
        }
        return Ok(FieldBinding {
            columns: spec.field_names().zip(input_cols).collect(),
            result_col,
        });
    }

    let missing: Vec<&str> = spec
        .fields
        .iter()
        .zip(&by_name)
        .filter(|(field, col)| field.required && col.is_none())
        .map(|(field, _)| field.name)
        .collect();
    if !missing.is_empty() {
        return Err(SheetwrightError::bad_input(format!(
            "worksheet has no columns for {}",
            missing.join(", ")
        )));
    }

    Ok(FieldBinding {
        columns: spec
            .field_names()
            .zip(by_name)
            .filter_map(|(name, col)| col.map(|col| (name, col)))
            .collect(),
        result_col,
    })
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

fn cell(row: &[String], col: u32) -> &str {
    row.get(col as usize - 1).map(String::as_str).unwrap_or("")
}

/// Rows inside `window` whose result is shorter than `threshold` characters,
/// in sheet order. Blank rows are skipped.
pub fn select_rows(
    grid: &[Vec<String>],
    binding: &FieldBinding,
    window: RowWindow,
    threshold: usize,
) -> Vec<TaskRow> {
    grid.iter()
        .enumerate()
        .map(|(i, values)| (i as u32 + 1, values))
        .filter(|(row, _)| window.contains(*row))
        .filter(|(_, values)| cell(values, binding.result_col).trim().chars().count() < threshold)
        .map(|(row, values)| TaskRow {
            row,
            fields: RowFields::from_pairs(
                binding
                    .columns
                    .iter()
                    .map(|(name, col)| (*name, cell(values, *col).to_string())),
            ),
        })
        .filter(|task| !task.fields.is_blank())
        .collect()
}
