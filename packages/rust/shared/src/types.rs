//! Core domain types shared by the Sheetwright crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SheetwrightError;

// ---------------------------------------------------------------------------
// TaskType
// ---------------------------------------------------------------------------

/// The kind of content generated for a worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SubDescription,
    Description,
    Usage,
    Features,
    Preview,
    Reviews,
    WorkResults,
    ChangeArticle,
    Article,
    TechInstruction,
    CategoryDescription,
}

impl TaskType {
    /// Every supported task type, in display order.
    pub const ALL: [TaskType; 11] = [
        Self::SubDescription,
        Self::Description,
        Self::Usage,
        Self::Features,
        Self::Preview,
        Self::Reviews,
        Self::WorkResults,
        Self::ChangeArticle,
        Self::Article,
        Self::TechInstruction,
        Self::CategoryDescription,
    ];

    /// Stable key used in configs, CLI arguments and history records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubDescription => "sub_description",
            Self::Description => "description",
            Self::Usage => "usage",
            Self::Features => "features",
            Self::Preview => "preview",
            Self::Reviews => "reviews",
            Self::WorkResults => "work_results",
            Self::ChangeArticle => "change_article",
            Self::Article => "article",
            Self::TechInstruction => "tech_instruction",
            Self::CategoryDescription => "category_description",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = SheetwrightError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|task| task.as_str() == s)
            .ok_or_else(|| SheetwrightError::config(format!("unknown task type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Generation output
// ---------------------------------------------------------------------------

/// One generated customer review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub author: String,
    pub rating: u8,
    #[serde(default)]
    pub experience_of_use: String,
    pub pros: String,
    pub cons: String,
    pub review: String,
}

/// Final, post-processed output of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutput {
    /// Plain text or HTML.
    Text(String),
    /// Structured reviews (the `reviews` task).
    Reviews(Vec<Review>),
}

impl GenerationOutput {
    /// Render the output as the string written into the result cell.
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Reviews(reviews) => {
                serde_json::to_string_pretty(reviews).unwrap_or_else(|_| String::from("[]"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Product catalog
// ---------------------------------------------------------------------------

/// Domain key selecting the base (non-satellite) product links.
pub const MAIN_DOMAIN: &str = "main";

/// A product related to the one being described.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedProduct {
    pub link: String,
    /// How the related product relates to the described one.
    pub description: String,
}

/// Which products a link lookup covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductScope<'a> {
    /// Every product published on the domain.
    All,
    /// Only the named products.
    Named(&'a [String]),
}

// ---------------------------------------------------------------------------
// HistoryRecord
// ---------------------------------------------------------------------------

/// Where a generation was requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Spreadsheet batch run.
    Batch,
    /// Single interactive request.
    Manual,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Manual => "manual",
        }
    }
}

impl FromStr for Origin {
    type Err = SheetwrightError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "batch" => Ok(Self::Batch),
            "manual" => Ok(Self::Manual),
            other => Err(SheetwrightError::validation(format!("unknown origin '{other}'"))),
        }
    }
}

/// Append-only audit entry for one completed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Time-sortable identifier (UUID v7).
    pub id: String,
    pub task_type: TaskType,
    pub model: String,
    pub domain: String,
    /// JSON object of the input fields the generation was run with.
    pub parameters: String,
    /// SHA-256 of task type + parameters, hex encoded.
    pub fingerprint: String,
    /// Rendered output as written to the result cell.
    pub output: String,
    /// Identity of the source row, e.g. `<sheet key>/<worksheet>!R12`.
    pub source: String,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Generate a fresh record identifier.
    pub fn new_id() -> String {
        Uuid::now_v7().to_string()
    }
}
