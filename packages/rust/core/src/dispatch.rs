//! Assistant dispatch table: task type → generation recipe.
//!
//! The registry is built once per process and shared by reference. Every
//! [`TaskType`] has exactly one [`AssistantSpec`]; string keys coming from
//! callers are resolved through [`AssistantRegistry::resolve`], which is where
//! unknown task types are rejected before any sheet is touched.

use std::collections::HashMap;

use sheetwright_shared::{Result, SheetwrightError, TaskType};

use crate::prompt;

/// One input field a task reads from its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Column header / parameter name, e.g. `product_name`.
    pub name: &'static str,
    /// Human label placed inside the prompt section.
    pub label: &'static str,
    /// Whether an empty value fails the row.
    pub required: bool,
    /// Whether the field is rendered as a tagged prompt section.
    pub in_prompt: bool,
}

const fn required(name: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        label,
        required: true,
        in_prompt: true,
    }
}

const fn optional(name: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        label,
        required: false,
        in_prompt: true,
    }
}

/// A field bound from the row but not rendered as its own prompt section.
const fn context(name: &'static str, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        label: "",
        required,
        in_prompt: false,
    }
}

const DOMAIN: FieldSpec = context("domain", false);
const SEO_HIGH: FieldSpec = optional("seo_high_freq", "High-frequency keywords");
const SEO_MEDIUM: FieldSpec = optional("seo_medium_freq", "Medium-frequency keywords");
const SEO_LOW: FieldSpec = optional("seo_low_freq", "Low-frequency keywords");

/// What catalog data a task pulls in as prompt context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogContext {
    None,
    /// Products related to the row's `product_name`.
    RelatedProducts,
    /// Links for the comma-separated products in `products_name`.
    NamedProductLinks,
    /// Links for every product on the row's domain.
    AllProductLinks,
}

/// Shape of the final output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// One paragraph; newlines are stripped.
    Paragraph,
    /// Free-form HTML, left as generated.
    RichHtml,
    /// Structured review list.
    Reviews,
}

/// Everything needed to run one task type.
#[derive(Debug, Clone)]
pub struct AssistantSpec {
    pub task_type: TaskType,
    /// Ordered input fields bound from the worksheet.
    pub fields: &'static [FieldSpec],
    /// System instructions for the first generation call.
    pub instructions: &'static str,
    /// Chain a claim-removal pass over the draft.
    pub refine: bool,
    pub catalog: CatalogContext,
    pub output: OutputKind,
    /// Names of fields holding photo links sent as images.
    pub image_fields: &'static [&'static str],
}

impl AssistantSpec {
    /// Ordered names of every field the task binds.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Whether calls for this task may carry image attachments.
    pub fn multimodal(&self) -> bool {
        !self.image_fields.is_empty()
    }
}

// Field order is the legacy column order used for positional binding.

const SUB_DESCRIPTION_FIELDS: &[FieldSpec] = &[
    DOMAIN,
    context("product_name", true),
    required("description", "Description"),
    required("usage", "Usage"),
    SEO_HIGH,
    SEO_MEDIUM,
    SEO_LOW,
];

const PRODUCT_COPY_FIELDS: &[FieldSpec] = &[
    DOMAIN,
    context("product_name", true),
    required("description", "Description"),
    optional("usage", "Usage"),
    SEO_HIGH,
    SEO_MEDIUM,
    SEO_LOW,
];

const REVIEW_FIELDS: &[FieldSpec] = &[
    required("product_name", "Product name"),
    required("description", "Description"),
    optional("usage", "Usage"),
    SEO_HIGH,
    SEO_MEDIUM,
    SEO_LOW,
];

const USAGE_FIELDS: &[FieldSpec] = &[
    DOMAIN,
    context("product_name", false),
    required("usage", "Usage"),
];

const FEATURE_FIELDS: &[FieldSpec] = &[
    DOMAIN,
    context("product_name", false),
    required("features", "Features"),
];

const WORK_RESULT_FIELDS: &[FieldSpec] = &[
    DOMAIN,
    required("place_name", "Site or object"),
    optional("location", "Location"),
    optional("background_info", "Background information"),
    context("products_name", false),
    optional("descriptions", "Descriptions of the products used"),
    context("photo1", false),
    context("photo2", false),
];

const CHANGE_ARTICLE_FIELDS: &[FieldSpec] = &[
    required("title", "Article title"),
    required("article", "Article"),
    SEO_HIGH,
    SEO_MEDIUM,
    SEO_LOW,
];

const ARTICLE_FIELDS: &[FieldSpec] = &[
    required("topic", "Topic"),
    optional("comment", "Comment"),
    SEO_HIGH,
    SEO_MEDIUM,
    SEO_LOW,
];

const TECH_INSTRUCTION_FIELDS: &[FieldSpec] = &[
    DOMAIN,
    required("tech_instruction", "Technical instruction"),
    SEO_HIGH,
    SEO_MEDIUM,
    SEO_LOW,
];

const CATEGORY_FIELDS: &[FieldSpec] = &[
    DOMAIN,
    required("category_description", "Category description"),
    SEO_HIGH,
    SEO_MEDIUM,
    SEO_LOW,
];

fn builtin_spec(task_type: TaskType) -> AssistantSpec {
    let (fields, instructions, refine, catalog, output) = match task_type {
        TaskType::SubDescription => (
            SUB_DESCRIPTION_FIELDS,
            prompt::SUB_DESCRIPTION_INSTRUCTIONS,
            true,
            CatalogContext::RelatedProducts,
            OutputKind::Paragraph,
        ),
        TaskType::Description => (
            PRODUCT_COPY_FIELDS,
            prompt::DESCRIPTION_INSTRUCTIONS,
            true,
            CatalogContext::RelatedProducts,
            OutputKind::Paragraph,
        ),
        TaskType::Usage => (
            USAGE_FIELDS,
            prompt::USAGE_INSTRUCTIONS,
            false,
            CatalogContext::None,
            OutputKind::RichHtml,
        ),
        TaskType::Features => (
            FEATURE_FIELDS,
            prompt::FEATURES_INSTRUCTIONS,
            false,
            CatalogContext::None,
            OutputKind::RichHtml,
        ),
        TaskType::Preview => (
            PRODUCT_COPY_FIELDS,
            prompt::PREVIEW_INSTRUCTIONS,
            false,
            CatalogContext::RelatedProducts,
            OutputKind::Paragraph,
        ),
        TaskType::Reviews => (
            REVIEW_FIELDS,
            prompt::REVIEWS_INSTRUCTIONS,
            false,
            CatalogContext::None,
            OutputKind::Reviews,
        ),
        TaskType::WorkResults => (
            WORK_RESULT_FIELDS,
            prompt::WORK_RESULTS_INSTRUCTIONS,
            false,
            CatalogContext::NamedProductLinks,
            OutputKind::RichHtml,
        ),
        TaskType::ChangeArticle => (
            CHANGE_ARTICLE_FIELDS,
            prompt::CHANGE_ARTICLE_INSTRUCTIONS,
            false,
            CatalogContext::None,
            OutputKind::RichHtml,
        ),
        TaskType::Article => (
            ARTICLE_FIELDS,
            prompt::ARTICLE_INSTRUCTIONS,
            false,
            CatalogContext::None,
            OutputKind::RichHtml,
        ),
        TaskType::TechInstruction => (
            TECH_INSTRUCTION_FIELDS,
            prompt::TECH_INSTRUCTION_INSTRUCTIONS,
            false,
            CatalogContext::AllProductLinks,
            OutputKind::RichHtml,
        ),
        TaskType::CategoryDescription => (
            CATEGORY_FIELDS,
            prompt::CATEGORY_DESCRIPTION_INSTRUCTIONS,
            false,
            CatalogContext::AllProductLinks,
            OutputKind::RichHtml,
        ),
    };

    let image_fields: &'static [&'static str] = match task_type {
        TaskType::WorkResults => &["photo1", "photo2"],
        _ => &[],
    };

    AssistantSpec {
        task_type,
        fields,
        instructions,
        refine,
        catalog,
        output,
        image_fields,
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable task type → assistant mapping.
#[derive(Debug, Clone)]
pub struct AssistantRegistry {
    specs: HashMap<TaskType, AssistantSpec>,
}

impl AssistantRegistry {
    /// Registry covering every built-in task type.
    pub fn builtin() -> Self {
        let specs = TaskType::ALL
            .into_iter()
            .map(|task| (task, builtin_spec(task)))
            .collect();
        Self { specs }
    }

    /// Look up the assistant for a task type.
    pub fn lookup(&self, task_type: TaskType) -> Option<&AssistantSpec> {
        self.specs.get(&task_type)
    }

    /// Resolve a caller-supplied task key. Unknown keys are config errors.
    pub fn resolve(&self, key: &str) -> Result<&AssistantSpec> {
        let task_type: TaskType = key.trim().parse()?;
        self.lookup(task_type).ok_or_else(|| {
            SheetwrightError::config(format!(
                "no assistant registered for task type '{task_type}'"
            ))
        })
    }

    /// Every registered assistant, in [`TaskType::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = &AssistantSpec> + '_ {
        TaskType::ALL.iter().filter_map(|t| self.specs.get(t))
    }
}

impl Default for AssistantRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
