//! Prompt assembly and per-task instructions.
//!
//! Prompts are built from tagged sections (`<tag>\nLabel:\nvalue\n</tag>`):
//! SEO keyword tiers first, then the task's own fields in column order, then
//! catalog context. Empty values are left out.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use sheetwright_shared::RelatedProduct;

use crate::dispatch::AssistantSpec;
use crate::selector::RowFields;

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

pub const SUB_DESCRIPTION_INSTRUCTIONS: &str = "\
You write short product sub-descriptions for an online store. Write one \
paragraph of two to four sentences in the language of the description. Work \
the high-frequency keywords in naturally, use medium and low frequency ones \
where they fit. When related products are given, mention at most one of them \
as an HTML link. Output HTML without headings or lists.";

pub const DESCRIPTION_INSTRUCTIONS: &str = "\
You write product descriptions for an online store. Write one HTML paragraph \
describing the product, its purpose and key benefits, based only on the \
provided description and usage. Use the keyword tiers in order of priority \
without stuffing. When related products are given, link to the most relevant \
ones with <a> tags. Do not invent specifications.";

pub const USAGE_INSTRUCTIONS: &str = "\
You rewrite product usage notes into structured HTML for a product page. Use \
short paragraphs and <ul> lists where steps or scenarios are enumerated. Keep \
every fact from the input and add none.";

pub const FEATURES_INSTRUCTIONS: &str = "\
You turn raw product properties into an HTML features block for a product \
page. Group related properties, use <ul> lists and keep units and values \
exactly as given.";

pub const PREVIEW_INSTRUCTIONS: &str = "\
You write catalog preview snippets. Write a single sentence or two that make \
the product stand out in a category listing, using the high-frequency \
keywords. Plain text, no HTML tags, no line breaks.";

pub const REVIEWS_INSTRUCTIONS: &str = "\
You write realistic customer reviews of a product based on its description \
and usage. Each review has a distinct author name, a rating from 1 to 5, how \
long or in what setting the product was used, pros, cons and the review text. \
Vary tone and length. Return JSON matching the schema.";

pub const WORK_RESULTS_INSTRUCTIONS: &str = "\
You write case studies of completed work for a company website. Describe the \
site, the task, the products used and the result, using the attached photos \
for visual details. Link each used product by its provided URL. Output HTML \
with a heading and paragraphs.";

pub const CHANGE_ARTICLE_INSTRUCTIONS: &str = "\
You rewrite an existing article for SEO. Keep the title's meaning, the \
structure and every fact, improve readability and work the keyword tiers in \
naturally. Output HTML.";

pub const ARTICLE_INSTRUCTIONS: &str = "\
You write an informational article on the given topic, following the \
author's comment. Use headings, paragraphs and lists and work the keyword \
tiers in naturally. Output HTML.";

pub const TECH_INSTRUCTION_INSTRUCTIONS: &str = "\
You edit technical instructions for publication. Keep every step, value and \
warning, fix structure and wording, and link product names that appear in the \
text to the provided product URLs. Output HTML.";

pub const CATEGORY_DESCRIPTION_INSTRUCTIONS: &str = "\
You rewrite catalog category descriptions. Keep the meaning, improve \
structure, work the keyword tiers in and link product names that appear in \
the text to the provided product URLs. Output HTML.";

/// Instructions for the claim-removal pass over a draft.
pub const REFINE_INSTRUCTIONS: &str = "\
You review generated product copy before publication. Remove every claim \
that cannot be verified from typical product information: guarantees, \
certifications, test results, numeric performance figures, comparisons with \
competitors and superlatives. Keep everything else, including HTML markup, \
unchanged. Return only the corrected text.";

// ---------------------------------------------------------------------------
// Catalog context
// ---------------------------------------------------------------------------

/// Catalog data rendered into the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CatalogSnippet {
    #[default]
    None,
    /// Related products with link and relation description.
    Related(BTreeMap<String, RelatedProduct>),
    /// Product links for products used on a site.
    UsedProducts(BTreeMap<String, String>),
    /// Links for every product on the domain.
    AllLinks(BTreeMap<String, String>),
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PromptBuilder {
    out: String,
}

impl PromptBuilder {
    fn section(&mut self, tag: &str, label: &str, body: &str) {
        let body = body.trim();
        if body.is_empty() {
            return;
        }
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        let _ = write!(self.out, "<{tag}>\n{label}:\n{body}\n</{tag}>");
    }

    fn finish(self) -> String {
        self.out
    }
}

fn is_seo(name: &str) -> bool {
    name.starts_with("seo_")
}

/// Assemble the first-call prompt for one row.
pub fn build_prompt(spec: &AssistantSpec, fields: &RowFields, catalog: &CatalogSnippet) -> String {
    let mut builder = PromptBuilder::default();

    let sections = spec.fields.iter().filter(|f| f.in_prompt);
    for field in sections.clone().filter(|f| is_seo(f.name)) {
        builder.section(field.name, field.label, fields.get(field.name));
    }
    for field in sections.filter(|f| !is_seo(f.name)) {
        builder.section(field.name, field.label, fields.get(field.name));
    }

    match catalog {
        CatalogSnippet::None => {}
        CatalogSnippet::Related(related) => {
            let body = related
                .iter()
                .map(|(name, product)| {
                    if product.description.is_empty() {
                        format!("- {name}: {}", product.link)
                    } else {
                        format!("- {name}: {} ({})", product.link, product.description)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            builder.section("related_products", "Related products", &body);
        }
        CatalogSnippet::UsedProducts(links) => {
            builder.section("used_products", "Products used", &render_links(links));
        }
        CatalogSnippet::AllLinks(links) => {
            builder.section("products_links", "Product links", &render_links(links));
        }
    }

    builder.finish()
}

fn render_links(links: &BTreeMap<String, String>) -> String {
    links
        .iter()
        .map(|(name, link)| format!("- {name}: {link}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for the claim-removal pass.
pub fn refine_prompt(draft: &str) -> String {
    format!("Generated result:\n{}", draft.trim())
}

/// JSON schema for the `reviews` task with exactly `count` entries.
pub fn reviews_schema(count: usize) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "reviews": {
                "type": "array",
                "minItems": count,
                "maxItems": count,
                "items": {
                    "type": "object",
                    "properties": {
                        "author": {"type": "string"},
                        "rating": {"type": "integer", "minimum": 1, "maximum": 5},
                        "experience_of_use": {"type": "string"},
                        "pros": {"type": "string"},
                        "cons": {"type": "string"},
                        "review": {"type": "string"}
                    },
                    "required": ["author", "rating", "experience_of_use", "pros", "cons", "review"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["reviews"],
        "additionalProperties": false
    })
}
