//! Generation pipeline: prompt → draft → optional refinement → post-processing.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

use sheetwright_llm::{CompletionRequest, ImageAttachment, ImageFetcher, LanguageModel, OutputSchema};
use sheetwright_shared::{
    AppConfig, GenerationOutput, MAIN_DOMAIN, ProductScope, Result, Review, SheetwrightError,
};

use crate::dispatch::{AssistantSpec, CatalogContext, OutputKind};
use crate::prompt::{self, CatalogSnippet};
use crate::selector::RowFields;
use crate::sink::{ProductCatalog, with_deadline};

/// Tunables for the generation pipeline.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub temperature: Option<f32>,
    /// Exact number of reviews expected from the `reviews` task.
    pub reviews_count: usize,
    /// Deadline for catalog lookups and photo fetches.
    pub lookup_timeout: Duration,
    /// Deadline for text-only generation calls.
    pub generation_timeout: Duration,
    /// Deadline for generation calls carrying images.
    pub multimodal_timeout: Duration,
}

impl From<&AppConfig> for GenerationSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            temperature: config.generation.temperature,
            reviews_count: config.batch.reviews_count,
            lookup_timeout: Duration::from_secs(config.generation.lookup_timeout_secs),
            generation_timeout: Duration::from_secs(config.generation.generation_timeout_secs),
            multimodal_timeout: Duration::from_secs(config.generation.multimodal_timeout_secs),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Runs one task for one row against the generation backend.
pub struct Generator {
    model: Arc<dyn LanguageModel>,
    catalog: Arc<dyn ProductCatalog>,
    images: Arc<dyn ImageFetcher>,
    settings: GenerationSettings,
}

impl Generator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        catalog: Arc<dyn ProductCatalog>,
        images: Arc<dyn ImageFetcher>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            model,
            catalog,
            images,
            settings,
        }
    }

    /// Generate the final output for one row.
    #[instrument(skip_all, fields(task = %spec.task_type, model = model_id))]
    pub async fn generate(
        &self,
        model_id: &str,
        spec: &AssistantSpec,
        fields: &RowFields,
    ) -> Result<GenerationOutput> {
        check_required(spec, fields)?;

        let catalog = self.catalog_context(spec, fields).await?;
        let images = self.attachments(spec, fields).await?;
        let input = prompt::build_prompt(spec, fields, &catalog);

        let deadline = if images.is_empty() {
            self.settings.generation_timeout
        } else {
            self.settings.multimodal_timeout
        };

        let schema = (spec.output == OutputKind::Reviews).then(|| OutputSchema {
            name: "reviews".into(),
            schema: prompt::reviews_schema(self.settings.reviews_count),
        });

        let request = CompletionRequest {
            model: model_id.to_string(),
            instructions: spec.instructions.to_string(),
            prompt: input,
            images,
            schema,
            temperature: self.settings.temperature,
        };
        let draft = with_deadline("generation", deadline, self.model.complete(&request)).await?;
        debug!(
            tokens_in = draft.tokens_in,
            tokens_out = draft.tokens_out,
            latency_ms = draft.latency_ms,
            "draft generated"
        );

        let text = if spec.refine {
            let refine = CompletionRequest {
                model: model_id.to_string(),
                instructions: prompt::REFINE_INSTRUCTIONS.to_string(),
                prompt: prompt::refine_prompt(&draft.text),
                temperature: self.settings.temperature,
                ..Default::default()
            };
            let refined = with_deadline(
                "refinement",
                self.settings.generation_timeout,
                self.model.complete(&refine),
            )
            .await?;
            debug!(latency_ms = refined.latency_ms, "draft refined");
            refined.text
        } else {
            draft.text
        };

        postprocess(spec.output, &text, self.settings.reviews_count)
    }

    async fn catalog_context(&self, spec: &AssistantSpec, fields: &RowFields) -> Result<CatalogSnippet> {
        let domain = match fields.get("domain") {
            "" => MAIN_DOMAIN,
            domain => domain,
        };
        let timeout = self.settings.lookup_timeout;

        let snippet = match spec.catalog {
            CatalogContext::None => CatalogSnippet::None,
            CatalogContext::RelatedProducts => {
                let names = vec![fields.get("product_name").to_string()];
                let related = with_deadline(
                    "catalog lookup",
                    timeout,
                    self.catalog.related_products(domain, &names),
                )
                .await?;
                CatalogSnippet::Related(related)
            }
            CatalogContext::NamedProductLinks => {
                let names: Vec<String> = fields
                    .get("products_name")
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(String::from)
                    .collect();
                if names.is_empty() {
                    CatalogSnippet::None
                } else {
                    let links = with_deadline(
                        "catalog lookup",
                        timeout,
                        self.catalog.product_links(domain, ProductScope::Named(&names)),
                    )
                    .await?;
                    CatalogSnippet::UsedProducts(links)
                }
            }
            CatalogContext::AllProductLinks => {
                let links = with_deadline(
                    "catalog lookup",
                    timeout,
                    self.catalog.product_links(domain, ProductScope::All),
                )
                .await?;
                CatalogSnippet::AllLinks(links)
            }
        };
        Ok(snippet)
    }

    async fn attachments(&self, spec: &AssistantSpec, fields: &RowFields) -> Result<Vec<ImageAttachment>> {
        let mut images = Vec::new();
        for name in spec.image_fields {
            let link = fields.get(name);
            if link.is_empty() {
                continue;
            }
            let image = with_deadline(
                "photo fetch",
                self.settings.lookup_timeout,
                self.images.fetch(link),
            )
            .await?;
            images.push(image);
        }
        Ok(images)
    }
}

fn check_required(spec: &AssistantSpec, fields: &RowFields) -> Result<()> {
    let missing: Vec<&str> = spec
        .fields
        .iter()
        .filter(|f| f.required && fields.get(f.name).is_empty())
        .map(|f| f.name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SheetwrightError::validation(format!(
            "required fields are empty: {}",
            missing.join(", ")
        )))
    }
}

// ---------------------------------------------------------------------------
// Post-processing
// ---------------------------------------------------------------------------

/// Remove a Markdown code fence wrapped around the whole output.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (```html, ```json) on the opening line.
    match body.split_once('\n') {
        Some((info, inner)) if !info.contains(' ') => inner.trim(),
        _ => body.trim(),
    }
}

#[derive(Deserialize)]
struct ReviewsEnvelope {
    reviews: Vec<Review>,
}

fn parse_reviews(text: &str) -> Result<Vec<Review>> {
    if let Ok(envelope) = serde_json::from_str::<ReviewsEnvelope>(text) {
        return Ok(envelope.reviews);
    }
    serde_json::from_str::<Vec<Review>>(text)
        .map_err(|e| SheetwrightError::validation(format!("reviews are not valid JSON: {e}")))
}

fn validate_reviews(reviews: &[Review], expected: usize) -> Result<()> {
    if reviews.len() != expected {
        return Err(SheetwrightError::validation(format!(
            "expected {expected} reviews, got {}",
            reviews.len()
        )));
    }
    for (i, review) in reviews.iter().enumerate() {
        if !(1..=5).contains(&review.rating) {
            return Err(SheetwrightError::validation(format!(
                "review {} has rating {} outside 1..=5",
                i + 1,
                review.rating
            )));
        }
        let empty = [
            ("author", &review.author),
            ("pros", &review.pros),
            ("cons", &review.cons),
            ("review", &review.review),
        ]
        .into_iter()
        .find(|(_, v)| v.trim().is_empty());
        if let Some((field, _)) = empty {
            return Err(SheetwrightError::validation(format!(
                "review {} has an empty {field}",
                i + 1
            )));
        }
    }
    Ok(())
}

/// Turn raw model text into the final output for `kind`.
pub fn postprocess(kind: OutputKind, raw: &str, reviews_count: usize) -> Result<GenerationOutput> {
    let text = strip_code_fence(raw);
    if text.is_empty() {
        return Err(SheetwrightError::validation("generation returned empty output"));
    }

    match kind {
        OutputKind::Paragraph => {
            let paragraph: String = text.chars().filter(|c| *c != '\n' && *c != '\r').collect();
            Ok(GenerationOutput::Text(paragraph))
        }
        OutputKind::RichHtml => Ok(GenerationOutput::Text(text.to_string())),
        OutputKind::Reviews => {
            let reviews = parse_reviews(text)?;
            validate_reviews(&reviews, reviews_count)?;
            Ok(GenerationOutput::Reviews(reviews))
        }
    }
}
