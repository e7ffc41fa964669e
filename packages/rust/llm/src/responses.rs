//! OpenAI Responses API client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use sheetwright_shared::{Result, SheetwrightError};

use crate::{Completion, CompletionRequest, LanguageModel};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("Sheetwright/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: Input<'a>,
    store: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextConfig<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Input<'a> {
    Text(&'a str),
    Messages(Vec<InputMessage<'a>>),
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    InputText { text: &'a str },
    InputImage { image_url: String },
}

#[derive(Debug, Serialize)]
struct TextConfig<'a> {
    format: SchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct SchemaFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    schema: &'a serde_json::Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    model: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl ResponsesBody {
    /// Concatenate every `output_text` part of every message item.
    fn output_text(&self) -> String {
        self.output
            .iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content.iter())
            .filter(|part| part.kind == "output_text")
            .map(|part| part.text.as_str())
            .collect()
    }
}

fn build_body(request: &CompletionRequest) -> ResponsesRequest<'_> {
    let input = if request.images.is_empty() {
        Input::Text(&request.prompt)
    } else {
        let mut content = vec![ContentPart::InputText {
            text: &request.prompt,
        }];
        content.extend(request.images.iter().map(|image| ContentPart::InputImage {
            image_url: image.data_url(),
        }));
        Input::Messages(vec![InputMessage {
            role: "user",
            content,
        }])
    };

    ResponsesRequest {
        model: &request.model,
        instructions: &request.instructions,
        input,
        store: false,
        temperature: request.temperature,
        text: request.schema.as_ref().map(|schema| TextConfig {
            format: SchemaFormat {
                kind: "json_schema",
                name: &schema.name,
                schema: &schema.schema,
                strict: true,
            },
        }),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Client for `POST {base_url}/responses`.
pub struct ResponsesClient {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl ResponsesClient {
    /// Create a client. `timeout` bounds every request made by this client;
    /// callers wrap individual calls in tighter deadlines where needed.
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                SheetwrightError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/responses", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            timeout,
        })
    }

    fn rejection(&self, status: StatusCode, body: &str) -> SheetwrightError {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|env| env.error.message)
            .unwrap_or_else(|_| body.chars().take(300).collect());

        match status {
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                SheetwrightError::timeout("generation", self.timeout)
            }
            s if s.is_client_error() => SheetwrightError::Rejected {
                status: s.as_u16(),
                message,
            },
            s => SheetwrightError::Generation(format!("{s}: {message}")),
        }
    }
}

#[async_trait]
impl LanguageModel for ResponsesClient {
    #[instrument(skip_all, fields(model = %request.model, images = request.images.len()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let started = Instant::now();
        let body = build_body(request);

        debug!(prompt_len = request.prompt.len(), "sending generation request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SheetwrightError::timeout("generation", self.timeout)
                } else {
                    SheetwrightError::Network(format!("generation request failed: {e}"))
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                SheetwrightError::timeout("generation", self.timeout)
            } else {
                SheetwrightError::Network(format!("failed to read generation response: {e}"))
            }
        })?;

        if !status.is_success() {
            warn!(%status, "generation request rejected");
            return Err(self.rejection(status, &text));
        }

        let parsed: ResponsesBody = serde_json::from_str(&text).map_err(|e| {
            SheetwrightError::Generation(format!("invalid generation response: {e}"))
        })?;

        if let Some(status) = parsed.status.as_deref() {
            if status != "completed" {
                return Err(SheetwrightError::Generation(format!(
                    "generation finished with status '{status}'"
                )));
            }
        }

        let usage = parsed.usage.as_ref();
        Ok(Completion {
            text: parsed.output_text(),
            model: if parsed.model.is_empty() {
                request.model.clone()
            } else {
                parsed.model.clone()
            },
            tokens_in: usage.map_or(0, |u| u.input_tokens),
            tokens_out: usage.map_or(0, |u| u.output_tokens),
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImageAttachment, OutputSchema};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4.1".into(),
            instructions: "Write a product description.".into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    fn ok_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "resp_1",
            "model": "gpt-4.1-2025-04-14",
            "status": "completed",
            "output": [
                {"type": "reasoning", "content": []},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": text, "annotations": []}
                ]}
            ],
            "usage": {"input_tokens": 120, "output_tokens": 45}
        })
    }

    #[test]
    fn text_request_serializes_plain_input() {
        let req = request("<description>Pump</description>");
        let json = serde_json::to_value(build_body(&req)).unwrap();
        assert_eq!(json["input"], "<description>Pump</description>");
        assert_eq!(json["store"], false);
        assert!(json.get("text").is_none());
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn image_request_serializes_multimodal_content() {
        let mut req = request("<place_name>Depot</place_name>");
        req.images.push(ImageAttachment {
            mime: "image/jpeg".into(),
            bytes: vec![1, 2, 3],
        });
        let json = serde_json::to_value(build_body(&req)).unwrap();
        let content = &json["input"][0]["content"];
        assert_eq!(json["input"][0]["role"], "user");
        assert_eq!(content[0]["type"], "input_text");
        assert_eq!(content[1]["type"], "input_image");
        assert_eq!(content[1]["image_url"], "data:image/jpeg;base64,AQID");
    }

    #[test]
    fn schema_request_serializes_strict_format() {
        let mut req = request("reviews");
        req.schema = Some(OutputSchema {
            name: "reviews".into(),
            schema: serde_json::json!({"type": "object"}),
        });
        let json = serde_json::to_value(build_body(&req)).unwrap();
        assert_eq!(json["text"]["format"]["type"], "json_schema");
        assert_eq!(json["text"]["format"]["name"], "reviews");
        assert_eq!(json["text"]["format"]["strict"], true);
    }

    #[tokio::test]
    async fn completes_and_collects_output_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/responses"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4.1", "store": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("<p>Pump</p>")))
            .mount(&server)
            .await;

        let client = ResponsesClient::new(
            &format!("{}/v1/", server.uri()),
            "sk-test",
            Duration::from_secs(5),
        )
        .unwrap();
        let completion = client.complete(&request("pump")).await.unwrap();

        assert_eq!(completion.text, "<p>Pump</p>");
        assert_eq!(completion.model, "gpt-4.1-2025-04-14");
        assert_eq!(completion.tokens_in, 120);
        assert_eq!(completion.tokens_out, 45);
    }

    #[tokio::test]
    async fn rate_limit_is_a_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "Rate limit reached", "type": "requests"}
            })))
            .mount(&server)
            .await;

        let client = ResponsesClient::new(&server.uri(), "sk", Duration::from_secs(5)).unwrap();
        let err = client.complete(&request("x")).await.unwrap_err();
        match err {
            SheetwrightError::Rejected { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "Rate limit reached");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(ok_body("late"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client =
            ResponsesClient::new(&server.uri(), "sk", Duration::from_millis(100)).unwrap();
        let err = client.complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, SheetwrightError::Timeout { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn incomplete_response_is_an_error() {
        let server = MockServer::start().await;
        let mut body = ok_body("half");
        body["status"] = serde_json::json!("incomplete");
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = ResponsesClient::new(&server.uri(), "sk", Duration::from_secs(5)).unwrap();
        let err = client.complete(&request("x")).await.unwrap_err();
        assert!(matches!(err, SheetwrightError::Generation(_)));
    }
}
