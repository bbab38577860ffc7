// src/claude.rs

use crate::bill::BillFile;
use crate::config::AnalyzerConfig;
use crate::error::AnalyzeError;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::info;

/// The prompt that instructs the model to extract structured bill data.
const EXTRACTION_PROMPT: &str = r#"You are a bill analysis assistant.
The attached document is a personal bill (a receipt, invoice, or statement).
Extract structured data and return ONLY valid JSON.

The JSON must match this schema exactly:
{
  "vendor": "string or null",
  "amount": number or null,
  "date": "YYYY-MM-DD or null",
  "category": "operating_expense" | "learning" | "savings",
  "items": ["line item description", ...]
}

Category rules:
- "operating_expense": everyday living costs. Includes dining, groceries,
  shopping, rent, utilities, transport, and entertainment.
- "learning": education spending. Includes books, courses, tuition,
  training, and certifications.
- "savings": money set aside. Includes deposits, investment contributions,
  and transfers into savings products.

Notes:
- "amount" is the billed total with currency symbols and thousand
  separators stripped.
- Use null for fields you cannot determine.
- Return ONLY the JSON object, no markdown fences, no commentary."#;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    Attachment { attachment: AttachmentRef },
}

#[derive(Debug, Serialize)]
struct AttachmentRef {
    id: String,
    #[serde(rename = "type")]
    media_type: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ReplyBlock>,
}

#[derive(Debug, Deserialize)]
struct ReplyBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Upload response. The provider has been observed returning the new
/// attachment's id either nested or at the top level; accept both.
#[derive(Debug, Deserialize)]
struct AttachmentResponse {
    #[serde(default)]
    attachment: Option<AttachmentBody>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttachmentBody {
    id: String,
}

impl AttachmentResponse {
    fn attachment_id(self) -> Option<String> {
        self.attachment.map(|a| a.id).or(self.id)
    }
}

/// The two remote calls every analysis needs. `ClaudeClient` is the real
/// implementation; tests substitute a scripted fake.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Register the raw file with the provider; returns the attachment id.
    async fn upload_attachment(&self, file: &BillFile) -> Result<String, AnalyzeError>;

    /// Ask the model to extract bill data from a registered attachment;
    /// returns the reply text (which should contain, possibly fenced, a
    /// JSON object).
    async fn extract(
        &self,
        attachment_id: &str,
        media_type: &str,
    ) -> Result<String, AnalyzeError>;
}

/// HTTP client for the provider's attachment and messages endpoints.
pub struct ClaudeClient {
    http: Client,
    config: AnalyzerConfig,
}

impl ClaudeClient {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ExtractionBackend for ClaudeClient {
    async fn upload_attachment(&self, file: &BillFile) -> Result<String, AnalyzeError> {
        let api_key = self.config.require_api_key()?;
        let url = format!("{}/v1/attachments", self.config.base_url);

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.media_type)
            .map_err(|e| AnalyzeError::Upload(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(&url)
            .header("x-api-key", api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AnalyzeError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzeError::Upload(format!("{status}: {body}")));
        }

        let uploaded: AttachmentResponse = response
            .json()
            .await
            .map_err(|e| AnalyzeError::Upload(e.to_string()))?;

        let id = uploaded
            .attachment_id()
            .ok_or_else(|| AnalyzeError::Upload("no attachment id in response".to_string()))?;
        info!(file = %file.name, attachment_id = %id, "attachment registered");
        Ok(id)
    }

    async fn extract(
        &self,
        attachment_id: &str,
        media_type: &str,
    ) -> Result<String, AnalyzeError> {
        let api_key = self.config.require_api_key()?;
        let url = format!("{}/v1/messages", self.config.base_url);

        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![
                    ContentBlock::Text {
                        text: EXTRACTION_PROMPT.to_string(),
                    },
                    ContentBlock::Attachment {
                        attachment: AttachmentRef {
                            id: attachment_id.to_string(),
                            media_type: media_type.to_string(),
                        },
                    },
                ],
            }],
        };

        let response = self
            .http
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalyzeError::ExtractionEndpoint(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzeError::ExtractionEndpoint(format!("{status}: {body}")));
        }

        let reply: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AnalyzeError::ExtractionEndpoint(e.to_string()))?;

        reply
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or_else(|| AnalyzeError::ExtractionEndpoint("empty reply from model".to_string()))
    }
}
