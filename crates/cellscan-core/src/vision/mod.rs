//! Vision model adapter: sends a label photo to a hosted multimodal model
//! and parses the structured reply.

mod parser;

pub use parser::parse_vision_response;

use std::path::Path;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::VisionError;
use crate::models::battery::BatteryRecord;
use crate::models::status::MethodStatus;

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Instruction prompt sent with every label photo.
const ANALYSIS_PROMPT: &str = "\
You are a battery quality inspection expert. Analyze this photo of battery \
cells and extract the following information:

1. Serial Number - format like C044160
2. Model - format like 6754E4
3. Energy - in Wh, e.g. 36.74Wh
4. Capacity - in Ah, e.g. 10.8Ah
5. Voltage - in V, e.g. 3.40V

The photo may contain multiple battery cells; identify the complete \
information for every cell.

Reply in exactly this JSON format:

```json
{
  \"batteries\": [
    {
      \"serial_number\": \"C044160\",
      \"model\": \"6754E4\",
      \"energy\": 36.74,
      \"capacity\": 10.8,
      \"voltage\": 3.40,
      \"confidence\": 0.95
    }
  ],
  \"total_batteries_found\": 1,
  \"recognition_method\": \"AI Vision\",
  \"notes\": \"any additional observations\"
}
```

Important:
- Use null for any value you cannot read
- confidence is your certainty in the result (0-1)
- Double-check the accuracy of every number
- If the photo is blurry or unclear, say so in notes

Begin the analysis:";

/// Seam between the pipeline and the vision provider.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// Whether this path can currently run (a credential is configured).
    fn is_available(&self) -> bool;

    /// Status entry for operator introspection.
    fn describe(&self) -> MethodStatus;

    /// Analyze one label photo.
    ///
    /// Never fails: any fault is logged at the adapter boundary and yields
    /// an empty list, which is the pipeline's fallback trigger.
    async fn analyze(&self, image_path: &Path, image_label: &str) -> Vec<BatteryRecord>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock<'a> {
    Text { text: &'a str },
    Image { source: ImageSource<'a> },
}

#[derive(Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    media_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Client for the hosted vision model.
///
/// Available only when an API key was configured at construction; when
/// unavailable, [`VisionAnalyzer::analyze`] short-circuits without network
/// I/O. One request per image, no retry.
pub struct VisionModelClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    api_url: String,
}

impl VisionModelClient {
    /// Build a client from `ANTHROPIC_API_KEY` and `CELLSCAN_VISION_MODEL`.
    pub fn from_env() -> Self {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        let model =
            std::env::var("CELLSCAN_VISION_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        if api_key.is_some() {
            info!("vision model client initialized with API key (model {})", model);
        } else {
            info!("vision model client initialized without API key; OCR fallback will be used");
        }

        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Override the provider endpoint (for proxies and tests).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    async fn request_analysis(&self, image_path: &Path) -> Result<String, VisionError> {
        let api_key = self.api_key.as_deref().ok_or(VisionError::NotConfigured)?;

        let bytes = std::fs::read(image_path).map_err(|e| VisionError::Encode {
            path: image_path.display().to_string(),
            reason: e.to_string(),
        })?;
        let encoded = BASE64_STANDARD.encode(&bytes);
        let media_type = media_type_for(image_path);

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Text {
                        text: ANALYSIS_PROMPT,
                    },
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type,
                            data: encoded,
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VisionError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: MessagesResponse = response.json().await?;
        body.content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or(VisionError::EmptyResponse)
    }
}

#[async_trait]
impl VisionAnalyzer for VisionModelClient {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn describe(&self) -> MethodStatus {
        MethodStatus {
            name: "AI Vision".to_string(),
            available: self.is_available(),
            description: "Hosted multimodal model reading labels directly".to_string(),
            model: self.is_available().then(|| self.model.clone()),
        }
    }

    async fn analyze(&self, image_path: &Path, image_label: &str) -> Vec<BatteryRecord> {
        match self.request_analysis(image_path).await {
            Ok(response_text) => {
                debug!(
                    "vision response for {} ({} chars)",
                    image_label,
                    response_text.len()
                );
                parse_vision_response(&response_text, image_label)
            }
            Err(VisionError::NotConfigured) => {
                debug!("vision model not configured, skipping {}", image_label);
                Vec::new()
            }
            Err(e) => {
                warn!("vision analysis failed for {}: {}", image_label, e);
                Vec::new()
            }
        }
    }
}

/// Infer the inline payload media type from the file extension.
fn media_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unconfigured_client() -> VisionModelClient {
        VisionModelClient {
            client: reqwest::Client::new(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    #[test]
    fn test_availability_tracks_api_key() {
        let client = unconfigured_client();
        assert!(!client.is_available());

        let status = client.describe();
        assert_eq!(status.name, "AI Vision");
        assert!(!status.available);
        assert!(status.model.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_analyze_short_circuits() {
        let client = unconfigured_client();
        // Path does not exist; must not matter because no I/O is attempted.
        let records = client
            .analyze(Path::new("/nonexistent/cells.jpg"), "cells.jpg")
            .await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_request_reports_not_configured() {
        let client = unconfigured_client();
        let err = client
            .request_analysis(Path::new("/nonexistent/cells.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::NotConfigured));
    }

    #[test]
    fn test_with_api_url_overrides_endpoint() {
        let client = unconfigured_client().with_api_url("http://localhost:8080/v1/messages");
        assert_eq!(client.api_url, "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_media_type_inference() {
        assert_eq!(media_type_for(Path::new("a/cells.PNG")), "image/png");
        assert_eq!(media_type_for(Path::new("cells.jpeg")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("cells")), "image/jpeg");
    }

    #[test]
    fn test_prompt_demands_structured_response() {
        for needle in [
            "C044160",
            "6754E4",
            "36.74Wh",
            "10.8Ah",
            "3.40V",
            "null",
            "confidence",
            "batteries",
            "total_batteries_found",
            "notes",
        ] {
            assert!(ANALYSIS_PROMPT.contains(needle), "prompt missing {needle}");
        }
    }

    #[test]
    fn test_request_serializes_to_messages_shape() {
        let request = MessagesRequest {
            model: DEFAULT_MODEL,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Text { text: "prompt" },
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: "image/jpeg",
                            data: "aGVsbG8=".to_string(),
                        },
                    },
                ],
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["max_tokens"], 4096);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image");
        assert_eq!(
            json["messages"][0]["content"][1]["source"]["media_type"],
            "image/jpeg"
        );
    }
}
