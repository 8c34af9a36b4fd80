//! services/api/src/adapters/vision_llm.rs
//!
//! This module contains the adapter for the photo-verification vision model.
//! It implements the `VisionService` port from the `core` crate against any
//! OpenAI-compatible chat endpoint (Gemini's by default).

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrlArgs, ResponseFormat,
    },
    Client, error::OpenAIError,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use eldercare_core::ports::{PortError, PortResult, VisionService};
use std::time::Duration;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `VisionService` using an OpenAI-compatible multimodal LLM.
#[derive(Clone)]
pub struct OpenAiVisionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiVisionAdapter {
    /// Creates a new `OpenAiVisionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Builds a client for an OpenAI-compatible endpoint such as
    /// `https://generativelanguage.googleapis.com/v1beta/openai`.
    ///
    /// Every request is a single attempt bounded by `timeout`. 5xx and 429
    /// replies are returned as errors, never retried.
    pub fn client_for(api_base: &str, api_key: &str, timeout: Duration) -> PortResult<Client<OpenAIConfig>> {
        let config = OpenAIConfig::new()
            .with_api_base(api_base.trim_end_matches('/'))
            .with_api_key(api_key);
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;
        let single_attempt = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Ok(Client::build(http_client, config, single_attempt))
    }

    fn data_url(image: &[u8], mime_type: &str) -> String {
        format!("data:{};base64,{}", mime_type, STANDARD.encode(image))
    }
}

//=========================================================================================
// `VisionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl VisionService for OpenAiVisionAdapter {
    /// Sends the photo and instruction in one user message and asks for a JSON object back.
    async fn judge_photo(&self, image: &[u8], mime_type: &str, instruction: &str) -> PortResult<String> {
        let image_url = ImageUrlArgs::default()
            .url(Self::data_url(image, mime_type))
            .detail(ImageDetail::High)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(image_url)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(instruction)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let messages: Vec<ChatCompletionRequestMessage> = vec![ChatCompletionRequestUserMessageArgs::default()
            .content(parts)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(model = %self.model, bytes = image.len(), "Sending photo for verification.");

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Service(e.to_string()))?;

        // Extract the text content from the first choice in the response.
        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(PortError::Service(
                    "Vision LLM response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Service(
                "Vision LLM returned no choices in its response.".to_string(),
            ))
        }
    }
}
