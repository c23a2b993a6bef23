use super::prompts;
use super::services::{SpeechSynthesisService, StoryGenerationService};
use super::types::{non_empty, ApiConfig, ApiError, Genre, ImageInput, LlmProviderPreset, Style};

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::Value;

pub struct OpenAiCompatClient {
    client: reqwest::Client,
    preset: LlmProviderPreset,
    base_url: String,
    api_key: Option<String>,
    model: String,
    speech_model: Option<String>,
    voice: String,
}

struct Defaults {
    base_url: Option<&'static str>,
    model: Option<&'static str>,
    speech_model: Option<&'static str>,
}

fn defaults_for_preset(preset: &LlmProviderPreset) -> Defaults {
    match preset {
        LlmProviderPreset::Openai => Defaults {
            base_url: Some("https://api.openai.com/v1"),
            model: Some("gpt-4o-mini"),
            speech_model: Some("gpt-4o-mini-tts"),
        },
        LlmProviderPreset::Openrouter => Defaults {
            base_url: Some("https://openrouter.ai/api/v1"),
            model: Some("openai/gpt-4o-mini"),
            speech_model: None,
        },
        LlmProviderPreset::Ollama => Defaults {
            base_url: Some("http://localhost:11434/v1"),
            model: Some("llava"),
            speech_model: None,
        },
        LlmProviderPreset::Lmstudio => Defaults {
            base_url: Some("http://localhost:1234/v1"),
            model: Some("llava"),
            speech_model: None,
        },
        LlmProviderPreset::Custom | LlmProviderPreset::Gemini => Defaults {
            base_url: None,
            model: None,
            speech_model: None,
        },
    }
}

impl OpenAiCompatClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        let provider = config.provider;
        let defaults = defaults_for_preset(&provider.preset);

        let base_url = non_empty(provider.base_url)
            .or_else(|| defaults.base_url.map(str::to_string))
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();

        if base_url.is_empty() {
            return Err(ApiError::Config("OpenAI-compatible baseUrl is required".to_string()));
        }

        let model = non_empty(provider.model)
            .or_else(|| defaults.model.map(str::to_string))
            .unwrap_or_default();

        if model.is_empty() {
            return Err(ApiError::Config("OpenAI-compatible model is required".to_string()));
        }

        let api_key = non_empty(provider.api_key);

        if matches!(
            provider.preset,
            LlmProviderPreset::Openai | LlmProviderPreset::Openrouter
        ) && api_key.is_none()
        {
            return Err(ApiError::NoApiKey {
                provider: preset_name(&provider.preset),
            });
        }

        Ok(Self {
            client,
            preset: provider.preset,
            base_url,
            api_key,
            model,
            speech_model: non_empty(provider.speech_model).or_else(|| defaults.speech_model.map(str::to_string)),
            voice: non_empty(provider.voice).unwrap_or_else(|| "coral".to_string()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub fn speech_url(&self) -> String {
        format!("{}/audio/speech", self.base_url)
    }

    fn post(&self, url: String, body: &Value) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(body);

        if let Some(key) = &self.api_key {
            req = req.header("authorization", format!("Bearer {}", key));
        }
        req
    }
}

fn preset_name(preset: &LlmProviderPreset) -> String {
    format!("{:?}", preset).to_lowercase()
}

fn image_data_url(image: &ImageInput) -> String {
    format!(
        "data:{};base64,{}",
        image.mime_type(),
        base64::engine::general_purpose::STANDARD.encode(image.bytes())
    )
}

fn story_request_body(model: &str, image: &ImageInput, genre: &Genre, style: &Style) -> Value {
    serde_json::json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": [
                    { "type": "image_url", "image_url": { "url": image_data_url(image) } },
                    { "type": "text", "text": prompts::story_prompt(genre, style) },
                ],
            },
        ],
        "max_tokens": 512,
    })
}

fn message_text(raw: &Value) -> String {
    raw.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c0| c0.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

#[async_trait]
impl StoryGenerationService for OpenAiCompatClient {
    async fn generate(&self, image: &ImageInput, genre: &Genre, style: &Style) -> Result<String, ApiError> {
        let body = story_request_body(&self.model, image, genre, style);

        tracing::info!(provider = %preset_name(&self.preset), model = %self.model, %genre, %style, "Requesting story");
        let response = self.post(self.chat_completions_url(), &body).send().await?;
        let status = response.status();
        let raw: Value = response.json().await?;

        if !status.is_success() {
            return Err(ApiError::ApiResponse {
                status: status.as_u16(),
                message: raw.to_string(),
            });
        }

        let text = message_text(&raw);
        if text.is_empty() {
            return Err(ApiError::EmptyStory);
        }
        Ok(text)
    }
}

#[async_trait]
impl SpeechSynthesisService for OpenAiCompatClient {
    async fn synthesize(&self, text: &str, style: &Style) -> Result<String, ApiError> {
        let speech_model = self.speech_model.as_deref().ok_or_else(|| ApiError::Unsupported {
            provider: preset_name(&self.preset),
            operation: "Speech synthesis",
        })?;

        // `pcm` is raw 24 kHz 16-bit little-endian mono.
        let body = serde_json::json!({
            "model": speech_model,
            "input": text,
            "voice": self.voice,
            "instructions": prompts::speech_instruction(style),
            "response_format": "pcm",
        });

        tracing::info!(provider = %preset_name(&self.preset), model = %speech_model, %style, "Requesting speech");
        let response = self.post(self.speech_url(), &body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::ApiResponse {
                status: status.as_u16(),
                message: body,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ApiError::NoAudioData);
        }
        Ok(base64::engine::general_purpose::STANDARD.encode(&bytes))
    }
}
