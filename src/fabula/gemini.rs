use super::prompts;
use super::services::{SpeechSynthesisService, StoryGenerationService};
use super::types::{non_empty, ApiConfig, ApiError, Genre, ImageInput, Style};

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
const DEFAULT_VOICE: &str = "Kore";

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    speech_model: String,
    voice: String,
}

impl GeminiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let provider = config.provider;
        let api_key = non_empty(provider.api_key).ok_or_else(|| ApiError::NoApiKey {
            provider: "gemini".to_string(),
        })?;

        let base_url = non_empty(provider.base_url)
            .unwrap_or_else(|| API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url,
            model: non_empty(provider.model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            speech_model: non_empty(provider.speech_model).unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            voice: non_empty(provider.voice).unwrap_or_else(|| DEFAULT_VOICE.to_string()),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn speech_model(&self) -> &str {
        &self.speech_model
    }

    pub fn generate_content_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn generate_content(&self, model: &str, request: &GenerateContentRequest) -> Result<GenerateContentResponse, ApiError> {
        let response = self
            .client
            .post(self.generate_content_url(model))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::ApiResponse {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl StoryGenerationService for GeminiClient {
    async fn generate(&self, image: &ImageInput, genre: &Genre, style: &Style) -> Result<String, ApiError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::inline(image.mime_type(), base64::engine::general_purpose::STANDARD.encode(image.bytes())),
                    Part::text(prompts::story_prompt(genre, style)),
                ],
            }],
            generation_config: None,
        };

        tracing::info!(model = %self.model, %genre, %style, "Requesting story from Gemini");
        let resp = self.generate_content(&self.model, &request).await?;

        let text = resp.text();
        if text.is_empty() {
            return Err(ApiError::EmptyStory);
        }
        Ok(text)
    }
}

#[async_trait]
impl SpeechSynthesisService for GeminiClient {
    async fn synthesize(&self, text: &str, style: &Style) -> Result<String, ApiError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(prompts::speech_prompt(text, style))],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.voice.clone(),
                        },
                    },
                },
            }),
        };

        tracing::info!(model = %self.speech_model, voice = %self.voice, %style, "Requesting speech from Gemini");
        let resp = self.generate_content(&self.speech_model, &request).await?;
        resp.first_inline_data().ok_or(ApiError::NoAudioData)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }

    fn inline(mime_type: &str, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn first_inline_data(&self) -> Option<String> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .inline_data
            .as_ref()
            .map(|d| d.data.clone())
            .filter(|d| !d.is_empty())
    }
}
