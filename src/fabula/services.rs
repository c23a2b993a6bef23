//! Remote collaborators the controller depends on.
//!
//! The controller only sees these traits, so providers can be swapped (or
//! mocked in tests) without touching the request lifecycle.

use std::sync::Arc;

use async_trait::async_trait;

use super::gemini::GeminiClient;
use super::openai_compat::OpenAiCompatClient;
use super::types::{ApiConfig, ApiError, Genre, ImageInput, LlmProviderPreset, Style};

/// Writes the opening paragraph of a story for an image.
#[async_trait]
pub trait StoryGenerationService: Send + Sync {
    /// Returns non-empty narrative text, or an error.
    async fn generate(&self, image: &ImageInput, genre: &Genre, style: &Style) -> Result<String, ApiError>;
}

/// Turns narrative text into base64-encoded 16-bit PCM (24 kHz mono).
#[async_trait]
pub trait SpeechSynthesisService: Send + Sync {
    async fn synthesize(&self, text: &str, style: &Style) -> Result<String, ApiError>;
}

/// Story and speech services for one provider configuration.
#[derive(Clone)]
pub struct Services {
    pub story: Arc<dyn StoryGenerationService>,
    pub speech: Arc<dyn SpeechSynthesisService>,
}

impl Services {
    pub fn from_config(cfg: ApiConfig) -> Result<Self, ApiError> {
        match cfg.provider.preset {
            LlmProviderPreset::Gemini => {
                let client = Arc::new(GeminiClient::new(cfg)?);
                Ok(Self {
                    story: client.clone(),
                    speech: client,
                })
            }
            _ => {
                let client = Arc::new(OpenAiCompatClient::new(cfg)?);
                Ok(Self {
                    story: client.clone(),
                    speech: client,
                })
            }
        }
    }
}
