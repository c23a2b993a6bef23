use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderPreset {
    #[default]
    Gemini,
    Openai,
    Openrouter,
    Ollama,
    Lmstudio,
    Custom,
}

impl FromStr for LlmProviderPreset {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::Openai),
            "openrouter" => Ok(Self::Openrouter),
            "ollama" => Ok(Self::Ollama),
            "lmstudio" => Ok(Self::Lmstudio),
            "custom" => Ok(Self::Custom),
            other => Err(ApiError::Config(format!("unknown provider preset: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmProviderConfig {
    pub preset: LlmProviderPreset,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub speech_model: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub provider: LlmProviderConfig,
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderConfig::default(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl ApiConfig {
    /// Reads provider settings from `FABULA_*` variables, falling back to the
    /// vendor-specific key variables for the chosen preset.
    pub fn from_env() -> Result<Self, ApiError> {
        let preset = match env_non_empty("FABULA_PROVIDER") {
            Some(p) => p.parse()?,
            None => LlmProviderPreset::default(),
        };

        let fallback_keys: &[&str] = match preset {
            LlmProviderPreset::Gemini => &["GEMINI_API_KEY", "API_KEY"],
            LlmProviderPreset::Openai => &["OPENAI_API_KEY"],
            LlmProviderPreset::Openrouter => &["OPENROUTER_API_KEY"],
            _ => &[],
        };
        let api_key = env_non_empty("FABULA_API_KEY")
            .or_else(|| fallback_keys.iter().find_map(|k| env_non_empty(k)));

        let timeout = match env_non_empty("FABULA_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .map_err(|_| ApiError::Config(format!("FABULA_TIMEOUT_SECS is not a number: {}", raw)))?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(60),
        };

        Ok(Self {
            provider: LlmProviderConfig {
                preset,
                api_key,
                base_url: env_non_empty("FABULA_BASE_URL"),
                model: env_non_empty("FABULA_MODEL"),
                speech_model: env_non_empty("FABULA_TTS_MODEL"),
                voice: env_non_empty("FABULA_VOICE"),
            },
            timeout,
        })
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| non_empty(Some(v)))
}

/// Trims the value and drops it when nothing is left.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let t = v.trim().to_string();
        if t.is_empty() { None } else { Some(t) }
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No API key set for provider: {provider}")]
    NoApiKey { provider: String },

    #[error("Invalid provider configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned error: {status}: {message}")]
    ApiResponse { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Provider returned an empty story")]
    EmptyStory,

    #[error("No audio data received from API")]
    NoAudioData,

    #[error("{operation} is not supported by provider {provider}")]
    Unsupported { provider: String, operation: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Genre {
    #[default]
    Fantasy,
    SciFi,
    Mystery,
    Romance,
    Horror,
    Thriller,
    Custom(String),
}

impl Genre {
    pub const PRESETS: [Genre; 6] = [
        Genre::Fantasy,
        Genre::SciFi,
        Genre::Mystery,
        Genre::Romance,
        Genre::Horror,
        Genre::Thriller,
    ];

    pub fn label(&self) -> &str {
        match self {
            Genre::Fantasy => "Fantasy",
            Genre::SciFi => "Sci-Fi",
            Genre::Mystery => "Mystery",
            Genre::Romance => "Romance",
            Genre::Horror => "Horror",
            Genre::Thriller => "Thriller",
            Genre::Custom(name) => name,
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Genre {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let genre = match t.to_lowercase().as_str() {
            "fantasy" => Genre::Fantasy,
            "sci-fi" | "scifi" | "science fiction" => Genre::SciFi,
            "mystery" => Genre::Mystery,
            "romance" => Genre::Romance,
            "horror" => Genre::Horror,
            "thriller" => Genre::Thriller,
            _ => Genre::Custom(t.to_string()),
        };
        Ok(genre)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Style {
    #[default]
    Descriptive,
    Poetic,
    Minimalist,
    Suspenseful,
    Whimsical,
    Romance,
    Horror,
    Custom(String),
}

impl Style {
    pub const PRESETS: [Style; 5] = [
        Style::Descriptive,
        Style::Poetic,
        Style::Minimalist,
        Style::Suspenseful,
        Style::Whimsical,
    ];

    pub fn label(&self) -> &str {
        match self {
            Style::Descriptive => "Descriptive",
            Style::Poetic => "Poetic",
            Style::Minimalist => "Minimalist",
            Style::Suspenseful => "Suspenseful",
            Style::Whimsical => "Whimsical",
            Style::Romance => "Romance",
            Style::Horror => "Horror",
            Style::Custom(name) => name,
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Style {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let style = match t.to_lowercase().as_str() {
            "descriptive" => Style::Descriptive,
            "poetic" => Style::Poetic,
            "minimalist" => Style::Minimalist,
            "suspenseful" => Style::Suspenseful,
            "whimsical" => Style::Whimsical,
            "romance" => Style::Romance,
            "horror" => Style::Horror,
            _ => Style::Custom(t.to_string()),
        };
        Ok(style)
    }
}

/// User-selected image: raw bytes plus the declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    bytes: Vec<u8>,
    mime_type: String,
    digest: [u8; 32],
}

impl ImageInput {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(&bytes));
        Self {
            bytes,
            mime_type: mime_type.into(),
            digest,
        }
    }

    /// Reads an image from disk without blocking the runtime. The media type
    /// comes from the file extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(bytes, mime_type_for_path(path)))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }
}

pub fn mime_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Identity of a generation request: two requests with equal fingerprints ask
/// for the same story.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprint {
    pub image_digest: String,
    pub mime_type: String,
    pub genre: Genre,
    pub style: Style,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub image: std::sync::Arc<ImageInput>,
    pub genre: Genre,
    pub style: Style,
}

impl GenerationRequest {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            image_digest: hex(self.image.digest()),
            mime_type: self.image.mime_type().to_string(),
            genre: self.genre.clone(),
            style: self.style.clone(),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
