pub mod fabula;

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub use fabula::audio::{decode, decode_audio_data, AudioError};
pub use fabula::audio_types::{AudioClip, PlaybackOutcome, SPEECH_CHANNELS, SPEECH_SAMPLE_RATE};
pub use fabula::controller::{ControllerConfig, ReadAloud, RequestController, SupersedePolicy};
pub use fabula::error::{AppError, ErrorChannel};
pub use fabula::gui_types::{ErrorInfo, RequestState, StoryEvent, StoryResult};
pub use fabula::playback::{
    AudioContext, HeadlessOutput, OutputContext, OutputDevice, PlaybackDoneCallback, PlaybackEngine, PlaybackHandle,
};
pub use fabula::services::{Services, SpeechSynthesisService, StoryGenerationService};
pub use fabula::types::{ApiConfig, ApiError, Fingerprint, GenerationRequest, Genre, ImageInput, Style};

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,fabula=debug"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init();
}

/// The system sound card when built with the `playback` feature, otherwise a
/// headless output that only keeps time.
pub fn default_audio_context() -> AudioContext {
    #[cfg(feature = "playback")]
    {
        AudioContext::new(fabula::audio_thread::RodioOutput)
    }
    #[cfg(not(feature = "playback"))]
    {
        tracing::warn!("Built without the `playback` feature; narration will be silent");
        AudioContext::new(HeadlessOutput)
    }
}

/// Wires a controller from `FABULA_*` environment settings.
pub fn controller_from_env(
    config: ControllerConfig,
) -> Result<(RequestController, tokio::sync::mpsc::UnboundedReceiver<StoryEvent>), ApiError> {
    let services = Services::from_config(ApiConfig::from_env()?)?;
    let playback = PlaybackEngine::new(Arc::new(default_audio_context()));
    Ok(RequestController::new(config, services, playback))
}
