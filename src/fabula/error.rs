//! Failures at the controller boundary and the single user-visible error slot.

use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;

use super::audio::AudioError;
use super::gui_types::{ErrorInfo, StoryEvent};
use super::types::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read image file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Story generation failed: {0}")]
    Generation(#[source] ApiError),

    #[error("Speech synthesis failed: {0}")]
    Speech(#[source] ApiError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::FileRead(_) => "Failed to read the image file.",
            AppError::Generation(_) => "Failed to generate the story. Please try again.",
            AppError::Speech(_) | AppError::Audio(_) => "Failed to play audio.",
        }
    }

    pub fn info(&self) -> ErrorInfo {
        ErrorInfo {
            message: self.user_message().to_string(),
            detail: self.to_string(),
        }
    }
}

/// Holds the latest failure from any component. A new failure overwrites the
/// previous one; the next successful operation clears it.
pub struct ErrorChannel {
    slot: Mutex<Option<ErrorInfo>>,
    events: UnboundedSender<StoryEvent>,
}

impl ErrorChannel {
    pub fn new(events: UnboundedSender<StoryEvent>) -> Self {
        Self {
            slot: Mutex::new(None),
            events,
        }
    }

    pub fn report(&self, error: &AppError) -> ErrorInfo {
        tracing::error!(error = %error, "{}", error.user_message());
        let info = error.info();
        self.set(Some(info.clone()));
        info
    }

    pub fn clear(&self) {
        self.set(None);
    }

    pub fn current(&self) -> Option<ErrorInfo> {
        self.slot.lock().ok().and_then(|s| s.clone())
    }

    fn set(&self, value: Option<ErrorInfo>) {
        let Ok(mut slot) = self.slot.lock() else {
            return;
        };
        if *slot == value {
            return;
        }
        let message = value.as_ref().map(|i| i.message.clone());
        *slot = value;
        drop(slot);
        let _ = self.events.send(StoryEvent::ErrorChanged(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_error_wins_and_clear_empties_the_slot() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let channel = ErrorChannel::new(tx);

        channel.report(&AppError::Generation(ApiError::EmptyStory));
        channel.report(&AppError::Audio(AudioError::AlreadyPlaying));
        assert_eq!(channel.current().unwrap().message, "Failed to play audio.");

        channel.clear();
        channel.clear();
        assert!(channel.current().is_none());

        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        assert_eq!(
            events,
            vec![
                StoryEvent::ErrorChanged(Some("Failed to generate the story. Please try again.".to_string())),
                StoryEvent::ErrorChanged(Some("Failed to play audio.".to_string())),
                StoryEvent::ErrorChanged(None),
            ]
        );
    }

    #[test]
    fn detail_keeps_the_cause() {
        let info = AppError::Speech(ApiError::NoAudioData).info();
        assert_eq!(info.message, "Failed to play audio.");
        assert!(info.detail.contains("No audio data"));
    }
}
