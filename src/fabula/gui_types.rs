use serde::{Deserialize, Serialize};

use super::types::Fingerprint;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryResult {
    pub text: String,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    /// What the user sees.
    pub message: String,
    /// Underlying cause, for logs and bug reports.
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RequestState {
    #[default]
    Idle,
    Generating,
    Ready { story: StoryResult },
    Failed { error: ErrorInfo },
}

impl RequestState {
    pub fn story(&self) -> Option<&StoryResult> {
        match self {
            RequestState::Ready { story } => Some(story),
            _ => None,
        }
    }

    pub fn is_generating(&self) -> bool {
        matches!(self, RequestState::Generating)
    }
}

/// Pushed to the front end whenever a piece of controller state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum StoryEvent {
    StateChanged(RequestState),
    SpeakingChanged(bool),
    ErrorChanged(Option<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabula::types::{Genre, Style};

    #[test]
    fn state_serializes_with_status_tag() {
        let state = RequestState::Ready {
            story: StoryResult {
                text: "Mist.".to_string(),
                fingerprint: Fingerprint {
                    image_digest: "ab".to_string(),
                    mime_type: "image/png".to_string(),
                    genre: Genre::Fantasy,
                    style: Style::Poetic,
                },
            },
        };
        let v = serde_json::to_value(&state).unwrap();
        assert_eq!(v["status"], "ready");
        assert!(!state.is_generating());
        assert!(RequestState::Generating.is_generating());
        assert_eq!(v["story"]["text"], "Mist.");
        assert_eq!(v["story"]["fingerprint"]["imageDigest"], "ab");
        assert_eq!(v["story"]["fingerprint"]["mimeType"], "image/png");

        let ev = serde_json::to_value(StoryEvent::SpeakingChanged(true)).unwrap();
        assert_eq!(ev, serde_json::json!({ "type": "speakingChanged", "payload": true }));
    }
}
