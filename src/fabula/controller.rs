//! Story request lifecycle and the read-aloud pipeline.
//!
//! `Idle -> Generating -> {Ready | Failed}`; any later trigger goes straight
//! back to `Generating`. Triggers are a new image, or a genre/style change
//! while an image is loaded.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{AbortHandle, JoinHandle};

use super::audio;
use super::audio_types::{PlaybackOutcome, SPEECH_CHANNELS, SPEECH_SAMPLE_RATE};
use super::error::{AppError, ErrorChannel};
use super::gui_types::{ErrorInfo, RequestState, StoryEvent, StoryResult};
use super::playback::{PlaybackEngine, PlaybackHandle};
use super::services::Services;
use super::types::{ApiError, Fingerprint, GenerationRequest, Genre, ImageInput, Style};

/// Which response is allowed to land when generation calls overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupersedePolicy {
    /// A new trigger cancels the previous call; only the latest-issued
    /// request may commit.
    #[default]
    LatestIssued,
    /// Nothing is cancelled and whichever response arrives last wins, even if
    /// it answers an older request. Kept for parity with the first release.
    LastArrival,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub genre: Genre,
    pub style: Style,
    pub sample_rate: u32,
    pub channels: u16,
    pub supersede: SupersedePolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            genre: Genre::default(),
            style: Style::default(),
            sample_rate: SPEECH_SAMPLE_RATE,
            channels: SPEECH_CHANNELS,
            supersede: SupersedePolicy::default(),
        }
    }
}

/// Result of [`RequestController::on_read_aloud`].
#[derive(Debug)]
pub enum ReadAloud {
    /// Narration is running; the task resolves when `speaking` is back to false.
    Started(JoinHandle<PlaybackOutcome>),
    NothingToRead,
    AlreadySpeaking,
}

struct InFlight {
    seq: u64,
    fingerprint: Fingerprint,
    cancelled: Arc<AtomicBool>,
    task: Option<AbortHandle>,
}

impl InFlight {
    fn cancel(self) {
        self.cancelled.store(true, Ordering::Relaxed);
        if let Some(task) = self.task {
            task.abort();
        }
    }
}

struct ControllerState {
    image: Option<Arc<ImageInput>>,
    genre: Genre,
    style: Style,
    request: RequestState,
    speaking: bool,
    next_seq: u64,
    in_flight: Option<InFlight>,
}

struct Inner {
    services: Services,
    playback: PlaybackEngine,
    errors: ErrorChannel,
    events: UnboundedSender<StoryEvent>,
    sample_rate: u32,
    channels: u16,
    supersede: SupersedePolicy,
    state: Mutex<ControllerState>,
}

/// Cheap to clone; all clones drive the same session.
///
/// Trigger methods spawn onto the current Tokio runtime and must be called
/// from within one.
#[derive(Clone)]
pub struct RequestController {
    inner: Arc<Inner>,
}

impl RequestController {
    pub fn new(
        config: ControllerConfig,
        services: Services,
        playback: PlaybackEngine,
    ) -> (Self, UnboundedReceiver<StoryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Inner {
            services,
            playback,
            errors: ErrorChannel::new(tx.clone()),
            events: tx,
            sample_rate: config.sample_rate,
            channels: config.channels,
            supersede: config.supersede,
            state: Mutex::new(ControllerState {
                image: None,
                genre: config.genre,
                style: config.style,
                request: RequestState::Idle,
                speaking: false,
                next_seq: 0,
                in_flight: None,
            }),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StoryEvent) {
        let _ = self.inner.events.send(event);
    }

    // ── Snapshot ───────────────────────────────────────────────────

    pub fn state(&self) -> RequestState {
        self.lock().request.clone()
    }

    pub fn story(&self) -> Option<String> {
        self.lock().request.story().map(|s| s.text.clone())
    }

    pub fn is_speaking(&self) -> bool {
        self.lock().speaking
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.inner.errors.current()
    }

    pub fn genre(&self) -> Genre {
        self.lock().genre.clone()
    }

    pub fn style(&self) -> Style {
        self.lock().style.clone()
    }

    pub fn has_image(&self) -> bool {
        self.lock().image.is_some()
    }

    pub fn playback(&self) -> &PlaybackEngine {
        &self.inner.playback
    }

    // ── Triggers ───────────────────────────────────────────────────

    /// Replaces the current image and starts a generation for it.
    pub fn set_image(&self, image: ImageInput) -> Option<JoinHandle<()>> {
        self.lock().image = Some(Arc::new(image));
        self.on_trigger()
    }

    /// Reads an image from disk and starts a generation for it. A read
    /// failure is reported and leaves the current story untouched.
    pub async fn select_image_file(&self, path: &Path) -> Option<JoinHandle<()>> {
        match ImageInput::from_path(path).await {
            Ok(image) => {
                tracing::info!(path = %path.display(), mime = image.mime_type(), "Image selected");
                self.set_image(image)
            }
            Err(e) => {
                self.inner.errors.report(&AppError::FileRead(e));
                None
            }
        }
    }

    pub fn set_genre(&self, genre: Genre) -> Option<JoinHandle<()>> {
        {
            let mut st = self.lock();
            if st.genre == genre {
                return None;
            }
            st.genre = genre;
        }
        self.on_trigger()
    }

    pub fn set_style(&self, style: Style) -> Option<JoinHandle<()>> {
        {
            let mut st = self.lock();
            if st.style == style {
                return None;
            }
            st.style = style;
        }
        self.on_trigger()
    }

    /// Re-issues the current request, e.g. after a failure.
    pub fn retry(&self) -> Option<JoinHandle<()>> {
        self.on_trigger()
    }

    fn on_trigger(&self) -> Option<JoinHandle<()>> {
        let mut st = self.lock();
        let image = st.image.clone()?;
        let request = GenerationRequest {
            image,
            genre: st.genre.clone(),
            style: st.style.clone(),
        };
        let fingerprint = request.fingerprint();

        if st.in_flight.as_ref().is_some_and(|f| f.fingerprint == fingerprint) {
            tracing::debug!("Identical request already in flight");
            return None;
        }

        if self.inner.supersede == SupersedePolicy::LatestIssued {
            if let Some(prev) = st.in_flight.take() {
                tracing::debug!(seq = prev.seq, "Cancelling superseded story request");
                prev.cancel();
            }
        }

        st.next_seq += 1;
        let seq = st.next_seq;
        let cancelled = Arc::new(AtomicBool::new(false));

        self.inner.errors.clear();
        st.request = RequestState::Generating;
        self.emit(StoryEvent::StateChanged(RequestState::Generating));
        tracing::info!(seq, genre = %request.genre, style = %request.style, "Generating story");

        // The lock is held until `in_flight` is recorded, so the task cannot
        // commit before it is registered.
        let this = self.clone();
        let flag = cancelled.clone();
        let task = tokio::spawn(async move { this.run_generation(seq, request, flag).await });

        st.in_flight = Some(InFlight {
            seq,
            fingerprint,
            cancelled,
            task: Some(task.abort_handle()),
        });
        Some(task)
    }

    async fn run_generation(&self, seq: u64, request: GenerationRequest, cancelled: Arc<AtomicBool>) {
        let fingerprint = request.fingerprint();
        let result = self
            .inner
            .services
            .story
            .generate(&request.image, &request.genre, &request.style)
            .await
            .and_then(|text| {
                let text = text.trim().to_string();
                if text.is_empty() {
                    Err(ApiError::EmptyStory)
                } else {
                    Ok(text)
                }
            });

        let mut st = self.lock();
        // Every superseded request has its flag set under this lock, so the
        // flag also catches a task the abort arrived too late for.
        if self.inner.supersede == SupersedePolicy::LatestIssued && cancelled.load(Ordering::Relaxed) {
            tracing::debug!(seq, "Discarding stale story response");
            return;
        }
        if st.in_flight.as_ref().is_some_and(|f| f.seq == seq) {
            st.in_flight = None;
        }

        st.request = match result {
            Ok(text) => {
                tracing::info!(seq, chars = text.len(), "Story ready");
                RequestState::Ready {
                    story: StoryResult { text, fingerprint },
                }
            }
            Err(e) => RequestState::Failed {
                error: self.inner.errors.report(&AppError::Generation(e)),
            },
        };
        self.emit(StoryEvent::StateChanged(st.request.clone()));
    }

    // ── Read aloud ─────────────────────────────────────────────────

    /// Narrates the current story. Does nothing without a ready story or
    /// while a narration is already playing.
    pub fn on_read_aloud(&self) -> ReadAloud {
        let (text, style) = {
            let mut st = self.lock();
            if st.speaking {
                return ReadAloud::AlreadySpeaking;
            }
            let Some(story) = st.request.story() else {
                return ReadAloud::NothingToRead;
            };
            let text = story.text.clone();
            st.speaking = true;
            self.emit(StoryEvent::SpeakingChanged(true));
            (text, st.style.clone())
        };

        let this = self.clone();
        ReadAloud::Started(tokio::spawn(async move { this.narrate(text, style).await }))
    }

    async fn narrate(&self, text: String, style: Style) -> PlaybackOutcome {
        let outcome = match self.start_playback(&text, &style).await {
            Ok(handle) => {
                self.inner.errors.clear();
                handle.finished().await
            }
            Err(e) => {
                self.inner.errors.report(&e);
                PlaybackOutcome::Failed
            }
        };

        self.lock().speaking = false;
        self.emit(StoryEvent::SpeakingChanged(false));
        tracing::info!(?outcome, "Narration finished");
        outcome
    }

    async fn start_playback(&self, text: &str, style: &Style) -> Result<PlaybackHandle, AppError> {
        let payload = self
            .inner
            .services
            .speech
            .synthesize(text, style)
            .await
            .map_err(AppError::Speech)?;

        let bytes = audio::decode(&payload)?;
        let clip = audio::decode_audio_data(&bytes, self.inner.sample_rate, self.inner.channels)?
            .with_style(style.clone());
        tracing::debug!(frames = clip.frames(), duration = ?clip.duration(), "Speech decoded");

        Ok(self.inner.playback.play(clip)?)
    }
}
