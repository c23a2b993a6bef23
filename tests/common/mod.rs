//! Mock services and output devices shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use fabula::{
    ApiError, AudioClip, AudioContext, AudioError, Genre, ImageInput, OutputContext, OutputDevice,
    PlaybackDoneCallback, PlaybackEngine, Services, SpeechSynthesisService, StoryEvent, StoryGenerationService,
    Style,
};
use tokio::sync::{mpsc, oneshot};

// ── Story service ──────────────────────────────────────────────────

pub struct PendingStory {
    pub style: Style,
    pub genre: Genre,
    reply: oneshot::Sender<Result<String, ApiError>>,
}

impl PendingStory {
    pub fn resolve(self, text: &str) {
        let _ = self.reply.send(Ok(text.to_string()));
    }

    pub fn fail(self, err: ApiError) {
        let _ = self.reply.send(Err(err));
    }
}

/// Story service whose calls block until the test resolves them.
#[derive(Default)]
pub struct GatedStory {
    pending: Mutex<Vec<PendingStory>>,
    calls: AtomicUsize,
}

impl GatedStory {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Waits until `n` calls have been made in total, then hands back the
    /// unresolved ones in call order.
    pub async fn wait_for_calls(&self, n: usize) -> Vec<PendingStory> {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() < n {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("story service was not called in time");
        self.pending.lock().unwrap().drain(..).collect()
    }
}

#[async_trait]
impl StoryGenerationService for GatedStory {
    async fn generate(&self, _image: &ImageInput, genre: &Genre, style: &Style) -> Result<String, ApiError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push(PendingStory {
            style: style.clone(),
            genre: genre.clone(),
            reply: tx,
        });
        self.calls.fetch_add(1, Ordering::SeqCst);
        rx.await.unwrap_or_else(|_| Err(ApiError::Parse("dropped".to_string())))
    }
}

/// Story service that blocks its worker thread until the test answers, so a
/// call cannot be aborted once it has started.
#[derive(Default)]
pub struct BlockingStory {
    replies: Mutex<Vec<(Style, std::sync::mpsc::Sender<String>)>>,
    calls: AtomicUsize,
}

impl BlockingStory {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() < n {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("story service was not called in time");
    }

    /// Answers the pending call made with `style`.
    pub fn resolve(&self, style: Style, text: &str) {
        let mut replies = self.replies.lock().unwrap();
        let at = replies
            .iter()
            .position(|(s, _)| *s == style)
            .expect("no pending call for that style");
        let (_, tx) = replies.remove(at);
        tx.send(text.to_string()).unwrap();
    }
}

#[async_trait]
impl StoryGenerationService for BlockingStory {
    async fn generate(&self, _image: &ImageInput, _genre: &Genre, style: &Style) -> Result<String, ApiError> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.replies.lock().unwrap().push((style.clone(), tx));
        self.calls.fetch_add(1, Ordering::SeqCst);
        rx.recv().map_err(|_| ApiError::Parse("dropped".to_string()))
    }
}

/// Story service that answers at once with "<genre>/<style> story".
#[derive(Default)]
pub struct EchoStory {
    calls: AtomicUsize,
}

impl EchoStory {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoryGenerationService for EchoStory {
    async fn generate(&self, _image: &ImageInput, genre: &Genre, style: &Style) -> Result<String, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{genre}/{style} story"))
    }
}

// ── Speech service ─────────────────────────────────────────────────

pub enum SpeechReply {
    Pcm(Vec<i16>),
    Raw(String),
    NoAudio,
}

pub struct MockSpeech {
    reply: Mutex<SpeechReply>,
    pub requests: Mutex<Vec<(String, Style)>>,
}

impl MockSpeech {
    pub fn new(reply: SpeechReply) -> Self {
        Self {
            reply: Mutex::new(reply),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn silence(frames: usize) -> Self {
        Self::new(SpeechReply::Pcm(vec![0; frames]))
    }
}

#[async_trait]
impl SpeechSynthesisService for MockSpeech {
    async fn synthesize(&self, text: &str, style: &Style) -> Result<String, ApiError> {
        self.requests.lock().unwrap().push((text.to_string(), style.clone()));
        match &*self.reply.lock().unwrap() {
            SpeechReply::Pcm(samples) => {
                let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
                Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            SpeechReply::Raw(payload) => Ok(payload.clone()),
            SpeechReply::NoAudio => Err(ApiError::NoAudioData),
        }
    }
}

// ── Output device ──────────────────────────────────────────────────

/// Output context that keeps clips "playing" until the test finishes them.
#[derive(Default)]
pub struct ManualContext {
    rate: u32,
    pending: Mutex<Vec<PlaybackDoneCallback>>,
    pub started: Mutex<Vec<AudioClip>>,
}

impl ManualContext {
    pub fn playing(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub async fn wait_until_playing(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.playing() == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("nothing started playing");
    }

    pub fn finish_all(&self) {
        let pending: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
        for cb in pending {
            cb();
        }
    }
}

impl OutputContext for ManualContext {
    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn resume(&self) -> Result<(), AudioError> {
        Ok(())
    }

    fn start(&self, clip: AudioClip, on_done: PlaybackDoneCallback) -> Result<(), AudioError> {
        self.started.lock().unwrap().push(clip);
        self.pending.lock().unwrap().push(on_done);
        Ok(())
    }
}

pub struct ManualDevice {
    pub context: Arc<ManualContext>,
    pub opened_at: Arc<Mutex<Vec<u32>>>,
}

impl OutputDevice for ManualDevice {
    fn open(&self, sample_rate: u32) -> Result<Arc<dyn OutputContext>, AudioError> {
        self.opened_at.lock().unwrap().push(sample_rate);
        Ok(self.context.clone())
    }
}

pub struct Rig {
    pub context: Arc<ManualContext>,
    pub opened_at: Arc<Mutex<Vec<u32>>>,
    pub engine: PlaybackEngine,
}

pub fn manual_rig(rate: u32) -> Rig {
    let context = Arc::new(ManualContext {
        rate,
        ..Default::default()
    });
    let opened_at = Arc::new(Mutex::new(Vec::new()));
    let device = ManualDevice {
        context: context.clone(),
        opened_at: opened_at.clone(),
    };
    Rig {
        context,
        opened_at,
        engine: PlaybackEngine::new(Arc::new(AudioContext::new(device))),
    }
}

// ── Helpers ────────────────────────────────────────────────────────

pub fn services(story: Arc<dyn StoryGenerationService>, speech: Arc<dyn SpeechSynthesisService>) -> Services {
    Services { story, speech }
}

pub fn image(bytes: &[u8]) -> ImageInput {
    ImageInput::new(bytes.to_vec(), "image/png")
}

pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<StoryEvent>) -> Vec<StoryEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}
