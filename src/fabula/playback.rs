//! Single-session playback over a lazily opened, never recreated output context.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use super::audio::AudioError;
use super::audio_types::{AudioClip, PlaybackOutcome};

/// Invoked once when a scheduled clip has drained. Dropping it uncalled marks
/// the session as failed.
pub type PlaybackDoneCallback = Box<dyn FnOnce() + Send + 'static>;

/// An opened audio sink running at a fixed sample rate.
pub trait OutputContext: Send + Sync {
    fn sample_rate(&self) -> u32;

    /// Wakes the sink if the platform suspended it.
    fn resume(&self) -> Result<(), AudioError>;

    /// Starts `clip` immediately at the context's own rate.
    fn start(&self, clip: AudioClip, on_done: PlaybackDoneCallback) -> Result<(), AudioError>;
}

/// Something that can open an [`OutputContext`], e.g. the default sound card.
pub trait OutputDevice: Send + Sync {
    fn open(&self, sample_rate: u32) -> Result<Arc<dyn OutputContext>, AudioError>;
}

/// Process-wide output context: opened on first use, then kept for the
/// lifetime of the process.
pub struct AudioContext {
    device: Box<dyn OutputDevice>,
    slot: Mutex<Option<Arc<dyn OutputContext>>>,
    opened: AtomicUsize,
}

impl AudioContext {
    pub fn new(device: impl OutputDevice + 'static) -> Self {
        Self {
            device: Box::new(device),
            slot: Mutex::new(None),
            opened: AtomicUsize::new(0),
        }
    }

    /// Returns the context, opening it at `sample_rate` on the first call.
    /// Later calls ignore `sample_rate`.
    pub fn ensure(&self, sample_rate: u32) -> Result<Arc<dyn OutputContext>, AudioError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| AudioError::OutputStream("audio context lock poisoned".to_string()))?;

        if let Some(ctx) = slot.as_ref() {
            if ctx.sample_rate() != sample_rate {
                tracing::debug!(
                    context_rate = ctx.sample_rate(),
                    requested_rate = sample_rate,
                    "Reusing audio context at its original rate"
                );
            }
            return Ok(ctx.clone());
        }

        let ctx = self.device.open(sample_rate)?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        tracing::info!(sample_rate, "Audio context created");
        *slot = Some(ctx.clone());
        Ok(ctx)
    }

    pub fn is_open(&self) -> bool {
        self.slot.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// How many times the device has been opened (0 or 1).
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

/// Handle to one playback session.
pub struct PlaybackHandle {
    done: oneshot::Receiver<PlaybackOutcome>,
}

impl PlaybackHandle {
    /// Resolves once, when the clip ends or the context drops it.
    pub async fn finished(self) -> PlaybackOutcome {
        self.done.await.unwrap_or(PlaybackOutcome::Failed)
    }
}

struct Session {
    active: Arc<AtomicBool>,
    done: Option<oneshot::Sender<PlaybackOutcome>>,
}

impl Session {
    fn complete(mut self) {
        self.settle(PlaybackOutcome::Completed);
    }

    fn settle(&mut self, outcome: PlaybackOutcome) {
        if let Some(tx) = self.done.take() {
            // The slot must be free before anyone observes the outcome.
            self.active.store(false, Ordering::SeqCst);
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.settle(PlaybackOutcome::Failed);
    }
}

pub struct PlaybackEngine {
    context: Arc<AudioContext>,
    active: Arc<AtomicBool>,
}

impl PlaybackEngine {
    pub fn new(context: Arc<AudioContext>) -> Self {
        Self {
            context,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn ensure_context(&self, sample_rate: u32) -> Result<Arc<dyn OutputContext>, AudioError> {
        self.context.ensure(sample_rate)
    }

    pub fn context(&self) -> &Arc<AudioContext> {
        &self.context
    }

    pub fn is_playing(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Schedules `clip` for immediate playback. There is no stop: a started
    /// clip plays to the end.
    pub fn play(&self, clip: AudioClip) -> Result<PlaybackHandle, AudioError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(AudioError::AlreadyPlaying);
        }

        let (tx, rx) = oneshot::channel();
        // From here on, dropping `session` releases the slot.
        let session = Session {
            active: self.active.clone(),
            done: Some(tx),
        };

        let ctx = self.context.ensure(clip.sample_rate)?;
        ctx.resume()?;

        let duration = clip.duration();
        ctx.start(clip, Box::new(move || session.complete()))?;
        tracing::debug!(?duration, "Playback scheduled");

        Ok(PlaybackHandle { done: rx })
    }
}

/// Output for machines without a sound card: a clip "plays" for exactly its
/// duration at the context rate, then completes.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessOutput;

impl OutputDevice for HeadlessOutput {
    fn open(&self, sample_rate: u32) -> Result<Arc<dyn OutputContext>, AudioError> {
        Ok(Arc::new(HeadlessContext { sample_rate }))
    }
}

struct HeadlessContext {
    sample_rate: u32,
}

impl OutputContext for HeadlessContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&self) -> Result<(), AudioError> {
        Ok(())
    }

    fn start(&self, clip: AudioClip, on_done: PlaybackDoneCallback) -> Result<(), AudioError> {
        let secs = clip.frames() as f64 / f64::from(self.sample_rate.max(1));
        std::thread::Builder::new()
            .name("fabula-headless".into())
            .spawn(move || {
                std::thread::sleep(Duration::from_secs_f64(secs));
                on_done();
            })
            .map_err(|e| AudioError::OutputStream(format!("failed to spawn playback thread: {e}")))?;
        Ok(())
    }
}
