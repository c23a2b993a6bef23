//! Sound-card output on a dedicated thread.
//!
//! `rodio::OutputStream` is `!Send` on some platforms, so it lives on its own
//! OS thread for the life of the process and the context talks to it over a
//! channel.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use rodio::{OutputStream, Sink};

use super::audio::AudioError;
use super::audio_types::AudioClip;
use super::playback::{OutputContext, OutputDevice, PlaybackDoneCallback};

enum AudioCommand {
    Play {
        samples: Vec<f32>,
        channels: u16,
        on_done: PlaybackDoneCallback,
        reply: mpsc::Sender<Result<(), AudioError>>,
    },
}

/// The system's default output device.
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioOutput;

impl OutputDevice for RodioOutput {
    fn open(&self, sample_rate: u32) -> Result<Arc<dyn OutputContext>, AudioError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), AudioError>>();

        thread::Builder::new()
            .name("fabula-audio".into())
            .spawn(move || run(sample_rate, cmd_rx, init_tx))
            .map_err(|e| AudioError::OutputStream(format!("failed to spawn audio thread: {e}")))?;

        init_rx
            .recv()
            .map_err(|_| AudioError::OutputStream("audio thread exited during startup".to_string()))??;

        Ok(Arc::new(RodioContext {
            sample_rate,
            cmd_tx: std::sync::Mutex::new(cmd_tx),
        }))
    }
}

fn run(sample_rate: u32, cmd_rx: mpsc::Receiver<AudioCommand>, init_tx: mpsc::Sender<Result<(), AudioError>>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = init_tx.send(Err(AudioError::OutputStream(e.to_string())));
            return;
        }
    };
    let _ = init_tx.send(Ok(()));
    tracing::info!(sample_rate, "Audio output opened on default device");

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            AudioCommand::Play {
                samples,
                channels,
                on_done,
                reply,
            } => {
                let sink = match Sink::try_new(&handle) {
                    Ok(s) => Arc::new(s),
                    Err(e) => {
                        let _ = reply.send(Err(AudioError::OutputStream(e.to_string())));
                        continue;
                    }
                };

                sink.append(rodio::buffer::SamplesBuffer::new(channels, sample_rate, samples));
                let _ = reply.send(Ok(()));

                let watcher = sink.clone();
                thread::spawn(move || {
                    watcher.sleep_until_end();
                    tracing::debug!("Playback finished naturally");
                    on_done();
                });
            }
        }
    }
}

struct RodioContext {
    sample_rate: u32,
    cmd_tx: std::sync::Mutex<mpsc::Sender<AudioCommand>>,
}

impl OutputContext for RodioContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn resume(&self) -> Result<(), AudioError> {
        Ok(())
    }

    fn start(&self, clip: AudioClip, on_done: PlaybackDoneCallback) -> Result<(), AudioError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        let cmd = AudioCommand::Play {
            samples: clip.interleaved(),
            channels: clip.channel_count(),
            on_done,
            reply: reply_tx,
        };

        self.cmd_tx
            .lock()
            .map_err(|_| AudioError::OutputStream("audio thread lock poisoned".to_string()))?
            .send(cmd)
            .map_err(|_| AudioError::OutputStream("audio thread died".to_string()))?;

        reply_rx
            .recv()
            .map_err(|_| AudioError::OutputStream("audio thread died".to_string()))?
    }
}
