pub mod audio;
#[cfg(feature = "playback")]
pub mod audio_thread;
pub mod audio_types;
pub mod controller;
pub mod error;
pub mod gemini;
pub mod gui_types;
pub mod openai_compat;
pub mod playback;
pub mod prompts;
pub mod services;
pub mod types;
