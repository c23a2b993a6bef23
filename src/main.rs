use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fabula::{ControllerConfig, Genre, PlaybackOutcome, ReadAloud, RequestState, StoryEvent, Style};

/// Turn an image into the opening of a story, and optionally read it aloud.
#[derive(Debug, Parser)]
#[command(name = "fabula", version)]
struct Cli {
    /// Image to write about.
    image: PathBuf,

    /// Story genre (Fantasy, Sci-Fi, Mystery, Romance, Horror, Thriller, or anything else).
    #[arg(long, default_value = "Fantasy", env = "FABULA_GENRE")]
    genre: Genre,

    /// Writing style (Descriptive, Poetic, Minimalist, Suspenseful, Whimsical, or anything else).
    #[arg(long, default_value = "Descriptive", env = "FABULA_STYLE")]
    style: Style,

    /// Narrate the story once it is ready.
    #[arg(long)]
    read_aloud: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    fabula::init_tracing();
    let cli = Cli::parse();

    let config = ControllerConfig {
        genre: cli.genre,
        style: cli.style,
        ..Default::default()
    };

    let (controller, mut events) = match fabula::controller_from_env(config) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if controller.select_image_file(&cli.image).await.is_none() {
        let message = controller.error().map(|e| e.detail).unwrap_or_default();
        eprintln!("error: {message}");
        return ExitCode::FAILURE;
    }

    while let Some(event) = events.recv().await {
        match event {
            StoryEvent::StateChanged(RequestState::Ready { story }) => {
                println!("{}", story.text);
                break;
            }
            StoryEvent::StateChanged(RequestState::Failed { error }) => {
                eprintln!("error: {} ({})", error.message, error.detail);
                return ExitCode::FAILURE;
            }
            _ => {}
        }
    }

    if cli.read_aloud {
        if let ReadAloud::Started(task) = controller.on_read_aloud() {
            match task.await {
                Ok(PlaybackOutcome::Completed) => {}
                _ => {
                    let message = controller.error().map(|e| e.detail).unwrap_or_default();
                    eprintln!("error: narration failed: {message}");
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}
