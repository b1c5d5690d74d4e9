//! osu!radio - play an osu! songs library from the terminal

mod commands;
mod config;
mod library;

use anyhow::Context;
use clap::Parser;
use crate::commands::{Command, ParseError, HELP};
use crate::config::AppConfig;
use crossbeam_channel::{never, select, tick, unbounded, Receiver};
use osuradio_desktop::{CpalOutput, SymphoniaDecoderFactory};
use osuradio_playback::{
    format_time, AudioOutput, NullOutput, PlaybackEngine, PlaybackEvent, RepeatMode, Track,
    TransportController, TransportStatus,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "osuradio=info,osuradio_playback=info,osuradio_desktop=info";

#[derive(Parser)]
#[command(name = "osuradio")]
#[command(about = "Play an osu! songs library from the terminal", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./osuradio.toml if present)
    #[arg(short, long, env = "OSURADIO_CONFIG")]
    config: Option<PathBuf>,

    /// Library snapshot written by the scanner
    #[arg(short, long)]
    library: Option<PathBuf>,

    /// Play into a null output instead of the audio device
    #[arg(long)]
    headless: bool,

    /// Audio files to play instead of a snapshot
    files: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't interleave with the prompt
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if cli.headless {
        config.headless = true;
    }
    if cli.library.is_some() {
        config.library = cli.library;
    }
    debug!("Configuration: {:?}", config);

    let library = library::resolve(&cli.files, config.library.as_deref())?;
    if library.is_empty() {
        warn!("Library is empty; pass audio files or --library");
    }

    let output: Box<dyn AudioOutput> = if config.headless {
        info!("Running headless");
        Box::new(NullOutput::new(config.playback.block_frames))
    } else {
        Box::new(
            CpalOutput::new(config.playback.block_frames)
                .context("Failed to open audio output (try --headless)")?,
        )
    };

    let engine = PlaybackEngine::new(Box::new(SymphoniaDecoderFactory), output);
    let mut transport = TransportController::new(library, engine, &config.playback);

    run(&mut transport, Duration::from_millis(config.poll_interval_ms))?;

    transport.stop();
    info!("Bye");
    Ok(())
}

/// Input multiplexed by the command loop
enum Input {
    Line(String),
    Closed,
    Tick,
}

/// Command loop
///
/// Stdin lines and the poll tick are multiplexed on one thread, so every
/// transport call happens here. Once stdin closes the loop keeps ticking
/// until playback goes idle.
fn run(transport: &mut TransportController, poll_interval: Duration) -> anyhow::Result<()> {
    let mut lines = spawn_stdin_reader()?;
    let ticker = tick(poll_interval);
    let mut stdin_open = true;

    println!("{} tracks loaded. Type 'help' for commands.", transport.library().len());
    prompt();

    loop {
        let input = select! {
            recv(lines) -> line => line.map_or(Input::Closed, Input::Line),
            recv(ticker) -> _ => Input::Tick,
        };

        match input {
            Input::Line(line) => {
                match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = execute(transport, command) {
                            println!("error: {}", e);
                        }
                    }
                    Err(ParseError::Empty) => {}
                    Err(e) => println!("{}", e),
                }
                print_events(transport);
                prompt();
            }
            Input::Closed => {
                debug!("Stdin closed");
                stdin_open = false;
                lines = never();
            }
            Input::Tick => {
                if let Err(e) = transport.poll() {
                    warn!("Advancing after completion failed: {}", e);
                }
                print_events(transport);

                if !stdin_open && !transport.engine().is_active() {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("osuradio-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn execute(transport: &mut TransportController, command: Command) -> osuradio_playback::Result<()> {
    match command {
        Command::List => {
            let current = transport.status().index;
            for (i, track) in transport.library().iter().enumerate() {
                println!("{}", format_row(i, track, current == Some(i)));
            }
        }
        Command::Play(index) => transport.play_index(index)?,
        Command::Toggle => transport.toggle_play_pause()?,
        Command::Pause => {
            if transport.engine().is_active() {
                transport.toggle_play_pause()?;
            } else {
                println!("Nothing is playing");
            }
        }
        Command::Stop => transport.stop(),
        Command::Next => transport.next()?,
        Command::Previous => transport.previous()?,
        Command::Seek(ms) => transport.seek(ms)?,
        Command::Volume(percent) => transport.set_volume(f32::from(percent) / 100.0),
        Command::Mute => transport.toggle_mute(),
        Command::DoubleTime => transport.toggle_double_time()?,
        Command::Shuffle => transport.toggle_shuffle(),
        Command::Repeat => transport.toggle_repeat(),
        Command::Status => {
            println!("{}", format_status(&transport.status(), transport.current_track()));
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
    Ok(())
}

fn print_events(transport: &mut TransportController) {
    let double_time = transport.engine().double_time();
    for event in transport.drain_events() {
        if let Some(line) = format_event(&event, transport.library(), double_time) {
            println!("\n{}", line);
        }
    }
}

fn format_row(index: usize, track: &Track, current: bool) -> String {
    let marker = if current { '*' } else { ' ' };
    format!("{} {:>4}  {}", marker, index, track.display_text)
}

fn format_event(event: &PlaybackEvent, library: &[Track], double_time: bool) -> Option<String> {
    let name = |index: usize| {
        library
            .get(index)
            .map_or("<unknown>", |track| track.display_text.as_str())
    };

    match event {
        PlaybackEvent::TrackStarted { index, duration_ms } => {
            let mut line = format!(
                "Now playing: {} [{}]",
                name(*index),
                format_time(Some(*duration_ms))
            );
            if let Some(label) = library.get(*index).and_then(|t| t.bpm_label(double_time)) {
                line.push_str("  ");
                line.push_str(&label);
            }
            Some(line)
        }
        PlaybackEvent::PlaybackFinished { .. } => None,
        PlaybackEvent::StartFailed { index, message } => {
            Some(format!("Could not play {}: {}", name(*index), message))
        }
        PlaybackEvent::Stopped => Some("Stopped".to_string()),
    }
}

fn format_status(status: &TransportStatus, track: Option<&Track>) -> String {
    let title = track.map_or("-", |t| t.display_text.as_str());
    let volume = if status.muted {
        "muted".to_string()
    } else {
        format!("vol {:.0}%", status.volume * 100.0)
    };

    let mut flags = Vec::new();
    if status.double_time {
        flags.push("dt");
    }
    if status.shuffle {
        flags.push("shuffle");
    }
    if status.repeat == RepeatMode::One {
        flags.push("repeat");
    }

    format!(
        "{:?}  {}  {} / {}  {}  [{}]",
        status.state,
        title,
        format_time(Some(status.position_ms)),
        format_time(Some(status.duration_ms)),
        volume,
        flags.join(" ")
    )
}
