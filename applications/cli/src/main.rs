/// Aria - terminal music player
use anyhow::Context;
use aria_audio::{available_presets, band_frequencies, VisualizationFrame, BAND_LABELS};
use aria_audio_desktop::{CpalOutputDevice, Recorder, SymphoniaBackend};
use aria_cli::{AppConfig, Command, JsonlPlayLog, ResolverKind};
use aria_core::{MediaId, NoopRecorder, PlayRecorder, StreamResolver, Track};
use aria_playback::{
    DirectResolver, PlaybackController, PlayerEvent, PlayerStatus, RepeatMode, YtDlpResolver,
};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main loop tick: how long to wait for engine messages between input polls
const TICK: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "aria")]
#[command(about = "Aria terminal music player", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./aria.toml if present)
    #[arg(short, long, global = true, env = "ARIA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play files, URLs or video ids with an interactive prompt
    Play {
        /// Paths or URLs (direct resolver) or video ids (ytdlp resolver)
        #[arg(required = true)]
        items: Vec<String>,

        /// Override the configured resolver
        #[arg(short, long)]
        resolver: Option<ResolverKind>,

        /// Start at this queue position
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Shuffle the queue before starting
        #[arg(long)]
        shuffle: bool,

        #[arg(long, value_enum)]
        repeat: Option<RepeatArg>,

        /// Override the configured volume (0-100)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        volume: Option<u8>,

        /// Enable an equalizer preset
        #[arg(long)]
        preset: Option<String>,
    },
    /// List equalizer presets and bands
    Presets,
    /// Record the default input device to a WAV file
    Record {
        /// Output WAV path
        path: PathBuf,

        /// Stop after this many seconds (default: when Enter is pressed)
        #[arg(short, long)]
        seconds: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RepeatArg {
    Off,
    One,
    All,
}

impl From<RepeatArg> for RepeatMode {
    fn from(arg: RepeatArg) -> Self {
        match arg {
            RepeatArg::Off => RepeatMode::Off,
            RepeatArg::One => RepeatMode::One,
            RepeatArg::All => RepeatMode::All,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they do not interleave with the prompt output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aria=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            items,
            resolver,
            start,
            shuffle,
            repeat,
            volume,
            preset,
        } => {
            let mut config = AppConfig::load(cli.config.as_deref())?;
            if let Some(kind) = resolver {
                config.resolver.kind = kind;
            }
            if let Some(volume) = volume {
                config.playback.initial_volume = volume;
            }
            if preset.is_some() {
                config.audio.equalizer_preset = preset;
            }
            config.validate()?;

            let options = PlayOptions {
                start,
                shuffle,
                repeat: repeat.map(RepeatMode::from),
            };
            play(&config, &items, &options)?;
        }
        Commands::Presets => print_presets(),
        Commands::Record { path, seconds } => record(&path, seconds)?,
    }

    Ok(())
}

struct PlayOptions {
    start: usize,
    shuffle: bool,
    repeat: Option<RepeatMode>,
}

fn build_resolver(config: &AppConfig) -> Arc<dyn StreamResolver> {
    match config.resolver.kind {
        ResolverKind::Direct => Arc::new(DirectResolver),
        ResolverKind::Ytdlp => Arc::new(
            YtDlpResolver::new()
                .with_program(&config.resolver.program)
                .with_timeout(config.resolver.timeout()),
        ),
    }
}

fn build_recorder(config: &AppConfig) -> Arc<dyn PlayRecorder> {
    match &config.history.path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Recording play history");
            Arc::new(JsonlPlayLog::new(path))
        }
        None => Arc::new(NoopRecorder),
    }
}

/// Build a queue entry for a command-line item
fn track_for(item: &str, kind: ResolverKind) -> Arc<Track> {
    let (title, artist) = match kind {
        ResolverKind::Direct => {
            let title = Path::new(item)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .filter(|stem| !stem.is_empty())
                .unwrap_or(item);
            (title.to_string(), String::new())
        }
        ResolverKind::Ytdlp => (item.to_string(), "YouTube".to_string()),
    };
    Arc::new(Track::new(item, title, artist).with_media_id(MediaId::new(item)))
}

fn play(config: &AppConfig, items: &[String], options: &PlayOptions) -> anyhow::Result<()> {
    let output = CpalOutputDevice::open().context("failed to open the audio output device")?;
    let mut player = PlaybackController::new(
        config.playback.clone(),
        build_resolver(config),
        build_recorder(config),
        Box::new(output),
        |ctx| Ok(SymphoniaBackend::spawn(ctx)?),
    )?;

    if let Some(name) = &config.audio.equalizer_preset {
        player.equalizer_mut().load_preset(name)?;
        player.equalizer_mut().set_enabled(true);
    }
    if let Some(mode) = options.repeat {
        while player.repeat_mode() != mode {
            player.toggle_repeat();
        }
    }

    let events = player.subscribe();
    let frames = player.subscribe_visualization();
    let input = spawn_stdin_reader()?;

    let tracks: Vec<Arc<Track>> = items
        .iter()
        .map(|item| track_for(item, config.resolver.kind))
        .collect();
    player.set_queue_and_play(tracks, options.start.min(items.len().saturating_sub(1)));
    if options.shuffle {
        player.toggle_shuffle();
    }

    println!("{}", aria_cli::commands::HELP);
    run_loop(&mut player, &events, &frames, &input, config.resolver.kind);

    player.shutdown();
    Ok(())
}

fn spawn_stdin_reader() -> anyhow::Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("aria-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to start the input thread")?;
    Ok(rx)
}

fn run_loop(
    player: &mut PlaybackController,
    events: &Receiver<PlayerEvent>,
    frames: &Receiver<Arc<VisualizationFrame>>,
    input: &Receiver<String>,
    kind: ResolverKind,
) {
    let mut latest_frame: Option<Arc<VisualizationFrame>> = None;
    let mut input_open = true;

    loop {
        player.pump_timeout(TICK);

        for event in events.try_iter() {
            report_event(&event);
        }
        if let Some(frame) = frames.try_iter().last() {
            latest_frame = Some(frame);
        }

        while input_open {
            match input.try_recv() {
                Ok(line) => match Command::parse(&line) {
                    Ok(Some(Command::Quit)) => return,
                    Ok(Some(command)) => apply(player, command, kind, latest_frame.as_deref()),
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => input_open = false,
            }
        }

        // Without a prompt there is nothing left to do once playback ends.
        if !input_open && matches!(player.status(), PlayerStatus::Stopped | PlayerStatus::Idle) {
            return;
        }
    }
}

fn apply(
    player: &mut PlaybackController,
    command: Command,
    kind: ResolverKind,
    frame: Option<&VisualizationFrame>,
) {
    match command {
        Command::Toggle => player.toggle_play_pause(),
        Command::Next => player.play_next(),
        Command::Previous => player.play_previous(),
        Command::Stop => player.stop(),
        Command::Seek(seconds) => player.seek_to(seconds),
        Command::Volume(level) => player.set_volume(level),
        Command::Shuffle => {
            player.toggle_shuffle();
            println!("shuffle {}", on_off(player.is_shuffle()));
        }
        Command::Repeat => {
            player.toggle_repeat();
            println!("repeat {:?}", player.repeat_mode());
        }
        Command::Add(item) => player.add_to_queue(track_for(&item, kind)),
        Command::Remove(index) => player.remove_from_queue(index),
        Command::MoveUp(index) => player.move_up(index),
        Command::MoveDown(index) => player.move_down(index),
        Command::Clear => player.clear_queue(),
        Command::Queue => print_queue(player),
        Command::Status => print_status(player, frame),
        Command::Preset(name) => match player.equalizer_mut().load_preset(&name) {
            Ok(preset) => {
                player.equalizer_mut().set_enabled(true);
                println!("equalizer: {}", preset.name());
            }
            Err(e) => println!("{e}"),
        },
        Command::EqOff => {
            player.equalizer_mut().set_enabled(false);
            println!("equalizer off");
        }
        Command::Band(index, gain) => {
            if let Err(e) = player.equalizer_mut().set_band_gain(index, gain) {
                println!("{e}");
            }
        }
        Command::Visualizer(enabled) => player.set_visualizer_enabled(enabled),
        Command::Help => println!("{}", aria_cli::commands::HELP),
        Command::Quit => {}
    }
}

fn report_event(event: &PlayerEvent) {
    match event {
        PlayerEvent::TrackChanged(Some(track)) => println!("now playing: {}", track.display_name()),
        PlayerEvent::TrackChanged(None) => println!("stopped"),
        PlayerEvent::Error { message } => println!("error: {message}"),
        PlayerEvent::QueueChanged { length } => tracing::debug!(length, "Queue changed"),
        other => tracing::trace!(event = ?other, "Player event"),
    }
}

fn print_queue(player: &PlaybackController) {
    let current = player.current_index();
    let queue = player.queue();
    if queue.is_empty() {
        println!("queue is empty");
        return;
    }
    for (i, track) in queue.iter().enumerate() {
        let marker = if Some(i) == current { ">" } else { " " };
        println!("{marker} {i:>3}  {}", track.display_name());
    }
}

fn print_status(player: &PlaybackController, frame: Option<&VisualizationFrame>) {
    let track = player
        .current_track()
        .map_or_else(|| "-".to_string(), |t| t.display_name());
    let position = player.position_secs();
    let total = player
        .current_track()
        .map_or(0, |t| u64::from(t.duration_secs));
    println!(
        "{:?}  {}  {}/{}  vol {}  shuffle {}  repeat {:?}  eq {}",
        player.status(),
        track,
        clock(position),
        clock(total),
        player.volume(),
        on_off(player.is_shuffle()),
        player.repeat_mode(),
        player
            .equalizer()
            .preset()
            .filter(|_| player.equalizer().is_enabled())
            .map_or("off", |p| p.name()),
    );
    if let Some(frame) = frame.filter(|_| player.is_visualizer_enabled()) {
        println!("[{}]", spectrum_line(frame));
    }
}

/// Compress 64 bars into a 32-column text meter
fn spectrum_line(frame: &VisualizationFrame) -> String {
    const LEVELS: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];
    frame
        .spectrum
        .chunks(2)
        .map(|pair| {
            let height = pair.iter().copied().fold(0.0f32, f32::max);
            let level = (height * (LEVELS.len() - 1) as f32).round() as usize;
            LEVELS[level.min(LEVELS.len() - 1)]
        })
        .collect()
}

fn clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn print_presets() {
    println!("presets:");
    for name in available_presets() {
        println!("  {name}");
    }
    println!("bands:");
    for (i, (label, hz)) in BAND_LABELS.iter().zip(band_frequencies()).enumerate() {
        println!("  {i}  {label:>7}  ({hz} Hz)");
    }
}

fn record(path: &Path, seconds: Option<u64>) -> anyhow::Result<()> {
    let recorder = Recorder::start(path)
        .with_context(|| format!("failed to start recording to {}", path.display()))?;

    match seconds {
        Some(seconds) => {
            println!("recording {seconds}s to {}", path.display());
            thread::sleep(Duration::from_secs(seconds));
        }
        None => {
            println!("recording to {}, press Enter to stop", path.display());
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
        }
    }

    let saved = recorder.stop()?;
    println!("saved {}", saved.display());
    Ok(())
}
