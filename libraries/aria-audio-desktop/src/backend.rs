//! Symphonia playback backend
//!
//! One player thread owns the decoder, the DSP chain and the callback
//! router. Commands arrive over a channel; between commands the thread
//! decodes a block, runs it through the equalizer and volume, encodes it to
//! S16 and hands it to the router.
//!
//! ## Pacing
//!
//! The output ring holds half a second. The player renders at most
//! [`MAX_LEAD`] ahead of the wall clock and spends the rest of the time
//! blocked on the command channel, so pause/stop/seek take effect within
//! one block.

use crate::decoder::{SourceLocation, StreamDecoder};
use crate::error::{DesktopError, Result};
use aria_audio::{
    pcm, AudioCallbackRouter, AudioEffect, EqualizerSettings, EqualizerTarget, GraphicEq, PcmSink,
    Volume,
};
use aria_core::{AriaError, StreamSource};
use aria_playback::{BackendContext, BackendEvent, LoadId, PlaybackBackend};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How far rendering may run ahead of real time
const MAX_LEAD: Duration = Duration::from_millis(200);

/// Interval between `TimeChanged` events
const TIME_REPORT_INTERVAL: Duration = Duration::from_millis(250);

/// Timeout for downloading a remote stream
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

enum Command {
    Load(LoadId, StreamSource),
    Pause,
    Resume,
    Stop,
    Seek(Duration),
    SetVolume(u8),
    Equalizer(Option<EqualizerSettings>),
    Shutdown,
}

/// What the player thread does next
enum Step {
    Handle(Command),
    Render,
    Exit,
}

/// Backend decoding local files and HTTP streams with Symphonia
pub struct SymphoniaBackend {
    commands: Sender<Command>,
    thread: Mutex<Option<JoinHandle<()>>>,
    released: AtomicBool,
}

impl SymphoniaBackend {
    /// Start the player thread
    ///
    /// Use as the controller's backend factory:
    /// `|ctx| Ok(SymphoniaBackend::spawn(ctx)?)`.
    pub fn spawn(ctx: BackendContext) -> Result<Self> {
        let (commands, rx) = unbounded();
        let player = Player::new(ctx);

        let thread = thread::Builder::new()
            .name("aria-player".to_string())
            .spawn(move || player.run(&rx))
            .map_err(|e| DesktopError::Thread(e.to_string()))?;

        Ok(Self {
            commands,
            thread: Mutex::new(Some(thread)),
            released: AtomicBool::new(false),
        })
    }

    fn send(&self, command: Command) {
        if self.released.load(Ordering::Acquire) {
            return;
        }
        if self.commands.send(command).is_err() {
            tracing::warn!("Player thread is gone, command dropped");
        }
    }
}

impl EqualizerTarget for SymphoniaBackend {
    fn apply_equalizer(&self, settings: Option<EqualizerSettings>) {
        self.send(Command::Equalizer(settings));
    }
}

impl PlaybackBackend for SymphoniaBackend {
    fn load_and_play(&self, load: LoadId, source: &StreamSource) -> aria_core::Result<()> {
        if source.url.trim().is_empty() {
            return Err(AriaError::backend("empty stream URL"));
        }
        if self.released.load(Ordering::Acquire) {
            return Err(AriaError::backend("backend released"));
        }
        self.send(Command::Load(load, source.clone()));
        Ok(())
    }

    fn pause(&self) {
        self.send(Command::Pause);
    }

    fn resume(&self) {
        self.send(Command::Resume);
    }

    fn stop(&self) {
        self.send(Command::Stop);
    }

    fn seek(&self, position: Duration) {
        self.send(Command::Seek(position));
    }

    fn set_volume(&self, volume: u8) {
        self.send(Command::SetVolume(volume));
    }

    fn release(&self) {
        if self.released.load(Ordering::Acquire) {
            return;
        }
        let _ = self.commands.send(Command::Shutdown);
        self.released.store(true, Ordering::Release);

        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Player thread panicked");
            }
        }
        tracing::debug!("Backend released");
    }
}

impl Drop for SymphoniaBackend {
    fn drop(&mut self) {
        self.release();
    }
}

/// Maps rendered frames to a playback position and wall-clock lead
struct PlaybackClock {
    base: Duration,
    frames: u64,
    started: Instant,
    last_report: Option<Duration>,
}

impl PlaybackClock {
    fn new() -> Self {
        Self {
            base: Duration::ZERO,
            frames: 0,
            started: Instant::now(),
            last_report: None,
        }
    }

    fn restart(&mut self, at: Duration) {
        self.base = at;
        self.frames = 0;
        self.started = Instant::now();
        self.last_report = None;
    }

    fn rendered(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / f64::from(pcm::SAMPLE_RATE))
    }

    fn position(&self) -> Duration {
        self.base + self.rendered()
    }

    fn advance(&mut self, frames: usize) {
        self.frames += frames as u64;
    }

    /// Audio rendered beyond what the device has had time to play
    fn lead(&self) -> Duration {
        self.rendered().saturating_sub(self.started.elapsed())
    }

    fn report_due(&mut self) -> Option<Duration> {
        let position = self.position();
        let due = self
            .last_report
            .map_or(true, |last| position >= last + TIME_REPORT_INTERVAL);
        if due {
            self.last_report = Some(position);
            Some(position)
        } else {
            None
        }
    }
}

/// State owned by the player thread
struct Player {
    events: Sender<BackendEvent>,
    sink: AudioCallbackRouter,
    http: Option<reqwest::blocking::Client>,
    equalizer: GraphicEq,
    volume: Volume,
    stream: Option<StreamDecoder>,
    /// Token of the stream being rendered
    load: LoadId,
    paused: bool,
    clock: PlaybackClock,
    block: Vec<f32>,
    bytes: Vec<u8>,
}

impl Player {
    fn new(ctx: BackendContext) -> Self {
        Self {
            events: ctx.events,
            sink: ctx.sink,
            http: None,
            equalizer: GraphicEq::new(),
            volume: Volume::default(),
            stream: None,
            load: 0,
            paused: false,
            clock: PlaybackClock::new(),
            block: Vec::with_capacity(8192),
            bytes: Vec::with_capacity(16384),
        }
    }

    fn run(mut self, commands: &Receiver<Command>) {
        tracing::debug!("Player thread started");
        loop {
            match self.next_step(commands) {
                Step::Handle(Command::Shutdown) | Step::Exit => break,
                Step::Handle(command) => self.handle(command),
                Step::Render => self.render_block(),
            }
        }
        self.stream = None;
        tracing::debug!("Player thread exiting");
    }

    fn is_rendering(&self) -> bool {
        self.stream.is_some() && !self.paused
    }

    fn next_step(&self, commands: &Receiver<Command>) -> Step {
        if !self.is_rendering() {
            return commands.recv().map_or(Step::Exit, Step::Handle);
        }

        let lead = self.clock.lead();
        if lead > MAX_LEAD {
            match commands.recv_timeout(lead - MAX_LEAD) {
                Ok(command) => Step::Handle(command),
                Err(RecvTimeoutError::Timeout) => Step::Render,
                Err(RecvTimeoutError::Disconnected) => Step::Exit,
            }
        } else {
            match commands.try_recv() {
                Ok(command) => Step::Handle(command),
                Err(TryRecvError::Empty) => Step::Render,
                Err(TryRecvError::Disconnected) => Step::Exit,
            }
        }
    }

    fn emit(&self, event: BackendEvent) {
        let _ = self.events.send(event);
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Load(load, source) => self.load(load, &source),
            Command::Pause => {
                if self.stream.is_some() && !self.paused {
                    self.paused = true;
                    self.emit(BackendEvent::Paused);
                }
            }
            Command::Resume => {
                if self.stream.is_some() && self.paused {
                    self.paused = false;
                    self.clock.restart(self.clock.position());
                    self.emit(BackendEvent::Playing);
                }
            }
            Command::Stop => {
                self.stream = None;
                self.paused = false;
                self.emit(BackendEvent::Stopped);
            }
            Command::Seek(position) => self.seek(position),
            Command::SetVolume(level) => self.volume.set_level(level),
            Command::Equalizer(settings) => self.equalizer.set_settings(settings),
            Command::Shutdown => {}
        }
    }

    fn load(&mut self, load: LoadId, source: &StreamSource) {
        self.stream = None;
        self.load = load;
        self.paused = false;
        self.equalizer.reset();
        tracing::info!(source = source.log_label(), load, "Loading stream");

        match self.open(source) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.clock.restart(Duration::ZERO);
                self.emit(BackendEvent::Playing);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open stream");
                self.emit(BackendEvent::Error(load, e.to_string()));
            }
        }
    }

    fn open(&mut self, source: &StreamSource) -> Result<StreamDecoder> {
        let location = SourceLocation::parse(&source.url)?;
        let client = match self.http.take() {
            Some(client) => client,
            None => reqwest::blocking::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .map_err(|e| DesktopError::Fetch(e.to_string()))?,
        };
        let opened = StreamDecoder::open(&location, &client);
        self.http = Some(client);
        opened
    }

    fn seek(&mut self, position: Duration) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        match stream.seek(position) {
            Ok(()) => {
                self.equalizer.reset();
                self.clock.restart(position);
                self.emit(BackendEvent::TimeChanged(position));
            }
            Err(e) => tracing::warn!(error = %e, position = ?position, "Seek failed"),
        }
    }

    fn render_block(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        self.block.clear();
        match stream.next_block(&mut self.block) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Stream finished");
                self.stream = None;
                self.emit(BackendEvent::Finished(self.load));
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Decode failed");
                self.stream = None;
                self.emit(BackendEvent::Error(self.load, e.to_string()));
                return;
            }
        }
        if self.block.is_empty() {
            return;
        }

        self.equalizer.process(&mut self.block, pcm::SAMPLE_RATE);
        self.volume.process(&mut self.block, pcm::SAMPLE_RATE);
        pcm::encode_s16(&self.block, &mut self.bytes);
        self.sink.on_pcm(&self.bytes);

        self.clock.advance(self.block.len() / pcm::CHANNELS);
        if let Some(position) = self.clock.report_due() {
            self.emit(BackendEvent::TimeChanged(position));
        }
    }
}
