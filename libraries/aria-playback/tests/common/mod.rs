//! Shared test doubles for controller tests
//!
//! - `MockBackend`: records every command, emits the lifecycle events a real
//!   backend would, and can be told to fail upcoming loads
//! - `ScriptedResolver`: resolves instantly, failing for chosen media ids
//! - `CountingRecorder`: remembers every recorded play

#![allow(dead_code)]

use aria_audio::{
    AudioCallbackRouter, EqualizerSettings, EqualizerTarget, OutputDevice, PcmSink,
};
use aria_core::{AriaError, MediaId, PlayRecorder, StreamResolver, StreamSource, Track, TrackId};
use aria_playback::{
    BackendContext, BackendEvent, LoadId, PlaybackBackend, PlaybackConfig, PlaybackController,
    PlayerEvent,
};
use async_trait::async_trait;
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ===== Backend =====

#[derive(Debug, Default)]
pub struct BackendLog {
    pub loads: Vec<String>,
    pub load_ids: Vec<LoadId>,
    pub pauses: usize,
    pub resumes: usize,
    pub stops: usize,
    pub releases: usize,
    pub seeks: Vec<Duration>,
    pub volumes: Vec<u8>,
    pub equalizer: Vec<Option<EqualizerSettings>>,
}

/// Handle the test keeps to inspect and steer the backend
#[derive(Clone, Default)]
pub struct BackendScript {
    log: Arc<Mutex<BackendLog>>,
    fail_loads: Arc<AtomicUsize>,
    sink: Arc<Mutex<Option<AudioCallbackRouter>>>,
}

impl BackendScript {
    pub fn log<R>(&self, read: impl FnOnce(&BackendLog) -> R) -> R {
        read(&self.log.lock().unwrap())
    }

    pub fn loads(&self) -> Vec<String> {
        self.log(|log| log.loads.clone())
    }

    /// Token of the most recent load, accepted or not
    pub fn last_load(&self) -> LoadId {
        self.log(|log| log.load_ids.last().copied().unwrap_or_default())
    }

    /// Make the next `count` loads fail synchronously
    pub fn fail_next_loads(&self, count: usize) {
        self.fail_loads.store(count, Ordering::SeqCst);
    }

    /// Push PCM through the router as the real-time thread would
    pub fn feed_pcm(&self, pcm: &[u8]) {
        if let Some(sink) = self.sink.lock().unwrap().as_mut() {
            sink.on_pcm(pcm);
        }
    }
}

pub struct MockBackend {
    script: BackendScript,
    events: Sender<BackendEvent>,
}

impl MockBackend {
    pub fn new(script: BackendScript, ctx: BackendContext) -> Self {
        *script.sink.lock().unwrap() = Some(ctx.sink);
        Self {
            script,
            events: ctx.events,
        }
    }

    fn send(&self, event: BackendEvent) {
        let _ = self.events.send(event);
    }
}

impl EqualizerTarget for MockBackend {
    fn apply_equalizer(&self, settings: Option<EqualizerSettings>) {
        self.script.log.lock().unwrap().equalizer.push(settings);
    }
}

impl PlaybackBackend for MockBackend {
    fn load_and_play(&self, load: LoadId, source: &StreamSource) -> aria_core::Result<()> {
        {
            let mut log = self.script.log.lock().unwrap();
            log.loads.push(source.url.clone());
            log.load_ids.push(load);
        }
        let failing = self
            .script
            .fail_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AriaError::backend("scripted load failure"));
        }
        self.send(BackendEvent::Playing);
        Ok(())
    }

    fn pause(&self) {
        self.script.log.lock().unwrap().pauses += 1;
        self.send(BackendEvent::Paused);
    }

    fn resume(&self) {
        self.script.log.lock().unwrap().resumes += 1;
        self.send(BackendEvent::Playing);
    }

    fn stop(&self) {
        self.script.log.lock().unwrap().stops += 1;
        self.send(BackendEvent::Stopped);
    }

    fn seek(&self, position: Duration) {
        self.script.log.lock().unwrap().seeks.push(position);
    }

    fn set_volume(&self, volume: u8) {
        self.script.log.lock().unwrap().volumes.push(volume);
    }

    fn release(&self) {
        self.script.log.lock().unwrap().releases += 1;
        self.script.sink.lock().unwrap().take();
    }
}

// ===== Output =====

#[derive(Clone, Default)]
pub struct MemoryOutput {
    pub written: Arc<Mutex<Vec<u8>>>,
}

impl OutputDevice for MemoryOutput {
    fn write(&mut self, pcm: &[u8]) -> aria_audio::Result<usize> {
        self.written.lock().unwrap().extend_from_slice(pcm);
        Ok(pcm.len())
    }
}

pub struct BrokenOutput;

impl OutputDevice for BrokenOutput {
    fn write(&mut self, _pcm: &[u8]) -> aria_audio::Result<usize> {
        Err(aria_audio::AudioError::Stream("device unplugged".to_string()))
    }
}

// ===== Collaborators =====

#[derive(Default)]
pub struct ScriptedResolver {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    invalid: Mutex<HashSet<String>>,
}

impl ScriptedResolver {
    pub fn fail_for(&self, media_id: &str) {
        self.failing.lock().unwrap().insert(media_id.to_string());
    }

    /// Answer `media_id` with `InvalidTrack`
    pub fn reject(&self, media_id: &str) {
        self.invalid.lock().unwrap().insert(media_id.to_string());
    }

    pub fn calls_for(&self, media_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| *id == media_id)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl StreamResolver for ScriptedResolver {
    async fn resolve(&self, media_id: &MediaId) -> aria_core::Result<StreamSource> {
        self.calls.lock().unwrap().push(media_id.to_string());
        if self.invalid.lock().unwrap().contains(media_id.as_str()) {
            return Err(AriaError::invalid_track(format!("{media_id} is not playable")));
        }
        if self.failing.lock().unwrap().contains(media_id.as_str()) {
            return Err(AriaError::resolution(format!("no stream for {media_id}")));
        }
        Ok(StreamSource::new(format!("mock://{media_id}")))
    }
}

#[derive(Default)]
pub struct CountingRecorder {
    plays: Mutex<Vec<TrackId>>,
}

impl CountingRecorder {
    pub fn plays(&self) -> Vec<String> {
        self.plays
            .lock()
            .unwrap()
            .iter()
            .map(|id| id.to_string())
            .collect()
    }

    /// Play history is written fire-and-forget; poll until `count` arrive
    pub fn wait_for(&self, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.plays.lock().unwrap().len() < count && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        self.plays()
    }
}

#[async_trait]
impl PlayRecorder for CountingRecorder {
    async fn record_play(&self, track_id: &TrackId) -> aria_core::Result<()> {
        self.plays.lock().unwrap().push(track_id.clone());
        Ok(())
    }
}

// ===== Harness =====

pub struct Harness {
    pub player: PlaybackController,
    pub events: Receiver<PlayerEvent>,
    pub backend: BackendScript,
    pub resolver: Arc<ScriptedResolver>,
    pub recorder: Arc<CountingRecorder>,
    pub output: MemoryOutput,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: PlaybackConfig) -> Self {
        let output = MemoryOutput::default();
        Self::build(config, Box::new(output.clone()), output)
    }

    pub fn with_output(output: Box<dyn OutputDevice>) -> Self {
        Self::build(test_config(), output, MemoryOutput::default())
    }

    fn build(config: PlaybackConfig, device: Box<dyn OutputDevice>, output: MemoryOutput) -> Self {
        let backend = BackendScript::default();
        let resolver = Arc::new(ScriptedResolver::default());
        let recorder = Arc::new(CountingRecorder::default());

        let script = backend.clone();
        let player = PlaybackController::new(
            config,
            resolver.clone(),
            recorder.clone(),
            device,
            move |ctx| Ok(MockBackend::new(script, ctx)),
        )
        .unwrap();
        let events = player.subscribe();

        Self {
            player,
            events,
            backend,
            resolver,
            recorder,
            output,
        }
    }

    /// Run background work and backend events to completion
    pub fn settle(&mut self) {
        assert!(
            self.player.wait_idle(Duration::from_secs(5)),
            "controller did not settle"
        );
    }

    /// Deliver a backend event and everything it triggers
    pub fn backend_event(&mut self, event: BackendEvent) {
        self.player.handle_backend_event(event);
        self.settle();
    }

    /// The current stream reaches its end
    pub fn finish(&mut self) {
        let load = self.backend.last_load();
        self.backend_event(BackendEvent::Finished(load));
    }

    /// The current stream fails while playing
    pub fn fail(&mut self, message: &str) {
        let load = self.backend.last_load();
        self.backend_event(BackendEvent::Error(load, message.to_string()));
    }

    pub fn drain_events(&self) -> Vec<PlayerEvent> {
        self.events.try_iter().collect()
    }

    pub fn current_id(&self) -> Option<String> {
        self.player.current_track().map(|t| t.id.to_string())
    }

    pub fn queue_ids(&self) -> Vec<String> {
        self.player
            .queue()
            .iter()
            .map(|t| t.id.to_string())
            .collect()
    }
}

pub fn test_config() -> PlaybackConfig {
    PlaybackConfig {
        skip_delay: Duration::from_millis(10),
        shuffle_seed: Some(42),
        ..PlaybackConfig::default()
    }
}

/// Playable track whose media id equals its id
pub fn track(id: &str) -> Arc<Track> {
    Arc::new(
        Track::new(id, format!("Track {id}"), "Test Artist")
            .with_media_id(MediaId::new(id))
            .with_duration(180),
    )
}

pub fn tracks(ids: &[&str]) -> Vec<Arc<Track>> {
    ids.iter().map(|id| track(id)).collect()
}

pub fn numbered_tracks(count: usize) -> Vec<Arc<Track>> {
    (0..count).map(|i| track(&format!("t{i}"))).collect()
}

pub fn error_messages(events: &[PlayerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            PlayerEvent::Error { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}
