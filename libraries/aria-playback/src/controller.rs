//! Playback controller
//!
//! Owns the queue and transport state and is driven from a single (UI)
//! context through `&mut self`. Everything that happens elsewhere (backend
//! lifecycle, stream resolution, retry delays, audio callback faults) comes
//! back as a message and is applied by [`PlaybackController::pump`].

use crate::backend::{BackendContext, BackendEvent, LoadId, PlaybackBackend};
use crate::error::{PlaybackError, Result};
use crate::events::PlayerEvent;
use crate::queue::Queue;
use crate::shuffle;
use crate::types::{PlaybackConfig, PlayerStatus, RepeatMode};
use crate::worker::{DelayedAction, Generation, Job, Reply, Worker};
use aria_audio::{
    AudioCallbackRouter, AudioError, Equalizer, EqualizerTarget, OutputDevice, RouterGate,
    VisualizationFrame, Visualizer,
};
use aria_core::{AriaError, EventBus, MediaId, PlayRecorder, StreamResolver, StreamSource, Track};
use crossbeam_channel::{bounded, unbounded, Receiver, Select};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pending audio faults beyond this are dropped by the router
const FAULT_CAPACITY: usize = 32;

/// Poll slice used while waiting for background work to settle
const SETTLE_SLICE: Duration = Duration::from_millis(10);

/// Queue, transport and retry state machine
pub struct PlaybackController {
    config: PlaybackConfig,

    queue: Queue,
    current: Option<Arc<Track>>,
    current_index: Option<usize>,
    playing: bool,
    status: PlayerStatus,
    repeat: RepeatMode,
    shuffle: bool,
    retry_count: u32,
    volume: u8,
    position_secs: u64,
    /// Backend holds a source for the current track
    loaded: bool,
    /// Token of the most recent `load_and_play`
    load_id: LoadId,
    rng: StdRng,

    /// Bumped whenever pending background results stop being relevant
    generation: Generation,
    /// Submitted jobs whose reply has not been handled yet
    in_flight: usize,

    backend: Arc<dyn PlaybackBackend>,
    backend_events: Receiver<BackendEvent>,
    worker: Worker,
    faults: Receiver<AudioError>,
    gate: RouterGate,
    equalizer: Equalizer,
    visualizer: Visualizer,
    events: EventBus<PlayerEvent>,
    shut_down: bool,
}

impl PlaybackController {
    /// Build the engine around a backend
    ///
    /// `output` receives every PCM chunk the backend renders. The backend is
    /// constructed by `factory` from the event channel and the callback
    /// router; a factory failure means no usable audio device.
    pub fn new<B, F>(
        config: PlaybackConfig,
        resolver: Arc<dyn StreamResolver>,
        recorder: Arc<dyn PlayRecorder>,
        output: Box<dyn OutputDevice>,
        factory: F,
    ) -> Result<Self>
    where
        B: PlaybackBackend + 'static,
        F: FnOnce(BackendContext) -> aria_core::Result<B>,
    {
        let visualizer = Visualizer::new(config.visualizer_enabled, config.event_capacity);
        let (fault_tx, faults) = bounded(FAULT_CAPACITY);
        let (sink, gate) = AudioCallbackRouter::new(output, visualizer.analyzer(), fault_tx);
        let (event_tx, backend_events) = unbounded();

        let backend = factory(BackendContext {
            events: event_tx,
            sink,
        })
        .map_err(|e| PlaybackError::DeviceUnavailable(e.to_string()))?;
        let backend = Arc::new(backend);
        let target: Arc<dyn EqualizerTarget> = backend.clone();
        let backend: Arc<dyn PlaybackBackend> = backend;

        let volume = config.initial_volume.min(100);
        backend.set_volume(volume);

        let worker = match Worker::spawn(resolver, recorder) {
            Ok(worker) => worker,
            Err(e) => {
                backend.release();
                return Err(e);
            }
        };

        let rng = config
            .shuffle_seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        tracing::info!(
            max_retries = config.max_retries,
            volume,
            "Playback engine started"
        );

        Ok(Self {
            events: EventBus::new(config.event_capacity),
            config,
            queue: Queue::new(),
            current: None,
            current_index: None,
            playing: false,
            status: PlayerStatus::Idle,
            repeat: RepeatMode::Off,
            shuffle: false,
            retry_count: 0,
            volume,
            position_secs: 0,
            loaded: false,
            load_id: 0,
            rng,
            generation: 0,
            in_flight: 0,
            backend,
            backend_events,
            worker,
            faults,
            gate,
            equalizer: Equalizer::new(target),
            visualizer,
            shut_down: false,
        })
    }

    /// Receive player events
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    /// Receive visualization frames
    pub fn subscribe_visualization(&self) -> Receiver<Arc<VisualizationFrame>> {
        self.visualizer.subscribe()
    }

    // ===== Queue Management =====

    /// Replace the queue and start playing `tracks[start_index]`
    pub fn set_queue_and_play(&mut self, tracks: Vec<Arc<Track>>, start_index: usize) {
        let Some(start) = tracks.get(start_index).cloned() else {
            tracing::debug!(
                len = tracks.len(),
                start_index,
                "Ignoring queue with no start track"
            );
            return;
        };

        self.queue.replace(tracks);
        let index = if self.shuffle {
            self.queue.shuffle(&mut self.rng);
            self.queue.position_of(&start).unwrap_or(0)
        } else {
            start_index
        };

        self.current_index = Some(index);
        self.emit_queue_changed();
        self.play_track(start);
    }

    /// Append a track; starts playback if the queue was empty
    pub fn add_to_queue(&mut self, track: Arc<Track>) {
        self.queue.push(Arc::clone(&track));
        self.emit_queue_changed();

        if self.queue.len() == 1 {
            self.current_index = Some(0);
            self.play_track(track);
        }
    }

    /// Remove the entry at `index`
    ///
    /// Removing the current entry stops playback and leaves the index on
    /// the entry that slid into its place.
    pub fn remove_from_queue(&mut self, index: usize) {
        if self.queue.remove(index).is_none() {
            tracing::debug!(index, len = self.queue.len(), "Remove index out of range");
            return;
        }

        match self.current_index {
            Some(current) if index < current => self.current_index = Some(current - 1),
            Some(current) if index == current => {
                self.stop();
                self.current_index = if self.queue.is_empty() {
                    None
                } else {
                    Some(current.min(self.queue.len() - 1))
                };
            }
            _ => {}
        }

        self.emit_queue_changed();
    }

    pub fn move_up(&mut self, index: usize) {
        if index > 0 {
            self.swap(index, index - 1);
        }
    }

    pub fn move_down(&mut self, index: usize) {
        if index < self.queue.len().saturating_sub(1) {
            self.swap(index, index + 1);
        }
    }

    /// Swap two entries, keeping the index on the same logical entry
    pub fn swap(&mut self, a: usize, b: usize) {
        if a == b || !self.queue.swap(a, b) {
            return;
        }

        if self.current_index == Some(a) {
            self.current_index = Some(b);
        } else if self.current_index == Some(b) {
            self.current_index = Some(a);
        }
        self.emit_queue_changed();
    }

    /// Stop playback and empty the queue
    pub fn clear_queue(&mut self) {
        self.stop();
        self.queue.clear();
        self.current_index = None;
        self.emit_queue_changed();
    }

    /// Snapshot of the active order
    pub fn queue(&self) -> Vec<Arc<Track>> {
        self.queue.tracks().to_vec()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    // ===== Playback Control =====

    /// Resume the current track, or start the entry at the current index
    pub fn play(&mut self) {
        if self.current.is_some() {
            if self.loaded {
                self.backend.resume();
            }
            return;
        }

        let index = self.current_index.unwrap_or(0);
        if let Some(track) = self.queue.get(index).cloned() {
            self.current_index = Some(index);
            self.play_track(track);
        }
    }

    pub fn pause(&mut self) {
        if self.loaded {
            self.backend.pause();
        }
    }

    pub fn toggle_play_pause(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Stop the backend and clear the current track
    ///
    /// Pending resolutions and skip timers are abandoned. The queue index
    /// is kept, so `play()` starts that entry again.
    pub fn stop(&mut self) {
        self.advance_generation();
        self.retry_count = 0;
        self.backend.stop();
        self.loaded = false;
        self.position_secs = 0;
        self.set_status(PlayerStatus::Stopped);

        if self.current.take().is_some() {
            tracing::debug!("Playback stopped");
            self.emit(PlayerEvent::TrackChanged(None));
        }
    }

    pub fn play_next(&mut self) {
        let len = self.queue.len();
        if len == 0 {
            tracing::debug!("Queue is empty");
            return;
        }

        let next = if self.shuffle {
            shuffle::random_index(len, &mut self.rng)
        } else {
            match self.current_index {
                None => Some(0),
                Some(i) if i + 1 < len => Some(i + 1),
                Some(_) if self.repeat == RepeatMode::All => Some(0),
                Some(_) => None,
            }
        };

        match next.and_then(|i| self.queue.get(i).cloned().map(|t| (i, t))) {
            Some((index, track)) => {
                self.current_index = Some(index);
                self.play_track(track);
            }
            None => {
                tracing::debug!("Reached end of queue");
                self.stop();
                self.current_index = None;
            }
        }
    }

    pub fn play_previous(&mut self) {
        let len = self.queue.len();
        if len == 0 {
            tracing::debug!("Queue is empty");
            return;
        }

        let index = match self.current_index {
            Some(i) if i > 0 => i - 1,
            _ if self.repeat == RepeatMode::All => len - 1,
            _ => 0,
        };

        if let Some(track) = self.queue.get(index).cloned() {
            self.current_index = Some(index);
            self.play_track(track);
        }
    }

    // ===== Shuffle & Repeat =====

    /// Shuffle the active order, or restore the original one
    pub fn toggle_shuffle(&mut self) {
        let anchor = self
            .current
            .clone()
            .or_else(|| self.current_index.and_then(|i| self.queue.get(i).cloned()));

        self.shuffle = !self.shuffle;
        if self.shuffle {
            self.queue.shuffle(&mut self.rng);
        } else {
            self.queue.restore_original_order();
        }

        if let Some(anchor) = anchor {
            self.current_index = self.queue.position_of(&anchor).or(self.current_index);
        }

        tracing::debug!(shuffle = self.shuffle, "Shuffle toggled");
        self.emit_mode_changed();
    }

    /// Off → One → All → Off
    pub fn toggle_repeat(&mut self) {
        self.repeat = self.repeat.cycled();
        tracing::debug!(repeat = ?self.repeat, "Repeat mode changed");
        self.emit_mode_changed();
    }

    // ===== Seek & Volume =====

    pub fn seek_to(&mut self, seconds: u64) {
        if !self.loaded {
            return;
        }
        self.backend.seek(Duration::from_secs(seconds));
    }

    /// Set volume, clamped to 0-100
    pub fn set_volume(&mut self, level: u8) {
        self.volume = level.min(100);
        self.backend.set_volume(self.volume);
    }

    // ===== Equalizer & Visualization =====

    pub fn equalizer(&self) -> &Equalizer {
        &self.equalizer
    }

    /// Changes apply to the backend immediately while enabled
    pub fn equalizer_mut(&mut self) -> &mut Equalizer {
        &mut self.equalizer
    }

    pub fn set_visualizer_enabled(&self, enabled: bool) {
        self.visualizer.set_enabled(enabled);
    }

    pub fn is_visualizer_enabled(&self) -> bool {
        self.visualizer.is_enabled()
    }

    // ===== State Queries =====

    pub fn current_track(&self) -> Option<Arc<Track>> {
        self.current.clone()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    pub fn is_shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn position_secs(&self) -> u64 {
        self.position_secs
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    // ===== Event Loop =====

    /// Apply every pending backend event, worker reply and audio fault
    ///
    /// Returns how many messages were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;

        while let Ok(event) = self.backend_events.try_recv() {
            self.handle_backend_event(event);
            handled += 1;
        }
        while let Ok(reply) = self.worker.replies().try_recv() {
            self.handle_reply(reply);
            handled += 1;
        }
        while let Ok(fault) = self.faults.try_recv() {
            self.handle_audio_fault(fault);
            handled += 1;
        }

        handled
    }

    /// Wait up to `timeout` for a message, then pump
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        {
            let mut select = Select::new();
            select.recv(&self.backend_events);
            select.recv(self.worker.replies());
            select.recv(&self.faults);
            // Timing out just means there is nothing to pump.
            let _ = select.ready_timeout(timeout);
        }
        self.pump()
    }

    /// Pump until no background job is outstanding and nothing is pending
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let handled = self.pump();
            if handled == 0 && self.in_flight == 0 {
                return true;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.pump_timeout(remaining.min(SETTLE_SLICE));
        }
    }

    /// Apply one backend lifecycle event
    pub fn handle_backend_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Playing => {
                self.set_playing(true);
                self.set_status(PlayerStatus::Playing);
            }
            BackendEvent::Paused => {
                self.set_playing(false);
                if self.loaded {
                    self.set_status(PlayerStatus::Paused);
                }
            }
            BackendEvent::Stopped => {
                self.set_playing(false);
                if matches!(self.status, PlayerStatus::Playing | PlayerStatus::Paused) {
                    self.set_status(PlayerStatus::Stopped);
                }
            }
            BackendEvent::Finished(load) => {
                if self.is_current_load(load) {
                    self.set_playing(false);
                    self.handle_track_finished();
                } else {
                    tracing::trace!(load, current = self.load_id, "Ignoring stale finish");
                }
            }
            BackendEvent::Error(load, message) => {
                if self.is_current_load(load) {
                    self.set_playing(false);
                    tracing::warn!(error = %message, "Backend playback error");
                    self.handle_failure(&message);
                } else {
                    tracing::trace!(load, current = self.load_id, "Ignoring stale backend error");
                }
            }
            BackendEvent::TimeChanged(position) => {
                let seconds = position.as_secs();
                if seconds != self.position_secs {
                    self.position_secs = seconds;
                    self.emit(PlayerEvent::TimeChanged { seconds });
                }
            }
        }
    }

    // ===== Shutdown =====

    /// Stop the backend, release it and stop the worker
    ///
    /// Safe to call more than once; also runs on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        tracing::info!("Shutting down playback engine");
        self.advance_generation();
        self.gate.close();
        self.backend.stop();
        self.backend.release();
        self.worker.shutdown();
        self.loaded = false;
        self.playing = false;
        self.in_flight = 0;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // ===== Internals =====

    fn play_track(&mut self, track: Arc<Track>) {
        if self.shut_down {
            return;
        }

        let Some(media_id) = track.playable_media().cloned() else {
            tracing::warn!(track_id = %track.id, "Track has no playable media");
            self.emit(PlayerEvent::error("Invalid track"));
            return;
        };

        self.retry_count = 0;
        self.advance_generation();
        if self.loaded || self.playing {
            self.backend.stop();
        }
        self.loaded = false;
        self.position_secs = 0;
        self.current = Some(Arc::clone(&track));
        self.set_status(PlayerStatus::Loading);

        tracing::info!(track = %track.display_name(), index = ?self.current_index, "Loading track");
        self.emit(PlayerEvent::TrackChanged(Some(Arc::clone(&track))));

        if let Err(e) = self.worker.submit(Job::RecordPlay {
            track_id: track.id.clone(),
        }) {
            tracing::warn!(error = %e, "Could not queue play history write");
        }
        self.request_stream(media_id);
    }

    fn request_stream(&mut self, media_id: MediaId) {
        let job = Job::Resolve {
            generation: self.generation,
            media_id,
        };
        match self.worker.submit(job) {
            Ok(true) => self.in_flight += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::error!(error = %e, "Cannot resolve stream");
                self.set_status(PlayerStatus::Error);
                self.emit(PlayerEvent::error(e.to_string()));
            }
        }
    }

    fn handle_reply(&mut self, reply: Reply) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if reply.generation() != self.generation {
            tracing::trace!(generation = reply.generation(), "Discarding stale worker reply");
            return;
        }

        match reply {
            Reply::Resolved {
                result: Ok(source), ..
            } => self.start_source(&source),
            Reply::Resolved { result: Err(e), .. } if !e.is_retryable() => self.reject_track(&e),
            Reply::Resolved { result: Err(e), .. } => {
                tracing::warn!(error = %e, "Stream resolution failed");
                self.handle_failure(&e.to_string());
            }
            Reply::Elapsed {
                action: DelayedAction::SkipNext,
                ..
            } => self.play_next(),
            Reply::Cancelled { .. } => {}
        }
    }

    fn start_source(&mut self, source: &StreamSource) {
        if self.current.is_none() {
            return;
        }

        if source.is_expired_at(chrono::Utc::now()) {
            tracing::warn!(url = source.log_label(), "Resolved stream already expired");
            self.handle_failure("stream URL expired");
            return;
        }

        self.load_id = self.load_id.wrapping_add(1);
        tracing::debug!(url = source.log_label(), load = self.load_id, "Starting stream");
        match self.backend.load_and_play(self.load_id, source) {
            Ok(()) => {
                self.loaded = true;
                self.equalizer.reapply();
            }
            Err(e) if !e.is_retryable() => self.reject_track(&e),
            Err(e) => {
                tracing::warn!(error = %e, "Backend failed to load stream");
                self.handle_failure(&e.to_string());
            }
        }
    }

    /// Events from a superseded load, or from before the last stop, are stale
    fn is_current_load(&self, load: LoadId) -> bool {
        self.loaded && load == self.load_id
    }

    /// Give up on the current track without retrying
    fn reject_track(&mut self, error: &AriaError) {
        tracing::warn!(error = %error, "Track cannot be played");
        self.loaded = false;
        self.retry_count = 0;
        self.set_status(PlayerStatus::Error);
        let message = match error {
            AriaError::InvalidTrack(_) => "Invalid track".to_string(),
            other => other.to_string(),
        };
        self.emit(PlayerEvent::error(message));
    }

    /// Retry the current track or give up on it
    fn handle_failure(&mut self, reason: &str) {
        let Some(track) = self.current.clone() else {
            return;
        };
        self.loaded = false;
        self.set_status(PlayerStatus::Error);

        if self.retry_count >= self.config.max_retries {
            tracing::error!(
                track = %track.display_name(),
                attempts = self.config.max_retries,
                reason,
                "Giving up on track"
            );
            self.retry_count = 0;
            self.emit(PlayerEvent::error(format!(
                "Playback failed after {} attempts",
                self.config.max_retries
            )));

            if self.queue.len() > 1 {
                self.schedule(DelayedAction::SkipNext);
            } else {
                self.stop();
            }
            return;
        }

        self.retry_count += 1;
        tracing::warn!(
            attempt = self.retry_count,
            max = self.config.max_retries,
            reason,
            "Retrying playback"
        );
        if let Some(media_id) = track.playable_media().cloned() {
            self.request_stream(media_id);
        }
    }

    fn handle_track_finished(&mut self) {
        self.loaded = false;
        match (self.repeat, self.current.clone()) {
            (RepeatMode::One, Some(track)) => self.play_track(track),
            _ => self.play_next(),
        }
    }

    fn handle_audio_fault(&mut self, fault: AudioError) {
        tracing::error!(error = %fault, "Audio pipeline fault");
        self.emit(PlayerEvent::error(fault.to_string()));
    }

    fn schedule(&mut self, action: DelayedAction) {
        let job = Job::Delay {
            generation: self.generation,
            after: self.config.skip_delay,
            action,
        };
        match self.worker.submit(job) {
            Ok(true) => self.in_flight += 1,
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, "Cannot schedule delayed action"),
        }
    }

    fn advance_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.worker.set_generation(self.generation);
    }

    fn set_playing(&mut self, playing: bool) {
        if self.playing != playing {
            self.playing = playing;
            self.emit(PlayerEvent::StateChanged { playing });
        }
    }

    fn set_status(&mut self, status: PlayerStatus) {
        if self.status != status {
            tracing::debug!(from = ?self.status, to = ?status, "Status changed");
            self.status = status;
        }
    }

    fn emit(&self, event: PlayerEvent) {
        self.events.publish(event);
    }

    fn emit_queue_changed(&self) {
        self.emit(PlayerEvent::QueueChanged {
            length: self.queue.len(),
        });
    }

    fn emit_mode_changed(&self) {
        self.emit(PlayerEvent::ModeChanged {
            shuffle: self.shuffle,
            repeat: self.repeat,
        });
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
