//! Integration tests for the playback controller
//!
//! Drive the controller the way a UI does (commands plus pumping) against a
//! scripted backend and resolver, and check the resulting state, backend
//! calls and emitted events.

mod common;

use aria_audio::{pcm, EqualizerSettings, ANALYSIS_WINDOW};
use aria_core::Track;
use aria_playback::{
    BackendEvent, PlaybackConfig, PlaybackController, PlaybackError, PlayerEvent, PlayerStatus,
    RepeatMode,
};
use common::{error_messages, numbered_tracks, track, tracks, BrokenOutput, Harness, MemoryOutput};
use std::sync::Arc;
use std::time::Duration;

// ===== End To End =====

#[test]
fn test_queue_plays_through_and_stops_at_end() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b", "c"]), 0);
    h.settle();

    assert_eq!(h.backend.loads(), vec!["mock://a"]);
    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert_eq!(h.player.current_index(), Some(0));
    assert_eq!(h.player.status(), PlayerStatus::Playing);
    assert!(h.player.is_playing());

    let events = h.drain_events();
    assert!(events.contains(&PlayerEvent::QueueChanged { length: 3 }));
    assert!(events
        .iter()
        .any(|e| matches!(e, PlayerEvent::TrackChanged(Some(t)) if t.id.as_str() == "a")));
    assert!(events.contains(&PlayerEvent::StateChanged { playing: true }));

    h.finish();
    assert_eq!(h.current_id().as_deref(), Some("b"));
    assert_eq!(h.player.current_index(), Some(1));

    h.finish();
    assert_eq!(h.current_id().as_deref(), Some("c"));

    h.drain_events();
    h.finish();
    assert_eq!(h.backend.loads(), vec!["mock://a", "mock://b", "mock://c"]);
    assert!(h.player.current_track().is_none());
    assert_eq!(h.player.current_index(), None);
    assert_eq!(h.player.status(), PlayerStatus::Stopped);
    assert!(!h.player.is_playing());
    assert!(h.drain_events().contains(&PlayerEvent::TrackChanged(None)));

    assert_eq!(h.recorder.wait_for(3), vec!["a", "b", "c"]);
}

#[test]
fn test_play_after_end_restarts_from_first_entry() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b"]), 1);
    h.settle();
    h.finish();
    assert!(h.player.current_track().is_none());

    h.player.play();
    h.settle();
    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert_eq!(h.player.current_index(), Some(0));
}

#[test]
fn test_out_of_range_start_is_ignored() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b"]), 2);
    h.player.set_queue_and_play(Vec::new(), 0);
    h.settle();

    assert_eq!(h.player.queue_len(), 0);
    assert!(h.backend.loads().is_empty());
    assert_eq!(h.resolver.total_calls(), 0);
}

// ===== Retry =====

#[test]
fn test_resolution_retries_then_skips() {
    let mut h = Harness::new();
    h.resolver.fail_for("a");
    h.player.set_queue_and_play(tracks(&["a", "b"]), 0);
    h.settle();

    assert_eq!(h.resolver.calls_for("a"), 3);
    assert_eq!(h.backend.loads(), vec!["mock://b"]);
    assert_eq!(h.current_id().as_deref(), Some("b"));
    assert_eq!(h.player.current_index(), Some(1));
    assert_eq!(h.player.retry_count(), 0);

    let errors = error_messages(&h.drain_events());
    assert_eq!(errors, vec!["Playback failed after 2 attempts"]);
}

#[test]
fn test_resolution_retries_then_stops_single_track() {
    let mut h = Harness::new();
    h.resolver.fail_for("solo");
    h.player.set_queue_and_play(tracks(&["solo"]), 0);
    h.settle();

    assert_eq!(h.resolver.calls_for("solo"), 3);
    assert!(h.backend.loads().is_empty());
    assert!(h.player.current_track().is_none());
    assert_eq!(h.player.status(), PlayerStatus::Stopped);
    assert_eq!(
        error_messages(&h.drain_events()),
        vec!["Playback failed after 2 attempts"]
    );
}

#[test]
fn test_backend_load_failure_recovers_on_retry() {
    let mut h = Harness::new();
    h.backend.fail_next_loads(1);
    h.player.set_queue_and_play(tracks(&["a", "b"]), 0);
    h.settle();

    assert_eq!(h.resolver.calls_for("a"), 2);
    assert_eq!(h.backend.loads(), vec!["mock://a", "mock://a"]);
    assert_eq!(h.player.status(), PlayerStatus::Playing);
    assert_eq!(h.player.retry_count(), 1);
    assert!(error_messages(&h.drain_events()).is_empty());
}

#[test]
fn test_backend_errors_exhaust_retries() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b"]), 0);
    h.settle();

    h.fail("decoder crashed");
    assert_eq!(h.resolver.calls_for("a"), 2);
    h.fail("decoder crashed");
    assert_eq!(h.resolver.calls_for("a"), 3);
    h.fail("decoder crashed");

    assert_eq!(h.resolver.calls_for("a"), 3);
    assert_eq!(h.current_id().as_deref(), Some("b"));
}

#[test]
fn test_new_track_resets_retry_count() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b"]), 0);
    h.settle();
    h.fail("glitch");
    assert_eq!(h.player.retry_count(), 1);

    h.player.play_next();
    h.settle();
    assert_eq!(h.player.retry_count(), 0);
    assert_eq!(h.current_id().as_deref(), Some("b"));
}

#[test]
fn test_stop_discards_pending_resolution() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b"]), 0);
    h.player.stop();
    h.settle();

    assert!(h.backend.loads().is_empty());
    assert!(h.player.current_track().is_none());
    assert_eq!(h.player.current_index(), Some(0));
}

#[test]
fn test_stop_cancels_pending_skip() {
    let config = PlaybackConfig {
        skip_delay: Duration::from_secs(30),
        ..common::test_config()
    };
    let mut h = Harness::with_config(config);
    h.resolver.fail_for("a");
    h.player.set_queue_and_play(tracks(&["a", "b"]), 0);

    // Let the three resolutions fail; the skip is then waiting on its delay.
    for _ in 0..50 {
        h.player.pump_timeout(Duration::from_millis(10));
        if h.resolver.calls_for("a") == 3 && h.player.status() == PlayerStatus::Error {
            break;
        }
    }
    h.player.stop();
    h.settle();

    assert!(h.backend.loads().is_empty());
    assert_eq!(h.resolver.calls_for("b"), 0);
}

#[test]
fn test_stale_finish_after_stop_is_ignored() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b"]), 0);
    h.settle();
    h.player.stop();

    h.finish();
    assert!(h.player.current_track().is_none());
    assert_eq!(h.backend.loads(), vec!["mock://a"]);
}

#[test]
fn test_finish_from_previous_load_is_ignored() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b", "c"]), 0);
    h.settle();
    let previous = h.backend.last_load();

    h.player.play_next();
    h.settle();
    assert_eq!(h.current_id().as_deref(), Some("b"));
    assert_ne!(h.backend.last_load(), previous);

    // Queued by the backend for "a" before it saw the new load
    h.backend_event(BackendEvent::Finished(previous));
    assert_eq!(h.current_id().as_deref(), Some("b"));
    assert_eq!(h.player.current_index(), Some(1));
    assert_eq!(h.backend.loads(), vec!["mock://a", "mock://b"]);
    assert_eq!(h.player.status(), PlayerStatus::Playing);
}

#[test]
fn test_error_from_previous_load_does_not_retry() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b"]), 0);
    h.settle();
    let previous = h.backend.last_load();
    h.player.play_next();
    h.settle();

    h.backend_event(BackendEvent::Error(previous, "old decoder".to_string()));

    assert_eq!(h.player.retry_count(), 0);
    assert_eq!(h.resolver.calls_for("b"), 1);
    assert_eq!(h.player.status(), PlayerStatus::Playing);
    assert!(error_messages(&h.drain_events()).is_empty());
}

// ===== Invalid Tracks =====

#[test]
fn test_track_without_media_is_rejected() {
    let mut h = Harness::new();
    let broken = Arc::new(Track::new("x", "No Source", "Artist"));
    h.player.set_queue_and_play(vec![broken], 0);
    h.settle();

    assert!(h.player.current_track().is_none());
    assert_eq!(h.player.status(), PlayerStatus::Idle);
    assert_eq!(h.resolver.total_calls(), 0);
    assert_eq!(error_messages(&h.drain_events()), vec!["Invalid track"]);
}

#[test]
fn test_invalid_track_from_resolver_is_not_retried() {
    let mut h = Harness::new();
    h.resolver.reject("a");
    h.player.set_queue_and_play(tracks(&["a", "b"]), 0);
    h.settle();

    assert_eq!(h.resolver.calls_for("a"), 1);
    assert_eq!(h.resolver.calls_for("b"), 0);
    assert!(h.backend.loads().is_empty());
    assert_eq!(h.player.retry_count(), 0);
    assert_eq!(h.player.status(), PlayerStatus::Error);
    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert_eq!(error_messages(&h.drain_events()), vec!["Invalid track"]);
}

// ===== Repeat & Navigation =====

#[test]
fn test_repeat_one_replays_current() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b"]), 0);
    h.settle();
    h.player.toggle_repeat();
    assert_eq!(h.player.repeat_mode(), RepeatMode::One);

    h.finish();
    assert_eq!(h.backend.loads(), vec!["mock://a", "mock://a"]);
    assert_eq!(h.player.current_index(), Some(0));
    assert_eq!(h.recorder.wait_for(2), vec!["a", "a"]);
}

#[test]
fn test_repeat_all_wraps_both_ways() {
    let mut h = Harness::new();
    h.player.toggle_repeat();
    h.player.toggle_repeat();
    assert_eq!(h.player.repeat_mode(), RepeatMode::All);

    h.player.set_queue_and_play(tracks(&["a", "b", "c"]), 2);
    h.settle();
    h.finish();
    assert_eq!(h.player.current_index(), Some(0));
    assert_eq!(h.current_id().as_deref(), Some("a"));

    h.player.play_previous();
    h.settle();
    assert_eq!(h.player.current_index(), Some(2));
    assert_eq!(h.current_id().as_deref(), Some("c"));
}

#[test]
fn test_previous_clamps_without_repeat() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b"]), 0);
    h.settle();

    h.player.play_previous();
    h.settle();
    assert_eq!(h.player.current_index(), Some(0));
    assert_eq!(h.backend.loads(), vec!["mock://a", "mock://a"]);
}

#[test]
fn test_navigation_on_empty_queue_is_noop() {
    let mut h = Harness::new();
    h.player.play_next();
    h.player.play_previous();
    h.player.play();
    h.settle();

    assert_eq!(h.player.current_index(), None);
    assert_eq!(h.resolver.total_calls(), 0);
}

#[test]
fn test_pause_resume_and_toggle() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a"]), 0);
    h.settle();

    h.player.toggle_play_pause();
    h.settle();
    assert!(!h.player.is_playing());
    assert_eq!(h.player.status(), PlayerStatus::Paused);

    h.player.toggle_play_pause();
    h.settle();
    assert!(h.player.is_playing());
    assert_eq!(h.backend.log(|l| (l.pauses, l.resumes)), (1, 1));
    assert_eq!(h.backend.loads().len(), 1);
}

// ===== Queue Editing =====

#[test]
fn test_add_to_empty_queue_starts_playback() {
    let mut h = Harness::new();
    h.player.add_to_queue(track("first"));
    h.settle();
    assert_eq!(h.current_id().as_deref(), Some("first"));
    assert_eq!(h.player.current_index(), Some(0));

    h.player.add_to_queue(track("second"));
    h.settle();
    assert_eq!(h.current_id().as_deref(), Some("first"));
    assert_eq!(h.queue_ids(), vec!["first", "second"]);
}

#[test]
fn test_remove_before_current_shifts_index() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b", "c"]), 2);
    h.settle();

    h.player.remove_from_queue(0);
    assert_eq!(h.player.current_index(), Some(1));
    assert_eq!(h.current_id().as_deref(), Some("c"));

    h.player.remove_from_queue(9);
    assert_eq!(h.player.queue_len(), 2);
}

#[test]
fn test_remove_current_stops_without_autoplay() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b", "c"]), 2);
    h.settle();
    h.drain_events();

    h.player.remove_from_queue(2);
    h.settle();

    assert!(h.player.current_track().is_none());
    assert_eq!(h.player.current_index(), Some(1));
    assert_eq!(h.backend.loads(), vec!["mock://c"]);
    assert!(h.drain_events().contains(&PlayerEvent::TrackChanged(None)));

    h.player.play();
    h.settle();
    assert_eq!(h.current_id().as_deref(), Some("b"));
}

#[test]
fn test_remove_last_remaining_entry() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["only"]), 0);
    h.settle();

    h.player.remove_from_queue(0);
    assert_eq!(h.player.current_index(), None);
    assert_eq!(h.player.queue_len(), 0);
}

#[test]
fn test_moves_follow_current_entry() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b", "c"]), 1);
    h.settle();

    h.player.move_up(1);
    assert_eq!(h.queue_ids(), vec!["b", "a", "c"]);
    assert_eq!(h.player.current_index(), Some(0));

    h.player.move_down(0);
    h.player.move_down(1);
    assert_eq!(h.queue_ids(), vec!["a", "c", "b"]);
    assert_eq!(h.player.current_index(), Some(2));

    h.player.move_down(2);
    h.player.move_up(0);
    assert_eq!(h.queue_ids(), vec!["a", "c", "b"]);
    assert_eq!(h.current_id().as_deref(), Some("b"));
}

#[test]
fn test_out_of_range_moves_are_ignored() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b"]), 0);
    h.settle();
    h.drain_events();

    h.player.move_down(usize::MAX);
    h.player.move_up(usize::MAX);
    h.player.move_down(1);
    h.player.remove_from_queue(usize::MAX);

    assert_eq!(h.queue_ids(), vec!["a", "b"]);
    assert_eq!(h.player.current_index(), Some(0));
    assert!(h.drain_events().is_empty());
}

#[test]
fn test_clear_queue_stops() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b"]), 0);
    h.settle();

    h.player.clear_queue();
    h.settle();
    assert_eq!(h.player.queue_len(), 0);
    assert_eq!(h.player.current_index(), None);
    assert!(h.player.current_track().is_none());
    assert!(!h.player.is_playing());
}

// ===== Shuffle =====

#[test]
fn test_shuffle_keeps_current_and_restores_order() {
    let mut h = Harness::new();
    let queue = numbered_tracks(12);
    let original: Vec<String> = queue.iter().map(|t| t.id.to_string()).collect();
    h.player.set_queue_and_play(queue, 4);
    h.settle();

    h.player.toggle_shuffle();
    assert!(h.player.is_shuffle());
    let mut shuffled = h.queue_ids();
    let index = h.player.current_index().unwrap();
    assert_eq!(shuffled[index], "t4");
    shuffled.sort();
    let mut sorted = original.clone();
    sorted.sort();
    assert_eq!(shuffled, sorted);

    h.player.toggle_shuffle();
    assert_eq!(h.queue_ids(), original);
    assert_eq!(h.player.current_index(), Some(4));
    assert!(h
        .drain_events()
        .contains(&PlayerEvent::ModeChanged { shuffle: false, repeat: RepeatMode::Off }));
}

#[test]
fn test_shuffle_restores_order_after_unshuffled_moves() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a", "b", "c", "d"]), 0);
    h.settle();
    h.player.move_down(0);
    let before = h.queue_ids();

    h.player.toggle_shuffle();
    h.player.toggle_shuffle();
    assert_eq!(h.queue_ids(), before);
}

#[test]
fn test_set_queue_while_shuffled_plays_chosen_track() {
    let mut h = Harness::new();
    h.player.toggle_shuffle();
    h.player.set_queue_and_play(numbered_tracks(8), 5);
    h.settle();

    let index = h.player.current_index().unwrap();
    assert_eq!(h.queue_ids()[index], "t5");
    assert_eq!(h.current_id().as_deref(), Some("t5"));
}

#[test]
fn test_shuffled_next_stays_in_queue() {
    let mut h = Harness::new();
    h.player.toggle_shuffle();
    h.player.set_queue_and_play(numbered_tracks(5), 0);
    h.settle();

    for _ in 0..10 {
        h.player.play_next();
        h.settle();
        let index = h.player.current_index().unwrap();
        assert!(index < 5);
        assert_eq!(h.player.current_track().unwrap().id.as_str(), h.queue_ids()[index]);
    }
}

// ===== Seek, Volume, Equalizer =====

#[test]
fn test_seek_only_when_loaded() {
    let mut h = Harness::new();
    h.player.seek_to(30);
    assert!(h.backend.log(|l| l.seeks.is_empty()));

    h.player.set_queue_and_play(tracks(&["a"]), 0);
    h.settle();
    h.player.seek_to(30);
    assert_eq!(h.backend.log(|l| l.seeks.clone()), vec![Duration::from_secs(30)]);
}

#[test]
fn test_volume_is_clamped() {
    let mut h = Harness::new();
    assert_eq!(h.player.volume(), 80);

    h.player.set_volume(150);
    assert_eq!(h.player.volume(), 100);
    assert_eq!(h.backend.log(|l| l.volumes.clone()), vec![80, 100]);
}

#[test]
fn test_equalizer_reapplied_on_new_stream() {
    let mut h = Harness::new();
    h.player.equalizer_mut().load_preset("rock").unwrap();
    h.player.equalizer_mut().set_enabled(true);
    let rock = h.player.equalizer().settings();

    h.player.set_queue_and_play(tracks(&["a"]), 0);
    h.settle();

    let applied = h.backend.log(|l| l.equalizer.clone());
    assert_eq!(applied.last(), Some(&Some(rock)));
    assert!(applied.len() >= 2);

    h.player.equalizer_mut().set_enabled(false);
    assert_eq!(h.backend.log(|l| l.equalizer.last().copied()), Some(None));
}

#[test]
fn test_disabled_equalizer_not_applied() {
    let mut h = Harness::new();
    h.player.equalizer_mut().set_preamp(6.0);
    h.player.set_queue_and_play(tracks(&["a"]), 0);
    h.settle();

    assert!(h.backend.log(|l| l.equalizer.is_empty()));
    assert_eq!(h.player.equalizer().settings().preamp, 6.0);
    assert_ne!(h.player.equalizer().settings(), EqualizerSettings::FLAT);
}

// ===== Time =====

#[test]
fn test_time_events_on_whole_second_change() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a"]), 0);
    h.settle();
    h.drain_events();

    for millis in [200, 700, 1100, 1900, 2050] {
        h.player
            .handle_backend_event(BackendEvent::TimeChanged(Duration::from_millis(millis)));
    }

    let seconds: Vec<u64> = h
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            PlayerEvent::TimeChanged { seconds } => Some(seconds),
            _ => None,
        })
        .collect();
    assert_eq!(seconds, vec![1, 2]);
    assert_eq!(h.player.position_secs(), 2);
}

// ===== Audio Path =====

#[test]
fn test_pcm_reaches_output_and_visualizer() {
    let mut h = Harness::new();
    let frames = h.player.subscribe_visualization();
    h.player.set_queue_and_play(tracks(&["a"]), 0);
    h.settle();

    let samples = vec![0.25f32; ANALYSIS_WINDOW * 2];
    let mut bytes = Vec::new();
    pcm::encode_s16(&samples, &mut bytes);
    h.backend.feed_pcm(&bytes);

    assert_eq!(h.output.written.lock().unwrap().len(), bytes.len());
    let frame = frames.try_recv().unwrap();
    assert!(!frame.is_silent());

    h.player.set_visualizer_enabled(false);
    let cleared = frames.try_recv().unwrap();
    assert!(cleared.is_silent());

    h.backend.feed_pcm(&bytes);
    assert!(frames.try_recv().is_err());
}

#[test]
fn test_output_fault_surfaces_as_error_event() {
    let mut h = Harness::with_output(Box::new(BrokenOutput));
    h.player.set_queue_and_play(tracks(&["a"]), 0);
    h.settle();
    h.drain_events();

    h.backend.feed_pcm(&[0u8; 64]);
    h.backend.feed_pcm(&[0u8; 64]);
    h.player.pump();

    let errors = error_messages(&h.drain_events());
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("device unplugged"));
}

// ===== Lifecycle =====

#[test]
fn test_shutdown_is_idempotent() {
    let mut h = Harness::new();
    h.player.set_queue_and_play(tracks(&["a"]), 0);
    h.settle();

    h.player.shutdown();
    h.player.shutdown();
    assert!(h.player.is_shut_down());
    assert_eq!(h.backend.log(|l| l.releases), 1);

    // Router is closed: nothing reaches the output any more.
    let written = h.output.written.lock().unwrap().len();
    h.backend.feed_pcm(&[0u8; 256]);
    assert_eq!(h.output.written.lock().unwrap().len(), written);

    h.player.play_next();
    h.settle();
    assert_eq!(h.backend.loads().len(), 1);

    let backend = h.backend.clone();
    drop(h);
    assert_eq!(backend.log(|l| l.releases), 1);
}

#[test]
fn test_drop_releases_backend() {
    let h = Harness::new();
    let backend = h.backend.clone();
    drop(h);
    assert_eq!(backend.log(|l| l.releases), 1);
}

#[test]
fn test_factory_failure_is_device_unavailable() {
    let result = PlaybackController::new(
        PlaybackConfig::default(),
        Arc::new(common::ScriptedResolver::default()),
        Arc::new(aria_core::NoopRecorder),
        Box::new(MemoryOutput::default()),
        |_ctx| -> aria_core::Result<common::MockBackend> {
            Err(aria_core::AriaError::device_unavailable("no sound card"))
        },
    );

    match result {
        Err(PlaybackError::DeviceUnavailable(message)) => assert!(message.contains("no sound card")),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("expected failure"),
    }
}
