//! Transport controller tests: navigation, auto-advance and control state

mod common;

use common::{engine, library, track_path, CountingFactory, ManualDevice};
use osuradio_playback::{
    EngineState, PlaybackConfig, PlaybackError, PlaybackEvent, PlaylistNavigator, RepeatMode,
    TransportController,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn transport(tracks: usize, frames: usize) -> (TransportController, ManualDevice) {
    transport_with(CountingFactory::new(frames), tracks, PlaybackConfig::default())
}

fn transport_with(
    factory: CountingFactory,
    tracks: usize,
    config: PlaybackConfig,
) -> (TransportController, ManualDevice) {
    let (engine, device) = engine(factory);
    let navigator = PlaylistNavigator::with_rng(tracks, StdRng::seed_from_u64(42));
    (
        TransportController::with_navigator(library(tracks), engine, navigator, &config),
        device,
    )
}

/// Run the current track to its end and let the transport react
fn finish_track(transport: &mut TransportController, device: &ManualDevice) {
    device.pump_many(10_000, 3);
    transport.poll().unwrap();
}

#[test]
fn play_index_starts_track_and_emits_event() {
    let (mut t, _device) = transport(3, 5000);
    t.play_index(1).unwrap();

    let status = t.status();
    assert_eq!(status.index, Some(1));
    assert_eq!(status.state, EngineState::Playing);
    assert!(status.controls_enabled);
    assert_eq!(
        t.drain_events(),
        vec![PlaybackEvent::TrackStarted {
            index: 1,
            duration_ms: 5000.0
        }]
    );
    assert_eq!(t.current_track().unwrap().display_text, "Artist 1 - Song 1");
}

#[test]
fn play_index_out_of_range_changes_nothing() {
    let (mut t, _device) = transport(3, 5000);
    assert!(matches!(
        t.play_index(3),
        Err(PlaybackError::IndexOutOfBounds(3))
    ));
    assert_eq!(t.status().index, None);
    assert!(t.drain_events().is_empty());
}

#[test]
fn toggle_with_nothing_loaded_plays_selected_row() {
    let (mut t, _device) = transport(4, 5000);
    t.select(2).unwrap();
    t.toggle_play_pause().unwrap();
    assert_eq!(t.status().index, Some(2));

    t.toggle_play_pause().unwrap();
    assert_eq!(t.status().state, EngineState::Paused);
}

#[test]
fn toggle_with_no_selection_plays_first_row() {
    let (mut t, _device) = transport(4, 5000);
    t.toggle_play_pause().unwrap();
    assert_eq!(t.status().index, Some(0));
}

#[test]
fn toggle_on_empty_library_fails() {
    let (mut t, _device) = transport(0, 5000);
    assert!(matches!(
        t.toggle_play_pause(),
        Err(PlaybackError::EmptyLibrary)
    ));
}

#[test]
fn natural_end_advances_sequentially() {
    let (mut t, device) = transport(3, 1000);
    t.play_index(0).unwrap();
    t.drain_events();

    finish_track(&mut t, &device);
    assert_eq!(t.status().index, Some(1));
    assert_eq!(
        t.drain_events(),
        vec![
            PlaybackEvent::PlaybackFinished { index: 0 },
            PlaybackEvent::TrackStarted {
                index: 1,
                duration_ms: 1000.0
            },
        ]
    );
}

#[test]
fn running_off_the_end_stops_and_disables_controls() {
    let (mut t, device) = transport(2, 1000);
    t.play_index(1).unwrap();
    t.set_shuffle(false);
    t.drain_events();

    finish_track(&mut t, &device);
    let status = t.status();
    assert_eq!(status.state, EngineState::Idle);
    assert!(!status.controls_enabled);
    assert_eq!(
        t.drain_events(),
        vec![
            PlaybackEvent::PlaybackFinished { index: 1 },
            PlaybackEvent::Stopped
        ]
    );
}

#[test]
fn repeat_one_reopens_same_track_without_touching_navigation() {
    let factory = CountingFactory::new(1000);
    let counters = factory.counters();
    let (mut t, device) = transport_with(factory, 5, PlaybackConfig::default());
    t.set_shuffle(true);
    t.play_index(2).unwrap();
    t.set_repeat(RepeatMode::One);

    let queue = t.navigator().queue().clone();
    let history = t.navigator().history().to_vec();

    finish_track(&mut t, &device);
    assert_eq!(t.status().index, Some(2));
    assert_eq!(t.status().position_ms, 0.0);
    assert_eq!(t.navigator().queue(), &queue);
    assert_eq!(t.navigator().history(), history.as_slice());
    assert_eq!(counters.opens(), 2);
    assert_eq!(counters.live(), 1);
}

#[test]
fn previous_after_threshold_restarts_current_track() {
    let (mut t, device) = transport(3, 10_000);
    t.play_index(1).unwrap();
    device.pump(3500);

    t.previous().unwrap();
    assert_eq!(t.status().index, Some(1));
    assert_eq!(t.status().position_ms, 0.0);
}

#[test]
fn previous_before_threshold_navigates_back() {
    let (mut t, device) = transport(3, 10_000);
    t.play_index(1).unwrap();
    device.pump(2500);

    t.previous().unwrap();
    assert_eq!(t.status().index, Some(0));
}

#[test]
fn previous_exactly_at_threshold_navigates_back() {
    let (mut t, device) = transport(3, 10_000);
    t.play_index(2).unwrap();
    device.pump(3000);

    t.previous().unwrap();
    assert_eq!(t.status().index, Some(1));
}

#[test]
fn next_and_previous_without_current_are_noops() {
    let (mut t, _device) = transport(3, 1000);
    t.next().unwrap();
    t.previous().unwrap();
    assert_eq!(t.status().index, None);
    assert!(t.drain_events().is_empty());
}

#[test]
fn shuffle_plays_every_track_once_then_stops() {
    let (mut t, device) = transport(5, 500);
    t.set_shuffle(true);
    t.play_index(3).unwrap();

    let mut played = vec![3];
    for _ in 0..4 {
        finish_track(&mut t, &device);
        played.push(t.status().index.unwrap());
    }
    played.sort_unstable();
    assert_eq!(played, vec![0, 1, 2, 3, 4]);

    finish_track(&mut t, &device);
    assert_eq!(t.status().state, EngineState::Idle);
    assert!(!t.status().shuffle);
}

#[test]
fn shuffle_previous_walks_history_back() {
    let (mut t, _device) = transport(5, 10_000);
    t.set_shuffle(true);
    t.play_index(0).unwrap();
    t.next().unwrap();
    let second = t.status().index.unwrap();
    assert_ne!(second, 0);

    t.previous().unwrap();
    assert_eq!(t.status().index, Some(0));
    assert_eq!(t.navigator().queue().front(), Some(&second));
}

#[test]
fn failed_start_disables_controls_and_reports() {
    let factory = CountingFactory::new(1000).failing(track_path(1));
    let (mut t, _device) = transport_with(factory, 3, PlaybackConfig::default());
    t.play_index(0).unwrap();
    t.set_repeat(RepeatMode::One);
    t.drain_events();

    let err = t.play_index(1);
    assert!(matches!(err, Err(PlaybackError::Decode(_))));

    let status = t.status();
    assert_eq!(status.state, EngineState::Idle);
    assert!(!status.controls_enabled);
    assert_eq!(status.repeat, RepeatMode::Off);
    assert!(matches!(
        t.drain_events().as_slice(),
        [PlaybackEvent::StartFailed { index: 1, .. }]
    ));
}

#[test]
fn stop_resets_modes() {
    let (mut t, _device) = transport(3, 1000);
    t.play_index(0).unwrap();
    t.set_shuffle(true);
    t.toggle_repeat();
    assert_eq!(t.status().repeat, RepeatMode::One);

    t.stop();
    let status = t.status();
    assert!(!status.shuffle);
    assert_eq!(status.repeat, RepeatMode::Off);
    assert!(t.navigator().history().is_empty());
    assert_eq!(t.drain_events().last(), Some(&PlaybackEvent::Stopped));
}

#[test]
fn double_time_toggle_keeps_track_and_position() {
    let (mut t, device) = transport(2, 60_000);
    t.play_index(0).unwrap();
    device.pump(6000);

    t.toggle_double_time().unwrap();
    let status = t.status();
    assert!(status.double_time);
    assert_eq!(status.index, Some(0));
    assert_eq!(status.position_ms, 6000.0);
    assert_eq!(status.duration_ms, 40_000.0);
    assert_eq!(device.spec().unwrap().sample_rate, 1500);
}

#[test]
fn config_is_applied_at_construction() {
    let config = PlaybackConfig {
        volume: 0.3,
        muted: true,
        repeat: RepeatMode::One,
        double_time: true,
        ..PlaybackConfig::default()
    };
    let (t, _device) = transport_with(CountingFactory::new(1000), 3, config);

    let status = t.status();
    assert_eq!(status.volume, 0.3);
    assert!(status.muted);
    assert!(status.double_time);
    assert_eq!(status.repeat, RepeatMode::One);
    assert!(!status.controls_enabled);
}

#[test]
fn mute_and_zero_volume_silence_output() {
    let (mut t, device) = transport(1, 10_000);
    t.play_index(0).unwrap();

    t.toggle_mute();
    assert!(device.pump(64).unwrap().iter().all(|&x| x == 0.0));

    t.set_muted(false);
    t.set_volume(0.0);
    assert!(device.pump(64).unwrap().iter().all(|&x| x == 0.0));

    t.set_volume(1.0);
    assert!(device.pump(64).unwrap().iter().all(|&x| x == 0.5));
}

#[test]
fn seek_while_idle_is_ignored() {
    let (mut t, _device) = transport(1, 1000);
    assert!(t.seek(500.0).is_ok());
}
