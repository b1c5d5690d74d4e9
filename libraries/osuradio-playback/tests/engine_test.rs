//! Engine lifecycle tests against a manually pumped output

mod common;

use common::{engine, track_path, CountingFactory, RATE};
use osuradio_playback::{EngineState, PlaybackError, StartOptions};

#[test]
fn start_opens_stream_at_native_rate() {
    let (mut engine, device) = engine(CountingFactory::new(5000));
    engine.start(&track_path(0), StartOptions::default()).unwrap();

    let spec = device.spec().unwrap();
    assert_eq!(spec.sample_rate, RATE);
    assert_eq!(spec.channels, 2);
    assert_eq!(engine.state(), EngineState::Playing);
    assert_eq!(engine.duration_ms(), 5000.0);
}

#[test]
fn double_time_opens_stream_at_one_and_a_half_rate() {
    let (mut engine, device) = engine(CountingFactory::new(6000));
    engine.set_double_time(true).unwrap();
    engine.start(&track_path(0), StartOptions::default()).unwrap();

    assert_eq!(device.spec().unwrap().sample_rate, 1500);
    assert_eq!(engine.duration_ms(), 4000.0);
}

#[test]
fn restart_never_holds_two_decoders() {
    let factory = CountingFactory::new(5000);
    let counters = factory.counters();
    let (mut engine, device) = engine(factory);

    for i in 0..5 {
        engine.stop();
        engine.start(&track_path(i), StartOptions::default()).unwrap();
        device.pump(100);
        assert_eq!(counters.opens(), counters.closes() + 1);
    }
    assert_eq!(counters.max_live(), 1);

    engine.stop();
    assert_eq!(counters.opens(), counters.closes());
    assert!(!device.is_open());
}

#[test]
fn decode_failure_leaves_no_live_decoder() {
    let factory = CountingFactory::new(5000).failing(track_path(3));
    let counters = factory.counters();
    let (mut engine, device) = engine(factory);

    let err = engine.start(&track_path(3), StartOptions::default());
    assert!(matches!(err, Err(PlaybackError::Decode(_))));
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(counters.live(), 0);
    assert!(!device.is_open());
}

#[test]
fn device_failure_releases_decoder() {
    let factory = CountingFactory::new(5000);
    let counters = factory.counters();
    let (mut engine, device) = engine(factory);
    device.set_failing(true);

    let err = engine.start(&track_path(0), StartOptions::default());
    assert!(matches!(err, Err(PlaybackError::Device(_))));
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(counters.opens(), 1);
    assert_eq!(counters.live(), 0);
}

#[test]
fn seek_repositions_without_reopening() {
    let factory = CountingFactory::new(10_000);
    let counters = factory.counters();
    let (mut engine, device) = engine(factory);
    engine.start(&track_path(0), StartOptions::default()).unwrap();

    device.pump(500);
    engine.seek(7000.0).unwrap();
    assert_eq!(engine.position_ms(), 7000.0);

    device.pump(100);
    assert_eq!(engine.position_ms(), 7100.0);
    assert_eq!(counters.opens(), 1);
    assert_eq!(device.opens(), 1);
}

#[test]
fn seek_past_end_clamps_and_finishes() {
    let (mut engine, device) = engine(CountingFactory::new(1000));
    engine.start(&track_path(0), StartOptions::default()).unwrap();

    engine.seek(50_000.0).unwrap();
    assert_eq!(engine.position_ms(), 1000.0);

    device.pump(100);
    assert!(engine.poll_finished());
    assert_eq!(engine.state(), EngineState::Idle);
}

#[test]
fn pause_keeps_fill_running_silently() {
    let (mut engine, device) = engine(CountingFactory::new(5000));
    engine.start(&track_path(0), StartOptions::default()).unwrap();
    device.pump(200);

    engine.pause();
    let block = device.pump(200).unwrap();
    assert!(block.iter().all(|&x| x == 0.0));
    assert_eq!(engine.position_ms(), 200.0);

    engine.toggle_pause();
    device.pump(200);
    assert_eq!(engine.position_ms(), 400.0);
}

#[test]
fn double_time_toggle_preserves_position_and_pause() {
    let factory = CountingFactory::new(60_000);
    let counters = factory.counters();
    let (mut engine, device) = engine(factory);
    engine.start(&track_path(0), StartOptions::default()).unwrap();
    device.pump(12_000);
    engine.pause();

    engine.set_double_time(true).unwrap();
    assert_eq!(engine.state(), EngineState::Paused);
    assert_eq!(engine.position_ms(), 12_000.0);
    assert_eq!(engine.effective_rate(), Some(1500.0));
    assert_eq!(counters.max_live(), 1);

    engine.set_double_time(false).unwrap();
    assert_eq!(engine.effective_rate(), Some(f64::from(RATE)));
    assert_eq!(engine.position_ms(), 12_000.0);
    assert_eq!(engine.current_path(), Some(track_path(0).as_path()));
}

#[test]
fn stale_completion_after_stop_is_ignored() {
    let (mut engine, device) = engine(CountingFactory::new(100));
    engine.start(&track_path(0), StartOptions::default()).unwrap();
    device.pump_many(100, 3);

    engine.stop();
    engine.start(&track_path(1), StartOptions::default()).unwrap();
    assert!(!engine.poll_finished());
    assert_eq!(engine.state(), EngineState::Playing);
}

#[test]
fn stop_is_idempotent() {
    let (mut engine, _device) = engine(CountingFactory::new(100));
    engine.stop();
    engine.stop();
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(engine.position_ms(), 0.0);
    assert!(engine.current_path().is_none());
}
