use frame_explorer::error::{AudioError, ExplorerError, SessionError};
use frame_explorer::test_fixtures::{create_test_wav_file, ramp, FlakySource, StubAnalyzer};
use frame_explorer::{MemorySource, Session, Step, WavFileSource, WaveformChannel};

fn session_over(samples: Vec<f32>, sample_rate: u32, window_secs: f64) -> Session {
    let mut session = Session::new(Box::new(StubAnalyzer::default()));
    session
        .open(Box::new(MemorySource::new(samples, sample_rate)), window_secs)
        .unwrap();
    session
}

#[test]
fn test_long_recording_window_layout() {
    let mut session = session_over(ramp(1_000_000), 16000, 30.0);

    assert_eq!(session.window_samples(), Some(480_000));
    assert_eq!(session.window_count(), 3);

    let mut starts = Vec::new();
    let mut lens = Vec::new();
    loop {
        let window = session.window().unwrap();
        starts.push(window.start_sample);
        lens.push(window.len());
        if session.advance().unwrap() == Step::BoundaryReached {
            break;
        }
    }

    assert_eq!(starts, vec![0, 480_000, 960_000]);
    assert_eq!(lens, vec![480_000, 480_000, 40_000]);
    assert_eq!(session.current_window_bounds(), Some((60.0, 62.5)));
}

#[test]
fn test_advance_past_last_window_is_noop() {
    let mut session = session_over(ramp(1_000_000), 16000, 30.0);
    session.seek_window(2).unwrap();
    let before = session.window().unwrap().clone();

    assert_eq!(session.advance().unwrap(), Step::BoundaryReached);
    assert_eq!(session.window(), Some(&before));
    assert_eq!(session.metrics().summary().boundary_hits, 1);
}

#[test]
fn test_retreat_at_first_window_is_noop() {
    let mut session = session_over(ramp(48_000), 16000, 1.0);
    assert_eq!(session.retreat().unwrap(), Step::BoundaryReached);
    assert_eq!(session.window_index(), Some(0));
    assert_eq!(session.current_window_bounds(), Some((0.0, 1.0)));
}

#[test]
fn test_advance_then_retreat_restores_content() {
    let mut session = session_over(ramp(48_000), 16000, 1.0);
    let first = session.window().unwrap().samples.clone();

    session.advance().unwrap();
    assert_ne!(session.window().unwrap().samples, first);
    session.retreat().unwrap();

    assert_eq!(session.window().unwrap().samples, first);
}

#[test]
fn test_windows_tile_the_file() {
    let samples = ramp(37_123);
    let mut session = session_over(samples.clone(), 8000, 0.7);

    let mut stitched = Vec::new();
    loop {
        stitched.extend_from_slice(&session.window().unwrap().samples);
        if session.advance().unwrap().boundary_reached() {
            break;
        }
    }
    assert_eq!(stitched, samples);
    assert_eq!(session.window_index(), Some(session.window_count() - 1));
}

#[test]
fn test_move_resets_crop_and_refreshes_analysis() {
    let mut session = session_over(ramp(48_000), 16000, 1.0);
    session.propose_crop(0.25, 0.5).unwrap();
    let first_level = session.analysis().unwrap().scores[0][0];

    session.advance().unwrap();

    let window_len = session.window().unwrap().len();
    assert_eq!(session.crop().unwrap().start, 0);
    assert_eq!(session.crop().unwrap().end, window_len);
    assert!(session.analysis().unwrap().scores[0][0] > first_level);
}

#[test]
fn test_cancelled_read_keeps_previous_window() {
    let (source, controls) = FlakySource::new(ramp(48_000), 16000);
    let mut session = Session::new(Box::new(StubAnalyzer::default()));
    session.open(Box::new(source), 1.0).unwrap();
    session.propose_crop(0.1, 0.2).unwrap();
    let window = session.window().unwrap().clone();
    let crop = session.crop();
    let analysis = session.analysis().cloned();

    controls.cancel_reads(true);
    let err = session.advance().unwrap_err();
    assert!(matches!(err, ExplorerError::Audio(AudioError::Cancelled)));
    assert!(!err.is_fatal());

    assert_eq!(session.window(), Some(&window));
    assert_eq!(session.crop(), crop);
    assert_eq!(session.analysis().cloned(), analysis);

    controls.cancel_reads(false);
    assert_eq!(session.advance().unwrap(), Step::Moved);
    assert_eq!(session.window_index(), Some(1));
}

#[test]
fn test_lost_source_empties_session() {
    let (source, controls) = FlakySource::new(ramp(48_000), 16000);
    let mut session = Session::without_analyzer();
    session.open(Box::new(source), 1.0).unwrap();

    controls.vanish();
    let err = session.advance().unwrap_err();
    assert!(err.is_fatal());
    assert!(session.is_empty());
    assert_eq!(session.window_count(), 0);
    assert!(matches!(
        session.advance(),
        Err(ExplorerError::Session(SessionError::NoWindow))
    ));
}

#[test]
fn test_failed_open_keeps_existing_session() {
    let mut session = session_over(ramp(16_000), 16000, 0.5);
    let (source, controls) = FlakySource::new(ramp(16_000), 8000);
    controls.cancel_reads(true);

    assert!(session.open(Box::new(source), 0.5).is_err());
    assert_eq!(session.sample_rate(), Some(16000));
    assert_eq!(session.window().unwrap().len(), 8000);
}

#[test]
fn test_empty_source_has_no_windows() {
    let mut session = Session::without_analyzer();
    session
        .open(Box::new(MemorySource::new(Vec::<f32>::new(), 16000)), 1.0)
        .unwrap();
    assert!(session.is_empty());
    assert_eq!(session.window_count(), 0);
    assert_eq!(session.current_window_bounds(), None);
}

#[test]
fn test_invalid_window_duration_rejected() {
    let mut session = Session::without_analyzer();
    for secs in [0.0, -1.0, f64::NAN] {
        let err = session
            .open(Box::new(MemorySource::new(ramp(100), 16000)), secs)
            .unwrap_err();
        assert!(matches!(
            err,
            ExplorerError::Session(SessionError::InvalidWindowDuration { .. })
        ));
    }
    assert!(session.is_empty());
}

#[test]
fn test_seek_window_out_of_range() {
    let mut session = session_over(ramp(48_000), 16000, 1.0);
    let err = session.seek_window(3).unwrap_err();
    assert!(matches!(
        err,
        ExplorerError::Session(SessionError::WindowOutOfRange { index: 3, count: 3 })
    ));
    assert_eq!(session.window_index(), Some(0));
    assert_eq!(session.seek_window(0).unwrap(), Step::BoundaryReached);
}

#[test]
fn test_navigate_wav_file_on_disk() {
    let samples: Vec<f32> = (0..12_000).map(|i| ((i % 100) as f32 - 50.0) / 100.0).collect();
    let wav = create_test_wav_file(&samples, 8000, 1);
    let source = WavFileSource::open(wav.path(), WaveformChannel::Left).unwrap();

    let mut session = Session::without_analyzer();
    session.open(Box::new(source), 1.0).unwrap();
    assert_eq!(session.window_count(), 2);

    session.advance().unwrap();
    let window = session.window().unwrap();
    assert_eq!(window.start_sample, 8000);
    assert_eq!(window.len(), 4000);
    assert!((window.samples[0] - samples[8000]).abs() < 1e-3);
}
