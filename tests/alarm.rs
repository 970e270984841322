use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tea_timer::alarm::{
    AlarmAudio, AlarmConfig, AlarmSubsystem, AudioEngine, Beeper, PlaybackHandle,
    NullAudioEngine,
};

#[derive(Default, Debug)]
struct Recorded {
    played: Vec<PathBuf>,
    stops: usize,
    releases: usize,
}

struct Playback(Arc<Mutex<Recorded>>);

impl PlaybackHandle for Playback {
    fn stop(&self) {
        self.0.lock().unwrap().stops += 1;
    }
}

#[derive(Clone, Default)]
struct RecordingEngine {
    calls: Arc<Mutex<Recorded>>,
}

impl AudioEngine for RecordingEngine {
    fn play_file(&mut self, path: &Path) -> Result<Box<dyn PlaybackHandle>> {
        self.calls.lock().unwrap().played.push(path.to_path_buf());
        Ok(Box::new(Playback(Arc::clone(&self.calls))))
    }

    fn release(&mut self) {
        self.calls.lock().unwrap().releases += 1;
    }
}

#[derive(Default)]
struct CountingBeeper {
    count: Mutex<usize>,
}

impl Beeper for CountingBeeper {
    fn beep(&self, _frequency_hz: u32, _duration: Duration) {
        *self.count.lock().unwrap() += 1;
    }
}

fn with_sound(dir: &tempfile::TempDir) -> (AlarmSubsystem<RecordingEngine>, RecordingEngine) {
    let path = dir.path().join("alarm.wav");
    std::fs::write(&path, b"RIFF").unwrap();
    let engine = RecordingEngine::default();
    let alarm = AlarmSubsystem::new(
        engine.clone(),
        Arc::new(CountingBeeper::default()),
        AlarmConfig {
            sound: Some(path),
            ..AlarmConfig::default()
        },
    );
    (alarm, engine)
}

fn wait_until(deadline: Instant) {
    while Instant::now() < deadline {
        sleep(Duration::from_millis(50));
    }
}

#[test]
fn auto_stop_fires_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let (mut alarm, engine) = with_sound(&dir);
    let started = Instant::now();
    let session = alarm.start_session(started);
    assert_eq!(session.audio, AlarmAudio::Sound);
    assert!(session.active);
    assert_eq!(session.auto_stop_deadline, started + Duration::from_secs(3));

    wait_until(started + Duration::from_millis(3400));
    assert_eq!(engine.calls.lock().unwrap().stops, 1);
    assert!(!alarm.audio_active());
    assert!(!alarm.session().unwrap().active);

    alarm.cancel();
    assert_eq!(engine.calls.lock().unwrap().stops, 1);
    assert_eq!(alarm.audio_stop_count(), 1);
}

#[test]
fn early_cancel_prevents_the_auto_stop() {
    let dir = tempfile::tempdir().unwrap();
    let (mut alarm, engine) = with_sound(&dir);
    let started = Instant::now();
    alarm.start_session(started);

    wait_until(started + Duration::from_secs(1));
    alarm.cancel();
    assert_eq!(engine.calls.lock().unwrap().stops, 1);
    assert!(!alarm.is_flashing());

    wait_until(started + Duration::from_millis(3400));
    let calls = engine.calls.lock().unwrap();
    assert_eq!(calls.stops, 1);
    assert!(calls.releases >= 1);
}

#[test]
fn second_start_keeps_the_running_session() {
    let dir = tempfile::tempdir().unwrap();
    let (mut alarm, engine) = with_sound(&dir);
    let started = Instant::now();
    let first = alarm.start_session(started);
    let second = alarm.start_session(started + Duration::from_millis(200));
    assert_eq!(first.started_at, second.started_at);
    assert_eq!(engine.calls.lock().unwrap().played.len(), 1);
    alarm.cancel();
}

#[test]
fn missing_sound_file_beeps_three_times() {
    let beeper = Arc::new(CountingBeeper::default());
    let mut alarm = AlarmSubsystem::new(
        NullAudioEngine,
        Arc::clone(&beeper) as Arc<dyn Beeper>,
        AlarmConfig {
            sound: Some(PathBuf::from("definitely/not/here.mp3")),
            ..AlarmConfig::default()
        },
    );
    let session = alarm.start_session(Instant::now());
    assert_eq!(session.audio, AlarmAudio::Beeps);
    alarm.wait_for_beeps();
    assert_eq!(*beeper.count.lock().unwrap(), 3);
    assert!(!alarm.audio_active());
}

#[test]
fn flash_runs_until_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let (mut alarm, _engine) = with_sound(&dir);
    let started = Instant::now();
    alarm.start_session(started);
    assert!(alarm.poll_flash(started + Duration::from_millis(500)));
    assert_eq!(alarm.flash_color_index(), Some(0));
    assert!(alarm.poll_flash(started + Duration::from_secs(10)));
    assert!(alarm.is_flashing());

    alarm.cancel();
    assert_eq!(alarm.flash_color_index(), None);
    assert!(!alarm.poll_flash(started + Duration::from_secs(11)));
}

struct SlowBeeper {
    count: Mutex<usize>,
}

impl Beeper for SlowBeeper {
    fn beep(&self, _frequency_hz: u32, duration: Duration) {
        *self.count.lock().unwrap() += 1;
        sleep(duration);
    }
}

#[test]
fn cancel_silences_fallback_beeps() {
    let beeper = Arc::new(SlowBeeper {
        count: Mutex::new(0),
    });
    let mut alarm = AlarmSubsystem::new(
        NullAudioEngine,
        Arc::clone(&beeper) as Arc<dyn Beeper>,
        AlarmConfig {
            sound: Some(PathBuf::from("nope.mp3")),
            ..AlarmConfig::default()
        },
    );
    let session = alarm.start_session(Instant::now());
    assert_eq!(session.audio, AlarmAudio::Beeps);
    alarm.cancel();

    assert!(!alarm.audio_active());
    assert!(!alarm.session().unwrap().active);

    alarm.wait_for_beeps();
    assert!(*beeper.count.lock().unwrap() < 3);
}
