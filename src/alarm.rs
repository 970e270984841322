use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const FLASH_INTERVAL: Duration = Duration::from_millis(500);
pub const AUTO_STOP_AFTER: Duration = Duration::from_secs(3);
pub const BEEP_FREQUENCY_HZ: u32 = 1000;
pub const BEEP_DURATION: Duration = Duration::from_millis(500);
pub const BEEP_COUNT: usize = 3;

/// A sound that is currently playing.
pub trait PlaybackHandle: Send {
    fn stop(&self);
}

/// Loads and plays alarm sounds.
pub trait AudioEngine {
    fn play_file(&mut self, path: &Path) -> Result<Box<dyn PlaybackHandle>>;
    /// Drop the output device. The next `play_file` reopens it.
    fn release(&mut self);
}

/// Blocking system beep.
pub trait Beeper: Send + Sync {
    fn beep(&self, frequency_hz: u32, duration: Duration);
}

#[derive(Debug, Clone)]
pub struct AlarmConfig {
    pub sound: Option<PathBuf>,
    pub auto_stop_after: Duration,
    pub flash_interval: Duration,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            sound: None,
            auto_stop_after: AUTO_STOP_AFTER,
            flash_interval: FLASH_INTERVAL,
        }
    }
}

/// How the alarm made itself heard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmAudio {
    /// The configured sound file is playing until the auto-stop deadline.
    Sound,
    /// The sound was unavailable; a short sequence of beeps was started.
    Beeps,
}

/// Snapshot of the alarm started by an expiration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmSession {
    pub started_at: Instant,
    pub auto_stop_deadline: Instant,
    pub audio: AlarmAudio,
    /// Audio for this session is still sounding.
    pub active: bool,
}

/// Alternates between two colours at a fixed interval, driven by the UI loop.
#[derive(Debug, Clone)]
pub struct FlashCycle {
    interval: Duration,
    index: Option<usize>,
    next_at: Option<Instant>,
}

impl FlashCycle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            index: None,
            next_at: None,
        }
    }

    /// The first colour shows one interval after `now`.
    pub fn start(&mut self, now: Instant) {
        self.index = None;
        self.next_at = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.index = None;
        self.next_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_at.is_some()
    }

    /// Advance to `now`; returns `true` when the colour changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(mut next) = self.next_at else {
            return false;
        };
        let before = self.index;
        while next <= now {
            self.index = Some(match self.index {
                None => 0,
                Some(i) => (i + 1) % 2,
            });
            next += self.interval;
        }
        self.next_at = Some(next);
        before != self.index
    }

    pub fn current(&self) -> Option<usize> {
        self.index
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_at
    }
}

#[derive(Default)]
struct AudioSlot {
    playback: Option<Box<dyn PlaybackHandle>>,
    stops: u32,
}

/// "Is audio active" state shared by the UI thread and the auto-stop thread.
/// Whoever takes the playback out of the slot performs the only stop.
#[derive(Default)]
struct SharedAudio {
    slot: Mutex<AudioSlot>,
    wake: Condvar,
}

impl SharedAudio {
    fn lock(&self) -> MutexGuard<'_, AudioSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn install(&self, playback: Box<dyn PlaybackHandle>) {
        self.lock().playback = Some(playback);
    }

    fn is_playing(&self) -> bool {
        self.lock().playback.is_some()
    }

    fn stops(&self) -> u32 {
        self.lock().stops
    }

    /// Returns `true` if this call stopped the audio.
    fn stop_now(&self) -> bool {
        let taken = {
            let mut slot = self.lock();
            let taken = slot.playback.take();
            if taken.is_some() {
                slot.stops += 1;
            }
            taken
        };
        self.wake.notify_all();
        match taken {
            Some(playback) => {
                playback.stop();
                true
            }
            None => false,
        }
    }

    fn stop_at(&self, deadline: Instant) {
        let mut slot = self.lock();
        loop {
            if slot.playback.is_none() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            slot = self
                .wake
                .wait_timeout(slot, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        let taken = slot.playback.take();
        if taken.is_some() {
            slot.stops += 1;
        }
        drop(slot);
        if let Some(playback) = taken {
            playback.stop();
            tracing::info!("alarm audio auto-stopped");
        }
    }
}

struct ActiveSession {
    started_at: Instant,
    auto_stop_deadline: Instant,
    audio: AlarmAudio,
}

/// Flashing and time-limited audio for an expired timer.
pub struct AlarmSubsystem<E: AudioEngine> {
    engine: E,
    beeper: Arc<dyn Beeper>,
    config: AlarmConfig,
    flash: FlashCycle,
    shared: Arc<SharedAudio>,
    auto_stop: Option<JoinHandle<()>>,
    beeps: Option<JoinHandle<()>>,
    beeps_cancelled: Arc<AtomicBool>,
    session: Option<ActiveSession>,
}

impl<E: AudioEngine> AlarmSubsystem<E> {
    pub fn new(engine: E, beeper: Arc<dyn Beeper>, config: AlarmConfig) -> Self {
        let flash = FlashCycle::new(config.flash_interval);
        Self {
            engine,
            beeper,
            config,
            flash,
            shared: Arc::new(SharedAudio::default()),
            auto_stop: None,
            beeps: None,
            beeps_cancelled: Arc::new(AtomicBool::new(false)),
            session: None,
        }
    }

    pub fn config(&self) -> &AlarmConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Start flashing and sound the alarm. A session that is still running is
    /// returned unchanged.
    pub fn start_session(&mut self, now: Instant) -> AlarmSession {
        if self.flash.is_running() {
            if let Some(existing) = self.session() {
                tracing::warn!("alarm session already running");
                return existing;
            }
        }

        self.flash.start(now);
        let auto_stop_deadline = now + self.config.auto_stop_after;
        let audio = match self.play_sound(auto_stop_deadline) {
            Ok(()) => AlarmAudio::Sound,
            Err(e) => {
                tracing::info!("alarm sound unavailable ({e}); beeping instead");
                self.start_beeps();
                AlarmAudio::Beeps
            }
        };
        self.session = Some(ActiveSession {
            started_at: now,
            auto_stop_deadline,
            audio,
        });
        tracing::info!(?audio, "alarm session started");
        AlarmSession {
            started_at: now,
            auto_stop_deadline,
            audio,
            active: self.audio_active(),
        }
    }

    fn play_sound(&mut self, deadline: Instant) -> Result<()> {
        let path = self
            .config
            .sound
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no alarm sound configured"))?;
        if !path.exists() {
            anyhow::bail!("'{}' does not exist", path.display());
        }
        let playback = self.engine.play_file(&path)?;
        self.shared.install(playback);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("alarm-auto-stop".into())
            .spawn(move || shared.stop_at(deadline));
        match spawned {
            Ok(handle) => self.auto_stop = Some(handle),
            Err(e) => {
                // Without the deferred stop the sound could run unbounded.
                tracing::warn!("failed to schedule alarm auto-stop: {e}");
                self.shared.stop_now();
            }
        }
        Ok(())
    }

    fn start_beeps(&mut self) {
        let beeper = Arc::clone(&self.beeper);
        let cancelled = Arc::new(AtomicBool::new(false));
        self.beeps_cancelled = Arc::clone(&cancelled);
        let spawned = thread::Builder::new()
            .name("alarm-beep".into())
            .spawn(move || {
                for _ in 0..BEEP_COUNT {
                    // A beep already sounding finishes; the rest are skipped.
                    if cancelled.load(Ordering::SeqCst) {
                        break;
                    }
                    beeper.beep(BEEP_FREQUENCY_HZ, BEEP_DURATION);
                }
            });
        match spawned {
            Ok(handle) => self.beeps = Some(handle),
            Err(e) => tracing::warn!("failed to start alarm beeps: {e}"),
        }
    }

    pub fn session(&self) -> Option<AlarmSession> {
        self.session.as_ref().map(|s| AlarmSession {
            started_at: s.started_at,
            auto_stop_deadline: s.auto_stop_deadline,
            audio: s.audio,
            active: self.audio_active(),
        })
    }

    /// Sound file still playing, or fallback beeps still running and not
    /// cancelled.
    pub fn audio_active(&self) -> bool {
        self.shared.is_playing() || self.beeps_pending()
    }

    fn beeps_pending(&self) -> bool {
        !self.beeps_cancelled.load(Ordering::SeqCst)
            && self.beeps.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// How many times playback was actually stopped, by either path.
    pub fn audio_stop_count(&self) -> u32 {
        self.shared.stops()
    }

    pub fn is_flashing(&self) -> bool {
        self.flash.is_running()
    }

    pub fn flash_color_index(&self) -> Option<usize> {
        self.flash.current()
    }

    /// Advance the flash cycle. Returns `true` when the colour changed.
    pub fn poll_flash(&mut self, now: Instant) -> bool {
        self.flash.poll(now)
    }

    pub fn next_flash_deadline(&self) -> Option<Instant> {
        self.flash.next_deadline()
    }

    /// Block until the fallback beeps have finished.
    pub fn wait_for_beeps(&mut self) {
        if let Some(handle) = self.beeps.take() {
            let _ = handle.join();
        }
    }

    /// Stop flashing and audio and release the output device. Safe to call
    /// at any time, including after the auto-stop already fired.
    pub fn cancel(&mut self) {
        self.flash.stop();
        if self.shared.stop_now() {
            tracing::info!("alarm audio stopped by cancel");
        }
        if self.beeps_pending() {
            tracing::info!("alarm beeps cancelled");
        }
        self.beeps_cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = self.auto_stop.take() {
            let _ = handle.join();
        }
        self.engine.release();
    }
}

impl<E: AudioEngine> Drop for AlarmSubsystem<E> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Audio engine for platforms without an output backend; always falls back
/// to beeps.
#[derive(Debug, Default)]
pub struct NullAudioEngine;

impl AudioEngine for NullAudioEngine {
    fn play_file(&mut self, path: &Path) -> Result<Box<dyn PlaybackHandle>> {
        anyhow::bail!(
            "audio playback is not available on this platform ({})",
            path.display()
        )
    }

    fn release(&mut self) {}
}

#[cfg(windows)]
mod platform {
    use super::{AudioEngine, Beeper, PlaybackHandle};
    use anyhow::{bail, Result};
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;
    use std::time::Duration;

    #[derive(Default)]
    pub struct RodioAudioEngine {
        stream: Option<(OutputStream, OutputStreamHandle)>,
    }

    struct RodioPlayback {
        sink: Sink,
    }

    impl PlaybackHandle for RodioPlayback {
        fn stop(&self) {
            self.sink.stop();
        }
    }

    impl AudioEngine for RodioAudioEngine {
        fn play_file(&mut self, path: &Path) -> Result<Box<dyn PlaybackHandle>> {
            if self.stream.is_none() {
                self.stream = Some(OutputStream::try_default()?);
            }
            let Some((_, handle)) = &self.stream else {
                bail!("audio output stream unavailable");
            };
            let source = Decoder::new(BufReader::new(File::open(path)?))?;
            let sink = Sink::try_new(handle)?;
            sink.append(source);
            Ok(Box::new(RodioPlayback { sink }))
        }

        fn release(&mut self) {
            self.stream = None;
        }
    }

    #[derive(Debug, Default)]
    pub struct SystemBeeper;

    impl Beeper for SystemBeeper {
        fn beep(&self, frequency_hz: u32, duration: Duration) {
            use windows::Win32::System::Diagnostics::Debug::Beep;
            let _ = unsafe { Beep(frequency_hz, duration.as_millis() as u32) };
        }
    }
}

#[cfg(windows)]
pub use platform::{RodioAudioEngine as PlatformAudioEngine, SystemBeeper as PlatformBeeper};

/// Rings the terminal bell and waits out the beep duration.
#[derive(Debug, Default)]
pub struct TerminalBeeper;

impl Beeper for TerminalBeeper {
    fn beep(&self, _frequency_hz: u32, duration: Duration) {
        use std::io::Write;
        let mut err = std::io::stderr();
        let _ = err.write_all(b"\x07");
        let _ = err.flush();
        thread::sleep(duration);
    }
}

#[cfg(not(windows))]
pub use self::{NullAudioEngine as PlatformAudioEngine, TerminalBeeper as PlatformBeeper};
