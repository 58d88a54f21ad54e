use crate::errors::CameraError;
use crate::frame::ColorFrame;
use crate::reader::FrameReader;
use crate::slot::FrameSlot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
    Stopping,
}

/// Counters of one capture-thread run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames_published: u64,
    pub soft_misses: u64,
    pub errors: u64,
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub read_timeout_ms: u64,
    pub error_backoff: Duration,
    pub restart_grace: Duration,
}

struct RunShared {
    state: Mutex<LoopState>,
    stats: Mutex<LoopStats>,
}

struct Worker {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    shared: Arc<RunShared>,
}

/// Background thread that keeps the frame slot filled with the newest
/// color frame.
///
/// At most one thread is live per loop. Every run gets its own stop flag, so
/// a thread that outlives its grace period can never be revived by a restart.
pub struct CaptureLoop {
    name: String,
    settings: LoopSettings,
    worker: Option<Worker>,
}

impl CaptureLoop {
    pub fn new(name: impl Into<String>, settings: LoopSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            worker: None,
        }
    }

    pub fn state(&self) -> LoopState {
        match &self.worker {
            Some(w) => w
                .shared
                .state
                .lock()
                .map(|s| *s)
                .unwrap_or(LoopState::Stopped),
            None => LoopState::Stopped,
        }
    }

    pub fn stats(&self) -> LoopStats {
        self.worker
            .as_ref()
            .and_then(|w| w.shared.stats.lock().ok().map(|s| *s))
            .unwrap_or_default()
    }

    /// True while the capture thread has not exited.
    pub fn is_alive(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    /// Start a capture thread unless one is already running.
    ///
    /// Returns `true` when a new thread was spawned.
    pub fn ensure_running(
        &mut self,
        reader: &FrameReader,
        slot: &Arc<FrameSlot<ColorFrame>>,
    ) -> Result<bool, CameraError> {
        if self.is_alive() && self.state() == LoopState::Running {
            return Ok(false);
        }

        if let Some(old) = self.worker.take() {
            old.stop.store(true, Ordering::Release);
            if wait_finished(&old.handle, self.settings.restart_grace) {
                if old.handle.join().is_err() {
                    log::warn!("Previous capture thread for {} panicked", self.name);
                }
            } else {
                log::warn!(
                    "Previous capture thread for {} still busy after {:?}, detaching it",
                    self.name,
                    self.settings.restart_grace
                );
            }
        }

        let stop = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(RunShared {
            state: Mutex::new(LoopState::Running),
            stats: Mutex::new(LoopStats::default()),
        });

        let ctx = LoopContext {
            name: self.name.clone(),
            reader: reader.clone(),
            slot: slot.clone(),
            stop: stop.clone(),
            shared: shared.clone(),
            settings: self.settings.clone(),
        };
        let handle = std::thread::Builder::new()
            .name(format!("{}_read_loop", self.name))
            .spawn(move || run_capture_loop(ctx))
            .map_err(|e| CameraError::ThreadSpawn(e.to_string()))?;

        log::debug!("Started capture thread for {}", self.name);
        self.worker = Some(Worker {
            handle,
            stop,
            shared,
        });
        Ok(true)
    }

    /// Signal the thread to stop and wait up to `join_timeout` for it.
    ///
    /// On timeout the thread is kept so a later call can retry.
    pub fn stop(&mut self, join_timeout: Duration) -> Result<(), CameraError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        worker.stop.store(true, Ordering::Release);
        if let Ok(mut state) = worker.shared.state.lock() {
            if *state == LoopState::Running {
                *state = LoopState::Stopping;
            }
        }

        if !wait_finished(&worker.handle, join_timeout) {
            self.worker = Some(worker);
            return Err(CameraError::StopTimeout(join_timeout.as_millis() as u64));
        }

        if worker.handle.join().is_err() {
            log::warn!("Capture thread for {} panicked", self.name);
        }
        log::debug!("Stopped capture thread for {}", self.name);
        Ok(())
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.stop.store(true, Ordering::Release);
        }
    }
}

fn wait_finished(handle: &JoinHandle<()>, timeout: Duration) -> bool {
    let start = Instant::now();
    loop {
        if handle.is_finished() {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

struct LoopContext {
    name: String,
    reader: FrameReader,
    slot: Arc<FrameSlot<ColorFrame>>,
    stop: Arc<AtomicBool>,
    shared: Arc<RunShared>,
    settings: LoopSettings,
}

impl LoopContext {
    fn bump(&self, f: impl FnOnce(&mut LoopStats)) {
        if let Ok(mut stats) = self.shared.stats.lock() {
            f(&mut stats);
        }
    }
}

fn run_capture_loop(ctx: LoopContext) {
    while !ctx.stop.load(Ordering::Acquire) {
        match ctx.reader.capture_color(None, ctx.settings.read_timeout_ms) {
            Ok(Some(frame)) => {
                if ctx.stop.load(Ordering::Acquire) {
                    break;
                }
                match ctx.slot.publish(frame) {
                    Ok(true) => ctx.bump(|s| s.frames_published += 1),
                    // Closed slot: the camera is disconnecting.
                    Ok(false) => break,
                    Err(e) => {
                        log::error!("Frame slot unusable for {}: {}", ctx.name, e);
                        break;
                    }
                }
            }
            Ok(None) => ctx.bump(|s| s.soft_misses += 1),
            Err(CameraError::NotConnected) => {
                log::debug!("{} not connected, capture thread exiting", ctx.name);
                break;
            }
            Err(e) => {
                ctx.bump(|s| s.errors += 1);
                log::warn!("Error reading frame in background thread for {}: {}", ctx.name, e);
                std::thread::sleep(ctx.settings.error_backoff);
            }
        }
    }

    if let Ok(mut state) = ctx.shared.state.lock() {
        *state = LoopState::Stopped;
    }
}
