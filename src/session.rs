//! Idle-session tracking.
//!
//! A [`SessionTracker`] watches for operator activity and signs the session
//! out once nothing has happened for the configured timeout. The periodic
//! check runs on a background thread that is cancelled by [`SessionTracker::stop`]
//! or when the tracker is dropped.

use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{load_state, save_state};
use crate::error::Result;

pub const DEFAULT_TIMEOUT_MINUTES: u64 = 8 * 60;
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

/// The identity side of a session: whatever has to happen on forced sign-out.
pub trait SignOut: Send + Sync {
    fn sign_out(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// Terminal; a new sign-in creates a new tracker
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub is_active: bool,
    pub time_remaining: Duration,
    pub idle_for: Duration,
}

struct Inner {
    last_activity: Instant,
    state: SessionState,
}

struct Shared {
    timeout: Duration,
    inner: Mutex<Inner>,
    sign_out: Arc<dyn SignOut>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> SessionState {
        {
            let mut inner = self.lock();
            if inner.state == SessionState::Expired {
                return SessionState::Expired;
            }
            if inner.last_activity.elapsed() < self.timeout {
                return SessionState::Active;
            }
            inner.state = SessionState::Expired;
        }

        info!(timeout_secs = self.timeout.as_secs(), "session idle timeout, signing out");
        if let Err(e) = self.sign_out.sign_out() {
            warn!(error = %e, "sign-out after idle timeout failed");
        }
        SessionState::Expired
    }
}

struct Worker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct SessionTracker {
    shared: Arc<Shared>,
    check_interval: Duration,
    worker: Option<Worker>,
}

impl SessionTracker {
    pub fn new(timeout: Duration, check_interval: Duration, sign_out: Arc<dyn SignOut>) -> Self {
        Self {
            shared: Arc::new(Shared {
                timeout,
                inner: Mutex::new(Inner {
                    last_activity: Instant::now(),
                    state: SessionState::Active,
                }),
                sign_out,
            }),
            check_interval,
            worker: None,
        }
    }

    /// Reset the idle clock and begin periodic checks. No-op if already running
    /// or expired.
    pub fn start(&mut self) {
        if self.worker.is_some() || self.state() == SessionState::Expired {
            return;
        }
        self.record_activity();

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let interval = self.check_interval;

        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if shared.check() == SessionState::Expired {
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        debug!(interval_ms = interval.as_millis() as u64, "session tracking started");
        self.worker = Some(Worker { stop_tx, handle });
    }

    /// Cancel the periodic check and wait for it to finish.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if worker.handle.join().is_err() {
                warn!("session check thread panicked");
            }
            debug!("session tracking stopped");
        }
    }

    /// Whether the periodic check is still going; false once it stopped
    /// on expiry.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Any tracked input event. Ignored once the session expired.
    pub fn record_activity(&self) -> bool {
        let mut inner = self.shared.lock();
        if inner.state == SessionState::Active {
            inner.last_activity = Instant::now();
            true
        } else {
            false
        }
    }

    /// Run the idle check immediately.
    pub fn check(&self) -> SessionState {
        self.shared.check()
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.shared.lock();
        let idle_for = inner.last_activity.elapsed();
        let is_active = inner.state == SessionState::Active;
        SessionStatus {
            is_active,
            time_remaining: if is_active {
                self.shared.timeout.saturating_sub(idle_for)
            } else {
                Duration::ZERO
            },
            idle_for,
        }
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sign-out for the local shell.
///
/// The tracker thread only flags the expiry. The activity log entry is
/// written by [`LocalSignOut::record`] on the thread that owns `state.toml`,
/// so the two never write the file concurrently.
pub struct LocalSignOut {
    cfg_dir: PathBuf,
    operator: String,
    pending: AtomicBool,
}

impl LocalSignOut {
    pub fn new(cfg_dir: PathBuf, operator: impl Into<String>) -> Self {
        Self {
            cfg_dir,
            operator: operator.into(),
            pending: AtomicBool::new(false),
        }
    }

    /// Write the `session_timeout` entry if a sign-out happened. Returns
    /// whether one was written.
    pub fn record(&self) -> Result<bool> {
        if !self.pending.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        let mut state = load_state(&self.cfg_dir)?;
        state.log_activity("session_timeout", format!("operator={}", self.operator));
        save_state(&self.cfg_dir, &state)?;
        Ok(true)
    }
}

impl SignOut for LocalSignOut {
    fn sign_out(&self) -> Result<()> {
        self.pending.store(true, Ordering::SeqCst);
        Ok(())
    }
}
