mod cancel_token;
mod clock;
mod engine;
mod notification;
mod sequencer;
mod settings;

pub use cancel_token::CancelToken;
pub use engine::{EngineState, PlaybackEngine};
pub use notification::{Notification, Notifier, SessionOutcome, Status};
pub use sequencer::{Sequencer, Session};
pub use settings::{Mode, PlaybackSettings};

use log::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::{Error, KeyActuator, KeyMapping, OsKeyboard, Result};

type ActuatorFactory = dyn Fn() -> Result<Box<dyn KeyActuator>> + Send + Sync;

/// Set while any session in the process owns the keyboard.
static SESSION_RUNNING: AtomicBool = AtomicBool::new(false);

/// Claim on `SESSION_RUNNING`, given back when the worker drops it.
struct SessionClaim;

impl SessionClaim {
    fn acquire() -> Option<Self> {
        SESSION_RUNNING
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SessionClaim)
    }
}

impl Drop for SessionClaim {
    fn drop(&mut self) {
        SESSION_RUNNING.store(false, Ordering::SeqCst);
    }
}

struct ActiveSession {
    cancel: CancelToken,
    worker: JoinHandle<SessionOutcome>,
}

/// Starts and stops playback sessions, one at a time. Each session runs on
/// its own worker thread and reports back only through notifications.
pub struct Player {
    mapping: Arc<KeyMapping>,
    make_actuator: Arc<ActuatorFactory>,
    session: Option<ActiveSession>,
}

impl Player {
    /// `make_actuator` runs on the worker thread, once per session.
    pub fn new<F>(mapping: KeyMapping, make_actuator: F) -> Self
    where
        F: Fn() -> Result<Box<dyn KeyActuator>> + Send + Sync + 'static,
    {
        Self {
            mapping: Arc::new(mapping),
            make_actuator: Arc::new(make_actuator),
            session: None,
        }
    }

    pub fn with_os_keyboard(mapping: KeyMapping) -> Self {
        Self::new(mapping, || {
            OsKeyboard::new().map(|keyboard| Box::new(keyboard) as Box<dyn KeyActuator>)
        })
    }

    pub fn mapping(&self) -> &KeyMapping {
        &self.mapping
    }

    pub fn start(
        &mut self,
        files: Vec<PathBuf>,
        start_index: usize,
        mode: Mode,
        settings: PlaybackSettings,
    ) -> Result<Receiver<Notification>> {
        if self.is_active() {
            return Err(Error::SessionActive);
        }
        if files.is_empty() {
            return Err(Error::EmptySession);
        }
        // Reap the last session before replacing it.
        self.wait();
        let claim = SessionClaim::acquire().ok_or(Error::SessionActive)?;

        info!(
            "Starting {} session at {} of {}",
            mode,
            start_index.saturating_add(1),
            files.len()
        );
        let cancel = CancelToken::new();
        let session = Session {
            mode,
            files,
            current_index: start_index,
            settings,
            cancel: cancel.clone(),
        };
        let (sender, receiver) = mpsc::channel();
        let notifier = Notifier::new(sender);
        let mapping = self.mapping.clone();
        let make_actuator = self.make_actuator.clone();

        let worker = thread::Builder::new()
            .name("key-player".into())
            .spawn(move || {
                let _claim = claim;
                run_session(session, &*make_actuator, mapping, notifier)
            })?;

        self.session = Some(ActiveSession { cancel, worker });
        Ok(receiver)
    }

    /// Asks the running session to stop. Returns immediately.
    pub fn stop(&self) {
        if let Some(session) = &self.session {
            session.cancel.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.session
            .as_ref()
            .map_or(false, |session| !session.worker.is_finished())
    }

    /// Blocks until the current session ends.
    pub fn wait(&mut self) -> Option<SessionOutcome> {
        let session = self.session.take()?;
        Some(session.worker.join().unwrap_or_else(|_| {
            error!("Playback worker panicked");
            SessionOutcome::StoppedOnError
        }))
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
        self.wait();
    }
}

fn run_session(
    session: Session,
    make_actuator: &ActuatorFactory,
    mapping: Arc<KeyMapping>,
    notifier: Notifier,
) -> SessionOutcome {
    let outcome = match make_actuator() {
        Ok(actuator) => Sequencer::new(session, actuator, mapping, notifier.clone()).run(),
        Err(err) => {
            notifier.log(format!("Could not open the keyboard: {}", err));
            SessionOutcome::StoppedOnError
        }
    };

    notifier.log(match outcome {
        SessionOutcome::Finished => "Done",
        SessionOutcome::Cancelled => "Stopped",
        SessionOutcome::StoppedOnError => "Stopped after errors",
    });
    notifier.status(Status::Ready);
    notifier.finished(outcome);
    outcome
}
