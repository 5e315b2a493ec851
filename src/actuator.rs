use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use log::*;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::{Error, Result};

/// Presses and releases keys on behalf of the player. Implementations keep no
/// record of which keys are down.
pub trait KeyActuator {
    fn press(&mut self, key: char) -> Result<()>;
    fn release(&mut self, key: char) -> Result<()>;
}

/// Synthesizes key events through the operating system's input layer.
pub struct OsKeyboard {
    enigo: Enigo,
}

impl OsKeyboard {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|err| Error::KeyboardUnavailable(err.to_string()))?;

        Ok(Self { enigo })
    }

    fn send(&mut self, key: char, direction: Direction) -> Result<()> {
        self.enigo
            .key(Key::Unicode(key), direction)
            .map_err(|err| Error::Actuation {
                key,
                message: err.to_string(),
            })
    }
}

impl KeyActuator for OsKeyboard {
    fn press(&mut self, key: char) -> Result<()> {
        self.send(key, Direction::Press)
    }

    fn release(&mut self, key: char) -> Result<()> {
        self.send(key, Direction::Release)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyAction {
    Press(char),
    Release(char),
}

/// Keeps every action in memory instead of touching the keyboard. Clones
/// share the same record.
#[derive(Clone, Debug, Default)]
pub struct RecordingActuator {
    actions: Arc<Mutex<Vec<(Instant, KeyAction)>>>,
    rejected_key: Option<char>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every action on `key`, as an OS that refuses it would.
    pub fn rejecting(key: char) -> Self {
        Self {
            rejected_key: Some(key),
            ..Self::default()
        }
    }

    pub fn actions(&self) -> Vec<KeyAction> {
        self.timed_actions()
            .into_iter()
            .map(|(_, action)| action)
            .collect()
    }

    pub fn timed_actions(&self) -> Vec<(Instant, KeyAction)> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, action: KeyAction) -> Result<()> {
        let key = match action {
            KeyAction::Press(key) | KeyAction::Release(key) => key,
        };
        if self.rejected_key == Some(key) {
            return Err(Error::Actuation {
                key,
                message: "rejected by recording actuator".into(),
            });
        }

        debug!("{:?}", action);
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((Instant::now(), action));
        Ok(())
    }
}

impl KeyActuator for RecordingActuator {
    fn press(&mut self, key: char) -> Result<()> {
        self.record(KeyAction::Press(key))
    }

    fn release(&mut self, key: char) -> Result<()> {
        self.record(KeyAction::Release(key))
    }
}
