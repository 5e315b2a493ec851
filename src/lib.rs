mod actuator;
mod config;
mod error;
mod key_mapping;
mod player;
mod result;
#[cfg(test)]
mod test_support;
mod timeline;
mod transpose;

pub use actuator::{KeyAction, KeyActuator, OsKeyboard, RecordingActuator};
pub use config::Config;
pub use error::Error;
pub use key_mapping::{transpose_note, KeyMapping};
pub use player::{
    CancelToken, EngineState, Mode, Notification, Notifier, PlaybackEngine, PlaybackSettings,
    Player, Sequencer, Session, SessionOutcome, Status,
};
pub use result::Result;
pub use timeline::{EventKind, MidiEvent, Timeline, DEFAULT_TEMPO};
pub use transpose::{TransposeResult, TransposeSelector, CANDIDATE_SHIFTS};
