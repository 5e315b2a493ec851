use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("could not decode MIDI file: {0}")]
    Decode(#[from] midly::Error),

    #[error("unsupported MIDI file: {0}")]
    UnsupportedFile(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("key '{key}' was rejected: {message}")]
    Actuation { key: char, message: String },

    #[error("playback aborted unexpectedly")]
    PlaybackAborted,

    #[error("keyboard is unavailable: {0}")]
    KeyboardUnavailable(String),

    #[error("a playback session is already running")]
    SessionActive,

    #[error("no files to play")]
    EmptySession,

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),
}
