use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum_macros::{Display, EnumString};

/// Countdowns longer than an hour are cut to an hour.
const MAX_COUNTDOWN_SECONDS: f64 = 3600.0;

/// Where the file list came from. Only a playlist wraps around.
#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    Single,
    Folder,
    Playlist,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub transpose: i32,
    pub auto_transpose: bool,
    pub velocity_threshold: u8,
    pub countdown_seconds: f64,
    pub release_all_at_end: bool,
    pub auto_advance: bool,
    pub loop_playlist: bool,
}

impl PlaybackSettings {
    /// Negative or NaN countdowns are treated as no countdown.
    pub fn countdown(&self) -> Duration {
        if self.countdown_seconds > 0.0 {
            Duration::from_secs_f64(self.countdown_seconds.min(MAX_COUNTDOWN_SECONDS))
        } else {
            Duration::ZERO
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            transpose: 0,
            auto_transpose: true,
            velocity_threshold: 1,
            countdown_seconds: 3.0,
            release_all_at_end: true,
            auto_advance: true,
            loop_playlist: true,
        }
    }
}
