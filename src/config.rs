use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::{PlaybackSettings, Result};

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackSettings,
}

impl Config {
    pub fn from(yaml: &str) -> Result<Config> {
        if yaml.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Config> {
        Self::from(&fs::read_to_string(path)?)
    }
}
