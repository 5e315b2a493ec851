use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{
    CancelToken, EngineState, Mode, Notifier, PlaybackEngine, PlaybackSettings, SessionOutcome,
    Status,
};
use crate::{Error, KeyActuator, KeyMapping, Timeline, TransposeSelector};

/// The worker's view of one start request: created when playback starts,
/// gone when the sequencer stops.
pub struct Session {
    pub mode: Mode,
    pub files: Vec<PathBuf>,
    pub current_index: usize,
    pub settings: PlaybackSettings,
    pub cancel: CancelToken,
}

enum FileOutcome {
    Finished,
    Cancelled,
    Failed(Error),
}

pub struct Sequencer {
    session: Session,
    engine: PlaybackEngine,
    mapping: Arc<KeyMapping>,
    notifier: Notifier,
}

impl Sequencer {
    pub fn new(
        session: Session,
        actuator: Box<dyn KeyActuator>,
        mapping: Arc<KeyMapping>,
        notifier: Notifier,
    ) -> Self {
        let engine = PlaybackEngine::with_notifier(
            actuator,
            mapping.clone(),
            session.cancel.clone(),
            notifier.clone(),
        );

        Self {
            session,
            engine,
            mapping,
            notifier,
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Plays files until the list runs out, advancing is off, or the session
    /// is cancelled. A file that fails is logged and skipped.
    pub fn run(&mut self) -> SessionOutcome {
        let file_count = self.session.files.len();
        let mut any_finished = false;
        let mut any_failed = false;
        let mut failures_in_a_row = 0;

        while !self.session.cancel.is_cancelled() {
            let index = self.session.current_index;
            let path = match self.session.files.get(index) {
                Some(path) => path.clone(),
                None => break,
            };

            if self.session.mode != Mode::Single {
                self.notifier.index_selected(index);
            }

            match self.play_file(&path) {
                FileOutcome::Finished => {
                    any_finished = true;
                    failures_in_a_row = 0;
                    self.notifier.log("Track finished");
                    self.notifier.status(Status::Ready);
                }
                FileOutcome::Cancelled => return SessionOutcome::Cancelled,
                FileOutcome::Failed(err) => {
                    any_failed = true;
                    failures_in_a_row += 1;
                    self.notifier
                        .log(format!("Could not play {}: {}", path.display(), err));
                    self.engine.release_all();

                    if failures_in_a_row >= file_count {
                        self.notifier.log("Every file failed, stopping");
                        break;
                    }
                }
            }

            if !self.session.settings.auto_advance || !self.advance() {
                break;
            }
        }

        if self.session.cancel.is_cancelled() {
            SessionOutcome::Cancelled
        } else if any_failed && !any_finished {
            SessionOutcome::StoppedOnError
        } else {
            SessionOutcome::Finished
        }
    }

    /// Moves to the next file, wrapping only for a looping playlist.
    fn advance(&mut self) -> bool {
        self.session.current_index += 1;
        if self.session.current_index < self.session.files.len() {
            return true;
        }

        if self.session.mode == Mode::Playlist && self.session.settings.loop_playlist {
            self.notifier.log("Playlist looping back to the first track");
            self.session.current_index = 0;
            true
        } else {
            self.notifier.log("Reached the last track");
            false
        }
    }

    fn play_file(&mut self, path: &Path) -> FileOutcome {
        let timeline = match Timeline::load(path) {
            Ok(timeline) => timeline,
            Err(err) => return FileOutcome::Failed(err),
        };
        let settings = self.session.settings.clone();

        let transpose = if settings.auto_transpose {
            let result = TransposeSelector::new(&self.mapping).select(&timeline);
            if result.total_count > 0 {
                self.notifier.log(format!(
                    "Auto transpose: {:+} (playable {}/{} = {:.1}%)",
                    result.shift,
                    result.hit_count,
                    result.total_count,
                    result.coverage() * 100.0
                ));
            }
            result.shift
        } else {
            self.notifier
                .log(format!("Manual transpose: {:+}", settings.transpose));
            settings.transpose
        };

        self.notifier.log(format!("Loaded {}", path.display()));
        self.notifier.log(format!(
            "  tracks={}, ticks_per_beat={}",
            timeline.track_count(),
            timeline
                .ticks_per_beat()
                .map_or_else(|| "smpte".to_string(), |ticks| ticks.to_string())
        ));
        self.notifier.log(format!(
            "  velocity threshold={}",
            settings.velocity_threshold
        ));
        self.notifier.log(format!(
            "Starting in {:.1}s, switch to the target window",
            settings.countdown().as_secs_f64()
        ));

        match self.engine.play(&timeline, transpose, &settings) {
            EngineState::Finished => FileOutcome::Finished,
            EngineState::Cancelled => FileOutcome::Cancelled,
            _ => FileOutcome::Failed(Error::PlaybackAborted),
        }
    }
}
