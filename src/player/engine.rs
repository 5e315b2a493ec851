use log::*;
use std::collections::BTreeSet;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

use super::{clock, CancelToken, Notification, Notifier, PlaybackSettings, Status};
use crate::{KeyActuator, KeyMapping, MidiEvent, Timeline};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EngineState {
    Idle,
    Countdown,
    Playing,
    Finished,
    Cancelled,
    Failed,
}

/// Plays timelines against a keyboard. Owns the set of keys it is holding
/// down, which only changes on the thread calling `play`.
pub struct PlaybackEngine {
    actuator: Box<dyn KeyActuator>,
    mapping: Arc<KeyMapping>,
    cancel: CancelToken,
    notifier: Notifier,
    held_keys: BTreeSet<char>,
    state: EngineState,
}

impl PlaybackEngine {
    pub fn new(
        actuator: Box<dyn KeyActuator>,
        mapping: Arc<KeyMapping>,
        cancel: CancelToken,
        notifications: Sender<Notification>,
    ) -> Self {
        Self::with_notifier(actuator, mapping, cancel, Notifier::new(notifications))
    }

    pub(crate) fn with_notifier(
        actuator: Box<dyn KeyActuator>,
        mapping: Arc<KeyMapping>,
        cancel: CancelToken,
        notifier: Notifier,
    ) -> Self {
        Self {
            actuator,
            mapping,
            cancel,
            notifier,
            held_keys: BTreeSet::new(),
            state: EngineState::Idle,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn held_keys(&self) -> &BTreeSet<char> {
        &self.held_keys
    }

    /// Counts down, then plays every event of `timeline` on time. Held keys
    /// are released on the way out when `release_all_at_end` is set, and
    /// always after a failure.
    pub fn play(
        &mut self,
        timeline: &Timeline,
        transpose: i32,
        settings: &PlaybackSettings,
    ) -> EngineState {
        self.state = EngineState::Countdown;
        self.notifier.status(Status::CountingDown);

        self.state = if clock::count_down(settings.countdown(), &self.cancel) {
            self.state = EngineState::Playing;
            self.notifier.status(Status::Playing);

            let velocity_threshold = settings.velocity_threshold;
            let played = panic::catch_unwind(AssertUnwindSafe(|| {
                self.play_events(timeline, transpose, velocity_threshold)
            }));
            match played {
                Ok(true) => EngineState::Finished,
                Ok(false) => {
                    self.notifier.log("Stopped during playback");
                    EngineState::Cancelled
                }
                Err(_) => {
                    error!("Playback aborted after a panic");
                    EngineState::Failed
                }
            }
        } else {
            self.notifier.log("Stopped during countdown");
            EngineState::Cancelled
        };

        if settings.release_all_at_end || self.state == EngineState::Failed {
            self.release_all();
        }

        self.state
    }

    fn play_events(&mut self, timeline: &Timeline, transpose: i32, velocity_threshold: u8) -> bool {
        let start = Instant::now();
        for event in timeline.iter() {
            if !clock::wait_until(start, event.offset(), &self.cancel) {
                return false;
            }
            self.handle_event(event, transpose, velocity_threshold);
        }

        !self.cancel.is_cancelled()
    }

    fn handle_event(&mut self, event: &MidiEvent, transpose: i32, velocity_threshold: u8) {
        let key = match self.mapping.transposed_key(event.note, transpose) {
            Some(key) => key,
            None => return,
        };

        if event.is_release() {
            self.release(key);
        } else if event.is_press(velocity_threshold) {
            self.press(key);
        }
    }

    fn press(&mut self, key: char) {
        if self.held_keys.contains(&key) {
            return;
        }
        match self.actuator.press(key) {
            Ok(()) => {
                self.held_keys.insert(key);
            }
            Err(err) => warn!("{}", err),
        }
    }

    fn release(&mut self, key: char) {
        if !self.held_keys.remove(&key) {
            return;
        }
        if let Err(err) = self.actuator.release(key) {
            warn!("{}", err);
        }
    }

    /// Releases every held key. A failed release is logged and the rest are
    /// still released.
    pub fn release_all(&mut self) {
        for key in mem::take(&mut self.held_keys) {
            if let Err(err) = self.actuator.release(key) {
                warn!("{}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyAction, RecordingActuator, Result};
    use std::sync::mpsc::{self, Receiver};
    use std::thread;
    use std::time::Duration;
    use wmidi::Note;

    fn settings() -> PlaybackSettings {
        PlaybackSettings {
            countdown_seconds: 0.0,
            auto_transpose: false,
            ..PlaybackSettings::default()
        }
    }

    fn mapping() -> Arc<KeyMapping> {
        Arc::new(KeyMapping::new(vec![
            (Note::C4, 'q'),
            (Note::D4, 'w'),
            (Note::E4, 'e'),
        ]))
    }

    fn engine(actuator: RecordingActuator) -> (PlaybackEngine, CancelToken, Receiver<Notification>) {
        let cancel = CancelToken::new();
        let (sender, receiver) = mpsc::channel();
        let engine = PlaybackEngine::new(Box::new(actuator), mapping(), cancel.clone(), sender);
        (engine, cancel, receiver)
    }

    #[test]
    fn presses_and_releases_on_time() {
        let recording = RecordingActuator::new();
        let (mut engine, _, _) = engine(recording.clone());
        let timeline = Timeline::new(vec![
            MidiEvent::note_on(0.0, 60, 100),
            MidiEvent::note_off(1.0, 60),
        ]);
        let settings = PlaybackSettings {
            velocity_threshold: 1,
            ..settings()
        };

        let start = Instant::now();
        assert_eq!(engine.play(&timeline, 0, &settings), EngineState::Finished);

        let actions = recording.timed_actions();
        assert_eq!(actions.len(), 2);
        let (pressed_at, press) = actions[0];
        let (released_at, release) = actions[1];
        assert_eq!(press, KeyAction::Press('q'));
        assert_eq!(release, KeyAction::Release('q'));
        assert!(pressed_at.duration_since(start) < Duration::from_millis(10));
        let held_for = released_at.duration_since(pressed_at).as_secs_f64();
        assert!((held_for - 1.0).abs() < 0.010, "held for {}s", held_for);
        assert!(engine.held_keys().is_empty());
    }

    #[test]
    fn repeated_press_is_ignored() {
        let recording = RecordingActuator::new();
        let (mut engine, _, _) = engine(recording.clone());
        let timeline = Timeline::new(vec![
            MidiEvent::note_on(0.0, 60, 100),
            MidiEvent::note_on(0.001, 60, 100),
            MidiEvent::note_off(0.002, 60),
            MidiEvent::note_off(0.003, 60),
        ]);

        engine.play(&timeline, 0, &settings());

        assert_eq!(
            recording.actions(),
            vec![KeyAction::Press('q'), KeyAction::Release('q')]
        );
    }

    #[test]
    fn velocity_threshold_and_zero_velocity_release() {
        let recording = RecordingActuator::new();
        let (mut engine, _, _) = engine(recording.clone());
        let timeline = Timeline::new(vec![
            MidiEvent::note_on(0.0, 60, 30),
            MidiEvent::note_on(0.001, 62, 90),
            MidiEvent::note_on(0.002, 62, 0),
        ]);
        let settings = PlaybackSettings {
            velocity_threshold: 64,
            ..settings()
        };

        engine.play(&timeline, 0, &settings);

        assert_eq!(
            recording.actions(),
            vec![KeyAction::Press('w'), KeyAction::Release('w')]
        );
    }

    #[test]
    fn silent_note_on_never_taps_with_zero_threshold() {
        let recording = RecordingActuator::new();
        let (mut engine, _, _) = engine(recording.clone());
        let timeline = Timeline::new(vec![MidiEvent::note_on(0.0, 60, 0)]);
        let settings = PlaybackSettings {
            velocity_threshold: 0,
            ..settings()
        };

        assert_eq!(engine.play(&timeline, 0, &settings), EngineState::Finished);

        assert!(recording.actions().is_empty());
    }

    #[test]
    fn transpose_and_unmapped_notes() {
        let recording = RecordingActuator::new();
        let (mut engine, _, _) = engine(recording.clone());
        let timeline = Timeline::new(vec![
            MidiEvent::note_on(0.0, 48, 100),
            MidiEvent::note_on(0.001, 49, 100),
            MidiEvent::other(0.002),
            MidiEvent::note_on(0.003, 52, 100),
        ]);
        let settings = PlaybackSettings {
            release_all_at_end: false,
            ..settings()
        };

        engine.play(&timeline, 12, &settings);

        assert_eq!(
            recording.actions(),
            vec![KeyAction::Press('q'), KeyAction::Press('e')]
        );
        assert_eq!(
            engine.held_keys().iter().copied().collect::<Vec<_>>(),
            vec!['e', 'q']
        );
    }

    #[test]
    fn held_keys_track_unreleased_presses() {
        let recording = RecordingActuator::new();
        let (mut engine, _, _) = engine(recording.clone());
        let timeline = Timeline::new(vec![
            MidiEvent::note_on(0.0, 60, 100),
            MidiEvent::note_on(0.001, 62, 100),
            MidiEvent::note_off(0.002, 60),
            MidiEvent::note_off(0.003, 64),
            MidiEvent::note_on(0.004, 64, 100),
            MidiEvent::note_on(0.005, 60, 100),
            MidiEvent::note_on(0.006, 64, 0),
        ]);
        let settings = PlaybackSettings {
            release_all_at_end: false,
            ..settings()
        };

        assert_eq!(engine.play(&timeline, 0, &settings), EngineState::Finished);

        assert_eq!(
            engine.held_keys().iter().copied().collect::<Vec<_>>(),
            vec!['q', 'w']
        );
        assert_eq!(recording.actions().len(), 6);
    }

    #[test]
    fn release_all_at_end() {
        let recording = RecordingActuator::new();
        let (mut engine, _, _) = engine(recording.clone());
        let timeline = Timeline::new(vec![
            MidiEvent::note_on(0.0, 60, 100),
            MidiEvent::note_on(0.0, 62, 100),
        ]);

        engine.play(&timeline, 0, &settings());

        assert!(engine.held_keys().is_empty());
        assert_eq!(
            recording.actions(),
            vec![
                KeyAction::Press('q'),
                KeyAction::Press('w'),
                KeyAction::Release('q'),
                KeyAction::Release('w'),
            ]
        );
    }

    #[test]
    fn cancelled_during_countdown() {
        let recording = RecordingActuator::new();
        let (mut engine, cancel, receiver) = engine(recording.clone());
        let timeline = Timeline::new(vec![MidiEvent::note_on(0.0, 60, 100)]);
        let settings = PlaybackSettings {
            countdown_seconds: 10.0,
            ..settings()
        };
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            cancel.cancel();
        });

        let start = Instant::now();
        assert_eq!(engine.play(&timeline, 0, &settings), EngineState::Cancelled);
        assert!(start.elapsed() < Duration::from_millis(500));
        canceller.join().unwrap();

        assert!(recording.actions().is_empty());
        let notifications: Vec<_> = receiver.try_iter().collect();
        assert_eq!(
            notifications,
            vec![
                Notification::Status(Status::CountingDown),
                Notification::Log("Stopped during countdown".into()),
            ]
        );
    }

    #[test]
    fn cancelled_during_playback_releases_held_keys() {
        let recording = RecordingActuator::new();
        let (mut engine, cancel, _) = engine(recording.clone());
        let timeline = Timeline::new(vec![
            MidiEvent::note_on(0.0, 60, 100),
            MidiEvent::note_on(0.0, 64, 100),
            MidiEvent::note_off(5.0, 60),
            MidiEvent::note_on(6.0, 62, 100),
        ]);
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.cancel();
        });

        let start = Instant::now();
        assert_eq!(engine.play(&timeline, 0, &settings()), EngineState::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(1));
        canceller.join().unwrap();

        assert_eq!(engine.state(), EngineState::Cancelled);
        assert!(engine.held_keys().is_empty());
        assert_eq!(
            recording.actions(),
            vec![
                KeyAction::Press('q'),
                KeyAction::Press('e'),
                KeyAction::Release('e'),
                KeyAction::Release('q'),
            ]
        );
    }

    #[test]
    fn rejected_key_does_not_stop_playback() {
        let recording = RecordingActuator::rejecting('w');
        let (mut engine, _, _) = engine(recording.clone());
        let timeline = Timeline::new(vec![
            MidiEvent::note_on(0.0, 62, 100),
            MidiEvent::note_on(0.001, 60, 100),
            MidiEvent::note_off(0.002, 62),
        ]);

        assert_eq!(engine.play(&timeline, 0, &settings()), EngineState::Finished);

        assert_eq!(
            recording.actions(),
            vec![KeyAction::Press('q'), KeyAction::Release('q')]
        );
        assert!(engine.held_keys().is_empty());
    }

    struct PanickingActuator {
        inner: RecordingActuator,
        panic_on: char,
    }

    impl KeyActuator for PanickingActuator {
        fn press(&mut self, key: char) -> Result<()> {
            if key == self.panic_on {
                panic!("keyboard went away");
            }
            self.inner.press(key)
        }

        fn release(&mut self, key: char) -> Result<()> {
            self.inner.release(key)
        }
    }

    #[test]
    fn panic_mid_playback_fails_and_releases() {
        let recording = RecordingActuator::new();
        let (sender, _receiver) = mpsc::channel();
        let mut engine = PlaybackEngine::new(
            Box::new(PanickingActuator {
                inner: recording.clone(),
                panic_on: 'e',
            }),
            mapping(),
            CancelToken::new(),
            sender,
        );
        let timeline = Timeline::new(vec![
            MidiEvent::note_on(0.0, 60, 100),
            MidiEvent::note_on(0.001, 64, 100),
            MidiEvent::note_on(0.002, 62, 100),
        ]);
        let settings = PlaybackSettings {
            release_all_at_end: false,
            ..settings()
        };

        assert_eq!(engine.play(&timeline, 0, &settings), EngineState::Failed);

        assert!(engine.held_keys().is_empty());
        assert_eq!(
            recording.actions(),
            vec![KeyAction::Press('q'), KeyAction::Release('q')]
        );
    }
}
