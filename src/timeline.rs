use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::{Error, Result};

/// 120 BPM, used until the first tempo event.
pub const DEFAULT_TEMPO: u32 = 500_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EventKind {
    NoteOn,
    NoteOff,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MidiEvent {
    pub time_seconds: f64,
    pub kind: EventKind,
    pub note: u8,
    pub velocity: u8,
}

impl MidiEvent {
    pub fn note_on(time_seconds: f64, note: u8, velocity: u8) -> Self {
        Self {
            time_seconds,
            kind: EventKind::NoteOn,
            note,
            velocity,
        }
    }

    pub fn note_off(time_seconds: f64, note: u8) -> Self {
        Self {
            time_seconds,
            kind: EventKind::NoteOff,
            note,
            velocity: 0,
        }
    }

    pub fn other(time_seconds: f64) -> Self {
        Self {
            time_seconds,
            kind: EventKind::Other,
            note: 0,
            velocity: 0,
        }
    }

    fn from_kind(time_seconds: f64, kind: &TrackEventKind) -> Self {
        match *kind {
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { key, vel },
                ..
            } => Self::note_on(time_seconds, key.as_int(), vel.as_int()),
            TrackEventKind::Midi {
                message: MidiMessage::NoteOff { key, vel },
                ..
            } => Self {
                velocity: vel.as_int(),
                ..Self::note_off(time_seconds, key.as_int())
            },
            _ => Self::other(time_seconds),
        }
    }

    pub fn offset(&self) -> Duration {
        Duration::from_secs_f64(self.time_seconds.max(0.0))
    }

    /// A note-on loud enough to press a key. Velocity zero never presses,
    /// even with a threshold of zero: such a note-on is only a release, so an
    /// unheld key gets no press-release tap.
    pub fn is_press(&self, velocity_threshold: u8) -> bool {
        self.kind == EventKind::NoteOn && self.velocity > 0 && self.velocity >= velocity_threshold
    }

    /// A note-off, or a note-on with velocity zero.
    pub fn is_release(&self) -> bool {
        match self.kind {
            EventKind::NoteOff => true,
            EventKind::NoteOn => self.velocity == 0,
            EventKind::Other => false,
        }
    }
}

enum TickRate {
    Metrical { ticks_per_beat: f64 },
    Timecode { seconds_per_tick: f64 },
}

impl TickRate {
    fn from_timing(timing: Timing) -> Result<Self> {
        match timing {
            Timing::Metrical(ticks_per_beat) if ticks_per_beat.as_int() == 0 => Err(
                Error::UnsupportedFile("header declares zero ticks per beat".into()),
            ),
            Timing::Metrical(ticks_per_beat) => Ok(TickRate::Metrical {
                ticks_per_beat: f64::from(ticks_per_beat.as_int()),
            }),
            Timing::Timecode(_, 0) => Err(Error::UnsupportedFile(
                "header declares zero ticks per frame".into(),
            )),
            Timing::Timecode(fps, ticks_per_frame) => Ok(TickRate::Timecode {
                seconds_per_tick: 1.0 / (f64::from(fps.as_f32()) * f64::from(ticks_per_frame)),
            }),
        }
    }

    fn seconds(&self, ticks: u64, tempo: u32) -> f64 {
        match *self {
            TickRate::Metrical { ticks_per_beat } => {
                ticks as f64 * f64::from(tempo) / (ticks_per_beat * 1_000_000.0)
            }
            TickRate::Timecode { seconds_per_tick } => ticks as f64 * seconds_per_tick,
        }
    }
}

/// Every event of a file on one clock, in playing order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timeline {
    events: Vec<MidiEvent>,
    track_count: usize,
    ticks_per_beat: Option<u16>,
}

impl Timeline {
    pub fn new(mut events: Vec<MidiEvent>) -> Self {
        events.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));

        Self {
            events,
            track_count: 1,
            ticks_per_beat: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let smf = Smf::parse(bytes)?;
        Self::from_smf(&smf)
    }

    /// Merges the tracks by absolute tick. Events on the same tick keep track
    /// order, then file order. Each delta is converted with the tempo in
    /// effect before it, so a tempo change only affects later deltas.
    pub fn from_smf(smf: &Smf) -> Result<Self> {
        let rate = TickRate::from_timing(smf.header.timing)?;

        let mut merged = Vec::new();
        for track in &smf.tracks {
            let mut tick: u64 = 0;
            for event in track {
                tick += u64::from(event.delta.as_int());
                merged.push((tick, &event.kind));
            }
        }
        merged.sort_by_key(|&(tick, _)| tick);

        let mut tempo = DEFAULT_TEMPO;
        let mut seconds = 0.0;
        let mut last_tick = 0;
        let mut events = Vec::with_capacity(merged.len());
        for (tick, kind) in merged {
            seconds += rate.seconds(tick - last_tick, tempo);
            last_tick = tick;
            events.push(MidiEvent::from_kind(seconds, kind));

            if let TrackEventKind::Meta(MetaMessage::Tempo(new_tempo)) = *kind {
                tempo = new_tempo.as_int();
            }
        }

        Ok(Self {
            events,
            track_count: smf.tracks.len(),
            ticks_per_beat: match smf.header.timing {
                Timing::Metrical(ticks_per_beat) => Some(ticks_per_beat.as_int()),
                Timing::Timecode(..) => None,
            },
        })
    }

    pub fn events(&self) -> &[MidiEvent] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &MidiEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn track_count(&self) -> usize {
        self.track_count
    }

    /// `None` for SMPTE timed files.
    pub fn ticks_per_beat(&self) -> Option<u16> {
        self.ticks_per_beat
    }

    pub fn duration(&self) -> f64 {
        self.events.last().map_or(0.0, |event| event.time_seconds)
    }
}
