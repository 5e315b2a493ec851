use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
};
use std::fs;
use std::path::{Path, PathBuf};

pub fn note_on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
    midi(delta, MidiMessage::NoteOn {
        key: u7::new(key),
        vel: u7::new(vel),
    })
}

pub fn note_off(delta: u32, key: u8) -> TrackEvent<'static> {
    midi(delta, MidiMessage::NoteOff {
        key: u7::new(key),
        vel: u7::new(0),
    })
}

pub fn tempo(delta: u32, microseconds_per_beat: u32) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(microseconds_per_beat))),
    }
}

fn midi(delta: u32, message: MidiMessage) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(0),
            message,
        },
    }
}

pub fn smf(ticks_per_beat: u16, tracks: Vec<Vec<TrackEvent<'static>>>) -> Smf<'static> {
    let format = if tracks.len() == 1 {
        Format::SingleTrack
    } else {
        Format::Parallel
    };
    let mut smf = Smf::new(Header::new(
        format,
        Timing::Metrical(u15::new(ticks_per_beat)),
    ));
    smf.tracks = tracks;
    smf
}

/// Encodes a file, closing every track with an end-of-track event.
pub fn smf_bytes(ticks_per_beat: u16, tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
    let tracks = tracks
        .into_iter()
        .map(|mut track| {
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            });
            track
        })
        .collect();

    let mut bytes = Vec::new();
    smf(ticks_per_beat, tracks).write_std(&mut bytes).unwrap();
    bytes
}

/// A fresh directory per test so parallel tests don't collide.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("key-player-{}-{}", std::process::id(), name));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// A file holding one short note: 20 ticks at 480 ticks per beat, about 21ms.
pub fn write_note_file(dir: &Path, name: &str, note: u8) -> PathBuf {
    let path = dir.join(name);
    fs::write(
        &path,
        smf_bytes(480, vec![vec![note_on(0, note, 100), note_off(20, note)]]),
    )
    .unwrap();
    path
}
