use std::convert::TryFrom;
use wmidi::Note;

/// Three octaves starting at C2, laid out over the QWERTY rows.
const DEFAULT_KEYS: [(u8, char); 37] = [
    (60, 'q'),
    (61, '2'),
    (62, 'w'),
    (63, '3'),
    (64, 'e'),
    (65, 'r'),
    (66, '5'),
    (67, 't'),
    (68, '6'),
    (69, 'y'),
    (70, '7'),
    (71, 'u'),
    (72, 'i'),
    (48, 'z'),
    (49, 's'),
    (50, 'x'),
    (51, 'd'),
    (52, 'c'),
    (53, 'v'),
    (54, 'g'),
    (55, 'b'),
    (56, 'h'),
    (57, 'n'),
    (58, 'j'),
    (59, 'm'),
    (36, ','),
    (37, 'l'),
    (38, '.'),
    (39, ';'),
    (40, '/'),
    (41, 'o'),
    (42, '0'),
    (43, 'p'),
    (44, '-'),
    (45, '['),
    (46, '='),
    (47, 'j'),
];

/// Immutable table from MIDI note to the key that plays it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyMapping {
    keys: [Option<char>; 128],
}

impl KeyMapping {
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Note, char)>,
    {
        let mut keys = [None; 128];
        for (note, key) in pairs {
            keys[u8::from(note) as usize] = Some(key);
        }

        Self { keys }
    }

    pub fn key_for(&self, note: Note) -> Option<char> {
        self.keys[u8::from(note) as usize]
    }

    /// Looks up `note` shifted by `semitones`. Shifts that leave the MIDI
    /// range are unmapped.
    pub fn transposed_key(&self, note: u8, semitones: i32) -> Option<char> {
        transpose_note(note, semitones).and_then(|note| self.key_for(note))
    }

    pub fn contains(&self, note: Note) -> bool {
        self.key_for(note).is_some()
    }

    pub fn len(&self) -> usize {
        self.keys.iter().filter(|key| key.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KeyMapping {
    fn default() -> Self {
        Self::new(
            DEFAULT_KEYS
                .iter()
                .map(|&(note, key)| (Note::from_u8_lossy(note), key)),
        )
    }
}

pub fn transpose_note(note: u8, semitones: i32) -> Option<Note> {
    let semitones = i8::try_from(semitones).ok()?;
    Note::try_from(note).ok()?.step(semitones).ok()
}
