use crate::{KeyMapping, Timeline};

/// Whole-octave shifts within three octaves, in tie-break order: the
/// smallest shift wins a tie, and upward beats downward.
pub const CANDIDATE_SHIFTS: [i32; 7] = [0, 12, -12, 24, -24, 36, -36];

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TransposeResult {
    pub shift: i32,
    pub hit_count: u32,
    pub total_count: u32,
}

impl TransposeResult {
    /// Fraction of notes that land on a key, 0.0 with no notes.
    pub fn coverage(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            f64::from(self.hit_count) / f64::from(self.total_count)
        }
    }
}

pub struct TransposeSelector<'mapping> {
    mapping: &'mapping KeyMapping,
    candidates: &'mapping [i32],
}

impl<'mapping> TransposeSelector<'mapping> {
    pub fn new(mapping: &'mapping KeyMapping) -> Self {
        Self::with_candidates(mapping, &CANDIDATE_SHIFTS)
    }

    /// Earlier candidates win ties.
    pub fn with_candidates(mapping: &'mapping KeyMapping, candidates: &'mapping [i32]) -> Self {
        Self {
            mapping,
            candidates,
        }
    }

    pub fn select(&self, timeline: &Timeline) -> TransposeResult {
        let notes: Vec<u8> = timeline
            .iter()
            .filter(|event| event.is_press(1))
            .map(|event| event.note)
            .collect();
        if notes.is_empty() {
            return TransposeResult::default();
        }

        let mut best: Option<TransposeResult> = None;
        for &shift in self.candidates {
            let hit_count = notes
                .iter()
                .filter(|&&note| self.mapping.transposed_key(note, shift).is_some())
                .count() as u32;

            if best.map_or(true, |best| hit_count > best.hit_count) {
                best = Some(TransposeResult {
                    shift,
                    hit_count,
                    total_count: notes.len() as u32,
                });
            }
        }

        best.unwrap_or(TransposeResult {
            total_count: notes.len() as u32,
            ..TransposeResult::default()
        })
    }
}
