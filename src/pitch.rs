//! Pitch table: note and chord symbols to frequencies in Hz.
//!
//! The table is enumerated, not computed. Single notes cover octaves 2 through 7
//! in equal temperament (A4 = 440 Hz) rounded to 0.01 Hz; chords are fixed voicings.

use serde::{Serialize, Serializer};

const LOWEST_OCTAVE: u8 = 2;
const HIGHEST_OCTAVE: u8 = 7;

/// Frequencies per octave (2..=7), indexed by semitone above C.
const NOTE_TABLE: [[f64; 12]; 6] = [
    [65.41, 69.30, 73.42, 77.78, 82.41, 87.31, 92.50, 98.00, 103.83, 110.00, 116.54, 123.47],
    [130.81, 138.59, 146.83, 155.56, 164.81, 174.61, 185.00, 196.00, 207.65, 220.00, 233.08, 246.94],
    [261.63, 277.18, 293.66, 311.13, 329.63, 349.23, 369.99, 392.00, 415.30, 440.00, 466.16, 493.88],
    [523.25, 554.37, 587.33, 622.25, 659.25, 698.46, 739.99, 783.99, 830.61, 880.00, 932.33, 987.77],
    [1046.50, 1108.73, 1174.66, 1244.51, 1318.51, 1396.91, 1479.98, 1567.98, 1661.22, 1760.00, 1864.66, 1975.53],
    [2093.00, 2217.46, 2349.32, 2489.02, 2637.02, 2793.83, 2959.96, 3135.96, 3322.44, 3520.00, 3729.31, 3951.07],
];

/// Fixed chord voicings used by the bass side of the instrument.
const CHORD_TABLE: &[(&str, &[f64])] = &[
    ("Gmaj", &[196.00, 246.94, 293.66]),
    ("Cmaj", &[261.63, 329.63, 392.00]),
    ("Fmaj", &[174.61, 220.00, 261.63]),
    ("D7", &[293.66, 369.99, 440.00, 261.63]),
    ("Am", &[220.00, 261.63, 329.63]),
    ("Dmaj", &[146.83, 185.00, 220.00]),
    ("Emaj", &[164.81, 207.65, 246.94]),
    ("Amaj", &[220.00, 277.18, 329.63]),
    ("Bmaj", &[246.94, 311.13, 369.99]),
    ("Bbmaj", &[233.08, 293.66, 349.23]),
    ("C7", &[261.63, 329.63, 392.00, 233.08]),
    ("Gm", &[196.00, 233.08, 293.66]),
    ("Dm", &[146.83, 174.61, 220.00]),
];

/// Result of resolving a note symbol.
///
/// Serializes as `{ kind, frequencies }` where `frequencies` is always an
/// array, empty for [`Pitch::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pitch {
    Single(f64),
    Chord(&'static [f64]),
    Unknown,
}

impl Pitch {
    /// All frequencies that sound for this pitch; empty when unknown.
    pub fn frequencies(&self) -> &[f64] {
        match self {
            Pitch::Single(freq) => std::slice::from_ref(freq),
            Pitch::Chord(freqs) => freqs,
            Pitch::Unknown => &[],
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Pitch::Unknown)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Pitch::Single(_) => "single",
            Pitch::Chord(_) => "chord",
            Pitch::Unknown => "unknown",
        }
    }
}

#[derive(Serialize)]
struct PitchRepr<'a> {
    kind: &'static str,
    frequencies: &'a [f64],
}

impl Serialize for Pitch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PitchRepr {
            kind: self.kind(),
            frequencies: self.frequencies(),
        }
        .serialize(serializer)
    }
}

/// Resolve a note ("G4", "F#3", "Bb5") or chord ("Gmaj", "D7") symbol.
///
/// Chord names shadow the two octave-7 notes they collide with ("C7", "D7").
pub fn resolve(symbol: &str) -> Pitch {
    if let Some((_, freqs)) = CHORD_TABLE.iter().find(|(name, _)| *name == symbol) {
        return Pitch::Chord(freqs);
    }
    resolve_note(symbol)
}

/// Resolve a single note only. Here "D7" is the D in octave 7.
pub fn resolve_note(symbol: &str) -> Pitch {
    match note_index(symbol) {
        Some((octave, semitone)) => {
            Pitch::Single(NOTE_TABLE[(octave - LOWEST_OCTAVE) as usize][semitone])
        }
        None => Pitch::Unknown,
    }
}

/// Parse a note symbol into (octave, semitone). Only exact table entries match.
fn note_index(symbol: &str) -> Option<(u8, usize)> {
    let mut chars = symbol.chars();
    let base = match chars.next()? {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (semitone, octave_str) = match rest.as_bytes().first()? {
        b'#' if !matches!(base, 4 | 11) => (base + 1, &rest[1..]),
        b'b' if !matches!(base, 0 | 5) => (base - 1, &rest[1..]),
        _ => (base, rest),
    };

    if octave_str.len() != 1 {
        return None;
    }
    let octave: u8 = octave_str.parse().ok()?;
    if !(LOWEST_OCTAVE..=HIGHEST_OCTAVE).contains(&octave) {
        return None;
    }
    Some((octave, semitone))
}
