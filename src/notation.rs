//! Solfège note names ("Dó4", "Sib3", "Lám") to the pitch table's English symbols.

/// Solfège syllables with and without accents. "Sol" is listed first so it
/// wins over "Si" on a shared prefix.
const SYLLABLES: &[(&str, char)] = &[
    ("Sol", 'G'),
    ("Dó", 'C'),
    ("Do", 'C'),
    ("Ré", 'D'),
    ("Re", 'D'),
    ("Mi", 'E'),
    ("Fá", 'F'),
    ("Fa", 'F'),
    ("Lá", 'A'),
    ("La", 'A'),
    ("Si", 'B'),
];

/// Octave bass buttons sound in.
pub const BASS_OCTAVE: u8 = 2;

fn split(symbol: &str) -> Option<(char, &str)> {
    SYLLABLES
        .iter()
        .find_map(|(syllable, letter)| symbol.strip_prefix(syllable).map(|rest| (*letter, rest)))
}

/// Translate the note name, keeping accidentals and octave: `"Fá#4"` → `"F#4"`.
///
/// Anything that does not start with a syllable comes back unchanged.
pub fn to_english(symbol: &str) -> String {
    match split(symbol) {
        Some((letter, rest)) => format!("{letter}{rest}"),
        None => symbol.to_string(),
    }
}

/// Single bass note, pinned to [`BASS_OCTAVE`] unless it carries one: `"Sol"` → `"G2"`.
pub fn bass_symbol(note: &str) -> String {
    let english = to_english(note);
    if english.ends_with(|c: char| c.is_ascii_digit()) {
        english
    } else {
        format!("{english}{BASS_OCTAVE}")
    }
}

/// Chord button: root plus quality. No suffix is a major triad.
///
/// `"Sol"` → `"Gmaj"`, `"Ré7"` → `"D7"`, `"Lám"` → `"Am"`, `"Sib"` → `"Bbmaj"`.
pub fn chord_symbol(note: &str) -> String {
    let english = to_english(note);
    let root_end = match english.char_indices().nth(1) {
        Some((i, '#' | 'b')) => i + 1,
        Some((i, _)) => i,
        None => english.len(),
    };
    if root_end == english.len() {
        format!("{english}maj")
    } else {
        english
    }
}
