//! Instrument layouts: which note each button plays and which key triggers it.
//!
//! The eight layouts ship as an embedded JSON asset written in Portuguese
//! solfège. Loading assigns button ids and fills in the bisonoric defaults.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::notation;
use crate::pitch::{self, Pitch};

const BUILTIN_LAYOUTS: &str = include_str!("../assets/layouts.json");

/// Layout shown when none is requested.
pub const DEFAULT_LAYOUT: &str = "verdulera";

// ── Bellows ─────────────────────────────────────────────────

/// Bellows direction. Bisonoric buttons sound a different note per direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bellows {
    #[default]
    Open,
    Close,
}

impl Bellows {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bellows::Open => "open",
            Bellows::Close => "close",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Bellows::Open => Bellows::Close,
            Bellows::Close => Bellows::Open,
        }
    }
}

// ── Layout model ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    Diatonic,
    Chromatic,
    Piano,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BassKind {
    /// Single low note.
    Bass,
    /// Fixed chord voicing.
    Chord,
}

/// A treble-side button.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MelodyButton {
    /// `btn-<row>-<position>`, both 1-based.
    pub id: String,
    pub row: usize,
    pub position: usize,
    pub open_note: String,
    /// Same as `open_note` on unisonoric layouts.
    pub close_note: String,
    /// Keyboard binding; empty for pointer-only buttons.
    pub key: String,
}

impl MelodyButton {
    pub fn note(&self, bellows: Bellows) -> &str {
        match bellows {
            Bellows::Open => &self.open_note,
            Bellows::Close => &self.close_note,
        }
    }

    /// Pitch-table symbol for the given bellows direction.
    pub fn symbol(&self, bellows: Bellows) -> String {
        notation::to_english(self.note(bellows))
    }

    /// Always a single note, even where the symbol spells a chord name.
    pub fn pitch(&self, bellows: Bellows) -> Pitch {
        pitch::resolve_note(&self.symbol(bellows))
    }
}

/// A bass-side button.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BassButton {
    /// `bass-<index>`, 1-based.
    pub id: String,
    pub note: String,
    pub key: String,
    pub kind: BassKind,
}

impl BassButton {
    pub fn symbol(&self) -> String {
        match self.kind {
            BassKind::Bass => notation::bass_symbol(&self.note),
            BassKind::Chord => notation::chord_symbol(&self.note),
        }
    }

    pub fn pitch(&self) -> Pitch {
        match self.kind {
            BassKind::Bass => pitch::resolve_note(&self.symbol()),
            BassKind::Chord => pitch::resolve(&self.symbol()),
        }
    }
}

/// Either side of the instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Button<'a> {
    Melody(&'a MelodyButton),
    Bass(&'a BassButton),
}

impl Button<'_> {
    pub fn id(&self) -> &str {
        match self {
            Button::Melody(b) => &b.id,
            Button::Bass(b) => &b.id,
        }
    }

    /// Symbol to play. Bass buttons ignore the bellows.
    pub fn symbol(&self, bellows: Bellows) -> String {
        match self {
            Button::Melody(b) => b.symbol(bellows),
            Button::Bass(b) => b.symbol(),
        }
    }

    pub fn pitch(&self, bellows: Bellows) -> Pitch {
        match self {
            Button::Melody(b) => b.pitch(bellows),
            Button::Bass(b) => b.pitch(),
        }
    }
}

/// One instrument layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLayout")]
pub struct AccordionLayout {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Display string, e.g. "Sol/Dó (G/C)".
    pub tuning: String,
    pub kind: LayoutKind,
    pub rows: Vec<Vec<MelodyButton>>,
    pub bass: Vec<BassButton>,
}

impl AccordionLayout {
    pub fn melody_buttons(&self) -> impl Iterator<Item = &MelodyButton> {
        self.rows.iter().flatten()
    }

    /// Lookup by id on either side.
    pub fn button(&self, id: &str) -> Option<Button<'_>> {
        self.melody_buttons()
            .find(|b| b.id == id)
            .map(Button::Melody)
            .or_else(|| self.bass.iter().find(|b| b.id == id).map(Button::Bass))
    }

    /// Lookup by keyboard binding, ignoring ASCII case. Melody buttons win
    /// over bass buttons.
    pub fn button_for_key(&self, key: &str) -> Option<Button<'_>> {
        if key.is_empty() {
            return None;
        }
        self.melody_buttons()
            .find(|b| b.key.eq_ignore_ascii_case(key))
            .map(Button::Melody)
            .or_else(|| {
                self.bass
                    .iter()
                    .find(|b| b.key.eq_ignore_ascii_case(key))
                    .map(Button::Bass)
            })
    }
}

// ── Catalog ─────────────────────────────────────────────────

/// Layout ids grouped for the picker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Categories {
    pub classics: Vec<String>,
    pub countries: Vec<String>,
}

/// Every available layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub categories: Categories,
    pub layouts: Vec<AccordionLayout>,
}

impl Catalog {
    /// The layouts bundled with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_LAYOUTS)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn layout(&self, id: &str) -> Result<&AccordionLayout> {
        self.layouts
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| Error::UnknownLayout(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.layouts.iter().map(|l| l.id.as_str())
    }
}

// ── Asset format ────────────────────────────────────────────

#[derive(Deserialize)]
struct RawLayout {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tuning: String,
    kind: LayoutKind,
    rows: Vec<RawRow>,
    #[serde(default)]
    bass: Vec<RawBass>,
}

#[derive(Deserialize)]
struct RawRow {
    open: Vec<String>,
    #[serde(default)]
    close: Vec<String>,
    #[serde(default)]
    keys: Vec<String>,
}

#[derive(Deserialize)]
struct RawBass {
    note: String,
    #[serde(default)]
    key: String,
    #[serde(rename = "type")]
    kind: BassKind,
}

impl From<RawLayout> for AccordionLayout {
    fn from(raw: RawLayout) -> Self {
        let rows = raw
            .rows
            .into_iter()
            .enumerate()
            .map(|(r, row)| {
                row.open
                    .iter()
                    .enumerate()
                    .map(|(p, open)| MelodyButton {
                        id: format!("btn-{}-{}", r + 1, p + 1),
                        row: r + 1,
                        position: p + 1,
                        open_note: open.clone(),
                        close_note: row.close.get(p).unwrap_or(open).clone(),
                        key: row.keys.get(p).cloned().unwrap_or_default(),
                    })
                    .collect()
            })
            .collect();

        let bass = raw
            .bass
            .into_iter()
            .enumerate()
            .map(|(i, b)| BassButton {
                id: format!("bass-{}", i + 1),
                note: b.note,
                key: b.key,
                kind: b.kind,
            })
            .collect();

        AccordionLayout {
            id: raw.id,
            name: raw.name,
            description: raw.description,
            tuning: raw.tuning,
            kind: raw.kind,
            rows,
            bass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_loads() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.layouts.len(), 8);
        for id in catalog.categories.classics.iter().chain(&catalog.categories.countries) {
            assert!(catalog.layout(id).is_ok(), "category lists missing layout {id}");
        }
    }

    #[test]
    fn every_button_resolves() {
        let catalog = Catalog::builtin().unwrap();
        for layout in &catalog.layouts {
            for button in layout.melody_buttons() {
                for bellows in [Bellows::Open, Bellows::Close] {
                    assert!(
                        matches!(button.pitch(bellows), Pitch::Single(_)),
                        "{}:{} {}",
                        layout.id,
                        button.id,
                        button.note(bellows)
                    );
                }
            }
            for button in &layout.bass {
                let expected_len = match button.kind {
                    BassKind::Bass => 1,
                    BassKind::Chord => 3,
                };
                assert!(
                    button.pitch().frequencies().len() >= expected_len,
                    "{}:{}",
                    layout.id,
                    button.id
                );
            }
        }
    }

    #[test]
    fn verdulera_first_button() {
        let catalog = Catalog::builtin().unwrap();
        let layout = catalog.layout("verdulera").unwrap();
        let Some(Button::Melody(b)) = layout.button("btn-1-1") else {
            panic!("btn-1-1 missing");
        };
        assert_eq!((b.row, b.position), (1, 1));
        assert_eq!(b.key, "1");
        assert!(layout.button("bass-1").is_some());
        assert_eq!(layout.bass[3].symbol(), "Gmaj");
        assert_eq!(layout.bass[0].symbol(), "G2");
    }

    #[test]
    fn top_octave_melody_notes_are_not_chords() {
        let catalog = Catalog::builtin().unwrap();
        let layout = catalog.layout("diatonico").unwrap();
        let top = layout
            .melody_buttons()
            .find(|b| b.close_note == "Ré7")
            .unwrap();
        assert_eq!(top.symbol(Bellows::Close), "D7");
        assert_eq!(top.pitch(Bellows::Close), Pitch::Single(2349.32));
    }

    #[test]
    fn defaults_for_sparse_rows() {
        let json = r#"{
            "layouts": [{
                "id": "tiny", "name": "Tiny", "kind": "chromatic",
                "rows": [{ "open": ["Dó4", "Ré4"], "keys": ["1"] }],
                "bass": [{ "note": "Sol", "type": "bass" }]
            }]
        }"#;
        let catalog = Catalog::from_json(json).unwrap();
        let layout = catalog.layout("tiny").unwrap();
        let second = &layout.rows[0][1];
        assert_eq!(second.close_note, "Ré4");
        assert_eq!(second.key, "");
        assert_eq!(layout.bass[0].key, "");
        assert!(layout.button_for_key("").is_none());
        assert!(catalog.categories.classics.is_empty());
    }

    #[test]
    fn melody_keys_win_over_bass_keys() {
        let json = r#"{
            "layouts": [{
                "id": "clash", "name": "Clash", "kind": "diatonic",
                "rows": [{ "open": ["Sol4"], "close": ["Lá4"], "keys": ["z"] }],
                "bass": [{ "note": "Dó", "key": "z", "type": "bass" }]
            }]
        }"#;
        let catalog = Catalog::from_json(json).unwrap();
        let layout = catalog.layout("clash").unwrap();
        assert!(matches!(layout.button_for_key("z"), Some(Button::Melody(_))));
    }

    #[test]
    fn unknown_layout() {
        let catalog = Catalog::builtin().unwrap();
        assert!(matches!(catalog.layout("bayan"), Err(Error::UnknownLayout(_))));
    }

    #[test]
    fn bellows_toggle() {
        assert_eq!(Bellows::default(), Bellows::Open);
        assert_eq!(Bellows::Open.toggle(), Bellows::Close);
        assert_eq!(Bellows::Close.toggle().toggle(), Bellows::Close);
    }
}
