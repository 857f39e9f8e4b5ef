//! Timbre registry: the five built-in synthesis recipes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dsp::oscillator::Waveform;
use crate::error::Error;

/// Synthesis recipe for one timbre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimbreRecipe {
    pub waveform: Waveform,
    /// Amplitude of each harmonic, fundamental first.
    pub harmonics: Vec<f64>,
    /// Low-pass cutoff in Hz.
    pub filter_freq: f64,
    pub filter_q: f64,
    /// Attack time in seconds.
    pub attack: f64,
    /// Decay time in seconds.
    pub decay: f64,
    /// Sustain level, absolute gain.
    pub sustain: f64,
    /// Chorus detune in cents; 0 disables the second fundamental.
    pub detune: f64,
}

/// Identifier of a built-in timbre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimbreId {
    #[default]
    Accordion,
    Musette,
    #[serde(alias = "bandoneón")]
    Bandoneon,
    Organ,
    Harmonica,
}

impl TimbreId {
    pub const ALL: [TimbreId; 5] = [
        TimbreId::Accordion,
        TimbreId::Musette,
        TimbreId::Bandoneon,
        TimbreId::Organ,
        TimbreId::Harmonica,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimbreId::Accordion => "accordion",
            TimbreId::Musette => "musette",
            TimbreId::Bandoneon => "bandoneon",
            TimbreId::Organ => "organ",
            TimbreId::Harmonica => "harmonica",
        }
    }

    /// Display name for selection menus.
    pub fn label(&self) -> &'static str {
        match self {
            TimbreId::Accordion => "Acordeão Clássico",
            TimbreId::Musette => "Musette Francês",
            TimbreId::Bandoneon => "Bandoneón Tango",
            TimbreId::Organ => "Órgão",
            TimbreId::Harmonica => "Gaita/Harmônica",
        }
    }

    pub fn recipe(&self) -> TimbreRecipe {
        get(*self)
    }
}

impl fmt::Display for TimbreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimbreId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accordion" => Ok(TimbreId::Accordion),
            "musette" => Ok(TimbreId::Musette),
            "bandoneon" | "bandoneón" => Ok(TimbreId::Bandoneon),
            "organ" => Ok(TimbreId::Organ),
            "harmonica" => Ok(TimbreId::Harmonica),
            other => Err(Error::UnknownTimbre(other.to_string())),
        }
    }
}

/// Look up the recipe for a timbre.
pub fn get(id: TimbreId) -> TimbreRecipe {
    match id {
        TimbreId::Accordion => TimbreRecipe {
            waveform: Waveform::Sawtooth,
            harmonics: vec![1.0, 0.5, 0.25],
            filter_freq: 2500.0,
            filter_q: 1.0,
            attack: 0.03,
            decay: 0.1,
            sustain: 0.25,
            detune: 3.0,
        },
        // Wider detune gives the musette beating.
        TimbreId::Musette => TimbreRecipe {
            waveform: Waveform::Sawtooth,
            harmonics: vec![1.0, 0.6, 0.3, 0.15],
            filter_freq: 3000.0,
            filter_q: 0.8,
            attack: 0.02,
            decay: 0.08,
            sustain: 0.3,
            detune: 8.0,
        },
        TimbreId::Bandoneon => TimbreRecipe {
            waveform: Waveform::Triangle,
            harmonics: vec![1.0, 0.4, 0.2],
            filter_freq: 2000.0,
            filter_q: 1.5,
            attack: 0.04,
            decay: 0.12,
            sustain: 0.2,
            detune: 2.0,
        },
        TimbreId::Organ => TimbreRecipe {
            waveform: Waveform::Sine,
            harmonics: vec![1.0, 0.8, 0.6, 0.4, 0.2],
            filter_freq: 4000.0,
            filter_q: 0.5,
            attack: 0.01,
            decay: 0.05,
            sustain: 0.4,
            detune: 0.0,
        },
        TimbreId::Harmonica => TimbreRecipe {
            waveform: Waveform::Square,
            harmonics: vec![1.0, 0.3],
            filter_freq: 1800.0,
            filter_q: 2.0,
            attack: 0.02,
            decay: 0.06,
            sustain: 0.35,
            detune: 5.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_ids() {
        for id in TimbreId::ALL {
            assert_eq!(id.as_str().parse::<TimbreId>().unwrap(), id);
        }
        assert_eq!("bandoneón".parse::<TimbreId>().unwrap(), TimbreId::Bandoneon);
    }

    #[test]
    fn rejects_unknown_id() {
        let err = "kazoo".parse::<TimbreId>().unwrap_err();
        assert!(matches!(err, Error::UnknownTimbre(ref id) if id == "kazoo"));
    }

    #[test]
    fn recipes_are_well_formed() {
        for id in TimbreId::ALL {
            let r = get(id);
            assert!(!r.harmonics.is_empty(), "{id} has no harmonics");
            assert_eq!(r.harmonics[0], 1.0, "{id} fundamental should be full amplitude");
            assert!(r.sustain > 0.0 && r.sustain <= 0.4, "{id} sustain above peak");
            assert!((0.0..=8.0).contains(&r.detune));
        }
        assert_eq!(get(TimbreId::Organ).detune, 0.0);
        assert_eq!(get(TimbreId::Musette).detune, 8.0);
    }

    #[test]
    fn serde_uses_lowercase_ids() {
        let json = serde_json::to_string(&TimbreId::Harmonica).unwrap();
        assert_eq!(json, "\"harmonica\"");
        let id: TimbreId = serde_json::from_str("\"bandoneón\"").unwrap();
        assert_eq!(id, TimbreId::Bandoneon);
    }
}
