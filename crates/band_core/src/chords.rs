//! Chord-sheet transposition
//!
//! A line is treated as a chord line when every token on it parses as a chord
//! (bar marks like `|` are allowed). Lyric lines pass through untouched.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChordError {
    #[error("unrecognised key: {0}")]
    InvalidKey(String),
}

const SHARP_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
const FLAT_NAMES: [&str; 12] = ["C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B"];

/// Tokens that may appear on a chord line without being chords.
const NEUTRAL_TOKENS: [&str; 5] = ["|", "||", "-", "/", "%"];

fn chord_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^([A-G])([#b]?)((?:maj|min|dim|aug|sus|add|m|M|[0-9]|[#b+\-()°ø])*)(?:/([A-G])([#b]?))?$",
        )
        .unwrap_or_else(|e| unreachable!("chord pattern is valid: {e}"))
    })
}

fn pitch_class(letter: &str, accidental: &str) -> u8 {
    let base: i8 = match letter {
        "C" => 0,
        "D" => 2,
        "E" => 4,
        "F" => 5,
        "G" => 7,
        "A" => 9,
        _ => 11,
    };
    let shift: i8 = match accidental {
        "#" => 1,
        "b" => -1,
        _ => 0,
    };
    (base + shift).rem_euclid(12) as u8
}

fn spell(pitch: u8, flats: bool) -> &'static str {
    let names = if flats { &FLAT_NAMES } else { &SHARP_NAMES };
    names[usize::from(pitch % 12)]
}

/// A musical key: tonic pitch class, mode and preferred accidental spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub tonic: u8,
    pub minor: bool,
    flats: bool,
}

impl Key {
    /// Parse `C`, `F#`, `Bb`, `Am`, `Ebm`.
    pub fn parse(text: &str) -> Result<Self, ChordError> {
        let invalid = || ChordError::InvalidKey(text.to_string());
        let trimmed = text.trim();
        let caps = chord_pattern().captures(trimmed).ok_or_else(invalid)?;
        let suffix = caps.get(3).map_or("", |m| m.as_str());
        let minor = match suffix {
            "" => false,
            "m" | "min" => true,
            _ => return Err(invalid()),
        };
        if caps.get(4).is_some() {
            return Err(invalid());
        }

        let letter = &caps[1];
        let accidental = caps.get(2).map_or("", |m| m.as_str());
        let tonic = pitch_class(letter, accidental);
        Ok(Self {
            tonic,
            minor,
            flats: accidental == "b" || (Self::is_flat_key(tonic, minor) && accidental != "#"),
        })
    }

    /// Key implied by the first chord of the first chord line.
    pub fn detect(text: &str) -> Option<Self> {
        let line = text.lines().find(|line| is_chord_line(line))?;
        let first = line
            .split_whitespace()
            .find(|token| !NEUTRAL_TOKENS.contains(token))?;
        let caps = chord_pattern().captures(first)?;
        let suffix = caps.get(3).map_or("", |m| m.as_str());
        let minor = suffix.starts_with('m') && !suffix.starts_with("maj");
        let accidental = caps.get(2).map_or("", |m| m.as_str());
        let tonic = pitch_class(&caps[1], accidental);
        Some(Self {
            tonic,
            minor,
            flats: accidental == "b",
        })
    }

    /// All twelve major keys in conventional spelling, starting from C.
    pub fn majors() -> Vec<Key> {
        (0..12u8)
            .map(|tonic| Key {
                tonic,
                minor: false,
                flats: Self::is_flat_key(tonic, false),
            })
            .collect()
    }

    /// Keys conventionally written with flats.
    fn is_flat_key(tonic: u8, minor: bool) -> bool {
        if minor {
            // Dm Gm Cm Fm Bbm Ebm
            matches!(tonic, 2 | 7 | 0 | 5 | 10 | 3)
        } else {
            // F Bb Eb Ab Db Gb
            matches!(tonic, 5 | 10 | 3 | 8 | 1 | 6)
        }
    }

    /// Upward distance in semitones from `self` to `other`.
    pub fn semitones_to(&self, other: &Key) -> u8 {
        (other.tonic + 12 - self.tonic) % 12
    }

    pub fn uses_flats(&self) -> bool {
        self.flats
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(spell(self.tonic, self.flats))?;
        if self.minor {
            f.write_str("m")?;
        }
        Ok(())
    }
}

/// Whether every token of `line` is a chord or a bar mark, with at least one chord.
pub fn is_chord_line(line: &str) -> bool {
    let mut chords = 0;
    for token in line.split_whitespace() {
        if NEUTRAL_TOKENS.contains(&token) {
            continue;
        }
        if !chord_pattern().is_match(token) {
            return false;
        }
        chords += 1;
    }
    chords > 0
}

/// Transpose one chord symbol by `shift` semitones.
pub fn transpose_chord(chord: &str, shift: u8, flats: bool) -> Option<String> {
    let caps = chord_pattern().captures(chord)?;
    let shift = shift % 12;
    let root = pitch_class(&caps[1], caps.get(2).map_or("", |m| m.as_str()));
    let mut out = String::from(spell(root + shift, flats));
    out.push_str(caps.get(3).map_or("", |m| m.as_str()));
    if let Some(bass) = caps.get(4) {
        let bass = pitch_class(bass.as_str(), caps.get(5).map_or("", |m| m.as_str()));
        out.push('/');
        out.push_str(spell(bass + shift, flats));
    }
    Some(out)
}

fn transpose_line(line: &str, shift: u8, flats: bool) -> String {
    let mut out = String::with_capacity(line.len() + 8);
    // Columns the output is ahead of the input; paid back from later spaces.
    let mut debt = 0usize;
    let mut rest = line;
    let mut at_start = true;

    while !rest.is_empty() {
        let is_space = rest.starts_with(char::is_whitespace);
        let end = rest
            .find(|c: char| c.is_whitespace() != is_space)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        rest = tail;

        if is_space {
            let width = run.chars().count();
            let keep = if at_start || debt == 0 {
                width
            } else {
                width.saturating_sub(debt).max(1)
            };
            debt = debt.saturating_sub(width - keep);
            out.extend(std::iter::repeat(' ').take(keep));
        } else {
            let moved = transpose_chord(run, shift, flats).unwrap_or_else(|| run.to_string());
            let (old, new) = (run.chars().count(), moved.chars().count());
            out.push_str(&moved);
            if new > old {
                debt += new - old;
            } else if old > new && !rest.is_empty() {
                out.extend(std::iter::repeat(' ').take(old - new));
            }
        }
        at_start = false;
    }
    out
}

/// Transpose every chord line of `text` from key `from` to key `to`.
pub fn transpose_text(text: &str, from: &Key, to: &Key) -> String {
    let shift = from.semitones_to(to);
    let flats = to.uses_flats();

    text.split('\n')
        .map(|line| {
            let (body, cr) = match line.strip_suffix('\r') {
                Some(body) => (body, "\r"),
                None => (line, ""),
            };
            if is_chord_line(body) {
                format!("{}{}", transpose_line(body, shift, flats), cr)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
