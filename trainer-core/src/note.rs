//! # Note Classification Module
//!
//! This module converts fundamental-frequency estimates into discrete musical
//! note classes for the matching engine. It handles the semitone math, the
//! chromatic name table, and the sharp-collapsing rule used when comparing a
//! sung note against a target.
//!
//! ## Features
//! - Frequency to note-class conversion from a C0 = 16.35 Hz reference
//! - Fixed 10 Hz noise floor below which no note is reported
//! - One-directional sharp collapsing (C# -> C, D# -> D, ...)
//! - Parsing of both "C4" and staff-style "C/4" spellings
//! - Equal-temperament frequency lookup for playback and tests

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Result, anyhow};

/// Chromatic pitch-class names within one octave, index 0 = C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Reference frequency of C0 in Hz. All semitone indices count up from here.
pub const C0_HZ: f64 = 16.35;

/// Frequencies below this are treated as noise rather than notes.
pub const NOISE_FLOOR_HZ: f32 = 10.0;

/// Static map for note name to chromatic index lookups ("C#" -> 1).
static NAME_TO_INDEX: Lazy<BTreeMap<&'static str, u8>> = Lazy::new(|| {
    NOTE_NAMES
        .iter()
        .enumerate()
        .map(|(i, &name)| (name, i as u8))
        .collect()
});

/// A musical note class: a chromatic pitch class plus an octave number.
///
/// The spelling is preserved for display (a sequence note written "F#/4"
/// prints as "F#4"), but *equality* is defined on the collapsed form: the
/// sharp marker is stripped and the sharp compares equal to the natural a
/// semitone below it. "C#4" == "C4", while "C4" != "D4". The collapse is
/// deliberately lossy and one-directional; naturals are never altered.
#[derive(Debug, Clone, Copy)]
pub struct NoteClass {
    /// Chromatic index within the octave (0 = C .. 11 = B).
    semitone: u8,
    /// Octave number; octave 0 starts at C0.
    octave: i32,
}

impl NoteClass {
    /// Builds a note class from a chromatic index (0-11) and an octave.
    ///
    /// # Panics
    /// * If `semitone` is 12 or larger.
    pub fn new(semitone: u8, octave: i32) -> Self {
        assert!(semitone < 12, "chromatic index out of range");
        Self { semitone, octave }
    }

    /// Parses a spelling such as "C4", "C#4", "C/4" or "F#/3".
    ///
    /// The "/" separator is the notation-style spelling used in sequence
    /// files; both forms are accepted everywhere.
    pub fn parse(spelling: &str) -> Result<Self> {
        let s = spelling.trim();
        let name_len = if s.len() > 1 && s.as_bytes()[1] == b'#' { 2 } else { 1 };
        let (name, rest) = s
            .split_at_checked(name_len)
            .ok_or_else(|| anyhow!("note spelling too short: {:?}", spelling))?;
        let semitone = *NAME_TO_INDEX
            .get(name)
            .ok_or_else(|| anyhow!("unknown pitch class in {:?}", spelling))?;
        let octave_str = rest.strip_prefix('/').unwrap_or(rest);
        let octave: i32 = octave_str
            .parse()
            .map_err(|_| anyhow!("bad octave in note spelling {:?}", spelling))?;
        Ok(Self { semitone, octave })
    }

    /// The pitch-class name as spelled, e.g. "C" or "F#".
    pub fn name(&self) -> &'static str {
        NOTE_NAMES[self.semitone as usize]
    }

    /// The octave number.
    pub fn octave(&self) -> i32 {
        self.octave
    }

    /// Chromatic index within the octave as spelled (0-11).
    pub fn semitone(&self) -> u8 {
        self.semitone
    }

    /// Returns this note with any sharp stripped down to its natural.
    ///
    /// Naturals come back unchanged; the octave never moves.
    pub fn collapsed(self) -> Self {
        let semitone = match self.semitone {
            1 | 3 | 6 | 8 | 10 => self.semitone - 1,
            natural => natural,
        };
        Self { semitone, octave: self.octave }
    }

    /// The equal-temperament frequency of this note as spelled, in Hz.
    ///
    /// Derived from the C0 reference, so A4 lands at ~440 Hz (the table is
    /// anchored on the rounded 16.35 Hz constant, not on A440 exactly).
    pub fn frequency(&self) -> f32 {
        let index = self.octave as f64 * 12.0 + self.semitone as f64;
        (C0_HZ * (index / 12.0).exp2()) as f32
    }

    /// The display label, pitch-class name concatenated with the octave,
    /// e.g. "C4" or "F#3".
    pub fn label(&self) -> String {
        format!("{}{}", self.name(), self.octave)
    }
}

impl fmt::Display for NoteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name(), self.octave)
    }
}

// Matching equality: compare collapsed forms, so "C#4" == "C4" by design.
impl PartialEq for NoteClass {
    fn eq(&self, other: &Self) -> bool {
        let a = self.collapsed();
        let b = other.collapsed();
        a.semitone == b.semitone && a.octave == b.octave
    }
}

impl Eq for NoteClass {}

/// Classifies a frequency in Hz as a note class, or `None` for noise.
///
/// Frequencies below [`NOISE_FLOOR_HZ`] are rejected. Otherwise the number of
/// semitones above C0 is computed as `12 * log2(f / 16.35)`, rounded to the
/// nearest integer semitone (ties round half away from zero), and split into
/// a pitch class and an octave. The result is always collapsed: the returned
/// label never contains a sharp marker.
///
/// The function is total over its accepted domain. Input between the noise
/// floor and C0 yields negative octaves rather than an error.
pub fn classify(frequency_hz: f32) -> Option<NoteClass> {
    if frequency_hz < NOISE_FLOOR_HZ {
        return None;
    }

    let semitones_from_c0 = 12.0 * (frequency_hz as f64 / C0_HZ).log2();
    let index = semitones_from_c0.round() as i64;

    let spelled = NoteClass {
        semitone: index.rem_euclid(12) as u8,
        octave: index.div_euclid(12) as i32,
    };
    Some(spelled.collapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_reference_frequencies() {
        let cases = [
            (261.63, "C4"),
            (293.66, "D4"),
            (329.63, "E4"),
            (440.0, "A4"),
            (200.0, "G3"),
            (2093.0, "C7"),
            (16.35, "C0"),
        ];
        for (hz, expected) in cases {
            let note = classify(hz).unwrap();
            assert_eq!(note.label(), expected, "at {hz} Hz");
        }
    }

    #[test]
    fn rejects_sub_threshold_input() {
        assert_eq!(classify(0.5), None);
        assert_eq!(classify(9.99), None);
        assert!(classify(10.0).is_some());
    }

    #[test]
    fn collapses_sharps_to_naturals() {
        // C#4 (277.18 Hz) and A#4 (466.16 Hz) land on their naturals.
        assert_eq!(classify(277.18).unwrap().label(), "C4");
        assert_eq!(classify(466.16).unwrap().label(), "A4");
    }

    #[test]
    fn never_reports_a_sharp() {
        // Sweep a dense frequency grid; the classifier output must be
        // collapsed everywhere.
        let mut hz = NOISE_FLOOR_HZ;
        while hz < 4200.0 {
            let note = classify(hz).unwrap();
            assert!(
                !note.label().contains('#'),
                "classify({hz}) produced {}",
                note.label()
            );
            hz *= 1.013;
        }
    }

    #[test]
    fn rounds_at_half_semitone_boundaries() {
        // The band for semitone index n spans the half-semitone points on
        // either side. Just below the upper boundary stays at n, just above
        // moves to n + 1.
        for n in [0i32, 11, 47, 48, 56, 83] {
            let boundary = C0_HZ * ((n as f64 + 0.5) / 12.0).exp2();
            let below = classify((boundary * 0.999) as f32).unwrap();
            let above = classify((boundary * 1.001) as f32).unwrap();

            let expect = |idx: i32| {
                NoteClass::new(idx.rem_euclid(12) as u8, idx.div_euclid(12)).collapsed()
            };
            assert_eq!(below, expect(n), "just below boundary of {n}");
            assert_eq!(above, expect(n + 1), "just above boundary of {n}");
        }
    }

    #[test]
    fn sub_c0_frequencies_get_negative_octaves() {
        // 12 Hz sits five semitones below C0.
        assert_eq!(classify(12.0).unwrap().label(), "G-1");
    }

    #[test]
    fn parses_both_spellings() {
        assert_eq!(NoteClass::parse("C4").unwrap().label(), "C4");
        assert_eq!(NoteClass::parse("C/4").unwrap().label(), "C4");
        assert_eq!(NoteClass::parse("F#/3").unwrap().label(), "F#3");
        assert_eq!(NoteClass::parse("A-1").unwrap().octave(), -1);
        assert!(NoteClass::parse("H4").is_err());
        assert!(NoteClass::parse("C").is_err());
        assert!(NoteClass::parse("").is_err());
    }

    #[test]
    fn equality_uses_the_collapsed_form() {
        let c = NoteClass::parse("C/4").unwrap();
        let c_sharp = NoteClass::parse("C#/4").unwrap();
        let d = NoteClass::parse("D/4").unwrap();

        assert_eq!(c, c_sharp);
        assert_ne!(c, d);
        assert_ne!(c_sharp, d);
        // Spelling survives for display even though the classes are equal.
        assert_eq!(c_sharp.label(), "C#4");
    }

    #[test]
    fn frequency_matches_equal_temperament() {
        let a4 = NoteClass::parse("A4").unwrap();
        assert!((a4.frequency() - 440.0).abs() < 0.5);

        let c4 = NoteClass::parse("C4").unwrap();
        assert!((c4.frequency() - 261.63).abs() < 0.5);
    }

    #[test]
    fn classify_inverts_frequency() {
        for spelling in ["C2", "G3", "A4", "E5", "B6"] {
            let note = NoteClass::parse(spelling).unwrap();
            assert_eq!(classify(note.frequency()), Some(note));
        }
    }
}
