//! # Target Sequence Module
//!
//! The ordered melody the user is asked to reproduce. A sequence is fixed at
//! construction and never mutated during a matching session; custom melodies
//! can be saved to and loaded from JSON files.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::note::NoteClass;

/// The built-in practice melody, in staff spelling.
pub const DEFAULT_MELODY: [&str; 9] = [
    "C/4", "D/4", "E/4", "F/4", "G/4", "F/4", "E/4", "D/4", "C/4",
];

/// An ordered, immutable sequence of note classes.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSequence {
    notes: Vec<NoteClass>,
}

/// On-disk form of a sequence: note spellings only, so files stay
/// hand-editable.
#[derive(Serialize, Deserialize)]
struct SequenceFile {
    notes: Vec<String>,
}

impl TargetSequence {
    pub fn new(notes: Vec<NoteClass>) -> Self {
        Self { notes }
    }

    /// Builds a sequence from note spellings such as "C/4" or "F#3".
    ///
    /// Fails with a descriptive error naming the first bad entry.
    pub fn parse<S: AsRef<str>>(spellings: &[S]) -> Result<Self> {
        let notes = spellings
            .iter()
            .map(|s| {
                NoteClass::parse(s.as_ref())
                    .with_context(|| format!("in sequence entry {:?}", s.as_ref()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { notes })
    }

    /// The built-in C-major practice melody.
    pub fn default_melody() -> Self {
        // The constant above is known-good spelling.
        Self::parse(&DEFAULT_MELODY).expect("built-in melody parses")
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// The note at position `index`.
    ///
    /// # Panics
    /// * If `index` is out of bounds.
    pub fn note(&self, index: usize) -> NoteClass {
        self.notes[index]
    }

    pub fn notes(&self) -> &[NoteClass] {
        &self.notes
    }

    /// Writes the sequence to a JSON file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = SequenceFile {
            notes: self.notes.iter().map(|n| n.label()).collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let mut out = File::create(path.as_ref())
            .with_context(|| format!("creating {}", path.as_ref().display()))?;
        out.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Reads a sequence back from a JSON file written by [`save_to_file`]
    /// (or edited by hand).
    ///
    /// [`save_to_file`]: TargetSequence::save_to_file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut data = String::new();
        File::open(path.as_ref())
            .with_context(|| format!("opening {}", path.as_ref().display()))?
            .read_to_string(&mut data)?;
        let file: SequenceFile = serde_json::from_str(&data)?;
        Self::parse(&file.notes)
    }
}

impl Default for TargetSequence {
    fn default() -> Self {
        Self::default_melody()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_melody_has_nine_notes() {
        let seq = TargetSequence::default_melody();
        assert_eq!(seq.len(), 9);
        assert_eq!(seq.note(0).label(), "C4");
        assert_eq!(seq.note(4).label(), "G4");
        assert_eq!(seq.note(8).label(), "C4");
    }

    #[test]
    fn parse_reports_the_bad_entry() {
        let err = TargetSequence::parse(&["C/4", "X/9"]).unwrap_err();
        assert!(err.to_string().contains("X/9"), "got: {err:#}");
    }

    #[test]
    fn round_trips_through_json() {
        let dir = std::env::temp_dir();
        let path = dir.join("trainer-sequence-test.json");

        let seq = TargetSequence::parse(&["E/4", "F#/4", "G/4"]).unwrap();
        seq.save_to_file(&path).unwrap();
        let loaded = TargetSequence::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(seq, loaded);
        // Spelling survives the trip.
        assert_eq!(loaded.note(1).label(), "F#4");
    }
}
