// ============================================================================
// NOTE_TABLE.RS - Note Name to Frequency Lookup
// ============================================================================
//
// Note names in a score ("C4", "F#3", ...) are resolved through a plain text
// table rather than computed, so any tuning can be used by editing the file.
//
// TABLE FORMAT (one note per line):
//   C4<TAB>261.63      two-character names are followed by a tab
//   C#4 277.18         three-character names are followed by one delimiter
//
// The name is the first two characters, plus the third one when the third
// character is not a tab. The frequency is whatever follows the delimiter.
// Lines with a missing or non-positive frequency are skipped with a warning,
// and when a name appears twice the first entry wins.
// ============================================================================

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{trace, warn};

use crate::error::{Result, SequencerError};

/// Default location of the note table, relative to the working directory
pub const DEFAULT_NOTE_TABLE_PATH: &str = "frequencies_of_notes.txt";

/// Maps note names to their frequency in Hz
#[derive(Clone, Debug, Default)]
pub struct NoteTable {
    frequencies: HashMap<String, f64>,
}

impl NoteTable {
    /// Loads the table from a file
    /// A table that cannot be read is a fatal error for the whole program
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SequencerError::NoteTable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// Builds the table from already-loaded text
    pub fn parse(text: &str) -> Self {
        let mut frequencies = HashMap::new();

        for (line_index, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }

            let Some((name, frequency)) = parse_table_line(line) else {
                warn!(
                    "note table line {}: could not read a note and frequency from '{}'",
                    line_index + 1,
                    line
                );
                continue;
            };

            trace!("note table: {} = {} Hz", name, frequency);
            frequencies.entry(name).or_insert(frequency);
        }

        Self { frequencies }
    }

    /// Looks up a note name, returning None for rests and unknown names
    pub fn frequency(&self, name: &str) -> Option<f64> {
        self.frequencies.get(name).copied()
    }

    /// Number of notes in the table
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Returns true if the table holds no notes
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

/// Splits one table line into (name, frequency)
fn parse_table_line(line: &str) -> Option<(String, f64)> {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() < 3 {
        return None;
    }

    // Two-character names are tab delimited; otherwise the name takes three
    // characters and a single delimiter follows.
    let (name_length, value_start) = if chars[2] == '\t' { (2, 3) } else { (3, 4) };
    if chars.len() <= value_start {
        return None;
    }

    let name: String = chars[..name_length].iter().collect();
    let value: String = chars[value_start..].iter().collect();
    let frequency: f64 = value.trim().parse().ok()?;

    if frequency.is_finite() && frequency > 0.0 {
        Some((name, frequency))
    } else {
        None
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_and_three_character_names() {
        let table = NoteTable::parse("A4\t440.00\nC#4 277.18\nBb3\t233.08\n");
        assert_eq!(table.len(), 3);
        assert_eq!(table.frequency("A4"), Some(440.0));
        assert_eq!(table.frequency("C#4"), Some(277.18));
        assert_eq!(table.frequency("Bb3"), Some(233.08));
        assert_eq!(table.frequency("R"), None);
    }

    #[test]
    fn test_first_entry_wins() {
        let table = NoteTable::parse("A4\t440.00\nA4\t432.00\n");
        assert_eq!(table.frequency("A4"), Some(440.0));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let table = NoteTable::parse("A4\tabc\nB4\t-3\nX\n\nC5\t523.25\r\n");
        assert_eq!(table.len(), 1);
        assert_eq!(table.frequency("C5"), Some(523.25));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let path = std::env::temp_dir().join("pluck_sequencer_no_such_table.txt");
        let error = NoteTable::load(&path).unwrap_err();
        assert!(error.is_fatal());
    }

    #[test]
    fn test_shipped_table_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_NOTE_TABLE_PATH);
        let table = NoteTable::load(path).unwrap();
        assert!((table.frequency("A4").unwrap() - 440.0).abs() < 0.01);
        assert!(table.frequency("C#4").is_some());
    }
}
