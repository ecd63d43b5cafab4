// ============================================================================
// SCORE.RS - Score Events and Score File Parser
// ============================================================================
//
// A score is a text file with one note (or rest) per line:
//
//   <bar> <index><TAB><note>
//
//   0 0.0	C4
//   0 0.5	E4
//   1 0.25	F#4
//
// - bar:   which bar the note is in (0, 1, 2, ...)
// - index: where inside the bar it starts, from 0.0 (inclusive) to 1.0 (exclusive)
// - note:  a 2 or 3 character name looked up in the NoteTable
//
// The note name is taken from the END of the line: when the character three
// places from the end is a tab the name is two characters long, otherwise it
// is three. Anything not found in the table (rests, typos) is skipped, as are
// lines whose bar and index cannot be read. An index outside [0, 1) on a real
// note is a fatal error.
// ============================================================================

use std::fs;
use std::path::Path;

use log::{debug, trace};

use crate::error::{Result, SequencerError};
use crate::note_table::NoteTable;

// ============================================================================
// SCORE EVENT
// ============================================================================

/// One note of the score: what pitch, and when it starts
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreEvent {
    /// Pitch in Hz (always positive)
    frequency: f64,

    /// Bar number (0-indexed)
    bar: u32,

    /// Position inside the bar, in [0.0, 1.0)
    index: f64,
}

impl ScoreEvent {
    /// Creates a validated event
    ///
    /// Fails with IndexOutOfRange when index is not in [0, 1) and with
    /// InvalidFrequency when the frequency is not a positive number.
    pub fn new(frequency: f64, bar: u32, index: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&index) {
            return Err(SequencerError::IndexOutOfRange { bar, index });
        }
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(SequencerError::InvalidFrequency(frequency));
        }
        Ok(Self {
            frequency,
            bar,
            index,
        })
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn bar(&self) -> u32 {
        self.bar
    }

    pub fn index(&self) -> f64 {
        self.index
    }

    /// Sort key: bar * 10 + index
    /// Since index < 1 this keeps bars in order and never collides across bars
    pub fn key(&self) -> f64 {
        self.bar as f64 * 10.0 + self.index
    }

    /// Absolute start time measured in bars
    pub fn time_in_bars(&self) -> f64 {
        self.bar as f64 + self.index
    }
}

// ============================================================================
// SCORE PARSING
// ============================================================================

/// Reads and parses a score file
/// A file that cannot be opened is a recoverable error
pub fn load_score(path: impl AsRef<Path>, note_table: &NoteTable) -> Result<Vec<ScoreEvent>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| SequencerError::io(path, source))?;
    parse_score(&text, note_table)
}

/// Parses score text into events, in file order
pub fn parse_score(text: &str, note_table: &NoteTable) -> Result<Vec<ScoreEvent>> {
    let mut events = Vec::new();

    for (line_index, raw_line) in text.lines().enumerate() {
        let line_number = line_index + 1;
        let line = raw_line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }

        let Some((bar, index)) = parse_position(line) else {
            debug!("score line {}: no bar/index in '{}', skipping", line_number, line);
            continue;
        };

        let Some(name) = extract_note_name(line) else {
            debug!("score line {}: line too short for a note name, skipping", line_number);
            continue;
        };

        match note_table.frequency(name) {
            Some(frequency) => {
                trace!(
                    "score line {}: bar {} index {} note {} ({} Hz)",
                    line_number, bar, index, name, frequency
                );
                events.push(ScoreEvent::new(frequency, bar, index)?);
            }
            None => {
                debug!("score line {}: '{}' is a rest or unknown note, skipping", line_number, name);
            }
        }
    }

    Ok(events)
}

/// Reads the leading "<bar> <index>" pair of a line
fn parse_position(line: &str) -> Option<(u32, f64)> {
    let mut fields = line.split_whitespace();
    let bar = fields.next()?.parse::<u32>().ok()?;
    let index = fields.next()?.parse::<f64>().ok()?;
    Some((bar, index))
}

/// Picks the note name off the end of a line by column position
fn extract_note_name(line: &str) -> Option<&str> {
    let boundaries: Vec<usize> = line.char_indices().map(|(offset, _)| offset).collect();
    let length = boundaries.len();
    if length < 3 {
        return None;
    }

    let tab_position = boundaries[length - 3];
    if line[tab_position..].starts_with('\t') {
        Some(&line[boundaries[length - 2]..])
    } else {
        Some(&line[tab_position..])
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
