// ============================================================================
// ERROR.RS - Error Taxonomy
// ============================================================================
//
// Everything that can go wrong while turning a score into a WAV file ends up
// here. Errors fall into two groups:
// - FATAL: bad input data (note index outside its bar, a non-positive
//   frequency, an unreadable note table) or unusable render settings. The program reports and exits.
// - RECOVERABLE: a file could not be opened or written, the score had no
//   playable notes, or the song is too long for a WAV file. The menu reports the problem and asks again.
//
// Things that are NOT errors at all (unknown note names, duplicate note
// positions, unparseable lines) are skipped quietly by the parser and the
// sequencer and never reach this type.
// ============================================================================

use std::path::PathBuf;

use thiserror::Error;

/// Everything the sequencer library can fail with
#[derive(Debug, Error)]
pub enum SequencerError {
    /// A note index must lie in [0.0, 1.0) within its bar
    #[error("invalid note index {index} in bar {bar}: index must be between 0.0 and 1.0 (exclusive)")]
    IndexOutOfRange { bar: u32, index: f64 },

    /// A string cannot be built for a frequency that is zero, negative or NaN
    #[error("invalid note frequency {0} Hz: frequency must be positive")]
    InvalidFrequency(f64),

    /// The note name table could not be read
    #[error("note table {}: {source}", .path.display())]
    NoteTable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Render settings that cannot produce audio
    #[error("invalid render configuration: {0}")]
    InvalidConfig(String),

    /// The score contained no playable notes
    #[error("Input playlist is empty")]
    EmptyPlaylist,

    /// The song would not fit in a WAV file's 32-bit size fields
    #[error("song too long: {frames} frames exceed the WAV limit of {limit} frames")]
    TooLong { frames: u64, limit: u64 },

    /// An input or output file could not be opened, read or written
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The interactive input could not be read
    #[error("failed to read input: {0}")]
    Input(#[source] std::io::Error),

    /// Rendered audio could not be handed to the output
    #[error("failed to write audio output: {0}")]
    Output(#[from] std::io::Error),
}

impl SequencerError {
    /// Wraps an I/O error together with the file it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the process should stop instead of returning to the menu
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::IndexOutOfRange { .. }
                | Self::InvalidFrequency(_)
                | Self::NoteTable { .. }
                | Self::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SequencerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SequencerError::IndexOutOfRange { bar: 0, index: 1.0 }.is_fatal());
        assert!(SequencerError::InvalidFrequency(-1.0).is_fatal());
        assert!(SequencerError::InvalidConfig("sample rate is zero".into()).is_fatal());
        assert!(!SequencerError::EmptyPlaylist.is_fatal());
        assert!(!SequencerError::TooLong { frames: 2, limit: 1 }.is_fatal());

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(!SequencerError::io("song.txt", io).is_fatal());

        let io = std::io::Error::new(std::io::ErrorKind::WriteZero, "disk full");
        assert!(!SequencerError::from(io).is_fatal());
    }

    #[test]
    fn test_input_error_message() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin closed");
        let message = SequencerError::Input(io).to_string();
        assert!(message.starts_with("failed to read input"));
        assert!(!message.contains("audio output"));
    }

    #[test]
    fn test_empty_playlist_message() {
        assert_eq!(SequencerError::EmptyPlaylist.to_string(), "Input playlist is empty");
    }
}
