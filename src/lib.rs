// ============================================================================
// LIB.RS - pluckSequencer
// ============================================================================
//
// Turns a text score into a stereo 16-bit WAV file, playing every note on a
// Karplus-Strong plucked string.
//
// PIPELINE:
//   score text --(score)--> ScoreEvents
//              --(sequencer)--> OrderedEventSequence
//              --(scheduler + oscillator)--> StereoFrames
//              --(audio)--> WAV file
// ============================================================================

pub mod audio;
pub mod config;
pub mod error;
pub mod helper;
pub mod menu;
pub mod note_table;
pub mod oscillator;
pub mod scheduler;
pub mod score;
pub mod sequencer;

pub use audio::{FrameSink, StereoFrame, WavWriter};
pub use config::{DebugLevel, RenderConfig};
pub use error::SequencerError;
pub use note_table::NoteTable;
pub use oscillator::PluckedString;
pub use scheduler::{PlaybackScheduler, RenderSummary, render_to_wav};
pub use score::{ScoreEvent, parse_score};
pub use sequencer::{EventSequencer, OrderedEventSequence};
