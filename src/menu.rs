// ============================================================================
// MENU.RS - Interactive Session
// ============================================================================
//
// The renderer is driven from a small text menu:
//
//   ----MENU----
//    1 > Create audio file
//    2 > Exit
//
// Creating a file asks for two base names. ".txt" is appended to the score
// name, and ".wav" to the output name (with _1, _2, ... added when the file
// already exists, so nothing is ever overwritten).
//
// Recoverable problems (missing score, empty score, unwritable output) are
// reported and the menu comes back. Fatal problems (a note index outside its
// bar) end the session with an error.
//
// The session works on any BufRead / Write pair so it can be tested with
// in-memory buffers.
// ============================================================================

use std::io::{BufRead, Write};
use std::path::Path;

use log::info;

use crate::audio::{score_path, unique_output_path};
use crate::config::RenderConfig;
use crate::error::{Result, SequencerError};
use crate::note_table::NoteTable;
use crate::scheduler::{RenderSummary, render_to_wav};
use crate::score::load_score;
use crate::sequencer::EventSequencer;

/// A choice typed at the menu prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuChoice {
    CreateAudioFile,
    Exit,
    Unknown,
}

impl MenuChoice {
    fn parse(text: &str) -> Self {
        match text.trim() {
            "1" => MenuChoice::CreateAudioFile,
            "2" => MenuChoice::Exit,
            _ => MenuChoice::Unknown,
        }
    }
}

/// Renders one score file into a WAV file
///
/// Used by the menu and by the one-shot command line mode.
pub fn create_audio_file<W: Write>(
    score: &Path,
    output_path: &Path,
    note_table: &NoteTable,
    config: &RenderConfig,
    out: &mut W,
) -> Result<RenderSummary> {
    let events = load_score(score, note_table)?;
    let sequence = events.into_iter().collect::<EventSequencer>().into_sequence();
    if sequence.is_empty() {
        return Err(SequencerError::EmptyPlaylist);
    }

    writeln!(
        out,
        "\nThe song will be written to the '{}' file.\nPlease wait.\n",
        output_path.display()
    )?;
    out.flush()?;

    render_to_wav(sequence, config.clone(), output_path)
}

/// Runs the menu until the user exits or input ends
/// Only fatal errors are returned; everything else is reported to `out`.
pub fn run_menu<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    note_table: &NoteTable,
    config: &RenderConfig,
) -> Result<()> {
    loop {
        writeln!(out, "----MENU----")?;
        writeln!(out, " 1 > Create audio file")?;
        writeln!(out, " 2 > Exit")?;
        write!(out, " >> ")?;
        out.flush()?;

        let Some(line) = read_line(input)? else {
            return Ok(());
        };

        match MenuChoice::parse(&line) {
            MenuChoice::Exit => return Ok(()),
            MenuChoice::Unknown => {
                writeln!(out, "Unknown option '{}'. Please enter 1 or 2.", line.trim())?;
            }
            MenuChoice::CreateAudioFile => {
                write!(out, "Input name of the input file: \n> ")?;
                out.flush()?;
                let Some(input_name) = read_line(input)? else {
                    return Ok(());
                };

                write!(out, "Input name of the output file: \n> ")?;
                out.flush()?;
                let Some(output_name) = read_line(input)? else {
                    return Ok(());
                };

                let score = score_path(input_name.trim());
                let output_path = unique_output_path(output_name.trim());

                match create_audio_file(&score, &output_path, note_table, config, out) {
                    Ok(summary) => report_summary(out, &output_path, &summary)?,
                    Err(error) if error.is_fatal() => return Err(error),
                    Err(SequencerError::EmptyPlaylist) => {
                        writeln!(out, "Input playlist is empty!")?;
                    }
                    Err(error) => {
                        writeln!(out, "Error: {}", error)?;
                    }
                }
            }
        }
    }
}

/// Reads one line, returning None at end of input
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line).map_err(SequencerError::Input)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Prints the outcome of a successful render
pub fn report_summary<W: Write>(out: &mut W, output_path: &Path, summary: &RenderSummary) -> Result<()> {
    info!(
        "wrote {}: peak {:.3}, rms {:.3}, {} saturated frames",
        output_path.display(),
        summary.statistics.peak_amplitude,
        summary.statistics.rms_amplitude(),
        summary.statistics.saturated_frames
    );

    writeln!(
        out,
        "Wrote '{}': {:.2}s, {} notes, up to {} sounding at once.",
        output_path.display(),
        summary.duration_seconds,
        summary.voices_triggered,
        summary.peak_polyphony
    )?;
    Ok(())
}

// ============================================================================
// UNIT TESTS
// ============================================================================
