// ============================================================================
// MAIN.RS - Renderer Entry Point
// ============================================================================
//
// Loads the note table, then either:
// - runs the interactive menu (default), or
// - renders one score straight away when --input and --output are given.
//
// Fatal errors (unreadable note table, a note index outside its bar) end the
// program with a non-zero exit status.
// ============================================================================

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use pluck_sequencer::audio::{score_path, unique_output_path};
use pluck_sequencer::config::{DebugLevel, RenderConfig};
use pluck_sequencer::menu::{create_audio_file, report_summary, run_menu};
use pluck_sequencer::note_table::{DEFAULT_NOTE_TABLE_PATH, NoteTable};

/// Renders text scores to WAV files with a plucked-string synthesizer
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Note name to frequency table
    #[arg(long, default_value = DEFAULT_NOTE_TABLE_PATH)]
    notes: PathBuf,

    /// Length of one bar in seconds
    #[arg(long, default_value_t = 2.0)]
    bar_length: f64,

    /// Seed for the pluck noise, for reproducible renders
    #[arg(long)]
    seed: Option<u64>,

    /// Score base name (".txt" is appended); skips the menu
    #[arg(long, requires = "output")]
    input: Option<String>,

    /// Output base name (".wav" is appended, never overwriting)
    #[arg(long, requires = "input")]
    output: Option<String>,

    /// Diagnostic output: off, basic, verbose or detailed
    #[arg(long, default_value = "basic")]
    debug_level: DebugLevel,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = RenderConfig {
        bar_length_seconds: args.bar_length,
        seed: args.seed,
        debug_level: args.debug_level,
        ..RenderConfig::default()
    };

    env_logger::Builder::new()
        .filter_level(config.debug_level.level_filter())
        .parse_default_env()
        .init();

    config.validate().context("checking render settings")?;

    let note_table = NoteTable::load(&args.notes)
        .with_context(|| format!("loading note table {}", args.notes.display()))?;
    info!("Loaded {} notes from {}", note_table.len(), args.notes.display());

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let (Some(input), Some(output)) = (&args.input, &args.output) {
        let score = score_path(input);
        let output_path = unique_output_path(output);
        let summary = create_audio_file(&score, &output_path, &note_table, &config, &mut out)
            .with_context(|| format!("rendering {}", score.display()))?;
        report_summary(&mut out, &output_path, &summary)?;
        out.flush()?;
        return Ok(());
    }

    let stdin = io::stdin();
    run_menu(&mut stdin.lock(), &mut out, &note_table, &config).context("render aborted")?;
    Ok(())
}
