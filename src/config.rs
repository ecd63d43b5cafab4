// ============================================================================
// CONFIG.RS - Render Configuration
// ============================================================================
//
// All the knobs that shape a render live in RenderConfig. The defaults give
// the classic behaviour: 44.1 kHz output, two seconds per bar, and every
// plucked string allowed to ring for three seconds before it may be dropped.
//
// The binary fills this in from command line flags; tests build it directly.
// ============================================================================

use log::LevelFilter;

use crate::error::{Result, SequencerError};

// ============================================================================
// DEBUG LEVELS
// ============================================================================

/// How much diagnostic output the renderer produces
/// The binary turns this into a log filter for env_logger
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    /// Errors only
    Off = 0,

    /// Basic info: render start/end, note counts, statistics
    #[default]
    Basic = 1,

    /// Verbose: + skipped score lines, voice activations and retirements
    Verbose = 2,

    /// Detailed: + every parsed line and note table entry
    Detailed = 3,
}

impl DebugLevel {
    /// Maps the debug level onto the log crate's filter
    pub fn level_filter(self) -> LevelFilter {
        match self {
            DebugLevel::Off => LevelFilter::Error,
            DebugLevel::Basic => LevelFilter::Info,
            DebugLevel::Verbose => LevelFilter::Debug,
            DebugLevel::Detailed => LevelFilter::Trace,
        }
    }
}

impl std::str::FromStr for DebugLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "0" => Ok(DebugLevel::Off),
            "basic" | "1" => Ok(DebugLevel::Basic),
            "verbose" | "2" => Ok(DebugLevel::Verbose),
            "detailed" | "3" => Ok(DebugLevel::Detailed),
            other => Err(format!(
                "unknown debug level '{}' (expected off, basic, verbose or detailed)",
                other
            )),
        }
    }
}

// ============================================================================
// RENDER CONFIGURATION
// ============================================================================

/// Configuration for turning a sequence of notes into audio
#[derive(Clone, Debug)]
pub struct RenderConfig {
    /// Sample rate in Hz (44100 for CD-quality WAV output)
    pub sample_rate: u32,

    /// How long one bar lasts in seconds
    pub bar_length_seconds: f64,

    /// How long a plucked string keeps its slot before it may be retired
    pub sustain_seconds: f64,

    /// Seed for the pluck excitation noise (None = fresh entropy every render)
    pub seed: Option<u64>,

    /// Diagnostic output level
    pub debug_level: DebugLevel,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            bar_length_seconds: 2.0,
            sustain_seconds: 3.0,
            seed: None,
            debug_level: DebugLevel::Basic,
        }
    }
}

impl RenderConfig {
    /// Checks that the settings describe a playable timeline
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(SequencerError::InvalidConfig("sample rate must be above 0 Hz".into()));
        }
        if !(self.bar_length_seconds.is_finite() && self.bar_length_seconds > 0.0) {
            return Err(SequencerError::InvalidConfig(format!(
                "bar length must be a positive number of seconds, got {}",
                self.bar_length_seconds
            )));
        }
        if !(self.sustain_seconds.is_finite() && self.sustain_seconds >= 0.0) {
            return Err(SequencerError::InvalidConfig(format!(
                "sustain must be zero or more seconds, got {}",
                self.sustain_seconds
            )));
        }
        Ok(())
    }

    /// Number of output frames that make up one bar
    pub fn samples_per_bar(&self) -> f64 {
        self.bar_length_seconds * self.sample_rate as f64
    }

    /// Number of samples a voice may produce before it becomes eligible for retirement
    pub fn sustain_cap_samples(&self) -> u64 {
        (self.sustain_seconds * self.sample_rate as f64) as u64
    }
}
