// ============================================================================
// SCHEDULER.RS - Playback Scheduler and Mixer
// ============================================================================
//
// This module turns an ordered sequence of notes into a stream of stereo
// frames. It is the heart of the renderer.
//
// WHAT DOES THE SCHEDULER DO?
// 1. Walks a time cursor forward one sample at a time
// 2. Plucks a new string whenever the next note in the sequence becomes due
// 3. Asks every sounding string for one sample and mixes them into stereo
// 4. Soft clips the mix and hands the 16-bit frame to a FrameSink
// 5. Drops strings that have rung longer than the sustain cap
//
// THE VOICE WINDOW:
// Notes are stored in playback order, and every note gets one slot in the
// voice pool. The strings that are currently sounding are always a
// contiguous run of slots [start, end]:
// - `end` moves forward as notes become due (activation)
// - `start` moves forward as old strings are retired
// Retirement is lazy and ordered: only the string at `start` can be
// retired, and only once it has produced MORE than the sustain cap. The
// newest string (at `end`) is never retired, so the last note of a song
// rings until the end of the file.
//
// TIMING:
// Time is measured in bars. With a bar length of 2 seconds at 44100 Hz one
// frame advances the cursor by 1 / 88200 of a bar. The cursor starts at the
// bar of the first note, and the first note sounds from the very first frame.
// The render stops once the number of emitted frames exceeds
// bar_length * sample_rate * (last bar + 1).
// ============================================================================

use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::audio::{AudioStatistics, FrameSink, MAX_WAV_FRAMES, StereoFrame, WavWriter};
use crate::config::RenderConfig;
use crate::error::{Result, SequencerError};
use crate::helper::{amplitude_compensation, pan_weight, to_pcm16};
use crate::oscillator::PluckedString;
use crate::sequencer::OrderedEventSequence;

// ============================================================================
// VOICE POOL
// ============================================================================

/// Lifecycle of the string belonging to one note of the sequence
#[derive(Debug)]
enum VoiceSlot {
    /// The note has not started yet
    Pending,

    /// The string is sounding
    Active(PluckedString),

    /// The string was dropped and its buffer freed
    Retired,
}

// ============================================================================
// RENDER SUMMARY
// ============================================================================

/// What happened during a render
#[derive(Clone, Debug, Default)]
pub struct RenderSummary {
    /// Stereo frames handed to the sink
    pub frames_written: u64,

    /// Length of the rendered audio in seconds
    pub duration_seconds: f64,

    /// Number of strings plucked
    pub voices_triggered: usize,

    /// Most strings sounding at the same time
    pub peak_polyphony: usize,

    /// Level statistics of the mix (before soft clipping)
    pub statistics: AudioStatistics,
}

// ============================================================================
// PLAYBACK SCHEDULER
// ============================================================================

/// Drives one song from ordered notes to stereo frames
pub struct PlaybackScheduler {
    /// The notes to play, in time order
    sequence: OrderedEventSequence,

    /// Render configuration
    config: RenderConfig,

    /// One slot per note in the sequence
    voices: Vec<VoiceSlot>,

    /// Excitation noise source for new strings
    rng: StdRng,

    /// First sounding slot
    start: usize,

    /// Last sounding slot
    end: usize,

    /// Bar where the time cursor starts
    first_bar: u32,

    /// Frame count that must be exceeded before the render stops
    total_frames: u64,

    /// Running counters for the summary
    voices_triggered: usize,
    peak_polyphony: usize,
    statistics: AudioStatistics,
}

impl PlaybackScheduler {
    /// Creates a scheduler for a song
    ///
    /// An empty sequence is refused with EmptyPlaylist: there is nothing to
    /// render and no file should be created. A song whose frames would not fit
    /// in a WAV file is refused with TooLong before anything is written.
    pub fn new(sequence: OrderedEventSequence, config: RenderConfig) -> Result<Self> {
        config.validate()?;

        let (Some(first_bar), Some(max_bar)) = (sequence.first_bar(), sequence.max_bar()) else {
            return Err(SequencerError::EmptyPlaylist);
        };

        let total_frames = (config.samples_per_bar() * (max_bar as f64 + 1.0)) as u64;

        // One frame more than the total is emitted
        let frames = total_frames.saturating_add(1);
        if frames > MAX_WAV_FRAMES {
            return Err(SequencerError::TooLong {
                frames,
                limit: MAX_WAV_FRAMES,
            });
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let voices = (0..sequence.len()).map(|_| VoiceSlot::Pending).collect();

        let mut scheduler = Self {
            sequence,
            config,
            voices,
            rng,
            start: 0,
            end: 0,
            first_bar,
            total_frames,
            voices_triggered: 0,
            peak_polyphony: 0,
            statistics: AudioStatistics::default(),
        };

        // The window opens on the first note, which sounds from frame zero
        scheduler.activate(0)?;

        info!(
            "[SCHEDULER] {} notes, bars {}..={}, {} frames ({:.2}s/bar)",
            scheduler.sequence.len(),
            first_bar,
            max_bar,
            total_frames,
            scheduler.config.bar_length_seconds
        );

        Ok(scheduler)
    }

    /// Number of frames that must be exceeded before rendering stops
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Renders the whole song into a sink
    pub fn render_into<S: FrameSink>(mut self, sink: &mut S) -> Result<RenderSummary> {
        let mut frames_written: u64 = 0;

        loop {
            let frame = self.tick(frames_written)?;
            sink.push_frame(frame)?;
            frames_written += 1;

            if frames_written > self.total_frames {
                break;
            }
        }

        let summary = RenderSummary {
            frames_written,
            duration_seconds: frames_written as f64 / self.config.sample_rate as f64,
            voices_triggered: self.voices_triggered,
            peak_polyphony: self.peak_polyphony,
            statistics: self.statistics,
        };

        info!(
            "[SCHEDULER] Rendered {} frames ({:.2}s), {} strings, peak polyphony {}",
            summary.frames_written,
            summary.duration_seconds,
            summary.voices_triggered,
            summary.peak_polyphony
        );

        Ok(summary)
    }

    /// Produces the frame at the given tick
    fn tick(&mut self, tick: u64) -> Result<StereoFrame> {
        let now = self.first_bar as f64 + tick as f64 / self.config.samples_per_bar();

        self.activate_due_notes(now)?;
        let frame = self.mix_frame();
        self.retire_finished_voices();

        Ok(frame)
    }

    /// Moves `end` forward over every note whose start time has been reached
    fn activate_due_notes(&mut self, now: f64) -> Result<()> {
        while let Some(next) = self.sequence.get(self.end + 1) {
            if next.time_in_bars() > now {
                break;
            }
            self.end += 1;
            self.activate(self.end)?;
        }

        let polyphony = self.end - self.start + 1;
        self.peak_polyphony = self.peak_polyphony.max(polyphony);
        Ok(())
    }

    /// Plucks the string for the note at `position`
    fn activate(&mut self, position: usize) -> Result<()> {
        let Some(event) = self.sequence.get(position) else {
            return Ok(());
        };

        let string = PluckedString::new(event.frequency(), self.config.sample_rate, &mut self.rng)?;
        debug!(
            "[SCHEDULER] Pluck {:.2} Hz at bar {} index {} (delay line {} samples)",
            event.frequency(),
            event.bar(),
            event.index(),
            string.wavelength()
        );

        self.voices[position] = VoiceSlot::Active(string);
        self.voices_triggered += 1;
        Ok(())
    }

    /// Takes one sample from every sounding string and mixes to stereo
    fn mix_frame(&mut self) -> StereoFrame {
        let mut left = 0.0;
        let mut right = 0.0;

        for slot in &mut self.voices[self.start..=self.end] {
            if let VoiceSlot::Active(string) = slot {
                let frequency = string.frequency();
                let sample = string.next_sample() * amplitude_compensation(frequency);
                let weight = pan_weight(frequency);
                left += weight * sample;
                right += (1.0 - weight) * sample;
            }
        }

        self.statistics.record(right, left);

        StereoFrame {
            right: to_pcm16(right),
            left: to_pcm16(left),
        }
    }

    /// Retires strings from the front of the window that rang past the cap
    fn retire_finished_voices(&mut self) {
        let cap = self.config.sustain_cap_samples();

        while self.start < self.end {
            let produced = match &self.voices[self.start] {
                VoiceSlot::Active(string) => string.samples_produced(),
                VoiceSlot::Pending | VoiceSlot::Retired => u64::MAX,
            };
            if produced <= cap {
                break;
            }

            debug!("[SCHEDULER] Retire note {} after {} samples", self.start, produced);
            self.voices[self.start] = VoiceSlot::Retired;
            self.start += 1;
        }
    }
}

// ============================================================================
// FILE RENDERING
// ============================================================================

/// Renders a sequence straight into a WAV file
///
/// The sequence is validated before the file is opened, so an empty playlist
/// never creates a file. If writing fails part way the partial file is removed.
pub fn render_to_wav(
    sequence: OrderedEventSequence,
    config: RenderConfig,
    path: impl AsRef<Path>,
) -> Result<RenderSummary> {
    let path = path.as_ref();
    let sample_rate = config.sample_rate;
    let scheduler = PlaybackScheduler::new(sequence, config)?;

    let mut writer = WavWriter::create(path, sample_rate)?;
    let result = scheduler.render_into(&mut writer).and_then(|summary| {
        writer
            .finalize()
            .map_err(|source| SequencerError::io(path, source))?;
        Ok(summary)
    });

    if result.is_err() {
        if let Err(error) = fs::remove_file(path) {
            warn!("could not remove partial file {}: {}", path.display(), error);
        }
    }

    result
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreEvent;
    use crate::sequencer::EventSequencer;

    fn sequence(events: &[(f64, u32, f64)]) -> OrderedEventSequence {
        events
            .iter()
            .map(|&(frequency, bar, index)| ScoreEvent::new(frequency, bar, index).unwrap())
            .collect::<EventSequencer>()
            .into_sequence()
    }

    fn seeded_config() -> RenderConfig {
        RenderConfig {
            seed: Some(42),
            ..RenderConfig::default()
        }
    }

    /// A tiny configuration: 100 frames per bar, sustain cap of 25 samples
    fn small_config() -> RenderConfig {
        RenderConfig {
            sample_rate: 100,
            bar_length_seconds: 1.0,
            sustain_seconds: 0.25,
            seed: Some(1),
            ..RenderConfig::default()
        }
    }

    #[test]
    fn test_empty_sequence_is_refused() {
        let result = PlaybackScheduler::new(OrderedEventSequence::default(), seeded_config());
        assert!(matches!(result, Err(SequencerError::EmptyPlaylist)));
    }

    #[test]
    fn test_single_note_length_and_first_frame() {
        let scheduler = PlaybackScheduler::new(sequence(&[(440.0, 0, 0.0)]), seeded_config()).unwrap();
        assert_eq!(scheduler.total_frames(), 88200);

        let mut frames: Vec<StereoFrame> = Vec::new();
        let summary = scheduler.render_into(&mut frames).unwrap();

        // Rendering stops once the count exceeds 88200
        assert_eq!(frames.len(), 88201);
        assert_eq!(summary.frames_written, 88201);
        assert_eq!(summary.voices_triggered, 1);
        assert!(!frames[0].is_silent());
    }

    #[test]
    fn test_total_length_follows_last_bar() {
        let scheduler = PlaybackScheduler::new(
            sequence(&[(440.0, 0, 0.0), (330.0, 3, 0.5)]),
            seeded_config(),
        )
        .unwrap();
        assert_eq!(scheduler.total_frames(), 2 * 44100 * 4);
    }

    #[test]
    fn test_notes_activate_when_due() {
        let mut scheduler =
            PlaybackScheduler::new(sequence(&[(440.0, 0, 0.0), (660.0, 0, 0.5)]), small_config())
                .unwrap();

        for tick in 0..50 {
            scheduler.tick(tick).unwrap();
            assert_eq!(scheduler.end, 0);
        }

        // Index 0.5 of a 100-frame bar is tick 50
        scheduler.tick(50).unwrap();
        assert_eq!(scheduler.end, 1);
        assert!(matches!(scheduler.voices[1], VoiceSlot::Active(_)));
    }

    #[test]
    fn test_notes_due_on_the_same_tick_activate_together() {
        let mut scheduler = PlaybackScheduler::new(
            sequence(&[(440.0, 0, 0.0), (550.0, 0, 0.505), (660.0, 0, 0.5050001), (770.0, 0, 0.515)]),
            small_config(),
        )
        .unwrap();

        for tick in 0..=50 {
            scheduler.tick(tick).unwrap();
        }
        assert_eq!(scheduler.end, 0);

        // 0.505 and 0.5050001 both fall between ticks 50 and 51
        scheduler.tick(51).unwrap();
        assert_eq!(scheduler.end, 2);
        assert!(matches!(scheduler.voices[1], VoiceSlot::Active(_)));
        assert!(matches!(scheduler.voices[2], VoiceSlot::Active(_)));
        assert!(matches!(scheduler.voices[3], VoiceSlot::Pending));
        assert_eq!(scheduler.voices_triggered, 3);
    }

    #[test]
    fn test_song_too_long_for_wav_is_refused() {
        let result = PlaybackScheduler::new(
            sequence(&[(440.0, 0, 0.0), (440.0, 13_000, 0.0)]),
            seeded_config(),
        );
        match result {
            Err(SequencerError::TooLong { frames, limit }) => {
                assert_eq!(frames, 88200 * 13_001 + 1);
                assert_eq!(limit, MAX_WAV_FRAMES);
            }
            Err(other) => panic!("expected TooLong, got {}", other),
            Ok(_) => panic!("a 13000 bar song should not fit in a WAV file"),
        }
    }

    #[test]
    fn test_longest_song_that_fits_is_accepted() {
        // 100 frames per bar: the last bar that still fits in the size fields
        let last_bar = ((MAX_WAV_FRAMES - 1) / 100 - 1) as u32;
        let scheduler =
            PlaybackScheduler::new(sequence(&[(440.0, last_bar, 0.0)]), small_config()).unwrap();
        assert!(scheduler.total_frames() < MAX_WAV_FRAMES);

        let result = PlaybackScheduler::new(sequence(&[(440.0, last_bar + 1, 0.0)]), small_config());
        assert!(matches!(result, Err(SequencerError::TooLong { .. })));
    }

    #[test]
    fn test_invalid_config_is_refused() {
        for config in [
            RenderConfig { sample_rate: 0, ..small_config() },
            RenderConfig { bar_length_seconds: 0.0, ..small_config() },
            RenderConfig { bar_length_seconds: -1.0, ..small_config() },
        ] {
            let result = PlaybackScheduler::new(sequence(&[(440.0, 0, 0.0)]), config);
            assert!(matches!(result, Err(SequencerError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_retirement_waits_until_cap_is_exceeded() {
        let mut scheduler =
            PlaybackScheduler::new(sequence(&[(440.0, 0, 0.0), (660.0, 0, 0.05)]), small_config())
                .unwrap();
        let cap = scheduler.config.sustain_cap_samples();
        assert_eq!(cap, 25);

        // After tick k the first string has produced k + 1 samples
        for tick in 0..25 {
            scheduler.tick(tick).unwrap();
        }
        match &scheduler.voices[0] {
            VoiceSlot::Active(string) => assert_eq!(string.samples_produced(), cap),
            other => panic!("first voice should still be active, got {:?}", other),
        }
        assert_eq!(scheduler.start, 0);

        scheduler.tick(25).unwrap();
        assert_eq!(scheduler.start, 1);
        assert!(matches!(scheduler.voices[0], VoiceSlot::Retired));
    }

    #[test]
    fn test_terminal_voice_is_never_retired() {
        let mut scheduler = PlaybackScheduler::new(sequence(&[(440.0, 0, 0.0)]), small_config()).unwrap();

        for tick in 0..100 {
            scheduler.tick(tick).unwrap();
        }

        assert_eq!(scheduler.start, 0);
        assert!(matches!(scheduler.voices[0], VoiceSlot::Active(_)));
    }

    #[test]
    fn test_window_shrinks_to_newest_voice() {
        let mut scheduler = PlaybackScheduler::new(
            sequence(&[(440.0, 0, 0.0), (550.0, 0, 0.01), (660.0, 0, 0.9)]),
            RenderConfig {
                sustain_seconds: 0.5,
                ..small_config()
            },
        )
        .unwrap();

        for tick in 0..60 {
            scheduler.tick(tick).unwrap();
        }
        // Both strings are past the 50 sample cap, but the second one is still
        // the newest in the window and keeps sounding
        assert_eq!(scheduler.start, 1);
        assert!(matches!(scheduler.voices[1], VoiceSlot::Active(_)));

        for tick in 60..95 {
            scheduler.tick(tick).unwrap();
        }
        assert_eq!(scheduler.end, 2);
        assert_eq!(scheduler.start, 2);
    }

    #[test]
    fn test_same_seed_renders_identically() {
        let notes = [(261.63, 0, 0.0), (329.63, 0, 0.25), (392.0, 0, 0.5)];
        let render = || {
            let mut frames: Vec<StereoFrame> = Vec::new();
            PlaybackScheduler::new(sequence(&notes), seeded_config())
                .unwrap()
                .render_into(&mut frames)
                .unwrap();
            frames
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn test_low_note_leans_right() {
        let mut scheduler = PlaybackScheduler::new(sequence(&[(110.0, 0, 0.0)]), small_config()).unwrap();
        let frames: Vec<StereoFrame> = (0..20).map(|tick| scheduler.tick(tick).unwrap()).collect();

        let right: i64 = frames.iter().map(|f| (f.right as i64).abs()).sum();
        let left: i64 = frames.iter().map(|f| (f.left as i64).abs()).sum();
        assert!(right > left);
    }

    #[test]
    fn test_render_to_wav_writes_file() {
        let path = std::env::temp_dir().join("pluck_sequencer_render_test.wav");
        let summary = render_to_wav(sequence(&[(440.0, 0, 0.0)]), small_config(), &path).unwrap();

        let data = fs::read(&path).unwrap();
        let data_bytes = u32::from_le_bytes([data[40], data[41], data[42], data[43]]);
        assert_eq!(data_bytes as u64, summary.frames_written * 4);
        assert_eq!(summary.frames_written, 101);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_render_to_wav_too_long_creates_no_file() {
        let path = std::env::temp_dir().join("pluck_sequencer_too_long_render.wav");
        let _ = fs::remove_file(&path);

        let error = render_to_wav(
            sequence(&[(440.0, 0, 0.0), (440.0, 4_000_000_000, 0.0)]),
            seeded_config(),
            &path,
        )
        .unwrap_err();
        assert!(matches!(error, SequencerError::TooLong { .. }));
        assert!(!error.is_fatal());
        assert!(!path.exists());
    }

    #[test]
    fn test_render_to_wav_empty_creates_no_file() {
        let path = std::env::temp_dir().join("pluck_sequencer_empty_render.wav");
        let _ = fs::remove_file(&path);

        let error = render_to_wav(OrderedEventSequence::default(), small_config(), &path).unwrap_err();
        assert_eq!(error.to_string(), "Input playlist is empty");
        assert!(!path.exists());
    }
}
