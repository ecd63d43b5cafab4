// ============================================================================
// OSCILLATOR.RS - Plucked String Synthesis (Karplus-Strong)
// ============================================================================
//
// Every note in the song is played by its own PluckedString.
//
// HOW DOES IT WORK?
// A vibrating string is modelled as a delay line: a circular buffer whose
// length is one period of the note (sample_rate / frequency samples). The
// buffer starts full of random noise - that is the "pluck". Each time a
// sample is requested:
//
// 1. The sample under the read cursor is the output.
// 2. It is averaged with the previous output (75% / 25%) and scaled by 0.999.
//    Averaging smooths away high partials, the scaling drains energy, so the
//    noise quickly turns into a decaying pitched tone.
// 3. A one-pole low-pass filter (30 kHz cutoff) smooths the value further.
// 4. The filtered value is written back under the write cursor.
// 5. Both cursors move one step around the buffer.
//
// STABILITY:
// The feedback gain is below one and the filter output is a weighted average
// of values already in range, so the output can never grow past the initial
// excitation level of 0.5.
// ============================================================================

use rand::Rng;

use crate::error::{Result, SequencerError};
use crate::helper::PI;

/// How much energy the string keeps per trip around the delay line
pub const DAMPING: f64 = 0.999;

/// Weight of the freshly read sample in the averaging step (the previous output gets the rest)
pub const CURRENT_SAMPLE_WEIGHT: f64 = 0.75;

/// Cutoff of the feedback low-pass filter in Hz
pub const FEEDBACK_CUTOFF_HZ: f64 = 30_000.0;

/// Smoothing coefficient of a one-pole RC low-pass filter
/// alpha = 1 / (1 + RC * sample_rate), with RC = 1 / (2 * PI * cutoff)
pub fn lowpass_alpha(cutoff_hz: f64, sample_rate: u32) -> f64 {
    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    1.0 / (1.0 + rc * sample_rate as f64)
}

// ============================================================================
// PLUCKED STRING
// ============================================================================

/// Runtime state of one plucked string voice
#[derive(Clone, Debug)]
pub struct PluckedString {
    /// Pitch in Hz
    frequency: f64,

    /// Delay line holding one period of the waveform
    waveform: Vec<f64>,

    /// Where the next output sample is read from
    read_position: usize,

    /// Where the next filtered sample is written to
    write_position: usize,

    /// Output of the previous call (used in the averaging step)
    previous_output: f64,

    /// Carried state of the low-pass filter
    previous_input: f64,

    /// Filter smoothing coefficient, fixed per sample rate
    alpha: f64,

    /// How many samples this string has produced
    samples_produced: u64,
}

impl PluckedString {
    /// Plucks a new string
    ///
    /// Parameters:
    /// - frequency: pitch in Hz, must be positive
    /// - sample_rate: output sample rate in Hz
    /// - rng: source of the excitation noise
    pub fn new<R: Rng>(frequency: f64, sample_rate: u32, rng: &mut R) -> Result<Self> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(SequencerError::InvalidFrequency(frequency));
        }

        // One period of the note; very high notes still get a one-sample line
        let wavelength = ((sample_rate as f64 / frequency).round() as usize).max(1);

        let waveform: Vec<f64> = (0..wavelength)
            .map(|_| rng.random_range(-0.5..0.5))
            .collect();
        let previous_output = rng.random_range(-0.5..0.5);

        Ok(Self {
            frequency,
            waveform,
            read_position: 1 % wavelength,
            write_position: 0,
            previous_output,
            previous_input: 0.0,
            alpha: lowpass_alpha(FEEDBACK_CUTOFF_HZ, sample_rate),
            samples_produced: 0,
        })
    }

    /// Produces the next output sample and feeds the filtered value back in
    pub fn next_sample(&mut self) -> f64 {
        let output = self.waveform[self.read_position];

        let blended = DAMPING
            * (CURRENT_SAMPLE_WEIGHT * output + (1.0 - CURRENT_SAMPLE_WEIGHT) * self.previous_output);
        let filtered = self.alpha * blended + (1.0 - self.alpha) * self.previous_input;
        self.previous_input = filtered;

        self.waveform[self.write_position] = filtered;

        let wavelength = self.waveform.len();
        self.read_position = (self.read_position + 1) % wavelength;
        self.write_position = (self.write_position + 1) % wavelength;

        self.previous_output = output;
        self.samples_produced += 1;

        output
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Length of the delay line in samples
    pub fn wavelength(&self) -> usize {
        self.waveform.len()
    }

    pub fn samples_produced(&self) -> u64 {
        self.samples_produced
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_wavelength_matches_pitch() {
        let mut rng = StdRng::seed_from_u64(1);
        let string = PluckedString::new(440.0, 44100, &mut rng).unwrap();
        assert_eq!(string.wavelength(), 100);

        let high = PluckedString::new(200_000.0, 44100, &mut rng).unwrap();
        assert_eq!(high.wavelength(), 1);
    }

    #[test]
    fn test_rejects_non_positive_frequency() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(PluckedString::new(0.0, 44100, &mut rng).is_err());
        assert!(PluckedString::new(-440.0, 44100, &mut rng).is_err());
        assert!(PluckedString::new(f64::NAN, 44100, &mut rng).is_err());
    }

    #[test]
    fn test_output_stays_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        for frequency in [55.0, 440.0, 3520.0, 20000.0] {
            let mut string = PluckedString::new(frequency, 44100, &mut rng).unwrap();
            for _ in 0..10_000 {
                let sample = string.next_sample();
                assert!((-1.0..=1.0).contains(&sample), "{} Hz gave {}", frequency, sample);
            }
            assert_eq!(string.samples_produced(), 10_000);
        }
    }

    #[test]
    fn test_string_decays() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut string = PluckedString::new(220.0, 44100, &mut rng).unwrap();

        let early: f64 = (0..2000).map(|_| string.next_sample().abs()).sum();
        for _ in 0..(3 * 44100) {
            string.next_sample();
        }
        let late: f64 = (0..2000).map(|_| string.next_sample().abs()).sum();

        assert!(late < early);
    }

    #[test]
    fn test_same_seed_same_samples() {
        let mut first = PluckedString::new(330.0, 44100, &mut StdRng::seed_from_u64(99)).unwrap();
        let mut second = PluckedString::new(330.0, 44100, &mut StdRng::seed_from_u64(99)).unwrap();
        for _ in 0..1000 {
            assert_eq!(first.next_sample(), second.next_sample());
        }
    }

    #[test]
    fn test_first_sample_comes_from_excitation() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut string = PluckedString::new(440.0, 44100, &mut rng).unwrap();
        let first = string.next_sample();
        assert!((-0.5..0.5).contains(&first));
        assert!(first != 0.0);
    }

    #[test]
    fn test_lowpass_alpha_range() {
        let alpha = lowpass_alpha(FEEDBACK_CUTOFF_HZ, 44100);
        assert!(alpha > 0.0 && alpha < 1.0);
    }
}
