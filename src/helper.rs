// ============================================================================
// HELPER.RS - Shared DSP Constants and Math
// ============================================================================
//
// Small pieces of audio math used by more than one module:
// - The stereo pan law (which channel a string leans towards)
// - Amplitude compensation (high strings are quieter, so they get a boost)
// - Soft clipping and conversion to 16-bit samples
// ============================================================================

// Re-export PI so other modules can use crate::helper::PI
pub use std::f64::consts::PI;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Frequency (Hz) at which the pan law flips from one slope to the other
pub const PAN_PIVOT_HZ: f64 = 525.0;

/// Frequency (Hz) at which a high note is fully panned left
pub const PAN_CEILING_HZ: f64 = 5000.0;

/// Output scale applied after soft clipping, a little below i16::MAX for headroom
pub const OUTPUT_SCALE: f64 = 32700.0;

// ============================================================================
// PANNING AND LEVEL
// ============================================================================

/// Returns the fraction of a string's signal sent to the LEFT channel
/// The right channel receives 1.0 minus this value.
///
/// Below the pivot the weight is (525 + delta) / 525 where delta = f - 525,
/// so it climbs from 0.0 at 0 Hz to 1.0 at the pivot. At and above the pivot
/// it restarts at 0.0 and climbs to 1.0 at 5 kHz. Results are clamped to [0, 1].
#[inline]
pub fn pan_weight(frequency_hz: f64) -> f64 {
    let delta = frequency_hz - PAN_PIVOT_HZ;
    let weight = if delta < 0.0 {
        (PAN_PIVOT_HZ + delta) / PAN_PIVOT_HZ
    } else {
        delta / (PAN_CEILING_HZ - PAN_PIVOT_HZ)
    };
    weight.clamp(0.0, 1.0)
}

/// Level boost for a string of the given frequency
/// Short (high) strings carry less energy, so they are lifted by f^0.33 / 18
#[inline]
pub fn amplitude_compensation(frequency_hz: f64) -> f64 {
    frequency_hz.powf(0.33) / 18.0
}

// ============================================================================
// OUTPUT CONVERSION
// ============================================================================

/// Soft clipper: smooth saturation that never leaves [-1, 1]
#[inline]
pub fn soft_clip(sample: f64) -> f64 {
    sample.tanh()
}

/// Soft clips a mixed sample and scales it into the 16-bit range
#[inline]
pub fn to_pcm16(sample: f64) -> i16 {
    (soft_clip(sample) * OUTPUT_SCALE) as i16
}

// ============================================================================
// UNIT TESTS
// ============================================================================
