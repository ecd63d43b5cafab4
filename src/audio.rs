// ============================================================================
// AUDIO.RS - WAV Export and Audio Statistics
// ============================================================================
//
// This module handles everything that happens after a stereo frame has been
// mixed:
// - Streaming frames into a 16-bit stereo PCM WAV file
// - Picking an output filename that does not overwrite an existing file
// - Collecting statistics (peak, RMS, saturation) about the rendered song
//
// STREAMING:
// The renderer produces frames one at a time, and the WAV header needs the
// final data size up front. WavWriter writes the header with zero sizes,
// streams the frames, then seeks back and patches the two size fields once
// the frame count is known.
// ============================================================================

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SequencerError};

// ============================================================================
// WAV FILE FORMAT
// ============================================================================
//
// WAV is a simple uncompressed audio format. The structure is:
// 1. RIFF header (12 bytes)
// 2. Format chunk (24 bytes)
// 3. Data chunk header (8 bytes)
// 4. Audio data (variable length)
//
// We always write:
// - 16-bit signed PCM samples (format tag 1)
// - 2 channels, each frame stored right sample first, then left
// ============================================================================

/// WAV format constants
const WAV_FORMAT_PCM: u16 = 1;
const CHANNEL_COUNT: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;

/// Bytes in one stereo frame (2 channels * 2 bytes)
pub const BYTES_PER_FRAME: u32 = (CHANNEL_COUNT * BITS_PER_SAMPLE / 8) as u32;

/// Size of the header written before the sample data
pub const WAV_HEADER_BYTES: u64 = 44;

/// Most frames whose RIFF chunk size (data + 36) still fits in a u32
pub const MAX_WAV_FRAMES: u64 = (u32::MAX as u64 - 36) / BYTES_PER_FRAME as u64;

/// One output frame: a 16-bit sample for each channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StereoFrame {
    pub right: i16,
    pub left: i16,
}

impl StereoFrame {
    pub const SILENCE: StereoFrame = StereoFrame { right: 0, left: 0 };

    pub fn is_silent(&self) -> bool {
        self.right == 0 && self.left == 0
    }
}

// ============================================================================
// FRAME SINK
// ============================================================================

/// Anything that can receive rendered frames in time order
pub trait FrameSink {
    fn push_frame(&mut self, frame: StereoFrame) -> io::Result<()>;
}

/// Collecting frames in memory (used by tests and tools)
impl FrameSink for Vec<StereoFrame> {
    fn push_frame(&mut self, frame: StereoFrame) -> io::Result<()> {
        self.push(frame);
        Ok(())
    }
}

// ============================================================================
// WAV WRITER
// ============================================================================

/// Streams stereo frames into a WAV container
pub struct WavWriter<W: Write + Seek> {
    /// Destination (file or in-memory cursor)
    inner: W,

    /// Sample rate written into the header
    sample_rate: u32,

    /// Frames written so far
    frames_written: u64,
}

impl WavWriter<BufWriter<File>> {
    /// Creates (or truncates) a WAV file on disk
    /// Failing to open the destination is a recoverable error
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| SequencerError::io(path, source))?;
        WavWriter::new(BufWriter::new(file), sample_rate).map_err(|source| SequencerError::io(path, source))
    }
}

impl<W: Write + Seek> WavWriter<W> {
    /// Wraps a seekable writer and writes a placeholder header
    pub fn new(mut inner: W, sample_rate: u32) -> io::Result<Self> {
        write_header(&mut inner, sample_rate, 0)?;
        Ok(Self {
            inner,
            sample_rate,
            frames_written: 0,
        })
    }

    /// Appends one frame (right sample, then left sample, little-endian)
    pub fn write_frame(&mut self, frame: StereoFrame) -> io::Result<()> {
        self.inner.write_all(&frame.right.to_le_bytes())?;
        self.inner.write_all(&frame.left.to_le_bytes())?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Patches the size fields and hands back the underlying writer
    pub fn finalize(mut self) -> io::Result<W> {
        let data_bytes = self
            .frames_written
            .checked_mul(BYTES_PER_FRAME as u64)
            .and_then(|bytes| u32::try_from(bytes).ok())
            .filter(|bytes| bytes.checked_add(36).is_some())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "audio too long for a WAV file"))?;

        self.inner.seek(SeekFrom::Start(0))?;
        write_header(&mut self.inner, self.sample_rate, data_bytes)?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write + Seek> FrameSink for WavWriter<W> {
    fn push_frame(&mut self, frame: StereoFrame) -> io::Result<()> {
        self.write_frame(frame)
    }
}

/// Writes the 44-byte RIFF/WAVE header
fn write_header<W: Write>(writer: &mut W, sample_rate: u32, data_bytes: u32) -> io::Result<()> {
    let block_align = CHANNEL_COUNT * (BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate * block_align as u32;
    let riff_chunk_size = data_bytes + 36;

    // ---- RIFF Header ----
    writer.write_all(b"RIFF")?;
    writer.write_all(&riff_chunk_size.to_le_bytes())?;
    writer.write_all(b"WAVE")?;

    // ---- Format Chunk ----
    writer.write_all(b"fmt ")?;
    writer.write_all(&16u32.to_le_bytes())?; // Chunk size (16 for PCM)
    writer.write_all(&WAV_FORMAT_PCM.to_le_bytes())?;
    writer.write_all(&CHANNEL_COUNT.to_le_bytes())?;
    writer.write_all(&sample_rate.to_le_bytes())?;
    writer.write_all(&byte_rate.to_le_bytes())?;
    writer.write_all(&block_align.to_le_bytes())?;
    writer.write_all(&BITS_PER_SAMPLE.to_le_bytes())?;

    // ---- Data Chunk Header ----
    writer.write_all(b"data")?;
    writer.write_all(&data_bytes.to_le_bytes())?;

    Ok(())
}

// ============================================================================
// FILE NAMING
// ============================================================================

/// Score file for a base name typed at the menu: "song" -> "song.txt"
pub fn score_path(base_name: &str) -> PathBuf {
    PathBuf::from(format!("{}.txt", base_name))
}

/// Output file for a base name, never overwriting an existing file
/// "song" -> "song.wav", or "song_1.wav", "song_2.wav", ... if taken
pub fn unique_output_path(base_name: &str) -> PathBuf {
    let mut candidate = PathBuf::from(format!("{}.wav", base_name));
    let mut counter = 1;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{}_{}.wav", base_name, counter));
        counter += 1;
    }
    candidate
}

// ============================================================================
// AUDIO STATISTICS
// ============================================================================

/// Running statistics about the mixed signal, gathered before soft clipping
#[derive(Clone, Debug, Default)]
pub struct AudioStatistics {
    /// Number of frames recorded
    pub frame_count: u64,

    /// Peak amplitude (absolute value) on either channel
    pub peak_amplitude: f64,

    /// Sum of squared samples, both channels
    sum_squared: f64,

    /// Frames where either channel went past 1.0 and was squashed by the soft clipper
    pub saturated_frames: u64,
}

impl AudioStatistics {
    /// Records one mixed frame
    pub fn record(&mut self, right: f64, left: f64) {
        self.frame_count += 1;
        self.peak_amplitude = self.peak_amplitude.max(right.abs()).max(left.abs());
        self.sum_squared += right * right + left * left;
        if right.abs() > 1.0 || left.abs() > 1.0 {
            self.saturated_frames += 1;
        }
    }

    /// RMS (root mean square) amplitude over both channels
    pub fn rms_amplitude(&self) -> f64 {
        if self.frame_count == 0 {
            return 0.0;
        }
        (self.sum_squared / (self.frame_count * 2) as f64).sqrt()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
