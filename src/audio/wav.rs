// WAV encoding for finished recordings and in-memory transcription payloads

use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Errors that can occur during WAV encoding or decoding
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WavError {
    /// I/O error (directory creation, file write)
    #[error("I/O error: {0}")]
    Io(String),
    /// Error from the WAV encoder/decoder
    #[error("encoding error: {0}")]
    Encoding(String),
}

fn hound_error(e: hound::Error) -> WavError {
    WavError::Encoding(e.to_string())
}

fn spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Write mono 16-bit PCM samples to a WAV file
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<(), WavError> {
    let mut writer = hound::WavWriter::create(path, spec(sample_rate)).map_err(hound_error)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(hound_error)?;
    }
    writer.finalize().map_err(hound_error)?;
    Ok(())
}

/// Encode mono 16-bit PCM samples as an in-memory WAV byte buffer
///
/// Used to hand audio snapshots to the transcription service without
/// touching the filesystem.
pub fn encode_wav_bytes(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, WavError> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec(sample_rate)).map_err(hound_error)?;
        for &sample in samples {
            writer.write_sample(sample).map_err(hound_error)?;
        }
        writer.finalize().map_err(hound_error)?;
    }
    Ok(cursor.into_inner())
}

/// Read all samples back from a mono 16-bit WAV file
pub fn read_wav(path: &Path) -> Result<(Vec<i16>, u32), WavError> {
    let mut reader = hound::WavReader::open(path).map_err(hound_error)?;
    let sample_rate = reader.spec().sample_rate;
    let samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
    Ok((samples.map_err(hound_error)?, sample_rate))
}

/// Generates output paths for finished recordings
///
/// Files are named with a timestamp so concurrent tooling can sort them;
/// the directory is created on first use.
#[derive(Debug, Clone)]
pub struct RecordingWriter {
    output_dir: PathBuf,
}

impl RecordingWriter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    /// Reserve a fresh output path for a recording
    pub fn next_path(&self, label: &str) -> Result<PathBuf, WavError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| WavError::Io(e.to_string()))?;
        let now = chrono::Utc::now();
        let filename = format!(
            "recording-{}-{}.wav",
            label,
            now.format("%Y-%m-%d-%H%M%S%3f")
        );
        Ok(self.output_dir.join(filename))
    }
}
