//! Audio plumbing: PCM from the speech API into WAV, and learner recordings in.

use std::fmt;
use std::io::Cursor;

use base64::Engine;

/// Sample rate of the raw PCM returned by the speech endpoint.
pub const TTS_SAMPLE_RATE: u32 = 24_000;

/// Samples at or below this amplitude count as silence when trimming the start.
const SILENCE_AMPLITUDE: i16 = 16;

#[derive(Debug)]
pub enum AudioError {
  Base64(base64::DecodeError),
  Wav(hound::Error),
  Empty,
}

impl fmt::Display for AudioError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AudioError::Base64(e) => write!(f, "Base64 decode error: {}", e),
      AudioError::Wav(e) => write!(f, "WAV error: {}", e),
      AudioError::Empty => write!(f, "No audio data"),
    }
  }
}

impl std::error::Error for AudioError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      AudioError::Base64(e) => Some(e),
      AudioError::Wav(e) => Some(e),
      AudioError::Empty => None,
    }
  }
}

impl From<base64::DecodeError> for AudioError {
  fn from(err: base64::DecodeError) -> Self {
    AudioError::Base64(err)
  }
}

impl From<hound::Error> for AudioError {
  fn from(err: hound::Error) -> Self {
    AudioError::Wav(err)
  }
}

/// Wrap 16-bit little-endian mono PCM into a WAV container, dropping leading silence.
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>, AudioError> {
  let samples: Vec<i16> = pcm
    .chunks_exact(2)
    .map(|b| i16::from_le_bytes([b[0], b[1]]))
    .skip_while(|s| s.unsigned_abs() <= SILENCE_AMPLITUDE as u16)
    .collect();
  if samples.is_empty() {
    return Err(AudioError::Empty);
  }

  let spec = hound::WavSpec {
    channels: 1,
    sample_rate,
    bits_per_sample: 16,
    sample_format: hound::SampleFormat::Int,
  };
  let mut cursor = Cursor::new(Vec::new());
  {
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for s in samples {
      writer.write_sample(s)?;
    }
    writer.finalize()?;
  }
  Ok(cursor.into_inner())
}

/// Decode a recording sent as base64 (optionally a `data:` URL) and check it really is WAV.
pub fn decode_wav_base64(data: &str) -> Result<Vec<u8>, AudioError> {
  let payload = match data.split_once(";base64,") {
    Some((prefix, rest)) if prefix.starts_with("data:") => rest,
    _ => data,
  };
  let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
  if bytes.is_empty() {
    return Err(AudioError::Empty);
  }
  let reader = hound::WavReader::new(Cursor::new(bytes.as_slice()))?;
  if reader.duration() == 0 {
    return Err(AudioError::Empty);
  }
  Ok(bytes)
}
