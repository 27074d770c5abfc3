//! Audio decoding and normalization
//!
//! Uploaded recordings are sniffed for a supported container, decoded
//! with symphonia, downmixed to mono, and resampled to 16 kHz for
//! feature extraction and the ASR collaborator.

use rubato::{FastFixedIn, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, warn};

/// All pipeline audio is normalized to 16 kHz mono
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Audio decode errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// Container/encoding not in the supported set; rejected with 400
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Decode failure after the container was accepted
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    /// The recording decoded to zero samples
    #[error("Recording contains no audio")]
    Empty,
}

/// Decoded, normalized recording
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples at `TARGET_SAMPLE_RATE`
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// MIME types accepted at the API boundary
const SUPPORTED_MIME: [&str; 6] = [
    "audio/x-wav",
    "audio/wav",
    "audio/mpeg",
    "audio/m4a",
    "audio/ogg",
    "video/webm",
];

/// Sniff the upload's container type before decoding
///
/// Rejecting unsupported uploads here keeps InvalidInput ahead of
/// pipeline entry, per the error taxonomy.
pub fn validate_container(bytes: &[u8]) -> Result<(), AudioError> {
    let kind = infer::get(bytes)
        .ok_or_else(|| AudioError::UnsupportedFormat("unrecognized container".to_string()))?;

    if SUPPORTED_MIME.contains(&kind.mime_type()) {
        Ok(())
    } else {
        Err(AudioError::UnsupportedFormat(kind.mime_type().to_string()))
    }
}

/// Decode an uploaded recording to 16 kHz mono f32
pub fn decode_to_mono_16k(bytes: &[u8]) -> Result<DecodedAudio, AudioError> {
    let mss = MediaSourceStream::new(
        Box::new(std::io::Cursor::new(bytes.to_vec())),
        Default::default(),
    );

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::UnsupportedFormat(format!("probe failed: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Decode("No audio track found".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Decode("Sample rate not found".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .ok_or_else(|| AudioError::Decode("Channel count not found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_buf.is_none() {
                    let spec = *decoded.spec();
                    sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }
                if let Some(buf) = sample_buf.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    interleaved.extend_from_slice(buf.samples());
                }
            }
            Err(e) => {
                warn!("Decode error: {}", e);
                continue;
            }
        }
    }

    if interleaved.is_empty() {
        return Err(AudioError::Empty);
    }

    let mono = downmix_mono(&interleaved, channels);
    let samples = resample_to_16k(&mono, sample_rate)?;

    debug!(
        input_rate = sample_rate,
        channels,
        frames = samples.len(),
        "Audio normalized to 16kHz mono"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: TARGET_SAMPLE_RATE,
    })
}

/// Average interleaved channels into mono
fn downmix_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio to 16 kHz
fn resample_to_16k(input: &[f32], input_rate: u32) -> Result<Vec<f32>, AudioError> {
    if input_rate == TARGET_SAMPLE_RATE {
        return Ok(input.to_vec());
    }

    let mut resampler = FastFixedIn::<f32>::new(
        TARGET_SAMPLE_RATE as f64 / input_rate as f64,
        1.0,
        rubato::PolynomialDegree::Septic,
        input.len(),
        1,
    )
    .map_err(|e| AudioError::Decode(format!("Failed to create resampler: {}", e)))?;

    let output = resampler
        .process(&[input.to_vec()], None)
        .map_err(|e| AudioError::Decode(format!("Resampling failed: {}", e)))?;

    Ok(output.into_iter().next().unwrap_or_default())
}
