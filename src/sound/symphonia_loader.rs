use crate::error::{AuralError, Result};
use crate::sound::{AuralSoundData, LoadOptions, resampler::AudioResampler};
use std::fs::File;
use std::path::Path;
use symphonia::{
    core::{
        audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
        io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// Decodes an audio file into a fully buffered 16-bit PCM chunk.
///
/// Any container/codec symphonia can probe is accepted; the decoded frames
/// are optionally resampled and folded to mono per `options`, then converted
/// to interleaved little-endian 16-bit PCM.
pub fn load_sound_file(path: &str, options: &LoadOptions) -> Result<AuralSoundData> {
    let file = File::open(path)?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probe = get_probe();
    let probed = probe
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AuralError::Decode(format!("failed to probe audio format: {:?}", e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| AuralError::Decode("no default audio track found".to_string()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AuralError::Decode("sample rate not found".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| AuralError::Decode("channel count not found".to_string()))?
        .count() as u16;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AuralError::Decode(format!("failed to create decoder: {:?}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let max_frames = options
        .max_duration
        .map(|d| (d.as_secs_f64() * sample_rate as f64) as usize)
        .unwrap_or(usize::MAX);

    let mut frames_decoded = 0;

    loop {
        if frames_decoded >= max_frames {
            break;
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break, // end-of-file
            Err(e) => {
                return Err(AuralError::Decode(format!("error reading packet: {:?}", e)));
            }
        };

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::IoError(_)) => break, // also EOF in some formats
            Err(Error::DecodeError(_)) => continue, // recoverable corruption
            Err(e) => {
                return Err(AuralError::Decode(format!(
                    "error decoding packet: {:?}",
                    e
                )));
            }
        };

        let spec = *decoded.spec();
        let capacity = decoded.capacity();

        // Always convert to f32 first; quantization happens once at the end
        let mut tmp = SampleBuffer::<f32>::new(capacity as u64, spec);
        tmp.copy_interleaved_ref(decoded);

        if let Some(mono_ch) = options.mono_channel {
            if mono_ch >= channels as usize {
                return Err(AuralError::UnsupportedFormat(format!(
                    "channel {} out of range (max: {})",
                    mono_ch,
                    channels - 1
                )));
            }
            samples.extend(
                tmp.samples()
                    .chunks(channels as usize)
                    .map(|frame| frame[mono_ch]),
            );
        } else {
            samples.extend_from_slice(tmp.samples());
        }

        frames_decoded += capacity / channels as usize;
    }

    let final_samples;
    let final_channels;

    if options.convert_to_mono && channels > 1 {
        if options.mono_channel.is_some() {
            // already extracted a single channel during decoding
            final_samples = samples;
            final_channels = 1;
        } else {
            final_samples = samples
                .chunks(channels as usize)
                .map(|frame| {
                    let sum: f32 = frame.iter().sum();
                    sum / channels as f32
                })
                .collect();
            final_channels = 1;
        }
    } else if options.mono_channel.is_some() {
        final_samples = samples;
        final_channels = 1;
    } else {
        final_samples = samples;
        final_channels = channels;
    }

    let (pcm_samples, pcm_rate) = match options.target_sample_rate {
        Some(target_rate) if target_rate != sample_rate => {
            let resampler =
                AudioResampler::new(sample_rate, target_rate, final_channels, Some(1024))?;
            (resampler.resample_interleaved(&final_samples)?, target_rate)
        }
        _ => (final_samples, sample_rate),
    };

    AuralSoundData::from_raw(samples_to_pcm16(&pcm_samples), final_channels, 16, pcm_rate)
}

/// Convenience function to load audio with default options
pub fn load_sound_file_simple(path: &str) -> Result<AuralSoundData> {
    load_sound_file(path, &LoadOptions::default())
}

/// Quantizes f32 samples to interleaved little-endian 16-bit PCM.
fn samples_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = (clamped * f32::from(i16::MAX)) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_quantization_clamps_and_scales() {
        let bytes = samples_to_pcm16(&[0.0, 1.0, -1.0, 2.0]);
        assert_eq!(bytes.len(), 8);
        let values: Vec<i16> = bytes
            .chunks(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        assert_eq!(values[0], 0);
        assert_eq!(values[1], i16::MAX);
        assert_eq!(values[2], -i16::MAX);
        // out-of-range input clamps instead of wrapping
        assert_eq!(values[3], i16::MAX);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_sound_file_simple("/no/such/file.ogg").unwrap_err();
        assert!(matches!(err, AuralError::Io(_)));
    }
}
