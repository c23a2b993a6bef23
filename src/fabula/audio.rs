use super::audio_types::AudioClip;

use base64::Engine as _;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Audio payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Malformed audio: {len} bytes is not a whole number of {channels}-channel 16-bit frames")]
    MalformedAudio { len: usize, channels: u16 },

    #[error("Audio is already playing")]
    AlreadyPlaying,

    #[error("Failed to open audio output: {0}")]
    OutputStream(String),
}

/// Decodes a standard (padded) base64 payload.
pub fn decode(payload: &str) -> Result<Vec<u8>, AudioError> {
    Ok(base64::engine::general_purpose::STANDARD.decode(payload.trim())?)
}

/// Interprets `bytes` as little-endian signed 16-bit PCM, interleaved when
/// `channel_count > 1`, scaled into [-1.0, 1.0].
pub fn decode_audio_data(bytes: &[u8], sample_rate: u32, channel_count: u16) -> Result<AudioClip, AudioError> {
    let frame_bytes = 2 * usize::from(channel_count);
    if channel_count == 0 || bytes.len() % frame_bytes != 0 {
        return Err(AudioError::MalformedAudio {
            len: bytes.len(),
            channels: channel_count,
        });
    }

    let frames = bytes.len() / frame_bytes;
    let mut channels = vec![Vec::with_capacity(frames); usize::from(channel_count)];

    for frame in bytes.chunks_exact(frame_bytes) {
        for (ch, sample) in frame.chunks_exact(2).enumerate() {
            let value = i16::from_le_bytes([sample[0], sample[1]]);
            channels[ch].push(f32::from(value) / 32768.0);
        }
    }

    Ok(AudioClip {
        sample_rate,
        channels,
        style: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn decodes_mono_and_scales_extremes() {
        let bytes = pcm(&[0, i16::MAX, i16::MIN, -16384]);
        let clip = decode_audio_data(&bytes, 24_000, 1).unwrap();

        assert_eq!(clip.channel_count(), 1);
        assert_eq!(clip.frames(), 4);
        assert_eq!(clip.channels[0][0], 0.0);
        assert_eq!(clip.channels[0][1], 32767.0 / 32768.0);
        assert_eq!(clip.channels[0][2], -1.0);
        assert_eq!(clip.channels[0][3], -0.5);
    }

    #[test]
    fn deinterleaves_stereo() {
        let bytes = pcm(&[100, -100, 200, -200, 300, -300]);
        let clip = decode_audio_data(&bytes, 48_000, 2).unwrap();

        assert_eq!(clip.frames(), 3);
        assert_eq!(clip.channels[0], vec![100.0 / 32768.0, 200.0 / 32768.0, 300.0 / 32768.0]);
        assert_eq!(clip.channels[1], vec![-100.0 / 32768.0, -200.0 / 32768.0, -300.0 / 32768.0]);
        assert_eq!(clip.interleaved().len(), 6);
        assert_eq!(clip.interleaved()[1], -100.0 / 32768.0);
    }

    #[test]
    fn odd_length_is_malformed() {
        assert!(matches!(
            decode_audio_data(&[0, 1, 2], 24_000, 1),
            Err(AudioError::MalformedAudio { len: 3, channels: 1 })
        ));
    }

    #[test]
    fn partial_stereo_frame_is_malformed() {
        assert!(matches!(
            decode_audio_data(&pcm(&[1, 2, 3]), 24_000, 2),
            Err(AudioError::MalformedAudio { len: 6, channels: 2 })
        ));
    }

    #[test]
    fn zero_channels_is_malformed() {
        assert!(matches!(
            decode_audio_data(&[], 24_000, 0),
            Err(AudioError::MalformedAudio { .. })
        ));
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(matches!(decode("not*base64"), Err(AudioError::Decode(_))));
        assert!(matches!(decode("AAA"), Err(AudioError::Decode(_))));
    }

    #[test]
    fn base64_payload_round_trips_into_bounded_samples() {
        // Every possible byte pair, so every i16 value appears once.
        let bytes: Vec<u8> = (0..=u16::MAX).flat_map(|v| v.to_le_bytes()).collect();
        let payload = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let decoded = decode(&payload).unwrap();
        let clip = decode_audio_data(&decoded, 24_000, 1).unwrap();

        assert_eq!(clip.frames(), bytes.len() / 2);
        assert!(clip.channels[0].iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn duration_follows_sample_rate() {
        let clip = decode_audio_data(&vec![0u8; 48_000], 24_000, 1).unwrap();
        assert_eq!(clip.duration(), std::time::Duration::from_secs(1));
    }
}
