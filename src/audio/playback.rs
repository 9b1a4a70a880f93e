//! ALSA playback of raw device PCM
//!
//! The TTS firmware streams bare little-endian 16-bit mono samples at
//! 16 kHz, with no header and no terminator. Playback is synchronous: one
//! utterance is fully rendered before the console prompts for the next
//! line, which keeps utterances strictly ordered.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Sample rate of the TTS firmware output
pub const SAMPLE_RATE: u32 = 16_000;

/// The firmware synthesizes a single channel
const CHANNELS: u32 = 1;

/// Bounded attempts at XRUN recovery before giving up on the buffer
const MAX_RECOVERY_RETRIES: u32 = 3;

/// Playback failure at the ALSA device level. Fatal to the session.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to open playback device '{device}'")]
    Open {
        device: String,
        #[source]
        source: alsa::Error,
    },

    #[error("failed to configure playback device")]
    Configure(#[source] alsa::Error),

    #[error("playback write failed")]
    Write(#[source] alsa::Error),
}

/// Synchronous sink for raw 16 kHz mono s16le buffers
pub struct PcmPlayer {
    device: String,
}

impl PcmPlayer {
    /// Create a player targeting the named ALSA device ("default" for the
    /// system output)
    pub fn new(device: &str) -> Self {
        Self {
            device: device.to_string(),
        }
    }

    /// Play a whole utterance, blocking until the hardware drains it.
    ///
    /// Empty input returns immediately without touching the device. An
    /// odd-length buffer carries a torn trailing sample; the stray byte is
    /// dropped with a warning and the whole samples play normally.
    pub fn play(&self, pcm_bytes: &[u8]) -> Result<(), AudioError> {
        if pcm_bytes.is_empty() {
            return Ok(());
        }

        let samples = bytes_to_samples(pcm_bytes);
        let pcm = self.open_playback()?;
        let io = pcm.io_i16().map_err(AudioError::Configure)?;

        // Mono stream, so one frame per sample. Short writes and XRUNs
        // are retried after pcm.prepare(), with a bounded retry count so
        // a wedged device cannot spin forever.
        let mut written = 0usize;
        let mut retries = 0u32;
        while written < samples.len() {
            match io.writei(&samples[written..]) {
                Ok(frames) => {
                    written += frames;
                    retries = 0;
                }
                Err(e) => {
                    log::warn!("ALSA XRUN or write error: {}, recovering", e);
                    retries += 1;
                    if retries > MAX_RECOVERY_RETRIES {
                        return Err(AudioError::Write(e));
                    }
                    pcm.prepare().map_err(AudioError::Write)?;
                }
            }
        }

        pcm.drain().map_err(AudioError::Write)?;
        Ok(())
    }

    fn open_playback(&self) -> Result<PCM, AudioError> {
        let pcm =
            PCM::new(&self.device, Direction::Playback, false).map_err(|source| AudioError::Open {
                device: self.device.clone(),
                source,
            })?;

        {
            let hwp = HwParams::any(&pcm).map_err(AudioError::Configure)?;
            hwp.set_access(Access::RWInterleaved)
                .map_err(AudioError::Configure)?;
            hwp.set_format(Format::S16LE).map_err(AudioError::Configure)?;
            hwp.set_channels(CHANNELS).map_err(AudioError::Configure)?;
            hwp.set_rate_near(SAMPLE_RATE, ValueOr::Nearest)
                .map_err(AudioError::Configure)?;
            pcm.hw_params(&hwp).map_err(AudioError::Configure)?;
        }

        Ok(pcm)
    }
}

impl crate::session::AudioSink for PcmPlayer {
    fn play(&mut self, pcm: &[u8]) -> anyhow::Result<()> {
        PcmPlayer::play(self, pcm)?;
        Ok(())
    }
}

/// Convert raw little-endian bytes to i16 samples, dropping a torn
/// trailing byte if the buffer length is odd
fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    let whole = bytes.len() & !1;
    if whole != bytes.len() {
        log::warn!(
            "sample buffer is {} bytes, dropping torn trailing byte",
            bytes.len()
        );
    }
    let mut samples = vec![0i16; whole / 2];
    LittleEndian::read_i16_into(&bytes[..whole], &mut samples);
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_samples_little_endian() {
        let samples = bytes_to_samples(&[0x01, 0x00, 0xff, 0x7f, 0x00, 0x80]);
        assert_eq!(samples, vec![1, i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_odd_buffer_drops_trailing_byte() {
        let samples = bytes_to_samples(&[0x34, 0x12, 0xaa]);
        assert_eq!(samples, vec![0x1234]);
    }

    #[test]
    fn test_empty_conversion() {
        assert!(bytes_to_samples(&[]).is_empty());
    }

    #[test]
    fn test_empty_buffer_skips_the_device() {
        // Returns before any ALSA call, so this passes on machines with
        // no sound hardware at all
        let player = PcmPlayer::new("default");
        player.play(&[]).unwrap();
    }
}
