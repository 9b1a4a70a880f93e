//! Audio output for synthesized utterances

pub mod playback;

pub use playback::PcmPlayer;
