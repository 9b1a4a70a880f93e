//! Serial transport to the TTS device
//!
//! This module provides:
//! - Fixed 8-N-1 framing with a bounded per-read timeout
//! - Byte-oriented write, bounded read, and discard-pending-input
//! - Port enumeration hints for failed connections

pub mod port;

pub use port::{PortConfig, SerialConnection};
