//! Interactive session: prompt, transmit, collect, play
//!
//! One iteration per user line. A plain line is synthesized by the device,
//! which answers with a stream of raw PCM bytes on the same wire; a line
//! starting with [`DIRECTIVE_PREFIX`] changes a device-side setting (such
//! as speech speed) and produces no audio. An empty line ends the session.

use anyhow::Result;
use colored::Colorize;
use std::io::{self, BufRead, Write};

/// Directive sentinel: the device treats `!`-lines as settings commands
/// and emits no audio for them.
pub const DIRECTIVE_PREFIX: u8 = b'!';

/// Bytes requested per bounded read while collecting an utterance
pub const READ_CHUNK: usize = 64;

/// Spinner frames, one step per received chunk
const SPINNER_FRAMES: [char; 4] = ['-', '\\', '|', '/'];

/// Byte-oriented transport to the device.
///
/// [`SerialConnection`](crate::serial::SerialConnection) is the production
/// implementation; tests substitute an in-memory fake.
pub trait Transport {
    /// Write the whole buffer to the device
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Read up to `limit` bytes; an empty result means the bounded wait
    /// elapsed with no data
    fn read_up_to(&mut self, limit: usize) -> Result<Vec<u8>>;

    /// Drop input already buffered by the driver
    fn discard_input(&mut self) -> Result<()>;
}

/// Synchronous audio output for synthesized utterances.
pub trait AudioSink {
    /// Play a buffer of raw little-endian 16-bit mono PCM, blocking until
    /// playback completes. Must be a no-op for empty input.
    fn play(&mut self, pcm: &[u8]) -> Result<()>;
}

/// Collect one utterance worth of PCM from the device.
///
/// Reads in fixed-size chunks, appending until a bounded read comes back
/// empty; the elapsed timeout is the only end-of-stream signal the
/// protocol has. Returns the accumulated bytes as-is.
pub fn read_samples<T: Transport>(transport: &mut T) -> Result<Vec<u8>> {
    let mut samples = Vec::new();
    let mut tick = 0usize;

    loop {
        let chunk = transport.read_up_to(READ_CHUNK)?;
        if chunk.is_empty() {
            break;
        }
        samples.extend_from_slice(&chunk);
        spin(tick);
        tick += 1;
    }

    println!("{} received {} bytes", "[RX]".cyan().bold(), samples.len());
    Ok(samples)
}

/// Advance the progress spinner. Cosmetic only; the tick counter lives in
/// the read loop and has no influence on control flow.
fn spin(tick: usize) {
    print!("{}\r", SPINNER_FRAMES[tick % SPINNER_FRAMES.len()]);
    let _ = io::stdout().flush();
}

/// Drive the interactive loop until the user submits an empty line.
///
/// Stale driver input is discarded once on entry. Each line read from
/// `input` is newline-terminated and written to the transport; directive
/// lines return straight to the prompt, anything else waits for the
/// device's PCM response and plays it to completion before prompting
/// again. EOF on `input` ends the session like an empty line.
pub fn run<R, T, S>(mut input: R, transport: &mut T, sink: &mut S) -> Result<()>
where
    R: BufRead,
    T: Transport,
    S: AudioSink,
{
    transport.discard_input()?;

    loop {
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        let mut bytes = line
            .trim_end_matches(|c| c == '\r' || c == '\n')
            .as_bytes()
            .to_vec();
        bytes.push(b'\n');
        if bytes.len() <= 1 {
            break;
        }

        transport.write_all(&bytes)?;
        if bytes[0] == DIRECTIVE_PREFIX {
            continue;
        }

        let samples = read_samples(transport)?;
        sink.play(&samples)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeTransport {
        written: Vec<Vec<u8>>,
        chunks: VecDeque<Vec<u8>>,
        reads: usize,
        discards: usize,
    }

    impl FakeTransport {
        fn with_chunks(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                chunks: chunks.into(),
                ..Default::default()
            }
        }
    }

    impl Transport for FakeTransport {
        fn write_all(&mut self, data: &[u8]) -> Result<()> {
            self.written.push(data.to_vec());
            Ok(())
        }

        fn read_up_to(&mut self, limit: usize) -> Result<Vec<u8>> {
            self.reads += 1;
            let chunk = self.chunks.pop_front().unwrap_or_default();
            assert!(chunk.len() <= limit);
            Ok(chunk)
        }

        fn discard_input(&mut self) -> Result<()> {
            self.discards += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeSink {
        played: Vec<Vec<u8>>,
    }

    impl AudioSink for FakeSink {
        fn play(&mut self, pcm: &[u8]) -> Result<()> {
            self.played.push(pcm.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_read_samples_concatenates_chunks_in_order() {
        let mut transport =
            FakeTransport::with_chunks(vec![b"abc".to_vec(), b"def".to_vec(), Vec::new()]);
        let samples = read_samples(&mut transport).unwrap();
        assert_eq!(samples, b"abcdef");
    }

    #[test]
    fn test_read_samples_stops_on_first_empty_read() {
        let mut transport = FakeTransport::with_chunks(vec![Vec::new(), b"late".to_vec()]);
        let samples = read_samples(&mut transport).unwrap();
        assert!(samples.is_empty());
        assert_eq!(transport.reads, 1);
    }

    #[test]
    fn test_utterance_is_written_read_and_played() {
        let mut transport = FakeTransport::with_chunks(vec![b"RIFFdata".to_vec(), Vec::new()]);
        let mut sink = FakeSink::default();
        run(&b"hello\n"[..], &mut transport, &mut sink).unwrap();

        assert_eq!(transport.written, vec![b"hello\n".to_vec()]);
        assert_eq!(sink.played, vec![b"RIFFdata".to_vec()]);
        assert_eq!(transport.discards, 1);
    }

    #[test]
    fn test_directive_line_awaits_no_audio() {
        let mut transport = FakeTransport::default();
        let mut sink = FakeSink::default();
        run(&b"!2.0\n"[..], &mut transport, &mut sink).unwrap();

        assert_eq!(transport.written, vec![b"!2.0\n".to_vec()]);
        assert_eq!(transport.reads, 0);
        assert!(sink.played.is_empty());
    }

    #[test]
    fn test_empty_line_ends_session_without_write() {
        let mut transport = FakeTransport::default();
        let mut sink = FakeSink::default();
        run(&b"\n"[..], &mut transport, &mut sink).unwrap();

        assert!(transport.written.is_empty());
        assert!(sink.played.is_empty());
    }

    #[test]
    fn test_eof_ends_session_without_write() {
        let mut transport = FakeTransport::default();
        let mut sink = FakeSink::default();
        run(&b""[..], &mut transport, &mut sink).unwrap();

        assert!(transport.written.is_empty());
    }

    #[test]
    fn test_crlf_input_is_normalized_to_newline() {
        let mut transport = FakeTransport::with_chunks(vec![b"pcm".to_vec(), Vec::new()]);
        let mut sink = FakeSink::default();
        run(&b"hi\r\n"[..], &mut transport, &mut sink).unwrap();

        assert_eq!(transport.written, vec![b"hi\n".to_vec()]);
    }

    #[test]
    fn test_session_continues_after_each_utterance() {
        let mut transport = FakeTransport::with_chunks(vec![
            b"first".to_vec(),
            Vec::new(),
            b"second".to_vec(),
            Vec::new(),
        ]);
        let mut sink = FakeSink::default();
        run(&b"one\ntwo\n\n"[..], &mut transport, &mut sink).unwrap();

        assert_eq!(
            transport.written,
            vec![b"one\n".to_vec(), b"two\n".to_vec()]
        );
        assert_eq!(sink.played, vec![b"first".to_vec(), b"second".to_vec()]);
    }
}
