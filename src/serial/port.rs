//! Serial port configuration and connection management
//!
//! Wraps the `serialport` crate with the fixed framing the TTS firmware
//! expects (8 data bits, no parity, one stop bit, no flow control) and a
//! bounded read timeout. A timed-out read is not a failure here: it is the
//! only end-of-utterance signal the wire protocol has.

use anyhow::{Context, Result};
use colored::Colorize;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;
use thiserror::Error;

/// Default baud rate for the TTS firmware UART
pub const DEFAULT_BAUD: u32 = 115200;

/// Bounded wait for each read; elapsing with no data means the device has
/// finished the current utterance.
pub const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Failure to establish a serial connection. Fatal, never retried.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("baud rate must be a positive integer")]
    InvalidBaudRate,

    #[error("failed to open serial port {path}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },
}

/// Configuration for the serial link to the device
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyUSB0, /dev/ttyACM0)
    pub port_path: String,
    /// Baud rate (default: 115200)
    pub baud_rate: u32,
    /// Data bits (fixed: 8)
    pub data_bits: DataBits,
    /// Parity (fixed: none)
    pub parity: Parity,
    /// Stop bits (fixed: 1)
    pub stop_bits: StopBits,
    /// Flow control (fixed: none)
    pub flow_control: FlowControl,
    /// Read timeout
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: READ_TIMEOUT,
        }
    }
}

impl PortConfig {
    /// Create a new configuration for the given port path
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An open serial connection to the TTS device
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    config: PortConfig,
}

impl std::fmt::Debug for SerialConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialConnection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SerialConnection {
    /// Open a serial connection with the given configuration.
    ///
    /// Fails fast: a zero baud rate is rejected before the device is
    /// touched, and any driver-level open failure is fatal. A successful
    /// return always carries a fully configured, open handle.
    pub fn open(config: PortConfig) -> Result<Self, ConnectionError> {
        if config.baud_rate == 0 {
            return Err(ConnectionError::InvalidBaudRate);
        }

        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()
            .map_err(|source| ConnectionError::Open {
                path: config.port_path.clone(),
                source,
            })?;

        Ok(Self { port, config })
    }

    /// Get the port configuration
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Write a whole buffer to the device and flush it onto the wire
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port
            .write_all(data)
            .with_context(|| "Failed to write to serial port")?;
        self.port
            .flush()
            .with_context(|| "Failed to flush serial port")
    }

    /// Read up to `limit` bytes, blocking at most the configured timeout.
    ///
    /// Returns whatever arrived, possibly nothing. A timeout maps to an
    /// empty buffer rather than an error; callers treat it as "device
    /// idle".
    pub fn read_up_to(&mut self, limit: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; limit];
        match self.port.read(&mut buffer) {
            Ok(n) => {
                buffer.truncate(n);
                Ok(buffer)
            }
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| "Failed to read from serial port"),
        }
    }

    /// Drop any bytes the OS has already buffered, so a previous run's
    /// leftover output cannot leak into the first read of this session
    pub fn discard_input(&mut self) -> Result<()> {
        self.port
            .clear(ClearBuffer::Input)
            .with_context(|| "Failed to clear serial input buffer")
    }
}

impl crate::session::Transport for SerialConnection {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        SerialConnection::write_all(self, data)
    }

    fn read_up_to(&mut self, limit: usize) -> Result<Vec<u8>> {
        SerialConnection::read_up_to(self, limit)
    }

    fn discard_input(&mut self) -> Result<()> {
        SerialConnection::discard_input(self)
    }
}

/// Print detected serial ports and permission hints after a failed open
pub fn print_troubleshooting() {
    match serialport::available_ports() {
        Ok(ports) if !ports.is_empty() => {
            println!("\n{}", "Detected serial ports:".cyan().bold());
            for port in ports {
                match port.port_type {
                    serialport::SerialPortType::UsbPort(info) => {
                        println!(
                            "  {} {}",
                            port.port_name.white().bold(),
                            info.product.unwrap_or_default().dimmed()
                        );
                    }
                    _ => println!("  {}", port.port_name.white().bold()),
                }
            }
        }
        _ => {
            println!("\n{}", "No serial ports detected".yellow());
            println!("  1. Connect the device or USB-to-serial adapter");
            println!("  2. Check dmesg for connection events: dmesg | tail -20");
        }
    }
    println!("  Permission denied? Add yourself to 'dialout': sudo usermod -aG dialout $USER");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PortConfig::default();
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_config_builder() {
        let config = PortConfig::new("/dev/ttyACM0")
            .with_baud_rate(9600)
            .with_timeout(Duration::from_secs(1));

        assert_eq!(config.port_path, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_zero_baud_is_rejected() {
        let err = SerialConnection::open(PortConfig::new("/dev/ttyUSB0").with_baud_rate(0))
            .expect_err("zero baud must not open");
        assert!(matches!(err, ConnectionError::InvalidBaudRate));
    }

    #[test]
    fn test_missing_device_fails_to_open() {
        let err = SerialConnection::open(PortConfig::new("/dev/tts-console-no-such-port"))
            .expect_err("open must fail for a missing device");
        assert!(matches!(err, ConnectionError::Open { .. }));
    }
}
