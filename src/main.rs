//! TTS Console
//!
//! Interactive console for serial-attached text-to-speech devices: type a
//! line, the device synthesizes it and streams raw PCM back over the same
//! UART, and the console plays it on the local ALSA output.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a device on /dev/ttyUSB0 at the default 115200 baud
//! tts-console /dev/ttyUSB0
//!
//! # Non-default baud rate
//! tts-console /dev/ttyACM0 -b 921600
//! ```
//!
//! At the prompt, a plain line is synthesized and played; a line starting
//! with `!` is a device directive (e.g. `!1.5` sets speech speed) and
//! produces no audio; an empty line ends the session.

mod audio;
mod serial;
mod session;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::io;

use audio::PcmPlayer;
use serial::{PortConfig, SerialConnection};

/// Interactive console for serial-attached TTS devices
#[derive(Parser)]
#[command(name = "tts-console")]
#[command(version = "0.1.0")]
#[command(about = "Send text to a serial TTS device and play the synthesized audio")]
struct Cli {
    /// Serial device path (e.g., /dev/ttyUSB0)
    port: String,

    /// Baud rate
    #[arg(short, long, default_value_t = serial::port::DEFAULT_BAUD)]
    baud: u32,
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = PortConfig::new(&cli.port).with_baud_rate(cli.baud);
    let mut conn = match SerialConnection::open(config) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            serial::port::print_troubleshooting();
            return Err(e.into());
        }
    };

    println!(
        "{} Connected to {} at {} baud",
        "[OK]".green().bold(),
        conn.config().port_path.white().bold(),
        conn.config().baud_rate
    );

    print_banner();

    let mut player = PcmPlayer::new("default");
    let stdin = io::stdin();
    session::run(stdin.lock(), &mut conn, &mut player)
}

/// Short usage reminder printed once per session
fn print_banner() {
    println!("{}", "=".repeat(60).dimmed());
    println!("{}", "TTS Console".cyan().bold());
    println!("Type a line to synthesize it on the device.");
    println!(
        "Lines starting with {} are device directives, e.g. {} to change speed.",
        "!".white().bold(),
        "!1.5".white().bold()
    );
    println!("Press Enter on an empty line to quit.");
    println!("{}", "=".repeat(60).dimmed());
}
