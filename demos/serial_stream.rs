//! Print `[x, y, z]` positions read from the pen's serial feed.
//!
//! Usage: cargo run --example serial_stream -- [PORT] [BAUD]
//! Defaults come from DPOINT_SERIAL_PORT / DPOINT_SERIAL_BAUD.
//! Press Ctrl+C to stop.

use dpoint::{PositionStream, SerialConfig, StreamConfig};
use std::time::Instant;

fn main() {
    env_logger::init();

    let mut config = SerialConfig::from_env();
    let mut args = std::env::args().skip(1);
    if let Some(port) = args.next() {
        config.port = port;
    }
    if let Some(baud) = args.next() {
        match baud.parse() {
            Ok(b) => config.baud_rate = b,
            Err(_) => {
                eprintln!("Invalid baud rate: {}", baud);
                std::process::exit(2);
            }
        }
    }

    let reader = match dpoint::open_serial(&config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to open {}: {}", config.port, e);
            std::process::exit(1);
        }
    };

    let stream = match PositionStream::start(reader, &StreamConfig::from_env()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to start reader: {}", e);
            std::process::exit(1);
        }
    };

    println!("Reading {} at {} baud (Ctrl+C to stop)...", config.port, config.baud_rate);

    let mut last = Instant::now();
    while let Ok(p) = stream.recv() {
        let now = Instant::now();
        println!(
            "X: {:+.3}  Y: {:+.3}  Z: {:+.3}  ({:.2}ms, {} discarded)",
            p.x,
            p.y,
            p.z,
            now.duration_since(last).as_secs_f64() * 1000.0,
            stream.discarded(),
        );
        last = now;
    }

    println!("Serial source closed");
}
