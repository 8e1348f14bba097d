//! Replay recorded pen notifications through a decode stream.
//!
//! Reads one frame per stdin line as hex bytes (spaces allowed), e.g.
//! `0100 ffff 0001 0080 ff7f 0000 0300 0000 0000 0000`, and prints decoded
//! samples and button transitions.
//!
//! Usage: cargo run --example frame_replay < frames.txt

use dpoint::{PenEvent, PenStream, StreamConfig};
use std::io::{self, BufRead};
use std::time::Duration;

fn parse_hex(line: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = line.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).ok()?, 16).ok())
        .collect()
}

fn main() {
    env_logger::init();

    let config = StreamConfig::from_env();
    let (sink, stream) = match PenStream::start(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to start pen stream: {}", e);
            std::process::exit(1);
        }
    };

    // Stands in for the BLE notification callback.
    let feeder = std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match parse_hex(&line) {
                Some(bytes) => {
                    if sink.push(&bytes).is_err() {
                        break;
                    }
                }
                None => eprintln!("Not a hex frame: {}", line.trim()),
            }
        }
    });

    loop {
        match stream.recv_timeout(Duration::from_secs(2)) {
            Ok(PenEvent::Sample(s)) => {
                let a = s.accel_scaled(config.accel_range_g);
                let g = s.gyro_scaled(config.gyro_range_dps);
                println!(
                    "dt={:>6.1}ms  accel=[{:+.3}, {:+.3}, {:+.3}]g  gyro=[{:+.3}, {:+.3}, {:+.3}]rad/s  flags=0x{:04x}",
                    s.inter_arrival_ms,
                    a[0], a[1], a[2],
                    g[0], g[1], g[2],
                    s.flags.bits(),
                );
            }
            Ok(PenEvent::Button(b)) => {
                println!("--- {:?} {:?} ---", b.button, b.transition);
            }
            Err(dpoint::DpointError::Timeout) => {
                eprintln!("No frames for 2s");
                break;
            }
            Err(_) => break,
        }
    }

    let _ = feeder.join();
    let stats = stream.stats();
    eprintln!(
        "\nframes={} bad_length={} no_payload={} dropped={} buttons={}",
        stats.frames, stats.bad_length, stats.no_payload, stats.dropped_samples, stats.button_events
    );
}
