use crate::config::SerialConfig;
use crate::line::LineReader;
use crate::Result;
use serialport::SerialPort;
use std::io::BufReader;

/// Line reader over an open serial port.
pub type SerialLineReader = LineReader<BufReader<Box<dyn SerialPort>>>;

/// Open the serial port named in `config` and wrap it for line framing.
///
/// The port's read timeout only bounds individual reads; the line reader
/// retries through it.
pub fn open_serial(config: &SerialConfig) -> Result<SerialLineReader> {
    let port = serialport::new(config.port.as_str(), config.baud_rate)
        .timeout(config.read_timeout)
        .open()?;

    log::info!(
        "Opened serial port {} at {} baud",
        config.port,
        config.baud_rate
    );

    Ok(LineReader::new(BufReader::new(port)))
}
