//! # dpoint - telemetry decoding for the DPOINT motion-tracking pen
//!
//! Two input paths, both turning untrusted framed input into validated samples:
//! - 20-byte binary IMU frames from the pen's BLE notifications, with
//!   press/release events derived from the button bits
//! - `[x, y, z]` text lines from a serial feed, skipping malformed lines
//!
//! Transports stay outside the crate: hand notification payloads to a
//! [`FrameSink`], or any `BufRead` to a [`LineReader`].
//!
//! ## Quick Start
//! ```no_run
//! use dpoint::{PenEvent, PenStream, StreamConfig};
//! use std::time::Duration;
//!
//! let (sink, stream) = PenStream::start(&StreamConfig::default()).unwrap();
//!
//! // From the BLE notification callback:
//! sink.push(&[0u8; 20]).unwrap();
//!
//! while let Ok(event) = stream.recv_timeout(Duration::from_secs(1)) {
//!     match event {
//!         PenEvent::Sample(s) => println!("accel: {:?}", s.accel),
//!         PenEvent::Button(b) => println!("{:?} {:?}", b.button, b.transition),
//!     }
//! }
//! ```

pub mod error;
pub mod types;
pub mod protocol;
pub mod buttons;
pub mod decoder;
pub mod line;
pub mod config;
pub mod serial;
pub mod stream;
pub mod ffi;

pub use buttons::ButtonState;
pub use config::{SerialConfig, StreamConfig};
pub use decoder::{FrameOutput, PenDecoder, RawFrame};
pub use error::{DecodeError, DpointError};
pub use line::{parse_line, LineReader};
pub use protocol::{decode, encode_frame, FRAME_SIZE};
pub use serial::open_serial;
pub use stream::{FrameSink, PenStream, PositionStream, StatsSnapshot};
pub use types::*;

/// Result type alias for dpoint operations.
pub type Result<T> = std::result::Result<T, DpointError>;
