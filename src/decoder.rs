use crate::buttons::ButtonState;
use crate::error::DecodeError;
use crate::protocol;
use crate::types::{ButtonEvent, Decoded, ImuSample};
use std::time::Instant;

/// One frame as delivered by the wireless transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub received_at: Instant,
}

impl RawFrame {
    pub fn new(data: &[u8], received_at: Instant) -> Self {
        Self {
            data: data.to_vec(),
            received_at,
        }
    }
}

/// Decoded output of one frame carrying a valid payload.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub sample: ImuSample,
    pub events: Vec<ButtonEvent>,
}

/// Per-device decoding state: arrival timing plus button edges.
///
/// Each connected pen owns its own decoder. Nothing is shared between
/// decoders, so any number of streams can run side by side.
#[derive(Debug, Clone)]
pub struct PenDecoder {
    last_seen: Instant,
    buttons: ButtonState,
}

impl PenDecoder {
    /// Start a stream. The first frame's inter-arrival time is measured from here.
    pub fn new(started_at: Instant) -> Self {
        Self {
            last_seen: started_at,
            buttons: ButtonState::new(),
        }
    }

    pub fn buttons(&self) -> &ButtonState {
        &self.buttons
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Decode a frame and track button edges.
    ///
    /// Returns `Ok(None)` for a frame without a valid payload. The arrival
    /// time advances for every frame, including rejected ones.
    pub fn process(&mut self, frame: &RawFrame) -> Result<Option<FrameOutput>, DecodeError> {
        let last_seen = std::mem::replace(&mut self.last_seen, frame.received_at);

        let sample = match protocol::decode(&frame.data, frame.received_at, last_seen)? {
            Decoded::Valid(sample) => sample,
            Decoded::NoPayload(sample) => {
                log::trace!(
                    "Skipping frame without valid payload (flags=0x{:04x})",
                    sample.flags.bits()
                );
                return Ok(None);
            }
        };

        let events = self.buttons.update(sample.flags, sample.received_at);
        Ok(Some(FrameOutput { sample, events }))
    }
}
