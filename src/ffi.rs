//! C FFI layer for dpoint.
//!
//! Provides an opaque decoder handle and line parsing for C/C++ consumers.
//! The generated C header is written to `include/dpoint.h` by cbindgen.

use crate::decoder::{PenDecoder, RawFrame};
use crate::error::{DpointError, LastError};
use crate::line;
use crate::types::{Button, ImuSample, PositionSample, Transition};
use std::ffi::{c_char, c_int, CStr};
use std::time::Instant;

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Most button transitions one frame can produce. Size the `events`
/// buffer passed to `dp_decoder_push` with at least this many elements.
pub const DP_MAX_EVENTS: usize = 2;

/// Opaque per-pen decoder handle for C consumers.
pub struct DpDecoder(PenDecoder);

/// Raw IMU sample in C-compatible layout.
#[repr(C)]
pub struct DpImuSample {
    /// Accelerometer [x, y, z], raw counts.
    pub accel: [i16; 3],
    /// Gyroscope [x, y, z], raw counts.
    pub gyro: [i16; 3],
    /// Flags bitfield (1 = valid, 2 = primary button, 4 = secondary button).
    pub flags: u16,
    /// Milliseconds since the previous frame pushed to the same decoder.
    pub inter_arrival_ms: f64,
}

/// Button transition in C-compatible layout.
#[repr(C)]
pub struct DpButtonEvent {
    pub button: Button,
    pub transition: Transition,
}

/// Serial position in C-compatible layout.
pub type DpPosition = PositionSample;

impl From<&ImuSample> for DpImuSample {
    fn from(sample: &ImuSample) -> Self {
        Self {
            accel: sample.accel,
            gyro: sample.gyro,
            flags: sample.flags.bits(),
            inter_arrival_ms: sample.inter_arrival_ms,
        }
    }
}

/// Create a decoder for one pen stream. Free with `dp_decoder_free`.
#[no_mangle]
pub extern "C" fn dp_decoder_new() -> *mut DpDecoder {
    Box::into_raw(Box::new(DpDecoder(PenDecoder::new(Instant::now()))))
}

/// Free a decoder.
///
/// # Safety
/// `dec` must be a pointer returned by `dp_decoder_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn dp_decoder_free(dec: *mut DpDecoder) {
    if !dec.is_null() {
        drop(Box::from_raw(dec));
    }
}

/// Push one notification payload through the decoder.
///
/// Returns 1 when a valid sample was written to `sample` (with its button
/// transitions in `events` and their count in `n_events`), 0 when the frame
/// carried no valid payload, and -1 on error (check `dp_last_error()`).
/// A frame of the wrong length is an error, as is an `events` buffer with
/// room for fewer than `DP_MAX_EVENTS` elements. Arguments are checked
/// before the frame is decoded, so a rejected call leaves the decoder as
/// it was.
///
/// # Safety
/// `dec` must be a valid decoder pointer and `data` must point to `len`
/// readable bytes. `sample` and `n_events` may be null; `events` must point
/// to at least `max_events` elements.
#[no_mangle]
pub unsafe extern "C" fn dp_decoder_push(
    dec: *mut DpDecoder,
    data: *const u8,
    len: usize,
    sample: *mut DpImuSample,
    events: *mut DpButtonEvent,
    max_events: usize,
    n_events: *mut usize,
) -> c_int {
    if !n_events.is_null() {
        n_events.write(0);
    }
    if dec.is_null() || (data.is_null() && len > 0) {
        LAST_ERROR.set(&DpointError::InvalidArgument("null decoder or data"));
        return -1;
    }
    if events.is_null() || max_events < DP_MAX_EVENTS {
        LAST_ERROR.set(&DpointError::InvalidArgument(
            "events buffer smaller than DP_MAX_EVENTS",
        ));
        return -1;
    }
    let dec = &mut *dec;
    let bytes: &[u8] = if len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(data, len)
    };

    match dec.0.process(&RawFrame::new(bytes, Instant::now())) {
        Ok(Some(output)) => {
            LAST_ERROR.clear();
            if !sample.is_null() {
                sample.write(DpImuSample::from(&output.sample));
            }
            for (i, event) in output.events.iter().enumerate() {
                events.add(i).write(DpButtonEvent {
                    button: event.button,
                    transition: event.transition,
                });
            }
            if !n_events.is_null() {
                n_events.write(output.events.len());
            }
            1
        }
        Ok(None) => {
            LAST_ERROR.clear();
            0
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Scale a sample to physical units: acceleration in g, angular rate in rad/s.
///
/// # Safety
/// `sample` must be a valid pointer; `accel_out` and `gyro_out` must each
/// point to 3 doubles, or be null.
#[no_mangle]
pub unsafe extern "C" fn dp_sample_scaled(
    sample: *const DpImuSample,
    accel_range_g: f64,
    gyro_range_dps: f64,
    accel_out: *mut f64,
    gyro_out: *mut f64,
) {
    if sample.is_null() {
        return;
    }
    let sample = &*sample;
    let imu = ImuSample {
        accel: sample.accel,
        gyro: sample.gyro,
        flags: crate::types::PacketFlags::from_bits_retain(sample.flags),
        received_at: Instant::now(),
        inter_arrival_ms: sample.inter_arrival_ms,
    };
    if !accel_out.is_null() {
        for (i, v) in imu.accel_scaled(accel_range_g).into_iter().enumerate() {
            accel_out.add(i).write(v);
        }
    }
    if !gyro_out.is_null() {
        for (i, v) in imu.gyro_scaled(gyro_range_dps).into_iter().enumerate() {
            gyro_out.add(i).write(v);
        }
    }
}

/// Parse one serial line of the form `[x, y, z]`.
/// Returns 0 and fills `out` on success, -1 if the line is malformed.
///
/// # Safety
/// `text` must be a null-terminated string and `out` a valid pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn dp_parse_line(text: *const c_char, out: *mut DpPosition) -> c_int {
    if text.is_null() || out.is_null() {
        return -1;
    }
    let text = CStr::from_ptr(text).to_string_lossy();
    match line::parse_line(&text) {
        Some(position) => {
            out.write(position);
            0
        }
        None => -1,
    }
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next dpoint API call.
#[no_mangle]
pub extern "C" fn dp_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}
