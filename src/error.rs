use std::fmt;

/// Per-frame decode failure. The frame is dropped; the stream continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Bad frame length: expected {expected} bytes, got {actual}")]
    BadLength { expected: usize, actual: usize },
}

/// Errors that can occur while reading pen telemetry.
#[derive(Debug, thiserror::Error)]
pub enum DpointError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to spawn reader thread: {0}")]
    Spawn(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Stream stopped")]
    StreamStopped,

    #[error("Timeout waiting for data")]
    Timeout,

    #[error("Channel disconnected")]
    ChannelDisconnected,
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &dyn std::error::Error) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut msg) = self.message.lock() {
            msg.clear();
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_length_message() {
        let err = DecodeError::BadLength {
            expected: 20,
            actual: 7,
        };
        assert_eq!(err.to_string(), "Bad frame length: expected 20 bytes, got 7");

        let wrapped: DpointError = err.into();
        assert_eq!(wrapped.to_string(), err.to_string());
    }

    #[test]
    fn test_last_error_is_nul_terminated() {
        let last = LastError::new();
        assert!(last.as_ptr().is_null());

        last.set(&DpointError::Timeout);
        let msg = unsafe { std::ffi::CStr::from_ptr(last.as_ptr()) };
        assert_eq!(msg.to_str().unwrap(), "Timeout waiting for data");

        last.clear();
        assert!(last.as_ptr().is_null());
    }
}
