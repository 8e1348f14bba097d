use std::time::Instant;

bitflags::bitflags! {
    /// Status bits carried in the last field of every pen frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[repr(C)]
    pub struct PacketFlags: u16 {
        /// The frame carries meaningful motion and button data.
        const VALID            = 1 << 0;
        const PRIMARY_BUTTON   = 1 << 1;
        const SECONDARY_BUTTON = 1 << 2;
    }
}

/// One decoded IMU reading in raw device units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    /// Accelerometer [x, y, z], signed raw counts.
    pub accel: [i16; 3],
    /// Gyroscope [x, y, z], signed raw counts.
    pub gyro: [i16; 3],
    /// Status bits, unknown bits retained.
    pub flags: PacketFlags,
    /// Host time at which the frame was received.
    pub received_at: Instant,
    /// Milliseconds since the previous frame on the same stream.
    pub inter_arrival_ms: f64,
}

impl ImuSample {
    /// Whether the VALID bit is set.
    pub fn is_valid(&self) -> bool {
        self.flags.contains(PacketFlags::VALID)
    }

    /// Acceleration in g, given the full-scale range configured on the pen.
    pub fn accel_scaled(&self, range_g: f64) -> [f64; 3] {
        self.accel.map(|v| scale_raw(v, range_g))
    }

    /// Angular rate in rad/s, given the full-scale range (deg/s) configured on the pen.
    pub fn gyro_scaled(&self, range_dps: f64) -> [f64; 3] {
        self.gyro.map(|v| scale_raw(v, range_dps).to_radians())
    }
}

fn scale_raw(raw: i16, range: f64) -> f64 {
    raw as f64 / 32768.0 * range
}

/// Result of decoding a well-sized frame.
///
/// A frame whose VALID bit is unset still decodes, but must be skipped by
/// the edge tracker and every consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoded {
    Valid(ImuSample),
    NoPayload(ImuSample),
}

impl Decoded {
    /// The sample, if it carries a valid payload.
    pub fn valid(self) -> Option<ImuSample> {
        match self {
            Decoded::Valid(sample) => Some(sample),
            Decoded::NoPayload(_) => None,
        }
    }

    /// The decoded fields regardless of validity.
    pub fn sample(&self) -> &ImuSample {
        match self {
            Decoded::Valid(sample) | Decoded::NoPayload(sample) => sample,
        }
    }
}

/// Pen buttons, in the order their events are emitted.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Primary = 0,
    Secondary = 1,
}

impl Button {
    pub const ALL: [Button; 2] = [Button::Primary, Button::Secondary];

    /// The flag bit that reports this button.
    pub fn flag(self) -> PacketFlags {
        match self {
            Button::Primary => PacketFlags::PRIMARY_BUTTON,
            Button::Secondary => PacketFlags::SECONDARY_BUTTON,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Pressed = 0,
    Released = 1,
}

/// A press or release of one button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: Button,
    pub transition: Transition,
    pub at: Instant,
}

/// Position triple read from one serial line.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Everything a binary pen stream publishes, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PenEvent {
    Sample(ImuSample),
    Button(ButtonEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(accel: [i16; 3], gyro: [i16; 3], flags: u16) -> ImuSample {
        ImuSample {
            accel,
            gyro,
            flags: PacketFlags::from_bits_retain(flags),
            received_at: Instant::now(),
            inter_arrival_ms: 0.0,
        }
    }

    #[test]
    fn test_accel_scaled_full_range() {
        let s = sample([16384, -32768, 0], [0; 3], 1);
        let g = s.accel_scaled(4.0);
        assert!((g[0] - 2.0).abs() < 1e-12);
        assert!((g[1] + 4.0).abs() < 1e-12);
        assert_eq!(g[2], 0.0);
    }

    #[test]
    fn test_gyro_scaled_is_radians() {
        let s = sample([0; 3], [16384, 0, 0], 1);
        let w = s.gyro_scaled(360.0);
        assert!((w[0] - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_decoded_valid_filters_no_payload() {
        let s = sample([1, 2, 3], [4, 5, 6], 0b110);
        assert!(!s.is_valid());
        assert_eq!(Decoded::NoPayload(s).valid(), None);
        assert_eq!(Decoded::Valid(s).valid(), Some(s));
        assert_eq!(Decoded::NoPayload(s).sample().accel, [1, 2, 3]);
    }

    #[test]
    fn test_unknown_flag_bits_retained() {
        let flags = PacketFlags::from_bits_retain(0x8003);
        assert_eq!(flags.bits(), 0x8003);
        assert!(flags.contains(PacketFlags::VALID | PacketFlags::PRIMARY_BUTTON));
    }
}
