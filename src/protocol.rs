use crate::error::DecodeError;
use crate::types::{Decoded, ImuSample, PacketFlags};
use std::time::Instant;

// -- GATT identifiers --
pub const SERVICE_UUID: &str = "2bfae565-df4e-45b6-b1fa-a6f75c1be2b3";
pub const CHARACTERISTIC_UUID: &str = "e76d106d-a549-4b3a-afbd-8879582943fe";

// -- Frame geometry --
pub const FRAME_SIZE: usize = 20;
const ACCEL_OFFSET: usize = 0;
const GYRO_OFFSET: usize = 6;
const FLAGS_OFFSET: usize = 12;

/// Milliseconds elapsed between two host timestamps, zero if `now` is earlier.
pub fn inter_arrival_ms(now: Instant, last_seen: Instant) -> f64 {
    now.saturating_duration_since(last_seen).as_secs_f64() * 1000.0
}

fn read_i16x3(data: &[u8], offset: usize) -> [i16; 3] {
    let at = |i: usize| i16::from_le_bytes([data[offset + 2 * i], data[offset + 2 * i + 1]]);
    [at(0), at(1), at(2)]
}

/// Decode one pen notification frame.
///
/// Frame layout (little-endian):
/// - `[0..6]`: accelerometer x, y, z as 3x int16
/// - `[6..12]`: gyroscope x, y, z as 3x int16
/// - `[12..14]`: flags as uint16 (bit 0 valid, bit 1 primary, bit 2 secondary)
/// - `[14..20]`: trailing padding, ignored
///
/// Values pass through in raw device units. The caller supplies both
/// timestamps; no clock state is held here.
pub fn decode(frame: &[u8], now: Instant, last_seen: Instant) -> Result<Decoded, DecodeError> {
    if frame.len() != FRAME_SIZE {
        return Err(DecodeError::BadLength {
            expected: FRAME_SIZE,
            actual: frame.len(),
        });
    }

    let flags = u16::from_le_bytes([frame[FLAGS_OFFSET], frame[FLAGS_OFFSET + 1]]);

    let sample = ImuSample {
        accel: read_i16x3(frame, ACCEL_OFFSET),
        gyro: read_i16x3(frame, GYRO_OFFSET),
        flags: PacketFlags::from_bits_retain(flags),
        received_at: now,
        inter_arrival_ms: inter_arrival_ms(now, last_seen),
    };

    if sample.is_valid() {
        Ok(Decoded::Valid(sample))
    } else {
        Ok(Decoded::NoPayload(sample))
    }
}

/// Build a frame in the pen's wire layout. Inverse of [`decode`].
pub fn encode_frame(accel: [i16; 3], gyro: [i16; 3], flags: u16) -> [u8; FRAME_SIZE] {
    let mut buf = [0u8; FRAME_SIZE];
    for (i, v) in accel.iter().enumerate() {
        buf[ACCEL_OFFSET + 2 * i..ACCEL_OFFSET + 2 * i + 2].copy_from_slice(&v.to_le_bytes());
    }
    for (i, v) in gyro.iter().enumerate() {
        buf[GYRO_OFFSET + 2 * i..GYRO_OFFSET + 2 * i + 2].copy_from_slice(&v.to_le_bytes());
    }
    buf[FLAGS_OFFSET..FLAGS_OFFSET + 2].copy_from_slice(&flags.to_le_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_decode_rejects_wrong_lengths() {
        let now = Instant::now();
        let buf = [0xFFu8; 64];
        for len in [0, 1, 14, 19, 21, 40, 64] {
            let err = decode(&buf[..len], now, now).unwrap_err();
            assert_eq!(
                err,
                DecodeError::BadLength {
                    expected: FRAME_SIZE,
                    actual: len
                }
            );
        }
    }

    #[test]
    fn test_decode_known_frame() {
        // accel = (1, -1, 256), gyro = (-32768, 32767, 0), flags = valid | primary
        let data: [u8; 20] = [
            0x01, 0x00, 0xff, 0xff, 0x00, 0x01, 0x00, 0x80, 0xff, 0x7f, 0x00, 0x00, 0x03, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let last = Instant::now();
        let now = last + Duration::from_millis(15);

        let sample = decode(&data, now, last).unwrap().valid().unwrap();
        assert_eq!(sample.accel, [1, -1, 256]);
        assert_eq!(sample.gyro, [-32768, 32767, 0]);
        assert_eq!(
            sample.flags,
            PacketFlags::VALID | PacketFlags::PRIMARY_BUTTON
        );
        assert_eq!(sample.received_at, now);
        assert!((sample.inter_arrival_ms - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_encode_decode_identity() {
        let now = Instant::now();
        let cases = [
            ([0, 0, 0], [0, 0, 0], 0x0001),
            ([i16::MIN, -1, i16::MAX], [123, -456, 789], 0x0007),
            ([-2048, 4096, 16384], [-1, -2, -3], 0xFFFF),
        ];
        for (accel, gyro, flags) in cases {
            let frame = encode_frame(accel, gyro, flags);
            let decoded = decode(&frame, now, now).unwrap();
            let sample = decoded.sample();
            assert_eq!(sample.accel, accel);
            assert_eq!(sample.gyro, gyro);
            assert_eq!(sample.flags.bits(), flags);
        }
    }

    #[test]
    fn test_decode_without_valid_bit() {
        let now = Instant::now();
        let frame = encode_frame([10, 20, 30], [0; 3], 0b110);
        let decoded = decode(&frame, now, now).unwrap();
        assert!(matches!(decoded, Decoded::NoPayload(_)));
        assert_eq!(decoded.sample().accel, [10, 20, 30]);
        assert!(decoded.valid().is_none());
    }

    #[test]
    fn test_inter_arrival_never_negative() {
        let now = Instant::now();
        let later = now + Duration::from_millis(5);
        assert_eq!(inter_arrival_ms(now, later), 0.0);
    }
}
