use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Bytes of the deregistration record that carry the timestamp; anything after them is ignored.
pub const STAMP_LEN: usize = 7;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected at least 7 bytes, got {len} ({raw})")]
    Length { len: usize, raw: String },
    #[error("not a calendar time: {0:?}")]
    InvalidDate(DeregistrationStamp),
}

/// Deregistration time as the OLT encodes it: big-endian year, then month, day,
/// hour, minute and second as single bytes. Seconds are decoded but correlation
/// floors them away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeregistrationStamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DeregistrationStamp {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let &[y_hi, y_lo, month, day, hour, minute, second, ..] = bytes else {
            return Err(DecodeError::Length {
                len: bytes.len(),
                raw: hex::encode(bytes),
            });
        };
        Ok(Self {
            year: u16::from_be_bytes([y_hi, y_lo]),
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    pub fn encode(&self) -> [u8; STAMP_LEN] {
        let [y_hi, y_lo] = self.year.to_be_bytes();
        [y_hi, y_lo, self.month, self.day, self.hour, self.minute, self.second]
    }

    pub fn to_datetime(&self) -> Result<NaiveDateTime, DecodeError> {
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day))
            .and_then(|date| date.and_hms_opt(u32::from(self.hour), u32::from(self.minute), u32::from(self.second)))
            .ok_or(DecodeError::InvalidDate(*self))
    }
}

/// Decodes a raw record straight into a timestamp.
pub fn decode_timestamp(bytes: &[u8]) -> Result<NaiveDateTime, DecodeError> {
    DeregistrationStamp::decode(bytes)?.to_datetime()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_record() {
        // 2024-10-16 10:00:05
        let raw = hex::decode("07E80A100A0005").unwrap();
        let ts = decode_timestamp(&raw).unwrap();
        assert_eq!(ts.to_string(), "2024-10-16 10:00:05");
    }

    #[test]
    fn test_roundtrip() {
        let stamp = DeregistrationStamp {
            year: 2025,
            month: 2,
            day: 28,
            hour: 23,
            minute: 59,
            second: 58,
        };
        let encoded = stamp.encode();
        assert_eq!(encoded.len(), STAMP_LEN);
        assert_eq!(DeregistrationStamp::decode(&encoded).unwrap(), stamp);
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(decode_timestamp(&[0x07, 0xE8, 0x0A]), Err(DecodeError::Length { len: 3, .. })));
        assert!(matches!(decode_timestamp(&[]), Err(DecodeError::Length { len: 0, .. })));
        // month 13
        let bad = DeregistrationStamp {
            year: 2024,
            month: 13,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        };
        assert!(matches!(decode_timestamp(&bad.encode()), Err(DecodeError::InvalidDate(_))));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        // DateAndTime style: deci-seconds, then UTC direction, hours and minutes
        let eight = hex::decode("07E80A100A000503").unwrap();
        let eleven = hex::decode("07E80A100A0005032B0300").unwrap();
        assert_eq!(decode_timestamp(&eight).unwrap().to_string(), "2024-10-16 10:00:05");
        assert_eq!(decode_timestamp(&eleven).unwrap().to_string(), "2024-10-16 10:00:05");
    }
}
