//! The MessagePack timestamp extension (type code `-1`).
//!
//! | form | payload | used when |
//! |------|---------|-----------|
//! | 32-bit | `u32` seconds | no nanoseconds, `0 <= seconds < 2^32` |
//! | 64-bit | `nanos << 34 \| seconds` | `0 <= seconds < 2^34` |
//! | 96-bit | `u32` nanos, `i64` seconds | anything else |

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::BufMut;

use crate::{MessagePackError, Result};

const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// Seconds and nanoseconds relative to the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    seconds: i64,
    nanoseconds: u32,
}

impl Timestamp {
    pub const UNIX_EPOCH: Timestamp = Timestamp {
        seconds: 0,
        nanoseconds: 0,
    };

    /// Fails if `nanoseconds` is not below one second.
    pub fn new(seconds: i64, nanoseconds: u32) -> Result<Self> {
        if nanoseconds >= NANOS_PER_SECOND {
            return Err(MessagePackError::InvalidValue(format!(
                "timestamp nanoseconds out of range: {}",
                nanoseconds
            )));
        }
        Ok(Self { seconds, nanoseconds })
    }

    pub const fn from_seconds(seconds: i64) -> Self {
        Self {
            seconds,
            nanoseconds: 0,
        }
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn nanoseconds(&self) -> u32 {
        self.nanoseconds
    }

    /// Length of the extension payload for this value: 4, 8 or 12.
    pub fn payload_len(&self) -> usize {
        if self.seconds >> 34 == 0 {
            if self.nanoseconds == 0 && self.seconds >> 32 == 0 {
                4
            } else {
                8
            }
        } else {
            12
        }
    }

    pub(crate) fn put_payload<B: BufMut>(&self, buf: &mut B) {
        match self.payload_len() {
            4 => buf.put_u32(self.seconds as u32),
            8 => buf.put_u64(((self.nanoseconds as u64) << 34) | self.seconds as u64),
            _ => {
                buf.put_u32(self.nanoseconds);
                buf.put_i64(self.seconds);
            }
        }
    }

    /// Decodes a 4, 8 or 12-byte payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        match payload.len() {
            4 => {
                let seconds = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                Ok(Self::from_seconds(seconds as i64))
            }
            8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(payload);
                let packed = u64::from_be_bytes(raw);
                Self::new((packed & 0x3_ffff_ffff) as i64, (packed >> 34) as u32)
            }
            12 => {
                let nanoseconds = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&payload[4..]);
                Self::new(i64::from_be_bytes(raw), nanoseconds)
            }
            other => Err(MessagePackError::InvalidValue(format!(
                "timestamp payload must be 4, 8 or 12 bytes, got {}",
                other
            ))),
        }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Self {
                seconds: after.as_secs() as i64,
                nanoseconds: after.subsec_nanos(),
            },
            Err(err) => {
                let before = err.duration();
                let mut seconds = -(before.as_secs() as i64);
                let mut nanoseconds = before.subsec_nanos();
                if nanoseconds > 0 {
                    seconds -= 1;
                    nanoseconds = NANOS_PER_SECOND - nanoseconds;
                }
                Self { seconds, nanoseconds }
            }
        }
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> Self {
        if ts.seconds >= 0 {
            UNIX_EPOCH + Duration::new(ts.seconds as u64, ts.nanoseconds)
        } else {
            UNIX_EPOCH - Duration::from_secs(ts.seconds.unsigned_abs()) + Duration::from_nanos(ts.nanoseconds as u64)
        }
    }
}
