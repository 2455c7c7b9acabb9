//! Timestamp provider.
//!
//! Wall-clock time at one-second resolution. Clock jumps show up in the
//! timestamps; nothing here is monotonic.

use jiff::Zoned;

use crate::model::{TimeFormat, Timestamp};

/// `strftime` layout for ASCII timestamps.
pub const ASCII_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Seconds since the Unix epoch.
pub fn integer_time() -> i64 {
    jiff::Timestamp::now().as_second()
}

/// Local wall clock as `YYYY-MM-DD HH:MM:SS`.
pub fn ascii_time() -> String {
    Zoned::now().strftime(ASCII_TIME_FORMAT).to_string()
}

/// A timestamp source fixed to one [`TimeFormat`] when it is built.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    format: TimeFormat,
    read: fn() -> Timestamp,
}

impl Clock {
    pub fn new(format: TimeFormat) -> Self {
        let read: fn() -> Timestamp = match format {
            TimeFormat::Integer => || Timestamp::Integer(integer_time()),
            TimeFormat::Ascii => || Timestamp::Ascii(ascii_time()),
        };
        Self { format, read }
    }

    pub fn format(&self) -> TimeFormat {
        self.format
    }

    pub fn now(&self) -> Timestamp {
        (self.read)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_clock_tracks_wall_time() {
        let before = integer_time();
        let ts = Clock::new(TimeFormat::Integer).now();
        let after = integer_time();

        let n = ts.as_integer().unwrap();
        assert!(before <= n && n <= after);
    }

    #[test]
    fn ascii_clock_matches_layout() {
        let Timestamp::Ascii(text) = Clock::new(TimeFormat::Ascii).now() else {
            panic!("expected an ASCII timestamp");
        };

        // 2024-01-31 12:34:56
        assert_eq!(text.len(), 19);
        let bytes = text.as_bytes();
        assert_eq!(bytes[4], b'-');
        assert_eq!(bytes[7], b'-');
        assert_eq!(bytes[10], b' ');
        assert_eq!(bytes[13], b':');
        assert_eq!(bytes[16], b':');
        assert!(text[..4].parse::<u32>().unwrap() >= 2000);
    }
}
