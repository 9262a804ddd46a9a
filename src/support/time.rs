//! Timestamp formatting shared by the wire protocol.

use chrono::{DateTime, Utc};

/// Format used for `start_time` in replies.
pub const WIRE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_wire_time(ts: &DateTime<Utc>) -> String {
    ts.format(WIRE_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_without_subseconds_or_zone() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format_wire_time(&ts), "2024-03-09 07:05:01");
    }
}
