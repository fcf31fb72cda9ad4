//! Conversion between the textual dates clients send, the midnight-UTC
//! timestamps stored for each event, and the `DD-MM-YYYY` wire format.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Format used for `eventdate` in list/get responses.
pub const WIRE_DATE_FORMAT: &str = "%d-%m-%Y";

/// Format expected by HTML date pickers.
pub const PICKER_DATE_FORMAT: &str = "%Y-%m-%d";

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a client supplied date. Timestamps keep their own calendar date;
/// the time-of-day and offset are discarded.
pub fn parse_event_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.date_naive());
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Storage representation: the calendar date at midnight UTC.
pub fn to_storage(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub fn format_event_date(stored: &DateTime<Utc>) -> String {
    stored.format(WIRE_DATE_FORMAT).to_string()
}

/// Converts a `DD-MM-YYYY` wire date into the `YYYY-MM-DD` form a date
/// picker control expects.
pub fn wire_date_to_picker(wire: &str) -> Option<String> {
    NaiveDate::parse_from_str(wire.trim(), WIRE_DATE_FORMAT)
        .ok()
        .map(|date| date.format(PICKER_DATE_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_accepts_common_representations() {
        let expected = ymd(2024, 3, 5);
        for input in [
            "2024-03-05",
            "March 5, 2024",
            "Mar 5, 2024",
            "5 March 2024",
            "2024/03/05",
            "03/05/2024",
            "2024-03-05T18:30:00",
            "2024-03-05T18:30",
            "2024-03-05T10:00:00.000Z",
            "2024-03-05T23:30:00-05:00",
            "Tue, 5 Mar 2024 09:00:00 +0000",
            "  2024-03-05  ",
        ] {
            assert_eq!(parse_event_date(input), Some(expected), "input {:?}", input);
        }
    }

    #[test]
    fn test_rejects_garbage() {
        for input in ["", "   ", "not-a-date", "2024-02-30", "2024-13-01", "05-03-2024x"] {
            assert_eq!(parse_event_date(input), None, "input {:?}", input);
        }
    }

    #[test]
    fn test_storage_is_midnight_utc() {
        let stored = to_storage(ymd(2024, 1, 10));
        assert_eq!(stored.date_naive(), ymd(2024, 1, 10));
        assert_eq!(stored.num_seconds_from_midnight(), 0);
        assert_eq!(stored.to_rfc3339(), "2024-01-10T00:00:00+00:00");
    }

    #[test]
    fn test_wire_format_is_independent_of_input_format() {
        let iso = to_storage(parse_event_date("2024-03-05").unwrap());
        let long = to_storage(parse_event_date("March 5, 2024").unwrap());
        assert_eq!(format_event_date(&iso), "05-03-2024");
        assert_eq!(format_event_date(&long), "05-03-2024");
    }

    #[test]
    fn test_wire_date_to_picker() {
        assert_eq!(wire_date_to_picker("10-01-2024").as_deref(), Some("2024-01-10"));
        assert_eq!(wire_date_to_picker("2024-01-10"), None);
        assert_eq!(wire_date_to_picker("31-02-2024"), None);
    }
}
