use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;

/// Parses "2024-03-10", "tomorrow", "next friday" and the like into a calendar
/// day in `tz`.
pub fn parse_day(input: &str, tz: &Tz) -> Result<NaiveDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date);
    }
    parse_date_string(input, Utc::now().with_timezone(tz), Dialect::Uk)
        .map(|at| at.date_naive())
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", input, e))
}

/// Parses a point in time such as "tomorrow 9:00", read in `tz`.
pub fn parse_instant(input: &str, tz: &Tz) -> Result<DateTime<Utc>> {
    parse_date_string(input.trim(), Utc::now().with_timezone(tz), Dialect::Uk)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| anyhow!("Failed to parse time '{}': {}", input, e))
}

/// Parses a wall-clock time: "14:30", "14:30:00" or "2:30 pm".
pub fn parse_clock(input: &str) -> Result<NaiveTime> {
    let input = input.trim();
    ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(input, format).ok())
        .ok_or_else(|| anyhow!("Failed to parse time '{}'; use HH:MM", input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tend_core::timezone::today_in;

    #[test]
    fn test_parse_iso_day() {
        let day = parse_day("2024-03-10", &Tz::UTC).unwrap();
        assert_eq!(day, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    }

    #[test]
    fn test_parse_relative_day() {
        let tz = Tz::UTC;
        let tomorrow = parse_day("tomorrow", &tz).unwrap();
        assert_eq!(tomorrow, today_in(&tz) + Duration::days(1));
    }

    #[test]
    fn test_parse_clock_formats() {
        let expected = NaiveTime::from_hms_opt(14, 30, 0).unwrap();
        assert_eq!(parse_clock("14:30").unwrap(), expected);
        assert_eq!(parse_clock("2:30 PM").unwrap(), expected);
        assert!(parse_clock("half past").is_err());
    }
}
