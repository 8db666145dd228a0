use crate::error::CoreError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Parse an IANA timezone name
pub fn parse_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone).map_err(|_| CoreError::InvalidTimezone(timezone.to_string()))
}

/// Calendar date of `at` as seen in `tz`
#[inline]
pub fn local_date(at: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}

/// Today's calendar date in `tz`
pub fn today_in(tz: &Tz) -> NaiveDate {
    local_date(Utc::now(), tz)
}

/// A UTC instant that falls on `date` in `tz`, at local `time`.
///
/// Nonexistent local times (spring-forward gaps) move one hour later; ambiguous
/// ones take the earliest mapping.
pub fn instant_on(date: NaiveDate, time: NaiveTime, tz: &Tz) -> DateTime<Utc> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => {
            let shifted = naive + chrono::Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|local| local.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
        }
    }
}

/// Last day of the month containing `date`
pub fn last_day_of_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("UTC").unwrap(), Tz::UTC);
        assert!(parse_timezone("America/New_York").is_ok());
        assert!(matches!(
            parse_timezone("Invalid/Timezone"),
            Err(CoreError::InvalidTimezone(name)) if name == "Invalid/Timezone"
        ));
    }

    #[test]
    fn test_local_date_crosses_midnight() {
        let tz = parse_timezone("America/New_York").unwrap();
        // 03:00 UTC on Jan 2nd is still Jan 1st in New York
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap();
        assert_eq!(local_date(at, &tz), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(local_date(at, &Tz::UTC), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_instant_on_round_trips_local_date() {
        let tz = parse_timezone("Asia/Tokyo").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        assert_eq!(local_date(instant_on(date, noon, &tz), &tz), date);
    }

    #[test]
    fn test_instant_on_spring_forward_gap() {
        let tz = parse_timezone("America/New_York").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let missing = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        let instant = instant_on(date, missing, &tz);
        assert_eq!(local_date(instant, &tz), date);
    }

    #[test]
    fn test_last_day_of_month() {
        let feb_leap = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let feb = NaiveDate::from_ymd_opt(2023, 2, 10).unwrap();
        let dec = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        assert_eq!(last_day_of_month(feb_leap), 29);
        assert_eq!(last_day_of_month(feb), 28);
        assert_eq!(last_day_of_month(dec), 31);
    }
}
