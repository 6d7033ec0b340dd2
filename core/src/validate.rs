//! Shared field validators. All of them are pure: they run before any store
//! access, so a rejected request never leaves a trace.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;

use crate::error::FieldError;

/// Inclusive upper bound on the span of a date-range query, in days
/// between the endpoints.
pub const MAX_RANGE_DAYS: i64 = 365;

/// Clock-skew grace for point-in-time measurements.
const FUTURE_SKEW: Duration = Duration::minutes(5);

static TIME_OF_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("valid time-of-day pattern"));

pub fn validate_not_blank(field: &str, value: &str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        return Err(FieldError::new(field, format!("{field} must not be empty")));
    }
    Ok(())
}

/// Ratings (priority, severity, mood score) share a 1-5 scale.
pub fn validate_rating(field: &str, value: i32) -> Result<(), FieldError> {
    if !(1..=5).contains(&value) {
        return Err(FieldError::new(
            field,
            format!("{field} must be between 1 and 5, got {value}"),
        ));
    }
    Ok(())
}

/// Calendar dates may sit one day ahead of UTC so clients west of the date
/// line can still log "today".
pub fn validate_date_not_future(field: &str, date: NaiveDate) -> Result<(), FieldError> {
    let tomorrow = Utc::now().date_naive() + Duration::days(1);
    if date > tomorrow {
        return Err(FieldError::new(
            field,
            format!("{field} {date} is in the future"),
        ));
    }
    Ok(())
}

/// Validate an inclusive date range and cap its span.
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), FieldError> {
    if end < start {
        return Err(FieldError::new(
            "end_date",
            format!("end_date {end} is before start_date {start}"),
        ));
    }
    let span = (end - start).num_days();
    if span > MAX_RANGE_DAYS {
        return Err(FieldError::new(
            "end_date",
            format!("date range spans {span} days, maximum is {MAX_RANGE_DAYS}"),
        ));
    }
    Ok(())
}

pub fn validate_timestamp_not_future(
    field: &str,
    timestamp: DateTime<Utc>,
) -> Result<(), FieldError> {
    if timestamp > Utc::now() + FUTURE_SKEW {
        return Err(FieldError::new(
            field,
            format!("{field} {timestamp} is in the future"),
        ));
    }
    Ok(())
}

/// Times of day are 24h "HH:MM" strings. They key activity entries within a
/// day, so the format must be exact for lookups to work.
pub fn validate_time_of_day(field: &str, value: &str) -> Result<(), FieldError> {
    if !TIME_OF_DAY.is_match(value) {
        return Err(FieldError::new(
            field,
            format!("{field} must be a 24h time in HH:MM format, got '{value}'"),
        ));
    }
    Ok(())
}

pub fn validate_weight(value: f64) -> Result<(), FieldError> {
    if !value.is_finite() || value <= 0.0 || value > 1000.0 {
        return Err(FieldError::new(
            "weight",
            format!("weight must be between 1 and 1000 kg, got {value}"),
        ));
    }
    Ok(())
}

pub fn validate_height(value: f64) -> Result<(), FieldError> {
    if !value.is_finite() || !(50.0..=300.0).contains(&value) {
        return Err(FieldError::new(
            "height",
            format!("height must be between 50 and 300 cm, got {value}"),
        ));
    }
    Ok(())
}

pub fn validate_body_fat_percentage(value: f64) -> Result<(), FieldError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(FieldError::new(
            "bodyFatPercentage",
            format!("bodyFatPercentage must be between 0 and 100, got {value}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_strings_are_rejected() {
        assert!(validate_not_blank("title", "").is_err());
        assert!(validate_not_blank("title", "   ").is_err());
        assert!(validate_not_blank("title", "ok").is_ok());
    }

    #[test]
    fn ratings_must_be_one_through_five() {
        assert!(validate_rating("priority", 0).is_err());
        assert!(validate_rating("priority", 6).is_err());
        for v in 1..=5 {
            assert!(validate_rating("priority", v).is_ok());
        }
    }

    #[test]
    fn tomorrow_is_allowed_but_later_is_not() {
        let today = Utc::now().date_naive();
        assert!(validate_date_not_future("date", today).is_ok());
        assert!(validate_date_not_future("date", today + Duration::days(1)).is_ok());
        assert!(validate_date_not_future("date", today + Duration::days(2)).is_err());
    }

    #[test]
    fn date_range_caps_at_a_year() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(validate_date_range(start, start).is_ok());
        assert!(validate_date_range(start, start + Duration::days(365)).is_ok());
        assert!(validate_date_range(start, start + Duration::days(366)).is_err());
        assert!(validate_date_range(start, start - Duration::days(1)).is_err());
    }

    #[test]
    fn time_of_day_format_is_strict() {
        assert!(validate_time_of_day("time", "00:00").is_ok());
        assert!(validate_time_of_day("time", "23:59").is_ok());
        assert!(validate_time_of_day("time", "24:00").is_err());
        assert!(validate_time_of_day("time", "7:30").is_err());
        assert!(validate_time_of_day("time", "07:60").is_err());
        assert!(validate_time_of_day("time", "morning").is_err());
    }

    #[test]
    fn measurement_ranges() {
        assert!(validate_weight(70.0).is_ok());
        assert!(validate_weight(0.0).is_err());
        assert!(validate_weight(1000.5).is_err());
        assert!(validate_weight(f64::NAN).is_err());

        assert!(validate_height(170.0).is_ok());
        assert!(validate_height(49.9).is_err());
        assert!(validate_height(300.1).is_err());

        assert!(validate_body_fat_percentage(0.0).is_ok());
        assert!(validate_body_fat_percentage(100.0).is_ok());
        assert!(validate_body_fat_percentage(-0.1).is_err());
        assert!(validate_body_fat_percentage(100.1).is_err());
    }

    #[test]
    fn future_timestamps_rejected_beyond_skew() {
        assert!(validate_timestamp_not_future("measurementTime", Utc::now()).is_ok());
        assert!(
            validate_timestamp_not_future("measurementTime", Utc::now() + Duration::hours(1))
                .is_err()
        );
    }
}
