//! Mountain View time.
//!
//! Dates on the command line, commit timestamps and the six-month window are
//! all read in America/Los_Angeles.

use crate::error::PinboardError;
use crate::Result;
use chrono::{
    DateTime, Duration, FixedOffset, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime,
    Offset, SecondsFormat, TimeZone, Utc,
};
use chrono_tz::America::Los_Angeles;

/// Pacific offset in effect at a UTC instant.
pub fn pacific_offset(utc: &DateTime<Utc>) -> FixedOffset {
    Los_Angeles.offset_from_utc_datetime(&utc.naive_utc()).fix()
}

/// A UTC instant as Pacific time.
pub fn to_pacific(utc: &DateTime<Utc>) -> DateTime<FixedOffset> {
    utc.with_timezone(&pacific_offset(utc))
}

/// Pacific wall-clock time as an aware timestamp. Repeated autumn times
/// resolve to standard time; times skipped in spring keep the wall clock
/// with the daylight offset.
pub fn from_pacific_local(local: NaiveDateTime) -> Result<DateTime<FixedOffset>> {
    match Los_Angeles.from_local_datetime(&local) {
        LocalResult::Single(aware) => Ok(aware.fixed_offset()),
        LocalResult::Ambiguous(_, standard) => Ok(standard.fixed_offset()),
        LocalResult::None => {
            let after = local + Duration::hours(1);
            let offset = Los_Angeles
                .from_local_datetime(&after)
                .earliest()
                .map(|aware| aware.offset().fix())
                .ok_or_else(|| PinboardError::InvalidDate(local.to_string()))?;
            offset
                .from_local_datetime(&local)
                .single()
                .ok_or_else(|| PinboardError::InvalidDate(local.to_string()))
        }
    }
}

/// The current Pacific time.
pub fn now() -> DateTime<FixedOffset> {
    to_pacific(&Utc::now())
}

/// Yesterday at this time, the default `--date`.
pub fn yesterday() -> DateTime<FixedOffset> {
    now() - Duration::days(1)
}

/// Parse `--date`. Bare dates and times are read as Pacific time;
/// timestamps with an offset are converted to it.
pub fn parse_date(value: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(aware) = DateTime::parse_from_rfc3339(value) {
        return Ok(to_pacific(&aware.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(local) = NaiveDateTime::parse_from_str(value, format) {
            return from_pacific_local(local);
        }
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| PinboardError::InvalidDate(value.to_string()))?;
    from_pacific_local(date.and_time(NaiveTime::MIN))
}

/// Start of the day after `date`, the cutoff for its last commit.
pub fn end_of_day(date: &DateTime<FixedOffset>) -> Result<DateTime<FixedOffset>> {
    let next = date
        .date_naive()
        .succ_opt()
        .ok_or_else(|| PinboardError::InvalidDate(date.to_string()))?;
    from_pacific_local(next.and_time(NaiveTime::MIN))
}

/// ISO 8601 with seconds and a numeric offset, e.g.
/// `2019-03-18T00:00:00-07:00`.
pub fn isoformat(time: &DateTime<FixedOffset>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// The date, as `YYYY-MM-DD`, `months` months before `now`.
pub fn months_ago(now: &DateTime<FixedOffset>, months: u32) -> String {
    let date = now.date_naive();
    date.checked_sub_months(Months::new(months))
        .unwrap_or(date)
        .format("%Y-%m-%d")
        .to_string()
}

/// Noon (naive) on the date of a stored timestamp such as
/// `2019-03-17T23:50:16-07:00` or `2019-03-17`.
pub fn noon_of(timestamp: &str) -> Result<NaiveDateTime> {
    let date = timestamp.split('T').next().unwrap_or(timestamp);
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| PinboardError::InvalidDate(timestamp.to_string()))?;
    date.and_hms_opt(12, 0, 0)
        .ok_or_else(|| PinboardError::InvalidDate(timestamp.to_string()))
}

/// The same wall-clock time a year earlier. Feb 29 maps to Feb 28.
pub fn a_year_before(time: NaiveDateTime) -> NaiveDateTime {
    time.checked_sub_months(Months::new(12)).unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    const PST: i32 = -8 * 3600;
    const PDT: i32 = -7 * 3600;

    #[test]
    fn test_pacific_offset_follows_dst() {
        assert_eq!(pacific_offset(&utc("2019-01-15T12:00:00Z")).local_minus_utc(), PST);
        assert_eq!(pacific_offset(&utc("2019-07-15T12:00:00Z")).local_minus_utc(), PDT);
        // 2019-03-10 02:00 PST
        assert_eq!(pacific_offset(&utc("2019-03-10T09:59:59Z")).local_minus_utc(), PST);
        assert_eq!(pacific_offset(&utc("2019-03-10T10:00:00Z")).local_minus_utc(), PDT);
        // 2019-11-03 02:00 PDT
        assert_eq!(pacific_offset(&utc("2019-11-03T08:59:59Z")).local_minus_utc(), PDT);
        assert_eq!(pacific_offset(&utc("2019-11-03T09:00:00Z")).local_minus_utc(), PST);
    }

    #[test]
    fn test_pacific_offset_before_2007() {
        // Daylight time ran from the first Sunday of April to the last
        // Sunday of October.
        assert_eq!(pacific_offset(&utc("2006-03-20T12:00:00Z")).local_minus_utc(), PST);
        assert_eq!(pacific_offset(&utc("2006-04-02T09:59:59Z")).local_minus_utc(), PST);
        assert_eq!(pacific_offset(&utc("2006-04-02T10:00:00Z")).local_minus_utc(), PDT);
        assert_eq!(pacific_offset(&utc("2006-10-30T12:00:00Z")).local_minus_utc(), PST);
    }

    #[test]
    fn test_local_times_around_transitions() {
        let local = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
        let repeated = from_pacific_local(local("2019-11-03 01:30:00")).unwrap();
        assert_eq!(isoformat(&repeated), "2019-11-03T01:30:00-08:00");
        let skipped = from_pacific_local(local("2019-03-10 02:30:00")).unwrap();
        assert_eq!(isoformat(&skipped), "2019-03-10T02:30:00-07:00");
    }

    #[test]
    fn test_commit_time_in_pacific() {
        let time = to_pacific(&Utc.timestamp_opt(1552891816, 0).unwrap());
        assert_eq!(isoformat(&time), "2019-03-17T23:50:16-07:00");
    }

    #[test]
    fn test_end_of_day() {
        let date = parse_date("2019-03-17 04:01:01").unwrap();
        assert_eq!(isoformat(&end_of_day(&date).unwrap()), "2019-03-18T00:00:00-07:00");
        let winter = parse_date("2019-01-31").unwrap();
        assert_eq!(isoformat(&end_of_day(&winter).unwrap()), "2019-02-01T00:00:00-08:00");
    }

    #[test]
    fn test_parse_date_with_offset() {
        let date = parse_date("2019-03-18T07:00:00Z").unwrap();
        assert_eq!(isoformat(&date), "2019-03-18T00:00:00-07:00");
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn test_months_ago() {
        let now = parse_date("2019-04-20").unwrap();
        assert_eq!(months_ago(&now, 6), "2018-10-20");
        let end_of_month = parse_date("2019-08-31").unwrap();
        assert_eq!(months_ago(&end_of_month, 6), "2019-02-28");
    }

    #[test]
    fn test_noon_and_a_year_before() {
        let noon = noon_of("2019-03-17T23:50:16-07:00").unwrap();
        assert_eq!(noon.to_string(), "2019-03-17 12:00:00");
        assert_eq!(a_year_before(noon).to_string(), "2018-03-17 12:00:00");
        let leap = noon_of("2020-02-29").unwrap();
        assert_eq!(a_year_before(leap).to_string(), "2019-02-28 12:00:00");
    }
}
