use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, Time, UtcOffset};

use crate::error::CollectorError;

const QUERY_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year][month][day]");
const ARTIFACT_DATE: &[BorrowedFormatItem<'static>] = format_description!("[month][day][year]");
const CLI_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// The instant a run targets: one year and one day before `now`.
///
/// A 29 February anchor falls back to 28 February of the previous year.
pub(crate) fn business_date(now: OffsetDateTime) -> Result<OffsetDateTime, CollectorError> {
    let date = now.date();
    let year = date.year() - 1;
    let shifted = date
        .replace_year(year)
        .or_else(|_| date.replace_day(28).and_then(|d| d.replace_year(year)))
        .map_err(|err| {
            CollectorError::InvalidArgument(format!("Cannot derive business date from {now}: {err}"))
        })?;

    now.replace_date(shifted)
        .checked_sub(Duration::days(1))
        .ok_or_else(|| {
            CollectorError::InvalidArgument(format!("Business date before {shifted} is out of range"))
        })
}

/// `YYYYMMDD`, the form openFDA expects in `receivedate:` searches.
pub(crate) fn query_date(at: OffsetDateTime) -> Result<String, CollectorError> {
    format_with(at.date(), QUERY_DATE)
}

/// `MMDDYYYY`, used in artifact file names.
pub(crate) fn artifact_date(date: Date) -> Result<String, CollectorError> {
    format_with(date, ARTIFACT_DATE)
}

/// Parses a `YYYY-MM-DD` argument into midnight UTC of that day.
pub(crate) fn parse_cli_date(value: &str) -> Result<OffsetDateTime, CollectorError> {
    let date = Date::parse(value.trim(), CLI_DATE).map_err(|err| {
        CollectorError::InvalidArgument(format!("--date must be in YYYY-MM-DD format ({err})"))
    })?;
    Ok(date.with_time(Time::MIDNIGHT).assume_utc())
}

/// The first `hour:00` UTC strictly after `now`.
pub(crate) fn next_fire_after(
    now: OffsetDateTime,
    hour: u8,
) -> Result<OffsetDateTime, CollectorError> {
    let at = Time::from_hms(hour, 0, 0)
        .map_err(|err| CollectorError::InvalidArgument(format!("Invalid schedule hour {hour}: {err}")))?;
    let now = now.to_offset(UtcOffset::UTC);
    let today = now.replace_time(at);
    if today > now {
        return Ok(today);
    }
    today
        .checked_add(Duration::days(1))
        .ok_or_else(|| CollectorError::InvalidArgument("Next schedule time is out of range".into()))
}

fn format_with(date: Date, format: &[BorrowedFormatItem<'static>]) -> Result<String, CollectorError> {
    date.format(format)
        .map_err(|err| CollectorError::InvalidArgument(format!("Cannot format date {date}: {err}")))
}
