//! Creation-date filtering for ticket listings
//!
//! `date=YYYY-MM-DD` selects one calendar day; `startDate` plus `endDate`
//! select an inclusive span of days. A single `date` wins when both forms are
//! present. Day bounds are computed in UTC.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};

use crate::handlers::{ApiError, QueryParams};
use crate::schema::{format_timestamp, parse_timestamp};
use crate::store::{Condition, Filter};

/// Field the date parameters range over
pub const CREATED_AT: &str = "createdAt";

pub const INVALID_DATE_MESSAGE: &str = "Invalid date format. Expected: YYYY-MM-DD";

/// Remove the date parameters from `params` and turn them into a filter
///
/// Without usable date parameters the filter is empty. The parameters are
/// consumed in every case, so they never reach the generic filter stage.
pub fn date_range_filter(params: &mut QueryParams) -> Result<Filter, ApiError> {
    let date = non_empty(params.take("date"));
    let start = non_empty(params.take("startDate"));
    let end = non_empty(params.take("endDate"));

    let (first, last) = match (date, start, end) {
        (Some(date), _, _) => {
            let day = parse_day(&date)?;
            (day, day)
        }
        (None, Some(start), Some(end)) => (parse_day(&start)?, parse_day(&end)?),
        _ => return Ok(Filter::new()),
    };

    let from = start_of_day(first);
    let until = end_of_day(last).ok_or_else(|| ApiError::bad_request(INVALID_DATE_MESSAGE))?;
    tracing::debug!(%from, %until, "filtering tickets by creation date");

    Ok(Filter::new()
        .and(Condition::gte(CREATED_AT, format_timestamp(&from)))
        .and(Condition::lte(CREATED_AT, format_timestamp(&until))))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn parse_day(raw: &str) -> Result<NaiveDate, ApiError> {
    parse_timestamp(raw.trim())
        .map(|at| at.date_naive())
        .ok_or_else(|| ApiError::bad_request(INVALID_DATE_MESSAGE))
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Last millisecond of the day
fn end_of_day(day: NaiveDate) -> Option<DateTime<Utc>> {
    day.succ_opt()
        .map(start_of_day)
        .and_then(|next| next.checked_sub_signed(TimeDelta::milliseconds(1)))
}
