use chrono::{DateTime, Days, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Next daily run at `hour:00` local time in `tz`, strictly after `now`.
///
/// On a DST change the earliest matching instant is used; if `hour:00` does not exist
/// that day the run moves to the first hour after the gap.
pub fn next_run_after(now: DateTime<Utc>, tz: Tz, hour: u32) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();

    (0..=2)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|date| local_run_time(date, tz, hour))
        .find(|at| *at > now)
        .unwrap_or_else(|| now + chrono::Duration::days(1))
}

fn local_run_time(date: NaiveDate, tz: Tz, hour: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, 0, 0)?;
    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(at) => at,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz
            .from_local_datetime(&(naive + chrono::Duration::hours(1)))
            .earliest()?,
    };
    Some(local.with_timezone(&Utc))
}
