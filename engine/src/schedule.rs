//! Next-run computation for recurring backups.
//!
//! `next_run` is pure: the same policy and `now` always give the same
//! answer, and nothing is read from the environment. Times are naive local
//! wall-clock times; the caller decides which clock `now` comes from.

use crate::error::EngineError;
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `dd.mm.yyyy HH:MM:SS`, as shown to users.
pub const NEXT_RUN_DISPLAY_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// How often a backup repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "every", rename_all = "lowercase")]
pub enum Recurrence {
    Daily,
    Weekly { weekday: Weekday },
    Monthly { day_of_month: u32 },
}

/// A recurrence plus the time of day the backup starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrencePolicy {
    #[serde(flatten)]
    pub recurrence: Recurrence,
    #[serde(rename = "at")]
    pub time_of_day: NaiveTime,
}

impl RecurrencePolicy {
    pub fn daily(time_of_day: NaiveTime) -> Self {
        RecurrencePolicy {
            recurrence: Recurrence::Daily,
            time_of_day,
        }
    }

    pub fn weekly(weekday: Weekday, time_of_day: NaiveTime) -> Self {
        RecurrencePolicy {
            recurrence: Recurrence::Weekly { weekday },
            time_of_day,
        }
    }

    /// Monthly on `day_of_month` (1..=31); short months clamp to their last day.
    pub fn monthly(day_of_month: u32, time_of_day: NaiveTime) -> Result<Self, EngineError> {
        let policy = RecurrencePolicy {
            recurrence: Recurrence::Monthly { day_of_month },
            time_of_day,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check values that deserialization alone cannot rule out.
    pub fn validate(&self) -> Result<(), EngineError> {
        match self.recurrence {
            Recurrence::Monthly { day_of_month } if !(1..=31).contains(&day_of_month) => {
                Err(EngineError::InvalidDayOfMonth(day_of_month))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for RecurrencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = self.time_of_day.format("%H:%M:%S");
        match self.recurrence {
            Recurrence::Daily => write!(f, "daily at {}", at),
            Recurrence::Weekly { weekday } => write!(f, "every {} at {}", weekday, at),
            Recurrence::Monthly { day_of_month } => {
                write!(f, "monthly on day {} at {}", day_of_month, at)
            }
        }
    }
}

/// The first instant strictly after `now` at which `policy` fires.
///
/// Results beyond chrono's date range saturate to `NaiveDateTime::MAX`.
pub fn next_run(policy: &RecurrencePolicy, now: NaiveDateTime) -> NaiveDateTime {
    let time = policy.time_of_day;
    let today_at = now.date().and_time(time);

    let next = match policy.recurrence {
        Recurrence::Daily => {
            if today_at > now {
                Some(today_at)
            } else {
                today_at.checked_add_signed(Duration::days(1))
            }
        }
        Recurrence::Weekly { weekday } => {
            let target = weekday.num_days_from_monday();
            let current = now.weekday().num_days_from_monday();
            let mut days_ahead = (target + 7 - current) % 7;
            if days_ahead == 0 && today_at <= now {
                days_ahead = 7;
            }
            today_at.checked_add_signed(Duration::days(i64::from(days_ahead)))
        }
        Recurrence::Monthly { day_of_month } => {
            let this_month = now.date().with_day(1);
            let candidate = this_month
                .and_then(|first| clamped_day(first, day_of_month))
                .map(|d| d.and_time(time));
            match candidate {
                Some(candidate) if candidate > now => Some(candidate),
                _ => this_month
                    .and_then(|first| first.checked_add_months(Months::new(1)))
                    .and_then(|first| clamped_day(first, day_of_month))
                    .map(|d| d.and_time(time)),
            }
        }
    };

    next.unwrap_or(NaiveDateTime::MAX)
}

/// Render a next-run instant for display.
pub fn format_next_run(at: NaiveDateTime) -> String {
    at.format(NEXT_RUN_DISPLAY_FORMAT).to_string()
}

/// `day` in the month starting at `first`, clamped to the month's last day.
fn clamped_day(first: NaiveDate, day: u32) -> Option<NaiveDate> {
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    first.with_day(day.clamp(1, last.day()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(hh, mm, ss))
            .expect("valid datetime")
    }

    fn time(hh: u32, mm: u32, ss: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hh, mm, ss).expect("valid time")
    }

    #[test]
    fn test_daily_later_today() {
        let policy = RecurrencePolicy::daily(time(18, 0, 0));
        assert_eq!(next_run(&policy, at(2024, 5, 10, 9, 30, 0)), at(2024, 5, 10, 18, 0, 0));
    }

    #[test]
    fn test_daily_already_passed_goes_to_tomorrow() {
        let policy = RecurrencePolicy::daily(time(9, 0, 0));
        assert_eq!(next_run(&policy, at(2024, 12, 31, 9, 0, 0)), at(2025, 1, 1, 9, 0, 0));
    }

    #[test]
    fn test_weekly_wraps_to_next_day() {
        // 2024-03-10 is a Sunday
        let policy = RecurrencePolicy::weekly(Weekday::Mon, time(0, 0, 0));
        assert_eq!(next_run(&policy, at(2024, 3, 10, 23, 59, 0)), at(2024, 3, 11, 0, 0, 0));
    }

    #[test]
    fn test_weekly_same_day_before_and_after() {
        // 2024-03-11 is a Monday
        let policy = RecurrencePolicy::weekly(Weekday::Mon, time(12, 0, 0));
        assert_eq!(next_run(&policy, at(2024, 3, 11, 8, 0, 0)), at(2024, 3, 11, 12, 0, 0));
        assert_eq!(next_run(&policy, at(2024, 3, 11, 12, 0, 1)), at(2024, 3, 18, 12, 0, 0));
    }

    #[test]
    fn test_weekly_earlier_weekday_wraps_into_next_week() {
        // Friday -> Tuesday
        let policy = RecurrencePolicy::weekly(Weekday::Tue, time(7, 15, 0));
        assert_eq!(next_run(&policy, at(2024, 3, 15, 10, 0, 0)), at(2024, 3, 19, 7, 15, 0));
    }

    #[test]
    fn test_monthly_clamps_to_month_end() {
        let policy = RecurrencePolicy::monthly(31, time(10, 0, 0)).expect("valid policy");
        assert_eq!(next_run(&policy, at(2024, 2, 15, 8, 0, 0)), at(2024, 2, 29, 10, 0, 0));
        assert_eq!(next_run(&policy, at(2023, 2, 15, 8, 0, 0)), at(2023, 2, 28, 10, 0, 0));
        assert_eq!(next_run(&policy, at(2023, 4, 1, 8, 0, 0)), at(2023, 4, 30, 10, 0, 0));
    }

    #[test]
    fn test_monthly_passed_moves_to_next_month_and_clamps() {
        let policy = RecurrencePolicy::monthly(31, time(10, 0, 0)).expect("valid policy");
        assert_eq!(next_run(&policy, at(2024, 1, 31, 23, 0, 0)), at(2024, 2, 29, 10, 0, 0));
    }

    #[test]
    fn test_monthly_rolls_over_year_end() {
        let policy = RecurrencePolicy::monthly(15, time(6, 0, 0)).expect("valid policy");
        assert_eq!(next_run(&policy, at(2023, 12, 20, 6, 0, 0)), at(2024, 1, 15, 6, 0, 0));
    }

    #[test]
    fn test_monthly_exact_instant_is_not_in_future() {
        let policy = RecurrencePolicy::monthly(5, time(6, 0, 0)).expect("valid policy");
        assert_eq!(next_run(&policy, at(2024, 6, 5, 6, 0, 0)), at(2024, 7, 5, 6, 0, 0));
    }

    #[test]
    fn test_next_run_is_idempotent() {
        let policies = [
            RecurrencePolicy::daily(time(1, 2, 3)),
            RecurrencePolicy::weekly(Weekday::Sat, time(4, 5, 6)),
            RecurrencePolicy::monthly(29, time(7, 8, 9)).expect("valid policy"),
        ];
        let now = at(2025, 2, 28, 12, 0, 0);
        for policy in &policies {
            assert_eq!(next_run(policy, now), next_run(policy, now));
            assert!(next_run(policy, now) > now);
        }
    }

    #[test]
    fn test_monthly_rejects_out_of_range_day() {
        assert!(matches!(
            RecurrencePolicy::monthly(0, time(0, 0, 0)),
            Err(EngineError::InvalidDayOfMonth(0))
        ));
        assert!(matches!(
            RecurrencePolicy::monthly(32, time(0, 0, 0)),
            Err(EngineError::InvalidDayOfMonth(32))
        ));
    }

    #[test]
    fn test_format_next_run() {
        assert_eq!(format_next_run(at(2024, 3, 7, 9, 5, 3)), "07.03.2024 09:05:03");
    }

    #[test]
    fn test_clamped_day_follows_month_length() {
        let first = |y, m| NaiveDate::from_ymd_opt(y, m, 1).expect("valid date");
        let day = |d: Option<NaiveDate>| d.map(|d| d.day());

        assert_eq!(day(clamped_day(first(2024, 2), 31)), Some(29));
        assert_eq!(day(clamped_day(first(2000, 2), 30)), Some(29));
        assert_eq!(day(clamped_day(first(1900, 2), 29)), Some(28));
        assert_eq!(day(clamped_day(first(2023, 4), 31)), Some(30));
        assert_eq!(day(clamped_day(first(2023, 12), 31)), Some(31));
        assert_eq!(day(clamped_day(first(2023, 6), 15)), Some(15));
    }
}
