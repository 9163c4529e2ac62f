//! Calendar quarters and OSS filing deadlines.
//!
//! An OSS return is due by the last day of the month following the end of
//! the quarter (Q1 → April 30, Q4 → January 31 of the next year).

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::core::ComplianceError;

/// Next filing deadline relative to a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    /// Quarter the deadline belongs to.
    pub quarter: u32,
    pub year: i32,
    pub deadline: NaiveDate,
    /// Whole days from `now` to the start of the deadline day.
    pub days_remaining: i64,
}

/// Quarter (1..=4) of a date.
pub fn quarter_of(date: NaiveDate) -> u32 {
    date.month0() / 3 + 1
}

/// "Q2 2025".
pub fn quarter_label(year: i32, quarter: u32) -> String {
    format!("Q{quarter} {year}")
}

/// First and last day of a quarter.
pub fn quarter_dates(year: i32, quarter: u32) -> Result<(NaiveDate, NaiveDate), ComplianceError> {
    if !(1..=4).contains(&quarter) {
        return Err(ComplianceError::InvalidQuarter(quarter));
    }
    let first = NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1)
        .ok_or(ComplianceError::InvalidQuarter(quarter))?;
    let last = last_day_of_month(first.checked_add_months(Months::new(2)))
        .ok_or(ComplianceError::InvalidQuarter(quarter))?;
    Ok((first, last))
}

/// Quarter bounds as timestamps: first day 00:00:00 to last day 23:59:59.
pub fn quarter_bounds(year: i32, quarter: u32) -> Result<(NaiveDateTime, NaiveDateTime), ComplianceError> {
    let (first, last) = quarter_dates(year, quarter)?;
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    Ok((first.and_time(NaiveTime::MIN), last.and_time(end_of_day)))
}

/// Filing deadline of the quarter containing `now`.
pub fn next_deadline(now: NaiveDateTime) -> Deadline {
    let today = now.date();
    deadline_at(now, today.year(), quarter_of(today))
}

/// Deadline of the return currently open for filing: the quarter that
/// ended most recently, due by the end of the current quarter's first month.
pub fn filing_deadline(now: NaiveDateTime) -> Deadline {
    let today = now.date();
    let (year, quarter) = match quarter_of(today) {
        1 => (today.year() - 1, 4),
        q => (today.year(), q - 1),
    };
    deadline_at(now, year, quarter)
}

/// Last day of the month after the quarter ends.
pub fn quarter_deadline(year: i32, quarter: u32) -> Result<NaiveDate, ComplianceError> {
    let (first, _) = quarter_dates(year, quarter)?;
    first
        .checked_add_months(Months::new(3))
        .and_then(|month| last_day_of_month(Some(month)))
        .ok_or(ComplianceError::InvalidQuarter(quarter))
}

fn deadline_at(now: NaiveDateTime, year: i32, quarter: u32) -> Deadline {
    let deadline = quarter_deadline(year, quarter).unwrap_or(now.date());
    Deadline {
        quarter,
        year,
        deadline,
        days_remaining: (deadline.and_time(NaiveTime::MIN) - now).num_days(),
    }
}

fn last_day_of_month(first: Option<NaiveDate>) -> Option<NaiveDate> {
    first?
        .with_day(1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn q2_2025_bounds() {
        let (start, end) = quarter_bounds(2025, 2).unwrap();
        assert_eq!(start, dt(2025, 4, 1, 0));
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap().and_hms_opt(23, 59, 59).unwrap());
    }

    #[test]
    fn q1_leap_year() {
        let (first, last) = quarter_dates(2024, 1).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
    }

    #[test]
    fn q4_ends_on_december_31() {
        let (_, last) = quarter_dates(2025, 4).unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn invalid_quarter() {
        assert!(matches!(quarter_bounds(2025, 0), Err(ComplianceError::InvalidQuarter(0))));
        assert!(matches!(quarter_bounds(2025, 5), Err(ComplianceError::InvalidQuarter(5))));
    }

    #[test]
    fn quarter_of_dates() {
        assert_eq!(quarter_of(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()), 1);
        assert_eq!(quarter_of(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()), 2);
        assert_eq!(quarter_of(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()), 4);
    }

    #[test]
    fn deadline_q2() {
        let d = next_deadline(dt(2025, 5, 15, 0));
        assert_eq!(d.quarter, 2);
        assert_eq!(d.deadline, NaiveDate::from_ymd_opt(2025, 7, 31).unwrap());
        assert_eq!(d.days_remaining, 77);
    }

    #[test]
    fn deadline_q4_rolls_into_next_year() {
        let d = next_deadline(dt(2025, 11, 20, 12));
        assert_eq!(d.quarter, 4);
        assert_eq!(d.year, 2025);
        assert_eq!(d.deadline, NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
    }

    #[test]
    fn days_remaining_truncates() {
        // Noon, 14.5 days before the Q2 deadline day starts.
        let d = filing_deadline(dt(2025, 7, 16, 12));
        assert_eq!(d.days_remaining, 14);
    }

    #[test]
    fn filing_deadline_is_previous_quarter() {
        let d = filing_deadline(dt(2025, 7, 17, 0));
        assert_eq!((d.year, d.quarter), (2025, 2));
        assert_eq!(d.days_remaining, 14);

        let d = filing_deadline(dt(2026, 1, 30, 0));
        assert_eq!((d.year, d.quarter), (2025, 4));
        assert_eq!(d.deadline, NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
        assert_eq!(d.days_remaining, 1);
    }

    #[test]
    fn label() {
        assert_eq!(quarter_label(2025, 2), "Q2 2025");
    }
}
