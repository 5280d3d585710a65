//! Fine accrual engine
//!
//! Pure calendar-day penalty arithmetic. Nothing here touches the database:
//! callers persist the results. Day boundaries, not wall-clock hours, decide
//! lateness, so a book returned at 23:59 on its due date costs nothing and
//! one returned at 00:01 the next day costs a full day.

use chrono::{DateTime, Utc};

use crate::models::loan::{FineSummary, Loan};
use crate::models::user::User;

/// Whole calendar days late. Zero when the reference date is on or before
/// the expected return date.
pub fn days_late(expected_return: DateTime<Utc>, reference: DateTime<Utc>) -> i64 {
    (reference.date_naive() - expected_return.date_naive())
        .num_days()
        .max(0)
}

/// Penalty owed at `reference` for a loan due `expected_return`.
/// For running loans the reference is now; for settled loans it is the
/// recorded actual return date.
pub fn penalty(expected_return: DateTime<Utc>, reference: DateTime<Utc>, per_day: i64) -> i64 {
    days_late(expected_return, reference) * per_day
}

/// Live fine of a loan still out with the borrower: accrual to `now` plus
/// any pending manual penalty layered on by an admin.
pub fn running_fine(loan: &Loan, now: DateTime<Utc>, per_day: i64) -> i64 {
    penalty(loan.expected_return_date, now, per_day) + loan.pending_fine
}

/// The borrower-facing fine summary: settled-but-unpaid fines from the
/// ledger plus live recomputation over every loan still out. Loans waiting
/// for return verification keep accruing until the admin decides.
pub fn summarize(user: &User, out_loans: &[Loan], now: DateTime<Utc>, per_day: i64) -> FineSummary {
    let running: i64 = out_loans
        .iter()
        .filter(|l| l.status.is_out())
        .map(|l| running_fine(l, now, per_day))
        .sum();

    FineSummary {
        user_id: user.id,
        unpaid_fines: user.unpaid_fines,
        running_fines: running,
        total_due: user.unpaid_fines + running,
        lifetime_fines: user.lifetime_fines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PER_DAY: i64 = 1000;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn on_time_return_costs_nothing_any_hour() {
        let due = at(2024, 3, 10, 9, 0);
        assert_eq!(penalty(due, at(2024, 3, 10, 23, 59), PER_DAY), 0);
        assert_eq!(penalty(due, at(2024, 3, 10, 0, 1), PER_DAY), 0);
    }

    #[test]
    fn early_return_never_goes_negative() {
        let due = at(2024, 3, 10, 9, 0);
        assert_eq!(penalty(due, at(2024, 3, 1, 12, 0), PER_DAY), 0);
        assert_eq!(days_late(due, at(2024, 2, 1, 0, 0)), 0);
    }

    #[test]
    fn three_days_late_is_three_days_regardless_of_hour() {
        let due = at(2024, 3, 10, 15, 30);
        // same time of day
        assert_eq!(penalty(due, at(2024, 3, 13, 15, 30), PER_DAY), 3 * PER_DAY);
        // earlier in the day than the due timestamp
        assert_eq!(penalty(due, at(2024, 3, 13, 0, 5), PER_DAY), 3 * PER_DAY);
        // late in the day
        assert_eq!(penalty(due, at(2024, 3, 13, 23, 59), PER_DAY), 3 * PER_DAY);
    }

    #[test]
    fn one_minute_past_midnight_is_a_full_day() {
        let due = at(2024, 3, 10, 23, 59);
        assert_eq!(penalty(due, at(2024, 3, 11, 0, 1), PER_DAY), PER_DAY);
    }

    #[test]
    fn penalty_is_idempotent() {
        let due = at(2024, 3, 10, 9, 0);
        let reference = at(2024, 3, 15, 9, 0);
        let first = penalty(due, reference, PER_DAY);
        let second = penalty(due, reference, PER_DAY);
        assert_eq!(first, second);
        assert_eq!(first, 5 * PER_DAY);
    }

    #[test]
    fn crosses_month_boundaries() {
        let due = at(2024, 1, 30, 12, 0);
        assert_eq!(days_late(due, at(2024, 2, 2, 8, 0)), 3);
    }
}
