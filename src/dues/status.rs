use chrono::NaiveDate;

use crate::errors::{DuesError, Result};
use crate::types::DueStatus;

/// recompute a due's status as of a date.
///
/// Pure function: the caller applies the result and decides whether a
/// transition happened. Paid and cancelled dues never change; an overdue
/// due whose due date was pushed back into the future drops back to due.
pub fn evaluate_status(status: DueStatus, due_date: NaiveDate, as_of: NaiveDate) -> DueStatus {
    match status {
        DueStatus::Due if as_of > due_date => DueStatus::Overdue,
        DueStatus::Overdue if as_of <= due_date => DueStatus::Due,
        other => other,
    }
}

/// guard for explicit transitions. Terminal states accept none.
pub fn check_transition(from: DueStatus, to: DueStatus) -> Result<()> {
    use DueStatus::*;

    match (from, to) {
        (a, b) if a == b => Ok(()),
        (Paid, _) | (Cancelled, _) => Err(DuesError::InvalidStatusTransition { from, to }),
        (Due, Overdue) | (Overdue, Due) => Ok(()),
        (Due, Paid) | (Overdue, Paid) => Ok(()),
        (Due, Cancelled) | (Overdue, Cancelled) => Ok(()),
        _ => Err(DuesError::InvalidStatusTransition { from, to }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_due_becomes_overdue_after_due_date() {
        let due_date = date(2024, 1, 10);

        // strictly after, not on the day itself
        assert_eq!(evaluate_status(DueStatus::Due, due_date, date(2024, 1, 10)), DueStatus::Due);
        assert_eq!(
            evaluate_status(DueStatus::Due, due_date, date(2024, 2, 1)),
            DueStatus::Overdue
        );
    }

    #[test]
    fn test_overdue_is_stable_under_reevaluation() {
        let due_date = date(2024, 1, 10);
        let first = evaluate_status(DueStatus::Due, due_date, date(2024, 2, 1));
        let second = evaluate_status(first, due_date, date(2024, 2, 2));
        assert_eq!(second, DueStatus::Overdue);
    }

    #[test]
    fn test_overdue_reverses_when_due_date_moves_forward() {
        let new_due_date = date(2024, 3, 10);
        assert_eq!(
            evaluate_status(DueStatus::Overdue, new_due_date, date(2024, 2, 1)),
            DueStatus::Due
        );
    }

    #[test]
    fn test_terminal_statuses_never_move() {
        let due_date = date(2024, 1, 10);
        let late = date(2024, 6, 1);

        assert_eq!(evaluate_status(DueStatus::Paid, due_date, late), DueStatus::Paid);
        assert_eq!(
            evaluate_status(DueStatus::Cancelled, due_date, late),
            DueStatus::Cancelled
        );
    }

    #[test]
    fn test_transition_guard() {
        use DueStatus::*;

        assert!(check_transition(Due, Paid).is_ok());
        assert!(check_transition(Overdue, Paid).is_ok());
        assert!(check_transition(Due, Cancelled).is_ok());
        assert!(check_transition(Overdue, Cancelled).is_ok());
        assert!(check_transition(Overdue, Due).is_ok());

        assert!(check_transition(Paid, Due).is_err());
        assert!(check_transition(Paid, Cancelled).is_err());
        assert!(check_transition(Cancelled, Due).is_err());
        assert!(check_transition(Cancelled, Paid).is_err());
    }
}
