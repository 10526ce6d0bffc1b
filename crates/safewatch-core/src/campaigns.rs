//! Campaign rules: status transitions and field checks

use chrono::NaiveDate;
use safewatch_common::{Error, Result};
use safewatch_storage::models::CampaignStatus;

/// Statuses a campaign may move to from `from`.
///
/// `completed`, `cancelled` and `archived` are terminal; `archived` is only
/// reached through a soft delete.
pub fn allowed_transitions(from: CampaignStatus) -> &'static [CampaignStatus] {
    use CampaignStatus::*;

    match from {
        Draft => &[Planning, Active, Cancelled],
        Planning => &[Active, Cancelled],
        Active => &[Paused, Completed, Cancelled],
        Paused => &[Active, Cancelled],
        Completed | Cancelled | Archived => &[],
    }
}

pub fn can_transition(from: CampaignStatus, to: CampaignStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Reject a status change the transition table does not allow
pub fn check_transition(from: CampaignStatus, to: CampaignStatus) -> Result<()> {
    if can_transition(from, to) {
        return Ok(());
    }

    let allowed = allowed_transitions(from);
    if allowed.is_empty() {
        return Err(Error::invalid_state(format!(
            "Campaign is {} and can no longer change status",
            from
        )));
    }

    let names: Vec<&str> = allowed.iter().map(|s| s.as_str()).collect();
    Err(Error::invalid_state(format!(
        "Cannot change campaign status from {} to {} (allowed: {})",
        from,
        to,
        names.join(", ")
    )))
}

/// End date may not precede the start date
pub fn check_dates(start: NaiveDate, end: Option<NaiveDate>) -> Result<()> {
    match end {
        Some(end) if end < start => Err(Error::validation(
            "End date must be on or after the start date",
        )),
        _ => Ok(()),
    }
}

pub fn check_budget(budget: Option<f64>) -> Result<()> {
    match budget {
        Some(b) if !b.is_finite() || b < 0.0 => {
            Err(Error::validation("Budget must be a non-negative number"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CampaignStatus::*;

    #[test]
    fn test_transition_table() {
        assert!(can_transition(Draft, Planning));
        assert!(can_transition(Draft, Active));
        assert!(can_transition(Draft, Cancelled));
        assert!(!can_transition(Draft, Completed));
        assert!(!can_transition(Draft, Paused));

        assert!(can_transition(Planning, Active));
        assert!(!can_transition(Planning, Draft));

        assert!(can_transition(Active, Paused));
        assert!(can_transition(Active, Completed));
        assert!(can_transition(Paused, Active));
        assert!(!can_transition(Paused, Completed));

        for terminal in [Completed, Cancelled, Archived] {
            for to in CampaignStatus::ALL {
                assert!(!can_transition(terminal, *to));
            }
        }
    }

    #[test]
    fn test_transition_error_lists_allowed_targets() {
        let err = check_transition(Planning, Completed).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
        assert_eq!(
            err.to_string(),
            "Cannot change campaign status from planning to completed (allowed: active, cancelled)"
        );

        let err = check_transition(Completed, Active).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Campaign is completed and can no longer change status"
        );
    }

    #[test]
    fn test_dates_and_budget() {
        let start = NaiveDate::from_ymd_opt(2030, 3, 1).unwrap();
        assert!(check_dates(start, None).is_ok());
        assert!(check_dates(start, Some(start)).is_ok());
        assert!(check_dates(start, NaiveDate::from_ymd_opt(2030, 2, 28)).is_err());

        assert!(check_budget(None).is_ok());
        assert!(check_budget(Some(0.0)).is_ok());
        assert!(check_budget(Some(-1.0)).is_err());
        assert!(check_budget(Some(f64::NAN)).is_err());
    }
}
