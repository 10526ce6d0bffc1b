//! Delete policy: records that other data still points at are retired
//! (deactivated or archived) instead of removed.

/// A record about to be deleted, with what still references it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    User { authored_records: bool },
    Campaign { alerts: i64, surveys: i64 },
    Contact { in_segment: bool },
    Segment { referenced_by_alerts: bool },
    Survey { responses: i64 },
}

/// What a delete request turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePlan {
    /// Keep the row and move it to `status`
    Retire {
        status: &'static str,
        message: &'static str,
    },
    /// Remove the row and anything it owns
    Remove { message: &'static str },
}

impl DeletePlan {
    pub fn message(&self) -> &'static str {
        match self {
            DeletePlan::Retire { message, .. } | DeletePlan::Remove { message } => message,
        }
    }
}

pub fn plan_delete(target: DeleteTarget) -> DeletePlan {
    use DeleteTarget::*;

    match target {
        User {
            authored_records: true,
        } => DeletePlan::Retire {
            status: "inactive",
            message: "User deactivated (has authored records)",
        },
        User { .. } => DeletePlan::Remove {
            message: "User deleted",
        },
        Campaign { alerts, surveys } if alerts > 0 || surveys > 0 => DeletePlan::Retire {
            status: "archived",
            message: "Campaign archived (has related alerts or surveys)",
        },
        Campaign { .. } => DeletePlan::Remove {
            message: "Campaign deleted",
        },
        Contact { in_segment: true } => DeletePlan::Retire {
            status: "inactive",
            message: "Contact deactivated (belongs to a segment)",
        },
        Contact { .. } => DeletePlan::Remove {
            message: "Contact deleted",
        },
        Segment {
            referenced_by_alerts: true,
        } => DeletePlan::Retire {
            status: "archived",
            message: "Segment archived (referenced by SMS alerts)",
        },
        Segment { .. } => DeletePlan::Remove {
            message: "Segment deleted",
        },
        Survey { responses } if responses > 0 => DeletePlan::Retire {
            status: "archived",
            message: "Survey archived (has responses)",
        },
        Survey { .. } => DeletePlan::Remove {
            message: "Survey deleted",
        },
    }
}
