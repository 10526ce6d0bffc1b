//! Repository layer for data access

pub mod campaigns;
pub mod contacts;
pub mod dashboard;
pub mod notifications;
pub mod segments;
pub mod sms_alerts;
pub mod surveys;
pub mod users;

pub use campaigns::CampaignRepository;
pub use contacts::{ContactRepository, ImportRow, ImportSkip};
pub use dashboard::{
    ActivityItem, CampaignPerformance, DashboardOverview, DashboardRepository, OverviewCounts,
    StatusCount, UpcomingItems,
};
pub use notifications::NotificationRepository;
pub use segments::SegmentRepository;
pub use surveys::SurveyRepository;
pub use users::UserRepository;

pub use sms_alerts::DbSmsAlertRepository as SmsAlertRepository;
pub use sms_alerts::{
    AlertBreakdown, AlertTotals, SmsAlertDetail, SmsAlertStore, SENDABLE_STATUSES,
};

/// Turn a free-text search term into an `ILIKE` pattern, ignoring blanks
pub(crate) fn like_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s))
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern(Some(" flood ")), Some("%flood%".to_string()));
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(None), None);
    }
}
