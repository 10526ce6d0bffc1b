//! Database models

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use safewatch_common::types::{
    AlertId, CampaignId, ContactId, NotificationId, QuestionId, SegmentId, SurveyId, UserId,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Declares a string-backed enum stored in a TEXT column.
///
/// Generates `as_str`, `ALL`, `Display` and `FromStr` (with a
/// `"Invalid <label>: <value>"` error) so the text form is defined once.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", $label, s)),
                }
            }
        }
    };
}

// ============================================================================
// Users
// ============================================================================

text_enum! {
    /// User account status
    UserStatus, "user status" {
        Active => "active",
        Inactive => "inactive",
    }
}

/// User model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub phone: Option<String>,
    pub status: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active.as_str()
    }
}

/// Role model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub description: String,
}

/// Create user input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub phone: Option<String>,
}

/// Update user input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub status: Option<UserStatus>,
}

/// User list filter
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<String>,
    pub status: Option<UserStatus>,
}

// ============================================================================
// Campaigns
// ============================================================================

text_enum! {
    /// Campaign status
    CampaignStatus, "campaign status" {
        Draft => "draft",
        Planning => "planning",
        Active => "active",
        Paused => "paused",
        Completed => "completed",
        Cancelled => "cancelled",
        Archived => "archived",
    }
}

text_enum! {
    /// Campaign category
    CampaignCategory, "campaign category" {
        Awareness => "awareness",
        EmergencyPreparedness => "emergency_preparedness",
        CommunitySafety => "community_safety",
        Health => "health",
        CrimePrevention => "crime_prevention",
        DisasterResponse => "disaster_response",
        Other => "other",
    }
}

text_enum! {
    /// Priority shared by campaigns and alerts
    Priority, "priority" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

text_enum! {
    /// Campaign objective progress
    ObjectiveStatus, "objective status" {
        Pending => "pending",
        InProgress => "in_progress",
        Achieved => "achieved",
    }
}

text_enum! {
    /// Campaign milestone progress
    MilestoneStatus, "milestone status" {
        Pending => "pending",
        Completed => "completed",
    }
}

text_enum! {
    /// Role of a user on a campaign
    CollaboratorRole, "collaborator role" {
        Owner => "owner",
        Editor => "editor",
        Viewer => "viewer",
    }
}

/// Campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub status: String,
    pub priority: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub target_audience: Option<String>,
    pub region: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }
}

/// Create campaign input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub name: String,
    pub description: Option<String>,
    pub category: CampaignCategory,
    pub priority: Option<Priority>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub target_audience: Option<String>,
    pub region: Option<String>,
    pub created_by: Option<UserId>,
}

/// Update campaign input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCampaign {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<CampaignCategory>,
    pub priority: Option<Priority>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<f64>,
    pub target_audience: Option<String>,
    pub region: Option<String>,
}

/// Campaign list filter
#[derive(Debug, Clone, Default)]
pub struct CampaignFilter {
    pub status: Option<CampaignStatus>,
    pub category: Option<CampaignCategory>,
    pub priority: Option<Priority>,
    pub search: Option<String>,
}

/// Campaign objective model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignObjective {
    pub id: uuid::Uuid,
    pub campaign_id: CampaignId,
    pub title: String,
    pub description: Option<String>,
    pub target_value: Option<f64>,
    pub current_value: f64,
    pub unit: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create objective input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateObjective {
    pub campaign_id: CampaignId,
    pub title: String,
    pub description: Option<String>,
    pub target_value: Option<f64>,
    pub unit: Option<String>,
}

/// Update objective input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateObjective {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_value: Option<f64>,
    pub current_value: Option<f64>,
    pub unit: Option<String>,
    pub status: Option<ObjectiveStatus>,
}

/// Campaign milestone model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignMilestone {
    pub id: uuid::Uuid,
    pub campaign_id: CampaignId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create milestone input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMilestone {
    pub campaign_id: CampaignId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: NaiveDate,
}

/// Campaign collaborator joined with the user's names
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Collaborator {
    pub campaign_id: CampaignId,
    pub user_id: UserId,
    pub username: String,
    pub full_name: String,
    pub role: String,
    pub added_at: DateTime<Utc>,
}

/// Campaign event model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignEvent {
    pub id: uuid::Uuid,
    pub campaign_id: CampaignId,
    pub title: String,
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create event input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEvent {
    pub campaign_id: CampaignId,
    pub title: String,
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    pub location: Option<String>,
}

// ============================================================================
// Contacts & Segments
// ============================================================================

text_enum! {
    /// Contact status; only `active` contacts receive alerts
    ContactStatus, "contact status" {
        Active => "active",
        Inactive => "inactive",
        Unsubscribed => "unsubscribed",
    }
}

text_enum! {
    /// Segment status
    SegmentStatus, "segment status" {
        Active => "active",
        Archived => "archived",
    }
}

/// Contact model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub age_group: Option<String>,
    pub language: Option<String>,
    pub tags: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create contact input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateContact {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub age_group: Option<String>,
    pub language: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ContactStatus>,
}

/// Update contact input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub age_group: Option<String>,
    pub language: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ContactStatus>,
}

/// Contact list filter
#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pub search: Option<String>,
    pub status: Option<ContactStatus>,
    pub region: Option<String>,
    pub segment_id: Option<SegmentId>,
}

/// Segment model with its member count
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub name: String,
    pub description: Option<String>,
    pub criteria: serde_json::Value,
    pub status: String,
    pub created_by: Option<UserId>,
    pub contact_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create segment input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSegment {
    pub name: String,
    pub description: Option<String>,
    pub criteria: Option<serde_json::Value>,
    pub created_by: Option<UserId>,
}

/// Update segment input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSegment {
    pub name: Option<String>,
    pub description: Option<String>,
    pub criteria: Option<serde_json::Value>,
    pub status: Option<SegmentStatus>,
}

/// Segment list filter
#[derive(Debug, Clone, Default)]
pub struct SegmentFilter {
    pub search: Option<String>,
    pub status: Option<SegmentStatus>,
}

// ============================================================================
// Surveys
// ============================================================================

text_enum! {
    /// Survey status; responses are accepted only while `active`
    SurveyStatus, "survey status" {
        Draft => "draft",
        Active => "active",
        Closed => "closed",
        Archived => "archived",
    }
}

text_enum! {
    /// Survey question type
    QuestionType, "question type" {
        Text => "text",
        Textarea => "textarea",
        SingleChoice => "single_choice",
        MultipleChoice => "multiple_choice",
        Rating => "rating",
        YesNo => "yes_no",
        Number => "number",
    }
}

impl QuestionType {
    /// Choice questions carry an options list
    pub fn has_options(&self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultipleChoice)
    }
}

/// Survey model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub title: String,
    pub description: Option<String>,
    pub campaign_id: Option<CampaignId>,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_anonymous: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Survey {
    /// Get status enum
    pub fn status_enum(&self) -> Option<SurveyStatus> {
        self.status.parse().ok()
    }
}

/// Create survey input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSurvey {
    pub title: String,
    pub description: Option<String>,
    pub campaign_id: Option<CampaignId>,
    pub status: Option<SurveyStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_anonymous: Option<bool>,
    pub created_by: Option<UserId>,
}

/// Update survey input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSurvey {
    pub title: Option<String>,
    pub description: Option<String>,
    pub campaign_id: Option<CampaignId>,
    pub status: Option<SurveyStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_anonymous: Option<bool>,
}

/// Survey list filter
#[derive(Debug, Clone, Default)]
pub struct SurveyFilter {
    pub status: Option<SurveyStatus>,
    pub campaign_id: Option<CampaignId>,
    pub search: Option<String>,
}

/// Survey question model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub id: QuestionId,
    pub survey_id: SurveyId,
    pub question_text: String,
    pub question_type: String,
    pub options: serde_json::Value,
    pub is_required: bool,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
}

impl SurveyQuestion {
    /// Get question type enum
    pub fn type_enum(&self) -> Option<QuestionType> {
        self.question_type.parse().ok()
    }

    /// Get options as strings
    pub fn options_vec(&self) -> Vec<String> {
        serde_json::from_value(self.options.clone()).unwrap_or_default()
    }
}

/// Create question input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuestion {
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub is_required: bool,
    pub order_index: Option<i32>,
}

/// Survey response model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: uuid::Uuid,
    pub survey_id: SurveyId,
    pub contact_id: Option<ContactId>,
    pub answers: serde_json::Value,
    pub submitted_at: DateTime<Utc>,
}

// ============================================================================
// SMS Alerts
// ============================================================================

text_enum! {
    /// SMS alert category
    AlertType, "alert type" {
        Emergency => "emergency",
        Warning => "warning",
        Advisory => "advisory",
        Information => "information",
        Reminder => "reminder",
    }
}

text_enum! {
    /// SMS alert lifecycle status
    AlertStatus, "alert status" {
        Draft => "draft",
        Scheduled => "scheduled",
        Sending => "sending",
        Sent => "sent",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Outcome of a single message
    DeliveryStatus, "delivery status" {
        Delivered => "delivered",
        Failed => "failed",
    }
}

/// SMS alert model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SmsAlert {
    pub id: AlertId,
    pub title: String,
    pub message: String,
    pub alert_type: String,
    pub priority: String,
    pub audience_segment_id: Option<SegmentId>,
    pub campaign_id: Option<CampaignId>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub status: String,
    pub sent_count: i32,
    pub delivered_count: i32,
    pub failed_count: i32,
    pub delivery_rate: f64,
    pub cost_per_message: f64,
    pub total_cost: f64,
    pub delivery_report: serde_json::Value,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SmsAlert {
    /// Get status enum
    pub fn status_enum(&self) -> Option<AlertStatus> {
        self.status.parse().ok()
    }

    /// Scheduled date and time combined, read as UTC
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        match (self.scheduled_date, self.scheduled_time) {
            (Some(date), Some(time)) => Some(date.and_time(time).and_utc()),
            _ => None,
        }
    }

    /// Get the delivery report entries
    pub fn delivery_entries(&self) -> Vec<DeliveryReportEntry> {
        serde_json::from_value(self.delivery_report.clone()).unwrap_or_default()
    }
}

/// Create SMS alert input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSmsAlert {
    pub title: String,
    pub message: String,
    pub alert_type: AlertType,
    pub priority: Priority,
    pub audience_segment_id: Option<SegmentId>,
    pub campaign_id: Option<CampaignId>,
    pub cost_per_message: f64,
    pub created_by: Option<UserId>,
}

/// Update SMS alert input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSmsAlert {
    pub title: Option<String>,
    pub message: Option<String>,
    pub alert_type: Option<AlertType>,
    pub priority: Option<Priority>,
    pub audience_segment_id: Option<SegmentId>,
    pub campaign_id: Option<CampaignId>,
}

/// SMS alert list filter
#[derive(Debug, Clone, Default)]
pub struct SmsAlertFilter {
    pub status: Option<AlertStatus>,
    pub alert_type: Option<AlertType>,
    pub priority: Option<Priority>,
    pub campaign_id: Option<CampaignId>,
    pub search: Option<String>,
}

/// Contact eligible to receive an alert
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AlertRecipient {
    pub contact_id: ContactId,
    pub first_name: String,
    pub phone: String,
}

/// One line of an alert's delivery report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReportEntry {
    pub contact_id: ContactId,
    pub phone: String,
    pub status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final outcome of a send, written in one update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub status: AlertStatus,
    pub sent_count: i32,
    pub delivered_count: i32,
    pub failed_count: i32,
    pub delivery_rate: f64,
    pub total_cost: f64,
    pub report: Vec<DeliveryReportEntry>,
    pub sent_at: DateTime<Utc>,
}

// ============================================================================
// Notifications
// ============================================================================

/// Notification model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub related_alert_id: Option<AlertId>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Create notification input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub related_alert_id: Option<AlertId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_enum_round_trip_through_strings() {
        assert_eq!("single_choice".parse::<QuestionType>(), Ok(QuestionType::SingleChoice));
        assert_eq!(AlertStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(
            "urgent".parse::<AlertType>(),
            Err("Invalid alert type: urgent".to_string())
        );
        assert_eq!(AlertStatus::ALL.len(), 6);
    }

    #[test]
    fn test_text_enum_serde_uses_column_text() {
        let json = serde_json::to_string(&CampaignCategory::EmergencyPreparedness).unwrap();
        assert_eq!(json, "\"emergency_preparedness\"");
        let parsed: ObjectiveStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(parsed, ObjectiveStatus::InProgress);
    }

    #[test]
    fn test_alert_scheduled_at_combines_date_and_time() {
        let alert = sample_alert();
        assert_eq!(
            alert.scheduled_at(),
            Some(Utc.with_ymd_and_hms(2030, 5, 1, 14, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_delivery_report_entries_parse() {
        let mut alert = sample_alert();
        alert.delivery_report = serde_json::json!([
            {
                "contact_id": "00000000-0000-0000-0000-000000000001",
                "phone": "+15550100",
                "status": "failed",
                "timestamp": "2030-05-01T14:30:00Z",
                "error": "Carrier rejected message"
            }
        ]);

        let entries = alert.delivery_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, DeliveryStatus::Failed);
        assert_eq!(entries[0].error.as_deref(), Some("Carrier rejected message"));
    }

    #[test]
    fn test_user_password_hash_is_not_serialized() {
        let user = User {
            id: uuid::Uuid::nil(),
            username: "ops".into(),
            email: "ops@city.gov".into(),
            password_hash: "$argon2id$secret".into(),
            full_name: "Ops".into(),
            role: "admin".into(),
            phone: None,
            status: "active".into(),
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(user.is_active());
    }

    fn sample_alert() -> SmsAlert {
        SmsAlert {
            id: uuid::Uuid::nil(),
            title: "Flood warning".into(),
            message: "River levels rising".into(),
            alert_type: "warning".into(),
            priority: "high".into(),
            audience_segment_id: None,
            campaign_id: None,
            scheduled_date: NaiveDate::from_ymd_opt(2030, 5, 1),
            scheduled_time: NaiveTime::from_hms_opt(14, 30, 0),
            status: "scheduled".into(),
            sent_count: 0,
            delivered_count: 0,
            failed_count: 0,
            delivery_rate: 0.0,
            cost_per_message: 0.05,
            total_cost: 0.0,
            delivery_report: serde_json::json!([]),
            sent_at: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
