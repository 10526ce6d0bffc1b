//! SafeWatch Core - Domain logic
//!
//! This crate holds the SMS alert lifecycle (validation, scheduling, the
//! per-contact delivery loop and the background dispatcher), the SMS gateway
//! abstraction, campaign status rules, survey answer validation and
//! analytics, contact and user validation, the delete policy, and password
//! hashing.

pub mod alerts;
pub mod audience;
pub mod campaigns;
pub mod deletion;
pub mod password;
pub mod surveys;
pub mod users;

pub use alerts::{
    AlertChanges, AlertDispatcher, AlertDraft, AlertError, AlertManager, DeliveryOutcome,
    HttpSmsGateway, SimulatedGateway, SmsGateway,
};
pub use surveys::{analyze_responses, validate_submission, SurveyAnalytics};
