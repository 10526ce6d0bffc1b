//! API request handlers, one module per resource

pub mod audience;
pub mod auth;
pub mod campaigns;
pub mod dashboard;
pub mod health;
pub mod sms_alerts;
pub mod surveys;
pub mod users;
