//! Survey fixtures for unit tests

use chrono::Utc;
use safewatch_storage::models::{QuestionType, Survey, SurveyQuestion, SurveyResponse};
use serde_json::Value;
use uuid::Uuid;

/// An active survey with no date window
pub fn survey(is_anonymous: bool) -> Survey {
    Survey {
        id: Uuid::new_v4(),
        title: "Flood preparedness check-in".to_string(),
        description: None,
        campaign_id: None,
        status: "active".to_string(),
        start_date: None,
        end_date: None,
        is_anonymous,
        created_by: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn question(question_type: QuestionType, options: &[&str], is_required: bool) -> SurveyQuestion {
    SurveyQuestion {
        id: Uuid::new_v4(),
        survey_id: Uuid::new_v4(),
        question_text: format!("{} question", question_type),
        question_type: question_type.to_string(),
        options: serde_json::json!(options),
        is_required,
        order_index: 0,
        created_at: Utc::now(),
    }
}

pub fn response(answers: Value) -> SurveyResponse {
    SurveyResponse {
        id: Uuid::new_v4(),
        survey_id: Uuid::new_v4(),
        contact_id: None,
        answers,
        submitted_at: Utc::now(),
    }
}
