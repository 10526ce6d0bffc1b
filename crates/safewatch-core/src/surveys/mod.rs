//! Survey submissions and analytics

mod analytics;
mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use analytics::{
    analyze_responses, AnswerSummary, OptionCount, QuestionAnalytics, SurveyAnalytics,
    TEXT_SAMPLE_LIMIT,
};
pub use validation::{
    check_accepting, validate_question, validate_submission, Submission, RATING_RANGE,
};
