//! Survey response validation

use chrono::NaiveDate;
use safewatch_common::types::ContactId;
use safewatch_common::{Error, Result};
use safewatch_storage::models::{CreateQuestion, QuestionType, Survey, SurveyQuestion, SurveyStatus};
use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

/// Lowest and highest accepted rating
pub const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

/// A response ready to store: answers normalized, contact dropped for anonymous surveys
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub contact_id: Option<ContactId>,
    pub answers: Value,
}

/// Treat null, blank strings and empty lists as "not answered"
pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Validate a question definition; non-choice types carry no options
pub fn validate_question(mut question: CreateQuestion) -> Result<CreateQuestion> {
    question.question_text = question.question_text.trim().to_string();
    if question.question_text.is_empty() {
        return Err(Error::validation("Question text is required"));
    }

    if question.question_type.has_options() {
        let mut seen = HashSet::new();
        question.options = question
            .options
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty() && seen.insert(o.clone()))
            .collect();
        if question.options.is_empty() {
            return Err(Error::validation(format!(
                "Question '{}' needs at least one option",
                question.question_text
            )));
        }
    } else {
        question.options.clear();
    }

    Ok(question)
}

/// Check the survey accepts responses on `today`
pub fn check_accepting(survey: &Survey, today: NaiveDate) -> Result<()> {
    if survey.status_enum() != Some(SurveyStatus::Active) {
        return Err(Error::invalid_state("Survey is not accepting responses"));
    }
    if survey.start_date.is_some_and(|start| today < start) {
        return Err(Error::validation("Survey has not started yet"));
    }
    if survey.end_date.is_some_and(|end| today > end) {
        return Err(Error::validation("Survey has ended"));
    }
    Ok(())
}

/// Validate a submission against the survey's questions and normalize each answer
pub fn validate_submission(
    survey: &Survey,
    questions: &[SurveyQuestion],
    contact_id: Option<ContactId>,
    answers: &Value,
    today: NaiveDate,
) -> Result<Submission> {
    check_accepting(survey, today)?;

    let answers = answers
        .as_object()
        .ok_or_else(|| Error::validation("Answers must be an object keyed by question id"))?;

    for key in answers.keys() {
        let known = Uuid::parse_str(key)
            .map(|id| questions.iter().any(|q| q.id == id))
            .unwrap_or(false);
        if !known {
            return Err(Error::validation(format!("Unknown question: {}", key)));
        }
    }

    let mut normalized = Map::new();
    for question in questions {
        let key = question.id.to_string();
        match answers.get(&key) {
            Some(value) if !is_blank(value) => {
                normalized.insert(key, normalize_answer(question, value)?);
            }
            _ if question.is_required => {
                return Err(Error::validation(format!(
                    "Question '{}' is required",
                    question.question_text
                )));
            }
            _ => {}
        }
    }

    Ok(Submission {
        contact_id: if survey.is_anonymous { None } else { contact_id },
        answers: Value::Object(normalized),
    })
}

fn normalize_answer(question: &SurveyQuestion, value: &Value) -> Result<Value> {
    let invalid = |expected: &str| {
        Error::validation(format!(
            "Answer to '{}' must be {}",
            question.question_text, expected
        ))
    };

    let question_type = question
        .type_enum()
        .ok_or_else(|| Error::Internal(format!("Unknown question type: {}", question.question_type)))?;

    match question_type {
        QuestionType::Text | QuestionType::Textarea => match value {
            Value::String(s) => Ok(Value::String(s.trim().to_string())),
            _ => Err(invalid("text")),
        },
        QuestionType::SingleChoice => {
            let options = question.options_vec();
            match value.as_str() {
                Some(choice) if options.iter().any(|o| o == choice) => Ok(value.clone()),
                _ => Err(invalid("one of the listed options")),
            }
        }
        QuestionType::MultipleChoice => {
            let options = question.options_vec();
            let choices: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                Value::String(_) => vec![value],
                _ => return Err(invalid("a list of the listed options")),
            };
            let mut picked: Vec<Value> = Vec::with_capacity(choices.len());
            for choice in choices {
                match choice.as_str() {
                    Some(c) if options.iter().any(|o| o == c) => {
                        if !picked.contains(choice) {
                            picked.push(choice.clone());
                        }
                    }
                    _ => return Err(invalid("a list of the listed options")),
                }
            }
            Ok(Value::Array(picked))
        }
        QuestionType::Rating => {
            let rating = match value {
                Value::Number(n) => n.as_i64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                }),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            match rating {
                Some(r) if RATING_RANGE.contains(&r) => Ok(Value::from(r)),
                _ => Err(invalid("a whole number from 1 to 5")),
            }
        }
        QuestionType::Number => {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
                _ => None,
            };
            number
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid("a number"))
        }
        QuestionType::YesNo => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) if s.trim().eq_ignore_ascii_case("yes") => Ok(Value::Bool(true)),
            Value::String(s) if s.trim().eq_ignore_ascii_case("no") => Ok(Value::Bool(false)),
            _ => Err(invalid("yes or no")),
        },
    }
}
