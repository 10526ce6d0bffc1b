//! Per-question survey analytics

use super::validation::is_blank;
use safewatch_common::types::{round2, QuestionId};
use safewatch_storage::models::{QuestionType, SurveyQuestion, SurveyResponse};
use serde::Serialize;
use serde_json::Value;

/// How many free-text answers to show per question
pub const TEXT_SAMPLE_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyAnalytics {
    pub total_responses: i64,
    pub questions: Vec<QuestionAnalytics>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionAnalytics {
    pub question_id: QuestionId,
    pub question_text: String,
    pub question_type: String,
    pub answered: i64,
    /// Percentage of responses that answered this question
    pub completion_rate: f64,
    pub summary: AnswerSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionCount {
    pub option: String,
    pub count: i64,
}

/// Aggregate shape depends on the question type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerSummary {
    Choice {
        options: Vec<OptionCount>,
    },
    Numeric {
        count: i64,
        average: Option<f64>,
        min: Option<f64>,
        max: Option<f64>,
    },
    Text {
        count: i64,
        samples: Vec<String>,
    },
}

/// Aggregate responses per question.
///
/// Responses are expected newest first; text samples keep that order.
pub fn analyze_responses(
    questions: &[SurveyQuestion],
    responses: &[SurveyResponse],
) -> SurveyAnalytics {
    let total = responses.len() as i64;

    let questions = questions
        .iter()
        .map(|question| {
            let key = question.id.to_string();
            let answers: Vec<&Value> = responses
                .iter()
                .filter_map(|r| r.answers.get(&key))
                .filter(|v| !is_blank(v))
                .collect();
            let answered = answers.len() as i64;

            let completion_rate = if total == 0 {
                0.0
            } else {
                round2(answered as f64 / total as f64 * 100.0)
            };

            QuestionAnalytics {
                question_id: question.id,
                question_text: question.question_text.clone(),
                question_type: question.question_type.clone(),
                answered,
                completion_rate,
                summary: summarize(question, &answers),
            }
        })
        .collect();

    SurveyAnalytics {
        total_responses: total,
        questions,
    }
}

fn summarize(question: &SurveyQuestion, answers: &[&Value]) -> AnswerSummary {
    match question.type_enum() {
        Some(QuestionType::SingleChoice) | Some(QuestionType::MultipleChoice) => {
            let mut counts = option_counts(question.options_vec());
            for answer in answers {
                match answer {
                    Value::Array(items) => {
                        for item in items.iter().filter_map(Value::as_str) {
                            bump(&mut counts, item);
                        }
                    }
                    Value::String(s) => bump(&mut counts, s),
                    _ => {}
                }
            }
            AnswerSummary::Choice { options: counts }
        }
        Some(QuestionType::YesNo) => {
            let mut counts = option_counts(vec!["yes".to_string(), "no".to_string()]);
            for answer in answers {
                let label = match answer {
                    Value::Bool(true) => "yes",
                    Value::Bool(false) => "no",
                    Value::String(s) if s.eq_ignore_ascii_case("yes") => "yes",
                    Value::String(s) if s.eq_ignore_ascii_case("no") => "no",
                    _ => continue,
                };
                bump(&mut counts, label);
            }
            AnswerSummary::Choice { options: counts }
        }
        Some(QuestionType::Rating) | Some(QuestionType::Number) => {
            let values: Vec<f64> = answers.iter().filter_map(|a| as_number(a)).collect();
            let count = values.len() as i64;
            let average = (!values.is_empty())
                .then(|| round2(values.iter().sum::<f64>() / values.len() as f64));
            let min = values.iter().copied().reduce(f64::min);
            let max = values.iter().copied().reduce(f64::max);
            AnswerSummary::Numeric {
                count,
                average,
                min,
                max,
            }
        }
        _ => {
            let texts: Vec<String> = answers
                .iter()
                .filter_map(|a| a.as_str())
                .map(|s| s.to_string())
                .collect();
            AnswerSummary::Text {
                count: texts.len() as i64,
                samples: texts.into_iter().take(TEXT_SAMPLE_LIMIT).collect(),
            }
        }
    }
}

fn option_counts(options: Vec<String>) -> Vec<OptionCount> {
    options
        .into_iter()
        .map(|option| OptionCount { option, count: 0 })
        .collect()
}

/// Count an answer; values outside the current option list get their own row
fn bump(counts: &mut Vec<OptionCount>, label: &str) {
    match counts.iter_mut().find(|c| c.option == label) {
        Some(entry) => entry.count += 1,
        None => counts.push(OptionCount {
            option: label.to_string(),
            count: 1,
        }),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
