//! Client-boundary validation.
//!
//! Answer payloads arrive untrusted, so the schema keyed by question kind
//! runs here before any store write: key count equals question count,
//! every key refers to a declared question, and each value matches its
//! question's kind (string, declared option, or integer rating 1-5).

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::{
    error::AppError,
    models::{Question, QuestionKind, Survey},
};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

pub fn validate_new_survey(title: &str, questions: &[Question]) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }
    if questions.is_empty() {
        return Err(AppError::Validation(
            "a survey needs at least one question".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for question in questions {
        if !seen.insert(question.id.as_str()) {
            return Err(AppError::Validation(format!(
                "duplicate question id '{}'",
                question.id
            )));
        }
        if question.prompt.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "question '{}' has an empty prompt",
                question.id
            )));
        }
        if question.kind == QuestionKind::MultipleChoice {
            if question.options.is_empty() {
                return Err(AppError::Validation(format!(
                    "multiple choice question '{}' has no options",
                    question.id
                )));
            }
            if question.options.iter().any(|o| o.trim().is_empty()) {
                return Err(AppError::Validation(format!(
                    "multiple choice question '{}' has an empty option",
                    question.id
                )));
            }
        }
    }
    Ok(())
}

pub fn validate_answers(
    survey: &Survey,
    answers: &HashMap<String, Value>,
) -> Result<(), AppError> {
    if answers.len() != survey.questions.len() {
        return Err(AppError::Validation(format!(
            "expected {} answers, got {}",
            survey.questions.len(),
            answers.len()
        )));
    }

    for question in &survey.questions {
        let answer = answers.get(&question.id).ok_or_else(|| {
            AppError::Validation(format!("missing answer for question '{}'", question.id))
        })?;
        validate_answer(question, answer)?;
    }
    Ok(())
}

fn validate_answer(question: &Question, answer: &Value) -> Result<(), AppError> {
    match question.kind {
        QuestionKind::ShortText => {
            if answer.as_str().is_none() {
                return Err(AppError::Validation(format!(
                    "answer for question '{}' must be text",
                    question.id
                )));
            }
        }
        QuestionKind::MultipleChoice => {
            let chosen = answer.as_str().ok_or_else(|| {
                AppError::Validation(format!(
                    "answer for question '{}' must be one of the options",
                    question.id
                ))
            })?;
            if !question.options.iter().any(|o| o == chosen) {
                return Err(AppError::Validation(format!(
                    "'{chosen}' is not an option of question '{}'",
                    question.id
                )));
            }
        }
        QuestionKind::Rating => {
            let rating = rating_value(answer).ok_or_else(|| {
                AppError::Validation(format!(
                    "answer for question '{}' must be a rating between {MIN_RATING} and {MAX_RATING}",
                    question.id
                ))
            })?;
            if !(MIN_RATING..=MAX_RATING).contains(&rating) {
                return Err(AppError::Validation(format!(
                    "rating {rating} for question '{}' is out of range",
                    question.id
                )));
            }
        }
    }
    Ok(())
}

/// Ratings come in as JSON numbers, but older clients sent the selected
/// star as a string; accept both.
pub fn rating_value(answer: &Value) -> Option<i64> {
    match answer {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question(id: &str, kind: QuestionKind, options: &[&str]) -> Question {
        Question {
            id: id.to_string(),
            kind,
            prompt: "Prompt".to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    fn survey(questions: Vec<Question>) -> Survey {
        Survey {
            id: "s1".to_string(),
            user_id: "alice".to_string(),
            title: "T".to_string(),
            description: None,
            questions,
            is_active: true,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn rejects_empty_title() {
        let q = question("q1", QuestionKind::ShortText, &[]);
        assert!(matches!(
            validate_new_survey("   ", &[q]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn rejects_survey_without_questions() {
        assert!(matches!(
            validate_new_survey("T", &[]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn rejects_duplicate_question_ids() {
        let questions = [
            question("q1", QuestionKind::ShortText, &[]),
            question("q1", QuestionKind::Rating, &[]),
        ];
        assert!(matches!(
            validate_new_survey("T", &questions),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn rejects_choice_question_without_options() {
        let q = question("q1", QuestionKind::MultipleChoice, &[]);
        assert!(matches!(
            validate_new_survey("T", &[q]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn accepts_well_formed_survey() {
        let questions = [
            question("q1", QuestionKind::ShortText, &[]),
            question("q2", QuestionKind::MultipleChoice, &["Good", "Bad"]),
            question("q3", QuestionKind::Rating, &[]),
        ];
        assert!(validate_new_survey("Satisfaction", &questions).is_ok());
    }

    #[test]
    fn rejects_answer_count_mismatch() {
        let s = survey(vec![
            question("q1", QuestionKind::ShortText, &[]),
            question("q2", QuestionKind::Rating, &[]),
        ]);
        let answers = HashMap::from([("q1".to_string(), json!("hi"))]);
        assert!(matches!(
            validate_answers(&s, &answers),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn rejects_unknown_answer_key() {
        let s = survey(vec![question("q1", QuestionKind::ShortText, &[])]);
        let answers = HashMap::from([("zz".to_string(), json!("hi"))]);
        assert!(matches!(
            validate_answers(&s, &answers),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn rejects_undeclared_option() {
        let s = survey(vec![question("q1", QuestionKind::MultipleChoice, &["Good", "Bad"])]);
        let answers = HashMap::from([("q1".to_string(), json!("Ugly"))]);
        assert!(matches!(
            validate_answers(&s, &answers),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_and_non_numeric_ratings() {
        let s = survey(vec![question("q1", QuestionKind::Rating, &[])]);

        for bad in [json!(0), json!(6), json!("lots"), json!(true)] {
            let answers = HashMap::from([("q1".to_string(), bad)]);
            assert!(matches!(
                validate_answers(&s, &answers),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn accepts_ratings_as_numbers_or_strings() {
        let s = survey(vec![question("q1", QuestionKind::Rating, &[])]);

        for good in [json!(1), json!(5), json!("3")] {
            let answers = HashMap::from([("q1".to_string(), good)]);
            assert!(validate_answers(&s, &answers).is_ok());
        }
    }
}
