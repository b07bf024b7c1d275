//! # Results aggregation
//!
//! Pure functions from a survey and its responses to per-question
//! summaries. No I/O; everything is recomputed from scratch on demand,
//! which is fine at the response volumes a single owner collects.

use serde::Serialize;
use serde_json::Value;

use crate::{
    models::{Question, QuestionKind, Survey, SurveyResponse},
    validate::{rating_value, MAX_RATING, MIN_RATING},
};

#[derive(Debug, Serialize)]
pub struct SurveyResults {
    pub total_responses: usize,
    pub questions: Vec<QuestionSummary>,
}

#[derive(Debug, Serialize)]
pub struct QuestionSummary {
    pub question_id: String,
    pub prompt: String,
    #[serde(flatten)]
    pub tally: Tally,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum Tally {
    /// Raw answers, newest first. A missing or empty answer stays in the
    /// list as `None` so every response keeps its slot.
    #[serde(rename = "text")]
    Text { answers: Vec<Option<String>> },
    #[serde(rename = "multiple")]
    MultipleChoice { options: Vec<OptionTally> },
    #[serde(rename = "rating")]
    Rating {
        average: f64,
        distribution: Vec<RatingTally>,
    },
}

#[derive(Debug, Serialize)]
pub struct OptionTally {
    pub option: String,
    pub count: usize,
    /// Omitted when there are no responses at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RatingTally {
    pub rating: i64,
    pub count: usize,
    pub percentage: u32,
}

pub fn aggregate(survey: &Survey, responses: &[SurveyResponse]) -> SurveyResults {
    let total = responses.len();
    let questions = survey
        .questions
        .iter()
        .map(|question| QuestionSummary {
            question_id: question.id.clone(),
            prompt: question.prompt.clone(),
            tally: match question.kind {
                QuestionKind::ShortText => tally_text(question, responses),
                QuestionKind::MultipleChoice => tally_choices(question, responses, total),
                QuestionKind::Rating => tally_ratings(question, responses, total),
            },
        })
        .collect();

    SurveyResults {
        total_responses: total,
        questions,
    }
}

fn percent(count: usize, total: usize) -> u32 {
    (count as f64 / total as f64 * 100.0).round() as u32
}

fn tally_text(question: &Question, responses: &[SurveyResponse]) -> Tally {
    let answers = responses
        .iter()
        .map(|response| {
            response
                .answers
                .get(&question.id)
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        })
        .collect();
    Tally::Text { answers }
}

fn tally_choices(question: &Question, responses: &[SurveyResponse], total: usize) -> Tally {
    // Every declared option gets a row, chosen or not.
    let mut counts = vec![0usize; question.options.len()];

    for response in responses {
        let Some(chosen) = response.answers.get(&question.id).and_then(Value::as_str) else {
            continue;
        };
        // Answers matching no declared option are not counted anywhere.
        if let Some(index) = question.options.iter().position(|option| option == chosen) {
            counts[index] += 1;
        }
    }

    let options = question
        .options
        .iter()
        .zip(counts)
        .map(|(option, count)| OptionTally {
            option: option.clone(),
            count,
            percentage: (total > 0).then(|| percent(count, total)),
        })
        .collect();
    Tally::MultipleChoice { options }
}

fn tally_ratings(question: &Question, responses: &[SurveyResponse], total: usize) -> Tally {
    // Absent or malformed ratings count toward neither the numerator
    // nor the denominator of the average.
    let ratings: Vec<i64> = responses
        .iter()
        .filter_map(|response| response.answers.get(&question.id).and_then(rating_value))
        .filter(|rating| (MIN_RATING..=MAX_RATING).contains(rating))
        .collect();

    let average = if ratings.is_empty() {
        0.0
    } else {
        ratings.iter().sum::<i64>() as f64 / ratings.len() as f64
    };

    let distribution = (MIN_RATING..=MAX_RATING)
        .rev()
        .map(|rating| {
            let count = ratings.iter().filter(|&&r| r == rating).count();
            RatingTally {
                rating,
                count,
                percentage: if total > 0 { percent(count, total) } else { 0 },
            }
        })
        .collect();

    Tally::Rating {
        average,
        distribution,
    }
}
