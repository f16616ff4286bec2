use serde::Serialize;
use time::OffsetDateTime;

use super::models::{Choice, Question};

#[derive(Debug, Clone, Serialize)]
pub struct QuestionSummary {
    pub id: i64,
    pub question_text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub is_active: bool,
    pub was_published_recently: bool,
}

impl QuestionSummary {
    pub fn at(q: &Question, now: OffsetDateTime) -> Self {
        Self {
            id: q.id,
            question_text: q.question_text.clone(),
            pub_date: q.pub_date,
            expires_at: q.expires_at,
            is_active: q.is_active(now),
            was_published_recently: q.was_published_recently(now),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IndexView {
    pub latest_question_list: Vec<QuestionSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChoiceOption {
    pub id: i64,
    pub choice_text: String,
}

/// A question with its options; `can_vote` is false once the poll has closed.
#[derive(Debug, Clone, Serialize)]
pub struct DetailView {
    pub question: QuestionSummary,
    pub choices: Vec<ChoiceOption>,
    pub can_vote: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl DetailView {
    pub fn at(q: &Question, choices: &[Choice], now: OffsetDateTime) -> Self {
        let question = QuestionSummary::at(q, now);
        Self {
            can_vote: question.is_active,
            question,
            choices: choices
                .iter()
                .map(|c| ChoiceOption {
                    id: c.id,
                    choice_text: c.choice_text.clone(),
                })
                .collect(),
            error_message: None,
        }
    }

    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error_message = Some(msg.into());
        self
    }
}

#[derive(Debug, Serialize)]
pub struct ChoiceTally {
    pub id: i64,
    pub choice_text: String,
    pub votes: i32,
}

#[derive(Debug, Serialize)]
pub struct ResultsView {
    pub question: QuestionSummary,
    pub choices: Vec<ChoiceTally>,
    pub total_votes: i64,
}

impl ResultsView {
    pub fn at(q: &Question, choices: Vec<Choice>, now: OffsetDateTime) -> Self {
        Self {
            question: QuestionSummary::at(q, now),
            total_votes: q.total_votes(&choices),
            choices: choices
                .into_iter()
                .map(|c| ChoiceTally {
                    id: c.id,
                    choice_text: c.choice_text,
                    votes: c.votes,
                })
                .collect(),
        }
    }
}
