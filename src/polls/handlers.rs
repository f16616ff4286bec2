use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use super::{
    repo,
    views::{DetailView, IndexView, QuestionSummary, ResultsView},
    voting::{cast_vote, parse_selection, Ballot},
};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn poll_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/:question_id/", get(detail))
        .route("/:question_id/results/", get(results))
        .route("/:question_id/vote/", post(vote))
}

#[derive(Debug, Deserialize)]
pub struct VoteForm {
    pub choice: Option<String>,
}

/// Question ids are integers; anything else names no question.
fn parse_question_id(raw: &str) -> AppResult<i64> {
    raw.parse::<i64>().map_err(|_| AppError::NotFound("question"))
}

#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> AppResult<Json<IndexView>> {
    let now = OffsetDateTime::now_utc();
    let questions = repo::list_active(&state.db, now).await?;
    Ok(Json(IndexView {
        latest_question_list: questions
            .iter()
            .map(|q| QuestionSummary::at(q, now))
            .collect(),
    }))
}

#[instrument(skip(state))]
pub async fn detail(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<DetailView>> {
    let question_id = parse_question_id(&raw_id)?;
    let question = repo::find_question(&state.db, question_id)
        .await?
        .ok_or(AppError::NotFound("question"))?;
    let choices = repo::choices_for(&state.db, question_id).await?;
    Ok(Json(DetailView::at(&question, &choices, OffsetDateTime::now_utc())))
}

#[instrument(skip(state))]
pub async fn results(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<Json<ResultsView>> {
    let question_id = parse_question_id(&raw_id)?;
    let question = repo::find_question(&state.db, question_id)
        .await?
        .ok_or(AppError::NotFound("question"))?;
    let choices = repo::choices_for(&state.db, question_id).await?;
    Ok(Json(ResultsView::at(&question, choices, OffsetDateTime::now_utc())))
}

#[instrument(skip(state, form))]
pub async fn vote(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(raw_id): Path<String>,
    Form(form): Form<VoteForm>,
) -> AppResult<Redirect> {
    let question_id = parse_question_id(&raw_id)?;
    let selected = parse_selection(form.choice.as_deref());
    match cast_vote(&state.db, user_id, question_id, selected).await? {
        Ballot::Counted { choice_id } => {
            debug!(question_id, choice_id, "redirecting to results");
            Ok(Redirect::to(&format!("/{question_id}/results/")))
        }
        Ballot::UnknownQuestion => Err(AppError::NotFound("question")),
        Ballot::Rejected {
            reason,
            question,
            choices,
        } => {
            let view = DetailView::at(&question, &choices, OffsetDateTime::now_utc())
                .with_error(reason.to_string());
            Err(AppError::VoteRejected(Box::new(view)))
        }
    }
}
