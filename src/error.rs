use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::forms::FormView;
use crate::polls::views::DetailView;

pub type AppResult<T> = Result<T, AppError>;

/// Every way a request can end short of its happy path.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("authentication required")]
    Unauthenticated { next: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid {} form", .0.form)]
    Validation(Box<FormView>),

    #[error("vote rejected: {}", .0.error_message.as_deref().unwrap_or_default())]
    VoteRejected(Box<DetailView>),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated { .. } => StatusCode::SEE_OTHER,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) | Self::VoteRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Login URL carrying the page to come back to.
pub fn login_url(next: &str) -> String {
    format!("/login/?next={}", urlencoding::encode(next))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            // Details stay in the log; the client only learns that something broke.
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }

        match self {
            Self::Unauthenticated { next } => Redirect::to(&login_url(&next)).into_response(),
            Self::Validation(form) => (status, Json(*form)).into_response(),
            Self::VoteRejected(detail) => (status, Json(*detail)).into_response(),
            Self::NotFound(what) => {
                (status, Json(json!({ "detail": format!("No {what} matches the given query.") })))
                    .into_response()
            }
            Self::BadRequest(msg) => (status, Json(json!({ "detail": msg }))).into_response(),
            Self::Internal(_) => {
                (status, Json(json!({ "detail": "Internal server error" }))).into_response()
            }
        }
    }
}

/// True when the error is a PostgreSQL unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::NotFound("question").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Unauthenticated { next: "/profile/".into() }.status_code(),
            StatusCode::SEE_OTHER
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unauthenticated_redirects_to_login_with_next() {
        let res = AppError::Unauthenticated { next: "/profile/edit/".into() }.into_response();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        let location = res.headers().get(axum::http::header::LOCATION).unwrap();
        assert_eq!(location, "/login/?next=%2Fprofile%2Fedit%2F");
    }

    #[test]
    fn repo_errors_surface_as_opaque_500() {
        let err: AppError = anyhow::Error::new(sqlx::Error::PoolTimedOut)
            .context("find question")
            .into();
        assert!(matches!(err, AppError::Internal(_)));
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
