use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;
use uuid::Uuid;

use super::{repo::User, session::SessionKeys};
use crate::{error::AppError, state::AppState};

/// The logged-in user, taken from the session cookie or a Bearer header.
///
/// A token whose user no longer exists is refused, so deleting an account
/// ends every session it had.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

fn session_token(parts: &Parts, keys: &SessionKeys) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(keys.cookie_name()) {
        return Some(cookie.value().to_string());
    }
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let unauthenticated = || AppError::Unauthenticated {
            next: parts.uri.path().to_string(),
        };

        let keys = SessionKeys::from_ref(state);
        let token = session_token(parts, &keys).ok_or_else(unauthenticated)?;

        let claims = match keys.verify(&token) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "invalid or expired session");
                return Err(unauthenticated());
            }
        };

        if !User::exists(&state.db, claims.sub).await? {
            warn!(user_id = %claims.sub, "session for deleted user");
            return Err(unauthenticated());
        }

        Ok(AuthUser(claims.sub))
    }
}
