use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, Query, State},
    response::Redirect,
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{
    forms::{
        bad_credentials, clean_registration, login_form, register_form, safe_next, LoginForm,
        NextParam,
    },
    password::{hash_password, verify_dummy, verify_password},
    repo::{CreateOutcome, NewAccount, User},
    session::SessionKeys,
};
use crate::{
    avatars,
    error::AppResult,
    forms::{push_error, upload_body_limit, FieldErrors, FormView, MultipartForm},
    state::AppState,
};

pub fn auth_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/register/",
            get(register_page)
                .post(register)
                .layer(DefaultBodyLimit::max(upload_body_limit(max_upload_bytes))),
        )
        .route("/login/", get(login_page).post(login))
        .route("/logout/", post(logout))
}

pub async fn register_page() -> Json<FormView> {
    Json(register_form())
}

#[instrument(skip(state, jar, mp))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    mp: Multipart,
) -> AppResult<(CookieJar, Redirect)> {
    let form = MultipartForm::collect(mp).await?;
    let reg = clean_registration(
        form,
        state.config.password_min_length,
        state.config.max_upload_bytes,
    )
    .map_err(|errors| {
        warn!(rejected = ?errors.keys().collect::<Vec<_>>(), "registration rejected");
        register_form().with_errors(errors).into_error()
    })?;

    let username_taken = || {
        let mut errors = FieldErrors::new();
        push_error(&mut errors, "username", "A user with that username already exists.");
        register_form().with_errors(errors).into_error()
    };

    if User::username_taken(&state.db, &reg.username).await? {
        warn!(username = %reg.username, "username already registered");
        return Err(username_taken());
    }

    let password_hash = hash_password(&reg.password)?;
    let user_id = Uuid::new_v4();
    let avatar_key = avatars::store(&state, user_id, reg.avatar).await?;

    let outcome = User::create_with_profile(
        &state.db,
        NewAccount {
            id: user_id,
            username: &reg.username,
            email: &reg.email,
            password_hash: &password_hash,
            avatar: &avatar_key,
        },
    )
    .await;

    let user = match outcome {
        Ok(CreateOutcome::Created(user, _profile)) => user,
        Ok(CreateOutcome::UsernameTaken) => {
            avatars::discard(&state, &avatar_key).await;
            warn!(username = %reg.username, "username claimed concurrently");
            return Err(username_taken());
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            avatars::discard(&state, &avatar_key).await;
            return Err(e.into());
        }
    };

    let jar = SessionKeys::from_ref(&state).login(jar, user.id)?;
    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((jar, Redirect::to("/")))
}

pub async fn login_page(Query(q): Query<NextParam>) -> Json<FormView> {
    Json(login_form(q.next.as_deref()))
}

#[instrument(skip_all, fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<(CookieJar, Redirect)> {
    let view = || login_form(form.next.as_deref());

    form.check_filled()
        .map_err(|errors| view().with_errors(errors).into_error())?;

    let Some(user) = User::find_by_username(&state.db, form.username.trim()).await? else {
        verify_dummy(&form.password);
        warn!("login for unknown username");
        return Err(view().with_errors(bad_credentials()).into_error());
    };

    if !verify_password(&form.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(view().with_errors(bad_credentials()).into_error());
    }

    let jar = SessionKeys::from_ref(&state).login(jar, user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok((jar, Redirect::to(safe_next(form.next.as_deref()))))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    (SessionKeys::from_ref(&state).logout(jar), Redirect::to("/"))
}
