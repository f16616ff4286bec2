use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, State},
    response::Redirect,
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{
    forms::{clean_profile_edit, profile_form},
    repo::{Profile, ProfileChanges},
};
use crate::{
    auth::{extractors::AuthUser, repo::User, session::SessionKeys},
    avatars,
    error::{AppError, AppResult},
    forms::{upload_body_limit, FormView, MultipartForm},
    state::AppState,
};

pub fn profile_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/profile/", get(view_profile))
        .route(
            "/profile/edit/",
            get(edit_profile_page)
                .post(edit_profile)
                .layer(DefaultBodyLimit::max(upload_body_limit(max_upload_bytes))),
        )
        .route("/profile/delete/", get(delete_account_page).post(delete_account))
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub avatar_url: String,
    pub bio: String,
    pub location: String,
}

#[instrument(skip(state))]
pub async fn view_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ProfileView>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let profile = Profile::get_or_create(&state.db, user_id, &state.config.default_avatar).await?;
    let avatar_url = avatars::url_for(&state, &profile.avatar).await?;

    Ok(Json(ProfileView {
        username: user.username,
        email: user.email,
        avatar: profile.avatar,
        avatar_url,
        bio: profile.bio,
        location: profile.location,
    }))
}

#[instrument(skip(state))]
pub async fn edit_profile_page(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<FormView>> {
    let profile = Profile::get_or_create(&state.db, user_id, &state.config.default_avatar).await?;
    Ok(Json(profile_form(&profile)))
}

#[instrument(skip(state, mp))]
pub async fn edit_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Multipart,
) -> AppResult<Redirect> {
    let form = MultipartForm::collect(mp).await?;
    let profile = Profile::get_or_create(&state.db, user_id, &state.config.default_avatar).await?;

    let edit = clean_profile_edit(form, state.config.avatar_on_edit, state.config.max_upload_bytes)
        .map_err(|errors| {
            warn!(%user_id, rejected = ?errors.keys().collect::<Vec<_>>(), "profile edit rejected");
            profile_form(&profile).with_errors(errors).into_error()
        })?;

    let new_avatar = match edit.avatar {
        Some(img) => Some(avatars::store(&state, user_id, img).await?),
        None => None,
    };

    let updated = Profile::update(
        &state.db,
        user_id,
        ProfileChanges {
            avatar: new_avatar.as_deref().unwrap_or(&profile.avatar),
            bio: &edit.bio,
            location: &edit.location,
        },
    )
    .await;

    match (updated, new_avatar) {
        (Ok(_), Some(_)) => avatars::discard(&state, &profile.avatar).await,
        (Ok(_), None) => {}
        (Err(e), Some(key)) => {
            avatars::discard(&state, &key).await;
            return Err(e.into());
        }
        (Err(e), None) => return Err(e.into()),
    }

    info!(%user_id, "profile updated");
    Ok(Redirect::to("/profile/"))
}

/// Confirmation step before the account is deleted.
#[instrument(skip(state))]
pub async fn delete_account_page(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<FormView>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(
        FormView::blank("profile_delete", &[])
            .with_initial(serde_json::json!({ "username": user.username })),
    ))
}

/// Irreversibly deletes the account, then ends the session.
#[instrument(skip(state, jar))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, Redirect)> {
    let profile = Profile::get_or_create(&state.db, user_id, &state.config.default_avatar).await?;
    if User::delete(&state.db, user_id).await? {
        avatars::discard(&state, &profile.avatar).await;
        info!(%user_id, "account deleted");
    }
    Ok((SessionKeys::from_ref(&state).logout(jar), Redirect::to("/")))
}
