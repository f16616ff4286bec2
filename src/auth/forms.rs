use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use super::password::strength_errors;
use crate::avatars::{self, AvatarImage};
use crate::forms::{push_error, FieldErrors, FormView, MultipartForm, NON_FIELD_ERRORS};

pub const REGISTER_FIELDS: &[&str] = &["username", "email", "password1", "password2", "avatar"];
pub const LOGIN_FIELDS: &[&str] = &["username", "password"];

const REQUIRED: &str = "This field is required.";
const USERNAME_MAX: usize = 150;
const EMAIL_MAX: usize = 254;

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// A registration that passed every structural check.
#[derive(Debug)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar: AvatarImage,
}

/// Validates a submitted registration form. Username uniqueness is left to the caller.
pub fn clean_registration(
    mut form: MultipartForm,
    min_password_length: usize,
    max_upload_bytes: usize,
) -> Result<Registration, FieldErrors> {
    let mut errors = FieldErrors::new();

    let username = form.text("username").trim().to_string();
    if username.is_empty() {
        push_error(&mut errors, "username", REQUIRED);
    } else if username.chars().count() > USERNAME_MAX {
        push_error(
            &mut errors,
            "username",
            format!("Ensure this value has at most {USERNAME_MAX} characters."),
        );
    } else if !USERNAME_RE.is_match(&username) {
        push_error(
            &mut errors,
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }

    let email = form.text("email").trim().to_lowercase();
    if email.is_empty() {
        push_error(&mut errors, "email", REQUIRED);
    } else if email.len() > EMAIL_MAX || !is_valid_email(&email) {
        push_error(&mut errors, "email", "Enter a valid email address.");
    }

    let password1 = form.text("password1").to_string();
    let password2 = form.text("password2").to_string();
    if password1.is_empty() {
        push_error(&mut errors, "password1", REQUIRED);
    }
    if password2.is_empty() {
        push_error(&mut errors, "password2", REQUIRED);
    }
    if !password1.is_empty() && !password2.is_empty() {
        if password1 != password2 {
            push_error(&mut errors, "password2", "The two password fields didn't match.");
        } else {
            for msg in strength_errors(&password2, &username, min_password_length) {
                push_error(&mut errors, "password2", msg);
            }
        }
    }

    let avatar = match form.take_file("avatar") {
        None => {
            push_error(&mut errors, "avatar", REQUIRED);
            None
        }
        Some(file) => match avatars::sniff(file, max_upload_bytes) {
            Ok(img) => Some(img),
            Err(msg) => {
                push_error(&mut errors, "avatar", msg);
                None
            }
        },
    };

    match avatar {
        Some(avatar) if errors.is_empty() => Ok(Registration {
            username,
            email,
            password: password1,
            avatar,
        }),
        _ => Err(errors),
    }
}

pub fn register_form() -> FormView {
    FormView::blank("register", REGISTER_FIELDS)
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NextParam {
    pub next: Option<String>,
}

pub fn login_form(next: Option<&str>) -> FormView {
    let view = FormView::blank("login", LOGIN_FIELDS);
    match next {
        Some(next) => view.with_initial(serde_json::json!({ "next": next })),
        None => view,
    }
}

impl LoginForm {
    pub fn check_filled(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.username.trim().is_empty() {
            push_error(&mut errors, "username", REQUIRED);
        }
        if self.password.is_empty() {
            push_error(&mut errors, "password", REQUIRED);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

pub fn bad_credentials() -> FieldErrors {
    let mut errors = FieldErrors::new();
    push_error(
        &mut errors,
        NON_FIELD_ERRORS,
        "Please enter a correct username and password. Note that both fields may be case-sensitive.",
    );
    errors
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n,
        _ => "/",
    }
}
