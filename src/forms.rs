//! Form plumbing shared by the registration, login and profile handlers.

use std::collections::{BTreeMap, HashMap};

use axum::extract::Multipart;
use bytes::Bytes;
use serde::Serialize;

use crate::error::AppError;

/// Key used for errors that belong to the form as a whole.
pub const NON_FIELD_ERRORS: &str = "__all__";

pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

/// Room for the text fields and part headers around an uploaded file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Request body limit for a form carrying one file of at most `max_file_bytes`.
pub fn upload_body_limit(max_file_bytes: usize) -> usize {
    max_file_bytes.saturating_add(MULTIPART_OVERHEAD)
}

/// What a form page shows: its fields, any prefilled values, and errors.
#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    pub form: &'static str,
    pub fields: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<serde_json::Value>,
    pub errors: FieldErrors,
}

impl FormView {
    pub fn blank(form: &'static str, fields: &'static [&'static str]) -> Self {
        Self {
            form,
            fields,
            initial: None,
            errors: FieldErrors::new(),
        }
    }

    pub fn with_initial(mut self, initial: serde_json::Value) -> Self {
        self.initial = Some(initial);
        self
    }

    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = errors;
        self
    }

    pub fn into_error(self) -> AppError {
        AppError::Validation(Box::new(self))
    }
}

pub fn push_error(errors: &mut FieldErrors, field: &'static str, msg: impl Into<String>) {
    errors.entry(field).or_default().push(msg.into());
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// A fully buffered `multipart/form-data` submission.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn collect(mut mp: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = mp
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let body = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?;
                    // Browsers send an empty part when no file was picked.
                    if file_name.is_empty() && body.is_empty() {
                        continue;
                    }
                    form.files.insert(
                        name,
                        UploadedFile {
                            file_name: Some(file_name),
                            content_type,
                            body,
                        },
                    );
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    /// Text value of a field, empty when absent.
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    #[cfg(test)]
    pub fn from_parts(fields: &[(&str, &str)], files: Vec<(&str, UploadedFile)>) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            files: files.into_iter().map(|(k, f)| (k.to_string(), f)).collect(),
        }
    }
}
