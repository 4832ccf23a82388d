//! # Multipart Form Extraction
//!
//! The upload, train and verify endpoints take `multipart/form-data`.
//! [`read_form`] buffers every part by field name and maps extraction
//! failures to [`AppError`].

use std::collections::HashMap;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::Multipart;
use axum::http::StatusCode;

use crate::error::AppError;

/// One buffered form part.
#[derive(Debug, Clone)]
pub struct FormPart {
    /// Client-supplied filename, for file parts.
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// A fully buffered multipart form.
#[derive(Debug, Default)]
pub struct Form {
    parts: HashMap<String, FormPart>,
}

impl Form {
    /// Take a part out of the form.
    pub fn take(&mut self, name: &str) -> Option<FormPart> {
        self.parts.remove(name)
    }

    /// A text field, trimmed; empty values count as absent.
    pub fn text(&mut self, name: &str) -> Result<Option<String>, AppError> {
        match self.parts.remove(name) {
            None => Ok(None),
            Some(part) => {
                let text = String::from_utf8(part.bytes).map_err(|_| {
                    AppError::BadRequest(format!("form field `{name}` is not UTF-8"))
                })?;
                let text = text.trim();
                Ok((!text.is_empty()).then(|| text.to_string()))
            }
        }
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Buffer every part of a multipart request. A repeated field name keeps
/// the last part.
pub async fn read_form(multipart: Result<Multipart, MultipartRejection>) -> Result<Form, AppError> {
    let mut multipart = multipart.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(rejection.body_text())
        } else {
            AppError::BadRequest(rejection.body_text())
        }
    })?;

    let mut form = Form::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        form.parts.insert(
            name,
            FormPart {
                filename,
                bytes: bytes.to_vec(),
            },
        );
    }
    Ok(form)
}
