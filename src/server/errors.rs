use std::collections::BTreeMap;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::FormRejection;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use color_eyre::Report;
use thiserror::Error;
use tracing::{error, info};
use validator::ValidationErrors;

use super::views::{self, FormKind};
use crate::models::UserRequest;
use crate::service::{OperationError, ServiceError};
use crate::session::SessionError;

const FILE_UPLOAD_ERROR: &str = "File upload error";
const INVALID_FORM: &str = "Invalid form submission";

/// Messages attached to the fields of a rejected form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The message shown next to a field.
    pub fn first(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }
}

impl From<&ValidationErrors> for FieldErrors {
    fn from(errors: &ValidationErrors) -> Self {
        let mut field_errors = FieldErrors::default();
        for (field, errors) in errors.field_errors() {
            for error in errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| error.code.to_string());
                field_errors.add(camel_case(&field), message);
            }
        }
        field_errors
    }
}

/// Form fields are named in camelCase.
fn camel_case(field: &str) -> String {
    let mut name = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            name.extend(c.to_uppercase());
            upper = false;
        } else {
            name.push(c);
        }
    }
    name
}

#[derive(Error, Debug)]
pub enum AppError {
    /// The submitted form is re-rendered with its field messages.
    #[error("Invalid input")]
    InvalidInput {
        form: FormKind,
        request: UserRequest,
        errors: FieldErrors,
    },
    /// The request body could not be decoded as a form.
    #[error("Invalid form submission: {0}")]
    InvalidForm(String),
    #[error("File upload error: {0}")]
    FileUpload(String),
    #[error(transparent)]
    Operation(#[from] OperationError),
    /// Logged, then rendered as a generic error page.
    #[error("{0:?}")]
    Unexpected(Report),
}

impl AppError {
    pub fn invalid_input(form: FormKind, request: &UserRequest, errors: FieldErrors) -> Self {
        AppError::InvalidInput {
            form,
            request: request.clone(),
            errors,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Operation(e) => AppError::Operation(e),
            e @ ServiceError::MissingDocument => AppError::FileUpload(e.to_string()),
            ServiceError::Unexpected(e) => AppError::Unexpected(Report::new(e)),
        }
    }
}

impl From<Report> for AppError {
    fn from(report: Report) -> Self {
        AppError::Unexpected(report)
    }
}

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> Self {
        AppError::Unexpected(Report::new(error))
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::InvalidForm(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(error: MultipartError) -> Self {
        AppError::FileUpload(error.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::FileUpload(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidInput {
                form,
                request,
                errors,
            } => {
                info!(?form, ?errors, "Rejected invalid form input");
                let page = views::index(Some((form, &request, &errors)));
                (StatusCode::BAD_REQUEST, Html(page)).into_response()
            }
            AppError::InvalidForm(detail) => {
                info!(%detail, "Rejected undecodable form");
                let page = views::operation_error(INVALID_FORM);
                (StatusCode::BAD_REQUEST, Html(page)).into_response()
            }
            AppError::FileUpload(detail) => {
                info!(%detail, "File upload failed");
                let page = views::operation_error(FILE_UPLOAD_ERROR);
                (StatusCode::BAD_REQUEST, Html(page)).into_response()
            }
            AppError::Operation(e) => (StatusCode::OK, Html(views::operation_error(&e.to_string())))
                .into_response(),
            AppError::Unexpected(report) => {
                error!(error = ?report, "Unexpected error");
                (StatusCode::INTERNAL_SERVER_ERROR, Html(views::error())).into_response()
            }
        }
    }
}
