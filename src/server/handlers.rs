pub mod authentication;
pub mod signature;

use axum::response::{Html, IntoResponse};
use validator::Validate;

use super::errors::{AppError, FieldErrors};
use super::views::{self, FormKind};
use crate::models::UserRequest;

pub async fn index() -> Html<String> {
    Html(views::index(None))
}

pub async fn health_check() -> impl IntoResponse {
    "healthy"
}

/// Collects the field messages of a submitted start form.
fn field_errors(request: &UserRequest) -> FieldErrors {
    request
        .validate()
        .err()
        .map(|errors| FieldErrors::from(&errors))
        .unwrap_or_default()
}

fn reject_if_invalid(
    form: FormKind,
    request: &UserRequest,
    errors: FieldErrors,
) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::invalid_input(form, request, errors))
    }
}
