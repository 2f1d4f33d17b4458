use axum::{
    Extension, Form,
    extract::{State, rejection::FormRejection},
    response::Html,
};
use tracing::instrument;

use super::{field_errors, reject_if_invalid};
use crate::models::UserRequest;
use crate::server::{AppState, errors::AppError, views, views::FormKind};
use crate::service::OperationError;
use crate::session::BrowserSession;

/// Starts an authentication and shows the verification code.
#[instrument(skip_all, fields(session = %session))]
pub async fn authentication_request(
    State(state): State<AppState>,
    Extension(session): Extension<BrowserSession>,
    form: Result<Form<UserRequest>, FormRejection>,
) -> Result<Html<String>, AppError> {
    let Form(user_request) = form?;
    reject_if_invalid(
        FormKind::Authentication,
        &user_request,
        field_errors(&user_request),
    )?;

    let session_info = state.authentication.start_authentication(user_request);
    state
        .sessions
        .set_authentication(&session, &session_info)
        .await?;

    Ok(Html(views::authentication(&session_info.verification_code)))
}

/// Completes the pending authentication of the browser session.
///
/// The pending slot is taken before calling Mobile-ID so it is gone whatever
/// the outcome.
#[instrument(skip_all, fields(session = %session))]
pub async fn authenticate(
    State(state): State<AppState>,
    Extension(session): Extension<BrowserSession>,
) -> Result<Html<String>, AppError> {
    let session_info = state
        .sessions
        .take_authentication(&session)
        .await?
        .ok_or(OperationError::NoSessionInProgress)?;

    let identity = state.authentication.authenticate(&session_info).await?;
    Ok(Html(views::authentication_result(&identity)))
}
