use axum::{
    Extension,
    extract::{
        Multipart, State,
        multipart::MultipartRejection,
    },
    response::Html,
};
use tracing::{debug, instrument};

use super::{field_errors, reject_if_invalid};
use crate::models::{UploadedFile, UserRequest};
use crate::server::{AppState, errors::AppError, views, views::FormKind};
use crate::service::OperationError;
use crate::session::BrowserSession;

const MISSING_FILE: &str = "Please select a file to upload";

/// Hashes the uploaded document and shows the verification code.
#[instrument(skip_all, fields(session = %session))]
pub async fn signature_request(
    State(state): State<AppState>,
    Extension(session): Extension<BrowserSession>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, AppError> {
    let user_request = read_signature_form(multipart?).await?;

    let mut errors = field_errors(&user_request);
    if !user_request
        .file
        .as_ref()
        .is_some_and(UploadedFile::is_present)
    {
        errors.add("file", MISSING_FILE);
    }
    reject_if_invalid(FormKind::Signature, &user_request, errors)?;

    let session_info = state.signature.send_signature_request(user_request)?;
    state.sessions.set_signing(&session, &session_info).await?;

    Ok(Html(views::signature(&session_info.verification_code)))
}

/// Completes the pending signature of the browser session.
#[instrument(skip_all, fields(session = %session))]
pub async fn sign(
    State(state): State<AppState>,
    Extension(session): Extension<BrowserSession>,
) -> Result<Html<String>, AppError> {
    let session_info = state
        .sessions
        .take_signing(&session)
        .await?
        .ok_or(OperationError::NoSessionInProgress)?;

    let result = state.signature.sign(&session_info).await?;
    Ok(Html(views::signing_result(&result)))
}

async fn read_signature_form(mut multipart: Multipart) -> Result<UserRequest, AppError> {
    let mut request = UserRequest::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("nationalIdentityNumber") => request.national_identity_number = field.text().await?,
            Some("phoneNumber") => request.phone_number = field.text().await?,
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let content_type = field.content_type().map(str::to_owned);
                let content = field.bytes().await?.to_vec();
                debug!(%file_name, size = content.len(), "Received document");
                request.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    content,
                });
            }
            _ => {}
        }
    }

    Ok(request)
}
