use std::sync::Arc;

use tracing::{info, instrument};

use super::{MidContext, OperationError, ServiceError};
use crate::config::MidConfig;
use crate::mid::{
    AuthenticationRequest, DisplayTextFormat, HashToSign, HashType, Language, MidAuthentication,
    MidConnector, MidError, ResponseValidator, SessionKind,
};
use crate::models::{AuthenticationIdentity, AuthenticationSessionInfo, UserRequest};

/// Authenticates users with Mobile-ID.
#[derive(Clone)]
pub struct AuthenticationService {
    mid: MidContext,
    display_text: String,
    language: Language,
}

impl AuthenticationService {
    pub fn new(
        connector: Arc<dyn MidConnector>,
        validator: Arc<ResponseValidator>,
        config: &MidConfig,
    ) -> Self {
        Self {
            mid: MidContext::new(connector, validator, config),
            display_text: config.auth_display_text.clone(),
            language: config.language,
        }
    }

    /// Generates a random challenge and the verification code derived from it.
    pub fn start_authentication(&self, user_request: UserRequest) -> AuthenticationSessionInfo {
        let authentication_hash = HashToSign::random(HashType::Sha256);
        let verification_code = authentication_hash.verification_code();

        AuthenticationSessionInfo {
            user_request,
            authentication_hash,
            verification_code,
        }
    }

    /// Runs the authentication on the user's phone and waits for its outcome.
    #[instrument(skip_all, fields(verification_code = %session_info.verification_code))]
    pub async fn authenticate(
        &self,
        session_info: &AuthenticationSessionInfo,
    ) -> Result<AuthenticationIdentity, ServiceError> {
        let authentication = self.request_authentication(session_info).await?;

        let identity = self.mid.validator.validate(&authentication).map_err(|errors| {
            info!(?errors, "Authentication response is not valid");
            OperationError::ValidationFailed(errors)
        })?;

        info!(identity_code = %identity.identity_code, "User authenticated");
        Ok(identity)
    }

    async fn request_authentication(
        &self,
        session_info: &AuthenticationSessionInfo,
    ) -> Result<MidAuthentication, MidError> {
        let user_request = &session_info.user_request;
        let hash = &session_info.authentication_hash;

        let request = AuthenticationRequest {
            phone_number: user_request.phone_number.clone(),
            national_identity_number: user_request.identity_code().to_owned(),
            hash: hash.to_base64(),
            hash_type: hash.hash_type(),
            language: self.language,
            display_text: Some(self.display_text.clone()),
            display_text_format: DisplayTextFormat::Gsm7,
        };

        let session_id = self.mid.connector.authenticate(request).await?;
        let status = self
            .mid
            .poller
            .fetch_final_session_status(
                self.mid.connector.as_ref(),
                SessionKind::Authentication,
                &session_id,
            )
            .await?;

        MidAuthentication::from_session_status(status, hash.clone())
    }
}
