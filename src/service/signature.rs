use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use tracing::{info, instrument};

use super::{MidContext, OperationError, ServiceError};
use crate::config::MidConfig;
use crate::mid::{
    CertificateRequest, DisplayTextFormat, HashToSign, HashType, Language, MidConnector, MidError,
    MidSignature, ResponseValidator, SessionKind, SignatureRequest,
};
use crate::models::{SigningResult, SigningSessionInfo, UploadedFile, UserRequest};

const SIGNATURE_CREATED: &str = "Signature created";

/// Signs uploaded documents with Mobile-ID.
#[derive(Clone)]
pub struct SignatureService {
    mid: MidContext,
    display_text: String,
    language: Language,
}

impl SignatureService {
    pub fn new(
        connector: Arc<dyn MidConnector>,
        validator: Arc<ResponseValidator>,
        config: &MidConfig,
    ) -> Self {
        Self {
            mid: MidContext::new(connector, validator, config),
            display_text: config.sign_display_text.clone(),
            language: config.language,
        }
    }

    /// Hashes the uploaded document and derives the verification code shown
    /// to the user.
    ///
    /// Only the document name and its hash are kept; the content is dropped.
    pub fn send_signature_request(
        &self,
        mut user_request: UserRequest,
    ) -> Result<SigningSessionInfo, ServiceError> {
        let document = user_request
            .file
            .take()
            .filter(UploadedFile::is_present)
            .ok_or(ServiceError::MissingDocument)?;
        let hash_to_sign = HashToSign::of_data(HashType::Sha256, &document.content);
        let verification_code = hash_to_sign.verification_code();

        Ok(SigningSessionInfo {
            user_request,
            document_name: document.file_name,
            hash_to_sign,
            verification_code,
        })
    }

    /// Requests the signature on the user's phone and waits for its outcome.
    #[instrument(skip_all, fields(document = %session_info.document_name))]
    pub async fn sign(
        &self,
        session_info: &SigningSessionInfo,
    ) -> Result<SigningResult, ServiceError> {
        let (certificate, signature) = self.request_signature(session_info).await?;
        let hash = &session_info.hash_to_sign;

        let signer = self
            .mid
            .validator
            .validate_signature(&certificate, hash, &signature.value)
            .map_err(|errors| {
                info!(?errors, "Signature is not valid");
                OperationError::ValidationFailed(errors)
            })?;

        info!(identity_code = %signer.identity_code, "Document signed");
        Ok(SigningResult {
            result: SIGNATURE_CREATED.to_string(),
            valid: true,
            timestamp: Utc::now(),
            document_name: session_info.document_name.clone(),
            hash_type: hash.hash_type(),
            signature_value: STANDARD.encode(&signature.value),
            signer,
        })
    }

    /// Returns the signer certificate and the signature.
    async fn request_signature(
        &self,
        session_info: &SigningSessionInfo,
    ) -> Result<(Vec<u8>, MidSignature), MidError> {
        let user_request = &session_info.user_request;
        let hash = &session_info.hash_to_sign;

        let certificate = self
            .mid
            .connector
            .get_certificate(CertificateRequest {
                phone_number: user_request.phone_number.clone(),
                national_identity_number: user_request.identity_code().to_owned(),
            })
            .await?;

        let request = SignatureRequest {
            phone_number: user_request.phone_number.clone(),
            national_identity_number: user_request.identity_code().to_owned(),
            hash: hash.to_base64(),
            hash_type: hash.hash_type(),
            language: self.language,
            display_text: Some(self.display_text.clone()),
            display_text_format: DisplayTextFormat::Gsm7,
        };

        let session_id = self.mid.connector.sign(request).await?;
        let status = self
            .mid
            .poller
            .fetch_final_session_status(
                self.mid.connector.as_ref(),
                SessionKind::Signature,
                &session_id,
            )
            .await?;

        Ok((certificate, MidSignature::from_session_status(&status)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mid::SessionResult;
    use crate::mid::testing::{
        KeyKind, StubConnector, TEST_IDENTITY_CODE, TEST_PHONE_NUMBER, TestSigner,
    };

    fn service(connector: Arc<StubConnector>) -> SignatureService {
        let config = Config::load_with_sources(Some(Default::default())).unwrap();
        SignatureService::new(connector, Arc::new(ResponseValidator::default()), &config.mid)
    }

    fn document() -> UploadedFile {
        UploadedFile {
            file_name: "contract.txt".into(),
            content_type: Some("text/plain".into()),
            content: b"I agree".to_vec(),
        }
    }

    fn session_info(service: &SignatureService) -> SigningSessionInfo {
        let user_request =
            UserRequest::new(TEST_IDENTITY_CODE, TEST_PHONE_NUMBER).with_file(document());
        service.send_signature_request(user_request).unwrap()
    }

    #[test]
    fn test_send_signature_request_hashes_document() {
        let service = service(Arc::new(StubConnector::new()));
        let info = session_info(&service);

        let expected = HashToSign::of_data(HashType::Sha256, b"I agree");
        assert_eq!(info.hash_to_sign, expected);
        assert_eq!(info.verification_code, expected.verification_code());
        assert_eq!(info.document_name, "contract.txt");
        assert!(info.user_request.file.is_none());
    }

    #[test]
    fn test_send_signature_request_requires_document() {
        let service = service(Arc::new(StubConnector::new()));

        let without_file = UserRequest::new(TEST_IDENTITY_CODE, TEST_PHONE_NUMBER);
        assert!(matches!(
            service.send_signature_request(without_file),
            Err(ServiceError::MissingDocument)
        ));

        let empty_file = UserRequest::new(TEST_IDENTITY_CODE, TEST_PHONE_NUMBER)
            .with_file(UploadedFile::default());
        assert!(matches!(
            service.send_signature_request(empty_file),
            Err(ServiceError::MissingDocument)
        ));
    }

    #[tokio::test]
    async fn test_successful_signature() {
        let connector = Arc::new(StubConnector::succeeding(TestSigner::new(KeyKind::Ec)));
        let service = service(connector.clone());
        let info = session_info(&service);

        let result = service.sign(&info).await.unwrap();

        assert!(result.valid);
        assert_eq!(result.document_name, "contract.txt");
        assert_eq!(result.hash_type, HashType::Sha256);
        assert_eq!(result.signer.identity_code, TEST_IDENTITY_CODE);

        let requests = connector.signature_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].hash, info.hash_to_sign.to_base64());
        assert_eq!(requests[0].display_text.as_deref(), Some("Sign document?"));
    }

    #[tokio::test]
    async fn test_signature_by_other_key_is_rejected() {
        // the certificate query returns one key, the phone signs with another
        let other = TestSigner::new(KeyKind::Ec);
        let hash = HashToSign::of_data(HashType::Sha256, b"I agree");
        let connector = Arc::new(
            StubConnector::new()
                .with_signer(TestSigner::new(KeyKind::Ec))
                .with_status(other.signed_status(&hash)),
        );
        let service = service(connector);
        let info = session_info(&service);

        let error = service.sign(&info).await.unwrap_err();
        assert!(matches!(
            error,
            ServiceError::Operation(OperationError::ValidationFailed(errors))
                if errors == vec!["Signature verification failed".to_string()]
        ));
    }

    #[tokio::test]
    async fn test_not_a_client() {
        // no signer: the certificate query reports NOT_FOUND
        let service = service(Arc::new(StubConnector::completing_with(SessionResult::Ok)));
        let info = session_info(&service);

        let error = service.sign(&info).await.unwrap_err();
        assert!(matches!(
            error,
            ServiceError::Operation(OperationError::NotMidClient)
        ));
    }

    #[tokio::test]
    async fn test_user_cancelled() {
        let connector = Arc::new(
            StubConnector::completing_with(SessionResult::UserCancelled)
                .with_signer(TestSigner::new(KeyKind::Rsa)),
        );
        let service = service(connector);
        let info = session_info(&service);

        let error = service.sign(&info).await.unwrap_err();
        assert_eq!(error.to_string(), "User cancelled operation.");
    }
}
