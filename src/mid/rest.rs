use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

use super::{
    AuthenticationRequest, CertificateRequest, MidConnector, MidError, SessionKind, SessionStatus,
    SignatureRequest,
};
use crate::config::MidConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Extra time granted on top of the long polling timeout before giving up on a response.
const READ_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Relying party credentials sent with every request.
#[derive(Serialize)]
struct RelyingPartyRequest<'a, T: Serialize> {
    #[serde(rename = "relyingPartyUUID")]
    relying_party_uuid: &'a str,
    #[serde(rename = "relyingPartyName")]
    relying_party_name: &'a str,
    #[serde(flatten)]
    request: &'a T,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(rename = "sessionID")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum CertificateResult {
    Ok,
    NotFound,
    NotActive,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct CertificateResponse {
    result: CertificateResult,
    #[serde(default)]
    cert: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Client of the Mobile-ID REST API.
#[derive(Clone)]
pub struct MidRestConnector {
    client: Client,
    host_url: String,
    relying_party_uuid: SecretString,
    relying_party_name: String,
}

impl MidRestConnector {
    pub fn new(
        host_url: impl Into<String>,
        relying_party_uuid: SecretString,
        relying_party_name: impl Into<String>,
    ) -> Result<Self, MidError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        let host_url = host_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            host_url,
            relying_party_uuid,
            relying_party_name: relying_party_name.into(),
        })
    }

    pub fn from_config(config: &MidConfig) -> Result<Self, MidError> {
        Self::new(
            &config.host_url,
            config.relying_party_uuid.clone(),
            &config.relying_party_name,
        )
    }

    async fn post<T, R>(&self, path: &str, request: &T) -> Result<R, MidError>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let body = RelyingPartyRequest {
            relying_party_uuid: self.relying_party_uuid.expose_secret(),
            relying_party_name: &self.relying_party_name,
            request,
        };
        let response = self
            .client
            .post(format!("{}{path}", self.host_url))
            .json(&body)
            .send()
            .await?;
        handle_response(path, response).await
    }
}

async fn handle_response<R: DeserializeOwned>(path: &str, response: Response) -> Result<R, MidError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(%status, %body, "Mobile-ID request to {path} failed");
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body);

    Err(match status {
        StatusCode::BAD_REQUEST => MidError::InvalidParameter(message),
        StatusCode::UNAUTHORIZED => MidError::Unauthorized,
        StatusCode::NOT_FOUND => MidError::SessionNotFound(path.to_string()),
        s if s.is_server_error() => MidError::Internal(message),
        s => MidError::UnexpectedResponse(format!("HTTP {s}: {message}")),
    })
}

#[async_trait]
impl MidConnector for MidRestConnector {
    #[instrument(skip_all)]
    async fn authenticate(&self, request: AuthenticationRequest) -> Result<String, MidError> {
        let response: SessionResponse = self.post("/authentication", &request).await?;
        debug!(session_id = %response.session_id, "Authentication session started");
        Ok(response.session_id)
    }

    #[instrument(skip_all)]
    async fn sign(&self, request: SignatureRequest) -> Result<String, MidError> {
        let response: SessionResponse = self.post("/signature", &request).await?;
        debug!(session_id = %response.session_id, "Signature session started");
        Ok(response.session_id)
    }

    #[instrument(skip_all)]
    async fn get_certificate(&self, request: CertificateRequest) -> Result<Vec<u8>, MidError> {
        let response: CertificateResponse = self.post("/certificate", &request).await?;
        match (response.result, response.cert) {
            (CertificateResult::Ok, Some(cert)) => Ok(STANDARD.decode(cert)?),
            (CertificateResult::Ok, None) => Err(MidError::UnexpectedResponse(
                "certificate missing from response".into(),
            )),
            (CertificateResult::NotFound | CertificateResult::NotActive, _) => {
                Err(MidError::NotMidClient)
            }
            (CertificateResult::Unknown, _) => {
                warn!("Unknown certificate query result");
                Err(MidError::UnexpectedResponse(
                    "unknown certificate result".into(),
                ))
            }
        }
    }

    #[instrument(skip(self, long_poll_timeout))]
    async fn get_session_status(
        &self,
        kind: SessionKind,
        session_id: &str,
        long_poll_timeout: Duration,
    ) -> Result<SessionStatus, MidError> {
        let path = format!("/{}/session/{session_id}", kind.path_segment());
        let response = self
            .client
            .get(format!("{}{path}", self.host_url))
            .query(&[("timeoutMs", long_poll_timeout.as_millis().to_string())])
            .timeout(long_poll_timeout + READ_TIMEOUT_MARGIN)
            .send()
            .await?;
        handle_response(&path, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mid::{DisplayTextFormat, HashType, Language, SessionResult, SessionState};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connector(server: &MockServer) -> MidRestConnector {
        MidRestConnector::new(
            format!("{}/mid-api/", server.uri()),
            SecretString::from("00000000-0000-0000-0000-000000000000".to_string()),
            "DEMO",
        )
        .unwrap()
    }

    fn authentication_request() -> AuthenticationRequest {
        AuthenticationRequest {
            phone_number: "+37200000766".into(),
            national_identity_number: "60001019906".into(),
            hash: STANDARD.encode([0u8; 32]),
            hash_type: HashType::Sha256,
            language: Language::Eng,
            display_text: Some("Log in?".into()),
            display_text_format: DisplayTextFormat::Gsm7,
        }
    }

    #[tokio::test]
    async fn test_authenticate_sends_relying_party() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mid-api/authentication"))
            .and(body_partial_json(json!({
                "relyingPartyUUID": "00000000-0000-0000-0000-000000000000",
                "relyingPartyName": "DEMO",
                "phoneNumber": "+37200000766",
                "nationalIdentityNumber": "60001019906",
                "hashType": "SHA256",
                "displayText": "Log in?",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sessionID": "abc-123"})))
            .expect(1)
            .mount(&server)
            .await;

        let session_id = connector(&server)
            .authenticate(authentication_request())
            .await
            .unwrap();
        assert_eq!(session_id, "abc-123");
    }

    #[tokio::test]
    async fn test_session_status_long_polls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mid-api/signature/session/abc-123"))
            .and(query_param("timeoutMs", "1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "state": "COMPLETE",
                "result": "USER_CANCELLED",
            })))
            .mount(&server)
            .await;

        let status = connector(&server)
            .get_signature_session_status("abc-123", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(status.state, SessionState::Complete);
        assert_eq!(status.result, Some(SessionResult::UserCancelled));
    }

    #[tokio::test]
    async fn test_http_errors_are_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mid-api/authentication"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "phoneNumber invalid"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/mid-api/signature"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mid-api/authentication/session/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mid-api/authentication/session/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let connector = connector(&server);

        let error = connector
            .authenticate(authentication_request())
            .await
            .unwrap_err();
        assert!(matches!(error, MidError::InvalidParameter(m) if m == "phoneNumber invalid"));

        let request = authentication_request();
        let error = connector
            .sign(SignatureRequest {
                phone_number: request.phone_number,
                national_identity_number: request.national_identity_number,
                hash: request.hash,
                hash_type: request.hash_type,
                language: request.language,
                display_text: None,
                display_text_format: request.display_text_format,
            })
            .await
            .unwrap_err();
        assert!(matches!(error, MidError::Unauthorized));

        let error = connector
            .get_authentication_session_status("gone", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(error, MidError::SessionNotFound(_)));

        let error = connector
            .get_session_status(SessionKind::Authentication, "broken", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(error, MidError::Internal(m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_certificate_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mid-api/certificate"))
            .and(body_partial_json(json!({"nationalIdentityNumber": "60001019906"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "OK",
                "cert": STANDARD.encode(b"der bytes"),
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/mid-api/certificate"))
            .and(body_partial_json(json!({"nationalIdentityNumber": "60001019928"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "NOT_FOUND"})))
            .mount(&server)
            .await;

        let connector = connector(&server);
        let certificate = connector
            .get_certificate(CertificateRequest {
                phone_number: "+37200000766".into(),
                national_identity_number: "60001019906".into(),
            })
            .await
            .unwrap();
        assert_eq!(certificate, b"der bytes");

        let error = connector
            .get_certificate(CertificateRequest {
                phone_number: "+37200000266".into(),
                national_identity_number: "60001019928".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(error, MidError::NotMidClient));
    }
}
