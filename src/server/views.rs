//! Server-rendered pages.
//!
//! Every value coming from the user or from Mobile-ID is escaped before it is
//! written into the page.

use quick_xml::escape::escape;

use super::errors::FieldErrors;
use crate::models::{AuthenticationIdentity, SigningResult, UserRequest};

const TITLE: &str = "Mobile-ID demo";

/// Which of the two start forms was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Authentication,
    Signature,
}

fn layout(heading: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{TITLE}</title>
</head>
<body>
<h1>{heading}</h1>
{body}
<p><a href="/">Back to start</a></p>
</body>
</html>
"#
    )
}

fn field_error(errors: Option<&FieldErrors>, field: &str) -> String {
    errors
        .and_then(|errors| errors.first(field))
        .map(|message| format!(r#"<p class="error">{}</p>"#, escape(message)))
        .unwrap_or_default()
}

fn identity_fields(request: Option<&UserRequest>, errors: Option<&FieldErrors>) -> String {
    let national_identity_number = request
        .map(|r| escape(r.national_identity_number.as_str()).into_owned())
        .unwrap_or_default();
    let phone_number = request
        .map(|r| escape(r.phone_number.as_str()).into_owned())
        .unwrap_or_else(|| "+372".to_string());

    format!(
        r#"<label>National identity number
<input type="text" name="nationalIdentityNumber" value="{national_identity_number}">
</label>
{nin_error}
<label>Phone number
<input type="text" name="phoneNumber" value="{phone_number}">
</label>
{phone_error}"#,
        nin_error = field_error(errors, "nationalIdentityNumber"),
        phone_error = field_error(errors, "phoneNumber"),
    )
}

/// Start page with the authentication and the signing forms.
///
/// A rejected submission is shown again with its values and field messages.
pub fn index(rejected: Option<(FormKind, &UserRequest, &FieldErrors)>) -> String {
    let submitted = |kind: FormKind| {
        rejected
            .filter(|(form, _, _)| *form == kind)
            .map(|(_, request, errors)| (request, errors))
    };
    let authentication = submitted(FormKind::Authentication);
    let signature = submitted(FormKind::Signature);

    let body = format!(
        r#"<h2>Authenticate</h2>
<form method="post" action="/authenticationRequest">
{authentication_fields}
<button type="submit">Authenticate</button>
</form>
<h2>Sign a document</h2>
<form method="post" action="/signatureRequest" enctype="multipart/form-data">
{signature_fields}
<label>Document
<input type="file" name="file">
</label>
{file_error}
<button type="submit">Sign</button>
</form>"#,
        authentication_fields = identity_fields(
            authentication.map(|(request, _)| request),
            authentication.map(|(_, errors)| errors),
        ),
        signature_fields = identity_fields(
            signature.map(|(request, _)| request),
            signature.map(|(_, errors)| errors),
        ),
        file_error = field_error(signature.map(|(_, errors)| errors), "file"),
    );
    layout(TITLE, &body)
}

fn verification_code_page(heading: &str, code: &str, action: &str, pin: &str) -> String {
    let body = format!(
        r#"<p>Make sure the verification code matches the one on your phone screen and enter your Mobile-ID {pin}.</p>
<p>Verification code: <strong id="verification-code">{code}</strong></p>
<form method="post" action="{action}">
<button type="submit">Continue</button>
</form>"#,
        code = escape(code),
    );
    layout(heading, &body)
}

pub fn authentication(verification_code: &str) -> String {
    verification_code_page(
        "Authentication",
        verification_code,
        "/authenticate",
        "PIN1",
    )
}

pub fn signature(verification_code: &str) -> String {
    verification_code_page("Signing", verification_code, "/sign", "PIN2")
}

fn identity_rows(identity: &AuthenticationIdentity) -> String {
    format!(
        r#"<tr><th>Given name</th><td>{}</td></tr>
<tr><th>Surname</th><td>{}</td></tr>
<tr><th>Identity code</th><td>{}</td></tr>
<tr><th>Country</th><td>{}</td></tr>"#,
        escape(identity.given_name.as_str()),
        escape(identity.surname.as_str()),
        escape(identity.identity_code.as_str()),
        escape(identity.country.as_str()),
    )
}

pub fn authentication_result(identity: &AuthenticationIdentity) -> String {
    let body = format!(
        "<p>Authentication successful</p>\n<table>\n{}\n</table>",
        identity_rows(identity)
    );
    layout("Authentication result", &body)
}

pub fn signing_result(result: &SigningResult) -> String {
    let body = format!(
        r#"<p>{result}</p>
<table>
<tr><th>Document</th><td>{document}</td></tr>
<tr><th>Signed at</th><td>{timestamp}</td></tr>
<tr><th>Valid</th><td>{valid}</td></tr>
<tr><th>Hash type</th><td>{hash_type}</td></tr>
<tr><th>Signature</th><td><code>{signature}</code></td></tr>
{signer}
</table>"#,
        result = escape(result.result.as_str()),
        document = escape(result.document_name.as_str()),
        timestamp = result.timestamp.to_rfc3339(),
        valid = result.valid,
        hash_type = result.hash_type,
        signature = escape(result.signature_value.as_str()),
        signer = identity_rows(&result.signer),
    );
    layout("Signing result", &body)
}

pub fn operation_error(message: &str) -> String {
    let body = format!(r#"<p class="error">{}</p>"#, escape(message));
    layout("Operation failed", &body)
}

pub fn error() -> String {
    layout(
        "Error",
        "<p>Something went wrong. Please try again later.</p>",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_escaped() {
        let request = UserRequest::new("<script>", "+372\"5");
        let mut errors = FieldErrors::default();
        errors.add("nationalIdentityNumber", "bad <value>");

        let page = index(Some((FormKind::Authentication, &request, &errors)));

        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
        assert!(page.contains("+372&quot;5"));
        assert!(page.contains("bad &lt;value&gt;"));
    }

    #[test]
    fn test_rejected_form_only_fills_its_own_fields() {
        let request = UserRequest::new("60001019906", "+37200000766");
        let errors = FieldErrors::default();

        let page = index(Some((FormKind::Signature, &request, &errors)));

        assert_eq!(page.matches("value=\"60001019906\"").count(), 1);
        assert_eq!(page.matches("value=\"+372\"").count(), 1);
    }

    #[test]
    fn test_verification_code_page() {
        let page = authentication("0129");
        assert!(page.contains(r#"<strong id="verification-code">0129</strong>"#));
        assert!(page.contains(r#"action="/authenticate""#));

        let page = signature("8191");
        assert!(page.contains("8191"));
        assert!(page.contains(r#"action="/sign""#));
    }

    #[test]
    fn test_operation_error_page() {
        let page = operation_error("User didn't type in PIN in time.");
        assert!(page.contains("User didn&apos;t type in PIN in time."));
    }
}
