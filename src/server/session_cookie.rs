use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};

use crate::session::BrowserSession;

pub const SESSION_COOKIE: &str = "MIDDEMO_SESSION";

/// Attaches the caller's [`BrowserSession`] to the request extensions.
///
/// A new session id is issued through `Set-Cookie` when the request carries
/// none or an invalid one.
pub async fn browser_session(mut request: Request, next: Next) -> Response {
    let (session, issued) = match read_session(request.headers()) {
        Some(session) => (session, false),
        None => (BrowserSession::generate(), true),
    };
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;
    if issued {
        let cookie = format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly; SameSite=Lax");
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                tracing::debug!(%session, "Issued browser session");
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Invalid session cookie: {e}"),
        }
    }
    response
}

fn read_session(headers: &HeaderMap) -> Option<BrowserSession> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| BrowserSession::parse(value))
}
