#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use mid_demo::{
    config::Config,
    mid::{ResponseValidator, testing::StubConnector},
    server::{AppState, Server, session_cookie::SESSION_COOKIE},
    session::MemoryStore,
    telemetry,
};
use reqwest::{Client, Response, header};

pub struct TestApp {
    pub address: String,
    pub connector: Arc<StubConnector>,
    client: Client,
}

// Spawns the server on a random port, talking to the given connector
pub async fn spawn_app(connector: StubConnector) -> TestApp {
    telemetry::init_tracing();

    let config = Config::load_with_sources(Some(HashMap::from([
        ("server.host".to_string(), "127.0.0.1".to_string()),
        ("server.port".to_string(), "0".to_string()),
        ("server.max_upload_bytes".to_string(), "1024".to_string()),
        ("mid.poll_interval_ms".to_string(), "10".to_string()),
    ])))
    .unwrap();

    let connector = Arc::new(connector);
    let state = AppState::new(
        connector.clone(),
        Arc::new(MemoryStore::new()),
        ResponseValidator::default(),
        &config,
    );

    let server = Server::new(state, &config.server).await.unwrap();
    let port = server.port().unwrap();
    tokio::spawn(async move {
        server.run().await.expect("failed to run server");
    });

    TestApp {
        address: format!("http://127.0.0.1:{port}"),
        connector,
        client: Client::new(),
    }
}

impl TestApp {
    /// Opens the start page and returns the session cookie it issued.
    pub async fn start_session(&self) -> String {
        let response = self
            .client
            .get(format!("{}/", self.address))
            .send()
            .await
            .unwrap();
        session_cookie(&response).expect("no session cookie issued")
    }

    pub async fn post_form(&self, path: &str, cookie: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(format!("{}{path}", self.address))
            .header(header::COOKIE, cookie)
            .form(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        cookie: &str,
        form: reqwest::multipart::Form,
    ) -> Response {
        self.client
            .post(format!("{}{path}", self.address))
            .header(header::COOKIE, cookie)
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, path: &str, cookie: &str) -> Response {
        self.client
            .post(format!("{}{path}", self.address))
            .header(header::COOKIE, cookie)
            .send()
            .await
            .unwrap()
    }
}

/// The `name=value` part of the session cookie set by a response.
pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .find(|pair| pair.starts_with(&format!("{SESSION_COOKIE}=")))
        .map(str::to_owned)
}

/// Extracts the verification code shown on the confirmation page.
pub fn verification_code(page: &str) -> String {
    let start = page
        .find(r#"<strong id="verification-code">"#)
        .expect("no verification code on page")
        + r#"<strong id="verification-code">"#.len();
    page[start..start + 4].to_string()
}
