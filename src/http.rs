//! HTTP client for the support API, plus the JSON documents the console prints

use std::collections::HashSet;

use rand::Rng;
use rand::distr::Alphanumeric;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::ClientError;
use crate::models::{Envelope, Page};

/// Thin wrapper over `reqwest::Client`: fixed base URL, JSON headers, optional bearer token.
/// No retries, no backoff.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()?;

        Ok(ApiClient {
            base_url: settings.base_url.clone(),
            token: settings.token.clone(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if is_absolute(path) {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// The bearer token only goes to paths under the base URL.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.token {
            Some(token) if !is_absolute(path) => builder.bearer_auth(token),
            _ => builder,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ClientError> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<Envelope<T>, ClientError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<Envelope<T>, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    /// POST that hands back the raw JSON body; `/admin/verify` puts the token outside the envelope.
    pub async fn post_json_raw<B>(&self, path: &str, body: &B) -> Result<Value, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let text = self.send_raw(self.request(Method::POST, path).json(body)).await?;
        if text.trim().is_empty() {
            return Ok(json!({}));
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn put_json<T, B>(&self, path: &str, body: &B) -> Result<Envelope<T>, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, ClientError> {
        self.send(self.request(Method::DELETE, path)).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<Envelope<T>, ClientError> {
        self.send(self.request(Method::POST, path).multipart(form)).await
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Envelope<T>, ClientError> {
        let text = self.send_raw(builder).await?;
        if text.trim().is_empty() {
            // 204-style answers carry no envelope; the status code already said success
            return Ok(Envelope { status: "success".to_string(), message: None, data: None, error: None });
        }
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(format!("{}: {}", e, truncate(&text, 200))))
    }

    /// Sends the request and turns any non-2xx answer into `ClientError::Api`.
    async fn send_raw(&self, builder: RequestBuilder) -> Result<String, ClientError> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending request");

        let response = self.http.execute(request).await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%method, %url, status = status.as_u16(), "response received");

        if status.is_success() {
            return Ok(text);
        }

        let message = serde_json::from_str::<Envelope<Value>>(&text)
            .ok()
            .and_then(|env| env.failure_text())
            .or_else(|| status.canonical_reason().map(|r| r.to_string()))
            .unwrap_or_default();

        Err(ClientError::Api { status: status.as_u16(), message })
    }

    /// Rewrites an absolute pagination URL from the server into a path under the base URL.
    /// The server sometimes links with `http://` even when the base is `https://`.
    /// Links anywhere else give `None` and are not followed.
    pub fn relative_path(&self, url: &str) -> Option<String> {
        if !is_absolute(url) {
            return Some(if url.starts_with('/') { url.to_string() } else { format!("/{}", url) });
        }

        let plain_http = self.base_url.replacen("https://", "http://", 1);
        let rest = url
            .strip_prefix(self.base_url.as_str())
            .or_else(|| url.strip_prefix(plain_http.as_str()));

        match rest {
            Some("") => Some("/".to_string()),
            Some(rest) if rest.starts_with('/') || rest.starts_with('?') => {
                Some(format!("/{}", rest.trim_start_matches('/')))
            }
            _ => {
                warn!(%url, "pagination link leaves the API, not following");
                None
            }
        }
    }

    /// Follows `next_page_url` from `first_path` until the server stops linking,
    /// returning each page's `data` in order.
    pub async fn collect_pages<T: DeserializeOwned>(&self, first_path: &str) -> Result<Vec<T>, ClientError> {
        let mut pages = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(first_path.to_string());

        while let Some(path) = next.take() {
            if !seen.insert(path.clone()) {
                debug!(%path, "pagination loops back on itself, stopping");
                break;
            }
            let page: Page<T> = self.get(&path).await?.into_data()?;
            next = page.next_page_url().and_then(|u| self.relative_path(u));
            pages.push(page.data);
        }

        Ok(pages)
    }
}

impl<T> Envelope<T> {
    /// Fails unless the server reported `status: "success"`.
    pub fn ensure_success(self) -> Result<Self, ClientError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::Api {
                status: 200,
                message: self.failure_text().unwrap_or_else(|| "The request was not successful".to_string()),
            })
        }
    }

    pub fn into_data(self) -> Result<T, ClientError> {
        self.ensure_success()?
            .data
            .ok_or_else(|| ClientError::Decode("response carried no data".to_string()))
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Build an error document with consistent formatting
pub fn error_response(status: u16, error: &str, details: &str, suggestion: Option<&str>) -> Value {
    let mut body = json!({
        "status": status,
        "error": error,
        "details": details,
    });

    if let Some(suggestion) = suggestion {
        body["suggestion"] = json!(suggestion);
    }

    body
}

/// Render a `ClientError` the way the dashboard toasts did: the server's message when there is one.
pub fn error_from(err: &ClientError, fallback: &str) -> Value {
    let suggestion = match err {
        ClientError::Api { status: 401, .. } | ClientError::Api { status: 403, .. } => {
            Some("Log in again and export SUPPORT_API_TOKEN")
        }
        ClientError::Transport(_) => Some("Check SUPPORT_API_BASE_URL and your network connection"),
        _ => None,
    };
    error_response(err.status(), err.title(), &err.message_or(fallback), suggestion)
}

/// Build a successful document
pub fn success_response(message: &str, data: Value) -> Value {
    json!({
        "status": "success",
        "message": message,
        "data": data,
    })
}

pub fn generate_short_id(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ticket;
    use mockito::Matcher;

    fn client_for(base: &str) -> ApiClient {
        let settings = Settings::new(base, Some("tok-123".to_string()), 2, 5).unwrap();
        ApiClient::new(&settings).unwrap()
    }

    #[test]
    fn test_relative_path_strips_both_schemes() {
        let client = client_for("https://support.example.com/api/support");
        assert_eq!(
            client.relative_path("https://support.example.com/api/support/config/all?page=2").as_deref(),
            Some("/config/all?page=2")
        );
        assert_eq!(
            client.relative_path("http://support.example.com/api/support/messages/4/messages?page=3").as_deref(),
            Some("/messages/4/messages?page=3")
        );
        assert_eq!(client.relative_path("/tickets?page=2").as_deref(), Some("/tickets?page=2"));
    }

    #[test]
    fn test_relative_path_refuses_other_hosts() {
        let client = client_for("https://support.example.com/api/support");
        assert_eq!(client.relative_path("https://elsewhere.com/x"), None);
        assert_eq!(client.relative_path("https://support.example.com/api/supportive/x"), None);
        assert_eq!(client.relative_path("https://support.example.com.evil.io/api/support/x"), None);
    }

    #[test]
    fn test_error_response_format() {
        let body = error_response(400, "Bad Request", "Invalid input", Some("Check your request"));
        assert_eq!(body["error"], "Bad Request");
        assert_eq!(body["suggestion"], "Check your request");

        let without = error_response(500, "Oops", "details", None);
        assert!(without.get("suggestion").is_none());
    }

    #[test]
    fn test_generate_short_id() {
        let id = generate_short_id(8);
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_get_sends_bearer_and_decodes_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tickets")
            .match_header("authorization", "Bearer tok-123")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"success","message":"ok","data":{"data":[{"id":1,"session_status":"closed","updated_at":"2025-06-10 14:33:22"}]},"error":null}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let page: Page<Vec<Ticket>> = client.get("/tickets").await.unwrap().into_data().unwrap();
        assert_eq!(page.data.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_structured_error_message_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/config/update/app_name")
            .with_status(422)
            .with_body(r#"{"status":"error","message":"The config value field is required.","data":null,"error":null}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client
            .put_json::<Value, _>("/config/update/app_name", &json!({ "config_value": "" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Api { status: 422, ref message } if message == "The config value field is required."
        ));
    }

    #[tokio::test]
    async fn test_unstructured_error_falls_back_to_reason() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/faqs").with_status(500).with_body("<html>boom</html>").create_async().await;

        let client = client_for(&server.url());
        let err = client.get::<Value>("/faqs").await.unwrap_err();
        assert_eq!(err.message_or("Failed to load FAQs"), "Internal Server Error");
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/images")
            .with_status(200)
            .with_body(r#"{"status":"error","message":"","data":null,"error":"Storage offline"}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.get::<Value>("/images").await.unwrap().into_data().unwrap_err();
        assert_eq!(err.message_or("fallback"), "Storage offline");
    }

    #[tokio::test]
    async fn test_collect_pages_follows_absolute_links() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let first = server
            .mock("GET", "/config/all")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_body(
                json!({
                    "status": "success",
                    "data": { "data": { "app_name": "Support" }, "pagination": { "next_page_url": format!("{}/config/all?page=2", base) } }
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/config/all")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_body(r#"{"status":"success","data":{"data":{"version":"1.2"},"pagination":{"next_page_url":null}}}"#)
            .create_async()
            .await;

        let client = client_for(&base);
        let pages: Vec<Value> = client.collect_pages("/config/all?page=1").await.unwrap();
        assert_eq!(pages, vec![json!({ "app_name": "Support" }), json!({ "version": "1.2" })]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_collect_pages_stops_on_self_link() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let page = server
            .mock("GET", "/tickets")
            .with_status(200)
            .with_body(
                json!({
                    "status": "success",
                    "data": { "data": [1], "next_page_url": format!("{}/tickets", base) }
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&base);
        let pages: Vec<Vec<i64>> = client.collect_pages("/tickets").await.unwrap();
        assert_eq!(pages, vec![vec![1]]);
        page.assert_async().await;
    }

    #[tokio::test]
    async fn test_collect_pages_does_not_leave_the_api() {
        let mut api = mockito::Server::new_async().await;
        let mut elsewhere = mockito::Server::new_async().await;
        api.mock("GET", "/tickets")
            .with_status(200)
            .with_body(
                json!({
                    "status": "success",
                    "data": { "data": [1], "next_page_url": format!("{}/tickets?page=2", elsewhere.url()) }
                })
                .to_string(),
            )
            .create_async()
            .await;
        let off_site = elsewhere.mock("GET", Matcher::Any).expect(0).create_async().await;

        let client = client_for(&api.url());
        let pages: Vec<Vec<i64>> = client.collect_pages("/tickets").await.unwrap();
        assert_eq!(pages, vec![vec![1]]);
        off_site.assert_async().await;
    }

    #[tokio::test]
    async fn test_absolute_url_goes_without_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/files/report")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"status":"success","data":null}"#)
            .create_async()
            .await;

        let client = client_for(&format!("{}/api/support", server.url()));
        client.get::<Value>(&format!("{}/files/report", server.url())).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_truncated_success_body_is_an_error() {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"status\"")
                .unwrap();
        });

        let client = client_for(&format!("http://{}", addr));
        let err = client.delete::<Value>("/faqs/7").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        server.join().unwrap();
    }
}
