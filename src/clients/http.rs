use std::collections::HashMap;
use std::future::Future;

use log::debug;
use serde_json::Value;

use crate::clients::errors::Result;

/// Header name to value, the same shape `rspotify::Credentials::auth_headers` returns
pub type Headers = HashMap<String, String>;

/// Query parameters appended to a GET request
pub type Query<'a> = [(&'a str, String)];

/// A parsed HTTP response: status code plus JSON body (`Null` when empty)
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Parsed body, a JSON string when the body was not JSON
    pub body: Value,
}

impl ApiResponse {
    /// Builds a response from its parts
    pub fn new(status: u16, body: Value) -> Self {
        ApiResponse { status, body }
    }

    /// Any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Payload of a POST request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/json`
    Json(Value),
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

/// Generic request/response capability the Spotify calls are made through.
///
/// Implementations report non-success statuses as a normal `ApiResponse`;
/// only failures to get any response at all are errors.
pub trait Transport {
    /// GET `url` with `query` appended
    fn get(
        &self,
        url: &str,
        headers: &Headers,
        query: &Query<'_>,
    ) -> impl Future<Output = Result<ApiResponse>>;

    /// POST `body` to `url`
    fn post(
        &self,
        url: &str,
        headers: &Headers,
        body: &RequestBody,
    ) -> impl Future<Output = Result<ApiResponse>>;
}

/// `reqwest` backed transport used by the binary
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    async fn read(response: reqwest::Response) -> Result<ApiResponse> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            // Error pages are not always JSON, keep them readable
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(ApiResponse { status, body })
    }
}

impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &Headers, query: &Query<'_>) -> Result<ApiResponse> {
        debug!("GET {url} {query:?}");
        let mut request = self.client.get(url).query(query);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        Self::read(request.send().await?).await
    }

    async fn post(&self, url: &str, headers: &Headers, body: &RequestBody) -> Result<ApiResponse> {
        debug!("POST {url}");
        let mut request = self.client.post(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        request = match body {
            RequestBody::Json(json) => request.json(json),
            RequestBody::Form(pairs) => request.form(pairs),
        };
        Self::read(request.send().await?).await
    }
}
