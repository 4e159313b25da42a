//! Single outbound HTTP requests with provider-specific encodings.
//!
//! Every provider strategy goes through [`HttpTransport`]. It never retries;
//! it turns network failures and non-success statuses into
//! [`GenerationError`] values the rest of the crate can match on.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::Value;

use crate::error::{is_content_policy_message, is_quota_message, GenerationError};

/// Default timeout for HTTP requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for binary downloads, which can be large videos.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Statuses whose provider message describes a problem with the request.
const INVALID_INPUT_STATUSES: &[u16] = &[400, 404, 413, 415, 422];

/// One field of a multipart form body.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn text(name: &str, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.to_string(),
            value: value.into(),
        }
    }

    pub fn file(name: &str, file_name: &str, mime: &str, bytes: Vec<u8>) -> Self {
        FormPart::File {
            name: name.to_string(),
            file_name: file_name.to_string(),
            mime: mime.to_string(),
            bytes,
        }
    }
}

/// Body encoding of a request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<FormPart>),
}

/// Everything needed to perform one HTTP call.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RequestDescriptor {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }
}

/// Status and parsed body of a response, whatever the status was.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Value,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Convert a non-success reply into the matching error.
    pub fn into_result(self) -> Result<Value, GenerationError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(classify_status(self.status, &self.body))
        }
    }
}

/// Pull the human-readable message out of a provider error body.
///
/// Providers use `detail` (string or list of `{msg}`), `error` (string or
/// `{message}`) or a top-level `message`.
pub fn provider_message(body: &Value) -> Option<String> {
    let detail = match body.get("detail") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    };

    detail
        .or_else(|| match body.get("error") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(obj)) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .or_else(|| body.get("message").and_then(Value::as_str).map(str::to_string))
        .or_else(|| body.as_str().map(str::to_string))
        .filter(|message| !message.trim().is_empty())
}

/// Map a non-success status and body onto the error taxonomy.
pub fn classify_status(status: u16, body: &Value) -> GenerationError {
    let message = provider_message(body);

    match message {
        Some(message) if is_quota_message(&message) => {
            log::warn!("Provider reported exhausted quota: {}", message);
            GenerationError::QuotaExhausted { message }
        }
        Some(message)
            if (status == 400 || status == 403) && is_content_policy_message(&message) =>
        {
            log::warn!("Prompt rejected by content policy: {}", message);
            GenerationError::InvalidInput(message)
        }
        Some(message) if INVALID_INPUT_STATUSES.contains(&status) => {
            GenerationError::InvalidInput(message)
        }
        Some(message) => GenerationError::ProviderUnavailable {
            status: Some(status),
            message: format!("Request failed with status {}: {}", status, message),
        },
        None => GenerationError::ProviderUnavailable {
            status: Some(status),
            message: format!("Request failed with status {}", status),
        },
    }
}

/// Performs one HTTP call per method invocation.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { http_client })
    }

    /// Send and parse, converting non-success statuses into errors.
    pub async fn send(&self, descriptor: RequestDescriptor) -> Result<Value, GenerationError> {
        self.execute(descriptor).await?.into_result()
    }

    /// Send and parse without judging the status.
    ///
    /// Only a network-level failure is an error here.
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<HttpReply, GenerationError> {
        let method = descriptor.method.clone();
        let url = descriptor.url.clone();
        let response = self.build(descriptor)?.send().await.map_err(|e| {
            log::error!("{} {} failed: {}", method, url, e);
            GenerationError::unavailable(format!("Request to {} failed: {}", url, e))
        })?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        log::debug!("{} {} -> {}", method, url, status);

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(HttpReply { status, body })
    }

    /// Download a binary body.
    pub async fn fetch_bytes(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Vec<u8>, GenerationError> {
        let mut request = self.http_client.get(url).timeout(DOWNLOAD_TIMEOUT);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            GenerationError::unavailable(format!("Download from {} failed: {}", url, e))
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &Value::String(text)));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Open a response whose body the caller will consume incrementally.
    pub async fn open_stream(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<reqwest::Response, GenerationError> {
        let url = descriptor.url.clone();
        let response = self.build(descriptor)?.send().await.map_err(|e| {
            GenerationError::unavailable(format!("Request to {} failed: {}", url, e))
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
            return Err(classify_status(status, &body));
        }

        Ok(response)
    }

    fn build(&self, descriptor: RequestDescriptor) -> Result<reqwest::RequestBuilder, GenerationError> {
        let mut request = self
            .http_client
            .request(descriptor.method, &descriptor.url);

        for (name, value) in &descriptor.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !descriptor.query.is_empty() {
            request = request.query(&descriptor.query);
        }

        request = match descriptor.body {
            RequestBody::Empty => request,
            RequestBody::Json(body) => request.json(&body),
            RequestBody::Multipart(parts) => request.multipart(build_form(parts)?),
        };

        Ok(request)
    }
}

fn build_form(parts: Vec<FormPart>) -> Result<Form, GenerationError> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name, value),
            FormPart::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let part = Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&mime)
                    .map_err(|e| GenerationError::InvalidInput(format!("Bad MIME type: {}", e)))?;
                form.part(name, part)
            }
        };
    }
    Ok(form)
}
