//! Wire protocol of the assistant backend.
//!
//! `Backend` is the seam the request channel calls through; `HttpBackend`
//! speaks the real endpoints:
//!
//! - `POST /chat`     JSON `{message, language}` -> `{answer}`
//! - `POST /diagnose` multipart `file`          -> `{disease_report}`
//! - `POST /upload`   multipart `file`          -> `{message}`

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use kalpataru_core::types::LanguageTag;

use crate::attachment::Attachment;
use crate::error::RequestError;

/// Body of a `/chat` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub language: LanguageTag,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    answer: String,
}

#[derive(Debug, Deserialize)]
struct DiagnoseResponse {
    disease_report: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    message: String,
}

/// The three operations the assistant backend offers.
///
/// Each returns the human-readable text to show as a bot turn.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<String, RequestError>;

    async fn diagnose(&self, image: &Attachment) -> Result<String, RequestError>;

    async fn upload(&self, file: &Attachment) -> Result<String, RequestError>;
}

/// reqwest-based [`Backend`] talking to `base_url`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RequestError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kalpataru/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RequestError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn file_form(file: &Attachment) -> Result<Form, RequestError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| RequestError::Transport(format!("invalid MIME type: {}", e)))?;
        Ok(Form::new().part("file", part))
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RequestError> {
        let status = response.status();
        if !status.is_success() {
            return Err(RequestError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| RequestError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<String, RequestError> {
        let response = self
            .client
            .post(self.endpoint("chat"))
            .json(request)
            .send()
            .await?;
        let body: ChatResponse = Self::read_json(response).await?;
        Ok(body.answer)
    }

    async fn diagnose(&self, image: &Attachment) -> Result<String, RequestError> {
        let response = self
            .client
            .post(self.endpoint("diagnose"))
            .multipart(Self::file_form(image)?)
            .send()
            .await?;
        let body: DiagnoseResponse = Self::read_json(response).await?;
        Ok(body.disease_report)
    }

    async fn upload(&self, file: &Attachment) -> Result<String, RequestError> {
        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(Self::file_form(file)?)
            .send()
            .await?;
        let body: UploadResponse = Self::read_json(response).await?;
        Ok(body.message)
    }
}
