//! HTTP client for the dictionary API and the view logic built on it.
//!
//! One [`ApiClient`] is configured with the server's base URL and, when the
//! user is signed in, the `signed_request` value forwarded on every call.

pub mod edit;
pub mod views;

use crate::models::{
    Envelope, NewSentence, NewWord, PopulatedWord, SearchPage, Sentence, SentenceUpdate, Word,
    WordUpdate,
};
use crate::search::SearchMode;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

pub const SIGNED_REQUEST_HEADER: &str = "signed_request";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status or `success: false`.
    #[error("API error ({status}): {result}")]
    Api { status: StatusCode, result: Value },

    #[error("Could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("This user cannot make edits")]
    PermissionDenied,

    #[error("Invalid form: {0}")]
    InvalidForm(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// Privilege levels, ordered; editing needs at least [`UserRole::Editor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UserRole {
    Viewer,
    Editor,
    Admin,
}

impl UserRole {
    pub fn can_edit(self) -> bool {
        self >= UserRole::Editor
    }
}

/// Parameters for the search endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
    pub search_fields: Vec<String>,
    pub fields: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SearchRequest {
    pub fn contains(query: impl Into<String>) -> Self {
        SearchRequest {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn in_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("query", self.query.clone()),
            ("mode", self.mode.as_str().to_string()),
        ];
        if !self.search_fields.is_empty() {
            pairs.push(("searchFields", self.search_fields.join(",")));
        }
        if !self.fields.is_empty() {
            pairs.push(("fields", self.fields.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    signed_request: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        ApiClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            signed_request: None,
        }
    }

    /// Forward `value` as the `signed_request` header on every call.
    pub fn signed_request(mut self, value: impl Into<String>) -> Self {
        self.signed_request = Some(value.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match &self.signed_request {
            Some(value) => builder.header(SIGNED_REQUEST_HEADER, value),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Envelope<Value>, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let envelope: Envelope<Value> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                let result = Value::String(String::from_utf8_lossy(&bytes).into_owned());
                return Err(ClientError::Api { status, result });
            }
            Err(e) => return Err(e.into()),
        };

        if !status.is_success() || !envelope.success {
            tracing::debug!(%status, result = %envelope.result, "api call failed");
            return Err(ClientError::Api {
                status,
                result: envelope.result,
            });
        }
        Ok(envelope)
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let envelope = self.send(builder).await?;
        Ok(serde_json::from_value(envelope.result)?)
    }

    async fn call_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.call(self.request(method, path).json(body)).await
    }

    async fn search<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &SearchRequest,
    ) -> Result<SearchPage<T>, ClientError> {
        let envelope = self
            .send(self.request(Method::GET, path).query(&request.to_query()))
            .await?;
        Ok(SearchPage {
            result: serde_json::from_value(envelope.result)?,
            total: envelope.total.unwrap_or_default(),
        })
    }

    // Words

    pub async fn get_word(&self, id: &str) -> Result<Word, ClientError> {
        self.call(self.request(Method::GET, &format!("/api/word/{id}")))
            .await
    }

    pub async fn get_populated_word(&self, id: &str) -> Result<PopulatedWord, ClientError> {
        self.call(
            self.request(Method::GET, &format!("/api/word/{id}"))
                .query(&[("populate", "true")]),
        )
        .await
    }

    pub async fn create_word(&self, word: &NewWord) -> Result<Word, ClientError> {
        self.call_json(Method::POST, "/api/word", word).await
    }

    pub async fn update_word(&self, id: &str, update: &WordUpdate) -> Result<Word, ClientError> {
        self.call_json(Method::PUT, &format!("/api/word/{id}"), update)
            .await
    }

    pub async fn delete_word(&self, id: &str) -> Result<Word, ClientError> {
        self.call(self.request(Method::DELETE, &format!("/api/word/{id}")))
            .await
    }

    pub async fn random_word(&self) -> Result<Word, ClientError> {
        self.call(self.request(Method::GET, "/api/word/random"))
            .await
    }

    pub async fn add_related_word(&self, id: &str, related: &str) -> Result<Word, ClientError> {
        self.call_json(
            Method::POST,
            &format!("/api/word/{id}/related"),
            &json!({ "word": related }),
        )
        .await
    }

    pub async fn attach_sentence(&self, id: &str, sentence: &str) -> Result<Word, ClientError> {
        self.call_json(
            Method::POST,
            &format!("/api/word/{id}/sentence"),
            &json!({ "sentence": sentence }),
        )
        .await
    }

    pub async fn search_words(&self, request: &SearchRequest) -> Result<SearchPage<Word>, ClientError> {
        self.search("/api/search/word", request).await
    }

    // Sentences

    pub async fn get_sentence(&self, id: &str) -> Result<Sentence, ClientError> {
        self.call(self.request(Method::GET, &format!("/api/sentence/{id}")))
            .await
    }

    pub async fn create_sentence(&self, sentence: &NewSentence) -> Result<Sentence, ClientError> {
        self.call_json(Method::POST, "/api/sentence", sentence)
            .await
    }

    pub async fn update_sentence(
        &self,
        id: &str,
        update: &SentenceUpdate,
    ) -> Result<Sentence, ClientError> {
        self.call_json(Method::PUT, &format!("/api/sentence/{id}"), update)
            .await
    }

    pub async fn delete_sentence(&self, id: &str) -> Result<Sentence, ClientError> {
        self.call(self.request(Method::DELETE, &format!("/api/sentence/{id}")))
            .await
    }

    pub async fn random_sentence(&self) -> Result<Sentence, ClientError> {
        self.call(self.request(Method::GET, "/api/sentence/random"))
            .await
    }

    pub async fn search_sentences(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchPage<Sentence>, ClientError> {
        self.search("/api/search/sentence", request).await
    }
}
