//! HTTP client for the extraction/matching/document service.
//!
//! One request per call and no retries: a failed call surfaces to the user,
//! who decides whether to trigger it again.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::document::DocumentModel;
use crate::gateway::{
    CandidateRecord, DocumentId, DocumentStatus, DocumentStore, ExtractionGateway, GatewayError,
    MatchReport, MatchingGateway, SourceFile, StoredDocument,
};
use crate::payload::{MatchPayload, SecondaryPayload};

/// Error bodies come as `{"error": "..."}` or FastAPI's `{"detail": ...}`.
#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<Value>,
}

impl ServiceError {
    fn message(self) -> Option<String> {
        self.error.or_else(|| {
            self.detail.map(|d| match d {
                Value::String(s) => s,
                other => other.to_string(),
            })
        })
    }
}

#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpGateway {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends the request and turns any non-success status into `GatewayError::Api`.
    async fn send(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Service returned {}: {}", status, body);
        let message = serde_json::from_str::<ServiceError>(&body)
            .ok()
            .and_then(ServiceError::message)
            .unwrap_or(body);
        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| GatewayError::Unexpected(e.to_string()))
    }
}

fn file_part(file: SourceFile) -> Result<Part, GatewayError> {
    let part = Part::bytes(file.bytes.to_vec()).file_name(file.name);
    Ok(match file.content_type {
        Some(content_type) => part.mime_str(&content_type)?,
        None => part,
    })
}

#[async_trait]
impl ExtractionGateway for HttpGateway {
    async fn extract_primary(&self, file: SourceFile) -> Result<DocumentModel, GatewayError> {
        debug!("Extracting JD from '{}'", file.name);
        let form = Form::new().part("jd_file", file_part(file)?);
        let request = self.client.post(self.url("/extract_jd")).multipart(form);
        self.send_json(request).await
    }

    async fn extract_secondary(
        &self,
        payload: SecondaryPayload,
    ) -> Result<Vec<CandidateRecord>, GatewayError> {
        debug!("Extracting {} resume(s)", payload.files.len());
        let mut form = Form::new().text("jd_json", serde_json::to_string(&payload.jd)?);
        for file in payload.files {
            form = form.part("resume_files", file_part(file)?);
        }
        let request = self.client.post(self.url("/extract_resumes")).multipart(form);
        self.send_json(request).await
    }
}

#[async_trait]
impl MatchingGateway for HttpGateway {
    async fn run_match(&self, payload: MatchPayload) -> Result<MatchReport, GatewayError> {
        debug!("Matching {} candidate(s)", payload.candidates.len());
        let request = self.client.post(self.url("/match")).json(&payload);
        self.send_json(request).await
    }
}

#[async_trait]
impl DocumentStore for HttpGateway {
    async fn list_documents(&self) -> Result<Vec<StoredDocument>, GatewayError> {
        self.send_json(self.client.get(self.url("/jds"))).await
    }

    async fn select_document(&self, id: &DocumentId) -> Result<StoredDocument, GatewayError> {
        self.send_json(self.client.get(self.url(&format!("/jds/{id}")))).await
    }

    async fn save_document(&self, document: DocumentModel) -> Result<(), GatewayError> {
        let request = self.client.post(self.url("/save_jd")).json(&document);
        self.send(request).await?;
        Ok(())
    }

    async fn set_status(
        &self,
        id: &DocumentId,
        status: DocumentStatus,
    ) -> Result<(), GatewayError> {
        let request = self
            .client
            .patch(self.url(&format!("/jds/{id}")))
            .json(&json!({ "status": status }));
        self.send(request).await?;
        Ok(())
    }

    async fn list_analyses(&self, id: Option<&DocumentId>) -> Result<Vec<Value>, GatewayError> {
        let path = match id {
            Some(id) => format!("/jds/{id}/results"),
            None => "/analyses".to_string(),
        };
        self.send_json(self.client.get(self.url(&path))).await
    }
}
