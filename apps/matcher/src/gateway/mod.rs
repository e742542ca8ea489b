//! Boundary to the extraction, matching and document-management service.
//!
//! The workflow engine only sees the three traits below. `HttpGateway`
//! implements all of them against the service's REST API; tests swap in
//! fakes without touching engine code.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::document::DocumentModel;
use crate::payload::{MatchPayload, SecondaryPayload};

pub mod http;

#[cfg(test)]
pub mod fake;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("could not encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// A user-chosen source file (PDF/DOC), passed through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// One extracted candidate: the CV document plus which JD skills it shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(rename = "cv_json")]
    pub document: DocumentModel,
    #[serde(default)]
    pub skill_presence: BTreeMap<String, bool>,
}

/// Per-candidate line of a match report. Known fields are typed; everything
/// else the matcher returns is kept verbatim in `details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
    #[serde(default)]
    pub candidate_id: Option<Value>,
    #[serde(default)]
    pub candidate_name: String,
    pub match_score: f64,
    #[serde(default)]
    pub match_level: Option<String>,
    #[serde(default)]
    pub critical_skill_status: Option<String>,
    #[serde(default)]
    pub disclaimer: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingMetadata {
    #[serde(default)]
    pub job_title: Option<String>,
    pub candidates_evaluated: usize,
    pub top_match_score: f64,
    #[serde(default)]
    pub average_match_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub results: Vec<CandidateSummary>,
    pub matching_metadata: MatchingMetadata,
}

impl MatchReport {
    pub fn top_score(&self) -> f64 {
        self.matching_metadata.top_match_score
    }

    pub fn evaluated_count(&self) -> usize {
        self.matching_metadata.candidates_evaluated
    }

    pub fn per_candidate(&self) -> &[CandidateSummary] {
        &self.results
    }

    /// Orders candidates by score, highest first. Ties keep service order.
    pub fn rank(&mut self) {
        self.results.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    }
}

/// Identifier of a stored JD. The service uses integers; kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawDocumentId", into = "String")]
pub struct DocumentId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocumentId {
    Number(i64),
    Text(String),
}

impl From<RawDocumentId> for DocumentId {
    fn from(raw: RawDocumentId) -> Self {
        match raw {
            RawDocumentId::Number(n) => DocumentId(n.to_string()),
            RawDocumentId::Text(s) => DocumentId(s),
        }
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        DocumentId(s.to_string())
    }
}

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    Active,
    Hold,
    #[serde(rename = "Not Active")]
    NotActive,
}

/// A JD as kept by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocumentId,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub ctc: Option<Value>,
    pub status: DocumentStatus,
    #[serde(default)]
    pub details: DocumentModel,
}

#[async_trait]
pub trait ExtractionGateway: Send + Sync {
    async fn extract_primary(&self, file: SourceFile) -> Result<DocumentModel, GatewayError>;

    async fn extract_secondary(
        &self,
        payload: SecondaryPayload,
    ) -> Result<Vec<CandidateRecord>, GatewayError>;
}

#[async_trait]
pub trait MatchingGateway: Send + Sync {
    async fn run_match(&self, payload: MatchPayload) -> Result<MatchReport, GatewayError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_documents(&self) -> Result<Vec<StoredDocument>, GatewayError>;

    async fn select_document(&self, id: &DocumentId) -> Result<StoredDocument, GatewayError>;

    async fn save_document(&self, document: DocumentModel) -> Result<(), GatewayError>;

    async fn set_status(
        &self,
        id: &DocumentId,
        status: DocumentStatus,
    ) -> Result<(), GatewayError>;

    /// Past analyses, for one JD or across all of them.
    async fn list_analyses(&self, id: Option<&DocumentId>) -> Result<Vec<Value>, GatewayError>;
}

/// The set of collaborators a session talks to.
#[derive(Clone)]
pub struct Gateways {
    pub extraction: Arc<dyn ExtractionGateway>,
    pub matching: Arc<dyn MatchingGateway>,
    pub documents: Arc<dyn DocumentStore>,
}

impl Gateways {
    /// Uses one service client for all three roles.
    pub fn shared<G>(gateway: Arc<G>) -> Self
    where
        G: ExtractionGateway + MatchingGateway + DocumentStore + 'static,
    {
        Self {
            extraction: gateway.clone(),
            matching: gateway.clone(),
            documents: gateway,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary(name: &str, score: f64) -> CandidateSummary {
        serde_json::from_value(json!({"candidate_name": name, "match_score": score})).unwrap()
    }

    #[test]
    fn test_rank_orders_by_score_and_keeps_ties_stable() {
        let mut report = MatchReport {
            results: vec![
                summary("a", 40.0),
                summary("b", 91.5),
                summary("c", 40.0),
                summary("d", 77.0),
            ],
            matching_metadata: MatchingMetadata::default(),
        };
        report.rank();
        let names: Vec<_> = report
            .per_candidate()
            .iter()
            .map(|c| c.candidate_name.as_str())
            .collect();
        assert_eq!(names, ["b", "d", "a", "c"]);
    }

    #[test]
    fn test_candidate_summary_keeps_unknown_fields() {
        let summary: CandidateSummary = serde_json::from_value(json!({
            "candidate_name": "Ana Lee",
            "match_score": 88.2,
            "present_skills": ["Rust"],
            "filter_status": {"passed": true, "reason": ""}
        }))
        .unwrap();
        assert_eq!(summary.details["present_skills"], json!(["Rust"]));
        let back = serde_json::to_value(&summary).unwrap();
        assert_eq!(back["filter_status"]["passed"], json!(true));
    }

    #[test]
    fn test_match_report_deserializes_service_shape() {
        let report: MatchReport = serde_json::from_value(json!({
            "results": [{"candidate_name": "A", "match_score": 72.0}],
            "matching_metadata": {
                "job_title": "Engineer",
                "candidates_evaluated": 1,
                "top_match_score": 72.0,
                "average_match_score": 72.0
            }
        }))
        .unwrap();
        assert_eq!(report.evaluated_count(), 1);
        assert!((report.top_score() - 72.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stored_document_accepts_numeric_id_and_spaced_status() {
        let doc: StoredDocument = serde_json::from_value(json!({
            "id": 17,
            "job_title": "Data Engineer",
            "status": "Not Active",
            "details": {"jobTitle": "Data Engineer"}
        }))
        .unwrap();
        assert_eq!(doc.id.as_str(), "17");
        assert_eq!(doc.status, DocumentStatus::NotActive);
        assert_eq!(serde_json::to_value(&doc.id).unwrap(), json!("17"));
    }

    #[test]
    fn test_candidate_record_uses_service_field_names() {
        let record: CandidateRecord = serde_json::from_value(json!({
            "cv_json": {"Personal Data": {"firstName": "Ana"}},
            "skill_presence": {"Rust": true, "Go": false}
        }))
        .unwrap();
        assert_eq!(record.skill_presence.get("Rust"), Some(&true));
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("cv_json").is_some());
    }
}
