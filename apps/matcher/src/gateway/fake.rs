//! Scripted in-memory gateway for engine and route tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::document::DocumentModel;
use crate::gateway::{
    CandidateRecord, CandidateSummary, DocumentId, DocumentStatus, DocumentStore,
    ExtractionGateway, GatewayError, MatchReport, MatchingGateway, MatchingMetadata, SourceFile,
    StoredDocument,
};
use crate::payload::{MatchPayload, SecondaryPayload};

pub fn sample_jd() -> DocumentModel {
    DocumentModel::from_value(json!({
        "jobTitle": "Backend Engineer",
        "companyProfile": {"companyName": "Acme"},
        "location": {"city": "Pune"},
        "requiredSkills": ["Rust", "SQL", "Kafka"],
        "Experiences": []
    }))
    .unwrap()
}

pub fn sample_candidate(name: &str) -> CandidateRecord {
    CandidateRecord {
        document: DocumentModel::from_value(json!({
            "Personal Data": {"firstName": name},
            "Experiences": [{"jobTitle": "Engineer", "company": "Initech"}]
        }))
        .unwrap(),
        skill_presence: BTreeMap::from([("Rust".to_string(), true), ("SQL".to_string(), false)]),
    }
}

pub fn sample_report() -> MatchReport {
    let summary = |name: &str, score: f64| CandidateSummary {
        candidate_id: None,
        candidate_name: name.to_string(),
        match_score: score,
        match_level: None,
        critical_skill_status: None,
        disclaimer: None,
        details: Default::default(),
    };
    MatchReport {
        results: vec![summary("Bo", 61.0), summary("Ana", 84.5)],
        matching_metadata: MatchingMetadata {
            job_title: Some("Backend Engineer".to_string()),
            candidates_evaluated: 2,
            top_match_score: 84.5,
            average_match_score: 72.75,
        },
    }
}

pub fn stored(id: &str, status: DocumentStatus, title: &str) -> StoredDocument {
    StoredDocument {
        id: DocumentId::from(id),
        job_title: Some(title.to_string()),
        company_name: Some("Acme".to_string()),
        location: None,
        ctc: None,
        status,
        details: sample_jd().with_field("jobTitle", Value::String(title.to_string())),
    }
}

/// Every operation succeeds with sample data unless told to fail.
pub struct FakeGateway {
    failing: Mutex<HashSet<&'static str>>,
    pub documents: Mutex<Vec<StoredDocument>>,
    calls: Mutex<Vec<&'static str>>,
    pub saved: Mutex<Vec<DocumentModel>>,
    pub statuses: Mutex<Vec<(DocumentId, DocumentStatus)>>,
    pub last_secondary: Mutex<Option<SecondaryPayload>>,
    pub last_match: Mutex<Option<MatchPayload>>,
    gate: Mutex<Option<Arc<Notify>>>,
    /// Signalled each time a gated call is entered.
    pub entered: Notify,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            documents: Mutex::new(vec![
                stored("1", DocumentStatus::Active, "Backend Engineer"),
                stored("2", DocumentStatus::Hold, "Data Engineer"),
                stored("3", DocumentStatus::Active, "Platform Engineer"),
            ]),
            calls: Mutex::new(Vec::new()),
            saved: Mutex::new(Vec::new()),
            statuses: Mutex::new(Vec::new()),
            last_secondary: Mutex::new(None),
            last_match: Mutex::new(None),
            gate: Mutex::new(None),
            entered: Notify::new(),
        }
    }
}

impl FakeGateway {
    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.failing.lock().remove(operation);
    }

    /// Makes every later call wait until the returned handle is notified.
    pub fn hold_calls(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    async fn enter(&self, operation: &'static str) -> Result<(), GatewayError> {
        self.calls.lock().push(operation);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            self.entered.notify_one();
            gate.notified().await;
        }
        if self.failing.lock().contains(operation) {
            return Err(GatewayError::Api {
                status: 500,
                message: format!("{operation} failed"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ExtractionGateway for FakeGateway {
    async fn extract_primary(&self, _file: SourceFile) -> Result<DocumentModel, GatewayError> {
        self.enter("extract_primary").await?;
        Ok(sample_jd())
    }

    async fn extract_secondary(
        &self,
        payload: SecondaryPayload,
    ) -> Result<Vec<CandidateRecord>, GatewayError> {
        self.enter("extract_secondary").await?;
        let names = ["Ana", "Bo", "Cy", "Di"];
        let records = payload
            .files
            .iter()
            .zip(names.iter().cycle())
            .map(|(_, name)| sample_candidate(name))
            .collect();
        *self.last_secondary.lock() = Some(payload);
        Ok(records)
    }
}

#[async_trait]
impl MatchingGateway for FakeGateway {
    async fn run_match(&self, payload: MatchPayload) -> Result<MatchReport, GatewayError> {
        self.enter("run_match").await?;
        *self.last_match.lock() = Some(payload);
        Ok(sample_report())
    }
}

#[async_trait]
impl DocumentStore for FakeGateway {
    async fn list_documents(&self) -> Result<Vec<StoredDocument>, GatewayError> {
        self.enter("list_documents").await?;
        Ok(self.documents.lock().clone())
    }

    async fn select_document(&self, id: &DocumentId) -> Result<StoredDocument, GatewayError> {
        self.enter("select_document").await?;
        self.documents
            .lock()
            .iter()
            .find(|d| &d.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::Api {
                status: 404,
                message: format!("JD {id} not found"),
            })
    }

    async fn save_document(&self, document: DocumentModel) -> Result<(), GatewayError> {
        self.enter("save_document").await?;
        self.saved.lock().push(document);
        Ok(())
    }

    async fn set_status(
        &self,
        id: &DocumentId,
        status: DocumentStatus,
    ) -> Result<(), GatewayError> {
        self.enter("set_status").await?;
        self.statuses.lock().push((id.clone(), status));
        if let Some(doc) = self.documents.lock().iter_mut().find(|d| &d.id == id) {
            doc.status = status;
        }
        Ok(())
    }

    async fn list_analyses(&self, id: Option<&DocumentId>) -> Result<Vec<Value>, GatewayError> {
        self.enter("list_analyses").await?;
        Ok(vec![json!({"jd_id": id.map(|i| i.to_string()), "candidates": 2})])
    }
}
