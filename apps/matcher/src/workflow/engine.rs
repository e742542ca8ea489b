//! The session stepper.
//!
//! Every forward operation follows the same shape: check the transition
//! table and the latch, assemble a payload from canonical state, release the
//! lock, await the gateway, then re-lock and merge only if the session
//! generation is unchanged. The latch is owned by a guard so that an early
//! return, a gateway error, or a dropped future all clear it.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::document::editor::{DocumentEdit, DocumentEditor};
use crate::document::list_editor::ListEditor;
use crate::document::{DocumentModel, EditError};
use crate::gateway::{
    DocumentId, DocumentStatus, GatewayError, Gateways, SourceFile, StoredDocument,
};
use crate::identity::Identity;
use crate::payload;
use crate::skills::{Bucket, SkillPartition};
use crate::workflow::session::{SessionSnapshot, SessionState, SessionView};
use crate::workflow::topology::{Operation, Step, Topology, Transition, ENTRY_STEP};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("another operation is already in progress")]
    Busy,

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Edit(#[from] EditError),
}

/// Result of a forward operation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Advanced { step: Step },
    /// The session was reset while the call was outstanding; the response
    /// was dropped without touching state.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    Applied,
    Discarded,
}

/// Filters for `list_documents`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<DocumentStatus>,
}

impl DocumentQuery {
    fn matches(&self, doc: &StoredDocument) -> bool {
        if self.status.is_some_and(|status| status != doc.status) {
            return false;
        }
        let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            return true;
        };
        let needle = needle.to_lowercase();
        let title = doc
            .job_title
            .as_deref()
            .or_else(|| doc.details.get("jobTitle").and_then(Value::as_str));
        [title, doc.company_name.as_deref()]
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftTarget {
    Jd,
    Candidate(usize),
}

/// A private working copy of the JD or one candidate document. Dropping it
/// cancels the edits; `WorkflowEngine::commit` merges them back.
#[derive(Debug, Clone)]
pub struct Draft {
    target: DraftTarget,
    generation: u64,
    editor: DocumentEditor,
}

impl Draft {
    pub fn editor(&mut self) -> &mut DocumentEditor {
        &mut self.editor
    }

    pub fn apply(&mut self, edit: DocumentEdit) -> Result<(), EditError> {
        self.editor.apply(edit)
    }
}

struct EngineInner {
    identity: Identity,
    topology: &'static Topology,
    gateways: Gateways,
    state: Mutex<SessionState>,
}

/// Clears the latch for the generation that set it. Dropping the guard
/// without `release` (cancelled future) still clears it.
struct LatchGuard<'a> {
    inner: &'a EngineInner,
    generation: u64,
    released: bool,
}

impl<'a> LatchGuard<'a> {
    fn new(inner: &'a EngineInner, generation: u64) -> Self {
        Self {
            inner,
            generation,
            released: false,
        }
    }

    /// Release while the caller already holds the state lock.
    fn release(&mut self, state: &mut SessionState) {
        clear_latch(state, self.generation);
        self.released = true;
    }
}

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            clear_latch(&mut self.inner.state.lock(), self.generation);
        }
    }
}

fn clear_latch(state: &mut SessionState, generation: u64) {
    // A reset already started a fresh generation whose latch is not ours.
    if state.generation == generation {
        state.processing = false;
        state.in_flight = None;
    }
}

/// Role-aware workflow for one user session. Cheap to clone; clones share
/// the same session.
#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<EngineInner>,
}

impl WorkflowEngine {
    pub fn new(identity: Identity, gateways: Gateways) -> Self {
        let topology = Topology::for_role(&identity.role);
        info!(
            "New {:?} session for user '{}' (role '{}')",
            topology.kind, identity.user_id, identity.role
        );
        Self::with_state(identity, topology, gateways, SessionState::initial(0))
    }

    /// Rebuilds a session from a persisted snapshot. A step that is not a
    /// resting step of the role's topology falls back to the entry step.
    pub fn restore(snapshot: SessionSnapshot, gateways: Gateways) -> Self {
        let topology = Topology::for_role(&snapshot.identity.role);
        let mut state = SessionState::initial(0);
        state.step = if topology.resting_steps().contains(&snapshot.step) {
            snapshot.step
        } else {
            ENTRY_STEP
        };
        state.jd = snapshot.jd;
        state.selected_document = snapshot.selected_document;
        state.skills = snapshot.skills;
        state.candidates = snapshot.candidates;
        state.report = snapshot.report;
        Self::with_state(snapshot.identity, topology, gateways, state)
    }

    fn with_state(
        identity: Identity,
        topology: &'static Topology,
        gateways: Gateways,
        state: SessionState,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                identity,
                topology,
                gateways,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    pub fn view(&self) -> SessionView {
        self.inner
            .state
            .lock()
            .view(&self.inner.identity, self.inner.topology)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.lock().snapshot(&self.inner.identity)
    }

    // ---- forward operations ----

    /// Reviewer step 1: load a stored, active JD and seed the partition from it.
    pub async fn select_jd(&self, id: &DocumentId) -> Result<Outcome, WorkflowError> {
        self.run(
            Operation::SelectJd,
            |_| Ok(id.clone()),
            |gateways, id| async move { gateways.documents.select_document(&id).await },
            |state, doc| {
                if doc.status != DocumentStatus::Active {
                    return Err(WorkflowError::Validation(format!(
                        "JD {} is not active",
                        doc.id
                    )));
                }
                state.skills =
                    SkillPartition::from_skills_value(doc.details.get(payload::SKILLS_FIELD));
                state.jd = Some(doc.details);
                state.selected_document = Some(doc.id);
                state.candidates.clear();
                state.report = None;
                Ok(())
            },
        )
        .await
    }

    /// Preparer step 1: extract the chosen JD file.
    pub async fn extract_primary(&self) -> Result<Outcome, WorkflowError> {
        self.run(
            Operation::ExtractPrimary,
            |state| {
                state
                    .pending
                    .jd
                    .as_ref()
                    .map(payload::primary)
                    .ok_or_else(|| WorkflowError::Validation("Choose a JD file first".into()))
            },
            |gateways, file| async move { gateways.extraction.extract_primary(file).await },
            |state, jd| {
                state.skills = SkillPartition::from_skills_value(jd.get(payload::SKILLS_FIELD));
                state.jd = Some(jd);
                state.selected_document = None;
                state.candidates.clear();
                state.report = None;
                Ok(())
            },
        )
        .await
    }

    pub async fn extract_secondary(&self) -> Result<Outcome, WorkflowError> {
        self.run(
            Operation::ExtractSecondary,
            |state| {
                let jd = confirmed_jd(state)?;
                if state.pending.cvs.is_empty() {
                    return Err(WorkflowError::Validation(
                        "Choose at least one resume".into(),
                    ));
                }
                Ok(payload::secondary(jd, &state.skills, &state.pending.cvs))
            },
            |gateways, payload| async move { gateways.extraction.extract_secondary(payload).await },
            |state, records| {
                state.candidates = records;
                state.report = None;
                Ok(())
            },
        )
        .await
    }

    pub async fn run_match(&self) -> Result<Outcome, WorkflowError> {
        self.run(
            Operation::RunMatch,
            |state| {
                let jd = confirmed_jd(state)?;
                if state.candidates.is_empty() {
                    return Err(WorkflowError::Validation(
                        "No extracted resumes to match".into(),
                    ));
                }
                Ok(payload::matching(jd, &state.skills, &state.candidates))
            },
            |gateways, payload| async move { gateways.matching.run_match(payload).await },
            |state, mut report| {
                report.rank();
                if let Some(top) = report.per_candidate().first() {
                    info!(
                        "Matched {} candidate(s); top: {} ({:.1})",
                        report.evaluated_count(),
                        top.candidate_name,
                        report.top_score()
                    );
                }
                state.report = Some(report);
                Ok(())
            },
        )
        .await
    }

    /// Preparer step 3: store the JD with its triaged skills, then start over.
    pub async fn save_document(&self) -> Result<Outcome, WorkflowError> {
        self.run(
            Operation::SaveDocument,
            |state| Ok(payload::stored(confirmed_jd(state)?, &state.skills)),
            |gateways, document| async move { gateways.documents.save_document(document).await },
            |state, ()| {
                state.reset();
                Ok(())
            },
        )
        .await
    }

    async fn run<P, T, Fut>(
        &self,
        operation: Operation,
        prepare: impl FnOnce(&SessionState) -> Result<P, WorkflowError>,
        call: impl FnOnce(Gateways, P) -> Fut,
        merge: impl FnOnce(&mut SessionState, T) -> Result<(), WorkflowError>,
    ) -> Result<Outcome, WorkflowError>
    where
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let transition = *self.transition(operation)?;
        let (payload, generation) = {
            let mut state = self.inner.state.lock();
            if state.processing {
                return Err(WorkflowError::Busy);
            }
            if state.step != transition.from {
                return Err(WorkflowError::Validation(format!(
                    "{} is only available from step {} (currently at step {})",
                    operation.as_str(),
                    transition.from,
                    state.step
                )));
            }
            let payload = prepare(&state)?;
            state.processing = true;
            state.in_flight = transition.in_flight;
            state.error = None;
            (payload, state.generation)
        };
        let guard = LatchGuard::new(&self.inner, generation);

        debug!("{} started (generation {})", operation.as_str(), generation);
        let result = call(self.inner.gateways.clone(), payload).await;
        self.settle(&transition, guard, result, merge)
    }

    fn settle<T>(
        &self,
        transition: &Transition,
        mut guard: LatchGuard<'_>,
        result: Result<T, GatewayError>,
        merge: impl FnOnce(&mut SessionState, T) -> Result<(), WorkflowError>,
    ) -> Result<Outcome, WorkflowError> {
        let operation = transition.operation.as_str();
        let mut state = self.inner.state.lock();
        guard.release(&mut state);

        if state.generation != guard.generation {
            debug!(
                "Discarding {} response from generation {} (now {})",
                operation, guard.generation, state.generation
            );
            return Ok(Outcome::Discarded);
        }

        let value = match result {
            Ok(value) => value,
            Err(err) => {
                warn!("{} failed at step {}: {}", operation, state.step, err);
                state.error = Some(err.to_string());
                return Err(err.into());
            }
        };
        if let Err(err) = merge(&mut state, value) {
            warn!("{} rejected: {}", operation, err);
            state.error = Some(err.to_string());
            return Err(err);
        }

        let from = state.step;
        state.step = transition.to;
        info!(
            "User '{}': {} moved step {} -> {}",
            self.inner.identity.user_id, operation, from, transition.to
        );
        Ok(Outcome::Advanced {
            step: transition.to,
        })
    }

    fn transition(&self, operation: Operation) -> Result<&'static Transition, WorkflowError> {
        self.inner.topology.transition(operation).ok_or_else(|| {
            WorkflowError::Forbidden(format!(
                "{} is not available to role '{}'",
                operation.as_str(),
                self.inner.identity.role
            ))
        })
    }

    fn require_document_management(&self, action: &str) -> Result<(), WorkflowError> {
        if self.inner.identity.role.manages_documents() {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden(format!(
                "role '{}' may not {action}",
                self.inner.identity.role
            )))
        }
    }

    // ---- navigation ----

    /// Jumps to the nearest decision point behind the current step. State
    /// is kept so a later forward operation simply runs again.
    pub fn back(&self) -> Result<Step, WorkflowError> {
        self.mutate(|state| {
            let target = self.inner.topology.back_target(state.step);
            debug!("Back from step {} to {}", state.step, target);
            state.step = target;
            state.error = None;
            Ok(target)
        })
    }

    /// Returns the session to its initial state. Any outstanding call keeps
    /// running but its response will be discarded.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        if state.processing {
            info!("Reset while a call is outstanding; its response will be dropped");
        }
        state.reset();
    }

    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut SessionState) -> Result<R, WorkflowError>,
    ) -> Result<R, WorkflowError> {
        let mut state = self.inner.state.lock();
        if state.processing {
            return Err(WorkflowError::Busy);
        }
        f(&mut state)
    }

    // ---- skill triage ----

    pub fn add_skill(&self, name: &str, bucket: Bucket) -> Result<bool, WorkflowError> {
        self.mutate(|state| Ok(state.skills.add(name, bucket)))
    }

    pub fn move_skill(&self, skill: &str, from: Bucket, to: Bucket) -> Result<bool, WorkflowError> {
        self.mutate(|state| Ok(state.skills.move_skill(skill, from, to)))
    }

    pub fn remove_skill(&self, skill: &str, bucket: Bucket) -> Result<bool, WorkflowError> {
        self.mutate(|state| Ok(state.skills.remove(skill, bucket)))
    }

    // ---- pending files ----

    pub fn choose_jd_file(&self, file: SourceFile) -> Result<(), WorkflowError> {
        self.transition(Operation::ExtractPrimary)?;
        self.mutate(|state| {
            debug!("JD file chosen: '{}'", file.name);
            state.pending.jd = Some(file);
            Ok(())
        })
    }

    pub fn clear_jd_file(&self) -> Result<(), WorkflowError> {
        self.mutate(|state| {
            state.pending.jd = None;
            Ok(())
        })
    }

    /// Replaces the set of resumes for the next extraction.
    pub fn choose_cv_files(&self, files: Vec<SourceFile>) -> Result<(), WorkflowError> {
        self.mutate(|state| {
            debug!("{} resume file(s) chosen", files.len());
            state.pending.cvs = files;
            Ok(())
        })
    }

    pub fn remove_cv_file(&self, index: usize) -> Result<SourceFile, WorkflowError> {
        self.mutate(|state| {
            let mut files = ListEditor::new(std::mem::take(&mut state.pending.cvs));
            let removed = files.remove(index);
            state.pending.cvs = files.into_items();
            Ok(removed?)
        })
    }

    // ---- document editing ----

    pub fn open_jd_draft(&self) -> Result<Draft, WorkflowError> {
        let state = self.inner.state.lock();
        let jd = confirmed_jd(&state)?;
        Ok(Draft {
            target: DraftTarget::Jd,
            generation: state.generation,
            editor: DocumentEditor::open(jd),
        })
    }

    pub fn open_candidate_draft(&self, index: usize) -> Result<Draft, WorkflowError> {
        let state = self.inner.state.lock();
        let candidate = state
            .candidates
            .get(index)
            .ok_or(EditError::IndexOutOfRange {
                index,
                len: state.candidates.len(),
            })?;
        Ok(Draft {
            target: DraftTarget::Candidate(index),
            generation: state.generation,
            editor: DocumentEditor::open(&candidate.document),
        })
    }

    /// Merges a draft's working copy into canonical state. A draft opened
    /// before a reset is dropped.
    pub fn commit(&self, draft: Draft) -> Result<CommitOutcome, WorkflowError> {
        self.mutate(|state| {
            if state.generation != draft.generation {
                debug!("Discarding {:?} draft from an earlier session", draft.target);
                return Ok(CommitOutcome::Discarded);
            }
            match draft.target {
                DraftTarget::Jd => state.jd = Some(draft.editor.into_document()),
                DraftTarget::Candidate(index) => {
                    let len = state.candidates.len();
                    let candidate = state
                        .candidates
                        .get_mut(index)
                        .ok_or(EditError::IndexOutOfRange { index, len })?;
                    candidate.document = draft.editor.into_document();
                }
            }
            Ok(CommitOutcome::Applied)
        })
    }

    // ---- document management ----

    /// Stored JDs matching `query`. Roles that do not manage documents only
    /// ever see active ones.
    pub async fn list_documents(
        &self,
        query: &DocumentQuery,
    ) -> Result<Vec<StoredDocument>, WorkflowError> {
        let active_only = !self.inner.identity.role.manages_documents();
        let documents = self.inner.gateways.documents.list_documents().await?;
        Ok(documents
            .into_iter()
            .filter(|doc| !active_only || doc.status == DocumentStatus::Active)
            .filter(|doc| query.matches(doc))
            .collect())
    }

    pub async fn set_status(
        &self,
        id: &DocumentId,
        status: DocumentStatus,
    ) -> Result<(), WorkflowError> {
        self.require_document_management("change JD status")?;
        self.inner.gateways.documents.set_status(id, status).await?;
        info!("JD {} set to {:?}", id, status);
        Ok(())
    }

    pub async fn list_analyses(
        &self,
        id: Option<&DocumentId>,
    ) -> Result<Vec<Value>, WorkflowError> {
        Ok(self.inner.gateways.documents.list_analyses(id).await?)
    }
}

fn confirmed_jd(state: &SessionState) -> Result<&DocumentModel, WorkflowError> {
    state
        .jd
        .as_ref()
        .ok_or_else(|| WorkflowError::Validation("No JD has been confirmed yet".into()))
}
