use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::DocumentModel;
use crate::gateway::{CandidateRecord, DocumentId, MatchReport, SourceFile};
use crate::identity::{Identity, RoleTag};
use crate::skills::SkillPartition;
use crate::workflow::topology::{Step, Topology, TopologyKind, ENTRY_STEP};

/// Files chosen for the next extraction call. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct PendingFiles {
    pub jd: Option<SourceFile>,
    pub cvs: Vec<SourceFile>,
}

/// Canonical per-session state. Only the engine touches it.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub step: Step,
    pub jd: Option<DocumentModel>,
    pub selected_document: Option<DocumentId>,
    pub skills: SkillPartition,
    pub candidates: Vec<CandidateRecord>,
    pub report: Option<MatchReport>,
    /// Single-flight latch: set while a gateway call is outstanding.
    pub processing: bool,
    /// Display step for the outstanding call, if its transition has one.
    pub in_flight: Option<Step>,
    pub error: Option<String>,
    pub pending: PendingFiles,
    /// Bumped on every reset; responses tagged with an older value are dropped.
    pub generation: u64,
}

impl SessionState {
    pub fn initial(generation: u64) -> Self {
        Self {
            step: ENTRY_STEP,
            jd: None,
            selected_document: None,
            skills: SkillPartition::default(),
            candidates: Vec::new(),
            report: None,
            processing: false,
            in_flight: None,
            error: None,
            pending: PendingFiles::default(),
            generation,
        }
    }

    pub fn reset(&mut self) {
        *self = SessionState::initial(self.generation + 1);
    }

    /// Step the user should see right now.
    pub fn display_step(&self) -> Step {
        match (self.processing, self.in_flight) {
            (true, Some(step)) => step,
            _ => self.step,
        }
    }

    pub fn view(&self, identity: &Identity, topology: &Topology) -> SessionView {
        SessionView {
            user_id: identity.user_id.clone(),
            role: identity.role.clone(),
            topology: topology.kind,
            step: self.display_step(),
            processing: self.processing,
            error: self.error.clone(),
            jd: self.jd.clone(),
            selected_document: self.selected_document.clone(),
            skills: self.skills.clone(),
            candidates: self.candidates.clone(),
            report: self.report.clone(),
            pending_jd: self.pending.jd.as_ref().map(|f| f.name.clone()),
            pending_cvs: self.pending.cvs.iter().map(|f| f.name.clone()).collect(),
        }
    }

    pub fn snapshot(&self, identity: &Identity) -> SessionSnapshot {
        SessionSnapshot {
            identity: identity.clone(),
            step: self.step,
            jd: self.jd.clone(),
            selected_document: self.selected_document.clone(),
            skills: self.skills.clone(),
            candidates: self.candidates.clone(),
            report: self.report.clone(),
            saved_at: Utc::now(),
        }
    }
}

/// Read-only rendering of a session for callers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub user_id: String,
    pub role: RoleTag,
    pub topology: TopologyKind,
    pub step: Step,
    pub processing: bool,
    pub error: Option<String>,
    pub jd: Option<DocumentModel>,
    pub selected_document: Option<DocumentId>,
    pub skills: SkillPartition,
    pub candidates: Vec<CandidateRecord>,
    pub report: Option<MatchReport>,
    pub pending_jd: Option<String>,
    pub pending_cvs: Vec<String>,
}

/// What survives a process restart: canonical documents and progress, but
/// not file bytes, the latch, or the error slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub identity: Identity,
    pub step: Step,
    #[serde(default)]
    pub jd: Option<DocumentModel>,
    #[serde(default)]
    pub selected_document: Option<DocumentId>,
    #[serde(default)]
    pub skills: SkillPartition,
    #[serde(default)]
    pub candidates: Vec<CandidateRecord>,
    #[serde(default)]
    pub report: Option<MatchReport>,
    pub saved_at: DateTime<Utc>,
}
