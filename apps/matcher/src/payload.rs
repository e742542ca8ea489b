//! Payload assembly: pure transforms from session state to gateway requests.
//!
//! The JD's skills field is always overwritten from the partition, never
//! read from the document: three buckets for extraction and storage, one
//! flattened list for matching.

use serde::Serialize;
use serde_json::Value;

use crate::document::DocumentModel;
use crate::gateway::{CandidateRecord, SourceFile};
use crate::skills::SkillPartition;

/// JD field that carries the required skills.
pub const SKILLS_FIELD: &str = "requiredSkills";

/// Input for candidate extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryPayload {
    pub jd: DocumentModel,
    pub files: Vec<SourceFile>,
}

/// Input for matching, serialized as the service's `{jd_json, cvs}` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchPayload {
    #[serde(rename = "jd_json")]
    pub jd: DocumentModel,
    #[serde(rename = "cvs")]
    pub candidates: Vec<CandidateRecord>,
}

/// The JD extraction request is the source file alone.
pub fn primary(jd_file: &SourceFile) -> SourceFile {
    jd_file.clone()
}

pub fn with_bucketed_skills(jd: &DocumentModel, skills: &SkillPartition) -> DocumentModel {
    let buckets = serde_json::to_value(skills).unwrap_or(Value::Null);
    jd.with_field(SKILLS_FIELD, buckets)
}

pub fn with_flat_skills(jd: &DocumentModel, skills: &SkillPartition) -> DocumentModel {
    let flat = skills.flatten().into_iter().map(Value::String).collect();
    jd.with_field(SKILLS_FIELD, Value::Array(flat))
}

pub fn secondary(
    jd: &DocumentModel,
    skills: &SkillPartition,
    cv_files: &[SourceFile],
) -> SecondaryPayload {
    SecondaryPayload {
        jd: with_bucketed_skills(jd, skills),
        files: cv_files.to_vec(),
    }
}

pub fn matching(
    jd: &DocumentModel,
    skills: &SkillPartition,
    candidates: &[CandidateRecord],
) -> MatchPayload {
    MatchPayload {
        jd: with_flat_skills(jd, skills),
        candidates: candidates.to_vec(),
    }
}

/// A JD ready for the document store, skills in three-bucket form.
pub fn stored(jd: &DocumentModel, skills: &SkillPartition) -> DocumentModel {
    with_bucketed_skills(jd, skills)
}
