//! Step topologies. A session picks one table from its role tag at creation
//! and consults only that table afterwards.

use serde::{Deserialize, Serialize};

use crate::identity::RoleTag;

pub type Step = u8;

/// Every session starts here, and `back` falls through to it.
pub const ENTRY_STEP: Step = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    SelectJd,
    ExtractPrimary,
    ExtractSecondary,
    RunMatch,
    SaveDocument,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::SelectJd => "select_jd",
            Operation::ExtractPrimary => "extract_primary",
            Operation::ExtractSecondary => "extract_secondary",
            Operation::RunMatch => "run_match",
            Operation::SaveDocument => "save_document",
        }
    }
}

/// A forward edge: legal only from `from`; shows `in_flight` while the
/// gateway call is outstanding; lands on `to` on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub operation: Operation,
    pub from: Step,
    pub in_flight: Option<Step>,
    pub to: Step,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    Preparer,
    Reviewer,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Topology {
    pub kind: TopologyKind,
    transitions: &'static [Transition],
    back: &'static [(Step, Step)],
}

/// upload → extracting → review JD → extracting resumes → review resumes
/// → matching → results.
pub static PREPARER: Topology = Topology {
    kind: TopologyKind::Preparer,
    transitions: &[
        Transition {
            operation: Operation::ExtractPrimary,
            from: 1,
            in_flight: Some(2),
            to: 3,
        },
        Transition {
            operation: Operation::ExtractSecondary,
            from: 3,
            in_flight: Some(4),
            to: 5,
        },
        Transition {
            operation: Operation::RunMatch,
            from: 5,
            in_flight: Some(6),
            to: 7,
        },
        Transition {
            operation: Operation::SaveDocument,
            from: 3,
            in_flight: None,
            to: ENTRY_STEP,
        },
    ],
    back: &[(7, 5), (5, 3), (3, 1)],
};

/// select JD → upload resumes → review resumes → results.
pub static REVIEWER: Topology = Topology {
    kind: TopologyKind::Reviewer,
    transitions: &[
        Transition {
            operation: Operation::SelectJd,
            from: 1,
            in_flight: None,
            to: 2,
        },
        Transition {
            operation: Operation::ExtractSecondary,
            from: 2,
            in_flight: Some(3),
            to: 4,
        },
        Transition {
            operation: Operation::RunMatch,
            from: 4,
            in_flight: Some(5),
            to: 6,
        },
    ],
    back: &[(6, 4), (4, 2), (2, 1)],
};

impl Topology {
    /// Preparer for document-managing roles; anything else reviews.
    pub fn for_role(role: &RoleTag) -> &'static Topology {
        if role.manages_documents() {
            &PREPARER
        } else {
            &REVIEWER
        }
    }

    pub fn transition(&self, operation: Operation) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.operation == operation)
    }

    /// Nearest decision point behind `step`.
    pub fn back_target(&self, step: Step) -> Step {
        self.back
            .iter()
            .find(|(from, _)| *from == step)
            .map(|(_, to)| *to)
            .unwrap_or(ENTRY_STEP)
    }

    /// Steps a session can rest on between operations.
    pub fn resting_steps(&self) -> Vec<Step> {
        let mut steps: Vec<Step> = std::iter::once(ENTRY_STEP)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect();
        steps.sort_unstable();
        steps.dedup();
        steps
    }
}
