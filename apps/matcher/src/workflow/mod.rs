pub mod engine;
pub mod session;
pub mod topology;

pub use engine::{
    CommitOutcome, DocumentQuery, Draft, DraftTarget, Outcome, WorkflowEngine, WorkflowError,
};
pub use session::{SessionSnapshot, SessionView};
