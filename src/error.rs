use thiserror::Error;

use crate::models::{CandidateId, ContestId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid winner quota {quota} for a contest with {candidates} candidate(s)")]
    InvalidQuota { quota: u32, candidates: usize },
    #[error("Candidate {0} appears more than once in the result")]
    DuplicateCandidate(CandidateId),
    #[error("Result for contest {0} has no candidate counts")]
    EmptyContest(ContestId),
    #[error("No review source or original source given for {0}")]
    MissingProvenance(String),
    #[error("{0} has already been confirmed")]
    AlreadyConfirmed(String),
    #[error("Council control for {0} must name a controlling party or declare no overall control, not both")]
    AmbiguousControl(ContestId),
    #[error("Lock held for contest {held} does not cover contest {required}")]
    LockMismatch { held: ContestId, required: ContestId },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Corrupt stored data: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
