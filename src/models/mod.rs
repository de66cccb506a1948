use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one post contested in one election, e.g. `parl.65808.2015-05-07`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContestId(pub String);

/// Identifies the person standing as a candidate.
///
/// Ordering is lexical on the identifier string; the winner tie-break relies on it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub String);

/// An authenticated user acting on a result. Anonymous submissions carry `None`
/// wherever an `Option<ActorId>` appears.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

macro_rules! string_id {
    ($($name:ident),*) => {
        $(
            impl $name {
                pub fn new(id: impl Into<String>) -> Self {
                    Self(id.into())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }
        )*
    };
}

string_id!(ContestId, CandidateId, PartyId, ActorId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    AwaitingReview,
    UnderReview,
    Confirmed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::AwaitingReview => "awaiting_review",
            ReviewStatus::UnderReview => "under_review",
            ReviewStatus::Confirmed => "confirmed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "awaiting_review" => Some(ReviewStatus::AwaitingReview),
            "under_review" => Some(ReviewStatus::UnderReview),
            "confirmed" => Some(ReviewStatus::Confirmed),
            _ => None,
        }
    }
}

/// Reference data for a contest: the post, its election and how many seats it fills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    pub post_id: String,
    pub post_label: String,
    pub election_id: String,
    pub winner_count: u32,
}

/// A candidate's standing in a contest. `elected` stays `None` until a result
/// for the contest is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub candidate_id: CandidateId,
    pub contest_id: ContestId,
    pub party_id: PartyId,
    pub elected: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCount {
    pub candidate_id: CandidateId,
    pub party_id: PartyId,
    pub ballots: u32,
}

impl CandidateCount {
    pub fn new(candidate_id: &str, party_id: &str, ballots: u32) -> Self {
        Self {
            candidate_id: CandidateId::new(candidate_id),
            party_id: PartyId::new(party_id),
            ballots,
        }
    }
}

/// Request-side data captured purely as audit payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    pub ip_address: Option<String>,
}

/// Figures reported for a contest, as entered by the submitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub contest_id: ContestId,
    pub candidate_counts: Vec<CandidateCount>,
    pub reported_turnout: Option<u32>,
    pub spoilt_ballots: Option<u32>,
    pub source: String,
    pub submitted_by: Option<ActorId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: String,
    pub contest_id: ContestId,
    pub reported_turnout: Option<u32>,
    pub spoilt_ballots: Option<u32>,
    pub candidate_counts: Vec<CandidateCount>,
    pub source: String,
    pub review_status: ReviewStatus,
    pub reviewed_by: Option<ActorId>,
    pub review_source: Option<String>,
    pub winner_quota: u32,
    pub submitted_by: Option<ActorId>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl ResultRecord {
    pub fn new(submission: Submission, winner_quota: u32, client: &ClientMetadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            contest_id: submission.contest_id,
            reported_turnout: submission.reported_turnout,
            spoilt_ballots: submission.spoilt_ballots,
            candidate_counts: submission.candidate_counts,
            source: submission.source,
            review_status: ReviewStatus::AwaitingReview,
            reviewed_by: None,
            review_source: None,
            winner_quota,
            submitted_by: submission.submitted_by,
            ip_address: client.ip_address.clone(),
            created_at: Utc::now(),
            confirmed_at: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.review_status == ReviewStatus::Confirmed
    }

    /// Citation for the confirmed figures: the review source, else the submission source.
    pub fn provenance(&self) -> Option<&str> {
        self.review_source
            .as_deref()
            .filter(|source| !source.trim().is_empty())
            .or_else(|| Some(self.source.as_str()).filter(|source| !source.trim().is_empty()))
    }

    pub fn count_for(&self, candidate_id: &CandidateId) -> Option<&CandidateCount> {
        self.candidate_counts
            .iter()
            .find(|count| &count.candidate_id == candidate_id)
    }
}

/// Who controls a council after a local election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilControlDeclaration {
    pub contest_id: ContestId,
    pub controlling_party: Option<PartyId>,
    pub no_overall_control: bool,
    pub source: String,
    pub review_status: ReviewStatus,
    pub reviewed_by: Option<ActorId>,
    pub review_source: Option<String>,
}

impl CouncilControlDeclaration {
    pub fn controlled_by(contest_id: ContestId, party: PartyId, source: &str) -> Self {
        Self::build(contest_id, Some(party), false, source)
    }

    pub fn no_overall_control(contest_id: ContestId, source: &str) -> Self {
        Self::build(contest_id, None, true, source)
    }

    pub fn build(
        contest_id: ContestId,
        controlling_party: Option<PartyId>,
        no_overall_control: bool,
        source: &str,
    ) -> Self {
        Self {
            contest_id,
            controlling_party,
            no_overall_control,
            source: source.to_string(),
            review_status: ReviewStatus::AwaitingReview,
            reviewed_by: None,
            review_source: None,
        }
    }
}

/// Permanent record of a candidate's outcome in a confirmed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerDeclaration {
    pub result_id: String,
    pub candidate_id: CandidateId,
    pub contest_id: ContestId,
    pub party_id: PartyId,
    pub is_winner: bool,
    pub confirmed_at: DateTime<Utc>,
    pub confirming_actor: ActorId,
    pub source: String,
}

/// Snapshot appended to a person's history whenever their elected flag changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonVersion {
    pub version_id: String,
    pub candidate_id: CandidateId,
    pub contest_id: ContestId,
    pub actor: ActorId,
    pub ip_address: Option<String>,
    pub information_source: String,
    pub elected: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedAction {
    pub id: String,
    pub actor: ActorId,
    pub action_type: String,
    pub person_new_version: String,
    pub candidate_id: CandidateId,
    pub source: String,
    pub created_at: DateTime<Utc>,
}
