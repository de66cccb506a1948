//! Review workflow for submitted results.
//!
//! A result moves `AwaitingReview -> UnderReview -> Confirmed`. Confirmation
//! computes the winners and writes the audit trail in the same transaction as
//! the status change, while the caller holds the contest's [`ContestLock`].

pub mod council;
pub mod locks;

use crate::db::{self, Database, audit, results};
use crate::error::{Error, Result};
use crate::events;
use crate::models::{
    ActorId, CandidateId, ClientMetadata, ContestId, CouncilControlDeclaration, LoggedAction,
    PersonVersion, ResultRecord, ReviewStatus, Submission, WinnerDeclaration,
};
use crate::voting::{self, Tally};
use chrono::Utc;
use log::{info, warn};
use sqlx::sqlite::SqliteConnection;
use std::collections::BTreeSet;
use std::sync::Arc;

pub use locks::{ContestLock, ContestLocks};

/// Outcome of a pure confirmation step.
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    /// The record is newly confirmed and these candidates won.
    Fresh {
        record: ResultRecord,
        winners: BTreeSet<CandidateId>,
    },
    /// The same confirmation was already applied; nothing to write.
    Repeated(ResultRecord),
}

#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    pub record: ResultRecord,
    pub declarations: Vec<WinnerDeclaration>,
    pub newly_confirmed: bool,
}

// Non-blank review source, else non-blank original source
pub(crate) fn effective_source<'a>(review_source: Option<&'a str>, source: &'a str) -> Option<&'a str> {
    review_source
        .filter(|s| !s.trim().is_empty())
        .or_else(|| Some(source).filter(|s| !s.trim().is_empty()))
}

pub fn begin_review(record: &ResultRecord, actor: &ActorId) -> Result<ResultRecord> {
    if record.is_confirmed() {
        return Err(Error::AlreadyConfirmed(format!("result {}", record.id)));
    }

    let mut next = record.clone();
    next.review_status = ReviewStatus::UnderReview;
    next.reviewed_by = Some(actor.clone());
    Ok(next)
}

/// Validates a confirmation and computes its winners. Performs no writes.
pub fn confirm(
    record: &ResultRecord,
    actor: &ActorId,
    review_source: Option<&str>,
) -> Result<Confirmation> {
    let source = effective_source(review_source, &record.source);

    if record.is_confirmed() {
        if record.reviewed_by.as_ref() == Some(actor) && record.provenance() == source {
            return Ok(Confirmation::Repeated(record.clone()));
        }
        return Err(Error::AlreadyConfirmed(format!("result {}", record.id)));
    }

    if record.candidate_counts.is_empty() {
        return Err(Error::EmptyContest(record.contest_id.clone()));
    }
    let source = source.ok_or_else(|| Error::MissingProvenance(format!("result {}", record.id)))?;
    let winners = voting::select_winners(&record.candidate_counts, record.winner_quota)?;

    let mut next = record.clone();
    next.review_status = ReviewStatus::Confirmed;
    next.reviewed_by = Some(actor.clone());
    next.review_source = if review_source.is_some_and(|s| !s.trim().is_empty()) {
        Some(source.to_string())
    } else if record.submitted_by.as_ref() != Some(actor) {
        // A third-party confirmation always carries the citation it relied on
        Some(source.to_string())
    } else {
        None
    };
    next.confirmed_at = Some(Utc::now());

    Ok(Confirmation::Fresh {
        record: next,
        winners,
    })
}

fn validate_submission(submission: &Submission, winner_quota: u32) -> Result<()> {
    if submission.source.trim().is_empty() {
        return Err(Error::MissingProvenance(format!(
            "submission for {}",
            submission.contest_id
        )));
    }
    if submission.candidate_counts.is_empty() {
        return Err(Error::EmptyContest(submission.contest_id.clone()));
    }
    voting::select_winners(&submission.candidate_counts, winner_quota)?;
    Ok(())
}

pub struct ReviewWorkflow {
    database: Arc<Database>,
    locks: ContestLocks,
}

impl ReviewWorkflow {
    pub fn new(database: Arc<Database>) -> Self {
        Self {
            database,
            locks: ContestLocks::new(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Acquires the single-writer lock `confirm` requires for a contest.
    pub async fn lock(&self, contest_id: &ContestId) -> ContestLock {
        self.locks.acquire(contest_id).await
    }

    /// Stores a new result awaiting review. An earlier unconfirmed result for
    /// the same contest is replaced; a confirmed one blocks the submission.
    pub async fn submit_result(
        &self,
        submission: Submission,
        client: &ClientMetadata,
    ) -> Result<ResultRecord> {
        let mut tx = self.database.begin().await?;
        let contest = db::get_contest(&mut tx, &submission.contest_id).await?;
        validate_submission(&submission, contest.winner_count)?;

        let record = ResultRecord::new(submission, contest.winner_count, client);
        replace_live_result(&mut tx, &record).await?;
        tx.commit().await?;

        info!(
            "Result {} submitted for contest {} with {} candidate(s)",
            record.id,
            record.contest_id,
            record.candidate_counts.len()
        );
        Ok(record)
    }

    pub async fn begin_review(&self, result_id: &str, actor: &ActorId) -> Result<ResultRecord> {
        let mut tx = self.database.begin().await?;
        let record = results::load_result(&mut tx, result_id).await?;
        let next = begin_review(&record, actor)?;
        results::update_review(&mut tx, &next).await?;
        tx.commit().await?;

        info!("{} is reviewing result {}", actor, result_id);
        Ok(next)
    }

    /// Confirms a result and records every candidate's outcome atomically.
    ///
    /// Repeating an identical confirmation returns the stored declarations and
    /// writes nothing.
    pub async fn confirm(
        &self,
        lock: &ContestLock,
        result_id: &str,
        actor: &ActorId,
        review_source: Option<&str>,
        client: &ClientMetadata,
    ) -> Result<ConfirmOutcome> {
        let mut tx = self.database.begin().await?;
        let record = results::load_result(&mut tx, result_id).await?;
        check_lock(lock, &record.contest_id)?;

        match confirm(&record, actor, review_source)? {
            Confirmation::Repeated(record) => {
                let declarations = audit::declarations_for_result(&mut tx, &record.id).await?;
                info!("Result {} was already confirmed by {}", record.id, actor);
                Ok(ConfirmOutcome {
                    record,
                    declarations,
                    newly_confirmed: false,
                })
            }
            Confirmation::Fresh { record, winners } => {
                let declarations = apply_confirmation(&mut tx, &record, &winners, actor, client).await?;
                tx.commit().await?;
                info!(
                    "Result {} confirmed by {}: {} winner(s) in contest {}",
                    record.id,
                    actor,
                    winners.len(),
                    record.contest_id
                );
                Ok(ConfirmOutcome {
                    record,
                    declarations,
                    newly_confirmed: true,
                })
            }
        }
    }

    /// Trusted entry: the submitter confirms their own figures in one step.
    pub async fn submit_and_confirm(
        &self,
        lock: &ContestLock,
        mut submission: Submission,
        actor: &ActorId,
        client: &ClientMetadata,
    ) -> Result<ConfirmOutcome> {
        check_lock(lock, &submission.contest_id)?;
        submission.submitted_by = Some(actor.clone());

        let mut tx = self.database.begin().await?;
        let contest = db::get_contest(&mut tx, &submission.contest_id).await?;
        validate_submission(&submission, contest.winner_count)?;

        let submitted = ResultRecord::new(submission, contest.winner_count, client);
        let Confirmation::Fresh { record, winners } = confirm(&submitted, actor, None)? else {
            return Err(Error::AlreadyConfirmed(format!("result {}", submitted.id)));
        };

        replace_live_result(&mut tx, &submitted).await?;
        let declarations = apply_confirmation(&mut tx, &record, &winners, actor, client).await?;
        tx.commit().await?;

        info!(
            "Result {} entered and confirmed by {} for contest {}",
            record.id, actor, record.contest_id
        );
        Ok(ConfirmOutcome {
            record,
            declarations,
            newly_confirmed: true,
        })
    }

    /// Read-only winner computation; nothing is stored.
    pub async fn preview_winners(&self, result_id: &str) -> Result<Tally> {
        let mut conn = self.database.pool().acquire().await?;
        let record = results::load_result(&mut conn, result_id).await?;
        if record.candidate_counts.is_empty() {
            return Err(Error::EmptyContest(record.contest_id));
        }
        voting::tally(&record.candidate_counts, record.winner_quota)
    }

    /// Results still waiting for a confirmation, oldest first.
    pub async fn review_queue(&self) -> Result<Vec<ResultRecord>> {
        let mut conn = self.database.pool().acquire().await?;
        let mut queue = results::results_with_status(&mut conn, ReviewStatus::AwaitingReview).await?;
        queue.extend(results::results_with_status(&mut conn, ReviewStatus::UnderReview).await?);
        queue.sort_by_key(|record| record.created_at);
        Ok(queue)
    }

    pub async fn get_result(&self, result_id: &str) -> Result<ResultRecord> {
        let mut conn = self.database.pool().acquire().await?;
        results::load_result(&mut conn, result_id).await
    }

    pub async fn result_for_contest(&self, contest_id: &ContestId) -> Result<Option<ResultRecord>> {
        let mut conn = self.database.pool().acquire().await?;
        results::find_result_for_contest(&mut conn, contest_id).await
    }

    pub async fn declarations(&self, result_id: &str) -> Result<Vec<WinnerDeclaration>> {
        let mut conn = self.database.pool().acquire().await?;
        audit::declarations_for_result(&mut conn, result_id).await
    }

    pub async fn person_versions(&self, candidate_id: &CandidateId) -> Result<Vec<PersonVersion>> {
        let mut conn = self.database.pool().acquire().await?;
        audit::person_versions(&mut conn, candidate_id).await
    }

    pub async fn logged_actions(&self, candidate_id: &CandidateId) -> Result<Vec<LoggedAction>> {
        let mut conn = self.database.pool().acquire().await?;
        audit::logged_actions(&mut conn, candidate_id).await
    }

    /// Records who controls a council; a pending declaration is replaced.
    pub async fn declare_council_control(
        &self,
        mut declaration: CouncilControlDeclaration,
    ) -> Result<CouncilControlDeclaration> {
        council::validate_control(&declaration)?;
        declaration.review_status = ReviewStatus::AwaitingReview;
        declaration.reviewed_by = None;
        declaration.review_source = None;

        let mut conn = self.database.pool().acquire().await?;
        db::council::upsert_control(&mut conn, &declaration).await?;

        info!("Council control declared for {}", declaration.contest_id);
        Ok(declaration)
    }

    pub async fn begin_control_review(
        &self,
        contest_id: &ContestId,
        actor: &ActorId,
    ) -> Result<CouncilControlDeclaration> {
        let mut tx = self.database.begin().await?;
        let declaration = db::council::load_control(&mut tx, contest_id).await?;
        let next = council::begin_control_review(&declaration, actor)?;
        db::council::upsert_control(&mut tx, &next).await?;
        tx.commit().await?;
        Ok(next)
    }

    pub async fn confirm_council_control(
        &self,
        contest_id: &ContestId,
        actor: &ActorId,
        review_source: Option<&str>,
    ) -> Result<CouncilControlDeclaration> {
        let mut tx = self.database.begin().await?;
        let declaration = db::council::load_control(&mut tx, contest_id).await?;
        let next = council::confirm_control(&declaration, actor, review_source)?;
        if next == declaration {
            return Ok(next);
        }
        db::council::upsert_control(&mut tx, &next).await?;
        tx.commit().await?;

        info!("Council control for {} confirmed by {}", contest_id, actor);
        Ok(next)
    }
}

fn check_lock(lock: &ContestLock, contest_id: &ContestId) -> Result<()> {
    if !lock.covers(contest_id) {
        warn!(
            "Rejected write to contest {} under lock for {}",
            contest_id,
            lock.contest_id()
        );
        return Err(Error::LockMismatch {
            held: lock.contest_id().clone(),
            required: contest_id.clone(),
        });
    }
    Ok(())
}

async fn replace_live_result(conn: &mut SqliteConnection, record: &ResultRecord) -> Result<()> {
    if let Some(existing) = results::find_result_for_contest(conn, &record.contest_id).await? {
        if existing.is_confirmed() {
            return Err(Error::AlreadyConfirmed(format!(
                "result {} for contest {}",
                existing.id, existing.contest_id
            )));
        }
        warn!(
            "Replacing unconfirmed result {} for contest {}",
            existing.id, existing.contest_id
        );
        results::delete_unconfirmed(conn, &existing.id).await?;
    }
    results::insert_result(conn, record).await
}

async fn apply_confirmation(
    conn: &mut SqliteConnection,
    record: &ResultRecord,
    winners: &BTreeSet<CandidateId>,
    actor: &ActorId,
    client: &ClientMetadata,
) -> Result<Vec<WinnerDeclaration>> {
    results::update_review(conn, record).await?;
    events::record_confirmation(conn, record, winners, actor, client).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{contest, membership, test_db};
    use crate::events::{NOT_ELECTED_BY_IMPLICATION, SET_CANDIDATE_ELECTED};
    use crate::models::{CandidateCount, PartyId};

    const CONTEST: &str = "parl.65808.2015-05-07";

    async fn workflow(winner_count: u32, candidates: &[&str]) -> ReviewWorkflow {
        let db = test_db().await;
        db.upsert_contest(&contest(CONTEST, winner_count)).await.unwrap();
        for candidate in candidates {
            db.upsert_membership(&membership(CONTEST, candidate, "party:53"))
                .await
                .unwrap();
        }
        ReviewWorkflow::new(Arc::new(db))
    }

    fn submission(entries: &[(&str, u32)]) -> Submission {
        Submission {
            contest_id: ContestId::new(CONTEST),
            candidate_counts: entries
                .iter()
                .map(|(id, ballots)| CandidateCount::new(id, "party:53", *ballots))
                .collect(),
            reported_turnout: Some(1_200),
            spoilt_ballots: Some(8),
            source: "Returning officer's declaration".to_string(),
            submitted_by: Some(ActorId::new("submitter")),
        }
    }

    fn client() -> ClientMetadata {
        ClientMetadata {
            ip_address: Some("192.0.2.10".to_string()),
        }
    }

    fn winners_of(declarations: &[WinnerDeclaration]) -> Vec<&str> {
        declarations
            .iter()
            .filter(|d| d.is_winner)
            .map(|d| d.candidate_id.as_str())
            .collect()
    }

    #[test]
    fn begin_review_claims_record_until_confirmed() {
        let record = ResultRecord::new(submission(&[("A", 1)]), 1, &ClientMetadata::default());
        let reviewing = begin_review(&record, &ActorId::new("r1")).unwrap();
        assert_eq!(reviewing.review_status, ReviewStatus::UnderReview);

        let handed_over = begin_review(&reviewing, &ActorId::new("r2")).unwrap();
        assert_eq!(handed_over.reviewed_by, Some(ActorId::new("r2")));

        let mut confirmed = handed_over;
        confirmed.review_status = ReviewStatus::Confirmed;
        assert!(matches!(
            begin_review(&confirmed, &ActorId::new("r1")),
            Err(Error::AlreadyConfirmed(_))
        ));
    }

    #[test]
    fn confirm_requires_candidates_and_provenance() {
        let mut record = ResultRecord::new(submission(&[]), 1, &ClientMetadata::default());
        assert!(matches!(
            confirm(&record, &ActorId::new("r1"), Some("BBC")),
            Err(Error::EmptyContest(_))
        ));

        record.candidate_counts = vec![CandidateCount::new("A", "party:53", 5)];
        record.source = "  ".to_string();
        assert!(matches!(
            confirm(&record, &ActorId::new("r1"), None),
            Err(Error::MissingProvenance(_))
        ));
        assert!(confirm(&record, &ActorId::new("r1"), Some("BBC")).is_ok());
    }

    #[test]
    fn third_party_confirmation_records_fallback_source() {
        let record = ResultRecord::new(submission(&[("A", 5), ("B", 3)]), 1, &ClientMetadata::default());

        let Confirmation::Fresh { record: by_other, .. } =
            confirm(&record, &ActorId::new("reviewer"), None).unwrap()
        else {
            panic!("expected a fresh confirmation");
        };
        assert_eq!(
            by_other.review_source.as_deref(),
            Some("Returning officer's declaration")
        );

        let Confirmation::Fresh { record: by_self, .. } =
            confirm(&record, &ActorId::new("submitter"), None).unwrap()
        else {
            panic!("expected a fresh confirmation");
        };
        assert_eq!(by_self.review_source, None);
        assert_eq!(by_self.provenance(), Some("Returning officer's declaration"));
    }

    #[tokio::test]
    async fn confirming_declares_winner_and_losers_by_implication() {
        let workflow = workflow(1, &["A", "B", "C"]).await;
        let record = workflow
            .submit_result(submission(&[("A", 300), ("B", 450), ("C", 120)]), &client())
            .await
            .unwrap();
        assert_eq!(record.review_status, ReviewStatus::AwaitingReview);

        let reviewer = ActorId::new("reviewer");
        workflow.begin_review(&record.id, &reviewer).await.unwrap();

        let preview = workflow.preview_winners(&record.id).await.unwrap();
        assert_eq!(preview.standings[0].candidate_id.as_str(), "B");

        let lock = workflow.lock(&record.contest_id).await;
        let outcome = workflow
            .confirm(&lock, &record.id, &reviewer, Some("BBC results"), &client())
            .await
            .unwrap();
        drop(lock);

        assert!(outcome.newly_confirmed);
        assert_eq!(outcome.record.review_status, ReviewStatus::Confirmed);
        assert_eq!(winners_of(&outcome.declarations), vec!["B"]);
        assert_eq!(outcome.declarations.len(), 3);

        let contest_id = ContestId::new(CONTEST);
        for (candidate, elected) in [("A", false), ("B", true), ("C", false)] {
            let stored = workflow
                .database()
                .get_membership(&contest_id, &CandidateId::new(candidate))
                .await
                .unwrap();
            assert_eq!(stored.elected, Some(elected), "candidate {}", candidate);
        }

        let loser_versions = workflow.person_versions(&CandidateId::new("A")).await.unwrap();
        assert_eq!(loser_versions.len(), 1);
        assert_eq!(loser_versions[0].information_source, NOT_ELECTED_BY_IMPLICATION);
        assert_eq!(loser_versions[0].ip_address.as_deref(), Some("192.0.2.10"));

        let actions = workflow.logged_actions(&CandidateId::new("B")).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, SET_CANDIDATE_ELECTED);
        assert_eq!(actions[0].source, "BBC results");
        assert!(workflow.logged_actions(&CandidateId::new("A")).await.unwrap().is_empty());

        let stored = workflow.get_result(&record.id).await.unwrap();
        assert!(stored.is_confirmed());
        assert!(stored.confirmed_at.is_some());
    }

    #[tokio::test]
    async fn repeated_confirmation_writes_nothing_new() {
        let workflow = workflow(1, &["A", "B"]).await;
        let record = workflow
            .submit_result(submission(&[("A", 10), ("B", 10)]), &client())
            .await
            .unwrap();
        let reviewer = ActorId::new("reviewer");
        let lock = workflow.lock(&record.contest_id).await;

        let first = workflow
            .confirm(&lock, &record.id, &reviewer, Some("Council site"), &client())
            .await
            .unwrap();
        let second = workflow
            .confirm(&lock, &record.id, &reviewer, Some("Council site"), &client())
            .await
            .unwrap();

        assert!(first.newly_confirmed);
        assert!(!second.newly_confirmed);
        assert_eq!(second.declarations, first.declarations);
        assert_eq!(winners_of(&first.declarations), vec!["B"]);
        assert_eq!(workflow.declarations(&record.id).await.unwrap().len(), 2);
        assert_eq!(workflow.person_versions(&CandidateId::new("B")).await.unwrap().len(), 1);

        let err = workflow
            .confirm(&lock, &record.id, &ActorId::new("other"), Some("Council site"), &client())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyConfirmed(_)));
        let err = workflow.begin_review(&record.id, &reviewer).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyConfirmed(_)));
    }

    #[tokio::test]
    async fn multi_member_tie_elects_exactly_quota() {
        let workflow = workflow(2, &["A", "B", "C", "D"]).await;
        let record = workflow
            .submit_result(
                submission(&[("A", 300), ("B", 450), ("C", 120), ("D", 450)]),
                &client(),
            )
            .await
            .unwrap();
        assert_eq!(record.winner_quota, 2);

        let lock = workflow.lock(&record.contest_id).await;
        let outcome = workflow
            .confirm(&lock, &record.id, &ActorId::new("reviewer"), None, &client())
            .await
            .unwrap();

        assert_eq!(winners_of(&outcome.declarations), vec!["B", "D"]);
        assert_eq!(outcome.declarations.iter().filter(|d| !d.is_winner).count(), 2);
    }

    #[tokio::test]
    async fn empty_contest_leaves_status_unchanged() {
        let workflow = workflow(1, &[]).await;
        let record = ResultRecord::new(submission(&[]), 1, &ClientMetadata::default());
        {
            let mut conn = workflow.database().pool().acquire().await.unwrap();
            results::insert_result(&mut conn, &record).await.unwrap();
        }

        let lock = workflow.lock(&record.contest_id).await;
        let err = workflow
            .confirm(&lock, &record.id, &ActorId::new("reviewer"), Some("BBC"), &client())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EmptyContest(_)));
        let stored = workflow.get_result(&record.id).await.unwrap();
        assert_eq!(stored.review_status, ReviewStatus::AwaitingReview);
    }

    #[tokio::test]
    async fn failed_event_write_rolls_back_confirmation() {
        // C has no membership, so recording its outcome fails midway
        let workflow = workflow(1, &["A", "B"]).await;
        let record = workflow
            .submit_result(submission(&[("A", 300), ("B", 450), ("C", 120)]), &client())
            .await
            .unwrap();

        let lock = workflow.lock(&record.contest_id).await;
        let err = workflow
            .confirm(&lock, &record.id, &ActorId::new("reviewer"), None, &client())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let stored = workflow.get_result(&record.id).await.unwrap();
        assert_eq!(stored.review_status, ReviewStatus::AwaitingReview);
        assert!(workflow.declarations(&record.id).await.unwrap().is_empty());
        assert!(workflow.person_versions(&CandidateId::new("B")).await.unwrap().is_empty());
        let b = workflow
            .database()
            .get_membership(&record.contest_id, &CandidateId::new("B"))
            .await
            .unwrap();
        assert_eq!(b.elected, None);
    }

    #[tokio::test]
    async fn confirm_rejects_lock_for_other_contest() {
        let workflow = workflow(1, &["A"]).await;
        let record = workflow
            .submit_result(submission(&[("A", 1)]), &client())
            .await
            .unwrap();

        let lock = workflow.lock(&ContestId::new("parl.14419.2015-05-07")).await;
        let err = workflow
            .confirm(&lock, &record.id, &ActorId::new("reviewer"), None, &client())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LockMismatch { .. }));
    }

    #[tokio::test]
    async fn resubmission_replaces_pending_but_not_confirmed_result() {
        let workflow = workflow(1, &["A", "B"]).await;
        let first = workflow
            .submit_result(submission(&[("A", 1), ("B", 2)]), &client())
            .await
            .unwrap();
        let second = workflow
            .submit_result(submission(&[("A", 3), ("B", 2)]), &client())
            .await
            .unwrap();

        assert!(matches!(
            workflow.get_result(&first.id).await,
            Err(Error::NotFound(_))
        ));
        let queue = workflow.review_queue().await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, second.id);

        let lock = workflow.lock(&second.contest_id).await;
        workflow
            .confirm(&lock, &second.id, &ActorId::new("reviewer"), None, &client())
            .await
            .unwrap();
        drop(lock);

        let err = workflow
            .submit_result(submission(&[("A", 9), ("B", 2)]), &client())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyConfirmed(_)));
        assert!(workflow.review_queue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submission_is_validated_before_storage() {
        let workflow = workflow(3, &["A", "B"]).await;

        let err = workflow
            .submit_result(submission(&[("A", 1), ("B", 2)]), &client())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuota { quota: 3, candidates: 2 }));

        let err = workflow
            .submit_result(submission(&[("A", 1), ("A", 2), ("B", 0)]), &client())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateCandidate(_)));

        let mut unsourced = submission(&[("A", 1), ("B", 2), ("C", 3)]);
        unsourced.source = String::new();
        let err = workflow.submit_result(unsourced, &client()).await.unwrap_err();
        assert!(matches!(err, Error::MissingProvenance(_)));

        assert!(
            workflow
                .result_for_contest(&ContestId::new(CONTEST))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn trusted_submitter_confirms_in_one_step() {
        let workflow = workflow(1, &["A", "B", "C"]).await;
        let actor = ActorId::new("trusted");
        let lock = workflow.lock(&ContestId::new(CONTEST)).await;

        let outcome = workflow
            .submit_and_confirm(
                &lock,
                submission(&[("A", 300), ("B", 450), ("C", 120)]),
                &actor,
                &client(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.record.submitted_by, Some(actor.clone()));
        assert_eq!(outcome.record.reviewed_by, Some(actor));
        assert_eq!(winners_of(&outcome.declarations), vec!["B"]);
        assert!(
            outcome
                .declarations
                .iter()
                .all(|d| d.source == "Returning officer's declaration")
        );
        assert!(workflow.get_result(&outcome.record.id).await.unwrap().is_confirmed());
    }

    #[tokio::test]
    async fn council_control_goes_through_review() {
        let workflow = workflow(1, &[]).await;
        let council = ContestId::new("local.maidstone.2016-05-05");

        let mut ambiguous = CouncilControlDeclaration::controlled_by(
            council.clone(),
            PartyId::new("party:52"),
            "Kent Online",
        );
        ambiguous.no_overall_control = true;
        let err = workflow.declare_council_control(ambiguous).await.unwrap_err();
        assert!(matches!(err, Error::AmbiguousControl(_)));

        workflow
            .declare_council_control(CouncilControlDeclaration::controlled_by(
                council.clone(),
                PartyId::new("party:52"),
                "Kent Online",
            ))
            .await
            .unwrap();

        let reviewer = ActorId::new("reviewer");
        let reviewing = workflow.begin_control_review(&council, &reviewer).await.unwrap();
        assert_eq!(reviewing.review_status, ReviewStatus::UnderReview);

        let confirmed = workflow
            .confirm_council_control(&council, &reviewer, Some("Maidstone council"))
            .await
            .unwrap();
        assert_eq!(confirmed.review_status, ReviewStatus::Confirmed);
        assert_eq!(confirmed.controlling_party, Some(PartyId::new("party:52")));

        let err = workflow
            .declare_council_control(CouncilControlDeclaration::no_overall_control(
                council.clone(),
                "Kent Online",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyConfirmed(_)));
    }
}
