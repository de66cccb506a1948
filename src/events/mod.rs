//! Audit trail written when a result is confirmed.
//!
//! Every standing candidate gets an explicit outcome: winners are declared
//! elected and logged, everyone else is marked not elected by implication.
//! Nothing here commits; the caller owns the transaction.

use crate::db::audit;
use crate::error::{Error, Result};
use crate::models::{
    ActorId, CandidateId, ClientMetadata, LoggedAction, PersonVersion, ResultRecord,
    WinnerDeclaration,
};
use chrono::{DateTime, Utc};
use log::debug;
use sqlx::sqlite::SqliteConnection;
use std::collections::BTreeSet;
use uuid::Uuid;

pub const SET_CANDIDATE_ELECTED: &str = "set-candidate-elected";
pub const NOT_ELECTED_BY_IMPLICATION: &str = "Setting as \"not elected\" by implication";

/// Everything one confirmation appends to the audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationEvents {
    pub declarations: Vec<WinnerDeclaration>,
    pub person_versions: Vec<PersonVersion>,
    pub logged_actions: Vec<LoggedAction>,
}

/// Builds the events for a confirmation without touching storage.
pub fn plan_confirmation(
    record: &ResultRecord,
    winners: &BTreeSet<CandidateId>,
    actor: &ActorId,
    client: &ClientMetadata,
    confirmed_at: DateTime<Utc>,
) -> Result<ConfirmationEvents> {
    let source = record
        .provenance()
        .ok_or_else(|| Error::MissingProvenance(format!("result {}", record.id)))?
        .to_string();

    let mut events = ConfirmationEvents {
        declarations: Vec::with_capacity(record.candidate_counts.len()),
        person_versions: Vec::with_capacity(record.candidate_counts.len()),
        logged_actions: Vec::new(),
    };

    for count in &record.candidate_counts {
        let is_winner = winners.contains(&count.candidate_id);

        events.declarations.push(WinnerDeclaration {
            result_id: record.id.clone(),
            candidate_id: count.candidate_id.clone(),
            contest_id: record.contest_id.clone(),
            party_id: count.party_id.clone(),
            is_winner,
            confirmed_at,
            confirming_actor: actor.clone(),
            source: source.clone(),
        });

        let version = PersonVersion {
            version_id: Uuid::new_v4().to_string(),
            candidate_id: count.candidate_id.clone(),
            contest_id: record.contest_id.clone(),
            actor: actor.clone(),
            ip_address: client.ip_address.clone(),
            information_source: if is_winner {
                source.clone()
            } else {
                NOT_ELECTED_BY_IMPLICATION.to_string()
            },
            elected: is_winner,
            timestamp: confirmed_at,
        };

        if is_winner {
            events.logged_actions.push(LoggedAction {
                id: Uuid::new_v4().to_string(),
                actor: actor.clone(),
                action_type: SET_CANDIDATE_ELECTED.to_string(),
                person_new_version: version.version_id.clone(),
                candidate_id: count.candidate_id.clone(),
                source: source.clone(),
                created_at: confirmed_at,
            });
        }

        events.person_versions.push(version);
    }

    Ok(events)
}

/// Applies a confirmation: membership flags, declarations, versions and log entries.
///
/// Fails with `NotFound` if any candidate has no membership in the contest. On
/// any error the caller must drop the transaction so none of the writes land.
pub async fn record_confirmation(
    conn: &mut SqliteConnection,
    record: &ResultRecord,
    winners: &BTreeSet<CandidateId>,
    actor: &ActorId,
    client: &ClientMetadata,
) -> Result<Vec<WinnerDeclaration>> {
    let confirmed_at = record.confirmed_at.unwrap_or_else(Utc::now);
    let events = plan_confirmation(record, winners, actor, client, confirmed_at)?;

    for declaration in &events.declarations {
        audit::set_membership_elected(
            conn,
            &declaration.contest_id,
            &declaration.candidate_id,
            declaration.is_winner,
        )
        .await?;
        audit::insert_declaration(conn, declaration).await?;
    }
    for version in &events.person_versions {
        audit::insert_person_version(conn, version).await?;
    }
    for action in &events.logged_actions {
        audit::insert_logged_action(conn, action).await?;
    }

    debug!(
        "Recorded {} declaration(s) and {} logged action(s) for result {}",
        events.declarations.len(),
        events.logged_actions.len(),
        record.id
    );

    Ok(events.declarations)
}
