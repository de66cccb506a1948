use crate::db::parse_timestamp;
use crate::error::{Error, Result};
use crate::models::{
    ActorId, CandidateId, ContestId, LoggedAction, PartyId, PersonVersion, WinnerDeclaration,
};
use sqlx::Row;
use sqlx::sqlite::SqliteConnection;

pub async fn set_membership_elected(
    conn: &mut SqliteConnection,
    contest_id: &ContestId,
    candidate_id: &CandidateId,
    elected: bool,
) -> Result<()> {
    let updated = sqlx::query(
        r#"
        UPDATE memberships
        SET elected = ?
        WHERE contest_id = ? AND candidate_id = ?
        "#,
    )
    .bind(elected)
    .bind(contest_id.as_str())
    .bind(candidate_id.as_str())
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "membership of {} in {}",
            candidate_id, contest_id
        )));
    }
    Ok(())
}

pub async fn insert_declaration(
    conn: &mut SqliteConnection,
    declaration: &WinnerDeclaration,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO winner_declarations (result_id, candidate_id, contest_id, party_id, is_winner,
            confirmed_at, confirming_actor, source)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&declaration.result_id)
    .bind(declaration.candidate_id.as_str())
    .bind(declaration.contest_id.as_str())
    .bind(declaration.party_id.as_str())
    .bind(declaration.is_winner)
    .bind(declaration.confirmed_at.to_rfc3339())
    .bind(declaration.confirming_actor.as_str())
    .bind(&declaration.source)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn declarations_for_result(
    conn: &mut SqliteConnection,
    result_id: &str,
) -> Result<Vec<WinnerDeclaration>> {
    let rows = sqlx::query(
        r#"
        SELECT result_id, candidate_id, contest_id, party_id, is_winner, confirmed_at,
            confirming_actor, source
        FROM winner_declarations
        WHERE result_id = ?
        ORDER BY rowid
        "#,
    )
    .bind(result_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| -> Result<WinnerDeclaration> {
            let confirmed_at: String = row.try_get("confirmed_at")?;
            Ok(WinnerDeclaration {
                result_id: row.try_get("result_id")?,
                candidate_id: CandidateId(row.try_get("candidate_id")?),
                contest_id: ContestId(row.try_get("contest_id")?),
                party_id: PartyId(row.try_get("party_id")?),
                is_winner: row.try_get("is_winner")?,
                confirmed_at: parse_timestamp(&confirmed_at, "confirmed_at")?,
                confirming_actor: ActorId(row.try_get("confirming_actor")?),
                source: row.try_get("source")?,
            })
        })
        .collect()
}

pub async fn insert_person_version(
    conn: &mut SqliteConnection,
    version: &PersonVersion,
) -> Result<()> {
    let data = serde_json::to_string(version)?;
    sqlx::query(
        r#"
        INSERT INTO person_versions (version_id, candidate_id, timestamp, data)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&version.version_id)
    .bind(version.candidate_id.as_str())
    .bind(version.timestamp.to_rfc3339())
    .bind(data)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// Oldest first
pub async fn person_versions(
    conn: &mut SqliteConnection,
    candidate_id: &CandidateId,
) -> Result<Vec<PersonVersion>> {
    let rows = sqlx::query(
        r#"
        SELECT data
        FROM person_versions
        WHERE candidate_id = ?
        ORDER BY rowid
        "#,
    )
    .bind(candidate_id.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| -> Result<PersonVersion> {
            let data: String = row.try_get("data")?;
            Ok(serde_json::from_str(&data)?)
        })
        .collect()
}

pub async fn insert_logged_action(
    conn: &mut SqliteConnection,
    action: &LoggedAction,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO logged_actions (id, actor, action_type, person_new_version, candidate_id,
            source, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&action.id)
    .bind(action.actor.as_str())
    .bind(&action.action_type)
    .bind(&action.person_new_version)
    .bind(action.candidate_id.as_str())
    .bind(&action.source)
    .bind(action.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn logged_actions(
    conn: &mut SqliteConnection,
    candidate_id: &CandidateId,
) -> Result<Vec<LoggedAction>> {
    let rows = sqlx::query(
        r#"
        SELECT id, actor, action_type, person_new_version, candidate_id, source, created_at
        FROM logged_actions
        WHERE candidate_id = ?
        ORDER BY rowid
        "#,
    )
    .bind(candidate_id.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| -> Result<LoggedAction> {
            let created_at: String = row.try_get("created_at")?;
            Ok(LoggedAction {
                id: row.try_get("id")?,
                actor: ActorId(row.try_get("actor")?),
                action_type: row.try_get("action_type")?,
                person_new_version: row.try_get("person_new_version")?,
                candidate_id: CandidateId(row.try_get("candidate_id")?),
                source: row.try_get("source")?,
                created_at: parse_timestamp(&created_at, "created_at")?,
            })
        })
        .collect()
}
