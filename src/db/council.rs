use crate::error::{Error, Result};
use crate::models::{ActorId, ContestId, CouncilControlDeclaration, PartyId, ReviewStatus};
use sqlx::Row;
use sqlx::sqlite::SqliteConnection;

// A new declaration replaces an unconfirmed one for the same council election
pub async fn upsert_control(
    conn: &mut SqliteConnection,
    declaration: &CouncilControlDeclaration,
) -> Result<()> {
    let written = sqlx::query(
        r#"
        INSERT INTO council_control (contest_id, controlling_party, no_overall_control, source,
            review_status, reviewed_by, review_source)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(contest_id)
        DO UPDATE SET controlling_party = excluded.controlling_party,
            no_overall_control = excluded.no_overall_control, source = excluded.source,
            review_status = excluded.review_status, reviewed_by = excluded.reviewed_by,
            review_source = excluded.review_source
        WHERE council_control.review_status <> 'confirmed'
        "#,
    )
    .bind(declaration.contest_id.as_str())
    .bind(declaration.controlling_party.as_ref().map(|party| party.as_str()))
    .bind(declaration.no_overall_control)
    .bind(&declaration.source)
    .bind(declaration.review_status.as_str())
    .bind(declaration.reviewed_by.as_ref().map(|actor| actor.as_str()))
    .bind(declaration.review_source.as_deref())
    .execute(&mut *conn)
    .await?;

    if written.rows_affected() == 0 {
        return Err(Error::AlreadyConfirmed(format!(
            "council control for {}",
            declaration.contest_id
        )));
    }
    Ok(())
}

pub async fn load_control(
    conn: &mut SqliteConnection,
    contest_id: &ContestId,
) -> Result<CouncilControlDeclaration> {
    let row = sqlx::query(
        r#"
        SELECT contest_id, controlling_party, no_overall_control, source, review_status,
            reviewed_by, review_source
        FROM council_control
        WHERE contest_id = ?
        "#,
    )
    .bind(contest_id.as_str())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("council control for {}", contest_id)))?;

    let status_str: String = row.try_get("review_status")?;
    let review_status = ReviewStatus::parse(&status_str)
        .ok_or_else(|| Error::Corrupt(format!("Unknown review status: {}", status_str)))?;

    Ok(CouncilControlDeclaration {
        contest_id: ContestId(row.try_get("contest_id")?),
        controlling_party: row.try_get::<Option<String>, _>("controlling_party")?.map(PartyId),
        no_overall_control: row.try_get("no_overall_control")?,
        source: row.try_get("source")?,
        review_status,
        reviewed_by: row.try_get::<Option<String>, _>("reviewed_by")?.map(ActorId),
        review_source: row.try_get("review_source")?,
    })
}
