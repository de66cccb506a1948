use crate::db::{parse_timestamp, to_u32};
use crate::error::{Error, Result};
use crate::models::{ActorId, CandidateCount, CandidateId, ContestId, PartyId, ResultRecord, ReviewStatus};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnection, SqliteRow};

const RESULT_COLUMNS: &str = "id, contest_id, reported_turnout, spoilt_ballots, source, review_status, \
     reviewed_by, review_source, winner_quota, submitted_by, ip_address, created_at, confirmed_at";

pub async fn insert_result(conn: &mut SqliteConnection, record: &ResultRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO result_records (id, contest_id, reported_turnout, spoilt_ballots, source,
            review_status, reviewed_by, review_source, winner_quota, submitted_by, ip_address,
            created_at, confirmed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(record.contest_id.as_str())
    .bind(record.reported_turnout.map(i64::from))
    .bind(record.spoilt_ballots.map(i64::from))
    .bind(&record.source)
    .bind(record.review_status.as_str())
    .bind(record.reviewed_by.as_ref().map(|actor| actor.as_str()))
    .bind(record.review_source.as_deref())
    .bind(i64::from(record.winner_quota))
    .bind(record.submitted_by.as_ref().map(|actor| actor.as_str()))
    .bind(record.ip_address.as_deref())
    .bind(record.created_at.to_rfc3339())
    .bind(record.confirmed_at.map(|dt| dt.to_rfc3339()))
    .execute(&mut *conn)
    .await?;

    for (i, count) in record.candidate_counts.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO candidate_counts (result_id, candidate_id, party_id, ballots, position)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(count.candidate_id.as_str())
        .bind(count.party_id.as_str())
        .bind(i64::from(count.ballots))
        .bind(i as i64)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn load_result(conn: &mut SqliteConnection, result_id: &str) -> Result<ResultRecord> {
    let row = sqlx::query(&format!("SELECT {} FROM result_records WHERE id = ?", RESULT_COLUMNS))
        .bind(result_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("result {}", result_id)))?;

    result_from_row(conn, row).await
}

/// The live result for a contest, if one has been submitted.
pub async fn find_result_for_contest(
    conn: &mut SqliteConnection,
    contest_id: &ContestId,
) -> Result<Option<ResultRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM result_records WHERE contest_id = ?",
        RESULT_COLUMNS
    ))
    .bind(contest_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(result_from_row(conn, row).await?)),
        None => Ok(None),
    }
}

pub async fn results_with_status(
    conn: &mut SqliteConnection,
    status: ReviewStatus,
) -> Result<Vec<ResultRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM result_records WHERE review_status = ? ORDER BY created_at",
        RESULT_COLUMNS
    ))
    .bind(status.as_str())
    .fetch_all(&mut *conn)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(result_from_row(conn, row).await?);
    }
    Ok(records)
}

/// Persists the review fields of a record. Counts are never rewritten.
pub async fn update_review(conn: &mut SqliteConnection, record: &ResultRecord) -> Result<()> {
    let updated = sqlx::query(
        r#"
        UPDATE result_records
        SET review_status = ?, reviewed_by = ?, review_source = ?, confirmed_at = ?
        WHERE id = ? AND review_status <> 'confirmed'
        "#,
    )
    .bind(record.review_status.as_str())
    .bind(record.reviewed_by.as_ref().map(|actor| actor.as_str()))
    .bind(record.review_source.as_deref())
    .bind(record.confirmed_at.map(|dt| dt.to_rfc3339()))
    .bind(&record.id)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(Error::AlreadyConfirmed(format!("result {}", record.id)));
    }
    Ok(())
}

// Drops an unconfirmed result so a fresh submission can take its place
pub async fn delete_unconfirmed(conn: &mut SqliteConnection, result_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM result_records WHERE id = ? AND review_status <> 'confirmed'")
        .bind(result_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn result_from_row(conn: &mut SqliteConnection, row: SqliteRow) -> Result<ResultRecord> {
    let id: String = row.try_get("id")?;
    let status_str: String = row.try_get("review_status")?;
    let review_status = ReviewStatus::parse(&status_str)
        .ok_or_else(|| Error::Corrupt(format!("Unknown review status: {}", status_str)))?;
    let created_at_str: String = row.try_get("created_at")?;
    let confirmed_at_str: Option<String> = row.try_get("confirmed_at")?;

    let confirmed_at = match confirmed_at_str {
        Some(value) => Some(parse_timestamp(&value, "confirmed_at")?),
        None => None,
    };

    let candidate_counts = load_counts(conn, &id).await?;

    Ok(ResultRecord {
        contest_id: ContestId(row.try_get("contest_id")?),
        reported_turnout: optional_u32(row.try_get("reported_turnout")?, "reported_turnout")?,
        spoilt_ballots: optional_u32(row.try_get("spoilt_ballots")?, "spoilt_ballots")?,
        candidate_counts,
        source: row.try_get("source")?,
        review_status,
        reviewed_by: row.try_get::<Option<String>, _>("reviewed_by")?.map(ActorId),
        review_source: row.try_get("review_source")?,
        winner_quota: to_u32(row.try_get("winner_quota")?, "winner_quota")?,
        submitted_by: row.try_get::<Option<String>, _>("submitted_by")?.map(ActorId),
        ip_address: row.try_get("ip_address")?,
        created_at: parse_timestamp(&created_at_str, "created_at")?,
        confirmed_at,
        id,
    })
}

async fn load_counts(conn: &mut SqliteConnection, result_id: &str) -> Result<Vec<CandidateCount>> {
    let rows = sqlx::query(
        r#"
        SELECT candidate_id, party_id, ballots
        FROM candidate_counts
        WHERE result_id = ?
        ORDER BY position
        "#,
    )
    .bind(result_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| -> Result<CandidateCount> {
            Ok(CandidateCount {
                candidate_id: CandidateId(row.try_get("candidate_id")?),
                party_id: PartyId(row.try_get("party_id")?),
                ballots: to_u32(row.try_get("ballots")?, "ballots")?,
            })
        })
        .collect()
}

fn optional_u32(value: Option<i64>, field: &str) -> Result<Option<u32>> {
    value.map(|v| to_u32(v, field)).transpose()
}
