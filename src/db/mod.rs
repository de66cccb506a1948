pub mod audit;
pub mod council;
pub mod results;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{CandidateId, Contest, ContestId, Membership, PartyId};
use chrono::{DateTime, Utc};
use log::info;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction, migrate::MigrateDatabase};
use std::time::Duration;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new() -> Result<Self> {
        Self::connect(&Config::from_env()).await
    }

    pub async fn connect(config: &Config) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(&config.database_url)
            .await
            .unwrap_or(false)
        {
            Sqlite::create_database(&config.database_url).await?;
        }

        let mut options = SqlitePoolOptions::new().max_connections(config.max_connections);
        if config.is_in_memory() {
            // The database lives only as long as its one connection
            options = options
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }
        let pool = options.connect(&config.database_url).await?;

        Self::init_schema(&pool).await?;
        info!("Connected to result database at {}", config.database_url);

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts the transaction that bounds one atomic unit of work.
    /// Dropping it without `commit` rolls everything back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contests (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL,
                post_label TEXT NOT NULL,
                election_id TEXT NOT NULL,
                winner_count INTEGER NOT NULL CHECK (winner_count > 0)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memberships (
                candidate_id TEXT NOT NULL,
                contest_id TEXT NOT NULL,
                party_id TEXT NOT NULL,
                elected BOOLEAN,
                PRIMARY KEY (candidate_id, contest_id),
                FOREIGN KEY (contest_id) REFERENCES contests(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS result_records (
                id TEXT PRIMARY KEY,
                contest_id TEXT NOT NULL UNIQUE,
                reported_turnout INTEGER,
                spoilt_ballots INTEGER,
                source TEXT NOT NULL,
                review_status TEXT NOT NULL,
                reviewed_by TEXT,
                review_source TEXT,
                winner_quota INTEGER NOT NULL,
                submitted_by TEXT,
                ip_address TEXT,
                created_at TEXT NOT NULL,
                confirmed_at TEXT,
                FOREIGN KEY (contest_id) REFERENCES contests(id)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candidate_counts (
                result_id TEXT NOT NULL,
                candidate_id TEXT NOT NULL,
                party_id TEXT NOT NULL,
                ballots INTEGER NOT NULL CHECK (ballots >= 0),
                position INTEGER NOT NULL,
                PRIMARY KEY (result_id, candidate_id),
                FOREIGN KEY (result_id) REFERENCES result_records(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS council_control (
                contest_id TEXT PRIMARY KEY,
                controlling_party TEXT,
                no_overall_control BOOLEAN NOT NULL,
                source TEXT NOT NULL,
                review_status TEXT NOT NULL,
                reviewed_by TEXT,
                review_source TEXT,
                CHECK ((controlling_party IS NULL) <> (no_overall_control = 0))
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS winner_declarations (
                result_id TEXT NOT NULL,
                candidate_id TEXT NOT NULL,
                contest_id TEXT NOT NULL,
                party_id TEXT NOT NULL,
                is_winner BOOLEAN NOT NULL,
                confirmed_at TEXT NOT NULL,
                confirming_actor TEXT NOT NULL,
                source TEXT NOT NULL,
                PRIMARY KEY (result_id, candidate_id)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS person_versions (
                version_id TEXT PRIMARY KEY,
                candidate_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                data TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS logged_actions (
                id TEXT PRIMARY KEY,
                actor TEXT NOT NULL,
                action_type TEXT NOT NULL,
                person_new_version TEXT NOT NULL,
                candidate_id TEXT NOT NULL,
                source TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // Register or replace a contest's reference data
    pub async fn upsert_contest(&self, contest: &Contest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO contests (id, post_id, post_label, election_id, winner_count)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET post_id = excluded.post_id, post_label = excluded.post_label,
                election_id = excluded.election_id, winner_count = excluded.winner_count
            "#,
        )
        .bind(contest.id.as_str())
        .bind(&contest.post_id)
        .bind(&contest.post_label)
        .bind(&contest.election_id)
        .bind(i64::from(contest.winner_count))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_contest(&self, contest_id: &ContestId) -> Result<Contest> {
        let mut conn = self.pool.acquire().await?;
        get_contest(&mut conn, contest_id).await
    }

    // Register a standing candidate; leaves any elected flag untouched
    pub async fn upsert_membership(&self, membership: &Membership) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO memberships (candidate_id, contest_id, party_id, elected)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(candidate_id, contest_id)
            DO UPDATE SET party_id = excluded.party_id
            "#,
        )
        .bind(membership.candidate_id.as_str())
        .bind(membership.contest_id.as_str())
        .bind(membership.party_id.as_str())
        .bind(membership.elected)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_membership(
        &self,
        contest_id: &ContestId,
        candidate_id: &CandidateId,
    ) -> Result<Membership> {
        let row = sqlx::query(
            r#"
            SELECT candidate_id, contest_id, party_id, elected
            FROM memberships
            WHERE contest_id = ? AND candidate_id = ?
            "#,
        )
        .bind(contest_id.as_str())
        .bind(candidate_id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!("membership of {} in {}", candidate_id, contest_id))
        })?;

        Ok(Membership {
            candidate_id: CandidateId(row.try_get("candidate_id")?),
            contest_id: ContestId(row.try_get("contest_id")?),
            party_id: PartyId(row.try_get("party_id")?),
            elected: row.try_get("elected")?,
        })
    }
}

pub async fn get_contest(conn: &mut SqliteConnection, contest_id: &ContestId) -> Result<Contest> {
    let row = sqlx::query(
        r#"
        SELECT id, post_id, post_label, election_id, winner_count
        FROM contests
        WHERE id = ?
        "#,
    )
    .bind(contest_id.as_str())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("contest {}", contest_id)))?;

    Ok(Contest {
        id: ContestId(row.try_get("id")?),
        post_id: row.try_get("post_id")?,
        post_label: row.try_get("post_label")?,
        election_id: row.try_get("election_id")?,
        winner_count: to_u32(row.try_get("winner_count")?, "winner_count")?,
    })
}

pub(crate) fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Corrupt(format!("Failed to parse {}: {}", field, e)))
}

pub(crate) fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Corrupt(format!("{} out of range: {}", field, value)))
}
