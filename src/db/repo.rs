//! SQLite-backed store for final match results.

use crate::domain::{MatchId, MatchStatus, Money, TeamId};
use crate::persistence::{FinalMatchRecord, MatchStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

// SQLITE_BUSY and SQLITE_LOCKED
const RETRYABLE_SQLITE_CODES: [&str; 2] = ["5", "6"];

/// Repository for match result rows.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Insert the record, or replace every column of an existing row with
    /// the same match id.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub async fn upsert_match_result(&self, record: &FinalMatchRecord) -> Result<(), RepoError> {
        let events_json = serde_json::to_string(&record.events)?;
        let player_stats_json = serde_json::to_string(&record.player_stats)?;
        let team_stats_json = serde_json::to_string(&record.team_stats)?;

        sqlx::query(
            r#"
            INSERT INTO match_results (
                match_id, home_team_id, away_team_id, home_score, away_score,
                status, game_time, attendance, total_revenue, events_json,
                player_stats_json, team_stats_json, completed_at_ms, updated_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(match_id) DO UPDATE SET
                home_team_id = excluded.home_team_id,
                away_team_id = excluded.away_team_id,
                home_score = excluded.home_score,
                away_score = excluded.away_score,
                status = excluded.status,
                game_time = excluded.game_time,
                attendance = excluded.attendance,
                total_revenue = excluded.total_revenue,
                events_json = excluded.events_json,
                player_stats_json = excluded.player_stats_json,
                team_stats_json = excluded.team_stats_json,
                completed_at_ms = excluded.completed_at_ms,
                updated_at_ms = excluded.updated_at_ms
            "#,
        )
        .bind(record.match_id.to_string())
        .bind(record.home_team_id.to_string())
        .bind(record.away_team_id.to_string())
        .bind(record.home_score as i64)
        .bind(record.away_score as i64)
        .bind(record.status.to_string())
        .bind(record.game_time as i64)
        .bind(record.attendance as i64)
        .bind(record.total_revenue.to_canonical_string())
        .bind(events_json)
        .bind(player_stats_json)
        .bind(team_stats_json)
        .bind(record.completed_at.timestamp_millis())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch the stored result for one match.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column does not parse.
    pub async fn get_match_result(
        &self,
        match_id: MatchId,
    ) -> Result<Option<FinalMatchRecord>, RepoError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM match_results WHERE match_id = ?
            "#,
        )
        .bind(match_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    /// Most recently completed results first. A team filter matches either
    /// side.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column does not parse.
    pub async fn recent_match_results(
        &self,
        team: Option<TeamId>,
        limit: u32,
    ) -> Result<Vec<FinalMatchRecord>, RepoError> {
        let rows = match team {
            Some(team) => {
                sqlx::query(
                    r#"
                    SELECT * FROM match_results
                    WHERE home_team_id = ? OR away_team_id = ?
                    ORDER BY completed_at_ms DESC
                    LIMIT ?
                    "#,
                )
                .bind(team.to_string())
                .bind(team.to_string())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM match_results
                    ORDER BY completed_at_ms DESC
                    LIMIT ?
                    "#,
                )
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(row_to_record).collect()
    }
}

#[async_trait]
impl MatchStore for Repository {
    async fn upsert_match_result(&self, record: &FinalMatchRecord) -> Result<(), StoreError> {
        Repository::upsert_match_result(self, record)
            .await
            .map_err(StoreError::from)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("json column error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid stored value in {column}: {value}")]
    Corrupt { column: &'static str, value: String },
}

impl From<RepoError> for StoreError {
    fn from(err: RepoError) -> Self {
        let permanent = match &err {
            RepoError::Sqlx(sqlx::Error::Database(db)) => !db
                .code()
                .map(|code| RETRYABLE_SQLITE_CODES.contains(&code.as_ref()))
                .unwrap_or(false),
            RepoError::Sqlx(
                sqlx::Error::Decode(_)
                | sqlx::Error::ColumnDecode { .. }
                | sqlx::Error::ColumnNotFound(_)
                | sqlx::Error::ColumnIndexOutOfBounds { .. }
                | sqlx::Error::TypeNotFound { .. }
                | sqlx::Error::Configuration(_),
            ) => true,
            RepoError::Sqlx(_) => false,
            RepoError::Json(_) | RepoError::Corrupt { .. } => true,
        };
        if permanent {
            StoreError::Permanent(err.to_string())
        } else {
            StoreError::Transient(err.to_string())
        }
    }
}

fn corrupt(column: &'static str, value: impl ToString) -> RepoError {
    RepoError::Corrupt {
        column,
        value: value.to_string(),
    }
}

fn parse_uuid(row: &SqliteRow, column: &'static str) -> Result<Uuid, RepoError> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|_| corrupt(column, raw))
}

fn parse_u32(row: &SqliteRow, column: &'static str) -> Result<u32, RepoError> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).map_err(|_| corrupt(column, raw))
}

fn row_to_record(row: &SqliteRow) -> Result<FinalMatchRecord, RepoError> {
    let status_raw: String = row.try_get("status")?;
    let status: MatchStatus = serde_json::from_value(serde_json::Value::String(status_raw.clone()))
        .map_err(|_| corrupt("status", status_raw))?;

    let revenue_raw: String = row.try_get("total_revenue")?;
    let total_revenue =
        Money::from_str(&revenue_raw).map_err(|_| corrupt("total_revenue", revenue_raw))?;

    let completed_ms: i64 = row.try_get("completed_at_ms")?;
    let completed_at: DateTime<Utc> = DateTime::from_timestamp_millis(completed_ms)
        .ok_or_else(|| corrupt("completed_at_ms", completed_ms))?;

    let events_json: String = row.try_get("events_json")?;
    let player_stats_json: String = row.try_get("player_stats_json")?;
    let team_stats_json: String = row.try_get("team_stats_json")?;

    Ok(FinalMatchRecord {
        match_id: MatchId::from_uuid(parse_uuid(row, "match_id")?),
        home_team_id: TeamId::new(parse_uuid(row, "home_team_id")?),
        away_team_id: TeamId::new(parse_uuid(row, "away_team_id")?),
        home_score: parse_u32(row, "home_score")?,
        away_score: parse_u32(row, "away_score")?,
        status,
        game_time: parse_u32(row, "game_time")?,
        attendance: parse_u32(row, "attendance")?,
        total_revenue,
        events: serde_json::from_str(&events_json)?,
        player_stats: serde_json::from_str(&player_stats_json)?,
        team_stats: serde_json::from_str(&team_stats_json)?,
        completed_at,
    })
}
