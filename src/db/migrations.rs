//! SQLite setup for the match result store.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Schema steps in order. `PRAGMA user_version` counts how many are applied.
const MIGRATIONS: &[&str] = &[include_str!("schema.sql")];

/// Matches that end together write concurrently. A writer waits this long
/// for the lock, then the busy error goes back to the persistence retry loop
/// as a transient failure.
const LOCK_WAIT: Duration = Duration::from_millis(1_000);

/// Completions are rare and short; a handful of connections is plenty.
const MAX_CONNECTIONS: u32 = 4;

/// Open (creating if needed) the database that holds final match results
/// and bring its schema up to date.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    let path = Path::new(db_path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
    }

    // WAL so reads of finished results never block a completing match.
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(LOCK_WAIT);
    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    let version = migrate(&pool).await?;
    info!(path = %db_path, schema_version = version, "match result store ready");
    Ok(pool)
}

/// Apply the migrations past the stored `user_version`, each in its own
/// transaction. Returns the resulting version.
async fn migrate(pool: &SqlitePool) -> Result<usize, sqlx::Error> {
    let (stored,): (i64,) = sqlx::query_as("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    let applied = usize::try_from(stored).unwrap_or(0);

    for (index, migration) in MIGRATIONS.iter().enumerate().skip(applied) {
        let mut tx = pool.begin().await?;
        for statement in migration.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        // PRAGMA takes no bind parameters
        let bump = format!("PRAGMA user_version = {}", index + 1);
        sqlx::query(&bump).execute(&mut *tx).await?;
        tx.commit().await?;
        debug!(version = index + 1, "result store migration applied");
    }

    Ok(applied.max(MIGRATIONS.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn db_path(dir: &TempDir) -> String {
        dir.path()
            .join("league")
            .join("results.db")
            .to_string_lossy()
            .to_string()
    }

    async fn user_version(pool: &SqlitePool) -> i64 {
        let (version,): (i64,) = sqlx::query_as("PRAGMA user_version")
            .fetch_one(pool)
            .await
            .unwrap();
        version
    }

    #[tokio::test]
    async fn test_init_creates_results_table_under_missing_dir() {
        let dir = TempDir::new().unwrap();
        let path = db_path(&dir);
        let pool = init_db(&path).await.expect("init_db failed");
        assert!(Path::new(&path).exists());

        let (name,): (String,) = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name='match_results'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(name, "match_results");
        assert_eq!(user_version(&pool).await, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_reopen_keeps_stored_results() {
        let dir = TempDir::new().unwrap();
        let path = db_path(&dir);
        let pool = init_db(&path).await.unwrap();
        sqlx::query(
            "INSERT INTO match_results (match_id, home_team_id, away_team_id, home_score, \
             away_score, status, game_time, attendance, total_revenue, events_json, \
             player_stats_json, team_stats_json, completed_at_ms, updated_at_ms) \
             VALUES ('m1', 'h', 'a', 7, 3, 'completed', 2400, 5000, '1000', '[]', '{}', '{}', 1, 1)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;

        let pool = init_db(&path).await.unwrap();
        let (home, away): (i64, i64) =
            sqlx::query_as("SELECT home_score, away_score FROM match_results WHERE match_id = 'm1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!((home, away), (7, 3));
        assert_eq!(migrate(&pool).await.unwrap(), MIGRATIONS.len());
        assert_eq!(user_version(&pool).await, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_team_and_recency_indexes() {
        let dir = TempDir::new().unwrap();
        let pool = init_db(&db_path(&dir)).await.unwrap();

        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='match_results' \
             AND name LIKE 'idx_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.0.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "idx_match_results_away_team",
                "idx_match_results_completed",
                "idx_match_results_home_team",
            ]
        );
    }

    #[tokio::test]
    async fn test_writers_wait_for_lock() {
        let dir = TempDir::new().unwrap();
        let pool = init_db(&db_path(&dir)).await.unwrap();

        let (timeout,): (i64,) = sqlx::query_as("PRAGMA busy_timeout")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(timeout, LOCK_WAIT.as_millis() as i64);
    }
}
