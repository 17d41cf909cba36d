//! Database schema migrations.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Run all database migrations.
///
/// Every step is idempotent; this runs on each startup.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        -- Service-wide setting overrides (see config::DynamicConfig)
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
    "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: e.to_string(),
    })?;

    run_user_settings_table_migration(conn)?;

    Ok(())
}

/// Migration: per-user file search settings
fn run_user_settings_table_migration(conn: &Connection) -> ServiceResult<()> {
    let has_table: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='user_file_search_settings'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .unwrap_or(0)
        > 0;

    if !has_table {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS user_file_search_settings (
                user_id TEXT PRIMARY KEY,
                store_names TEXT NOT NULL DEFAULT '[]',
                top_k INTEGER,
                selected_store TEXT,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )
        .map_err(|e| DatabaseError::Migration {
            message: format!("Failed to create user_file_search_settings table: {}", e),
        })?;
    }

    Ok(())
}
