//! Reference store schema and its forward-only migrations.

/// Version bookkeeping. Created on every open before anything is read.
const VERSION_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    ) STRICT;
";

/// Migration `i` brings the store from version `i` to `i + 1`.
///
/// Version 1 replaces anything unversioned with `reference_cache`: the last
/// known-good reference per conversation identity and kind, keyed by the
/// full identity so one thread can never read another's entry.
const MIGRATIONS: &[&str] = &["
    DROP TABLE IF EXISTS reference_cache;
    CREATE TABLE reference_cache (
        owner       TEXT    NOT NULL,
        repo        TEXT    NOT NULL,
        thread_id   TEXT    NOT NULL,
        kind        TEXT    NOT NULL CHECK(kind IN ('mapping', 'proxy')),
        url         TEXT    NOT NULL,
        updated_at  INTEGER NOT NULL,
        PRIMARY KEY (owner, repo, thread_id, kind)
    ) STRICT;
"];

pub const LATEST_VERSION: i64 = MIGRATIONS.len() as i64;

/// Applies every migration newer than the stored version, each in its own
/// immediate transaction. Safe to call on every open.
///
/// # Errors
///
/// Returns `rusqlite::Error` if a migration fails; earlier migrations stay
/// committed.
pub fn migrate(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(VERSION_TABLE)?;
    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    for (version, sql) in (1..).zip(MIGRATIONS).skip(current.max(0) as usize) {
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        tx.commit()?;
        tracing::debug!(version, "reference store migrated");
    }
    Ok(())
}
