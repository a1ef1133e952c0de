//! Startup schema bootstrap.
//!
//! Additive only: tables are created when missing and columns are appended
//! when an older store lacks them. Nothing is ever dropped or retyped.

use std::collections::HashSet;

use sqlx::{SqliteConnection, SqlitePool};

use super::RepositoryError;

const CREATE_TABLES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "user" (
        id INTEGER PRIMARY KEY,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        name TEXT,
        created_at DATETIME NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS tag (
        id INTEGER PRIMARY KEY,
        shortid TEXT NOT NULL,
        stable_id TEXT,
        site_code TEXT,
        server_code TEXT,
        owner_user_id INTEGER REFERENCES "user"(id),
        status TEXT NOT NULL DEFAULT 'unassigned',
        created_at DATETIME NOT NULL
    )"#,
    r"CREATE TABLE IF NOT EXISTS profile (
        id INTEGER PRIMARY KEY,
        tag_id INTEGER NOT NULL REFERENCES tag(id),
        full_name TEXT,
        title TEXT,
        description TEXT,
        link TEXT,
        image_url TEXT,
        phone TEXT,
        public_email TEXT,
        instagram TEXT,
        linkedin TEXT,
        facebook TEXT,
        whatsapp TEXT,
        iban TEXT,
        theme_color TEXT DEFAULT '#2563eb',
        updated_at DATETIME
    )",
    r"CREATE TABLE IF NOT EXISTS click (
        id INTEGER PRIMARY KEY,
        tag_id INTEGER NOT NULL REFERENCES tag(id),
        timestamp DATETIME NOT NULL,
        ip TEXT,
        ua TEXT
    )",
];

/// Columns that older stores may lack, with the declaration used to add them.
const TAG_COLUMNS: &[(&str, &str)] = &[
    ("stable_id", "TEXT"),
    ("site_code", "TEXT"),
    ("server_code", "TEXT"),
    ("status", "TEXT DEFAULT 'unassigned'"),
];

const PROFILE_COLUMNS: &[(&str, &str)] = &[
    ("full_name", "TEXT"),
    ("title", "TEXT"),
    ("description", "TEXT"),
    ("link", "TEXT"),
    ("image_url", "TEXT"),
    ("phone", "TEXT"),
    ("public_email", "TEXT"),
    ("instagram", "TEXT"),
    ("linkedin", "TEXT"),
    ("facebook", "TEXT"),
    ("whatsapp", "TEXT"),
    ("iban", "TEXT"),
    ("theme_color", "TEXT DEFAULT '#2563eb'"),
    ("updated_at", "DATETIME"),
];

const BACKFILL: &[&str] = &[
    "UPDATE tag SET stable_id = lower(hex(randomblob(16))) WHERE stable_id IS NULL",
    // status mirrors ownership; this also rewrites the legacy 'active' value
    "UPDATE tag SET status = 'unassigned' \
     WHERE owner_user_id IS NULL AND (status IS NULL OR status <> 'unassigned')",
    "UPDATE tag SET status = 'claimed' \
     WHERE owner_user_id IS NOT NULL AND (status IS NULL OR status <> 'claimed')",
];

const CREATE_INDEXES: &[&str] = &[
    r#"CREATE UNIQUE INDEX IF NOT EXISTS uq_user_email ON "user"(email)"#,
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_tag_shortid ON tag(shortid)",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_tag_stable_id ON tag(stable_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_profile_tag_id ON profile(tag_id)",
    "CREATE INDEX IF NOT EXISTS ix_tag_owner_user_id ON tag(owner_user_id)",
    "CREATE INDEX IF NOT EXISTS ix_click_tag_timestamp ON click(tag_id, timestamp)",
];

/// Create or upgrade the schema. Safe to run on every startup.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if any statement fails, for example
/// when an existing store holds duplicate emails or shortids and the unique
/// index cannot be built. The whole bootstrap is rolled back in that case.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), RepositoryError> {
    let mut tx = pool.begin().await?;

    for ddl in CREATE_TABLES {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }

    let added_tag = add_missing_columns(&mut tx, "tag", TAG_COLUMNS).await?;
    let added_profile = add_missing_columns(&mut tx, "profile", PROFILE_COLUMNS).await?;

    for stmt in BACKFILL {
        sqlx::query(stmt).execute(&mut *tx).await?;
    }

    for ddl in CREATE_INDEXES {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }

    tx.commit().await?;

    if added_tag + added_profile > 0 {
        tracing::info!(
            tag_columns = added_tag,
            profile_columns = added_profile,
            "Upgraded existing schema"
        );
    }

    Ok(())
}

/// Append every expected column the table does not have yet.
async fn add_missing_columns(
    conn: &mut SqliteConnection,
    table: &str,
    expected: &[(&str, &str)],
) -> Result<usize, RepositoryError> {
    let existing: HashSet<String> =
        sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info(?1)")
            .bind(table)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

    let mut added = 0;
    for (column, decl) in expected {
        if !existing.contains(*column) {
            // Identifiers come from the constant tables above, never from input.
            let ddl = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
            sqlx::query(&ddl).execute(&mut *conn).await?;
            added += 1;
        }
    }
    Ok(added)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    async fn empty_pool() -> (SqlitePool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("legacy.db").display());
        let pool = crate::db::create_pool(&SecretString::from(url))
            .await
            .unwrap();
        (pool, dir)
    }

    async fn columns(pool: &SqlitePool, table: &str) -> HashSet<String> {
        sqlx::query_scalar::<_, String>("SELECT name FROM pragma_table_info(?1)")
            .bind(table)
            .fetch_all(pool)
            .await
            .unwrap()
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let (pool, _dir) = empty_pool().await;
        init_schema(&pool).await.unwrap();
        init_schema(&pool).await.unwrap();

        let tag_cols = columns(&pool, "tag").await;
        assert!(tag_cols.contains("stable_id"));
        assert!(tag_cols.contains("server_code"));
    }

    #[tokio::test]
    async fn test_upgrades_legacy_store() {
        let (pool, _dir) = empty_pool().await;

        // Shape written by the earlier deployment: no stable_id or site codes,
        // a short profile, and 'active' as the status of every tag.
        for ddl in [
            r#"CREATE TABLE "user" (id INTEGER PRIMARY KEY, email TEXT NOT NULL,
                password_hash TEXT NOT NULL, name TEXT, created_at DATETIME NOT NULL)"#,
            r#"CREATE TABLE tag (id INTEGER PRIMARY KEY, shortid TEXT NOT NULL,
                owner_user_id INTEGER REFERENCES "user"(id), status TEXT NOT NULL,
                created_at DATETIME NOT NULL)"#,
            "CREATE TABLE profile (id INTEGER PRIMARY KEY, tag_id INTEGER NOT NULL,
                title TEXT, description TEXT, link TEXT, image_url TEXT)",
            "INSERT INTO tag (shortid, owner_user_id, status, created_at)
                VALUES ('legacy01', NULL, 'active', '2024-03-01 10:00:00.000000')",
            "INSERT INTO profile (tag_id, title) VALUES (1, 'Old title')",
        ] {
            sqlx::query(ddl).execute(&pool).await.unwrap();
        }

        init_schema(&pool).await.unwrap();

        let profile_cols = columns(&pool, "profile").await;
        for (column, _) in PROFILE_COLUMNS {
            assert!(profile_cols.contains(*column), "missing {column}");
        }

        let (stable_id, status): (String, String) =
            sqlx::query_as("SELECT stable_id, status FROM tag WHERE shortid = 'legacy01'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(stable_id.len(), 32);
        assert_eq!(status, "unassigned");

        let title: String = sqlx::query_scalar("SELECT title FROM profile WHERE tag_id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(title, "Old title");
    }
}
