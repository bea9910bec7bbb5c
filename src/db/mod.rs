pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::auth::password;
use crate::auth::policy::GENERAL_ADMIN_ID;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Seed the general administrator (account id 1) if it does not exist yet.
/// Returns true when a row was created. The password is only hashed when the
/// seed is actually needed.
pub fn seed_general_admin(pool: &DbPool, admin_password: &str) -> anyhow::Result<bool> {
    let conn = pool.get()?;

    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM accounts WHERE id = ?1",
        params![GENERAL_ADMIN_ID],
        |row| row.get(0),
    )?;
    if exists {
        return Ok(false);
    }

    let hash = password::hash_password(admin_password)?;
    conn.execute(
        "INSERT INTO accounts (id, username, email, password_hash, display_name, role)
         VALUES (?1, 'admin', 'admin@localhost', ?2, 'Administrator', 'admin')",
        params![GENERAL_ADMIN_ID, hash],
    )?;
    tracing::info!("Seeded general administrator account");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool() -> DbPool {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });
        Pool::builder().max_size(1).build(manager).unwrap()
    }

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());
        // Verify we can get a connection
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn migrations_run_successfully() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        // Verify key tables exist
        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        assert!(tables.contains(&"accounts".to_string()));
        assert!(tables.contains(&"categories".to_string()));
        assert!(tables.contains(&"posts".to_string()));
        assert!(tables.contains(&"comments".to_string()));
        assert!(tables.contains(&"reset_tickets".to_string()));
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap(); // Should not error on second run

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn seed_creates_general_admin_once() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        assert!(seed_general_admin(&pool, "secret").unwrap());
        assert!(!seed_general_admin(&pool, "secret").unwrap());

        let conn = pool.get().unwrap();
        let (username, role): (String, String) = conn
            .query_row(
                "SELECT username, role FROM accounts WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(username, "admin");
        assert_eq!(role, "admin");
    }

    #[test]
    fn registered_accounts_never_get_id_one() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();
        seed_general_admin(&pool, "secret").unwrap();

        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO accounts (username, email, password_hash, display_name)
             VALUES ('ana', 'a@x.com', 'h', 'Ana Li')",
            [],
        )
        .unwrap();
        let id: i64 = conn
            .query_row("SELECT id FROM accounts WHERE username = 'ana'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert!(id > 1);
    }

    #[test]
    fn foreign_keys_enforced() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        // Inserting a post with a non-existent author should fail
        let result = conn.execute(
            "INSERT INTO posts (category_id, author_id, title, body) VALUES (1, 99, 't', 'b')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn deleting_a_comment_promotes_its_replies() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();
        seed_general_admin(&pool, "secret").unwrap();

        let conn = pool.get().unwrap();
        conn.execute("INSERT INTO categories (name) VALUES ('general')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO posts (category_id, author_id, title, body) VALUES (1, 1, 't', 'b')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO comments (post_id, author_id, body) VALUES (1, 1, 'parent')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO comments (post_id, author_id, parent_id, body) VALUES (1, 1, 1, 'reply')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM comments WHERE id = 1", []).unwrap();

        let parent: Option<i64> = conn
            .query_row("SELECT parent_id FROM comments WHERE id = 2", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(parent, None);
    }
}
