//! Password-reset tickets.
//!
//! The caller receives a random secret; only its SHA-256 digest is stored.
//! At most one unused, unexpired ticket is meaningful per account: issuing a
//! new one marks all earlier unused tickets used, and a successful reset
//! consumes the ticket permanently.

use chrono::{Duration, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::state::DbPool;

/// Issue a ticket for an account, invalidating any prior unused tickets.
/// Returns the raw secret to embed in the reset link.
pub fn issue_ticket(pool: &DbPool, account_id: i64, ttl_minutes: i64) -> Result<String, AppError> {
    let conn = pool.get()?;

    let secret = generate_secret();
    let expires_at = (Utc::now() + Duration::minutes(ttl_minutes))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    conn.execute(
        "UPDATE reset_tickets SET used = 1 WHERE account_id = ?1 AND used = 0",
        params![account_id],
    )?;
    conn.execute(
        "INSERT INTO reset_tickets (account_id, token_hash, expires_at) VALUES (?1, ?2, ?3)",
        params![account_id, hash_secret(&secret), expires_at],
    )?;

    Ok(secret)
}

/// Consume a ticket and set the account's password to `new_password_hash`.
/// Fails without touching the password when the ticket is unknown, already
/// used, or expired.
pub fn consume_ticket(pool: &DbPool, secret: &str, new_password_hash: &str) -> Result<(), AppError> {
    let conn = pool.get()?;

    let ticket: Option<(i64, i64, bool, bool)> = conn
        .query_row(
            "SELECT id, account_id, used, expires_at <= datetime('now')
             FROM reset_tickets WHERE token_hash = ?1",
            params![hash_secret(secret)],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    let Some((id, account_id, used, expired)) = ticket else {
        return Err(AppError::Validation("invalid reset token".into()));
    };
    if used {
        return Err(AppError::Validation("reset token already used".into()));
    }
    if expired {
        return Err(AppError::Validation("reset token expired".into()));
    }

    conn.execute(
        "UPDATE accounts SET password_hash = ?1 WHERE id = ?2",
        params![new_password_hash, account_id],
    )?;
    conn.execute(
        "UPDATE reset_tickets SET used = 1 WHERE id = ?1",
        params![id],
    )?;

    Ok(())
}

/// 48 cryptographically random bytes, hex encoded.
fn generate_secret() -> String {
    let mut bytes = [0u8; 48];
    rand::thread_rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}

fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use r2d2::Pool;
    use r2d2_sqlite::SqliteConnectionManager;

    fn test_pool() -> DbPool {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        db::run_migrations(&pool).unwrap();
        db::seed_general_admin(&pool, "admin123").unwrap();
        pool
    }

    fn password_hash(pool: &DbPool) -> String {
        pool.get()
            .unwrap()
            .query_row("SELECT password_hash FROM accounts WHERE id = 1", [], |r| {
                r.get(0)
            })
            .unwrap()
    }

    #[test]
    fn secret_is_96_hex_chars() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 96);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, generate_secret());
    }

    #[test]
    fn only_the_digest_is_stored() {
        let pool = test_pool();
        let secret = issue_ticket(&pool, 1, 60).unwrap();

        let stored: String = pool
            .get()
            .unwrap()
            .query_row("SELECT token_hash FROM reset_tickets", [], |r| r.get(0))
            .unwrap();
        assert_ne!(stored, secret);
        assert_eq!(stored, hash_secret(&secret));
    }

    #[test]
    fn consuming_a_ticket_updates_the_password_once() {
        let pool = test_pool();
        let before = password_hash(&pool);
        let secret = issue_ticket(&pool, 1, 60).unwrap();

        consume_ticket(&pool, &secret, "new-hash").unwrap();
        assert_eq!(password_hash(&pool), "new-hash");
        assert_ne!(password_hash(&pool), before);

        // Single use: a second consume fails and leaves the password alone.
        let err = consume_ticket(&pool, &secret, "other-hash").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(password_hash(&pool), "new-hash");
    }

    #[test]
    fn issuing_again_invalidates_the_previous_ticket() {
        let pool = test_pool();
        let first = issue_ticket(&pool, 1, 60).unwrap();
        let second = issue_ticket(&pool, 1, 60).unwrap();

        let err = consume_ticket(&pool, &first, "h1").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        consume_ticket(&pool, &second, "h2").unwrap();
        assert_eq!(password_hash(&pool), "h2");
    }

    #[test]
    fn expired_ticket_is_rejected_without_mutation() {
        let pool = test_pool();
        let before = password_hash(&pool);
        let secret = issue_ticket(&pool, 1, -5).unwrap();

        let err = consume_ticket(&pool, &secret, "new-hash").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(password_hash(&pool), before);
    }

    #[test]
    fn unknown_secret_is_rejected() {
        let pool = test_pool();
        let err = consume_ticket(&pool, "deadbeef", "new-hash").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
