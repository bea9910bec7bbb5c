//! Password hashing, backed by bcrypt.

use bcrypt::{hash, verify, DEFAULT_COST};

pub fn hash_password(plain: &str) -> Result<String, bcrypt::BcryptError> {
    hash(plain, DEFAULT_COST)
}

/// Check a plaintext password against a stored hash. A malformed stored hash
/// counts as a mismatch rather than an error.
pub fn verify_password(plain: &str, hashed: &str) -> bool {
    verify(plain, hashed).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_accepts_the_password() {
        let hashed = hash_password("secret1").unwrap();
        assert!(verify_password("secret1", &hashed));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let hashed = hash_password("secret1").unwrap();
        assert!(!verify_password("secret2", &hashed));
    }

    #[test]
    fn malformed_hash_is_rejected_not_an_error() {
        assert!(!verify_password("secret1", "not-a-bcrypt-hash"));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("secret1").unwrap();
        let b = hash_password("secret1").unwrap();
        assert_ne!(a, b);
    }
}
