use pbkdf2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use pbkdf2::{Algorithm, Params, Pbkdf2};
use rand::Rng;
use thiserror::Error;

const SALT_LENGTH: usize = 16;
const KEY_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("key derivation failed")]
    Derivation,
}

/// Salted PBKDF2-HMAC-SHA256 hashing.
///
/// Digests are PHC strings: `$pbkdf2-sha256$i=<rounds>,l=32$<salt>$<hash>`.
/// The round count travels with the digest, so raising the work factor does
/// not invalidate stored hashes.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Hash a password with a fresh 16-byte random salt
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        if password.is_empty() {
            return Err(PasswordError::EmptyPassword);
        }

        let salt_bytes: [u8; SALT_LENGTH] = rand::thread_rng().r#gen();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|_| PasswordError::Derivation)?;

        let params = Params {
            rounds: self.iterations,
            output_length: KEY_LENGTH,
        };

        let hash = Pbkdf2
            .hash_password_customized(
                password.as_bytes(),
                Some(Algorithm::Pbkdf2Sha256.ident()),
                None,
                params,
                &salt,
            )
            .map_err(|_| PasswordError::Derivation)?;

        Ok(hash.to_string())
    }

    /// Check a password against a stored digest.
    /// A malformed digest is treated as a mismatch.
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            tracing::warn!("Stored password digest has an unexpected format");
            return false;
        };

        Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1_000)
    }

    #[test]
    fn test_hash_and_verify() {
        let digest = hasher().hash("P@ssw0rd1").unwrap();
        assert!(digest.starts_with("$pbkdf2-sha256$i=1000,l=32$"));
        assert!(hasher().verify("P@ssw0rd1", &digest));
        assert!(!hasher().verify("P@ssw0rd2", &digest));
    }

    #[test]
    fn test_salt_differs_per_call() {
        let a = hasher().hash("same-password").unwrap();
        let b = hasher().hash("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_password_rejected() {
        assert_eq!(hasher().hash(""), Err(PasswordError::EmptyPassword));
    }

    #[test]
    fn test_iterations_read_from_digest() {
        let digest = PasswordHasher::new(2_000).hash("secret-value").unwrap();
        assert!(digest.contains("i=2000"));
        // a hasher configured differently still verifies older digests
        assert!(hasher().verify("secret-value", &digest));
    }

    #[test]
    fn test_tampered_digest_is_a_mismatch() {
        let digest = hasher().hash("secret-value").unwrap();
        let (head, hash) = digest.rsplit_once('$').unwrap();
        let flipped = if hash.starts_with('A') { 'B' } else { 'A' };
        let tampered = format!("{head}${flipped}{}", &hash[1..]);
        assert!(!hasher().verify("secret-value", &tampered));
    }

    #[test]
    fn test_malformed_digest_is_a_mismatch() {
        assert!(!hasher().verify("anything", "not-a-digest"));
        assert!(!hasher().verify("anything", "pbkdf2:sha256:1000$abc$def"));
        assert!(!hasher().verify("anything", "$bcrypt$12$abc$def"));
        assert!(!hasher().verify("anything", ""));
    }
}
