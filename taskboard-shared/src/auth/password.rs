/// Password hashing for sign-in identities
///
/// Passwords are hashed with Argon2id and stored as PHC strings, which carry
/// their own salt and parameters. Verification reads the parameters from the
/// stored hash, so changing [`hash_password`]'s cost only affects new hashes.
///
/// # Parameters
///
/// - memory: 19 MiB
/// - iterations: 2
/// - parallelism: 1
///
/// # Example
///
/// ```
/// use taskboard_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("correct horse 1")?;
/// assert!(verify_password("correct horse 1", &hash)?);
/// assert!(!verify_password("wrong", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};
use std::sync::OnceLock;

/// Minimum password length in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Error type for password operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    /// Rejected by [`validate_password_strength`]
    #[error("{0}")]
    TooWeak(&'static str),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(19 * 1024)
        .t_cost(2)
        .p_cost(1)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

/// Checks a password against a stored hash
///
/// Returns `Ok(false)` for a wrong password and an error only when the hash
/// itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// [`hash_password`] on the blocking thread pool
///
/// Argon2 takes tens of milliseconds of CPU; async callers use this so the
/// runtime's worker threads keep serving other requests.
pub async fn hash_password_blocking(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| PasswordError::HashError(e.to_string()))?
}

/// [`verify_password`] on the blocking thread pool
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PasswordError::VerifyError(e.to_string()))?
}

/// Runs a full verification against a throwaway hash and returns `false`
///
/// Used when there is no stored hash to check (unknown email), so that
/// failure costs the same Argon2 work as a wrong password.
pub async fn verify_against_dummy(password: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || {
        let hash = dummy_hash()?;
        verify_password(&password, hash).map(|_| false)
    })
    .await
    .map_err(|e| PasswordError::VerifyError(e.to_string()))?
}

/// Hash of a random password with the current parameters, made once
fn dummy_hash() -> Result<&'static str, PasswordError> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();

    DUMMY
        .get_or_init(|| {
            let password = SaltString::generate(&mut OsRng);
            hash_password(password.as_str()).ok()
        })
        .as_deref()
        .ok_or_else(|| PasswordError::HashError("Dummy hash unavailable".to_string()))
}

/// Sign-up password rules: at least 8 characters, a letter and a digit
pub fn validate_password_strength(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooWeak("Password must be at least 8 characters long"));
    }
    if !password.chars().any(char::is_alphabetic) {
        return Err(PasswordError::TooWeak("Password must contain at least one letter"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordError::TooWeak("Password must contain at least one digit"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_format() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(hash.contains("m=19456"));
        assert!(hash.contains("t=2"));
        assert!(hash.contains("p=1"));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same-pass-1").unwrap(), hash_password("same-pass-1").unwrap());
    }

    #[test]
    fn test_verify() {
        let hash = hash_password("unicode-密码-1").unwrap();
        assert!(verify_password("unicode-密码-1", &hash).unwrap());
        assert!(!verify_password("unicode-密码-2", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_dummy_hash_uses_current_parameters() {
        let hash = dummy_hash().unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));
        assert_eq!(dummy_hash().unwrap(), hash);
    }

    #[tokio::test]
    async fn test_blocking_helpers() {
        let hash = hash_password_blocking("off-thread-1".to_string()).await.unwrap();
        assert!(verify_password_blocking("off-thread-1".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password_blocking("off-thread-2".to_string(), hash).await.unwrap());

        assert!(!verify_against_dummy("off-thread-1".to_string()).await.unwrap());
        assert!(!verify_against_dummy(String::new()).await.unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("password1", "not-a-hash"),
            Err(PasswordError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("abcdefg1").is_ok());
        assert!(validate_password_strength("Pässwörd9").is_ok());

        for weak in ["abc1", "abcdefgh", "12345678", ""] {
            assert!(
                matches!(validate_password_strength(weak), Err(PasswordError::TooWeak(_))),
                "{} should be rejected",
                weak
            );
        }
    }
}
