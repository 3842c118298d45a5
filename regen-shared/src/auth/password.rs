/// Argon2id password hashing
///
/// Hashes are stored in PHC string form (`$argon2id$v=19$m=19456,t=2,p=1$...`)
/// so the parameters travel with the hash and can be raised later without
/// invalidating existing accounts.
///
/// # Example
///
/// ```
/// use regen_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Compost-heap-42")?;
/// assert!(verify_password("Compost-heap-42", &hash)?);
/// assert!(!verify_password("compost-heap-42", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 10;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Stored hash could not be parsed
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    /// Verification failed for a reason other than a mismatch
    #[error("Failed to verify password: {0}")]
    VerifyError(String),
}

/// Reasons a password is rejected at registration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WeakPassword {
    #[error("Password must be at least 10 characters long")]
    TooShort,

    #[error("Password must contain both upper and lower case letters")]
    MissingCase,

    #[error("Password must contain at least one digit")]
    MissingDigit,
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    // 19 MiB, 2 passes, 1 lane
    let params = ParamsBuilder::new()
        .m_cost(19_456)
        .t_cost(2)
        .p_cost(1)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes `password` with a fresh random salt
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies `password` against a stored PHC hash
///
/// Returns `Ok(false)` on mismatch; errors are reserved for unreadable hashes.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// Checks registration password rules
///
/// ```
/// use regen_shared::auth::password::{validate_password_strength, WeakPassword};
///
/// assert!(validate_password_strength("Compost-heap-42").is_ok());
/// assert_eq!(validate_password_strength("short1A"), Err(WeakPassword::TooShort));
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), WeakPassword> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(WeakPassword::TooShort);
    }

    let has_upper = password.chars().any(char::is_uppercase);
    let has_lower = password.chars().any(char::is_lowercase);
    if !(has_upper && has_lower) {
        return Err(WeakPassword::MissingCase);
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(WeakPassword::MissingDigit);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id_phc() {
        let hash = hash_password("Compost-heap-42").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("Compost-heap-42").unwrap();
        let b = hash_password("Compost-heap-42").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("Compost-heap-42", &a).unwrap());
        assert!(verify_password("Compost-heap-42", &b).unwrap());
    }

    #[test]
    fn test_wrong_password_is_false_not_error() {
        let hash = hash_password("Compost-heap-42").unwrap();
        assert!(!verify_password("Compost-heap-43", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(PasswordError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_strength_rules() {
        assert_eq!(validate_password_strength("Ab1"), Err(WeakPassword::TooShort));
        assert_eq!(validate_password_strength("alllowercase1"), Err(WeakPassword::MissingCase));
        assert_eq!(validate_password_strength("NoDigitsHere"), Err(WeakPassword::MissingDigit));
        assert_eq!(validate_password_strength("Mycorrhiza2024"), Ok(()));
    }
}
