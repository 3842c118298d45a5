/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: session token issuing and validation
/// - [`middleware`]: Axum middleware reading the bearer header or session cookie
/// - [`authorization`]: global role, plan and team role checks
///
/// # Example
///
/// ```no_run
/// use regen_shared::auth::password::{hash_password, verify_password};
/// use regen_shared::auth::jwt::{create_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Compost-heap-42")?;
/// assert!(verify_password("Compost-heap-42", &hash)?);
///
/// let token = create_token(&Claims::new(Uuid::new_v4(), TokenType::Access), "secret-key-of-at-least-32-bytes!")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
