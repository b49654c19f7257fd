/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: Session token issuance and validation
/// - [`middleware`]: Bearer header to [`middleware::AuthContext`]
/// - [`authorization`]: Policy engine and role resolver
///
/// Authentication answers "who is calling"; the store then asks the policy
/// engine what that identity may do, using the role held in the database.

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
