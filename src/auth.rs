use crate::db::Database;
use crate::errors::{AppError, AppResult, AuthError};
use crate::models::{LoginPayload, RegisterPayload, Role, User};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::{Deserialize, Serialize};

pub const PLACEHOLDER_ADMIN_SECRET: &str = "ADMIN888";
pub const PLACEHOLDER_INVITE_CODE: &str = "TEAM2025";

/// Argon2id hash of `password` as a PHC string.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| AppError::Internal(format!("password hashing failed: {}", error)))
}

/// A stored hash that does not parse never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Shared-secret admission for new accounts. The secrets are static team-wide values, not
/// per-member credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdmissionPolicy {
    pub admin_secret: String,
    pub invite_code: String,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            admin_secret: PLACEHOLDER_ADMIN_SECRET.to_string(),
            invite_code: PLACEHOLDER_INVITE_CODE.to_string(),
        }
    }
}

impl AdmissionPolicy {
    pub fn uses_placeholder_secrets(&self) -> bool {
        self.admin_secret == PLACEHOLDER_ADMIN_SECRET || self.invite_code == PLACEHOLDER_INVITE_CODE
    }

    pub fn admit(&self, admin_secret: &str, invite_code: &str) -> Result<Role, AuthError> {
        if !self.admin_secret.is_empty() && admin_secret == self.admin_secret {
            return Ok(Role::Admin);
        }
        if !self.invite_code.is_empty() && invite_code == self.invite_code {
            return Ok(Role::User);
        }
        Err(AuthError::InvalidInviteCode)
    }
}

pub fn login(db: &Database, payload: &LoginPayload) -> AppResult<User> {
    let email = payload.email.trim();
    let candidates = db.users_with_credentials_by_email(email)?;
    candidates
        .into_iter()
        .find(|(_, stored_hash)| verify_password(&payload.password, stored_hash))
        .map(|(user, _)| user)
        .ok_or(AppError::Auth(AuthError::InvalidCredentials))
}

pub fn register(db: &Database, policy: &AdmissionPolicy, payload: &RegisterPayload) -> AppResult<User> {
    let name = payload.name.trim();
    let email = payload.email.trim();
    if name.is_empty() || email.is_empty() || payload.password.is_empty() {
        return Err(AppError::Validation("name, email and password are required".to_string()));
    }

    let role = policy.admit(payload.admin_secret.trim(), payload.invite_code.trim())?;
    if db.email_exists(email)? {
        return Err(AuthError::EmailTaken.into());
    }

    let password_hash = hash_password(&payload.password)?;
    let user = db.insert_user(name, email, role, &password_hash)?;
    tracing::info!(user_id = %user.id, role = role.as_str(), "registered team member");
    Ok(user)
}
